//! File-based scene store for native platforms.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{BoxFuture, SceneStore, StorageError, StorageResult};

/// Stores each scene as one JSON object (key -> value) in a base directory.
pub struct FileStore {
    base_path: PathBuf,
    // Serializes read-modify-write cycles on scene files.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Create a file store with the given base directory, creating it if needed.
    pub fn new(base_path: PathBuf) -> StorageResult<Self> {
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                StorageError::Io(format!("Failed to create storage directory: {}", e))
            })?;
        }
        Ok(Self {
            base_path,
            write_lock: Mutex::new(()),
        })
    }

    /// Create a file store in the default location.
    ///
    /// On Unix: `~/.local/share/drafftmark/scenes/`
    /// On Windows: `%LOCALAPPDATA%\drafftmark\scenes\`
    pub fn default_location() -> StorageResult<Self> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| StorageError::Io("Could not determine home directory".to_string()))?;
        Self::new(base.join("drafftmark").join("scenes"))
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn scene_path(&self, scene: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", sanitize(scene)))
    }

    fn read_scene(path: &Path) -> StorageResult<serde_json::Map<String, serde_json::Value>> {
        if !path.exists() {
            return Ok(serde_json::Map::new());
        }
        let json = fs::read_to_string(path)
            .map_err(|e| StorageError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&json).map_err(|e| {
            StorageError::Serialization(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    fn write_scene(path: &Path, scene: &serde_json::Map<String, serde_json::Value>) -> StorageResult<()> {
        let json = serde_json::to_string_pretty(scene)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        fs::write(path, json)
            .map_err(|e| StorageError::Io(format!("Failed to write {}: {}", path.display(), e)))
    }

    fn update(
        &self,
        scene: &str,
        apply: impl FnOnce(&mut serde_json::Map<String, serde_json::Value>),
    ) -> StorageResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
        let path = self.scene_path(scene);
        let mut entries = Self::read_scene(&path)?;
        apply(&mut entries);
        Self::write_scene(&path, &entries)
    }
}

/// Make a scene id safe for use as a file name.
fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

impl SceneStore for FileStore {
    fn get(&self, scene: &str, key: &str) -> BoxFuture<'_, StorageResult<Option<serde_json::Value>>> {
        let path = self.scene_path(scene);
        let key = key.to_string();
        Box::pin(async move {
            let mut entries = Self::read_scene(&path)?;
            Ok(entries.remove(&key))
        })
    }

    fn set(&self, scene: &str, key: &str, value: serde_json::Value) -> BoxFuture<'_, StorageResult<()>> {
        let scene = scene.to_string();
        let key = key.to_string();
        Box::pin(async move {
            self.update(&scene, |entries| {
                entries.insert(key, value);
            })
        })
    }

    fn remove(&self, scene: &str, key: &str) -> BoxFuture<'_, StorageResult<()>> {
        let scene = scene.to_string();
        let key = key.to_string();
        Box::pin(async move {
            if !self.scene_path(&scene).exists() {
                return Ok(());
            }
            self.update(&scene, |entries| {
                entries.remove(&key);
            })
        })
    }
}
