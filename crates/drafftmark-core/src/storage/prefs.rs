//! Local per-user tool preferences.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use super::{StorageError, StorageResult};
use crate::geometry::{LineStyle, Rgba, Symbol, SymbolSize};
use crate::tools::ToolMode;

/// Persisted tool settings. Permanent mode is deliberately absent: it always starts off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Preferences {
    pub mode: ToolMode,
    pub stamp_style: Symbol,
    pub symbol_size: SymbolSize,
    pub line_style: LineStyle,
    pub brush_width: f64,
    pub brush_color: Rgba,
    pub timed_erase: bool,
    pub opacity: f64,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            mode: ToolMode::default(),
            stamp_style: Symbol::default(),
            symbol_size: SymbolSize::default(),
            line_style: LineStyle::default(),
            brush_width: 4.0,
            brush_color: Rgba::RED,
            timed_erase: true,
            opacity: 1.0,
        }
    }
}

/// Synchronous per-user preference storage.
pub trait PreferenceStore: Send + Sync {
    fn load(&self, user: &str) -> StorageResult<Option<Preferences>>;
    fn save(&self, user: &str, prefs: &Preferences) -> StorageResult<()>;
}

#[derive(Default)]
pub struct MemoryPreferences {
    entries: RwLock<HashMap<String, Preferences>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn load(&self, user: &str) -> StorageResult<Option<Preferences>> {
        let entries = self
            .entries
            .read()
            .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
        Ok(entries.get(user).cloned())
    }

    fn save(&self, user: &str, prefs: &Preferences) -> StorageResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
        entries.insert(user.to_string(), prefs.clone());
        Ok(())
    }
}

/// One JSON file per user.
pub struct FilePreferences {
    base_path: PathBuf,
}

impl FilePreferences {
    pub fn new(base_path: PathBuf) -> StorageResult<Self> {
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                StorageError::Io(format!("Failed to create preferences directory: {}", e))
            })?;
        }
        Ok(Self { base_path })
    }

    /// Preferences under the platform config directory.
    pub fn default_location() -> StorageResult<Self> {
        let base = dirs::config_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| StorageError::Io("Could not determine home directory".to_string()))?;
        Self::new(base.join("drafftmark").join("preferences"))
    }

    fn user_path(&self, user: &str) -> PathBuf {
        let safe: String = user
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.base_path.join(format!("{}.json", safe))
    }
}

impl PreferenceStore for FilePreferences {
    fn load(&self, user: &str) -> StorageResult<Option<Preferences>> {
        let path = self.user_path(user);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)
            .map_err(|e| StorageError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| StorageError::Serialization(format!("Failed to parse {}: {}", path.display(), e)))
    }

    fn save(&self, user: &str, prefs: &Preferences) -> StorageResult<()> {
        let path = self.user_path(user);
        let json = serde_json::to_string_pretty(prefs).map_err(|e| StorageError::Serialization(e.to_string()))?;
        fs::write(&path, json)
            .map_err(|e| StorageError::Io(format!("Failed to write {}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_partial_json_uses_defaults() {
        let prefs: Preferences = serde_json::from_str(r#"{"brushWidth": 9, "lineStyle": "dotted"}"#).unwrap();
        assert_eq!(prefs.brush_width, 9.0);
        assert_eq!(prefs.line_style, LineStyle::Dotted);
        assert_eq!(prefs.opacity, 1.0);
    }

    #[test]
    fn test_memory_preferences() {
        let store = MemoryPreferences::new();
        assert!(store.load("p1").unwrap().is_none());
        let prefs = Preferences {
            mode: ToolMode::Box,
            ..Preferences::default()
        };
        store.save("p1", &prefs).unwrap();
        assert_eq!(store.load("p1").unwrap(), Some(prefs));
    }

    #[test]
    fn test_file_preferences_roundtrip() {
        let dir = tempdir().unwrap();
        let store = FilePreferences::new(dir.path().to_path_buf()).unwrap();
        let prefs = Preferences {
            stamp_style: Symbol::HexOutline,
            symbol_size: SymbolSize::Large,
            brush_color: Rgba::rgb(1, 2, 3),
            ..Preferences::default()
        };
        store.save("user/1", &prefs).unwrap();
        assert_eq!(store.load("user/1").unwrap(), Some(prefs));
        assert!(store.load("someone-else").unwrap().is_none());
    }

    #[test]
    fn test_file_preferences_corrupt() {
        let dir = tempdir().unwrap();
        let store = FilePreferences::new(dir.path().to_path_buf()).unwrap();
        fs::write(dir.path().join("p1.json"), "{").unwrap();
        assert!(matches!(store.load("p1"), Err(StorageError::Serialization(_))));
    }
}
