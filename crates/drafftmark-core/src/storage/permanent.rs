//! Adapter between the entity lifecycle and the scene store's permanent list.

use std::sync::Arc;

use super::SceneStore;
use crate::entity::VectorEntity;

/// Reads and writes the scene's permanent-entity list.
///
/// Failures never propagate: a failed read yields an empty list and a failed
/// write is logged and dropped.
#[derive(Clone)]
pub struct PermanentStore {
    store: Arc<dyn SceneStore>,
    scene: String,
    key: String,
}

impl PermanentStore {
    pub fn new(store: Arc<dyn SceneStore>, scene: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            store,
            scene: scene.into(),
            key: key.into(),
        }
    }

    pub fn scene(&self) -> &str {
        &self.scene
    }

    /// Read the full permanent list. Entries that fail to parse are skipped.
    pub async fn load(&self) -> Vec<VectorEntity> {
        let value = match self.store.get(&self.scene, &self.key).await {
            Ok(Some(value)) => value,
            Ok(None) => return Vec::new(),
            Err(e) => {
                log::warn!("failed to read permanent drawings for {}: {}", self.scene, e);
                return Vec::new();
            }
        };

        let serde_json::Value::Array(items) = value else {
            log::warn!("permanent drawings for {} are not a list, ignoring", self.scene);
            return Vec::new();
        };

        items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<VectorEntity>(item) {
                Ok(mut entity) => {
                    entity.permanent = true;
                    entity.expires_at = None;
                    Some(entity)
                }
                Err(e) => {
                    log::warn!("skipping malformed permanent drawing: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Write the full permanent list, replacing what is stored.
    pub async fn save(&self, entities: &[VectorEntity]) {
        let value = match serde_json::to_value(entities) {
            Ok(value) => value,
            Err(e) => {
                log::error!("failed to encode permanent drawings: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.set(&self.scene, &self.key, value).await {
            log::error!("failed to write permanent drawings for {}: {}", self.scene, e);
        }
    }

    /// Drop the stored list entirely.
    pub async fn clear(&self) {
        if let Err(e) = self.store.remove(&self.scene, &self.key).await {
            log::error!("failed to clear permanent drawings for {}: {}", self.scene, e);
        }
    }
}
