//! Moderator view over every drawing in the scene.

use serde::Serialize;

use crate::clock::Millis;
use crate::entity::{EntityId, EntityKind, Owner};
use crate::lifecycle::{DrawError, EntityManager};

/// One row of the inspector listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectorEntry {
    pub id: EntityId,
    pub kind: EntityKind,
    pub owner: Owner,
    pub permanent: bool,
    pub created_at: Millis,
    pub expires_at: Option<Millis>,
}

/// Borrowed inspector handle. Deletions queue their broadcast on the manager like any other.
pub struct Inspector<'a> {
    manager: &'a mut EntityManager,
}

impl<'a> Inspector<'a> {
    pub fn new(manager: &'a mut EntityManager) -> Self {
        Self { manager }
    }

    /// Permanent drawings first, then ephemeral ones, each in creation order.
    pub fn entries(&self) -> Vec<InspectorEntry> {
        self.manager
            .permanent()
            .iter()
            .chain(self.manager.ephemeral())
            .map(|entity| InspectorEntry {
                id: entity.id.clone(),
                kind: entity.kind(),
                owner: entity.owner.clone(),
                permanent: entity.permanent,
                created_at: entity.created_at,
                expires_at: entity.expires_at,
            })
            .collect()
    }

    pub fn highlight(&mut self, id: &str) -> Result<(), DrawError> {
        if self.manager.layer_mut().set_highlight(Some(id)) {
            Ok(())
        } else {
            Err(DrawError::NotFound(id.to_string()))
        }
    }

    pub fn clear_highlight(&mut self) {
        self.manager.layer_mut().set_highlight(None);
    }

    pub fn highlighted(&self) -> Option<&str> {
        self.manager.layer().highlight()
    }

    pub fn delete(&mut self, id: &str) -> Result<bool, DrawError> {
        self.manager.delete_by_id(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::SessionConfig;
    use crate::entity::{Draft, Geometry, StrokeSpec};
    use crate::grid::GridDescriptor;
    use crate::identity::User;
    use kurbo::Point;
    use std::sync::Arc;

    fn draft() -> Draft {
        Draft {
            geometry: Geometry::Box {
                origin: Point::new(10.0, 10.0),
                width: 20.0,
                height: 20.0,
            },
            stroke: StrokeSpec::default(),
            opacity: 1.0,
        }
    }

    fn moderator() -> EntityManager {
        EntityManager::new(
            User::moderator("gm", "GM"),
            GridDescriptor::default(),
            SessionConfig::default(),
            Arc::new(ManualClock::new(50)),
        )
    }

    #[test]
    fn test_entries_list_both_collections() {
        let mut manager = moderator();
        let ephemeral = manager.finalize(draft(), true, false);
        let permanent = manager.finalize(draft(), true, true);

        let entries = Inspector::new(&mut manager).entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, permanent.id);
        assert!(entries[0].permanent);
        assert_eq!(entries[0].expires_at, None);
        assert_eq!(entries[1].id, ephemeral.id);
        assert_eq!(entries[1].kind, EntityKind::Box);
        assert_eq!(entries[1].owner.name, "GM");
        assert_eq!(entries[1].created_at, 50);
    }

    #[test]
    fn test_highlight() {
        let mut manager = moderator();
        let entity = manager.finalize(draft(), false, false);
        let mut inspector = Inspector::new(&mut manager);

        inspector.highlight(&entity.id).unwrap();
        assert_eq!(inspector.highlighted(), Some(entity.id.as_str()));
        assert_eq!(
            inspector.highlight("missing"),
            Err(DrawError::NotFound("missing".to_string()))
        );
        assert_eq!(inspector.highlighted(), None);

        inspector.highlight(&entity.id).unwrap();
        inspector.clear_highlight();
        assert_eq!(inspector.highlighted(), None);
    }

    #[test]
    fn test_delete_queues_broadcast() {
        let mut manager = moderator();
        let entity = manager.finalize(draft(), false, false);
        manager.take_outgoing();

        assert_eq!(Inspector::new(&mut manager).delete(&entity.id), Ok(true));
        assert!(manager.is_empty());
        assert_eq!(manager.take_outgoing().len(), 1);
    }
}
