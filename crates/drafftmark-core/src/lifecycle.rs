//! Entity lifecycle: the ephemeral and permanent collections and every way in and out of them.
//!
//! The manager is the only writer of the rendered [`MarkLayer`]. Local
//! mutations queue outgoing [`DrawMessage`]s and, for permanent entities, a
//! pending store write; the session drains both.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::clock::{Clock, Millis};
use crate::config::SessionConfig;
use crate::entity::{Draft, EntityId, VectorEntity, generate_id};
use crate::geometry::DisplayList;
use crate::grid::GridDescriptor;
use crate::identity::{User, UserId};
use crate::layer::MarkLayer;
use crate::protocol::{Deletion, DrawMessage};

/// Errors from lifecycle operations. The session turns these into user-visible notices.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DrawError {
    #[error("only the moderator may {0}")]
    Unauthorized(String),
    #[error("nothing to undo")]
    NothingToUndo,
    #[error("no drawing with id {0}")]
    NotFound(EntityId),
}

/// Scope of a clear request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearScope {
    /// Every ephemeral entity. Moderator only.
    All,
    /// The caller's own ephemeral entities.
    Mine,
    /// The permanent collection and the store. Moderator only.
    Permanent,
}

/// Pending write to the permanent store. Later writes supersede earlier ones.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreWrite {
    Save(Vec<VectorEntity>),
    Clear,
}

pub struct EntityManager {
    user: User,
    grid: GridDescriptor,
    config: SessionConfig,
    clock: Arc<dyn Clock>,
    ephemeral: Vec<VectorEntity>,
    permanent: Vec<VectorEntity>,
    /// Undo target per owner.
    last_created: HashMap<UserId, EntityId>,
    layer: MarkLayer,
    next_sweep: Option<Millis>,
    outgoing: Vec<DrawMessage>,
    store_write: Option<StoreWrite>,
}

impl EntityManager {
    pub fn new(user: User, grid: GridDescriptor, config: SessionConfig, clock: Arc<dyn Clock>) -> Self {
        let layer = MarkLayer::new(config.fade_duration_ms);
        Self {
            user,
            grid,
            config,
            clock,
            ephemeral: Vec::new(),
            permanent: Vec::new(),
            last_created: HashMap::new(),
            layer,
            next_sweep: None,
            outgoing: Vec::new(),
            store_write: None,
        }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn ephemeral(&self) -> &[VectorEntity] {
        &self.ephemeral
    }

    pub fn permanent(&self) -> &[VectorEntity] {
        &self.permanent
    }

    pub fn get(&self, id: &str) -> Option<&VectorEntity> {
        self.permanent
            .iter()
            .chain(self.ephemeral.iter())
            .find(|entity| entity.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.ephemeral.len() + self.permanent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current undo target of `owner`.
    pub fn last_created(&self, owner: &str) -> Option<&str> {
        self.last_created.get(owner).map(String::as_str)
    }

    pub fn layer(&self) -> &MarkLayer {
        &self.layer
    }

    pub(crate) fn layer_mut(&mut self) -> &mut MarkLayer {
        &mut self.layer
    }

    pub fn grid(&self) -> &GridDescriptor {
        &self.grid
    }

    pub fn display_list(&self) -> DisplayList {
        self.layer.display_list(self.clock.now())
    }

    /// When the next expiration sweep is due.
    pub fn next_sweep(&self) -> Option<Millis> {
        self.next_sweep
    }

    pub fn take_outgoing(&mut self) -> Vec<DrawMessage> {
        std::mem::take(&mut self.outgoing)
    }

    pub fn take_store_write(&mut self) -> Option<StoreWrite> {
        self.store_write.take()
    }

    fn require_privilege(&self, action: &str) -> Result<(), DrawError> {
        if self.user.is_privileged() {
            Ok(())
        } else {
            Err(DrawError::Unauthorized(action.to_string()))
        }
    }

    fn save_permanent(&mut self) {
        self.store_write = Some(StoreWrite::Save(self.permanent.clone()));
    }

    /// Commit a draft as a new entity owned by the local user.
    ///
    /// Permanent mode only applies to privileged users; everyone else gets an
    /// ephemeral entity.
    pub fn finalize(&mut self, draft: Draft, timed_erase: bool, permanent_mode: bool) -> VectorEntity {
        let now = self.clock.now();
        let permanent = permanent_mode && self.user.is_privileged();
        let expires_at = (timed_erase && !permanent).then(|| now + self.config.expiry_timeout_ms);

        let entity = VectorEntity {
            id: generate_id(draft.geometry.kind(), now),
            owner: (&self.user).into(),
            geometry: draft.geometry,
            stroke: draft.stroke,
            opacity: draft.opacity,
            created_at: now,
            expires_at,
            permanent,
        };
        log::debug!("finalized {} ({})", entity.id, if permanent { "permanent" } else { "ephemeral" });

        self.layer.insert(entity.id.clone(), entity.render(&self.grid));
        if permanent {
            self.permanent.push(entity.clone());
            self.save_permanent();
        } else {
            self.ephemeral.push(entity.clone());
            self.last_created.insert(self.user.id.clone(), entity.id.clone());
            self.reschedule(now);
        }
        self.outgoing.push(DrawMessage::Created(entity.clone()));
        entity
    }

    /// Apply a `created` payload from a peer. Own and already-known entities are ignored.
    pub fn apply_remote(&mut self, entity: VectorEntity) -> bool {
        if entity.is_owned_by(&self.user.id) {
            return false;
        }
        self.reconstruct(entity)
    }

    /// Insert an entity rebuilt from its payload (remote message or store replay).
    ///
    /// Out-of-range stroke values are clamped; unbounded geometry is dropped.
    pub fn reconstruct(&mut self, entity: VectorEntity) -> bool {
        let id = entity.id.clone();
        let Some(entity) = entity.sanitized() else {
            log::warn!("dropping {}: non-finite stroke or unbounded geometry", id);
            return false;
        };
        if self.contains(&entity.id) {
            log::debug!("ignoring duplicate {}", entity.id);
            return false;
        }
        self.layer.insert(entity.id.clone(), entity.render(&self.grid));
        if entity.permanent {
            self.permanent.push(entity);
        } else {
            let tightens = entity.expires_at.is_some();
            self.ephemeral.push(entity);
            if tightens || self.next_sweep.is_none() {
                self.reschedule(self.clock.now());
            }
        }
        true
    }

    fn remove_ephemeral_where(&mut self, mut pred: impl FnMut(&VectorEntity) -> bool) -> usize {
        let now = self.clock.now();
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.ephemeral)
            .into_iter()
            .partition(|entity| pred(entity));
        self.ephemeral = kept;
        for entity in &removed {
            self.layer.fade_out(&entity.id, now);
        }
        if !removed.is_empty() {
            self.repair_undo_targets();
        }
        removed.len()
    }

    fn remove_permanent(&mut self, id: &str) -> Option<VectorEntity> {
        let index = self.permanent.iter().position(|entity| entity.id == id)?;
        let entity = self.permanent.remove(index);
        self.layer.fade_out(&entity.id, self.clock.now());
        Some(entity)
    }

    /// Point every owner's undo target at their newest remaining entity.
    fn repair_undo_targets(&mut self) {
        let ephemeral = &self.ephemeral;
        self.last_created.retain(|owner, id| {
            if ephemeral.iter().any(|entity| &entity.id == id) {
                return true;
            }
            match ephemeral
                .iter()
                .filter(|entity| &entity.owner.id == owner)
                .max_by_key(|entity| entity.created_at)
            {
                Some(newest) => {
                    *id = newest.id.clone();
                    true
                }
                None => false,
            }
        });
    }

    /// Undo the caller's most recent drawing.
    ///
    /// In permanent mode a moderator removes the last permanent entity;
    /// otherwise the caller's own last ephemeral entity is removed. Permanent
    /// mode means nothing for participants, matching [`Self::finalize`].
    pub fn undo(&mut self, permanent_mode: bool) -> Result<EntityId, DrawError> {
        if permanent_mode && self.user.is_privileged() {
            let id = self.permanent.last().map(|e| e.id.clone()).ok_or(DrawError::NothingToUndo)?;
            self.remove_permanent(&id);
            self.save_permanent();
            self.outgoing
                .push(DrawMessage::Deleted(Deletion::entity(self.user.id.clone(), id.clone(), true)));
            return Ok(id);
        }

        let id = self
            .last_created
            .get(&self.user.id)
            .cloned()
            .ok_or(DrawError::NothingToUndo)?;
        match self.ephemeral.iter().find(|entity| entity.id == id) {
            Some(entity) if !entity.is_owned_by(&self.user.id) => {
                return Err(DrawError::Unauthorized("undo another user's drawing".to_string()));
            }
            Some(_) => {}
            None => return Err(DrawError::NothingToUndo),
        }
        self.remove_ephemeral_where(|entity| entity.id == id);
        self.outgoing
            .push(DrawMessage::Deleted(Deletion::entity(self.user.id.clone(), id.clone(), false)));
        Ok(id)
    }

    /// Clear a scope. Returns how many entities were removed.
    pub fn clear(&mut self, scope: ClearScope) -> Result<usize, DrawError> {
        let removed = match scope {
            ClearScope::All => {
                self.require_privilege("clear all drawings")?;
                let removed = self.remove_ephemeral_where(|_| true);
                self.last_created.clear();
                self.outgoing
                    .push(DrawMessage::Deleted(Deletion::clear_all(self.user.id.clone())));
                removed
            }
            ClearScope::Mine => {
                let me = self.user.id.clone();
                let removed = self.remove_ephemeral_where(|entity| entity.owner.id == me);
                self.last_created.remove(&me);
                self.outgoing.push(DrawMessage::Deleted(Deletion::owned_by(me)));
                removed
            }
            ClearScope::Permanent => {
                self.require_privilege("clear permanent drawings")?;
                let removed = self.clear_permanent();
                self.store_write = Some(StoreWrite::Clear);
                self.outgoing.push(DrawMessage::PermanentCleared {
                    owner_id: self.user.id.clone(),
                });
                removed
            }
        };
        self.reschedule(self.clock.now());
        Ok(removed)
    }

    fn clear_permanent(&mut self) -> usize {
        let now = self.clock.now();
        let removed = std::mem::take(&mut self.permanent);
        for entity in &removed {
            self.layer.fade_out(&entity.id, now);
        }
        removed.len()
    }

    /// Delete one entity by id. Absent ids are a silent no-op (`Ok(false)`).
    ///
    /// Permanent entities need the moderator; ephemeral ones need the owner or the moderator.
    pub fn delete_by_id(&mut self, id: &str) -> Result<bool, DrawError> {
        if self.permanent.iter().any(|entity| entity.id == id) {
            self.require_privilege("delete permanent drawings")?;
            self.remove_permanent(id);
            self.save_permanent();
            self.outgoing
                .push(DrawMessage::Deleted(Deletion::entity(self.user.id.clone(), id, true)));
            return Ok(true);
        }

        let Some(entity) = self.ephemeral.iter().find(|entity| entity.id == id) else {
            return Ok(false);
        };
        if !entity.is_owned_by(&self.user.id) {
            self.require_privilege("delete another user's drawing")?;
        }
        self.remove_ephemeral_where(|entity| entity.id == id);
        self.outgoing
            .push(DrawMessage::Deleted(Deletion::entity(self.user.id.clone(), id, false)));
        Ok(true)
    }

    /// Apply a `deleted` payload from a peer. Returns how many entities were removed.
    pub fn apply_deletion(&mut self, deletion: &Deletion) -> usize {
        match (&deletion.entity_id, deletion.clear_all) {
            (Some(id), _) => {
                if self.remove_permanent(id).is_some() {
                    1
                } else {
                    self.remove_ephemeral_where(|entity| &entity.id == id)
                }
            }
            (None, true) => {
                let removed = self.remove_ephemeral_where(|_| true);
                self.last_created.clear();
                removed
            }
            (None, false) => {
                let owner = deletion.owner_id.as_str();
                self.remove_ephemeral_where(|entity| entity.owner.id == owner)
            }
        }
    }

    /// Apply a `permanentCleared` message. The store is left to the sender.
    pub fn apply_permanent_cleared(&mut self) -> usize {
        self.clear_permanent()
    }

    /// Route one inbound message. Returns whether anything changed.
    pub fn apply_message(&mut self, msg: DrawMessage) -> bool {
        match msg {
            DrawMessage::Created(entity) => self.apply_remote(entity),
            DrawMessage::Deleted(deletion) => self.apply_deletion(&deletion) > 0,
            DrawMessage::PermanentCleared { owner_id } => {
                log::debug!("permanent drawings cleared by {}", owner_id);
                self.apply_permanent_cleared() > 0
            }
        }
    }

    /// Whether this client removes `entity` at `now`.
    ///
    /// Own entities, and every entity for a moderator, go at `expires_at`.
    /// A participant keeps other users' entities for an extra grace period.
    fn is_due(&self, entity: &VectorEntity, now: Millis) -> bool {
        if self.user.is_privileged() || entity.is_owned_by(&self.user.id) {
            entity.is_expired(now)
        } else {
            now.checked_sub(self.config.soft_expiry_grace_ms)
                .is_some_and(|shifted| entity.is_expired(shifted))
        }
    }

    /// Remove expired ephemeral entities locally. Nothing is broadcast.
    pub fn sweep(&mut self) -> usize {
        let now = self.clock.now();
        let expired: Vec<EntityId> = self
            .ephemeral
            .iter()
            .filter(|entity| self.is_due(entity, now))
            .map(|entity| entity.id.clone())
            .collect();

        let removed = if expired.is_empty() {
            0
        } else {
            self.remove_ephemeral_where(|entity| expired.contains(&entity.id))
        };
        if removed > 0 {
            log::debug!("expired {} drawings", removed);
        }
        self.reschedule(now);
        removed
    }

    fn reschedule(&mut self, now: Millis) {
        let timed = self.ephemeral.iter().any(|entity| entity.expires_at.is_some());
        let interval = if timed {
            self.config.tight_sweep_interval_ms
        } else {
            self.config.sweep_interval_ms
        };
        let next = now + interval;
        self.next_sweep = Some(match self.next_sweep {
            Some(current) if current > now && current < next => current,
            _ => next,
        });
    }

    /// Run the sweep if due and advance fades. Returns how many entities expired.
    pub fn tick(&mut self) -> usize {
        let now = self.clock.now();
        let expired = match self.next_sweep {
            Some(due) if now >= due => self.sweep(),
            _ => 0,
        };
        self.layer.tick(now);
        expired
    }

    /// Drop every entity locally. Marks fade out; the store is not touched.
    pub fn teardown(&mut self) {
        let now = self.clock.now();
        self.layer.fade_out_all(now);
        self.ephemeral.clear();
        self.permanent.clear();
        self.last_created.clear();
        self.next_sweep = None;
        self.outgoing.clear();
    }
}
