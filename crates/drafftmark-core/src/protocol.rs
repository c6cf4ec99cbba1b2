//! Draw messages and the replicator that moves them over a broadcast channel.

use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, VectorEntity};
use crate::identity::UserId;
use crate::sync::{BroadcastChannel, SyncError};

fn is_false(value: &bool) -> bool {
    !*value
}

/// Payload of a `deleted` message.
///
/// With an `entity_id` it removes that entity. Without one it removes every
/// ephemeral entity (`clear_all`) or every ephemeral entity of `owner_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deletion {
    pub owner_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub clear_all: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub permanent: bool,
}

impl Deletion {
    pub fn entity(owner_id: impl Into<UserId>, entity_id: impl Into<EntityId>, permanent: bool) -> Self {
        Self {
            owner_id: owner_id.into(),
            entity_id: Some(entity_id.into()),
            clear_all: false,
            permanent,
        }
    }

    pub fn owned_by(owner_id: impl Into<UserId>) -> Self {
        Self {
            owner_id: owner_id.into(),
            entity_id: None,
            clear_all: false,
            permanent: false,
        }
    }

    pub fn clear_all(owner_id: impl Into<UserId>) -> Self {
        Self {
            owner_id: owner_id.into(),
            entity_id: None,
            clear_all: true,
            permanent: false,
        }
    }
}

/// Message carried on the broadcast channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DrawMessage {
    Created(VectorEntity),
    Deleted(Deletion),
    PermanentCleared { owner_id: UserId },
}

impl DrawMessage {
    /// User that sent this message.
    pub fn origin(&self) -> &str {
        match self {
            DrawMessage::Created(entity) => &entity.owner.id,
            DrawMessage::Deleted(deletion) => &deletion.owner_id,
            DrawMessage::PermanentCleared { owner_id } => owner_id,
        }
    }

    pub fn encode(&self) -> Result<String, SyncError> {
        serde_json::to_string(self).map_err(|e| SyncError::Codec(e.to_string()))
    }

    pub fn decode(payload: &str) -> Result<Self, SyncError> {
        serde_json::from_str(payload).map_err(|e| SyncError::Codec(e.to_string()))
    }
}

/// Sends local mutations and yields remote ones, minus our own echoes.
pub struct Replicator {
    channel: Box<dyn BroadcastChannel>,
    local_user: UserId,
}

impl Replicator {
    pub fn new(channel: Box<dyn BroadcastChannel>, local_user: impl Into<UserId>) -> Self {
        Self {
            channel,
            local_user: local_user.into(),
        }
    }

    /// Fire and forget: failures are logged, never returned.
    pub fn broadcast(&mut self, msg: &DrawMessage) {
        let result = msg.encode().and_then(|payload| self.channel.send(&payload));
        if let Err(e) = result {
            log::error!("failed to broadcast draw message: {}", e);
        }
    }

    /// Decode everything received since the last poll.
    pub fn poll(&mut self) -> Vec<DrawMessage> {
        self.channel
            .poll()
            .into_iter()
            .filter_map(|payload| match DrawMessage::decode(&payload) {
                Ok(msg) if msg.origin() == self.local_user => {
                    log::debug!("ignoring own draw message");
                    None
                }
                Ok(msg) => Some(msg),
                Err(e) => {
                    log::warn!("dropping malformed draw message: {}", e);
                    None
                }
            })
            .collect()
    }
}
