//! User identity and role as provided by the host.

use serde::{Deserialize, Serialize};

/// Identifier of a connected user.
pub type UserId = String;

/// Role of a user within a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Privileged role: manages permanent drawings and may clear everyone's marks.
    Moderator,
    /// Ordinary participant.
    #[default]
    Participant,
}

/// A user as seen by the drawing layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub role: Role,
}

impl User {
    pub fn new(id: impl Into<UserId>, name: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
        }
    }

    /// Create a privileged user.
    pub fn moderator(id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self::new(id, name, Role::Moderator)
    }

    /// Create an ordinary participant.
    pub fn participant(id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self::new(id, name, Role::Participant)
    }

    pub fn is_privileged(&self) -> bool {
        self.role == Role::Moderator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles() {
        assert!(User::moderator("gm", "Game Master").is_privileged());
        assert!(!User::participant("p1", "Alice").is_privileged());
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&Role::Moderator).unwrap();
        assert_eq!(json, "\"moderator\"");
    }
}
