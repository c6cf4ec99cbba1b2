//! Session configuration.

use serde::{Deserialize, Serialize};

use crate::clock::Millis;

/// Default lifetime of a timed-erase drawing.
pub const DEFAULT_EXPIRY_TIMEOUT_MS: Millis = 30_000;

/// Sweep cadence when no drawing carries an expiration.
pub const DEFAULT_SWEEP_INTERVAL_MS: Millis = 10_000;

/// Sweep cadence while at least one drawing carries an expiration.
pub const DEFAULT_TIGHT_SWEEP_INTERVAL_MS: Millis = 1_000;

/// Length of the removal fade.
pub const DEFAULT_FADE_DURATION_MS: Millis = 300;

/// Deferral a non-privileged viewer applies to other users' expired drawings.
pub const DEFAULT_SOFT_EXPIRY_GRACE_MS: Millis = 2_000;

/// Key of the permanent drawing list inside the scene store.
pub const DEFAULT_STORE_KEY: &str = "permanent-drawings";

/// Tunables for a drawing session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionConfig {
    pub expiry_timeout_ms: Millis,
    pub sweep_interval_ms: Millis,
    pub tight_sweep_interval_ms: Millis,
    pub fade_duration_ms: Millis,
    pub soft_expiry_grace_ms: Millis,
    pub store_key: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expiry_timeout_ms: DEFAULT_EXPIRY_TIMEOUT_MS,
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS,
            tight_sweep_interval_ms: DEFAULT_TIGHT_SWEEP_INTERVAL_MS,
            fade_duration_ms: DEFAULT_FADE_DURATION_MS,
            soft_expiry_grace_ms: DEFAULT_SOFT_EXPIRY_GRACE_MS,
            store_key: DEFAULT_STORE_KEY.to_string(),
        }
    }
}

impl SessionConfig {
    /// Parse a configuration from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = SessionConfig::from_json(r#"{"expiryTimeoutMs": 500}"#).unwrap();
        assert_eq!(config.expiry_timeout_ms, 500);
        assert_eq!(config.fade_duration_ms, DEFAULT_FADE_DURATION_MS);
        assert_eq!(config.store_key, DEFAULT_STORE_KEY);
    }
}
