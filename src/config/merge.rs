//! Deep merge of caller overrides over built-in defaults.
//!
//! # Rules
//! - Objects merge key by key, recursively.
//! - Scalars, arrays and `null` in the overlay replace the base value.
//! - Keys absent from the overlay keep the default.
//!
//! The session secret is not produced here: it is generated once by the
//! orchestrator and handed to [`OrchestratorConfig::defaults`].

use rand::rngs::OsRng;
use rand::RngCore;
use serde_json::Value;

use crate::config::schema::OrchestratorConfig;
use crate::error::{ConfigError, Result};

/// Number of random bytes in a generated session secret.
const SECRET_BYTES: usize = 32;

/// Merge `overlay` into `base` in place.
pub fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Fresh per-process session secret: OS randomness, hex-encoded.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

impl OrchestratorConfig {
    /// Deep-merge a partial configuration over `defaults`.
    ///
    /// `Value::Null` means "no overrides".
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the overrides are not an object or a
    /// merged field does not fit the schema.
    pub fn merged(defaults: &OrchestratorConfig, overrides: Value) -> Result<OrchestratorConfig> {
        let mut base =
            serde_json::to_value(defaults).map_err(|e| ConfigError::Parse(e.to_string()))?;

        match overrides {
            Value::Null => {}
            Value::Object(_) => merge_values(&mut base, overrides),
            other => {
                return Err(ConfigError::Parse(format!(
                    "overrides must be an object, got {other}"
                ))
                .into())
            }
        }

        let merged =
            serde_json::from_value(base).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(merged)
    }
}
