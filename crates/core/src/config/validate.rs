use std::collections::HashSet;

use super::{types::Config, AuthMethod, ConfigError};
use crate::actor::ActorType;

/// Validate configuration beyond what deserialization enforces:
/// - server port is not 0
/// - the api_key method has at least one key
/// - keys are non-empty and unique
/// - staff keys carry a staff role
/// - the audit buffer is not empty
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.auth.method == AuthMethod::ApiKey && config.auth.api_keys.is_empty() {
        return Err(ConfigError::ValidationError(
            "auth.method = \"api_key\" requires at least one [[auth.api_keys]] entry".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for entry in &config.auth.api_keys {
        if entry.key.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "api key for actor '{}' is empty",
                entry.actor_id
            )));
        }
        if !seen.insert(entry.key.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "api key for actor '{}' is used more than once",
                entry.actor_id
            )));
        }
        if entry.actor_type == ActorType::Staff && !entry.role.is_some_and(|r| r.is_staff_role()) {
            return Err(ConfigError::ValidationError(format!(
                "staff api key for actor '{}' needs a staff role (warehouse_worker, supervisor or manager)",
                entry.actor_id
            )));
        }
    }

    if config.audit.buffer_size == 0 {
        return Err(ConfigError::ValidationError(
            "audit.buffer_size must be greater than 0".to_string(),
        ));
    }

    Ok(())
}
