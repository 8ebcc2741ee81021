use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::actor::{Actor, ActorType, Role};

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// Keys accepted when `method = "api_key"`.
    #[serde(default)]
    pub api_keys: Vec<ApiKeyEntry>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Trust actor headers set by an upstream gateway.
    None,
    /// Static API keys, each bound to one actor.
    ApiKey,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::None => "none",
            AuthMethod::ApiKey => "api_key",
        }
    }
}

/// One configured API key and the actor it authenticates as.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiKeyEntry {
    pub key: String,
    pub actor_id: String,
    pub actor_type: ActorType,
    /// Required for staff; forwarder and system keys get their fixed role.
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub forwarder_id: Option<String>,
    #[serde(default)]
    pub warehouse_ids: Vec<String>,
}

impl ApiKeyEntry {
    /// The actor requests made with this key act as.
    pub fn actor(&self) -> Actor {
        match self.actor_type {
            ActorType::Forwarder => {
                let mut actor = Actor::forwarder(self.actor_id.clone());
                if let Some(ref forwarder_id) = self.forwarder_id {
                    actor.forwarder_id = Some(forwarder_id.clone());
                }
                actor
            }
            ActorType::System => Actor::system(self.actor_id.clone()),
            ActorType::Staff => Actor {
                id: self.actor_id.clone(),
                actor_type: ActorType::Staff,
                role: self.role.unwrap_or(Role::Unrecognized),
                forwarder_id: self.forwarder_id.clone(),
                warehouse_ids: self.warehouse_ids.clone(),
            },
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite file holding orders, status history and audit events.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("parcelhub.db")
}

/// Operational audit stream configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuditConfig {
    /// Capacity of the channel between emitters and the writer task.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Emit `transition_rejected` events for refused status changes.
    #[serde(default = "default_true")]
    pub record_rejections: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            record_rejections: true,
        }
    }
}

fn default_buffer_size() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: String,
    /// Actors that have a key; the keys themselves are never shown.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub api_key_actors: Vec<String>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            auth: SanitizedAuthConfig {
                method: config.auth.method.as_str().to_string(),
                api_key_actors: config
                    .auth
                    .api_keys
                    .iter()
                    .map(|k| k.actor_id.clone())
                    .collect(),
            },
            server: config.server.clone(),
            database: config.database.clone(),
            audit: config.audit.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staff_key() -> ApiKeyEntry {
        ApiKeyEntry {
            key: "secret-staff-key".to_string(),
            actor_id: "worker-1".to_string(),
            actor_type: ActorType::Staff,
            role: Some(Role::WarehouseWorker),
            forwarder_id: Some("fwd-1".to_string()),
            warehouse_ids: vec!["wh-1".to_string()],
        }
    }

    #[test]
    fn test_staff_key_actor() {
        let actor = staff_key().actor();
        assert_eq!(actor.id, "worker-1");
        assert_eq!(actor.role, Role::WarehouseWorker);
        assert_eq!(actor.forwarder_id.as_deref(), Some("fwd-1"));
        assert_eq!(actor.warehouse_ids, vec!["wh-1".to_string()]);
    }

    #[test]
    fn test_forwarder_key_defaults_to_own_tenant() {
        let entry = ApiKeyEntry {
            key: "k".to_string(),
            actor_id: "fwd-9".to_string(),
            actor_type: ActorType::Forwarder,
            role: None,
            forwarder_id: None,
            warehouse_ids: vec![],
        };
        let actor = entry.actor();
        assert_eq!(actor.effective_role(), Role::Forwarder);
        assert_eq!(actor.forwarder_id.as_deref(), Some("fwd-9"));
    }

    #[test]
    fn test_sanitized_config_hides_keys() {
        let config = Config {
            auth: AuthConfig {
                method: AuthMethod::ApiKey,
                api_keys: vec![staff_key()],
            },
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            audit: AuditConfig::default(),
        };

        let json = serde_json::to_string(&SanitizedConfig::from(&config)).unwrap();
        assert!(json.contains("\"method\":\"api_key\""));
        assert!(json.contains("worker-1"));
        assert!(!json.contains("secret-staff-key"));
    }

    #[test]
    fn test_defaults() {
        let audit = AuditConfig::default();
        assert_eq!(audit.buffer_size, 1000);
        assert!(audit.record_rejections);
        assert_eq!(DatabaseConfig::default().path, PathBuf::from("parcelhub.db"));
        assert_eq!(ServerConfig::default().port, 8080);
    }
}
