use async_trait::async_trait;

use super::{AuthError, AuthRequest, Authenticator, Identity};
use crate::actor::{Actor, ActorType, Role};

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_TYPE_HEADER: &str = "x-actor-type";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";
pub const ACTOR_FORWARDER_HEADER: &str = "x-actor-forwarder";
/// Comma-separated warehouse ids.
pub const ACTOR_WAREHOUSES_HEADER: &str = "x-actor-warehouses";

/// Authenticator that performs no authentication.
///
/// The actor is taken as-is from `x-actor-*` headers, which an upstream
/// gateway owning user sessions is expected to set. Requests without an
/// actor id are anonymous. Must be explicitly configured.
pub struct NoneAuthenticator;

impl NoneAuthenticator {
    pub fn new() -> Self {
        Self
    }

    fn actor_from_headers(request: &AuthRequest) -> Result<Option<Actor>, AuthError> {
        let Some(id) = request.header(ACTOR_ID_HEADER) else {
            return Ok(None);
        };

        let actor_type = match request.header(ACTOR_TYPE_HEADER) {
            Some(raw) => raw.parse::<ActorType>()?,
            None => ActorType::Staff,
        };

        let mut actor = match actor_type {
            ActorType::Forwarder => Actor::forwarder(id),
            ActorType::System => Actor::system(id),
            ActorType::Staff => {
                let role = request
                    .header(ACTOR_ROLE_HEADER)
                    .map(Role::parse)
                    .unwrap_or(Role::Unrecognized);
                let warehouses = request
                    .header(ACTOR_WAREHOUSES_HEADER)
                    .map(|raw| {
                        raw.split(',')
                            .map(str::trim)
                            .filter(|w| !w.is_empty())
                            .map(String::from)
                            .collect()
                    })
                    .unwrap_or_default();
                Actor::staff(id, role, warehouses)
            }
        };

        if let Some(forwarder) = request.header(ACTOR_FORWARDER_HEADER) {
            actor.forwarder_id = Some(forwarder.to_string());
        }

        Ok(Some(actor))
    }
}

impl Default for NoneAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Authenticator for NoneAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        Ok(match Self::actor_from_headers(request)? {
            Some(actor) => Identity {
                actor,
                method: "none".to_string(),
            },
            None => Identity::anonymous(),
        })
    }

    fn method_name(&self) -> &'static str {
        "none"
    }
}
