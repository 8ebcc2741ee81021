use async_trait::async_trait;
use thiserror::Error;

use super::types::{AuthRequest, Identity};
use crate::actor::UnknownActorType;

/// Why a request could not be tied to an actor.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No credentials were presented where they are required.
    #[error("Authentication required")]
    NotAuthenticated,

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Credentials were accepted but describe an actor the order services
    /// cannot represent.
    #[error("Invalid actor: {0}")]
    InvalidActor(#[from] UnknownActorType),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl AuthError {
    /// Short label for the auth failure counter.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::NotAuthenticated => "not_authenticated",
            AuthError::InvalidCredentials(_) => "invalid_credentials",
            AuthError::InvalidActor(_) => "invalid_actor",
            AuthError::ConfigurationError(_) => "configuration_error",
        }
    }
}

/// Resolves the [`Actor`](crate::actor::Actor) a request acts as.
///
/// The order services never see credentials, only the actor an
/// authenticator produced; scoping and the status policy are applied to
/// that actor downstream.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Identify the caller. Requests that carry no actor resolve to the
    /// anonymous identity unless the method requires credentials.
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError>;

    /// Name recorded on the identity and in logs.
    fn method_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_actor_type_converts() {
        let err: AuthError = UnknownActorType("robot".to_string()).into();
        assert_eq!(err.reason(), "invalid_actor");
        assert_eq!(err.to_string(), "Invalid actor: Unknown actor type: robot");
    }
}
