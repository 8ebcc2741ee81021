//! API Key authentication.

use async_trait::async_trait;

use super::{AuthError, AuthRequest, Authenticator, Identity};
use crate::actor::Actor;
use crate::config::ApiKeyEntry;

/// Authenticator that maps configured API keys to actors.
///
/// Accepts the key in either:
/// - `Authorization: Bearer <key>` header
/// - `X-API-Key: <key>` header
pub struct ApiKeyAuthenticator {
    keys: Vec<(String, Actor)>,
}

impl ApiKeyAuthenticator {
    pub fn new(entries: &[ApiKeyEntry]) -> Self {
        Self {
            keys: entries
                .iter()
                .map(|entry| (entry.key.clone(), entry.actor()))
                .collect(),
        }
    }

    fn extract_key(request: &AuthRequest) -> Option<&str> {
        if let Some(auth_header) = request.header("authorization") {
            if let Some(key) = auth_header
                .strip_prefix("Bearer ")
                .or_else(|| auth_header.strip_prefix("bearer "))
            {
                return Some(key.trim());
            }
        }

        request.header("x-api-key")
    }
}

#[async_trait]
impl Authenticator for ApiKeyAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        let provided = Self::extract_key(request).ok_or(AuthError::NotAuthenticated)?;

        // Compare against every key so timing does not reveal which one matched.
        let mut matched: Option<&Actor> = None;
        for (key, actor) in &self.keys {
            if constant_time_eq(provided.as_bytes(), key.as_bytes()) && matched.is_none() {
                matched = Some(actor);
            }
        }

        matched
            .map(|actor| Identity {
                actor: actor.clone(),
                method: "api_key".to_string(),
            })
            .ok_or_else(|| AuthError::InvalidCredentials("Invalid API key".to_string()))
    }

    fn method_name(&self) -> &'static str {
        "api_key"
    }
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
