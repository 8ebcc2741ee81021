use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;

use crate::actor::Actor;

/// Request information for authentication
#[derive(Debug, Clone)]
pub struct AuthRequest {
    /// Header names are lowercase.
    pub headers: HashMap<String, String>,
    pub source_ip: IpAddr,
}

impl AuthRequest {
    /// Header value, trimmed, if present and non-empty.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Authenticated identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    /// Who the request acts as.
    pub actor: Actor,
    /// Authentication method that produced the identity.
    pub method: String,
}

impl Identity {
    /// Identity for requests that carry no actor information. Its role is
    /// unrecognized, so it cannot change any order.
    pub fn anonymous() -> Self {
        Self {
            actor: Actor::anonymous(),
            method: "none".to_string(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.actor.id
    }
}
