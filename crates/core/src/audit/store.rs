use chrono::{DateTime, Utc};
use thiserror::Error;

use super::AuditRecord;
use crate::actor::{Actor, ActorType};

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Which operational events to read.
///
/// Every field narrows the result; `event_types` matches any of its members.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub order_id: Option<String>,
    pub event_types: Vec<String>,
    pub actor_id: Option<String>,
    /// Restrict to one tenant's events. Events without a tenant never match.
    pub forwarder_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

impl AuditFilter {
    pub fn new() -> Self {
        Self {
            limit: 100,
            offset: 0,
            ..Default::default()
        }
    }

    /// Events about one order (`order_created`, `status_changed`, ...).
    pub fn for_order(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }

    /// Add an event type to match. Repeated calls widen the set.
    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_types.push(event_type.into());
        self
    }

    pub fn by_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    pub fn for_forwarder(mut self, forwarder_id: impl Into<String>) -> Self {
        self.forwarder_id = Some(forwarder_id.into());
        self
    }

    /// Limit to what `actor` may read: actors belonging to a forwarder only
    /// see that forwarder's events. Staff without a forwarder operate the
    /// warehouses for every tenant and, like system callers, are unrestricted.
    pub fn scoped_to(mut self, actor: &Actor) -> Self {
        if actor.actor_type != ActorType::System {
            if let Some(ref forwarder_id) = actor.forwarder_id {
                self.forwarder_id = Some(forwarder_id.clone());
            }
        }
        self
    }

    pub fn with_time_range(
        mut self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Storage for the operational audit stream. Append and read only.
pub trait AuditStore: Send + Sync {
    /// Append a record, returning the id the store assigned.
    fn insert(&self, record: &AuditRecord) -> Result<i64, AuditError>;

    /// Matching records, newest first.
    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>, AuditError>;

    /// Number of matching records, ignoring `limit` and `offset`.
    fn count(&self, filter: &AuditFilter) -> Result<i64, AuditError>;
}
