use thiserror::Error;

use super::{NewHistoryEntry, StatusHistoryEntry};

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Invalid order reference: {0:?}")]
    InvalidOrderId(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Append-only storage for status history entries.
///
/// Entries are never updated or deleted.
pub trait HistoryStore: Send + Sync {
    /// Append an entry, assigning its id and per-order sequence number.
    fn append(&self, entry: &NewHistoryEntry) -> Result<StatusHistoryEntry, HistoryError>;

    /// All entries for an order, oldest first.
    fn for_order(&self, order_id: &str) -> Result<Vec<StatusHistoryEntry>, HistoryError>;

    /// Most recent entry for an order.
    fn latest(&self, order_id: &str) -> Result<Option<StatusHistoryEntry>, HistoryError>;

    /// Number of entries recorded for an order.
    fn count_for_order(&self, order_id: &str) -> Result<i64, HistoryError>;
}
