use std::sync::Arc;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use tracing::debug;

use super::{
    ChainBreak, HistoryError, HistoryStore, NewHistoryEntry, ScanData, StatusHistoryEntry,
};
use crate::actor::Actor;
use crate::order::OrderStatus;

/// Longest order reference accepted into the history.
pub const MAX_ORDER_REF_LEN: usize = 256;

static CONTROL_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x00-\x1f\x7f]").expect("valid regex"));

/// Check an order reference before it is written to the history.
///
/// Unresolved scans store the raw scanned value as the order reference, so
/// this only rules out values that cannot be displayed or indexed sensibly.
pub fn validate_order_ref(order_id: &str) -> Result<(), HistoryError> {
    if order_id.trim().is_empty()
        || order_id.len() > MAX_ORDER_REF_LEN
        || CONTROL_CHARS.is_match(order_id)
    {
        return Err(HistoryError::InvalidOrderId(order_id.to_string()));
    }
    Ok(())
}

/// Build an entry attributed to `actor`, stamped with `changed_at`.
pub fn entry_for(
    order_id: &str,
    previous_status: Option<OrderStatus>,
    new_status: OrderStatus,
    actor: &Actor,
    scan_data: Option<ScanData>,
    notes: Option<String>,
    changed_at: DateTime<Utc>,
) -> NewHistoryEntry {
    NewHistoryEntry {
        order_id: order_id.to_string(),
        previous_status,
        new_status,
        changed_by: actor.id.clone(),
        changed_by_type: actor.actor_type,
        scan_data,
        notes,
        changed_at,
    }
}

/// Writes and reads the status audit trail.
pub struct HistoryLogger {
    store: Arc<dyn HistoryStore>,
}

impl HistoryLogger {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    /// Append one history entry stamped with the current time.
    ///
    /// Normal transitions go through [`crate::OrderStore::commit_transition`],
    /// which appends inside the status update transaction. This is for entries
    /// that have no order row to update, such as scans of unknown codes.
    pub fn log_transition(
        &self,
        order_id: &str,
        previous_status: Option<OrderStatus>,
        new_status: OrderStatus,
        actor: &Actor,
        scan_data: Option<ScanData>,
        notes: Option<String>,
    ) -> Result<StatusHistoryEntry, HistoryError> {
        validate_order_ref(order_id)?;

        let entry = entry_for(
            order_id,
            previous_status,
            new_status,
            actor,
            scan_data,
            notes,
            Utc::now(),
        );
        let stored = self.store.append(&entry)?;

        debug!(
            order_id = %stored.order_id,
            sequence = stored.sequence,
            new_status = %stored.new_status,
            changed_by = %stored.changed_by,
            "History entry appended"
        );

        Ok(stored)
    }

    /// Full history for an order, oldest first. Unknown orders yield an
    /// empty list.
    pub fn get_history(&self, order_id: &str) -> Result<Vec<StatusHistoryEntry>, HistoryError> {
        self.store.for_order(order_id)
    }

    pub fn latest(&self, order_id: &str) -> Result<Option<StatusHistoryEntry>, HistoryError> {
        self.store.latest(order_id)
    }

    pub fn count(&self, order_id: &str) -> Result<i64, HistoryError> {
        self.store.count_for_order(order_id)
    }

    /// Replay an order's history and check that each entry starts where the
    /// previous one ended. Returns the final status, or `None` for an empty
    /// history.
    pub fn verify_chain(&self, order_id: &str) -> Result<Option<OrderStatus>, VerifyError> {
        let entries = self.store.for_order(order_id)?;
        Ok(verify_entries(&entries)?)
    }
}

/// Error returned by [`HistoryLogger::verify_chain`].
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error(transparent)]
    Store(#[from] HistoryError),

    #[error(transparent)]
    Broken(#[from] ChainBreak),
}

/// Check that `entries` (oldest first) form an unbroken chain.
pub fn verify_entries(entries: &[StatusHistoryEntry]) -> Result<Option<OrderStatus>, ChainBreak> {
    let mut current: Option<OrderStatus> = None;

    for (idx, entry) in entries.iter().enumerate() {
        // The creation entry is the only one allowed to start from nothing.
        let expected = if idx == 0 { None } else { current };
        if entry.previous_status != expected {
            return Err(ChainBreak {
                sequence: entry.sequence,
                expected,
                found: entry.previous_status,
            });
        }
        current = Some(entry.new_status);
    }

    Ok(current)
}
