//! Append-only status history (the audit trail of order status changes).

mod logger;
pub(crate) mod sqlite;
mod store;
mod types;

pub use logger::{
    entry_for, validate_order_ref, verify_entries, HistoryLogger, VerifyError, MAX_ORDER_REF_LEN,
};
pub use store::{HistoryError, HistoryStore};
pub use types::{ChainBreak, NewHistoryEntry, ScanData, ScanScope, StatusHistoryEntry};
