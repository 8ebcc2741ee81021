//! SQL for the `status_history` table.
//!
//! The functions take a plain `&Connection` so they run both on a store's
//! connection and inside a transaction (which derefs to one). The order store
//! uses them to write the history entry in the same transaction as the status
//! update.

use rusqlite::{params, Connection, OptionalExtension};

use super::{HistoryError, NewHistoryEntry, ScanData, StatusHistoryEntry};
use crate::db::{format_timestamp, parse_column, parse_timestamp, truncate};
use crate::order::OrderStatus;

const SELECT_COLUMNS: &str = "id, order_id, sequence, previous_status, new_status, changed_by, changed_by_type, scan_data, notes, changed_at";

pub(crate) fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS status_history (
            id TEXT PRIMARY KEY,
            order_id TEXT NOT NULL,
            sequence INTEGER NOT NULL,
            previous_status TEXT,
            new_status TEXT NOT NULL,
            changed_by TEXT NOT NULL,
            changed_by_type TEXT NOT NULL,
            scan_data TEXT,
            notes TEXT,
            changed_at TEXT NOT NULL,
            UNIQUE (order_id, sequence)
        );

        CREATE INDEX IF NOT EXISTS idx_status_history_order_id ON status_history(order_id, changed_at);
        CREATE INDEX IF NOT EXISTS idx_status_history_changed_by ON status_history(changed_by);
        "#,
    )
}

fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<StatusHistoryEntry> {
    let previous_status: Option<String> = row.get(3)?;
    let new_status: String = row.get(4)?;
    let changed_by_type: String = row.get(6)?;
    let scan_data_json: Option<String> = row.get(7)?;
    let changed_at: String = row.get(9)?;

    let scan_data = scan_data_json
        .map(|json| serde_json::from_str::<ScanData>(&json))
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(StatusHistoryEntry {
        id: row.get(0)?,
        order_id: row.get(1)?,
        sequence: row.get(2)?,
        previous_status: previous_status
            .map(|s| parse_column::<OrderStatus>(3, &s))
            .transpose()?,
        new_status: parse_column(4, &new_status)?,
        changed_by: row.get(5)?,
        changed_by_type: parse_column(6, &changed_by_type)?,
        scan_data,
        notes: row.get(8)?,
        changed_at: parse_timestamp(9, &changed_at)?,
    })
}

/// Insert one entry. The next sequence number is read in the same statement
/// scope, so callers must hold the connection exclusively (the stores do, via
/// their mutex).
pub(crate) fn insert_entry(
    conn: &Connection,
    entry: &NewHistoryEntry,
) -> Result<StatusHistoryEntry, HistoryError> {
    let sequence: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(sequence), 0) + 1 FROM status_history WHERE order_id = ?",
            params![entry.order_id],
            |row| row.get(0),
        )
        .map_err(|e| HistoryError::Database(e.to_string()))?;

    let scan_data_json = entry
        .scan_data
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| HistoryError::Serialization(e.to_string()))?;

    let id = uuid::Uuid::new_v4().to_string();
    let changed_at = truncate(entry.changed_at);

    conn.execute(
        "INSERT INTO status_history (id, order_id, sequence, previous_status, new_status, changed_by, changed_by_type, scan_data, notes, changed_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            id,
            entry.order_id,
            sequence,
            entry.previous_status.map(|s| s.as_str()),
            entry.new_status.as_str(),
            entry.changed_by,
            entry.changed_by_type.as_str(),
            scan_data_json,
            entry.notes,
            format_timestamp(&changed_at),
        ],
    )
    .map_err(|e| HistoryError::Database(e.to_string()))?;

    Ok(StatusHistoryEntry {
        id,
        order_id: entry.order_id.clone(),
        sequence,
        previous_status: entry.previous_status,
        new_status: entry.new_status,
        changed_by: entry.changed_by.clone(),
        changed_by_type: entry.changed_by_type,
        scan_data: entry.scan_data.clone(),
        notes: entry.notes.clone(),
        changed_at,
    })
}

pub(crate) fn select_for_order(
    conn: &Connection,
    order_id: &str,
) -> Result<Vec<StatusHistoryEntry>, HistoryError> {
    let sql = format!(
        "SELECT {} FROM status_history WHERE order_id = ? ORDER BY changed_at ASC, sequence ASC",
        SELECT_COLUMNS
    );

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| HistoryError::Database(e.to_string()))?;

    let rows = stmt
        .query_map(params![order_id], row_to_entry)
        .map_err(|e| HistoryError::Database(e.to_string()))?;

    let mut entries = Vec::new();
    for row_result in rows {
        entries.push(row_result.map_err(|e| HistoryError::Database(e.to_string()))?);
    }

    Ok(entries)
}

pub(crate) fn select_latest(
    conn: &Connection,
    order_id: &str,
) -> Result<Option<StatusHistoryEntry>, HistoryError> {
    let sql = format!(
        "SELECT {} FROM status_history WHERE order_id = ? ORDER BY changed_at DESC, sequence DESC LIMIT 1",
        SELECT_COLUMNS
    );

    conn.query_row(&sql, params![order_id], row_to_entry)
        .optional()
        .map_err(|e| HistoryError::Database(e.to_string()))
}

pub(crate) fn count_for_order(conn: &Connection, order_id: &str) -> Result<i64, HistoryError> {
    conn.query_row(
        "SELECT COUNT(*) FROM status_history WHERE order_id = ?",
        params![order_id],
        |row| row.get(0),
    )
    .map_err(|e| HistoryError::Database(e.to_string()))
}
