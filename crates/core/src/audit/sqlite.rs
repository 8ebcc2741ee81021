use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection};

use super::{AuditError, AuditEvent, AuditFilter, AuditRecord, AuditStore};
use crate::db::{format_timestamp, parse_timestamp};

/// SQLite-backed audit store
pub struct SqliteAuditStore {
    conn: Mutex<Connection>,
}

impl SqliteAuditStore {
    /// Open (or create) the database file and the `audit_events` table.
    ///
    /// The table can share a file with the order store.
    pub fn new(path: &Path) -> Result<Self, AuditError> {
        let conn = Connection::open(path).map_err(|e| AuditError::Database(e.to_string()))?;
        Self::from_connection(conn)
    }

    /// Create an in-memory SQLite audit store (useful for testing)
    pub fn in_memory() -> Result<Self, AuditError> {
        let conn = Connection::open_in_memory().map_err(|e| AuditError::Database(e.to_string()))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, AuditError> {
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(|e| AuditError::Database(e.to_string()))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS audit_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_type TEXT NOT NULL,
                order_id TEXT,
                actor_id TEXT,
                forwarder_id TEXT,
                data TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_audit_events_timestamp ON audit_events(timestamp);
            CREATE INDEX IF NOT EXISTS idx_audit_events_order_id ON audit_events(order_id);
            CREATE INDEX IF NOT EXISTS idx_audit_events_event_type ON audit_events(event_type);
            CREATE INDEX IF NOT EXISTS idx_audit_events_actor_id ON audit_events(actor_id);
            CREATE INDEX IF NOT EXISTS idx_audit_events_forwarder_id ON audit_events(forwarder_id);
            "#,
        )
        .map_err(|e| AuditError::Database(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, AuditError> {
        self.conn
            .lock()
            .map_err(|_| AuditError::Database("connection lock poisoned".to_string()))
    }

    fn build_where_clause(filter: &AuditFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions: Vec<String> = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref order_id) = filter.order_id {
            conditions.push("order_id = ?".to_string());
            params.push(Box::new(order_id.clone()));
        }

        if !filter.event_types.is_empty() {
            let placeholders = vec!["?"; filter.event_types.len()].join(", ");
            conditions.push(format!("event_type IN ({})", placeholders));
            for event_type in &filter.event_types {
                params.push(Box::new(event_type.clone()));
            }
        }

        if let Some(ref actor_id) = filter.actor_id {
            conditions.push("actor_id = ?".to_string());
            params.push(Box::new(actor_id.clone()));
        }

        if let Some(ref forwarder_id) = filter.forwarder_id {
            conditions.push("forwarder_id = ?".to_string());
            params.push(Box::new(forwarder_id.clone()));
        }

        if let Some(ref from) = filter.from {
            conditions.push("timestamp >= ?".to_string());
            params.push(Box::new(format_timestamp(from)));
        }

        if let Some(ref to) = filter.to {
            conditions.push("timestamp <= ?".to_string());
            params.push(Box::new(format_timestamp(to)));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<AuditRecord> {
        let timestamp: String = row.get(1)?;
        let data_json: String = row.get(6)?;

        let data: AuditEvent = serde_json::from_str(&data_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(AuditRecord {
            id: row.get(0)?,
            timestamp: parse_timestamp(1, &timestamp)?,
            event_type: row.get(2)?,
            order_id: row.get(3)?,
            actor_id: row.get(4)?,
            forwarder_id: row.get(5)?,
            data,
        })
    }
}

impl AuditStore for SqliteAuditStore {
    fn insert(&self, record: &AuditRecord) -> Result<i64, AuditError> {
        let conn = self.lock()?;

        let data_json = serde_json::to_string(&record.data)
            .map_err(|e| AuditError::Serialization(e.to_string()))?;

        conn.execute(
            "INSERT INTO audit_events (timestamp, event_type, order_id, actor_id, forwarder_id, data) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                format_timestamp(&record.timestamp),
                record.event_type,
                record.order_id,
                record.actor_id,
                record.forwarder_id,
                data_json,
            ],
        )
        .map_err(|e| AuditError::Database(e.to_string()))?;

        Ok(conn.last_insert_rowid())
    }

    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>, AuditError> {
        let conn = self.lock()?;

        let (where_clause, mut params) = Self::build_where_clause(filter);
        let sql = format!(
            "SELECT id, timestamp, event_type, order_id, actor_id, forwarder_id, data FROM audit_events {} ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?",
            where_clause
        );
        params.push(Box::new(filter.limit));
        params.push(Box::new(filter.offset));

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| AuditError::Database(e.to_string()))?;

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_record)
            .map_err(|e| AuditError::Database(e.to_string()))?;

        let mut records = Vec::new();
        for row_result in rows {
            records.push(row_result.map_err(|e| AuditError::Database(e.to_string()))?);
        }

        Ok(records)
    }

    fn count(&self, filter: &AuditFilter) -> Result<i64, AuditError> {
        let conn = self.lock()?;

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM audit_events {}", where_clause);

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| AuditError::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn create_test_store() -> SqliteAuditStore {
        SqliteAuditStore::in_memory().unwrap()
    }

    fn record(event: AuditEvent) -> AuditRecord {
        AuditRecord::new(Utc::now(), event)
    }

    fn created(order_id: &str, actor: &str) -> AuditRecord {
        record(AuditEvent::OrderCreated {
            order_id: order_id.to_string(),
            created_by: actor.to_string(),
            forwarder_id: actor.to_string(),
            warehouse_id: "wh-1".to_string(),
            tracking_number: format!("PH{}", order_id),
        })
    }

    fn started() -> AuditRecord {
        record(AuditEvent::ServiceStarted {
            version: "0.1.0".to_string(),
            config_hash: "abc123".to_string(),
        })
    }

    #[test]
    fn test_insert_and_query_round_trips_event() {
        let store = create_test_store();
        let original = created("o-1", "fwd-1");

        let id = store.insert(&original).unwrap();
        assert!(id > 0);

        let results = store.query(&AuditFilter::new()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, id);
        assert_eq!(results[0].event_type, "order_created");
        assert_eq!(results[0].data, original.data);
    }

    #[test]
    fn test_filters() {
        let store = create_test_store();
        store.insert(&started()).unwrap();
        store.insert(&created("o-1", "fwd-1")).unwrap();
        store.insert(&created("o-2", "fwd-1")).unwrap();
        store.insert(&created("o-3", "fwd-2")).unwrap();

        let by_type = AuditFilter::new().with_event_type("order_created");
        assert_eq!(store.query(&by_type).unwrap().len(), 3);

        let by_order = AuditFilter::new().for_order("o-2");
        let results = store.query(&by_order).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].order_id.as_deref(), Some("o-2"));

        let by_actor = AuditFilter::new().by_actor("fwd-1");
        assert_eq!(store.count(&by_actor).unwrap(), 2);

        let any_of = AuditFilter::new()
            .with_event_type("service_started")
            .with_event_type("order_created");
        assert_eq!(store.count(&any_of).unwrap(), 4);
    }

    #[test]
    fn test_forwarder_scope_excludes_other_tenants_and_service_events() {
        let store = create_test_store();
        store.insert(&started()).unwrap();
        store.insert(&created("o-1", "fwd-1")).unwrap();
        store.insert(&created("o-2", "fwd-2")).unwrap();

        let results = store
            .query(&AuditFilter::new().for_forwarder("fwd-1"))
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].order_id.as_deref(), Some("o-1"));
        assert_eq!(results[0].forwarder_id.as_deref(), Some("fwd-1"));
    }

    #[test]
    fn test_query_with_time_range() {
        let store = create_test_store();
        let now = Utc::now();

        let mut old = started();
        old.timestamp = now - Duration::hours(2);
        store.insert(&old).unwrap();
        store.insert(&started()).unwrap();

        let filter = AuditFilter::new().with_time_range(Some(now - Duration::hours(1)), None);
        assert_eq!(store.query(&filter).unwrap().len(), 1);
    }

    #[test]
    fn test_newest_first_with_pagination() {
        let store = create_test_store();
        let base = Utc::now();

        for i in 0..5 {
            let mut r = created(&format!("o-{}", i), "fwd-1");
            r.timestamp = base + Duration::seconds(i);
            store.insert(&r).unwrap();
        }

        let page = store
            .query(&AuditFilter::new().with_limit(2).with_offset(0))
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].order_id.as_deref(), Some("o-4"));

        let last = store
            .query(&AuditFilter::new().with_limit(2).with_offset(4))
            .unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].order_id.as_deref(), Some("o-0"));
        assert_eq!(store.count(&AuditFilter::new()).unwrap(), 5);
    }

    #[test]
    fn test_file_based_store_shares_database() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("parcelhub.db");

        let orders = crate::order::SqliteOrderStore::new(&db_path).unwrap();
        let store = SqliteAuditStore::new(&db_path).unwrap();
        store.insert(&started()).unwrap();
        drop(orders);

        let reopened = SqliteAuditStore::new(&db_path).unwrap();
        assert_eq!(reopened.count(&AuditFilter::new()).unwrap(), 1);
    }
}
