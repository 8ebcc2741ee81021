//! SQLite-backed order store.
//!
//! Orders and their status history live in the same database so that a
//! status change and its history entry commit in one transaction.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use super::{
    CreateOrderRequest, Milestones, Order, OrderError, OrderFilter, OrderStatus, OrderStore,
    StatusUpdate,
};
use crate::db::{self, format_timestamp, parse_column, parse_timestamp};
use crate::history::{
    self, HistoryError, HistoryStore, NewHistoryEntry, StatusHistoryEntry,
};

const SELECT_COLUMNS: &str = "id, status, forwarder_id, warehouse_id, customer_id, tracking_number, courier, courier_tracking_number, description, received_at, packed_at, shipped_at, delivered_at, version, created_at, updated_at";

/// Note attached to the history entry written when an order is created.
pub const CREATION_NOTE: &str = "order created";

/// SQLite-backed order and status history store.
pub struct SqliteOrderStore {
    conn: Mutex<Connection>,
}

impl SqliteOrderStore {
    /// Open (or create) the database file and its tables.
    pub fn new(path: &Path) -> Result<Self, OrderError> {
        let conn = Connection::open(path).map_err(|e| OrderError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, OrderError> {
        let conn =
            Connection::open_in_memory().map_err(|e| OrderError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), OrderError> {
        // File-backed databases are shared with other processes in tests and
        // tooling; wait for locks instead of failing immediately.
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(|e| OrderError::Database(e.to_string()))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                forwarder_id TEXT NOT NULL,
                warehouse_id TEXT NOT NULL,
                customer_id TEXT NOT NULL,
                tracking_number TEXT NOT NULL UNIQUE,
                courier TEXT,
                courier_tracking_number TEXT,
                description TEXT,
                received_at TEXT,
                packed_at TEXT,
                shipped_at TEXT,
                delivered_at TEXT,
                version INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status);
            CREATE INDEX IF NOT EXISTS idx_orders_warehouse_id ON orders(warehouse_id);
            CREATE INDEX IF NOT EXISTS idx_orders_forwarder_id ON orders(forwarder_id);
            CREATE INDEX IF NOT EXISTS idx_orders_created_at ON orders(created_at DESC);
            "#,
        )
        .map_err(|e| OrderError::Database(e.to_string()))?;

        history::sqlite::initialize_schema(conn).map_err(|e| OrderError::Database(e.to_string()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, OrderError> {
        self.conn
            .lock()
            .map_err(|_| OrderError::Database("connection lock poisoned".to_string()))
    }

    fn lock_history(&self) -> Result<MutexGuard<'_, Connection>, HistoryError> {
        self.conn
            .lock()
            .map_err(|_| HistoryError::Database("connection lock poisoned".to_string()))
    }

    fn build_where_clause(filter: &OrderFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions: Vec<String> = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?".to_string());
            params.push(Box::new(status.as_str()));
        }

        if let Some(ref warehouse_id) = filter.warehouse_id {
            conditions.push("warehouse_id = ?".to_string());
            params.push(Box::new(warehouse_id.clone()));
        }

        if let Some(ref forwarder_id) = filter.forwarder_id {
            conditions.push("forwarder_id = ?".to_string());
            params.push(Box::new(forwarder_id.clone()));
        }

        if let Some(ref customer_id) = filter.customer_id {
            conditions.push("customer_id = ?".to_string());
            params.push(Box::new(customer_id.clone()));
        }

        if let Some(ref warehouse_ids) = filter.warehouse_ids {
            if warehouse_ids.is_empty() {
                conditions.push("0".to_string());
            } else {
                conditions.push(format!(
                    "warehouse_id IN ({})",
                    vec!["?"; warehouse_ids.len()].join(", ")
                ));
                for id in warehouse_ids {
                    params.push(Box::new(id.clone()));
                }
            }
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn row_to_order(row: &rusqlite::Row) -> rusqlite::Result<Order> {
        let status: String = row.get(1)?;
        let created_at: String = row.get(14)?;
        let updated_at: String = row.get(15)?;

        let optional_ts = |idx: usize| -> rusqlite::Result<_> {
            row.get::<_, Option<String>>(idx)?
                .map(|raw| parse_timestamp(idx, &raw))
                .transpose()
        };

        Ok(Order {
            id: row.get(0)?,
            status: parse_column(1, &status)?,
            forwarder_id: row.get(2)?,
            warehouse_id: row.get(3)?,
            customer_id: row.get(4)?,
            tracking_number: row.get(5)?,
            courier: row.get(6)?,
            courier_tracking_number: row.get(7)?,
            description: row.get(8)?,
            milestones: Milestones {
                received_at: optional_ts(9)?,
                packed_at: optional_ts(10)?,
                shipped_at: optional_ts(11)?,
                delivered_at: optional_ts(12)?,
            },
            version: row.get(13)?,
            created_at: parse_timestamp(14, &created_at)?,
            updated_at: parse_timestamp(15, &updated_at)?,
        })
    }

    fn select_order(conn: &Connection, id: &str) -> Result<Option<Order>, OrderError> {
        let sql = format!("SELECT {} FROM orders WHERE id = ?", SELECT_COLUMNS);
        conn.query_row(&sql, params![id], Self::row_to_order)
            .optional()
            .map_err(|e| OrderError::Database(e.to_string()))
    }
}

/// Generate a tracking number: `PH` followed by ten uppercase hex digits.
pub fn generate_tracking_number() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string().to_uppercase();
    format!("PH{}", &hex[..10])
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

impl OrderStore for SqliteOrderStore {
    fn create(&self, request: CreateOrderRequest) -> Result<Order, OrderError> {
        let mut conn = self.lock()?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = db::now();
        let tracking_number = request
            .tracking_number
            .clone()
            .unwrap_or_else(generate_tracking_number);

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| OrderError::Database(e.to_string()))?;

        tx.execute(
            "INSERT INTO orders (id, status, forwarder_id, warehouse_id, customer_id, tracking_number, description, version, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?)",
            params![
                id,
                OrderStatus::Incoming.as_str(),
                request.forwarder_id,
                request.warehouse_id,
                request.customer_id,
                tracking_number,
                request.description,
                format_timestamp(&now),
                format_timestamp(&now),
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                OrderError::DuplicateTrackingNumber(tracking_number.clone())
            } else {
                OrderError::Database(e.to_string())
            }
        })?;

        history::sqlite::insert_entry(
            &tx,
            &NewHistoryEntry {
                order_id: id.clone(),
                previous_status: None,
                new_status: OrderStatus::Incoming,
                changed_by: request.created_by.clone(),
                changed_by_type: request.created_by_type,
                scan_data: None,
                notes: Some(CREATION_NOTE.to_string()),
                changed_at: now,
            },
        )?;

        tx.commit()
            .map_err(|e| OrderError::Database(e.to_string()))?;

        Ok(Order {
            id,
            status: OrderStatus::Incoming,
            forwarder_id: request.forwarder_id,
            warehouse_id: request.warehouse_id,
            customer_id: request.customer_id,
            tracking_number,
            courier: None,
            courier_tracking_number: None,
            description: request.description,
            milestones: Milestones::default(),
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }

    fn get(&self, id: &str) -> Result<Option<Order>, OrderError> {
        let conn = self.lock()?;
        Self::select_order(&conn, id)
    }

    fn find_by_tracking_number(
        &self,
        tracking_number: &str,
    ) -> Result<Option<Order>, OrderError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM orders WHERE tracking_number = ?",
            SELECT_COLUMNS
        );
        conn.query_row(&sql, params![tracking_number], Self::row_to_order)
            .optional()
            .map_err(|e| OrderError::Database(e.to_string()))
    }

    fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, OrderError> {
        let conn = self.lock()?;

        let (where_clause, mut params) = Self::build_where_clause(filter);
        let sql = format!(
            "SELECT {} FROM orders {} ORDER BY created_at DESC, id ASC LIMIT ? OFFSET ?",
            SELECT_COLUMNS, where_clause
        );
        params.push(Box::new(filter.limit));
        params.push(Box::new(filter.offset));

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| OrderError::Database(e.to_string()))?;

        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt
            .query_map(params_refs.as_slice(), Self::row_to_order)
            .map_err(|e| OrderError::Database(e.to_string()))?;

        let mut orders = Vec::new();
        for row_result in rows {
            orders.push(row_result.map_err(|e| OrderError::Database(e.to_string()))?);
        }

        Ok(orders)
    }

    fn count(&self, filter: &OrderFilter) -> Result<i64, OrderError> {
        let conn = self.lock()?;

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM orders {}", where_clause);

        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        conn.query_row(&sql, params_refs.as_slice(), |row| row.get(0))
            .map_err(|e| OrderError::Database(e.to_string()))
    }

    fn commit_transition(
        &self,
        update: &StatusUpdate,
    ) -> Result<(Order, StatusHistoryEntry), OrderError> {
        let mut conn = self.lock()?;

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| OrderError::Database(e.to_string()))?;

        let mut order = Self::select_order(&tx, &update.order_id)?
            .ok_or_else(|| OrderError::NotFound(update.order_id.clone()))?;

        if order.version != update.expected_version {
            return Err(OrderError::VersionConflict {
                order_id: update.order_id.clone(),
                expected_version: update.expected_version,
            });
        }

        let changed_at = db::truncate(update.entry.changed_at);
        if let Some(milestone) = update.entry.new_status.milestone() {
            order.milestones.record(milestone, changed_at);
        }

        let ts = |t: Option<chrono::DateTime<Utc>>| t.as_ref().map(format_timestamp);
        let updated = tx
            .execute(
                "UPDATE orders SET status = ?, received_at = ?, packed_at = ?, shipped_at = ?, delivered_at = ?, version = version + 1, updated_at = ? WHERE id = ? AND version = ?",
                params![
                    update.entry.new_status.as_str(),
                    ts(order.milestones.received_at),
                    ts(order.milestones.packed_at),
                    ts(order.milestones.shipped_at),
                    ts(order.milestones.delivered_at),
                    format_timestamp(&changed_at),
                    update.order_id,
                    update.expected_version,
                ],
            )
            .map_err(|e| OrderError::Database(e.to_string()))?;

        if updated == 0 {
            return Err(OrderError::VersionConflict {
                order_id: update.order_id.clone(),
                expected_version: update.expected_version,
            });
        }

        // Dropping `tx` on an error path rolls back the status update.
        let entry = history::sqlite::insert_entry(&tx, &update.entry)?;

        tx.commit()
            .map_err(|e| OrderError::Database(e.to_string()))?;

        order.status = update.entry.new_status;
        order.version += 1;
        order.updated_at = changed_at;

        Ok((order, entry))
    }

    fn assign_courier(
        &self,
        id: &str,
        courier: &str,
        courier_tracking_number: Option<&str>,
    ) -> Result<Order, OrderError> {
        let conn = self.lock()?;
        let now = db::now();

        let updated = conn
            .execute(
                "UPDATE orders SET courier = ?, courier_tracking_number = ?, updated_at = MAX(updated_at, ?) WHERE id = ?",
                params![courier, courier_tracking_number, format_timestamp(&now), id],
            )
            .map_err(|e| OrderError::Database(e.to_string()))?;

        if updated == 0 {
            return Err(OrderError::NotFound(id.to_string()));
        }

        Self::select_order(&conn, id)?.ok_or_else(|| OrderError::NotFound(id.to_string()))
    }
}

impl HistoryStore for SqliteOrderStore {
    fn append(&self, entry: &NewHistoryEntry) -> Result<StatusHistoryEntry, HistoryError> {
        let conn = self.lock_history()?;
        history::sqlite::insert_entry(&conn, entry)
    }

    fn for_order(&self, order_id: &str) -> Result<Vec<StatusHistoryEntry>, HistoryError> {
        let conn = self.lock_history()?;
        history::sqlite::select_for_order(&conn, order_id)
    }

    fn latest(&self, order_id: &str) -> Result<Option<StatusHistoryEntry>, HistoryError> {
        let conn = self.lock_history()?;
        history::sqlite::select_latest(&conn, order_id)
    }

    fn count_for_order(&self, order_id: &str) -> Result<i64, HistoryError> {
        let conn = self.lock_history()?;
        history::sqlite::count_for_order(&conn, order_id)
    }
}
