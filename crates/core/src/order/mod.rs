//! Orders: the record whose status the lifecycle engine moves.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::{generate_tracking_number, SqliteOrderStore, CREATION_NOTE};
pub use store::{CreateOrderRequest, OrderError, OrderFilter, OrderStore, StatusUpdate};
pub use types::{Milestone, Milestones, Order, OrderStatus, UnknownStatus};
