//! Operational audit stream: service lifecycle, order intake and refused
//! requests, written to SQLite by a background task.

mod events;
mod handle;
mod sqlite;
mod store;
mod writer;

pub use events::*;
pub use handle::*;
pub use sqlite::*;
pub use store::*;
pub use writer::*;
