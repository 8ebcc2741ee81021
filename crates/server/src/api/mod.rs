pub mod audit;
pub mod error;
pub mod handlers;
pub mod history;
pub mod middleware;
pub mod orders;
pub mod routes;
pub mod scans;

pub use error::{ApiError, ErrorResponse};
pub use routes::create_router;
