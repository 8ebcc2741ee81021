//! Transition executor: validates status changes and commits them with their
//! history entry.

mod error;
mod executor;

pub use error::TransitionError;
pub use executor::{TransitionContext, TransitionExecutor, NOT_FOUND_NOTE};
