//! Scan intake: decoding scanned labels and applying them to orders.

mod code;
mod processor;

pub use code::ScanCode;
pub use processor::{ScanOutcome, ScanProcessor, ScanRequest};

use thiserror::Error;

use crate::transition::TransitionError;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Invalid scan code: {0:?}")]
    InvalidScanCode(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl ScanError {
    pub fn kind(&self) -> &'static str {
        match self {
            ScanError::InvalidScanCode(_) => "invalid_scan_code",
            ScanError::Transition(err) => err.kind(),
        }
    }
}
