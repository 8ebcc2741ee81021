use serde::Serialize;

use super::ScanError;
use crate::history::validate_order_ref;

const SEPARATOR: char = '|';

/// A decoded barcode/QR payload.
///
/// Labels printed by forwarders encode `orderId|trackingNumber|courier`.
/// Older labels and courier stickers carry a single bare value that may be
/// either an order id or a tracking number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanCode {
    /// The value as read by the scanner.
    pub raw: String,
    pub order_id: Option<String>,
    pub tracking_number: Option<String>,
    pub courier: Option<String>,
}

impl ScanCode {
    pub fn parse(raw: &str) -> Result<Self, ScanError> {
        let trimmed = raw.trim();
        validate_order_ref(trimmed).map_err(|_| ScanError::InvalidScanCode(raw.to_string()))?;

        if !trimmed.contains(SEPARATOR) {
            return Ok(Self {
                raw: trimmed.to_string(),
                order_id: Some(trimmed.to_string()),
                tracking_number: Some(trimmed.to_string()),
                courier: None,
            });
        }

        let parts: Vec<Option<String>> = trimmed
            .split(SEPARATOR)
            .map(str::trim)
            .map(|p| (!p.is_empty()).then(|| p.to_string()))
            .collect();

        if parts.len() > 3 {
            return Err(ScanError::InvalidScanCode(raw.to_string()));
        }

        let mut parts = parts.into_iter();
        let order_id = parts.next().flatten();
        let tracking_number = parts.next().flatten();
        let courier = parts.next().flatten();

        if order_id.is_none() && tracking_number.is_none() {
            return Err(ScanError::InvalidScanCode(raw.to_string()));
        }

        Ok(Self {
            raw: trimmed.to_string(),
            order_id,
            tracking_number,
            courier,
        })
    }
}
