//! Fiat-to-fiat conversion records.

use crate::domain::{ConversionId, Currency, Decimal, SaleId, Timestamp};
use serde::{Deserialize, Serialize};

/// A conversion of fiat between currencies, optionally tied to the sale
/// whose proceeds were converted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRecord {
    pub id: ConversionId,
    pub timestamp: Timestamp,
    pub source_currency: Currency,
    pub source_amount: Decimal,
    pub destination_currency: Currency,
    pub destination_amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale_id: Option<SaleId>,
    pub note: String,
}

impl ConversionRecord {
    /// Normalize a ledger "associated sale" cell: blank and `N/A` mean none.
    pub fn parse_sale_reference(raw: &str) -> Option<SaleId> {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("n/a") {
            None
        } else {
            Some(SaleId::new(raw))
        }
    }
}
