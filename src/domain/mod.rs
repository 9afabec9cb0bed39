//! Domain types and determinism layer for the P2P USDT ledger.
//!
//! This module provides:
//! - Lossless numeric handling via Decimal wrapper
//! - Domain primitives: Timestamp, Currency, Platform, record ids
//! - Purchase, sale and conversion records
//! - Stable chronological merge for deterministic replay

pub mod conversion;
pub mod decimal;
pub mod ordering;
pub mod primitives;
pub mod purchase;
pub mod sale;

pub use conversion::ConversionRecord;
pub use decimal::Decimal;
pub use ordering::{
    merge_chronological, sort_chronological, Chronological, EventOrderingKey, LedgerEvent,
};
pub use primitives::{
    ConversionId, Currency, Platform, PrimitiveParseError, PurchaseId, SaleId, Timestamp,
};
pub use purchase::{FundingSource, PurchaseRecord};
pub use sale::SaleRecord;

impl Chronological for PurchaseRecord {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

impl Chronological for SaleRecord {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

impl Chronological for ConversionRecord {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}
