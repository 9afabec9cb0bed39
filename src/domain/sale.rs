//! USDT sale records.

use crate::domain::{Currency, Decimal, Platform, SaleId, Timestamp};
use serde::{Deserialize, Serialize};

/// A USDT sale as entered in the ledger.
///
/// Cost basis and realized gain are not stored here; the engine emits them
/// on a separate [`crate::engine::SaleOutcome`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub id: SaleId,
    pub timestamp: Timestamp,
    /// USDT sold.
    pub quantity: Decimal,
    /// Currency received.
    pub currency: Currency,
    /// Price per USDT in the received currency.
    pub unit_price: Decimal,
    /// UYU per USD; only meaningful when `currency` is UYU.
    pub exchange_rate: Decimal,
    /// Fee in the received currency; zero means "not recorded".
    pub fee: Decimal,
    pub platform: Platform,
}

impl SaleRecord {
    /// Create a sale with no fee and USD rate 1.
    pub fn new(
        id: SaleId,
        timestamp: Timestamp,
        quantity: Decimal,
        currency: Currency,
        unit_price: Decimal,
    ) -> Self {
        SaleRecord {
            id,
            timestamp,
            quantity,
            currency,
            unit_price,
            exchange_rate: Decimal::one(),
            fee: Decimal::zero(),
            platform: Platform::default(),
        }
    }

    pub fn with_exchange_rate(mut self, rate: Decimal) -> Self {
        self.exchange_rate = rate;
        self
    }

    pub fn with_fee(mut self, fee: Decimal) -> Self {
        self.fee = fee;
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }
}
