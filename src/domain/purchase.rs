//! USDT purchase records and the funding-source tag they carry.

use crate::domain::{Currency, Decimal, Platform, PurchaseId, SaleId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the fiat for a purchase came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FundingSource {
    /// Fresh money entering the ledger.
    #[default]
    NewCapital,
    /// Proceeds of an earlier sale.
    FromSale(SaleId),
    /// Any other free-text note (e.g. "Ahorros UYU").
    Other(String),
}

impl FundingSource {
    /// Tag prefix that links a purchase to the sale whose proceeds funded it.
    pub const SALE_PREFIX: &'static str = "Venta_ID_";

    /// Parse a ledger funding tag. Done once at ingestion.
    pub fn parse(tag: &str) -> Self {
        let tag = tag.trim();
        if let Some(sale_id) = tag.strip_prefix(Self::SALE_PREFIX) {
            let sale_id = sale_id.trim();
            if !sale_id.is_empty() {
                return FundingSource::FromSale(SaleId::new(sale_id));
            }
        }

        match tag.to_lowercase().as_str() {
            "" | "new capital" | "nuevo capital" | "capital" => FundingSource::NewCapital,
            _ => FundingSource::Other(tag.to_string()),
        }
    }

    /// The referenced sale, if any.
    pub fn sale_id(&self) -> Option<&SaleId> {
        match self {
            FundingSource::FromSale(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for FundingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FundingSource::NewCapital => f.write_str("new capital"),
            FundingSource::FromSale(id) => write!(f, "{}{}", Self::SALE_PREFIX, id),
            FundingSource::Other(text) => f.write_str(text),
        }
    }
}

/// A USDT purchase as entered in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub id: PurchaseId,
    pub timestamp: Timestamp,
    /// USDT bought.
    pub quantity: Decimal,
    /// Currency paid.
    pub currency: Currency,
    /// Price per USDT in the payment currency.
    pub unit_price: Decimal,
    /// UYU per USD; only meaningful when `currency` is UYU.
    pub exchange_rate: Decimal,
    pub funding_source: FundingSource,
    /// Fee in the payment currency; zero means "not recorded".
    pub fee: Decimal,
    pub platform: Platform,
}

impl PurchaseRecord {
    /// Create a purchase with no fee, USD rate 1 and new-capital funding.
    pub fn new(
        id: PurchaseId,
        timestamp: Timestamp,
        quantity: Decimal,
        currency: Currency,
        unit_price: Decimal,
    ) -> Self {
        PurchaseRecord {
            id,
            timestamp,
            quantity,
            currency,
            unit_price,
            exchange_rate: Decimal::one(),
            funding_source: FundingSource::NewCapital,
            fee: Decimal::zero(),
            platform: Platform::default(),
        }
    }

    pub fn with_exchange_rate(mut self, rate: Decimal) -> Self {
        self.exchange_rate = rate;
        self
    }

    pub fn with_funding_source(mut self, source: FundingSource) -> Self {
        self.funding_source = source;
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_funding_source_sale_reference() {
        assert_eq!(
            FundingSource::parse("Venta_ID_V12"),
            FundingSource::FromSale(SaleId::new("V12"))
        );
        assert_eq!(
            FundingSource::parse("  Venta_ID_ V3 "),
            FundingSource::FromSale(SaleId::new("V3"))
        );
    }

    #[test]
    fn test_funding_source_other_and_capital() {
        assert_eq!(FundingSource::parse(""), FundingSource::NewCapital);
        assert_eq!(FundingSource::parse("New Capital"), FundingSource::NewCapital);
        assert_eq!(
            FundingSource::parse("Ahorros UYU"),
            FundingSource::Other("Ahorros UYU".to_string())
        );
        // A bare prefix does not reference any sale.
        assert_eq!(
            FundingSource::parse("Venta_ID_"),
            FundingSource::Other("Venta_ID_".to_string())
        );
    }

    #[test]
    fn test_funding_source_display_roundtrips_sale_tag() {
        let source = FundingSource::FromSale(SaleId::new("V1"));
        assert_eq!(source.to_string(), "Venta_ID_V1");
        assert_eq!(FundingSource::parse(&source.to_string()), source);
        assert_eq!(source.sale_id(), Some(&SaleId::new("V1")));
        assert_eq!(FundingSource::NewCapital.sale_id(), None);
    }
}
