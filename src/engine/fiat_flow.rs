//! Fiat provenance: which sale proceeds were spent, and how much remains.

use crate::domain::{Currency, Decimal, FundingSource, SaleId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Lifecycle of a sale's fiat proceeds. Variants are declared in the only
/// order a status may advance; `Converted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FiatStatus {
    Available,
    PartiallyUsed,
    FullyUsed,
    Converted,
}

impl FiatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FiatStatus::Available => "available",
            FiatStatus::PartiallyUsed => "partially_used",
            FiatStatus::FullyUsed => "fully_used",
            FiatStatus::Converted => "converted",
        }
    }
}

impl fmt::Display for FiatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fiat generated by one sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiatFlowEntry {
    pub sale_id: SaleId,
    pub sale_timestamp: Timestamp,
    pub currency: Currency,
    /// Gross proceeds in `currency`.
    pub generated: Decimal,
    pub consumed: Decimal,
    pub available: Decimal,
    pub status: FiatStatus,
}

impl FiatFlowEntry {
    fn status_from_balance(&self) -> FiatStatus {
        if !self.available.is_positive() {
            FiatStatus::FullyUsed
        } else if self.available < self.generated {
            FiatStatus::PartiallyUsed
        } else {
            FiatStatus::Available
        }
    }
}

/// Outcome of a consumption attempt, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Consumption {
    /// Balance updated on the referenced entry.
    Applied { sale_id: SaleId, status: FiatStatus },
    /// Funding tag references a sale with no entry; dropped.
    UnknownSale(SaleId),
    /// Funding source is not a sale reference.
    Untracked,
    /// The balance would leave the representable range; entry left unchanged.
    OutOfRange(SaleId),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FiatFlowError {
    #[error("fiat flow for sale {0} already registered")]
    DuplicateSale(SaleId),
}

/// Per-sale fiat ledger. Entries are never removed; iteration follows
/// registration order.
#[derive(Debug, Clone, Default)]
pub struct FiatFlowTracker {
    entries: Vec<FiatFlowEntry>,
    index: HashMap<SaleId, usize>,
}

impl FiatFlowTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an entry for a sale's proceeds.
    pub fn register_generation(
        &mut self,
        sale_id: SaleId,
        sale_timestamp: Timestamp,
        currency: Currency,
        gross_amount: Decimal,
    ) -> Result<(), FiatFlowError> {
        if self.index.contains_key(&sale_id) {
            return Err(FiatFlowError::DuplicateSale(sale_id));
        }

        self.index.insert(sale_id.clone(), self.entries.len());
        self.entries.push(FiatFlowEntry {
            sale_id,
            sale_timestamp,
            currency,
            generated: gross_amount,
            consumed: Decimal::zero(),
            available: gross_amount,
            status: FiatStatus::Available,
        });
        Ok(())
    }

    /// Charge `amount` (in the purchase's currency) against the sale named by
    /// the funding source, if it is tracked.
    pub fn register_consumption(
        &mut self,
        funding_source: &FundingSource,
        amount: Decimal,
        currency: Currency,
    ) -> Consumption {
        let Some(sale_id) = funding_source.sale_id() else {
            return Consumption::Untracked;
        };
        let Some(entry) = self.entry_mut(sale_id) else {
            tracing::debug!(
                sale_id = %sale_id,
                "Funding source references an untracked sale, ignoring"
            );
            return Consumption::UnknownSale(sale_id.clone());
        };

        if entry.currency != currency {
            tracing::warn!(
                sale_id = %sale_id,
                sale_currency = %entry.currency,
                purchase_currency = %currency,
                "Purchase paid in a different currency than the funding sale; consuming native amount"
            );
        }

        let (Some(consumed), Some(available)) = (
            entry.consumed.checked_add(amount),
            entry.available.checked_sub(amount),
        ) else {
            tracing::warn!(
                sale_id = %sale_id,
                amount = %amount,
                "Consumption out of representable range; balance left unchanged"
            );
            return Consumption::OutOfRange(sale_id.clone());
        };
        entry.consumed = consumed;
        entry.available = available;
        entry.status = entry.status.max(entry.status_from_balance());

        Consumption::Applied {
            sale_id: sale_id.clone(),
            status: entry.status,
        }
    }

    /// Mark a sale's proceeds as converted. Returns false for untracked sales.
    pub fn register_conversion(&mut self, sale_id: &SaleId) -> bool {
        match self.entry_mut(sale_id) {
            Some(entry) => {
                entry.status = FiatStatus::Converted;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, sale_id: &SaleId) -> Option<&FiatFlowEntry> {
        self.index.get(sale_id).map(|&i| &self.entries[i])
    }

    pub fn entries(&self) -> &[FiatFlowEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<FiatFlowEntry> {
        self.entries
    }

    fn entry_mut(&mut self, sale_id: &SaleId) -> Option<&mut FiatFlowEntry> {
        let i = *self.index.get(sale_id)?;
        self.entries.get_mut(i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn tracker_with(sale: &str, currency: Currency, amount: &str) -> FiatFlowTracker {
        let mut tracker = FiatFlowTracker::new();
        tracker
            .register_generation(
                SaleId::new(sale),
                Timestamp::parse("2023-01-10 12:00:00").unwrap(),
                currency,
                d(amount),
            )
            .unwrap();
        tracker
    }

    fn from_sale(id: &str) -> FundingSource {
        FundingSource::FromSale(SaleId::new(id))
    }

    #[test]
    fn test_generation_starts_available() {
        let tracker = tracker_with("V1", Currency::Uyu, "2835");
        let entry = tracker.get(&SaleId::new("V1")).unwrap();
        assert_eq!(entry.generated, d("2835"));
        assert_eq!(entry.consumed, Decimal::zero());
        assert_eq!(entry.available, d("2835"));
        assert_eq!(entry.status, FiatStatus::Available);
    }

    #[test]
    fn test_duplicate_generation_rejected() {
        let mut tracker = tracker_with("V1", Currency::Uyu, "2835");
        let err = tracker
            .register_generation(
                SaleId::new("V1"),
                Timestamp::parse("2023-01-11").unwrap(),
                Currency::Usd,
                d("1"),
            )
            .unwrap_err();
        assert_eq!(err, FiatFlowError::DuplicateSale(SaleId::new("V1")));
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.get(&SaleId::new("V1")).unwrap().generated, d("2835"));
    }

    #[test]
    fn test_partial_then_full_consumption() {
        let mut tracker = tracker_with("V1", Currency::Uyu, "1000");

        let first = tracker.register_consumption(&from_sale("V1"), d("400"), Currency::Uyu);
        assert_eq!(
            first,
            Consumption::Applied {
                sale_id: SaleId::new("V1"),
                status: FiatStatus::PartiallyUsed
            }
        );

        tracker.register_consumption(&from_sale("V1"), d("600"), Currency::Uyu);
        let entry = tracker.get(&SaleId::new("V1")).unwrap();
        assert_eq!(entry.consumed, d("1000"));
        assert_eq!(entry.available, Decimal::zero());
        assert_eq!(entry.status, FiatStatus::FullyUsed);
    }

    #[test]
    fn test_overspend_goes_negative_and_fully_used() {
        let mut tracker = tracker_with("V1", Currency::Usd, "100");
        tracker.register_consumption(&from_sale("V1"), d("150"), Currency::Usd);
        let entry = tracker.get(&SaleId::new("V1")).unwrap();
        assert_eq!(entry.available, d("-50"));
        assert_eq!(entry.consumed + entry.available, entry.generated);
        assert_eq!(entry.status, FiatStatus::FullyUsed);
    }

    #[test]
    fn test_consumption_out_of_range_leaves_entry() {
        let mut tracker = tracker_with("V1", Currency::Usd, "-79228162514264337593543950335");
        assert_eq!(
            tracker.register_consumption(&from_sale("V1"), d("1"), Currency::Usd),
            Consumption::OutOfRange(SaleId::new("V1"))
        );
        let entry = tracker.get(&SaleId::new("V1")).unwrap();
        assert_eq!(entry.consumed, Decimal::zero());
        assert_eq!(entry.status, FiatStatus::Available);
    }

    #[test]
    fn test_zero_consumption_keeps_available() {
        let mut tracker = tracker_with("V1", Currency::Usd, "100");
        tracker.register_consumption(&from_sale("V1"), Decimal::zero(), Currency::Usd);
        assert_eq!(
            tracker.get(&SaleId::new("V1")).unwrap().status,
            FiatStatus::Available
        );
    }

    #[test]
    fn test_unknown_and_untracked_sources_are_dropped() {
        let mut tracker = tracker_with("V1", Currency::Usd, "100");
        assert_eq!(
            tracker.register_consumption(&from_sale("V9"), d("10"), Currency::Usd),
            Consumption::UnknownSale(SaleId::new("V9"))
        );
        assert_eq!(
            tracker.register_consumption(
                &FundingSource::Other("Ahorros USD".to_string()),
                d("10"),
                Currency::Usd
            ),
            Consumption::Untracked
        );
        assert_eq!(
            tracker.register_consumption(&FundingSource::NewCapital, d("10"), Currency::Usd),
            Consumption::Untracked
        );
        assert_eq!(tracker.get(&SaleId::new("V1")).unwrap().available, d("100"));
    }

    #[test]
    fn test_conversion_overrides_any_status() {
        let mut tracker = tracker_with("V1", Currency::Uyu, "100");
        tracker.register_consumption(&from_sale("V1"), d("100"), Currency::Uyu);
        assert!(tracker.register_conversion(&SaleId::new("V1")));
        let entry = tracker.get(&SaleId::new("V1")).unwrap();
        assert_eq!(entry.status, FiatStatus::Converted);
        assert_eq!(entry.available, Decimal::zero());

        assert!(!tracker.register_conversion(&SaleId::new("V2")));
    }

    #[test]
    fn test_consumption_after_conversion_keeps_converted() {
        let mut tracker = tracker_with("V1", Currency::Uyu, "100");
        tracker.register_conversion(&SaleId::new("V1"));
        tracker.register_consumption(&from_sale("V1"), d("30"), Currency::Uyu);
        let entry = tracker.get(&SaleId::new("V1")).unwrap();
        assert_eq!(entry.status, FiatStatus::Converted);
        assert_eq!(entry.available, d("70"));
    }

    #[test]
    fn test_entries_keep_registration_order() {
        let mut tracker = FiatFlowTracker::new();
        for id in ["V10", "V2", "V1"] {
            tracker
                .register_generation(
                    SaleId::new(id),
                    Timestamp::parse("2023-01-01").unwrap(),
                    Currency::Usd,
                    d("1"),
                )
                .unwrap();
        }
        let ids: Vec<_> = tracker.entries().iter().map(|e| e.sale_id.as_str()).collect();
        assert_eq!(ids, vec!["V10", "V2", "V1"]);
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&FiatStatus::PartiallyUsed).unwrap();
        assert_eq!(json, "\"partially_used\"");
        assert!(FiatStatus::Available < FiatStatus::Converted);
    }
}
