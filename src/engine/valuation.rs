//! Preliminary valuation: USD-normalized cost and proceeds per record.

use crate::domain::{
    Chronological, Currency, Decimal, PurchaseRecord, SaleRecord, Timestamp,
};
use crate::engine::FeeSchedule;
use thiserror::Error;

/// Why a record was rejected during valuation or replay.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{id}: quantity must be positive, got {quantity}")]
    NonPositiveQuantity { id: String, quantity: Decimal },
    #[error("{id}: exchange rate must be positive for UYU, got {rate}")]
    InvalidExchangeRate { id: String, rate: Decimal },
    #[error("{id}: unit price must not be negative, got {price}")]
    NegativePrice { id: String, price: Decimal },
    #[error("{id}: fee must not be negative, got {fee}")]
    NegativeFee { id: String, fee: Decimal },
    #[error("{id}: duplicate id, an earlier record already uses it")]
    DuplicateId { id: String },
    #[error("{id}: amounts out of representable range")]
    ArithmeticOverflow { id: String },
}

impl ValidationError {
    /// Id of the offending record.
    pub fn record_id(&self) -> &str {
        match self {
            ValidationError::NonPositiveQuantity { id, .. }
            | ValidationError::InvalidExchangeRate { id, .. }
            | ValidationError::NegativePrice { id, .. }
            | ValidationError::NegativeFee { id, .. }
            | ValidationError::DuplicateId { id }
            | ValidationError::ArithmeticOverflow { id } => id,
        }
    }
}

/// A purchase with its fee settled and totals normalized to USD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValuedPurchase {
    pub record: PurchaseRecord,
    /// Recorded or estimated fee, in the payment currency.
    pub fee: Decimal,
    /// `quantity * price + fee`, in the payment currency.
    pub total_cost: Decimal,
    pub total_cost_usd: Decimal,
    pub unit_cost_usd: Decimal,
}

/// A sale with its fee settled and proceeds normalized to USD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValuedSale {
    pub record: SaleRecord,
    /// Recorded or estimated fee, in the received currency.
    pub fee: Decimal,
    /// `quantity * price - fee`, in the received currency.
    pub gross_proceeds: Decimal,
    pub net_proceeds_usd: Decimal,
}

impl Chronological for ValuedPurchase {
    fn timestamp(&self) -> Timestamp {
        self.record.timestamp
    }
}

impl Chronological for ValuedSale {
    fn timestamp(&self) -> Timestamp {
        self.record.timestamp
    }
}

fn check_common(
    id: &str,
    quantity: Decimal,
    currency: Currency,
    unit_price: Decimal,
    exchange_rate: Decimal,
    fee: Decimal,
) -> Result<(), ValidationError> {
    if !quantity.is_positive() {
        return Err(ValidationError::NonPositiveQuantity {
            id: id.to_string(),
            quantity,
        });
    }
    if currency == Currency::Uyu && !exchange_rate.is_positive() {
        return Err(ValidationError::InvalidExchangeRate {
            id: id.to_string(),
            rate: exchange_rate,
        });
    }
    if unit_price.is_negative() {
        return Err(ValidationError::NegativePrice {
            id: id.to_string(),
            price: unit_price,
        });
    }
    if fee.is_negative() {
        return Err(ValidationError::NegativeFee {
            id: id.to_string(),
            fee,
        });
    }
    Ok(())
}

fn to_usd(amount: Decimal, currency: Currency, exchange_rate: Decimal) -> Option<Decimal> {
    match currency {
        Currency::Usd => Some(amount),
        Currency::Uyu => amount.checked_div(exchange_rate),
    }
}

fn overflow(id: &str) -> ValidationError {
    ValidationError::ArithmeticOverflow { id: id.to_string() }
}

/// Value a purchase, settling its fee against `fees`.
pub fn value_purchase(
    record: PurchaseRecord,
    fees: &FeeSchedule,
) -> Result<ValuedPurchase, ValidationError> {
    check_common(
        record.id.as_str(),
        record.quantity,
        record.currency,
        record.unit_price,
        record.exchange_rate,
        record.fee,
    )?;

    let fee = fees.estimate_fee(
        &record.platform,
        record.currency,
        record.quantity,
        record.unit_price,
        record.fee,
    );
    let id = record.id.as_str();
    let notional = record
        .quantity
        .checked_mul(record.unit_price)
        .ok_or_else(|| overflow(id))?;
    let fee = fee.ok_or_else(|| overflow(id))?;
    let total_cost = notional.checked_add(fee).ok_or_else(|| overflow(id))?;
    let total_cost_usd = to_usd(total_cost, record.currency, record.exchange_rate)
        .ok_or_else(|| overflow(id))?;
    let unit_cost_usd = total_cost_usd
        .checked_div(record.quantity)
        .ok_or_else(|| overflow(id))?;

    Ok(ValuedPurchase {
        record,
        fee,
        total_cost,
        total_cost_usd,
        unit_cost_usd,
    })
}

/// Value a sale, settling its fee against `fees`.
pub fn value_sale(record: SaleRecord, fees: &FeeSchedule) -> Result<ValuedSale, ValidationError> {
    check_common(
        record.id.as_str(),
        record.quantity,
        record.currency,
        record.unit_price,
        record.exchange_rate,
        record.fee,
    )?;

    let fee = fees.estimate_fee(
        &record.platform,
        record.currency,
        record.quantity,
        record.unit_price,
        record.fee,
    );
    let id = record.id.as_str();
    let notional = record
        .quantity
        .checked_mul(record.unit_price)
        .ok_or_else(|| overflow(id))?;
    let fee = fee.ok_or_else(|| overflow(id))?;
    let gross_proceeds = notional.checked_sub(fee).ok_or_else(|| overflow(id))?;
    let net_proceeds_usd = to_usd(gross_proceeds, record.currency, record.exchange_rate)
        .ok_or_else(|| overflow(id))?;

    Ok(ValuedSale {
        record,
        fee,
        gross_proceeds,
        net_proceeds_usd,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Platform, PurchaseId, SaleId};

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    fn purchase(qty: &str, currency: Currency, price: &str, rate: &str) -> PurchaseRecord {
        PurchaseRecord::new(
            PurchaseId::new("C1"),
            ts("2023-01-01 10:00:00"),
            d(qty),
            currency,
            d(price),
        )
        .with_exchange_rate(d(rate))
    }

    fn sale(qty: &str, currency: Currency, price: &str, rate: &str) -> SaleRecord {
        SaleRecord::new(
            SaleId::new("V1"),
            ts("2023-01-10 12:00:00"),
            d(qty),
            currency,
            d(price),
        )
        .with_exchange_rate(d(rate))
    }

    #[test]
    fn test_uyu_purchase_converts_at_rate() {
        let valued =
            value_purchase(purchase("100", Currency::Uyu, "39.5", "39.5"), &FeeSchedule::default())
                .unwrap();
        assert_eq!(valued.fee, Decimal::zero());
        assert_eq!(valued.total_cost, d("3950"));
        assert_eq!(valued.total_cost_usd, d("100"));
        assert_eq!(valued.unit_cost_usd, d("1"));
    }

    #[test]
    fn test_usd_purchase_ignores_rate_and_adds_fee() {
        let record = purchase("50", Currency::Usd, "1.01", "0").with_fee(d("0.5"));
        let valued = value_purchase(record, &FeeSchedule::default()).unwrap();
        assert_eq!(valued.total_cost, d("51"));
        assert_eq!(valued.total_cost_usd, d("51"));
        assert_eq!(valued.unit_cost_usd, d("1.02"));
    }

    #[test]
    fn test_reference_platform_fee_is_estimated() {
        let record =
            purchase("100", Currency::Uyu, "39.5", "39.5").with_platform(Platform::new("binance"));
        let valued = value_purchase(record, &FeeSchedule::default()).unwrap();
        assert_eq!(valued.fee, d("6.32"));
        assert_eq!(valued.total_cost, d("3956.32"));
        assert_eq!(valued.total_cost_usd, d("100.16"));
    }

    #[test]
    fn test_uyu_sale_net_proceeds() {
        let valued =
            value_sale(sale("70", Currency::Uyu, "40.5", "40"), &FeeSchedule::default()).unwrap();
        assert_eq!(valued.gross_proceeds, d("2835"));
        assert_eq!(valued.net_proceeds_usd, d("70.875"));
    }

    #[test]
    fn test_sale_fee_reduces_proceeds() {
        let record = sale("10", Currency::Usd, "1.02", "1").with_fee(d("0.2"));
        let valued = value_sale(record, &FeeSchedule::default()).unwrap();
        assert_eq!(valued.gross_proceeds, d("10"));
        assert_eq!(valued.net_proceeds_usd, d("10"));
    }

    #[test]
    fn test_zero_exchange_rate_rejected_for_uyu() {
        let err = value_sale(sale("70", Currency::Uyu, "40.5", "0"), &FeeSchedule::default())
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidExchangeRate { .. }));
        assert_eq!(err.record_id(), "V1");
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let err = value_purchase(purchase("0", Currency::Usd, "1", "1"), &FeeSchedule::default())
            .unwrap_err();
        assert!(matches!(err, ValidationError::NonPositiveQuantity { .. }));
        assert_eq!(err.to_string(), "C1: quantity must be positive, got 0");
    }

    #[test]
    fn test_negative_fee_rejected() {
        let record = purchase("1", Currency::Usd, "1", "1").with_fee(d("-1"));
        let err = value_purchase(record, &FeeSchedule::default()).unwrap_err();
        assert!(matches!(err, ValidationError::NegativeFee { .. }));
    }

    #[test]
    fn test_purchase_cost_out_of_range_rejected() {
        let record = purchase("79228162514264337593543950335", Currency::Usd, "2", "1");
        let err = value_purchase(record, &FeeSchedule::default()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::ArithmeticOverflow {
                id: "C1".to_string()
            }
        );
        assert_eq!(err.to_string(), "C1: amounts out of representable range");
    }

    #[test]
    fn test_tiny_exchange_rate_overflows_usd_proceeds() {
        let record = sale(
            "1000000",
            Currency::Uyu,
            "1000000",
            "0.0000000000000000000000000001",
        );
        let err = value_sale(record, &FeeSchedule::default()).unwrap_err();
        assert!(matches!(err, ValidationError::ArithmeticOverflow { .. }));
        assert_eq!(err.record_id(), "V1");
    }
}
