//! Implicit fee estimation for platforms with a known fee schedule.

use crate::config::LedgerSettings;
use crate::domain::{Currency, Decimal, Platform};

/// Fee schedule of the reference exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeSchedule {
    reference_platform: String,
    rate_usd: Decimal,
    rate_uyu: Decimal,
}

impl FeeSchedule {
    pub fn new(reference_platform: &str, rate_usd: Decimal, rate_uyu: Decimal) -> Self {
        FeeSchedule {
            reference_platform: reference_platform.trim().to_lowercase(),
            rate_usd,
            rate_uyu,
        }
    }

    pub fn from_settings(settings: &LedgerSettings) -> Self {
        Self::new(
            &settings.reference_platform,
            settings.fee_rate_usd,
            settings.fee_rate_uyu,
        )
    }

    /// Rate charged in USDT per USDT traded for the given currency.
    pub fn rate_for(&self, currency: Currency) -> Decimal {
        match currency {
            Currency::Usd => self.rate_usd,
            Currency::Uyu => self.rate_uyu,
        }
    }

    /// Fee in the transaction currency.
    ///
    /// A recorded (non-zero) fee always wins. Otherwise the reference platform
    /// charges `quantity * rate` USDT, valued at `unit_price`; any other
    /// platform is assumed fee-free. `None` when the estimate overflows.
    pub fn estimate_fee(
        &self,
        platform: &Platform,
        currency: Currency,
        quantity: Decimal,
        unit_price: Decimal,
        recorded_fee: Decimal,
    ) -> Option<Decimal> {
        if !recorded_fee.is_zero() {
            return Some(recorded_fee);
        }
        if !platform.matches(&self.reference_platform) {
            return Some(Decimal::zero());
        }

        let fee_in_usdt = quantity.checked_mul(self.rate_for(currency))?;
        fee_in_usdt.checked_mul(unit_price)
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self::from_settings(&LedgerSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_recorded_fee_wins() {
        let fees = FeeSchedule::default();
        let fee = fees.estimate_fee(
            &Platform::new("binance"),
            Currency::Uyu,
            d("100"),
            d("39.5"),
            d("12.5"),
        );
        assert_eq!(fee, Some(d("12.5")));
    }

    #[test]
    fn test_reference_platform_uyu_rate() {
        let fees = FeeSchedule::default();
        // 100 USDT * 0.16% = 0.16 USDT, valued at 39.5 UYU.
        let fee = fees.estimate_fee(
            &Platform::new("Binance"),
            Currency::Uyu,
            d("100"),
            d("39.5"),
            Decimal::zero(),
        );
        assert_eq!(fee, Some(d("6.32")));
    }

    #[test]
    fn test_reference_platform_usd_rate() {
        let fees = FeeSchedule::default();
        // 50 USDT * 0.28% = 0.14 USDT, valued at 1.01 USD.
        let fee = fees.estimate_fee(
            &Platform::new("BINANCE"),
            Currency::Usd,
            d("50"),
            d("1.01"),
            Decimal::zero(),
        );
        assert_eq!(fee, Some(d("0.1414")));
    }

    #[test]
    fn test_other_platform_is_fee_free() {
        let fees = FeeSchedule::default();
        let fee = fees.estimate_fee(
            &Platform::new("otro"),
            Currency::Usd,
            d("50"),
            d("1.01"),
            Decimal::zero(),
        );
        assert_eq!(fee, Some(Decimal::zero()));
    }

    #[test]
    fn test_custom_reference_platform() {
        let fees = FeeSchedule::new("OKX", d("0.001"), d("0.002"));
        assert_eq!(fees.rate_for(Currency::Uyu), d("0.002"));
        let fee = fees.estimate_fee(
            &Platform::new("okx"),
            Currency::Usd,
            d("1000"),
            d("1"),
            Decimal::zero(),
        );
        assert_eq!(fee, Some(d("1")));
        let binance = fees.estimate_fee(
            &Platform::new("binance"),
            Currency::Usd,
            d("1000"),
            d("1"),
            Decimal::zero(),
        );
        assert_eq!(binance, Some(Decimal::zero()));
    }

    #[test]
    fn test_estimate_out_of_range_is_none() {
        let fees = FeeSchedule::default();
        let fee = fees.estimate_fee(
            &Platform::new("binance"),
            Currency::Usd,
            d("79228162514264337593543950335"),
            d("79228162514264337593543950335"),
            Decimal::zero(),
        );
        assert_eq!(fee, None);
    }
}
