//! Summaries derived from a compiled run.
//!
//! Nothing here feeds back into the engine; every figure is recomputed from
//! [`RunOutput`] so reports stay consistent with the exported tables.

use crate::compile::RunOutput;
use crate::domain::{Currency, Decimal, Timestamp};
use crate::engine::{FiatFlowEntry, FiatStatus, SaleOutcome};
use serde::Serialize;
use std::collections::BTreeMap;

/// Headline figures across all sales.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionSummary {
    pub total_sales: usize,
    pub total_usdt_sold: Decimal,
    pub total_net_proceeds_usd: Decimal,
    pub total_cost_basis_usd: Decimal,
    pub total_gain_loss_usd: Decimal,
    /// Gain over cost basis, in percent; 0 when nothing had a cost basis.
    pub roi_percent: Decimal,
    /// Fiat not yet spent or converted, per currency.
    pub fiat_available: BTreeMap<Currency, Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrencyStats {
    pub sales: usize,
    pub usdt_volume: Decimal,
    pub fiat_generated: Decimal,
    pub fiat_available: Decimal,
    pub average_gain_usd: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FiatTotals {
    pub generated: Decimal,
    pub consumed: Decimal,
    pub available: Decimal,
    pub consumed_percent: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalesMetrics {
    pub average_gain_usd: Decimal,
    pub max_gain_usd: Decimal,
    pub min_gain_usd: Decimal,
    pub average_volume_usdt: Decimal,
    pub first_sale: Timestamp,
    pub last_sale: Timestamp,
    /// Calendar days from first to last sale, both included.
    pub days_operating: i64,
    pub gain_per_day_usd: Decimal,
}

/// All report sections for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub summary: TransactionSummary,
    pub by_currency: BTreeMap<Currency, CurrencyStats>,
    pub fiat_totals: BTreeMap<Currency, FiatTotals>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<SalesMetrics>,
}

impl Report {
    pub fn from_run(output: &RunOutput) -> Self {
        Report {
            summary: transaction_summary(&output.sales, &output.fiat_flows),
            by_currency: currency_stats(&output.sales, &output.fiat_flows),
            fiat_totals: fiat_totals(&output.fiat_flows),
            metrics: sales_metrics(&output.sales),
        }
    }
}

/// Fiat that can still fund purchases.
fn is_spendable(entry: &FiatFlowEntry) -> bool {
    !matches!(entry.status, FiatStatus::Converted | FiatStatus::FullyUsed)
        && entry.available.is_positive()
}

fn percent_of(part: Decimal, whole: Decimal) -> Decimal {
    part.checked_div(whole)
        .and_then(|ratio| ratio.checked_mul(Decimal::hundred()))
        .unwrap_or_default()
}

fn average(total: Decimal, count: usize) -> Decimal {
    i64::try_from(count)
        .ok()
        .and_then(|n| total.checked_div(Decimal::from_i64(n)))
        .unwrap_or_default()
}

pub fn transaction_summary(sales: &[SaleOutcome], flows: &[FiatFlowEntry]) -> TransactionSummary {
    let total_cost_basis_usd: Decimal = sales.iter().map(|s| s.cost_basis_usd).sum();
    let total_gain_loss_usd: Decimal = sales.iter().map(|s| s.gain_loss_usd).sum();

    let mut fiat_available = BTreeMap::new();
    for entry in flows.iter().filter(|e| is_spendable(e)) {
        let total = fiat_available
            .entry(entry.currency)
            .or_insert_with(Decimal::zero);
        *total = total.saturating_add(entry.available);
    }

    TransactionSummary {
        total_sales: sales.len(),
        total_usdt_sold: sales.iter().map(|s| s.quantity).sum(),
        total_net_proceeds_usd: sales.iter().map(|s| s.net_proceeds_usd).sum(),
        total_cost_basis_usd,
        total_gain_loss_usd,
        roi_percent: percent_of(total_gain_loss_usd, total_cost_basis_usd),
        fiat_available,
    }
}

pub fn currency_stats(
    sales: &[SaleOutcome],
    flows: &[FiatFlowEntry],
) -> BTreeMap<Currency, CurrencyStats> {
    let mut stats: BTreeMap<Currency, (usize, Decimal, Decimal)> = BTreeMap::new();
    for sale in sales {
        let (count, volume, gain) = stats
            .entry(sale.currency)
            .or_insert((0, Decimal::zero(), Decimal::zero()));
        *count += 1;
        *volume = volume.saturating_add(sale.quantity);
        *gain = gain.saturating_add(sale.gain_loss_usd);
    }

    stats
        .into_iter()
        .map(|(currency, (count, volume, gain))| {
            let in_currency = flows.iter().filter(|e| e.currency == currency);
            let fiat_generated: Decimal = in_currency.clone().map(|e| e.generated).sum();
            let fiat_available: Decimal = in_currency
                .filter(|e| is_spendable(e))
                .map(|e| e.available)
                .sum();
            (
                currency,
                CurrencyStats {
                    sales: count,
                    usdt_volume: volume,
                    fiat_generated,
                    fiat_available,
                    average_gain_usd: average(gain, count),
                },
            )
        })
        .collect()
}

/// Balances per currency over every entry, converted ones included.
pub fn fiat_totals(flows: &[FiatFlowEntry]) -> BTreeMap<Currency, FiatTotals> {
    let mut totals: BTreeMap<Currency, FiatTotals> = BTreeMap::new();
    for entry in flows {
        let t = totals.entry(entry.currency).or_insert(FiatTotals {
            generated: Decimal::zero(),
            consumed: Decimal::zero(),
            available: Decimal::zero(),
            consumed_percent: Decimal::zero(),
        });
        t.generated = t.generated.saturating_add(entry.generated);
        t.consumed = t.consumed.saturating_add(entry.consumed);
        t.available = t.available.saturating_add(entry.available);
    }
    for t in totals.values_mut() {
        t.consumed_percent = percent_of(t.consumed, t.generated);
    }
    totals
}

/// `None` when there were no sales.
pub fn sales_metrics(sales: &[SaleOutcome]) -> Option<SalesMetrics> {
    let first_sale = sales.iter().map(|s| s.timestamp).min()?;
    let last_sale = sales.iter().map(|s| s.timestamp).max()?;
    let max_gain_usd = sales.iter().map(|s| s.gain_loss_usd).max()?;
    let min_gain_usd = sales.iter().map(|s| s.gain_loss_usd).min()?;

    let total_gain: Decimal = sales.iter().map(|s| s.gain_loss_usd).sum();
    let total_volume: Decimal = sales.iter().map(|s| s.quantity).sum();
    let days_operating = (last_sale.date() - first_sale.date()).num_days() + 1;

    Some(SalesMetrics {
        average_gain_usd: average(total_gain, sales.len()),
        max_gain_usd,
        min_gain_usd,
        average_volume_usdt: average(total_volume, sales.len()),
        first_sale,
        last_sale,
        days_operating,
        gain_per_day_usd: total_gain
            .checked_div(Decimal::from_i64(days_operating))
            .unwrap_or_default(),
    })
}
