//! Compile pipeline: raw ledger records in, P&L and fiat-flow tables out.
//!
//! This module provides:
//! - Per-record validation and preliminary valuation
//! - Chronological merge and CPP replay
//! - Conversion application to the fiat ledger
//! - Run statistics

use crate::config::LedgerSettings;
use crate::datasource::{RecordSource, SkippedRow, SourceError};
use crate::domain::{ConversionRecord, Decimal, PurchaseRecord, SaleRecord};
use crate::engine::{FiatFlowEntry, Inventory, SaleOutcome, ValidationError};
use serde::Serialize;

pub mod pipeline;

pub use pipeline::Compiler;

/// Raw records for one run, in caller order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunInput {
    pub purchases: Vec<PurchaseRecord>,
    pub sales: Vec<SaleRecord>,
    pub conversions: Vec<ConversionRecord>,
    /// Rows the loader could not parse; carried through to the output.
    pub skipped: Vec<SkippedRow>,
}

impl RunInput {
    pub fn new(purchases: Vec<PurchaseRecord>, sales: Vec<SaleRecord>) -> Self {
        RunInput {
            purchases,
            sales,
            ..Default::default()
        }
    }

    pub fn with_conversions(mut self, conversions: Vec<ConversionRecord>) -> Self {
        self.conversions = conversions;
        self
    }

    /// Load every collection from a record source.
    pub fn from_source(source: &dyn RecordSource) -> Result<Self, SourceError> {
        let purchases = source.load_purchases()?;
        let sales = source.load_sales()?;
        let conversions = source.load_conversions()?;

        let mut skipped = purchases.skipped;
        skipped.extend(sales.skipped);
        skipped.extend(conversions.skipped);

        Ok(RunInput {
            purchases: purchases.records,
            sales: sales.records,
            conversions: conversions.records,
            skipped,
        })
    }
}

/// A record refused during valuation or replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub kind: RecordKind,
    pub error: ValidationError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Purchase,
    Sale,
}

/// Aggregate figures for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunStatistics {
    pub purchases_processed: usize,
    pub sales_processed: usize,
    pub conversions_applied: usize,
    /// Sales realized without cost basis because stock could not cover them.
    pub degraded_sales: usize,
    pub rejected_records: usize,
    pub skipped_rows: usize,
    pub total_gain_loss_usd: Decimal,
    pub ending_inventory_usdt: Decimal,
    pub ending_cost_basis_usd: Decimal,
    /// CPP of the remaining stock; absent when nothing is held.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ending_cpp_usd: Option<Decimal>,
}

/// Everything a run produced, held in memory until exported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    pub settings: LedgerSettings,
    /// Sale results in replay order.
    pub sales: Vec<SaleOutcome>,
    /// Fiat entries in sale replay order.
    pub fiat_flows: Vec<FiatFlowEntry>,
    pub inventory: Inventory,
    pub statistics: RunStatistics,
    pub rejected: Vec<Rejection>,
    pub skipped: Vec<SkippedRow>,
}

impl RunOutput {
    pub fn total_gain_loss_usd(&self) -> Decimal {
        self.sales.iter().map(|s| s.gain_loss_usd).sum()
    }
}
