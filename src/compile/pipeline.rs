//! Batch compilation of a full ledger history.

use super::{RecordKind, Rejection, RunInput, RunOutput, RunStatistics};
use crate::config::LedgerSettings;
use crate::datasource::{RecordSource, SourceError};
use crate::domain::{merge_chronological, sort_chronological, LedgerEvent};
use crate::engine::{
    value_purchase, value_sale, CppEngine, FeeSchedule, ValidationError, ValuedPurchase,
    ValuedSale,
};
use std::collections::HashSet;

/// Rebuilds all derived tables from scratch on every call; no state
/// survives between runs.
#[derive(Debug, Clone)]
pub struct Compiler {
    settings: LedgerSettings,
    fees: FeeSchedule,
}

impl Compiler {
    pub fn new(settings: LedgerSettings) -> Self {
        let fees = FeeSchedule::from_settings(&settings);
        Self { settings, fees }
    }

    /// Load from `source` and compile.
    ///
    /// # Errors
    /// Returns an error only if a whole collection cannot be read.
    pub fn compile_source(&self, source: &dyn RecordSource) -> Result<RunOutput, SourceError> {
        Ok(self.compile(RunInput::from_source(source)?))
    }

    /// Validate, value, merge and replay the input.
    pub fn compile(&self, input: RunInput) -> RunOutput {
        let RunInput {
            purchases,
            sales,
            mut conversions,
            skipped,
        } = input;

        let mut rejected = Vec::new();

        // Value each record; the first occurrence of an id wins.
        let mut seen = HashSet::new();
        let mut valued_purchases: Vec<ValuedPurchase> = Vec::with_capacity(purchases.len());
        for record in purchases {
            let result = if seen.insert(record.id.clone()) {
                value_purchase(record, &self.fees)
            } else {
                Err(ValidationError::DuplicateId {
                    id: record.id.to_string(),
                })
            };
            match result {
                Ok(valued) => valued_purchases.push(valued),
                Err(error) => rejected.push(reject(RecordKind::Purchase, error)),
            }
        }

        let mut seen = HashSet::new();
        let mut valued_sales: Vec<ValuedSale> = Vec::with_capacity(sales.len());
        for record in sales {
            let result = if seen.insert(record.id.clone()) {
                value_sale(record, &self.fees)
            } else {
                Err(ValidationError::DuplicateId {
                    id: record.id.to_string(),
                })
            };
            match result {
                Ok(valued) => valued_sales.push(valued),
                Err(error) => rejected.push(reject(RecordKind::Sale, error)),
            }
        }

        let events = merge_chronological(valued_purchases, valued_sales);

        let mut engine = CppEngine::new(self.settings.inventory_epsilon);
        for (event, error) in engine.replay(events) {
            let kind = match event {
                LedgerEvent::Purchase(_) => RecordKind::Purchase,
                LedgerEvent::Sale(_) => RecordKind::Sale,
            };
            rejected.push(reject(kind, error));
        }

        // Conversions are applied after the replay, oldest first.
        sort_chronological(&mut conversions);
        let conversions_applied = conversions
            .iter()
            .filter(|c| engine.apply_conversion(c))
            .count();

        let output = engine.into_output();

        let degraded_sales = output.sales.iter().filter(|s| s.degraded).count();
        let statistics = RunStatistics {
            purchases_processed: output.purchases_processed,
            sales_processed: output.sales.len(),
            conversions_applied,
            degraded_sales,
            rejected_records: rejected.len(),
            skipped_rows: skipped.len(),
            total_gain_loss_usd: output.sales.iter().map(|s| s.gain_loss_usd).sum(),
            ending_inventory_usdt: output.inventory.quantity,
            ending_cost_basis_usd: output.inventory.total_cost_usd,
            ending_cpp_usd: output.inventory.weighted_cost(),
        };

        tracing::info!(
            purchases = statistics.purchases_processed,
            sales = statistics.sales_processed,
            degraded = statistics.degraded_sales,
            rejected = statistics.rejected_records,
            skipped = statistics.skipped_rows,
            gain_loss_usd = %statistics.total_gain_loss_usd,
            inventory_usdt = %statistics.ending_inventory_usdt,
            "Ledger compiled"
        );

        RunOutput {
            settings: self.settings.clone(),
            sales: output.sales,
            fiat_flows: output.fiat_flows,
            inventory: output.inventory,
            statistics,
            rejected,
            skipped,
        }
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(LedgerSettings::default())
    }
}

fn reject(kind: RecordKind, error: ValidationError) -> Rejection {
    tracing::warn!(
        kind = ?kind,
        record_id = %error.record_id(),
        error = %error,
        "Rejecting record"
    );
    Rejection { kind, error }
}
