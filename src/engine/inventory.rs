use crate::domain::{
    ConversionRecord, Currency, Decimal, LedgerEvent, Platform, SaleId, Timestamp,
};
use crate::engine::fiat_flow::{FiatFlowEntry, FiatFlowTracker};
use crate::engine::valuation::{ValidationError, ValuedPurchase, ValuedSale};
use serde::{Deserialize, Serialize};

pub type ValuedEvent = LedgerEvent<ValuedPurchase, ValuedSale>;

/// USDT held and its USD cost basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Inventory {
    pub quantity: Decimal,
    pub total_cost_usd: Decimal,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Weighted-average unit cost (CPP); `None` while nothing is held.
    pub fn weighted_cost(&self) -> Option<Decimal> {
        if self.quantity.is_positive() {
            self.total_cost_usd.checked_div(self.quantity)
        } else {
            None
        }
    }

    /// True when the held quantity is within `epsilon` of zero.
    pub fn is_empty(&self, epsilon: Decimal) -> bool {
        self.quantity.is_dust(epsilon)
    }

    /// True when `quantity` can be sold from stock, allowing `epsilon` of dust.
    pub fn covers(&self, quantity: Decimal, epsilon: Decimal) -> bool {
        !self.is_empty(epsilon)
            && self
                .quantity
                .checked_add(epsilon)
                .map_or(true, |limit| quantity <= limit)
    }
}

/// Realized result of one sale. Built once during replay, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleOutcome {
    pub sale_id: SaleId,
    pub timestamp: Timestamp,
    pub quantity: Decimal,
    pub currency: Currency,
    pub unit_price: Decimal,
    pub exchange_rate: Decimal,
    /// Recorded or estimated fee, in the received currency.
    pub fee: Decimal,
    /// Proceeds after fee, in the received currency.
    pub gross_proceeds: Decimal,
    pub net_proceeds_usd: Decimal,
    /// CPP applied to this sale (0 in degraded mode).
    pub cpp_usd: Decimal,
    pub cost_basis_usd: Decimal,
    pub gain_loss_usd: Decimal,
    pub platform: Platform,
    /// Stock could not cover the sale; the whole proceeds count as gain.
    pub degraded: bool,
}

/// Everything a replay produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOutput {
    pub sales: Vec<SaleOutcome>,
    pub fiat_flows: Vec<FiatFlowEntry>,
    pub inventory: Inventory,
    pub purchases_processed: usize,
}

/// Weighted-average-cost replay over a chronologically merged event stream.
///
/// One engine per run; state starts at zero and is never shared.
pub struct CppEngine {
    pub inventory: Inventory,
    fiat: FiatFlowTracker,
    epsilon: Decimal,
    purchases_processed: usize,

    // Outputs accumulated during processing.
    sales: Vec<SaleOutcome>,
}

impl CppEngine {
    pub fn new(epsilon: Decimal) -> Self {
        Self {
            inventory: Inventory::new(),
            fiat: FiatFlowTracker::new(),
            epsilon,
            purchases_processed: 0,
            sales: Vec::new(),
        }
    }

    /// Replay events in the order given. Callers must merge them
    /// chronologically first; the result depends on order.
    ///
    /// Events that would push a running total out of range are skipped and
    /// returned; the rest of the replay continues.
    pub fn replay<I>(&mut self, events: I) -> Vec<(ValuedEvent, ValidationError)>
    where
        I: IntoIterator<Item = ValuedEvent>,
    {
        let mut refused = Vec::new();
        for event in events {
            if let Err(error) = self.process_event(&event) {
                refused.push((event, error));
            }
        }
        refused
    }

    pub fn process_event(&mut self, event: &ValuedEvent) -> Result<(), ValidationError> {
        match event {
            LedgerEvent::Purchase(purchase) => self.process_purchase(purchase),
            LedgerEvent::Sale(sale) => self.process_sale(sale),
        }
    }

    /// Add a purchase to inventory and charge its fiat against the funding sale.
    ///
    /// Inventory is untouched when the new totals would overflow.
    pub fn process_purchase(&mut self, purchase: &ValuedPurchase) -> Result<(), ValidationError> {
        let record = &purchase.record;
        let (Some(quantity), Some(total_cost_usd)) = (
            self.inventory.quantity.checked_add(record.quantity),
            self.inventory
                .total_cost_usd
                .checked_add(purchase.total_cost_usd),
        ) else {
            return Err(ValidationError::ArithmeticOverflow {
                id: record.id.to_string(),
            });
        };
        self.inventory = Inventory {
            quantity,
            total_cost_usd,
        };
        self.purchases_processed += 1;

        self.fiat.register_consumption(
            &record.funding_source,
            purchase.total_cost,
            record.currency,
        );

        tracing::debug!(
            purchase_id = %purchase.record.id,
            quantity = %purchase.record.quantity,
            cost_usd = %purchase.total_cost_usd,
            inventory = %self.inventory.quantity,
            "Purchase processed"
        );
        Ok(())
    }

    /// Realize gain/loss for a sale at the current CPP and open its fiat entry.
    ///
    /// Nothing changes when the cost basis or gain would overflow.
    pub fn process_sale(&mut self, sale: &ValuedSale) -> Result<(), ValidationError> {
        let record = &sale.record;
        let overflow = || ValidationError::ArithmeticOverflow {
            id: record.id.to_string(),
        };

        let (cpp, cost_basis, degraded) = if self.inventory.covers(record.quantity, self.epsilon)
        {
            let cpp = self.inventory.weighted_cost().unwrap_or_default();
            let cost_basis = record.quantity.checked_mul(cpp).ok_or_else(overflow)?;
            (cpp, cost_basis, false)
        } else {
            tracing::warn!(
                sale_id = %record.id,
                requested = %record.quantity,
                available = %self.inventory.quantity,
                timestamp = %record.timestamp,
                "Insufficient stock for sale; recording proceeds as gain without cost basis"
            );
            (Decimal::zero(), Decimal::zero(), true)
        };

        let gain_loss = sale
            .net_proceeds_usd
            .checked_sub(cost_basis)
            .ok_or_else(overflow)?;
        if !degraded {
            self.remove_from_stock(record.quantity, cost_basis);
        }

        if let Err(e) = self.fiat.register_generation(
            record.id.clone(),
            record.timestamp,
            record.currency,
            sale.gross_proceeds,
        ) {
            tracing::warn!(sale_id = %record.id, error = %e, "Fiat flow not registered");
        }

        tracing::debug!(
            sale_id = %record.id,
            quantity = %record.quantity,
            cpp = %cpp,
            gain_loss = %gain_loss,
            "Sale processed"
        );

        self.sales.push(SaleOutcome {
            sale_id: record.id.clone(),
            timestamp: record.timestamp,
            quantity: record.quantity,
            currency: record.currency,
            unit_price: record.unit_price,
            exchange_rate: record.exchange_rate,
            fee: sale.fee,
            gross_proceeds: sale.gross_proceeds,
            net_proceeds_usd: sale.net_proceeds_usd,
            cpp_usd: cpp,
            cost_basis_usd: cost_basis,
            gain_loss_usd: gain_loss,
            platform: record.platform.clone(),
            degraded,
        });
        Ok(())
    }

    /// Take `quantity` out of stock along with its share of the cost.
    fn remove_from_stock(&mut self, quantity: Decimal, cost_basis: Decimal) {
        self.inventory.total_cost_usd -= cost_basis;
        self.inventory.quantity -= quantity;

        // Drop rounding dust so an emptied inventory reads exactly zero.
        if self.inventory.is_empty(self.epsilon) {
            self.inventory = Inventory::new();
        }
    }

    /// Apply a conversion to the fiat ledger. Returns false when it does not
    /// reference a tracked sale.
    pub fn apply_conversion(&mut self, conversion: &ConversionRecord) -> bool {
        let Some(sale_id) = conversion.sale_id.as_ref() else {
            return false;
        };
        let applied = self.fiat.register_conversion(sale_id);
        if !applied {
            tracing::debug!(
                conversion_id = %conversion.id,
                sale_id = %sale_id,
                "Conversion references an untracked sale, ignoring"
            );
        }
        applied
    }

    pub fn fiat_flows(&self) -> &FiatFlowTracker {
        &self.fiat
    }

    pub fn sales(&self) -> &[SaleOutcome] {
        &self.sales
    }

    /// Get the accumulated outputs.
    pub fn into_output(self) -> EngineOutput {
        EngineOutput {
            sales: self.sales,
            fiat_flows: self.fiat.into_entries(),
            inventory: self.inventory,
            purchases_processed: self.purchases_processed,
        }
    }
}

impl Default for CppEngine {
    fn default() -> Self {
        Self::new(Decimal::zero())
    }
}
