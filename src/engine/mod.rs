//! Pure computation engine(s) for deterministic ledger logic.

pub mod fees;
pub mod fiat_flow;
pub mod inventory;
pub mod valuation;

pub use fees::FeeSchedule;
pub use fiat_flow::{Consumption, FiatFlowEntry, FiatFlowError, FiatFlowTracker, FiatStatus};
pub use inventory::{CppEngine, EngineOutput, Inventory, SaleOutcome, ValuedEvent};
pub use valuation::{value_purchase, value_sale, ValidationError, ValuedPurchase, ValuedSale};
