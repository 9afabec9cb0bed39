//! In-memory record source for tests and embedding.

use super::{Loaded, RecordSource, SourceError};
use crate::domain::{ConversionRecord, PurchaseRecord, SaleRecord};

/// Record source that returns predefined records.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordSource {
    purchases: Vec<PurchaseRecord>,
    sales: Vec<SaleRecord>,
    conversions: Vec<ConversionRecord>,
}

impl MemoryRecordSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_purchase(mut self, purchase: PurchaseRecord) -> Self {
        self.purchases.push(purchase);
        self
    }

    pub fn with_purchases(mut self, purchases: Vec<PurchaseRecord>) -> Self {
        self.purchases.extend(purchases);
        self
    }

    pub fn with_sale(mut self, sale: SaleRecord) -> Self {
        self.sales.push(sale);
        self
    }

    pub fn with_sales(mut self, sales: Vec<SaleRecord>) -> Self {
        self.sales.extend(sales);
        self
    }

    pub fn with_conversion(mut self, conversion: ConversionRecord) -> Self {
        self.conversions.push(conversion);
        self
    }
}

impl RecordSource for MemoryRecordSource {
    fn load_purchases(&self) -> Result<Loaded<PurchaseRecord>, SourceError> {
        Ok(Loaded::new(self.purchases.clone()))
    }

    fn load_sales(&self) -> Result<Loaded<SaleRecord>, SourceError> {
        Ok(Loaded::new(self.sales.clone()))
    }

    fn load_conversions(&self) -> Result<Loaded<ConversionRecord>, SourceError> {
        Ok(Loaded::new(self.conversions.clone()))
    }
}
