//! Record source abstraction for loading purchases, sales and conversions.

use crate::domain::{ConversionRecord, PurchaseRecord, SaleRecord};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub mod csv;
pub mod memory;

pub use self::csv::{write_sample_files, CsvRecordSource};
pub use memory::MemoryRecordSource;

/// Supplies ledger records to a run.
///
/// Implementations skip rows they cannot parse and report them in
/// [`Loaded::skipped`]; only failures affecting a whole collection are errors.
pub trait RecordSource: fmt::Debug {
    fn load_purchases(&self) -> Result<Loaded<PurchaseRecord>, SourceError>;

    fn load_sales(&self) -> Result<Loaded<SaleRecord>, SourceError>;

    fn load_conversions(&self) -> Result<Loaded<ConversionRecord>, SourceError>;
}

/// Records loaded from one collection plus the rows that were skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loaded<T> {
    pub records: Vec<T>,
    pub skipped: Vec<SkippedRow>,
}

impl<T> Loaded<T> {
    pub fn new(records: Vec<T>) -> Self {
        Loaded {
            records,
            skipped: Vec::new(),
        }
    }
}

impl<T> Default for Loaded<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// A row dropped during loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    /// Collection (file) the row came from.
    pub source: String,
    /// 1-based line number, when known.
    pub line: Option<u64>,
    pub reason: String,
}

impl fmt::Display for SkippedRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}: {}", self.source, line, self.reason),
            None => write!(f, "{}: {}", self.source, self.reason),
        }
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("io error reading {path}: {message}")]
    Io { path: String, message: String },
    #[error("csv error in {path}: {message}")]
    Csv { path: String, message: String },
}
