pub mod compile;
pub mod config;
pub mod datasource;
pub mod domain;
pub mod engine;
pub mod error;
pub mod export;
pub mod report;

pub use compile::{Compiler, RunInput, RunOutput, RunStatistics};
pub use config::{Config, LedgerSettings};
pub use datasource::{CsvRecordSource, MemoryRecordSource, RecordSource, SourceError};
pub use domain::{
    ConversionRecord, Currency, Decimal, FundingSource, Platform, PurchaseRecord, SaleRecord,
    Timestamp,
};
pub use engine::{CppEngine, FiatFlowEntry, FiatStatus, SaleOutcome};
pub use error::AppError;
pub use export::{ExportError, ReportWriter};
pub use report::Report;
