//! Report writers: sale P&L table, fiat-flow table and a JSON summary.
//!
//! Amounts are rounded to [`EXPORT_SCALE`](crate::domain::decimal::EXPORT_SCALE)
//! digits here and nowhere else. Every file is staged next to its target and
//! renamed into place, so a failed run leaves earlier reports untouched.

use crate::compile::{RecordKind, RunOutput, RunStatistics};
use crate::config::LedgerSettings;
use crate::datasource::SkippedRow;
use crate::engine::{FiatFlowEntry, SaleOutcome};
use crate::report::Report;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const SALES_REPORT_FILE: &str = "sales_pl_report.csv";
pub const FIAT_FLOW_REPORT_FILE: &str = "fiat_flow_report.csv";
pub const SUMMARY_FILE: &str = "summary.json";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("io error writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("csv encoding failed: {0}")]
    Csv(#[from] ::csv::Error),
    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
struct SaleRow<'a> {
    sale_id: &'a str,
    timestamp: String,
    quantity_usdt: String,
    currency: &'static str,
    unit_price: String,
    exchange_rate: String,
    fee: String,
    gross_proceeds: String,
    net_proceeds_usd: String,
    cpp_usd: String,
    cost_basis_usd: String,
    gain_loss_usd: String,
    platform: &'a str,
    degraded: bool,
}

impl<'a> From<&'a SaleOutcome> for SaleRow<'a> {
    fn from(sale: &'a SaleOutcome) -> Self {
        SaleRow {
            sale_id: sale.sale_id.as_str(),
            timestamp: sale.timestamp.to_string(),
            quantity_usdt: sale.quantity.to_export_string(),
            currency: sale.currency.code(),
            unit_price: sale.unit_price.to_export_string(),
            exchange_rate: sale.exchange_rate.to_export_string(),
            fee: sale.fee.to_export_string(),
            gross_proceeds: sale.gross_proceeds.to_export_string(),
            net_proceeds_usd: sale.net_proceeds_usd.to_export_string(),
            cpp_usd: sale.cpp_usd.to_export_string(),
            cost_basis_usd: sale.cost_basis_usd.to_export_string(),
            gain_loss_usd: sale.gain_loss_usd.to_export_string(),
            platform: sale.platform.as_str(),
            degraded: sale.degraded,
        }
    }
}

#[derive(Debug, Serialize)]
struct FiatFlowRow<'a> {
    sale_id: &'a str,
    sale_timestamp: String,
    currency: &'static str,
    generated: String,
    consumed: String,
    available: String,
    status: &'static str,
}

impl<'a> From<&'a FiatFlowEntry> for FiatFlowRow<'a> {
    fn from(entry: &'a FiatFlowEntry) -> Self {
        FiatFlowRow {
            sale_id: entry.sale_id.as_str(),
            sale_timestamp: entry.sale_timestamp.to_string(),
            currency: entry.currency.code(),
            generated: entry.generated.to_export_string(),
            consumed: entry.consumed.to_export_string(),
            available: entry.available.to_export_string(),
            status: entry.status.as_str(),
        }
    }
}

#[derive(Debug, Serialize)]
struct RejectionRow<'a> {
    kind: RecordKind,
    record_id: &'a str,
    reason: String,
}

#[derive(Debug, Serialize)]
struct SummaryDocument<'a> {
    generated_at: DateTime<Utc>,
    fingerprint: &'a str,
    settings: &'a LedgerSettings,
    statistics: &'a RunStatistics,
    report: Report,
    rejected: Vec<RejectionRow<'a>>,
    skipped: &'a [SkippedRow],
}

fn encode_csv<'a, T, R>(items: &'a [T]) -> Result<Vec<u8>, ExportError>
where
    R: Serialize + From<&'a T>,
{
    let mut writer = ::csv::Writer::from_writer(Vec::new());
    for item in items {
        writer.serialize(R::from(item))?;
    }
    writer
        .into_inner()
        .map_err(|e| ExportError::Csv(e.into_error().into()))
}

pub fn render_sales_csv(sales: &[SaleOutcome]) -> Result<Vec<u8>, ExportError> {
    encode_csv::<_, SaleRow>(sales)
}

pub fn render_fiat_flow_csv(flows: &[FiatFlowEntry]) -> Result<Vec<u8>, ExportError> {
    encode_csv::<_, FiatFlowRow>(flows)
}

fn hash_var(hasher: &mut Sha256, data: &[u8]) {
    hasher.update((data.len() as u64).to_le_bytes());
    hasher.update(data);
}

/// SHA-256 (hex) over the exported CSV tables. Equal inputs and settings
/// give equal fingerprints; run metadata is not included.
pub fn fingerprint(output: &RunOutput) -> Result<String, ExportError> {
    let sales = render_sales_csv(&output.sales)?;
    let flows = render_fiat_flow_csv(&output.fiat_flows)?;
    Ok(fingerprint_tables(&sales, &flows))
}

fn fingerprint_tables(sales: &[u8], flows: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hash_var(&mut hasher, sales);
    hash_var(&mut hasher, flows);
    hex::encode(hasher.finalize())
}

/// Paths written by [`ReportWriter::write`] and the run fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportManifest {
    pub sales_report: PathBuf,
    pub fiat_flow_report: PathBuf,
    pub summary: PathBuf,
    pub fingerprint: String,
}

/// Writes the three report files into one directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Render everything first, then replace the files on disk.
    pub fn write(&self, output: &RunOutput) -> Result<ExportManifest, ExportError> {
        self.write_at(output, Utc::now())
    }

    pub fn write_at(
        &self,
        output: &RunOutput,
        generated_at: DateTime<Utc>,
    ) -> Result<ExportManifest, ExportError> {
        let sales = render_sales_csv(&output.sales)?;
        let flows = render_fiat_flow_csv(&output.fiat_flows)?;
        let fingerprint = fingerprint_tables(&sales, &flows);

        let document = SummaryDocument {
            generated_at,
            fingerprint: &fingerprint,
            settings: &output.settings,
            statistics: &output.statistics,
            report: Report::from_run(output),
            rejected: output
                .rejected
                .iter()
                .map(|r| RejectionRow {
                    kind: r.kind,
                    record_id: r.error.record_id(),
                    reason: r.error.to_string(),
                })
                .collect(),
            skipped: &output.skipped,
        };
        let summary = serde_json::to_vec_pretty(&document)?;

        fs::create_dir_all(&self.dir).map_err(|e| io_error(&self.dir, e))?;

        let manifest = ExportManifest {
            sales_report: self.dir.join(SALES_REPORT_FILE),
            fiat_flow_report: self.dir.join(FIAT_FLOW_REPORT_FILE),
            summary: self.dir.join(SUMMARY_FILE),
            fingerprint,
        };
        write_atomic(&manifest.sales_report, &sales)?;
        write_atomic(&manifest.fiat_flow_report, &flows)?;
        write_atomic(&manifest.summary, &summary)?;

        tracing::info!(
            dir = %self.dir.display(),
            sales = output.sales.len(),
            fiat_flows = output.fiat_flows.len(),
            fingerprint = %manifest.fingerprint,
            "Reports written"
        );

        Ok(manifest)
    }
}

/// Write `contents` to a sibling temp file, then rename it over `path`.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), ExportError> {
    let mut staged = path.as_os_str().to_owned();
    staged.push(".tmp");
    let staged = PathBuf::from(staged);

    fs::write(&staged, contents).map_err(|e| io_error(&staged, e))?;
    if let Err(e) = fs::rename(&staged, path) {
        let _ = fs::remove_file(&staged);
        return Err(io_error(path, e));
    }
    Ok(())
}

fn io_error(path: &Path, source: std::io::Error) -> ExportError {
    ExportError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{Compiler, RunInput};
    use crate::domain::{
        Currency, Decimal, FundingSource, PurchaseId, PurchaseRecord, SaleId, SaleRecord,
        Timestamp,
    };

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    fn sample_output() -> RunOutput {
        let purchases = vec![
            PurchaseRecord::new(
                PurchaseId::new("C1"),
                ts("2023-01-01 10:00:00"),
                d("100"),
                Currency::Usd,
                d("1"),
            ),
            PurchaseRecord::new(
                PurchaseId::new("C2"),
                ts("2023-01-20 10:00:00"),
                d("10"),
                Currency::Usd,
                d("1"),
            )
            .with_funding_source(FundingSource::FromSale(SaleId::new("V1"))),
        ];
        let sales = vec![SaleRecord::new(
            SaleId::new("V1"),
            ts("2023-01-10 12:00:00"),
            d("30"),
            Currency::Usd,
            d("1.0123456789"),
        )];
        Compiler::default().compile(RunInput::new(purchases, sales))
    }

    #[test]
    fn test_sales_csv_rounds_on_export() {
        let csv = String::from_utf8(render_sales_csv(&sample_output().sales).unwrap()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "sale_id,timestamp,quantity_usdt,currency,unit_price,exchange_rate,fee,\
             gross_proceeds,net_proceeds_usd,cpp_usd,cost_basis_usd,gain_loss_usd,platform,degraded"
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("V1,2023-01-10 12:00:00,30,USD,1.01234568,1,0,"));
        assert!(row.ends_with(",otro,false"));
    }

    #[test]
    fn test_fiat_flow_csv() {
        let csv =
            String::from_utf8(render_fiat_flow_csv(&sample_output().fiat_flows).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "sale_id,sale_timestamp,currency,generated,consumed,available,status"
        );
        assert!(lines[1].starts_with("V1,2023-01-10 12:00:00,USD,"));
        assert!(lines[1].ends_with(",10,20.37037037,partially_used"));
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = fingerprint(&sample_output()).unwrap();
        let b = fingerprint(&sample_output()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let empty = fingerprint(&Compiler::default().compile(RunInput::default())).unwrap();
        assert_ne!(a, empty);
    }

    #[test]
    fn test_write_replaces_reports() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path().join("reports"));
        let output = sample_output();

        let first = writer.write(&output).unwrap();
        let second = writer.write(&output).unwrap();
        assert_eq!(first, second);

        assert!(first.sales_report.exists());
        assert!(first.fiat_flow_report.exists());
        assert!(!dir.path().join("reports/summary.json.tmp").exists());

        let summary: serde_json::Value =
            serde_json::from_slice(&fs::read(&first.summary).unwrap()).unwrap();
        assert_eq!(summary["fingerprint"], first.fingerprint);
        assert_eq!(summary["statistics"]["sales_processed"], 1);
        assert_eq!(summary["report"]["summary"]["total_sales"], 1);
        assert!(summary["generated_at"].is_string());
        assert_eq!(summary["settings"]["reference_platform"], "binance");
    }
}
