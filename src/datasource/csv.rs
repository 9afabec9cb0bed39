//! CSV ledger files.
//!
//! Headers may be the snake_case names used by the sample files or the
//! column names of the Spanish spreadsheet ledger (`ID_Compra`, ...).

use super::{Loaded, RecordSource, SkippedRow, SourceError};
use crate::domain::{
    ConversionId, ConversionRecord, Currency, Decimal, FundingSource, Platform, PurchaseId,
    PurchaseRecord, SaleId, SaleRecord, Timestamp,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// Record source backed by three CSV files.
#[derive(Debug, Clone)]
pub struct CsvRecordSource {
    purchases_path: PathBuf,
    sales_path: PathBuf,
    conversions_path: Option<PathBuf>,
}

impl CsvRecordSource {
    pub fn new(purchases_path: impl Into<PathBuf>, sales_path: impl Into<PathBuf>) -> Self {
        Self {
            purchases_path: purchases_path.into(),
            sales_path: sales_path.into(),
            conversions_path: None,
        }
    }

    pub fn with_conversions(mut self, conversions_path: impl Into<PathBuf>) -> Self {
        self.conversions_path = Some(conversions_path.into());
        self
    }
}

impl RecordSource for CsvRecordSource {
    fn load_purchases(&self) -> Result<Loaded<PurchaseRecord>, SourceError> {
        load_file(&self.purchases_path, PurchaseRow::into_record)
    }

    fn load_sales(&self) -> Result<Loaded<SaleRecord>, SourceError> {
        load_file(&self.sales_path, SaleRow::into_record)
    }

    fn load_conversions(&self) -> Result<Loaded<ConversionRecord>, SourceError> {
        match &self.conversions_path {
            Some(path) => load_file(path, ConversionRow::into_record),
            None => Ok(Loaded::default()),
        }
    }
}

fn load_file<R, T>(
    path: &Path,
    convert: fn(R) -> Result<T, String>,
) -> Result<Loaded<T>, SourceError>
where
    R: DeserializeOwned,
{
    let name = path.display().to_string();
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::warn!(path = %name, "Input file not found, treating as empty");
            return Ok(Loaded::default());
        }
        Err(e) => {
            return Err(SourceError::Io {
                path: name,
                message: e.to_string(),
            })
        }
    };

    let loaded = parse_csv(file, &name, convert)?;
    tracing::info!(
        path = %name,
        loaded = loaded.records.len(),
        skipped = loaded.skipped.len(),
        "Loaded input file"
    );
    Ok(loaded)
}

/// Parse CSV rows from any reader, skipping (and reporting) bad rows.
pub fn parse_csv<Rd, R, T>(
    reader: Rd,
    source: &str,
    convert: fn(R) -> Result<T, String>,
) -> Result<Loaded<T>, SourceError>
where
    Rd: io::Read,
    R: DeserializeOwned,
{
    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(::csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| SourceError::Csv {
            path: source.to_string(),
            message: e.to_string(),
        })?
        .clone();

    let mut loaded = Loaded::default();
    for result in reader.records() {
        let parsed = result
            .map_err(|e| (e.position().map(|p| p.line()), e.to_string()))
            .and_then(|record| {
                let line = record.position().map(|p| p.line());
                record
                    .deserialize::<R>(Some(&headers))
                    .map_err(|e| e.to_string())
                    .and_then(convert)
                    .map_err(|reason| (line, reason))
            });

        match parsed {
            Ok(record) => loaded.records.push(record),
            Err((line, reason)) => {
                tracing::warn!(
                    source = %source,
                    line = ?line,
                    reason = %reason,
                    "Skipping malformed row"
                );
                loaded.skipped.push(SkippedRow {
                    source: source.to_string(),
                    line,
                    reason,
                });
            }
        }
    }
    Ok(loaded)
}

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, String> {
    let value = value.trim();
    if value.is_empty() {
        Err(format!("missing {}", field))
    } else {
        Ok(value)
    }
}

fn is_blank(value: &Option<String>) -> bool {
    match value.as_deref().map(str::trim) {
        None | Some("") => true,
        Some(v) => v.eq_ignore_ascii_case("nan"),
    }
}

fn decimal(field: &str, value: &str) -> Result<Decimal, String> {
    let value = required(field, value)?;
    Decimal::from_str_canonical(value).map_err(|e| format!("invalid {} {:?}: {}", field, value, e))
}

fn decimal_or(field: &str, value: &Option<String>, default: Decimal) -> Result<Decimal, String> {
    if is_blank(value) {
        return Ok(default);
    }
    decimal(field, value.as_deref().unwrap_or_default())
}

fn timestamp(value: &str) -> Result<Timestamp, String> {
    Timestamp::parse(required("timestamp", value)?).map_err(|e| e.to_string())
}

fn currency(value: &str) -> Result<Currency, String> {
    required("currency", value)?
        .parse::<Currency>()
        .map_err(|e| e.to_string())
}

/// Blank rates default to 1 for USD; a UYU row must state its rate.
fn exchange_rate(currency: Currency, value: &Option<String>) -> Result<Decimal, String> {
    if is_blank(value) && currency == Currency::Uyu {
        return Err("missing exchange rate for UYU".to_string());
    }
    decimal_or("exchange rate", value, Decimal::one())
}

fn platform(value: &Option<String>) -> Platform {
    if is_blank(value) {
        Platform::default()
    } else {
        Platform::new(value.as_deref().unwrap_or_default())
    }
}

#[derive(Debug, Deserialize)]
struct PurchaseRow {
    #[serde(alias = "ID_Compra")]
    id: String,
    #[serde(alias = "Fecha_Compra")]
    timestamp: String,
    #[serde(alias = "Cantidad_USDT_Comprada")]
    quantity: String,
    #[serde(alias = "Moneda_Pago")]
    currency: String,
    #[serde(alias = "Precio_Unitario_Moneda_Pago")]
    unit_price: String,
    #[serde(default, alias = "Tasa_Cambio_UYU_USD_Compra")]
    exchange_rate: Option<String>,
    #[serde(default, alias = "Fuente_De_Fondos_Fiat")]
    funding_source: Option<String>,
    #[serde(default, alias = "Comisiones_Compra_Moneda_Pago")]
    fee: Option<String>,
    #[serde(default, alias = "Plataforma")]
    platform: Option<String>,
}

impl PurchaseRow {
    fn into_record(self) -> Result<PurchaseRecord, String> {
        let currency = currency(&self.currency)?;
        Ok(PurchaseRecord {
            id: PurchaseId::new(required("id", &self.id)?),
            timestamp: timestamp(&self.timestamp)?,
            quantity: decimal("quantity", &self.quantity)?,
            currency,
            unit_price: decimal("unit price", &self.unit_price)?,
            exchange_rate: exchange_rate(currency, &self.exchange_rate)?,
            funding_source: FundingSource::parse(
                self.funding_source.as_deref().unwrap_or_default(),
            ),
            fee: decimal_or("fee", &self.fee, Decimal::zero())?,
            platform: platform(&self.platform),
        })
    }
}

#[derive(Debug, Deserialize)]
struct SaleRow {
    #[serde(alias = "ID_Venta")]
    id: String,
    #[serde(alias = "Fecha_Venta")]
    timestamp: String,
    #[serde(alias = "Cantidad_USDT_Vendida")]
    quantity: String,
    #[serde(alias = "Moneda_Recibida")]
    currency: String,
    #[serde(alias = "Precio_Unitario_Moneda_Recibida")]
    unit_price: String,
    #[serde(default, alias = "Tasa_Cambio_UYU_USD_Venta")]
    exchange_rate: Option<String>,
    #[serde(default, alias = "Comisiones_Venta_Moneda_Recibida")]
    fee: Option<String>,
    #[serde(default, alias = "Plataforma")]
    platform: Option<String>,
}

impl SaleRow {
    fn into_record(self) -> Result<SaleRecord, String> {
        let currency = currency(&self.currency)?;
        Ok(SaleRecord {
            id: SaleId::new(required("id", &self.id)?),
            timestamp: timestamp(&self.timestamp)?,
            quantity: decimal("quantity", &self.quantity)?,
            currency,
            unit_price: decimal("unit price", &self.unit_price)?,
            exchange_rate: exchange_rate(currency, &self.exchange_rate)?,
            fee: decimal_or("fee", &self.fee, Decimal::zero())?,
            platform: platform(&self.platform),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ConversionRow {
    #[serde(alias = "ID_Conversion")]
    id: String,
    #[serde(alias = "Fecha_Conversion")]
    timestamp: String,
    #[serde(alias = "Moneda_Origen")]
    source_currency: String,
    #[serde(alias = "Cantidad_Origen")]
    source_amount: String,
    #[serde(alias = "Moneda_Destino")]
    destination_currency: String,
    #[serde(alias = "Cantidad_Destino")]
    destination_amount: String,
    #[serde(default, alias = "ID_Venta_Asociada")]
    sale_id: Option<String>,
    #[serde(default, alias = "Notas")]
    note: Option<String>,
}

impl ConversionRow {
    fn into_record(self) -> Result<ConversionRecord, String> {
        Ok(ConversionRecord {
            id: ConversionId::new(required("id", &self.id)?),
            timestamp: timestamp(&self.timestamp)?,
            source_currency: currency(&self.source_currency)?,
            source_amount: decimal("source amount", &self.source_amount)?,
            destination_currency: currency(&self.destination_currency)?,
            destination_amount: decimal("destination amount", &self.destination_amount)?,
            sale_id: ConversionRecord::parse_sale_reference(
                self.sale_id.as_deref().unwrap_or_default(),
            ),
            note: self.note.unwrap_or_default().trim().to_string(),
        })
    }
}

const SAMPLE_PURCHASES: &str = "\
id,timestamp,quantity,currency,unit_price,exchange_rate,funding_source,fee,platform
C1,2023-01-01 10:00:00,100.0,UYU,39.5,39.5,Ahorros UYU,0.0,binance
C2,2023-01-05 15:30:00,50.0,USD,1.01,1.0,Ahorros USD,0.0,otro
";

const SAMPLE_SALES: &str = "\
id,timestamp,quantity,currency,unit_price,exchange_rate,fee,platform
V1,2023-01-10 12:00:00,70.0,UYU,40.5,40.0,0.0,binance
";

const SAMPLE_CONVERSIONS: &str = "\
id,timestamp,source_currency,source_amount,destination_currency,destination_amount,sale_id,note
CF1,2023-01-11 09:00:00,UYU,2835.0,USD,70.0,V1,Conversion of V1 proceeds from UYU to USD
";

/// Write sample input files where none exist yet. Returns the files created.
pub fn write_sample_files(
    purchases_path: &Path,
    sales_path: &Path,
    conversions_path: &Path,
) -> io::Result<Vec<PathBuf>> {
    let mut created = Vec::new();
    for (path, contents) in [
        (purchases_path, SAMPLE_PURCHASES),
        (sales_path, SAMPLE_SALES),
        (conversions_path, SAMPLE_CONVERSIONS),
    ] {
        if path.exists() {
            continue;
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        tracing::info!(path = %path.display(), "Created sample input file");
        created.push(path.to_path_buf());
    }
    Ok(created)
}
