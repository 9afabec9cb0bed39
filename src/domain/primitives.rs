//! Domain primitives: Timestamp, Currency, Platform and record identifiers.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Output format for timestamps in reports.
pub const TIMESTAMP_DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrimitiveParseError {
    #[error("invalid timestamp: {0:?}")]
    Timestamp(String),
    #[error("unsupported currency: {0:?} (expected USD or UYU)")]
    Currency(String),
}

/// Wall-clock time of a ledger event (local, no timezone).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub NaiveDateTime);

impl Timestamp {
    pub fn new(value: NaiveDateTime) -> Self {
        Timestamp(value)
    }

    /// Parse the formats found in hand-kept ledgers; a bare date means midnight.
    pub fn parse(s: &str) -> Result<Self, PrimitiveParseError> {
        let s = s.trim();
        for format in TIMESTAMP_FORMATS {
            if let Ok(t) = NaiveDateTime::parse_from_str(s, format) {
                return Ok(Timestamp(t));
            }
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(Timestamp)
            .ok_or_else(|| PrimitiveParseError::Timestamp(s.to_string()))
    }

    pub fn as_naive(&self) -> NaiveDateTime {
        self.0
    }

    pub fn date(&self) -> NaiveDate {
        self.0.date()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_DISPLAY_FORMAT))
    }
}

impl FromStr for Timestamp {
    type Err = PrimitiveParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Fiat currency a trade is settled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Uyu,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Uyu => "UYU",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = PrimitiveParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "UYU" => Ok(Currency::Uyu),
            _ => Err(PrimitiveParseError::Currency(s.to_string())),
        }
    }
}

/// Trading venue, normalized to lowercase so comparisons are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Platform(String);

impl Platform {
    /// Platform used when a ledger row does not name one.
    pub const UNSPECIFIED: &'static str = "otro";

    pub fn new(name: &str) -> Self {
        let name = name.trim();
        if name.is_empty() {
            Platform(Self::UNSPECIFIED.to_string())
        } else {
            Platform(name.to_lowercase())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against a configured platform name.
    pub fn matches(&self, name: &str) -> bool {
        self.0 == name.trim().to_lowercase()
    }
}

impl Default for Platform {
    fn default() -> Self {
        Platform(Self::UNSPECIFIED.to_string())
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                $name(id.into().trim().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

record_id!(
    /// Caller-assigned purchase id (`C<n>`).
    PurchaseId
);
record_id!(
    /// Caller-assigned sale id (`V<n>`).
    SaleId
);
record_id!(
    /// Caller-assigned fiat conversion id (`CF<n>`).
    ConversionId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_formats() {
        let a = Timestamp::parse("2023-01-01 10:00:00").unwrap();
        let b = Timestamp::parse("2023-01-01T10:00:00").unwrap();
        let c = Timestamp::parse("2023-01-01 10:00").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);

        let frac = Timestamp::parse("2023-01-01 10:00:00.250").unwrap();
        assert!(frac > a);

        let midnight = Timestamp::parse("2023-01-01").unwrap();
        assert_eq!(midnight.to_string(), "2023-01-01 00:00:00");
    }

    #[test]
    fn test_timestamp_rejects_garbage() {
        assert!(matches!(
            Timestamp::parse("yesterday"),
            Err(PrimitiveParseError::Timestamp(_))
        ));
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!("usd".parse::<Currency>().unwrap(), Currency::Usd);
        assert_eq!(" UYU ".parse::<Currency>().unwrap(), Currency::Uyu);
        assert!("EUR".parse::<Currency>().is_err());
        assert_eq!(Currency::Uyu.to_string(), "UYU");
    }

    #[test]
    fn test_currency_serialization() {
        let json = serde_json::to_string(&Currency::Usd).unwrap();
        assert_eq!(json, "\"USD\"");
    }

    #[test]
    fn test_platform_case_insensitive() {
        let p = Platform::new("Binance");
        assert_eq!(p.as_str(), "binance");
        assert!(p.matches("BINANCE"));
        assert!(!p.matches("okx"));
        assert_eq!(Platform::new("  ").as_str(), "otro");
    }

    #[test]
    fn test_record_ids_trim() {
        assert_eq!(SaleId::new(" V1 ").as_str(), "V1");
        assert_eq!(PurchaseId::new("C7").to_string(), "C7");
    }
}
