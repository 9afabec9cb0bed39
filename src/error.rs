use thiserror::Error;

use crate::config::ConfigError;
use crate::datasource::SourceError;
use crate::export::ExportError;

/// Fatal, run-level failures. Per-record problems never surface here; they
/// are reported on [`crate::compile::RunOutput`] instead.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Failed to load records: {0}")]
    Source(#[from] SourceError),
    #[error("Failed to write reports: {0}")]
    Export(#[from] ExportError),
    #[error("Failed to write sample input files: {0}")]
    Seed(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display_wraps_cause() {
        let err: AppError =
            ConfigError::InvalidValue("FEE_RATE_USD".to_string(), "not a decimal".to_string())
                .into();
        assert_eq!(
            err.to_string(),
            "Configuration error: Invalid value for FEE_RATE_USD: not a decimal"
        );
    }
}
