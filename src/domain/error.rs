//! Domain error types.

/// Top-level error type for stockmetrics.
#[derive(Debug, thiserror::Error)]
pub enum StockMetricsError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("price feed error for {symbol}: {reason}")]
    PriceFeed { symbol: String, reason: String },

    #[error("import error in {file}: {reason}")]
    Import { file: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&StockMetricsError> for std::process::ExitCode {
    fn from(err: &StockMetricsError) -> Self {
        let code: u8 = match err {
            StockMetricsError::Io(_) => 1,
            StockMetricsError::ConfigParse { .. }
            | StockMetricsError::ConfigMissing { .. }
            | StockMetricsError::ConfigInvalid { .. } => 2,
            StockMetricsError::Database { .. } | StockMetricsError::DatabaseQuery { .. } => 3,
            StockMetricsError::PriceFeed { .. } => 4,
            StockMetricsError::Import { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
