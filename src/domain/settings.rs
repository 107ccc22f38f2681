//! Job settings read from configuration, validated before any store is opened.

use crate::domain::error::StockMetricsError;
use crate::domain::metrics::DEFAULT_RISK_FREE_RATE;
use crate::domain::price::normalize_symbol;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

/// Five calendar years; bounds both the metrics lookback and price retention.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 5 * 365;
pub const DEFAULT_RETENTION_DAYS: i64 = 5 * 365;
pub const DEFAULT_POOL_SIZE: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSettings {
    pub risk_free_rate: f64,
    pub lookback_days: i64,
    /// Index symbol read from the price store for beta; `None` leaves beta undefined.
    pub market_symbol: Option<String>,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            market_symbol: None,
        }
    }
}

pub fn validate_settings(config: &dyn ConfigPort) -> Result<(), StockMetricsError> {
    let section = match store_backend(config)? {
        StoreBackend::Sqlite => "sqlite",
        StoreBackend::Postgres => "postgres",
    };
    pool_size(config, section)?;
    metrics_settings(config)?;
    retention_days(config)?;
    Ok(())
}

pub fn store_backend(config: &dyn ConfigPort) -> Result<StoreBackend, StockMetricsError> {
    let value = config
        .get_string("database", "backend")
        .unwrap_or_else(|| "sqlite".to_string());
    match value.trim().to_lowercase().as_str() {
        "sqlite" => Ok(StoreBackend::Sqlite),
        "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
        other => Err(StockMetricsError::ConfigInvalid {
            section: "database".to_string(),
            key: "backend".to_string(),
            reason: format!("unknown backend '{}', expected sqlite or postgres", other),
        }),
    }
}

pub fn metrics_settings(config: &dyn ConfigPort) -> Result<MetricsSettings, StockMetricsError> {
    let risk_free_rate = config.get_double("metrics", "risk_free_rate", DEFAULT_RISK_FREE_RATE);
    if !(0.0..1.0).contains(&risk_free_rate) {
        return Err(StockMetricsError::ConfigInvalid {
            section: "metrics".to_string(),
            key: "risk_free_rate".to_string(),
            reason: "risk_free_rate must be between 0 and 1".to_string(),
        });
    }

    let lookback_days = config.get_int("metrics", "lookback_days", DEFAULT_LOOKBACK_DAYS);
    if lookback_days < 1 {
        return Err(StockMetricsError::ConfigInvalid {
            section: "metrics".to_string(),
            key: "lookback_days".to_string(),
            reason: "lookback_days must be at least 1".to_string(),
        });
    }

    let market_symbol = config
        .get_string("metrics", "market_symbol")
        .map(|s| normalize_symbol(&s))
        .filter(|s| !s.is_empty());

    Ok(MetricsSettings {
        risk_free_rate,
        lookback_days,
        market_symbol,
    })
}

pub fn retention_days(config: &dyn ConfigPort) -> Result<i64, StockMetricsError> {
    let days = config.get_int("retention", "horizon_days", DEFAULT_RETENTION_DAYS);
    if days < 1 {
        return Err(StockMetricsError::ConfigInvalid {
            section: "retention".to_string(),
            key: "horizon_days".to_string(),
            reason: "horizon_days must be at least 1".to_string(),
        });
    }
    Ok(days)
}

/// Connection pool size from `[section] pool_size`; must fit in a `u32` and be at least 1.
pub fn pool_size(config: &dyn ConfigPort, section: &str) -> Result<u32, StockMetricsError> {
    let value = config.get_int(section, "pool_size", i64::from(DEFAULT_POOL_SIZE));
    match u32::try_from(value) {
        Ok(size) if size >= 1 => Ok(size),
        _ => Err(StockMetricsError::ConfigInvalid {
            section: section.to_string(),
            key: "pool_size".to_string(),
            reason: format!("pool_size must be between 1 and {}, got {}", u32::MAX, value),
        }),
    }
}

/// Parse a `YYYY-MM-DD` value supplied for `[section] key` or a CLI flag.
pub fn parse_date(value: &str, section: &str, key: &str) -> Result<NaiveDate, StockMetricsError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        StockMetricsError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: format!("invalid {} format, expected YYYY-MM-DD", key),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn defaults_when_sections_missing() {
        let cfg = config("[database]\n");
        assert_eq!(metrics_settings(&cfg).unwrap(), MetricsSettings::default());
        assert_eq!(retention_days(&cfg).unwrap(), 1825);
        assert_eq!(store_backend(&cfg).unwrap(), StoreBackend::Sqlite);
        assert!(validate_settings(&cfg).is_ok());
    }

    #[test]
    fn reads_metrics_section() {
        let cfg = config(
            "[metrics]\nrisk_free_rate = 0.035\nlookback_days = 400\nmarket_symbol = spy\n",
        );
        let settings = metrics_settings(&cfg).unwrap();
        assert!((settings.risk_free_rate - 0.035).abs() < f64::EPSILON);
        assert_eq!(settings.lookback_days, 400);
        assert_eq!(settings.market_symbol.as_deref(), Some("SPY"));
    }

    #[test]
    fn rejects_out_of_range_risk_free_rate() {
        let cfg = config("[metrics]\nrisk_free_rate = 1.5\n");
        let err = metrics_settings(&cfg).unwrap_err();
        assert!(
            matches!(err, StockMetricsError::ConfigInvalid { key, .. } if key == "risk_free_rate")
        );
    }

    #[test]
    fn rejects_zero_horizon() {
        let cfg = config("[retention]\nhorizon_days = 0\n");
        assert!(validate_settings(&cfg).is_err());
    }

    #[test]
    fn pool_size_bounds() {
        assert_eq!(pool_size(&config("[sqlite]\n"), "sqlite").unwrap(), 4);
        assert_eq!(pool_size(&config("[postgres]\npool_size = 16\n"), "postgres").unwrap(), 16);

        for bad in ["0", "-3", "4294967296"] {
            let cfg = config(&format!("[sqlite]\npool_size = {}\n", bad));
            let err = pool_size(&cfg, "sqlite").unwrap_err();
            assert!(
                matches!(err, StockMetricsError::ConfigInvalid { ref key, .. } if key == "pool_size"),
                "{bad}"
            );
        }
    }

    #[test]
    fn validation_checks_active_backend_pool() {
        let cfg = config("[database]\nbackend = postgres\n[postgres]\npool_size = 4294967296\n");
        assert!(validate_settings(&cfg).is_err());
        // an inactive backend's pool is not checked
        let cfg = config("[database]\nbackend = sqlite\n[postgres]\npool_size = 0\n");
        assert!(validate_settings(&cfg).is_ok());
    }

    #[test]
    fn backend_names() {
        assert_eq!(
            store_backend(&config("[database]\nbackend = PostgreSQL\n")).unwrap(),
            StoreBackend::Postgres
        );
        assert!(store_backend(&config("[database]\nbackend = mysql\n")).is_err());
    }

    #[test]
    fn parse_date_formats() {
        assert_eq!(
            parse_date("2024-03-01", "update", "date").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
        assert!(parse_date("2024/03/01", "update", "date").is_err());
    }
}
