//! CLI integration tests: configuration files on disk driving the stores.
//!
//! Tests cover:
//! - Settings parsed from a real INI file (load_config, validate_settings)
//! - Symbol resolution for `fetch`
//! - CSV import into a file-backed SQLite store, then an update pass
//! - Argument parsing for every subcommand

mod common;

use clap::Parser;
use common::*;
use std::io::Write;
use std::path::Path;
use stockmetrics::cli::{self, Cli, Command};
use stockmetrics::domain::error::StockMetricsError;
use stockmetrics::domain::settings::{
    metrics_settings, retention_days, store_backend, validate_settings, StoreBackend,
};
use stockmetrics::ports::config_port::ConfigPort;

fn write_temp(content: &str, suffix: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn sqlite_ini(db_path: &Path) -> String {
    format!(
        r#"
[database]
backend = sqlite

[sqlite]
path = {}
pool_size = 2

[metrics]
risk_free_rate = 0.03
lookback_days = 1825

[retention]
horizon_days = 1825

[logging]
level = warn
"#,
        db_path.display()
    )
}

mod config_loading {
    use super::*;

    #[test]
    fn reads_settings_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let ini = write_temp(&sqlite_ini(&dir.path().join("prices.db")), ".ini");

        let config = cli::load_config(Some(ini.path())).unwrap();

        assert!(validate_settings(&config).is_ok());
        assert_eq!(store_backend(&config).unwrap(), StoreBackend::Sqlite);
        assert_eq!(retention_days(&config).unwrap(), 1825);
        let settings = metrics_settings(&config).unwrap();
        assert_eq!(settings.risk_free_rate, 0.03);
        assert_eq!(settings.market_symbol, None);
        assert_eq!(config.get_int("sqlite", "pool_size", 4), 2);
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = cli::load_config(Some(Path::new("/nonexistent/stockmetrics.ini")))
            .err()
            .unwrap();
        assert!(matches!(err, StockMetricsError::ConfigParse { .. }));
        let code: std::process::ExitCode = (&err).into();
        assert_eq!(format!("{:?}", code), format!("{:?}", std::process::ExitCode::from(2)));
    }

    #[test]
    fn no_file_means_defaults() {
        let config = cli::load_config(None).unwrap();
        assert!(metrics_settings(&config).is_ok());
    }

    #[test]
    fn sqlite_backend_requires_path() {
        let ini = write_temp("[database]\nbackend = sqlite\n", ".ini");
        let config = cli::load_config(Some(ini.path())).unwrap();
        let err = cli::Stores::open(&config).err().unwrap();
        assert!(matches!(err, StockMetricsError::ConfigMissing { key, .. } if key == "path"));
    }
}

mod symbol_resolution {
    use super::*;

    #[test]
    fn explicit_list_is_normalized() {
        let store = MockPriceStore::new();
        let symbols = cli::resolve_symbols(Some("aapl, msft,,ibm "), &store).unwrap();
        assert_eq!(symbols, vec!["AAPL", "MSFT", "IBM"]);
    }

    #[test]
    fn defaults_to_stored_symbols() {
        let store = MockPriceStore::new()
            .with_prices("SPY", date(2024, 1, 1), &[470.0])
            .with_prices("AAPL", date(2024, 1, 1), &[180.0]);
        let symbols = cli::resolve_symbols(None, &store).unwrap();
        assert_eq!(symbols, vec!["AAPL", "SPY"]);
    }
}

#[cfg(feature = "sqlite")]
mod import_then_update {
    use super::*;
    use stockmetrics::adapters::csv_adapter::read_price_file;
    use stockmetrics::domain::market::UnavailableMarketData;
    use stockmetrics::domain::update::{update_all_metrics, UpdateContext};

    #[test]
    fn csv_to_metrics_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("prices.db");
        let ini = write_temp(&sqlite_ini(&db_path), ".ini");
        let config = cli::load_config(Some(ini.path())).unwrap();

        let stores = cli::Stores::open(&config).unwrap();
        stores.initialize_schema().unwrap();

        let mut csv = String::from("date,close\n");
        let start = date(2024, 1, 1);
        for (i, p) in wavy_prices(40, 95.0).iter().enumerate() {
            let d = start + chrono::Duration::days(i as i64);
            csv.push_str(&format!("{},{}\n", d.format("%Y-%m-%d"), p));
        }
        let file = write_temp(&csv, ".csv");
        let points = read_price_file(file.path(), Some("acme")).unwrap();
        assert_eq!(stores.prices().upsert_batch(&points).unwrap(), 40);

        let as_of = date(2024, 2, 9);
        let ctx = UpdateContext {
            prices: stores.prices(),
            metrics: stores.metrics(),
            market: &UnavailableMarketData,
            settings: metrics_settings(&config).unwrap(),
        };
        let summary = update_all_metrics(&ctx, as_of).unwrap();
        assert_eq!(summary.updated, vec!["ACME".to_string()]);

        // reopen: rows survive on disk
        drop(stores);
        let reopened = cli::Stores::open(&config).unwrap();
        let row = reopened.metrics().get("ACME", as_of).unwrap().unwrap();
        assert!(row.rsi_14.is_some());
        assert!(row.beta_1y.is_none());
        assert!(cli::format_metrics(&row).contains("rsi_14"));
        assert_eq!(reopened.prices().list_symbols().unwrap(), vec!["ACME"]);
    }
}

mod argument_parsing {
    use super::*;

    #[test]
    fn every_subcommand_parses() {
        let cases: &[&[&str]] = &[
            &["stockmetrics", "init", "-c", "a.ini"],
            &["stockmetrics", "import", "--file", "p.csv", "--symbol", "AAPL"],
            &["stockmetrics", "fetch", "--symbols", "AAPL,MSFT"],
            &["stockmetrics", "update", "--date", "2024-06-28"],
            &["stockmetrics", "compute", "--symbol", "AAPL"],
            &["stockmetrics", "purge", "--days", "365"],
            &["stockmetrics", "info", "-s", "AAPL"],
            &["stockmetrics", "list-symbols", "--config", "a.ini"],
        ];
        for args in cases {
            assert!(Cli::try_parse_from(*args).is_ok(), "{args:?}");
        }
    }

    #[test]
    fn compute_requires_symbol() {
        assert!(Cli::try_parse_from(["stockmetrics", "compute"]).is_err());
    }

    #[test]
    fn purge_days_must_be_numeric() {
        assert!(Cli::try_parse_from(["stockmetrics", "purge", "--days", "five"]).is_err());
        let cli = Cli::try_parse_from(["stockmetrics", "purge"]).unwrap();
        assert!(matches!(cli.command, Command::Purge { days: None, .. }));
    }
}
