//! CLI definition and dispatch.

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::read_price_file;
use crate::adapters::env_config_adapter::{EnvConfigAdapter, LayeredConfig};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::error::StockMetricsError;
use crate::domain::market::{StoredIndexMarketData, UnavailableMarketData};
use crate::domain::metrics::{MetricsRow, METRIC_NAMES};
use crate::domain::price::normalize_symbol;
use crate::domain::retention::{purge_cutoff, purge_expired};
use crate::domain::settings::{
    metrics_settings, parse_date, retention_days, store_backend, validate_settings, StoreBackend,
};
use crate::domain::update::{compute_metrics_for, update_all_metrics, UpdateContext};
use crate::logging::{init_logging, LoggingConfig};
use crate::ports::config_port::ConfigPort;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::metrics_store_port::MetricsStorePort;
use crate::ports::price_store_port::PriceStorePort;

pub type AppConfig = LayeredConfig<EnvConfigAdapter, FileConfigAdapter>;

#[derive(Parser, Debug)]
#[command(name = "stockmetrics", about = "Daily stock price metrics pipeline")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the price and metrics tables
    Init {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Load closing prices from a CSV file
    Import {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        file: PathBuf,
        /// Symbol for files without a symbol column
        #[arg(short, long)]
        symbol: Option<String>,
    },
    /// Fetch the latest close for each symbol from the quote feed
    Fetch {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Comma-separated symbols; defaults to every stored symbol
        #[arg(long)]
        symbols: Option<String>,
    },
    /// Recompute and store metrics for every stored symbol
    Update {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// As-of date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
    },
    /// Compute metrics for one symbol and print them without storing
    Compute {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        symbol: String,
        #[arg(long)]
        date: Option<String>,
    },
    /// Delete prices older than the retention horizon
    Purge {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Horizon in days, overriding [retention] horizon_days
        #[arg(long)]
        days: Option<i64>,
    },
    /// Show stored prices and metrics for a symbol
    Info {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        symbol: String,
    },
    /// List symbols with stored prices
    ListSymbols {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Init { config } => with_config(config.as_deref(), run_init),
        Command::Import {
            config,
            file,
            symbol,
        } => with_config(config.as_deref(), |c| {
            run_import(c, &file, symbol.as_deref())
        }),
        Command::Fetch { config, symbols } => {
            with_config(config.as_deref(), |c| run_fetch(c, symbols.as_deref()))
        }
        Command::Update { config, date } => {
            with_config(config.as_deref(), |c| run_update(c, date.as_deref()))
        }
        Command::Compute {
            config,
            symbol,
            date,
        } => with_config(config.as_deref(), |c| {
            run_compute(c, &symbol, date.as_deref())
        }),
        Command::Purge { config, days } => with_config(config.as_deref(), |c| run_purge(c, days)),
        Command::Info { config, symbol } => {
            with_config(config.as_deref(), |c| run_info(c, &symbol))
        }
        Command::ListSymbols { config } => with_config(config.as_deref(), run_list_symbols),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Environment variables layered over the INI file (or over nothing, when no
/// file is given).
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, StockMetricsError> {
    let file = match path {
        Some(p) => FileConfigAdapter::from_file(p)?,
        None => FileConfigAdapter::from_string("").map_err(|reason| {
            StockMetricsError::ConfigParse {
                file: "<empty>".into(),
                reason,
            }
        })?,
    };
    Ok(LayeredConfig::new(EnvConfigAdapter::from_env(), file))
}

fn with_config<F>(path: Option<&Path>, command: F) -> Result<(), StockMetricsError>
where
    F: FnOnce(&AppConfig) -> Result<(), StockMetricsError>,
{
    let config = load_config(path)?;
    init_logging(&LoggingConfig::from_env(Some(&config)));
    validate_settings(&config)?;
    command(&config)
}

/// An opened store backend; one adapter serves both ports.
pub enum Stores {
    #[cfg(feature = "sqlite")]
    Sqlite(crate::adapters::sqlite_adapter::SqliteAdapter),
    #[cfg(feature = "postgres")]
    Postgres(crate::adapters::postgres_adapter::PostgresAdapter),
}

impl Stores {
    pub fn open(config: &dyn ConfigPort) -> Result<Self, StockMetricsError> {
        match store_backend(config)? {
            #[cfg(feature = "sqlite")]
            StoreBackend::Sqlite => Ok(Self::Sqlite(
                crate::adapters::sqlite_adapter::SqliteAdapter::from_config(config)?,
            )),
            #[cfg(feature = "postgres")]
            StoreBackend::Postgres => Ok(Self::Postgres(
                crate::adapters::postgres_adapter::PostgresAdapter::from_config(config)?,
            )),
            #[allow(unreachable_patterns)]
            other => Err(StockMetricsError::ConfigInvalid {
                section: "database".into(),
                key: "backend".into(),
                reason: format!("{:?} support is not compiled in", other),
            }),
        }
    }

    pub fn prices(&self) -> &dyn PriceStorePort {
        match self {
            #[cfg(feature = "sqlite")]
            Self::Sqlite(a) => a,
            #[cfg(feature = "postgres")]
            Self::Postgres(a) => a,
        }
    }

    pub fn metrics(&self) -> &dyn MetricsStorePort {
        match self {
            #[cfg(feature = "sqlite")]
            Self::Sqlite(a) => a,
            #[cfg(feature = "postgres")]
            Self::Postgres(a) => a,
        }
    }

    pub fn initialize_schema(&self) -> Result<(), StockMetricsError> {
        match self {
            #[cfg(feature = "sqlite")]
            Self::Sqlite(a) => a.initialize_schema(),
            #[cfg(feature = "postgres")]
            Self::Postgres(a) => a.initialize_schema(),
        }
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn as_of_date(date: Option<&str>) -> Result<NaiveDate, StockMetricsError> {
    match date {
        Some(d) => parse_date(d, "cli", "date"),
        None => Ok(today()),
    }
}

fn run_init(config: &AppConfig) -> Result<(), StockMetricsError> {
    #[cfg(feature = "postgres")]
    {
        if store_backend(config)? == StoreBackend::Postgres {
            crate::adapters::postgres_adapter::ensure_database(config)?;
        }
    }

    let stores = Stores::open(config)?;
    stores.initialize_schema()?;
    println!("Schema initialized");
    Ok(())
}

fn run_import(
    config: &AppConfig,
    file: &Path,
    symbol: Option<&str>,
) -> Result<(), StockMetricsError> {
    let points = read_price_file(file, symbol)?;
    let stores = Stores::open(config)?;
    let written = stores.prices().upsert_batch(&points)?;
    println!("Imported {} price points from {}", written, file.display());
    Ok(())
}

/// `--symbols` list, else every symbol already in the store.
pub fn resolve_symbols(
    symbols: Option<&str>,
    store: &dyn PriceStorePort,
) -> Result<Vec<String>, StockMetricsError> {
    match symbols {
        Some(list) => Ok(list
            .split(',')
            .map(normalize_symbol)
            .filter(|s| !s.is_empty())
            .collect()),
        None => store.list_symbols(),
    }
}

fn run_fetch(config: &AppConfig, symbols: Option<&str>) -> Result<(), StockMetricsError> {
    #[cfg(feature = "feed")]
    {
        use crate::adapters::alphavantage_adapter::AlphaVantageAdapter;
        use crate::domain::ingest::ingest_latest;

        let feed = AlphaVantageAdapter::from_config(config)?;
        let stores = Stores::open(config)?;
        let symbols = resolve_symbols(symbols, stores.prices())?;
        if symbols.is_empty() {
            eprintln!("No symbols to fetch");
            return Ok(());
        }

        let summary = ingest_latest(&feed, stores.prices(), &symbols)?;
        for point in &summary.stored {
            println!("{} {} {:.4}", point.symbol, point.date, point.closing_price);
        }
        for (symbol, reason) in &summary.failed {
            eprintln!("{}: {}", symbol, reason);
        }
        eprintln!(
            "{} stored, {} failed",
            summary.stored.len(),
            summary.failed.len()
        );
        Ok(())
    }

    #[cfg(not(feature = "feed"))]
    {
        let _ = (config, symbols);
        Err(StockMetricsError::ConfigInvalid {
            section: "feed".into(),
            key: "api_key".into(),
            reason: "feed support is not compiled in".into(),
        })
    }
}

fn market_source<'a>(
    config: &AppConfig,
    store: &'a dyn PriceStorePort,
) -> Result<Box<dyn MarketDataPort + 'a>, StockMetricsError> {
    let source: Box<dyn MarketDataPort + 'a> = match metrics_settings(config)?.market_symbol {
        Some(symbol) => {
            tracing::debug!(market = %symbol, "beta against stored index");
            Box::new(StoredIndexMarketData::new(store, symbol))
        }
        None => Box::new(UnavailableMarketData),
    };
    Ok(source)
}

fn run_update(config: &AppConfig, date: Option<&str>) -> Result<(), StockMetricsError> {
    let as_of = as_of_date(date)?;
    let stores = Stores::open(config)?;
    let market = market_source(config, stores.prices())?;
    let ctx = UpdateContext {
        prices: stores.prices(),
        metrics: stores.metrics(),
        market: market.as_ref(),
        settings: metrics_settings(config)?,
    };

    let summary = update_all_metrics(&ctx, as_of)?;
    for failed in &summary.failed {
        eprintln!("{}: {}", failed.symbol, failed.reason);
    }
    println!(
        "{}: {} updated, {} skipped, {} failed",
        summary.as_of,
        summary.updated.len(),
        summary.skipped.len(),
        summary.failed.len()
    );
    Ok(())
}

pub fn format_metrics(row: &MetricsRow) -> String {
    let mut out = format!("{} as of {}\n", row.symbol, row.date);
    for (name, value) in METRIC_NAMES.iter().zip(row.values()) {
        let shown = value.map_or_else(|| "n/a".to_string(), |v| format!("{:.6}", v));
        out.push_str(&format!("  {:<16} {}\n", name, shown));
    }
    out
}

fn run_compute(config: &AppConfig, symbol: &str, date: Option<&str>) -> Result<(), StockMetricsError> {
    let symbol = normalize_symbol(symbol);
    let as_of = as_of_date(date)?;
    let stores = Stores::open(config)?;
    let market = market_source(config, stores.prices())?;
    let ctx = UpdateContext {
        prices: stores.prices(),
        metrics: stores.metrics(),
        market: market.as_ref(),
        settings: metrics_settings(config)?,
    };

    match compute_metrics_for(&ctx, &symbol, as_of)? {
        Some(row) => print!("{}", format_metrics(&row)),
        None => eprintln!("{}: insufficient price data as of {}", symbol, as_of),
    }
    Ok(())
}

fn run_purge(config: &AppConfig, days: Option<i64>) -> Result<(), StockMetricsError> {
    let horizon = match days {
        Some(d) if d < 1 => {
            return Err(StockMetricsError::ConfigInvalid {
                section: "cli".into(),
                key: "days".into(),
                reason: "days must be at least 1".into(),
            });
        }
        Some(d) => d,
        None => retention_days(config)?,
    };

    let stores = Stores::open(config)?;
    let today = today();
    let deleted = purge_expired(stores.prices(), today, horizon)?;
    println!(
        "Deleted {} price rows dated before {}",
        deleted,
        purge_cutoff(today, horizon)
    );
    Ok(())
}

fn run_info(config: &AppConfig, symbol: &str) -> Result<(), StockMetricsError> {
    let symbol = normalize_symbol(symbol);
    let stores = Stores::open(config)?;

    match stores.prices().latest(&symbol)? {
        Some((date, close)) => println!("{}: latest close {:.4} on {}", symbol, close, date),
        None => {
            eprintln!("{}: no price data found", symbol);
            return Ok(());
        }
    }
    match stores.metrics().latest(&symbol)? {
        Some(row) => print!("{}", format_metrics(&row)),
        None => eprintln!("{}: no metrics stored", symbol),
    }
    println!("{} price rows in store", stores.prices().total_count()?);
    Ok(())
}

fn run_list_symbols(config: &AppConfig) -> Result<(), StockMetricsError> {
    let stores = Stores::open(config)?;
    let symbols = stores.prices().list_symbols()?;
    if symbols.is_empty() {
        eprintln!("No symbols found");
    } else {
        for symbol in &symbols {
            println!("{}", symbol);
        }
        eprintln!("{} symbols found", symbols.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn parses_update_with_date() {
        let cli = Cli::try_parse_from([
            "stockmetrics",
            "update",
            "-c",
            "prod.ini",
            "--date",
            "2024-06-28",
        ])
        .unwrap();
        match cli.command {
            Command::Update { config, date } => {
                assert_eq!(config, Some(PathBuf::from("prod.ini")));
                assert_eq!(date.as_deref(), Some("2024-06-28"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn import_requires_file() {
        assert!(Cli::try_parse_from(["stockmetrics", "import"]).is_err());
    }

    #[test]
    fn parses_list_symbols() {
        let cli = Cli::try_parse_from(["stockmetrics", "list-symbols"]).unwrap();
        assert!(matches!(cli.command, Command::ListSymbols { config: None }));
    }

    #[test]
    fn as_of_rejects_bad_date() {
        assert!(as_of_date(Some("28/06/2024")).is_err());
        assert_eq!(
            as_of_date(Some("2024-06-28")).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 28).unwrap()
        );
    }

    #[test]
    fn format_marks_undefined_metrics() {
        let mut row = MetricsRow::empty("AAPL", NaiveDate::from_ymd_opt(2024, 6, 28).unwrap());
        row.ma_50 = Some(190.5);
        let text = format_metrics(&row);
        assert!(text.starts_with("AAPL as of 2024-06-28\n"));
        assert!(text.contains("ma_50            190.500000"));
        assert!(text.contains("beta_1y          n/a"));
        assert_eq!(text.lines().count(), 11);
    }
}
