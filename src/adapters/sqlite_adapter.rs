//! SQLite price and metrics stores.
//!
//! Dates are stored as `YYYY-MM-DD` text so that lexical order is date order.

use crate::domain::error::StockMetricsError;
use crate::domain::metrics::MetricsRow;
use crate::domain::price::PricePoint;
use crate::domain::settings;
use crate::ports::config_port::ConfigPort;
use crate::ports::metrics_store_port::MetricsStorePort;
use crate::ports::price_store_port::PriceStorePort;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};

const DATE_FORMAT: &str = "%Y-%m-%d";

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS stock_prices (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        symbol TEXT NOT NULL,
        date TEXT NOT NULL,
        closing_price REAL NOT NULL,
        UNIQUE (symbol, date)
    );
    CREATE TABLE IF NOT EXISTS stock_metrics (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        symbol TEXT NOT NULL,
        date TEXT NOT NULL,
        cagr_1y REAL,
        cagr_3y REAL,
        cagr_5y REAL,
        volatility_1y REAL,
        ma_50 REAL,
        ma_200 REAL,
        rsi_14 REAL,
        beta_1y REAL,
        sharpe_ratio_1y REAL,
        max_drawdown_1y REAL,
        UNIQUE (symbol, date)
    );
    CREATE INDEX IF NOT EXISTS idx_stock_prices_symbol_date ON stock_prices (symbol, date);
    CREATE INDEX IF NOT EXISTS idx_stock_prices_date ON stock_prices (date);
    CREATE INDEX IF NOT EXISTS idx_stock_metrics_symbol_date ON stock_metrics (symbol, date);";

const METRICS_COLUMNS: &str = "symbol, date, cagr_1y, cagr_3y, cagr_5y, volatility_1y, \
     ma_50, ma_200, rsi_14, beta_1y, sharpe_ratio_1y, max_drawdown_1y";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_err(e: r2d2::Error) -> StockMetricsError {
    StockMetricsError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> StockMetricsError {
    StockMetricsError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn date_text(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn date_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(idx)?;
    NaiveDate::parse_from_str(&text, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn metrics_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MetricsRow> {
    Ok(MetricsRow {
        symbol: row.get(0)?,
        date: date_column(row, 1)?,
        cagr_1y: row.get(2)?,
        cagr_3y: row.get(3)?,
        cagr_5y: row.get(4)?,
        volatility_1y: row.get(5)?,
        ma_50: row.get(6)?,
        ma_200: row.get(7)?,
        rsi_14: row.get(8)?,
        beta_1y: row.get(9)?,
        sharpe_ratio_1y: row.get(10)?,
        max_drawdown_1y: row.get(11)?,
    })
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, StockMetricsError> {
        let db_path = config.require_string("sqlite", "path")?;
        let pool_size = settings::pool_size(config, "sqlite")?;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_err)?;

        tracing::info!(path = %db_path, pool_size, "sqlite connection pool created");
        Ok(Self { pool })
    }

    /// Single-connection pool over a private in-memory database.
    pub fn in_memory() -> Result<Self, StockMetricsError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).map_err(pool_err)?;
        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StockMetricsError> {
        self.pool.get().map_err(pool_err)
    }

    pub fn initialize_schema(&self) -> Result<(), StockMetricsError> {
        self.conn()?.execute_batch(SCHEMA).map_err(query_err)?;
        tracing::info!("sqlite schema ready");
        Ok(())
    }
}

impl PriceStorePort for SqliteAdapter {
    fn upsert_batch(&self, points: &[PricePoint]) -> Result<usize, StockMetricsError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO stock_prices (symbol, date, closing_price)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT (symbol, date)
                     DO UPDATE SET closing_price = excluded.closing_price",
                )
                .map_err(query_err)?;
            for point in points {
                stmt.execute(params![point.symbol, date_text(point.date), point.closing_price])
                    .map_err(query_err)?;
            }
        }
        tx.commit().map_err(query_err)?;

        tracing::info!(count = points.len(), "batch upserted stock prices");
        Ok(points.len())
    }

    fn query_range(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<(NaiveDate, f64)>, StockMetricsError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT date, closing_price
                 FROM stock_prices
                 WHERE symbol = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(
                params![symbol, date_text(start_date), date_text(end_date)],
                |row| Ok((date_column(row, 0)?, row.get::<_, f64>(1)?)),
            )
            .map_err(query_err)?;

        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(query_err)
    }

    fn latest(&self, symbol: &str) -> Result<Option<(NaiveDate, f64)>, StockMetricsError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT date, closing_price FROM stock_prices
             WHERE symbol = ?1 ORDER BY date DESC LIMIT 1",
            params![symbol],
            |row| Ok((date_column(row, 0)?, row.get::<_, f64>(1)?)),
        )
        .optional()
        .map_err(query_err)
    }

    fn purge_older_than(&self, cutoff: NaiveDate) -> Result<usize, StockMetricsError> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM stock_prices WHERE date < ?1",
            params![date_text(cutoff)],
        )
        .map_err(query_err)
    }

    fn list_symbols(&self) -> Result<Vec<String>, StockMetricsError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT symbol FROM stock_prices ORDER BY symbol")
            .map_err(query_err)?;
        let rows = stmt.query_map([], |row| row.get(0)).map_err(query_err)?;
        rows.collect::<rusqlite::Result<Vec<String>>>()
            .map_err(query_err)
    }

    fn count_on(&self, date: NaiveDate) -> Result<usize, StockMetricsError> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM stock_prices WHERE date = ?1",
                params![date_text(date)],
                |row| row.get(0),
            )
            .map_err(query_err)?;
        Ok(count as usize)
    }

    fn total_count(&self) -> Result<usize, StockMetricsError> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM stock_prices", [], |row| row.get(0))
            .map_err(query_err)?;
        Ok(count as usize)
    }
}

impl MetricsStorePort for SqliteAdapter {
    fn upsert(&self, row: &MetricsRow) -> Result<(), StockMetricsError> {
        let conn = self.conn()?;
        let sql = format!(
            "INSERT INTO stock_metrics ({})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT (symbol, date) DO UPDATE SET
                cagr_1y = excluded.cagr_1y,
                cagr_3y = excluded.cagr_3y,
                cagr_5y = excluded.cagr_5y,
                volatility_1y = excluded.volatility_1y,
                ma_50 = excluded.ma_50,
                ma_200 = excluded.ma_200,
                rsi_14 = excluded.rsi_14,
                beta_1y = excluded.beta_1y,
                sharpe_ratio_1y = excluded.sharpe_ratio_1y,
                max_drawdown_1y = excluded.max_drawdown_1y",
            METRICS_COLUMNS
        );
        conn.execute(
            &sql,
            params![
                row.symbol,
                date_text(row.date),
                row.cagr_1y,
                row.cagr_3y,
                row.cagr_5y,
                row.volatility_1y,
                row.ma_50,
                row.ma_200,
                row.rsi_14,
                row.beta_1y,
                row.sharpe_ratio_1y,
                row.max_drawdown_1y
            ],
        )
        .map_err(query_err)?;
        Ok(())
    }

    fn get(&self, symbol: &str, date: NaiveDate) -> Result<Option<MetricsRow>, StockMetricsError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM stock_metrics WHERE symbol = ?1 AND date = ?2",
            METRICS_COLUMNS
        );
        conn.query_row(&sql, params![symbol, date_text(date)], metrics_from_row)
            .optional()
            .map_err(query_err)
    }

    fn latest(&self, symbol: &str) -> Result<Option<MetricsRow>, StockMetricsError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM stock_metrics
             WHERE symbol = ?1 ORDER BY date DESC LIMIT 1",
            METRICS_COLUMNS
        );
        conn.query_row(&sql, params![symbol], metrics_from_row)
            .optional()
            .map_err(query_err)
    }
}
