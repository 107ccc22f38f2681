//! PostgreSQL price and metrics stores.

use crate::domain::error::StockMetricsError;
use crate::domain::metrics::MetricsRow;
use crate::domain::price::PricePoint;
use crate::domain::settings;
use crate::ports::config_port::ConfigPort;
use crate::ports::metrics_store_port::MetricsStorePort;
use crate::ports::price_store_port::PriceStorePort;
use chrono::NaiveDate;
use postgres::types::ToSql;
use postgres::{Client, Config, NoTls, Row};
use r2d2::{Pool, PooledConnection};
use r2d2_postgres::PostgresConnectionManager;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS stock_prices (
        id SERIAL PRIMARY KEY,
        symbol VARCHAR(10) NOT NULL,
        date DATE NOT NULL,
        closing_price NUMERIC(12, 4) NOT NULL,
        UNIQUE (symbol, date)
    );
    CREATE TABLE IF NOT EXISTS stock_metrics (
        id SERIAL PRIMARY KEY,
        symbol VARCHAR(10) NOT NULL,
        date DATE NOT NULL,
        cagr_1y DOUBLE PRECISION,
        cagr_3y DOUBLE PRECISION,
        cagr_5y DOUBLE PRECISION,
        volatility_1y DOUBLE PRECISION,
        ma_50 DOUBLE PRECISION,
        ma_200 DOUBLE PRECISION,
        rsi_14 DOUBLE PRECISION,
        beta_1y DOUBLE PRECISION,
        sharpe_ratio_1y DOUBLE PRECISION,
        max_drawdown_1y DOUBLE PRECISION,
        UNIQUE (symbol, date)
    );
    CREATE INDEX IF NOT EXISTS idx_stock_prices_symbol_date ON stock_prices (symbol, date);
    CREATE INDEX IF NOT EXISTS idx_stock_prices_date ON stock_prices (date);
    CREATE INDEX IF NOT EXISTS idx_stock_metrics_symbol_date ON stock_metrics (symbol, date);";

const METRICS_SELECT: &str = "SELECT symbol::text, date, cagr_1y, cagr_3y, cagr_5y, volatility_1y, \
     ma_50, ma_200, rsi_14, beta_1y, sharpe_ratio_1y, max_drawdown_1y FROM stock_metrics";

type PgManager = PostgresConnectionManager<NoTls>;

pub struct PostgresAdapter {
    pool: Pool<PgManager>,
}

fn pool_err(e: r2d2::Error) -> StockMetricsError {
    StockMetricsError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: postgres::Error) -> StockMetricsError {
    StockMetricsError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn metrics_from_row(row: &Row) -> MetricsRow {
    MetricsRow {
        symbol: row.get(0),
        date: row.get(1),
        cagr_1y: row.get(2),
        cagr_3y: row.get(3),
        cagr_5y: row.get(4),
        volatility_1y: row.get(5),
        ma_50: row.get(6),
        ma_200: row.get(7),
        rsi_14: row.get(8),
        beta_1y: row.get(9),
        sharpe_ratio_1y: row.get(10),
        max_drawdown_1y: row.get(11),
    }
}

/// Connection settings from `[postgres] connection_string`, or from the
/// individual host/port/dbname/user/password keys.
pub fn connection_config(config: &dyn ConfigPort) -> Result<Config, StockMetricsError> {
    if let Some(conninfo) = config
        .get_string("postgres", "connection_string")
        .filter(|s| !s.trim().is_empty())
    {
        return conninfo
            .parse::<Config>()
            .map_err(|e| StockMetricsError::ConfigInvalid {
                section: "postgres".into(),
                key: "connection_string".into(),
                reason: e.to_string(),
            });
    }

    let host = config.require_string("postgres", "host")?;
    let dbname = config
        .get_string("postgres", "dbname")
        .or_else(|| config.get_string("postgres", "db"))
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| StockMetricsError::ConfigMissing {
            section: "postgres".into(),
            key: "dbname".into(),
        })?;
    let port = config.get_int("postgres", "port", 5432);
    let port = u16::try_from(port).map_err(|_| StockMetricsError::ConfigInvalid {
        section: "postgres".into(),
        key: "port".into(),
        reason: format!("{} is not a valid port", port),
    })?;

    let mut pg = Config::new();
    pg.host(&host).port(port).dbname(&dbname);
    if let Some(user) = config.get_string("postgres", "user") {
        pg.user(&user);
    }
    if let Some(password) = config.get_string("postgres", "password") {
        pg.password(password);
    }
    Ok(pg)
}

/// Create the configured database when it does not exist yet, connecting
/// through the `postgres` maintenance database.
pub fn ensure_database(config: &dyn ConfigPort) -> Result<(), StockMetricsError> {
    let target = connection_config(config)?;
    let dbname = target
        .get_dbname()
        .ok_or_else(|| StockMetricsError::ConfigMissing {
            section: "postgres".into(),
            key: "dbname".into(),
        })?
        .to_string();

    let mut admin = target.clone();
    admin.dbname("postgres");
    let mut client = admin.connect(NoTls).map_err(|e| StockMetricsError::Database {
        reason: e.to_string(),
    })?;

    let exists = client
        .query_opt("SELECT 1 FROM pg_database WHERE datname = $1", &[&dbname])
        .map_err(query_err)?
        .is_some();

    if exists {
        tracing::info!(database = %dbname, "database already exists");
    } else {
        let statement = format!("CREATE DATABASE \"{}\"", dbname.replace('"', "\"\""));
        client.batch_execute(&statement).map_err(query_err)?;
        tracing::info!(database = %dbname, "database created");
    }
    Ok(())
}

impl PostgresAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, StockMetricsError> {
        let pg = connection_config(config)?;
        let pool_size = settings::pool_size(config, "postgres")?;

        let manager = PostgresConnectionManager::new(pg, NoTls);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_err)?;

        tracing::info!(pool_size, "postgres connection pool created");
        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<PgManager>, StockMetricsError> {
        self.pool.get().map_err(pool_err)
    }

    pub fn initialize_schema(&self) -> Result<(), StockMetricsError> {
        let mut conn = self.conn()?;
        conn.batch_execute(SCHEMA).map_err(query_err)?;
        tracing::info!("postgres schema ready");
        Ok(())
    }
}

fn count(client: &mut Client, query: &str, params: &[&(dyn ToSql + Sync)]) -> Result<usize, StockMetricsError> {
    let row = client.query_one(query, params).map_err(query_err)?;
    let n: i64 = row.get(0);
    Ok(n as usize)
}

impl PriceStorePort for PostgresAdapter {
    fn upsert_batch(&self, points: &[PricePoint]) -> Result<usize, StockMetricsError> {
        let mut conn = self.conn()?;
        let mut tx = conn.transaction().map_err(query_err)?;
        let stmt = tx
            .prepare(
                "INSERT INTO stock_prices (symbol, date, closing_price)
                 VALUES ($1, $2, $3::double precision)
                 ON CONFLICT (symbol, date)
                 DO UPDATE SET closing_price = EXCLUDED.closing_price",
            )
            .map_err(query_err)?;

        for point in points {
            tx.execute(&stmt, &[&point.symbol, &point.date, &point.closing_price])
                .map_err(query_err)?;
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
        let mut conn = self.conn()?;
        let rows = conn
            .query(
                "SELECT date, closing_price::double precision
                 FROM stock_prices
                 WHERE symbol = $1 AND date BETWEEN $2 AND $3
                 ORDER BY date ASC",
                &[&symbol, &start_date, &end_date],
            )
            .map_err(query_err)?;

        Ok(rows.iter().map(|row| (row.get(0), row.get(1))).collect())
    }

    fn latest(&self, symbol: &str) -> Result<Option<(NaiveDate, f64)>, StockMetricsError> {
        let mut conn = self.conn()?;
        let row = conn
            .query_opt(
                "SELECT date, closing_price::double precision
                 FROM stock_prices
                 WHERE symbol = $1
                 ORDER BY date DESC
                 LIMIT 1",
                &[&symbol],
            )
            .map_err(query_err)?;
        Ok(row.map(|r| (r.get(0), r.get(1))))
    }

    fn purge_older_than(&self, cutoff: NaiveDate) -> Result<usize, StockMetricsError> {
        let mut conn = self.conn()?;
        let deleted = conn
            .execute("DELETE FROM stock_prices WHERE date < $1", &[&cutoff])
            .map_err(query_err)?;
        Ok(deleted as usize)
    }

    fn list_symbols(&self) -> Result<Vec<String>, StockMetricsError> {
        let mut conn = self.conn()?;
        let rows = conn
            .query(
                "SELECT DISTINCT symbol::text FROM stock_prices ORDER BY 1",
                &[],
            )
            .map_err(query_err)?;
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    fn count_on(&self, date: NaiveDate) -> Result<usize, StockMetricsError> {
        let mut conn = self.conn()?;
        count(
            &mut conn,
            "SELECT COUNT(*) FROM stock_prices WHERE date = $1",
            &[&date],
        )
    }

    fn total_count(&self) -> Result<usize, StockMetricsError> {
        let mut conn = self.conn()?;
        count(&mut conn, "SELECT COUNT(*) FROM stock_prices", &[])
    }
}

impl MetricsStorePort for PostgresAdapter {
    fn upsert(&self, row: &MetricsRow) -> Result<(), StockMetricsError> {
        let mut conn = self.conn()?;
        let params: &[&(dyn ToSql + Sync)] = &[
            &row.symbol,
            &row.date,
            &row.cagr_1y,
            &row.cagr_3y,
            &row.cagr_5y,
            &row.volatility_1y,
            &row.ma_50,
            &row.ma_200,
            &row.rsi_14,
            &row.beta_1y,
            &row.sharpe_ratio_1y,
            &row.max_drawdown_1y,
        ];
        conn.execute(
            "INSERT INTO stock_metrics
                (symbol, date, cagr_1y, cagr_3y, cagr_5y, volatility_1y,
                 ma_50, ma_200, rsi_14, beta_1y, sharpe_ratio_1y, max_drawdown_1y)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             ON CONFLICT (symbol, date) DO UPDATE SET
                cagr_1y = EXCLUDED.cagr_1y,
                cagr_3y = EXCLUDED.cagr_3y,
                cagr_5y = EXCLUDED.cagr_5y,
                volatility_1y = EXCLUDED.volatility_1y,
                ma_50 = EXCLUDED.ma_50,
                ma_200 = EXCLUDED.ma_200,
                rsi_14 = EXCLUDED.rsi_14,
                beta_1y = EXCLUDED.beta_1y,
                sharpe_ratio_1y = EXCLUDED.sharpe_ratio_1y,
                max_drawdown_1y = EXCLUDED.max_drawdown_1y",
            params,
        )
        .map_err(query_err)?;
        Ok(())
    }

    fn get(&self, symbol: &str, date: NaiveDate) -> Result<Option<MetricsRow>, StockMetricsError> {
        let mut conn = self.conn()?;
        let query = format!("{} WHERE symbol = $1 AND date = $2", METRICS_SELECT);
        let row = conn
            .query_opt(query.as_str(), &[&symbol, &date])
            .map_err(query_err)?;
        Ok(row.as_ref().map(metrics_from_row))
    }

    fn latest(&self, symbol: &str) -> Result<Option<MetricsRow>, StockMetricsError> {
        let mut conn = self.conn()?;
        let query = format!(
            "{} WHERE symbol = $1 ORDER BY date DESC LIMIT 1",
            METRICS_SELECT
        );
        let row = conn
            .query_opt(query.as_str(), &[&symbol])
            .map_err(query_err)?;
        Ok(row.as_ref().map(metrics_from_row))
    }
}
