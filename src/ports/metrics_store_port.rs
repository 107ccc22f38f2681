//! Metrics store port trait.

use crate::domain::error::StockMetricsError;
use crate::domain::metrics::MetricsRow;
use chrono::NaiveDate;

pub trait MetricsStorePort {
    /// Insert the row, or replace every metric column of the existing
    /// (symbol, date) row.
    fn upsert(&self, row: &MetricsRow) -> Result<(), StockMetricsError>;

    fn get(&self, symbol: &str, date: NaiveDate) -> Result<Option<MetricsRow>, StockMetricsError>;

    /// Most recent row for `symbol`, if any.
    fn latest(&self, symbol: &str) -> Result<Option<MetricsRow>, StockMetricsError>;
}
