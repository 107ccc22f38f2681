//! Price store port trait.

use crate::domain::error::StockMetricsError;
use crate::domain::price::PricePoint;
use chrono::NaiveDate;

/// Durable (symbol, date) -> closing price table, unique per pair.
pub trait PriceStorePort {
    /// Insert or overwrite every point; the last write for a (symbol, date) wins.
    /// Returns the number of points written.
    fn upsert_batch(&self, points: &[PricePoint]) -> Result<usize, StockMetricsError>;

    /// Prices for `symbol` with `start_date <= date <= end_date`, ascending by date.
    /// No data is an empty vector.
    fn query_range(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<(NaiveDate, f64)>, StockMetricsError>;

    fn latest(&self, symbol: &str) -> Result<Option<(NaiveDate, f64)>, StockMetricsError>;

    /// Delete rows strictly older than `cutoff`, returning how many were removed.
    fn purge_older_than(&self, cutoff: NaiveDate) -> Result<usize, StockMetricsError>;

    /// Distinct symbols with any stored price, sorted.
    fn list_symbols(&self) -> Result<Vec<String>, StockMetricsError>;

    fn count_on(&self, date: NaiveDate) -> Result<usize, StockMetricsError>;

    fn total_count(&self) -> Result<usize, StockMetricsError>;
}
