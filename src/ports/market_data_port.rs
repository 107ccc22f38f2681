//! Market index series port trait (beta input).

use crate::domain::error::StockMetricsError;
use chrono::NaiveDate;

pub trait MarketDataPort {
    /// Index closes aligned one-to-one with `dates`, or `Ok(None)` when no
    /// aligned series is available. Unavailability is not an error.
    fn market_series(&self, dates: &[NaiveDate]) -> Result<Option<Vec<f64>>, StockMetricsError>;
}
