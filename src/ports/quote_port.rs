//! Third-party quote feed port trait.

use crate::domain::error::StockMetricsError;
use crate::domain::price::PricePoint;

pub trait QuotePort {
    /// Most recent close for `symbol`, dated by the quote's own timestamp.
    fn fetch_latest_point(&self, symbol: &str) -> Result<PricePoint, StockMetricsError>;

    fn fetch_latest_close(&self, symbol: &str) -> Result<f64, StockMetricsError> {
        self.fetch_latest_point(symbol).map(|p| p.closing_price)
    }
}
