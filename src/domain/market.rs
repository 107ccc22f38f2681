//! Market index series sources for beta.

use crate::domain::error::StockMetricsError;
use crate::domain::price::is_valid_price;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::price_store_port::PriceStorePort;
use chrono::NaiveDate;
use std::collections::HashMap;

/// No index configured: beta stays undefined.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableMarketData;

impl MarketDataPort for UnavailableMarketData {
    fn market_series(&self, _dates: &[NaiveDate]) -> Result<Option<Vec<f64>>, StockMetricsError> {
        Ok(None)
    }
}

/// Index closes kept in the price store under their own symbol.
pub struct StoredIndexMarketData<'a> {
    store: &'a dyn PriceStorePort,
    symbol: String,
}

impl<'a> StoredIndexMarketData<'a> {
    pub fn new(store: &'a dyn PriceStorePort, symbol: impl Into<String>) -> Self {
        Self {
            store,
            symbol: symbol.into(),
        }
    }
}

impl MarketDataPort for StoredIndexMarketData<'_> {
    fn market_series(&self, dates: &[NaiveDate]) -> Result<Option<Vec<f64>>, StockMetricsError> {
        let (Some(&first), Some(&last)) = (dates.first(), dates.last()) else {
            return Ok(None);
        };

        let by_date: HashMap<NaiveDate, f64> = self
            .store
            .query_range(&self.symbol, first, last)?
            .into_iter()
            .collect();

        // Every stock date needs a usable index close, otherwise the returns misalign.
        let aligned: Option<Vec<f64>> = dates
            .iter()
            .map(|d| by_date.get(d).copied().filter(|p| is_valid_price(*p)))
            .collect();

        Ok(aligned)
    }
}
