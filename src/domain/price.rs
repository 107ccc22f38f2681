//! Closing price representation.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct PricePoint {
    pub symbol: String,
    pub date: NaiveDate,
    pub closing_price: f64,
}

impl PricePoint {
    pub fn new(symbol: impl Into<String>, date: NaiveDate, closing_price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            date,
            closing_price,
        }
    }

    /// Log and ratio formulas are only defined for strictly positive, finite prices.
    pub fn is_valid(&self) -> bool {
        is_valid_price(self.closing_price)
    }
}

pub fn is_valid_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

/// Keep only the rows whose price can enter the metric formulas.
///
/// Dates and prices stay aligned; input order is preserved.
pub fn valid_series(rows: &[(NaiveDate, f64)]) -> (Vec<NaiveDate>, Vec<f64>) {
    rows.iter()
        .filter(|(_, price)| is_valid_price(*price))
        .map(|&(date, price)| (date, price))
        .unzip()
}

/// Normalize a ticker for storage: trimmed and upper-cased.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}
