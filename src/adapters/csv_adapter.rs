//! CSV price file import.
//!
//! Accepted headers (case-insensitive, any column order):
//! `symbol,date,close` or `date,close` with the symbol supplied by the caller.
//! `closing_price` and `price` are accepted in place of `close`.

use crate::domain::error::StockMetricsError;
use crate::domain::price::{is_valid_price, normalize_symbol, PricePoint};
use chrono::NaiveDate;
use std::path::Path;

const CLOSE_ALIASES: [&str; 3] = ["close", "closing_price", "price"];

struct Columns {
    symbol: Option<usize>,
    date: usize,
    close: usize,
}

fn import_err(path: &Path, reason: impl Into<String>) -> StockMetricsError {
    StockMetricsError::Import {
        file: path.display().to_string(),
        reason: reason.into(),
    }
}

fn locate_columns(path: &Path, headers: &csv::StringRecord) -> Result<Columns, StockMetricsError> {
    let position = |names: &[&str]| {
        headers
            .iter()
            .position(|h| names.contains(&h.trim().to_lowercase().as_str()))
    };

    Ok(Columns {
        symbol: position(&["symbol"]),
        date: position(&["date"]).ok_or_else(|| import_err(path, "missing date column"))?,
        close: position(&CLOSE_ALIASES)
            .ok_or_else(|| import_err(path, "missing close column"))?,
    })
}

/// Read every row of `path` into price points.
///
/// Any malformed row fails the whole file; nothing is partially imported.
pub fn read_price_file(
    path: &Path,
    default_symbol: Option<&str>,
) -> Result<Vec<PricePoint>, StockMetricsError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| import_err(path, e.to_string()))?;

    let headers = rdr
        .headers()
        .map_err(|e| import_err(path, e.to_string()))?
        .clone();
    let columns = locate_columns(path, &headers)?;

    let default_symbol = default_symbol.map(normalize_symbol).filter(|s| !s.is_empty());
    if columns.symbol.is_none() && default_symbol.is_none() {
        return Err(import_err(
            path,
            "no symbol column and no symbol given for the file",
        ));
    }

    let mut points = Vec::new();
    for (index, result) in rdr.records().enumerate() {
        // header is line 1
        let line = index + 2;
        let record = result.map_err(|e| import_err(path, format!("line {}: {}", line, e)))?;

        let symbol = match columns.symbol.and_then(|i| record.get(i)) {
            Some(s) if !s.is_empty() => normalize_symbol(s),
            _ => default_symbol
                .clone()
                .ok_or_else(|| import_err(path, format!("line {}: missing symbol", line)))?,
        };

        let date_str = record
            .get(columns.date)
            .ok_or_else(|| import_err(path, format!("line {}: missing date", line)))?;
        let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
            import_err(path, format!("line {}: invalid date '{}': {}", line, date_str, e))
        })?;

        let close_str = record
            .get(columns.close)
            .ok_or_else(|| import_err(path, format!("line {}: missing close", line)))?;
        let close: f64 = close_str.parse().map_err(|e| {
            import_err(path, format!("line {}: invalid close '{}': {}", line, close_str, e))
        })?;
        if !is_valid_price(close) {
            return Err(import_err(
                path,
                format!("line {}: close must be positive, got {}", line, close),
            ));
        }

        points.push(PricePoint::new(symbol, date, close));
    }

    tracing::debug!(file = %path.display(), rows = points.len(), "read price file");
    Ok(points)
}
