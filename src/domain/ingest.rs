//! Latest-close ingestion from the quote feed into the price store.

use crate::domain::error::StockMetricsError;
use crate::domain::price::PricePoint;
use crate::ports::price_store_port::PriceStorePort;
use crate::ports::quote_port::QuotePort;

#[derive(Debug, Clone, Default)]
pub struct IngestSummary {
    pub stored: Vec<PricePoint>,
    /// (symbol, reason) for every fetch that failed or returned an unusable price.
    pub failed: Vec<(String, String)>,
}

/// Fetch the latest close for each symbol and upsert the successful ones in a
/// single batch.
///
/// Feed failures are per symbol: logged, recorded, and skipped. A store
/// failure on the final upsert is returned to the caller.
pub fn ingest_latest(
    feed: &dyn QuotePort,
    store: &dyn PriceStorePort,
    symbols: &[String],
) -> Result<IngestSummary, StockMetricsError> {
    let mut summary = IngestSummary::default();

    for symbol in symbols {
        match feed.fetch_latest_point(symbol) {
            Ok(point) if point.is_valid() => {
                tracing::debug!(symbol = %symbol, date = %point.date, close = point.closing_price, "fetched quote");
                summary.stored.push(point);
            }
            Ok(point) => {
                tracing::warn!(symbol = %symbol, close = point.closing_price, "feed returned a non-positive price");
                summary
                    .failed
                    .push((symbol.clone(), format!("invalid price {}", point.closing_price)));
            }
            Err(e) => {
                tracing::warn!(symbol = %symbol, error = %e, "quote fetch failed");
                summary.failed.push((symbol.clone(), e.to_string()));
            }
        }
    }

    if !summary.stored.is_empty() {
        let written = store.upsert_batch(&summary.stored)?;
        tracing::info!(written, "stored latest closes");
    }

    Ok(summary)
}
