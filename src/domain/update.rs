//! Metrics update pass: price store -> metrics engine -> metrics store.
//!
//! Symbols are processed one after another. A failure for one symbol is logged
//! and recorded in the [`UpdateSummary`]; the pass carries on with the next.
//! Only failing to enumerate the symbols aborts the pass. Upserts make a rerun
//! for the same date safe.

use crate::domain::error::StockMetricsError;
use crate::domain::metrics::{compute_metrics, MetricsRow, WINDOW_1Y};
use crate::domain::price::valid_series;
use crate::domain::settings::MetricsSettings;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::metrics_store_port::MetricsStorePort;
use crate::ports::price_store_port::PriceStorePort;
use chrono::{Duration, NaiveDate};

/// Fewest valid closes for which a metrics row is written.
pub const MIN_PRICES: usize = 2;

/// Store handles, market source and settings, built once at startup.
pub struct UpdateContext<'a> {
    pub prices: &'a dyn PriceStorePort,
    pub metrics: &'a dyn MetricsStorePort,
    pub market: &'a dyn MarketDataPort,
    pub settings: MetricsSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolOutcome {
    Updated(MetricsRow),
    Skipped(SkipReason),
}

#[derive(Debug, Clone)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone)]
pub struct FailedSymbol {
    pub symbol: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct UpdateSummary {
    pub as_of: NaiveDate,
    pub updated: Vec<String>,
    pub skipped: Vec<SkippedSymbol>,
    pub failed: Vec<FailedSymbol>,
}

impl UpdateSummary {
    fn new(as_of: NaiveDate) -> Self {
        Self {
            as_of,
            updated: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn processed(&self) -> usize {
        self.updated.len() + self.skipped.len() + self.failed.len()
    }
}

/// First date of the price window that ends at `as_of`.
pub fn window_start(as_of: NaiveDate, lookback_days: i64) -> NaiveDate {
    Duration::try_days(lookback_days)
        .and_then(|span| as_of.checked_sub_signed(span))
        .unwrap_or(NaiveDate::MIN)
}

/// Compute the metrics row for `symbol` as of `as_of` without writing it.
///
/// Returns `Ok(None)` when fewer than [`MIN_PRICES`] valid closes exist in the
/// lookback window. Price or market lookup errors are returned.
pub fn compute_metrics_for(
    ctx: &UpdateContext<'_>,
    symbol: &str,
    as_of: NaiveDate,
) -> Result<Option<MetricsRow>, StockMetricsError> {
    let start = window_start(as_of, ctx.settings.lookback_days);
    let rows = ctx.prices.query_range(symbol, start, as_of)?;
    let (dates, prices) = valid_series(&rows);

    if prices.len() < MIN_PRICES {
        return Ok(None);
    }

    let year_dates = &dates[dates.len().saturating_sub(WINDOW_1Y)..];
    let market = ctx.market.market_series(year_dates)?;

    Ok(Some(compute_metrics(
        symbol,
        as_of,
        &prices,
        market.as_deref(),
        ctx.settings.risk_free_rate,
    )))
}

/// Compute and upsert the row for one symbol.
pub fn update_symbol(
    ctx: &UpdateContext<'_>,
    symbol: &str,
    as_of: NaiveDate,
) -> Result<SymbolOutcome, StockMetricsError> {
    match compute_metrics_for(ctx, symbol, as_of)? {
        Some(row) => {
            ctx.metrics.upsert(&row)?;
            tracing::info!(symbol, date = %as_of, defined = row.defined_count(), "metrics upserted");
            Ok(SymbolOutcome::Updated(row))
        }
        None => {
            tracing::warn!(symbol, "insufficient valid price data, skipping");
            Ok(SymbolOutcome::Skipped(SkipReason::InsufficientData))
        }
    }
}

/// One pass over every symbol with stored prices.
pub fn update_all_metrics(
    ctx: &UpdateContext<'_>,
    as_of: NaiveDate,
) -> Result<UpdateSummary, StockMetricsError> {
    let symbols = ctx.prices.list_symbols()?;
    tracing::info!(count = symbols.len(), date = %as_of, "starting metrics update");

    let mut summary = UpdateSummary::new(as_of);
    for symbol in symbols {
        match update_symbol(ctx, &symbol, as_of) {
            Ok(SymbolOutcome::Updated(_)) => summary.updated.push(symbol),
            Ok(SymbolOutcome::Skipped(reason)) => {
                summary.skipped.push(SkippedSymbol { symbol, reason })
            }
            Err(e) => {
                tracing::error!(symbol = %symbol, error = %e, "metrics update failed");
                summary.failed.push(FailedSymbol {
                    symbol,
                    reason: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        updated = summary.updated.len(),
        skipped = summary.skipped.len(),
        failed = summary.failed.len(),
        "metrics update finished"
    );
    Ok(summary)
}
