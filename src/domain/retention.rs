//! Price retention horizon.

use crate::domain::error::StockMetricsError;
use crate::ports::price_store_port::PriceStorePort;
use chrono::{Duration, NaiveDate};

/// Rows dated strictly before the returned date fall outside the horizon.
pub fn purge_cutoff(today: NaiveDate, horizon_days: i64) -> NaiveDate {
    Duration::try_days(horizon_days)
        .and_then(|span| today.checked_sub_signed(span))
        .unwrap_or(NaiveDate::MIN)
}

/// Delete prices older than `horizon_days` before `today`; returns the count removed.
pub fn purge_expired(
    store: &dyn PriceStorePort,
    today: NaiveDate,
    horizon_days: i64,
) -> Result<usize, StockMetricsError> {
    let cutoff = purge_cutoff(today, horizon_days);
    let deleted = store.purge_older_than(cutoff)?;
    tracing::info!(deleted, cutoff = %cutoff, horizon_days, "purged expired prices");
    Ok(deleted)
}
