//! Descriptive metrics over a closing price series.
//!
//! Every function takes an ascending slice of closing prices and is pure. A
//! metric whose domain requirement is not met evaluates to `None`; none of these
//! functions panic, and an undefined metric never prevents the others in a
//! [`MetricsRow`] from being computed.

use chrono::NaiveDate;

pub const TRADING_DAYS_PER_YEAR: usize = 252;
pub const WINDOW_1Y: usize = TRADING_DAYS_PER_YEAR;
pub const WINDOW_3Y: usize = 3 * TRADING_DAYS_PER_YEAR;
pub const MA_SHORT: usize = 50;
pub const MA_LONG: usize = 200;
pub const RSI_WINDOW: usize = 14;
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.02;

// Standard deviations below this are treated as zero (rounding residue of a flat series).
const MIN_STDEV: f64 = 1e-12;

/// Column names matching [`MetricsRow::values`].
pub const METRIC_NAMES: [&str; 10] = [
    "cagr_1y",
    "cagr_3y",
    "cagr_5y",
    "volatility_1y",
    "ma_50",
    "ma_200",
    "rsi_14",
    "beta_1y",
    "sharpe_ratio_1y",
    "max_drawdown_1y",
];

/// One row of derived statistics for a symbol as of a date.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsRow {
    pub symbol: String,
    pub date: NaiveDate,
    pub cagr_1y: Option<f64>,
    pub cagr_3y: Option<f64>,
    pub cagr_5y: Option<f64>,
    pub volatility_1y: Option<f64>,
    pub ma_50: Option<f64>,
    pub ma_200: Option<f64>,
    pub rsi_14: Option<f64>,
    pub beta_1y: Option<f64>,
    pub sharpe_ratio_1y: Option<f64>,
    pub max_drawdown_1y: Option<f64>,
}

impl MetricsRow {
    pub fn empty(symbol: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            symbol: symbol.into(),
            date,
            cagr_1y: None,
            cagr_3y: None,
            cagr_5y: None,
            volatility_1y: None,
            ma_50: None,
            ma_200: None,
            rsi_14: None,
            beta_1y: None,
            sharpe_ratio_1y: None,
            max_drawdown_1y: None,
        }
    }

    /// Metric values in column order, as stored.
    pub fn values(&self) -> [Option<f64>; 10] {
        [
            self.cagr_1y,
            self.cagr_3y,
            self.cagr_5y,
            self.volatility_1y,
            self.ma_50,
            self.ma_200,
            self.rsi_14,
            self.beta_1y,
            self.sharpe_ratio_1y,
            self.max_drawdown_1y,
        ]
    }

    pub fn defined_count(&self) -> usize {
        self.values().iter().filter(|v| v.is_some()).count()
    }
}

/// Compute every metric for `symbol` as of `as_of`.
///
/// `prices` must already be restricted to valid (positive) closes, ascending.
/// `market` is the index series aligned with the trailing one-year slice of
/// `prices`; `None` leaves beta undefined. The five-year CAGR spans the whole
/// lookback series.
pub fn compute_metrics(
    symbol: &str,
    as_of: NaiveDate,
    prices: &[f64],
    market: Option<&[f64]>,
    risk_free_rate: f64,
) -> MetricsRow {
    let year = trailing(prices, WINDOW_1Y);

    MetricsRow {
        symbol: symbol.to_string(),
        date: as_of,
        cagr_1y: cagr(prices, WINDOW_1Y),
        cagr_3y: cagr(prices, WINDOW_3Y),
        cagr_5y: cagr(prices, prices.len()),
        volatility_1y: volatility(year),
        ma_50: moving_average(prices, MA_SHORT),
        ma_200: moving_average(prices, MA_LONG),
        rsi_14: rsi(prices, RSI_WINDOW),
        beta_1y: market.and_then(|m| beta(year, m)),
        sharpe_ratio_1y: sharpe_ratio(year, risk_free_rate),
        max_drawdown_1y: max_drawdown(year),
    }
}

/// The `window` most recent points (all of them when fewer exist).
pub fn trailing(prices: &[f64], window: usize) -> &[f64] {
    &prices[prices.len().saturating_sub(window)..]
}

fn defined(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    defined(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (divisor n).
fn stdev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    defined(variance.sqrt())
}

/// Simple daily returns; a step whose base price is not positive is skipped.
fn simple_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .filter(|w| w[0] > 0.0 && w[1].is_finite())
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

/// Compound annual growth over the `min(window, n)` most recent points:
/// `(last / first)^(252 / len) - 1`.
pub fn cagr(prices: &[f64], window: usize) -> Option<f64> {
    let slice = trailing(prices, window);
    if slice.len() < 2 || slice[0] <= 0.0 {
        return None;
    }
    let first = slice[0];
    let last = slice[slice.len() - 1];
    let exponent = TRADING_DAYS_PER_YEAR as f64 / slice.len() as f64;
    defined((last / first).powf(exponent) - 1.0)
}

/// Annualized volatility of log returns over the trailing year.
///
/// A return that touches a non-positive price is undefined and left out of the
/// standard deviation.
pub fn volatility(prices: &[f64]) -> Option<f64> {
    let slice = trailing(prices, WINDOW_1Y);
    if slice.len() < 2 {
        return None;
    }
    let log_returns: Vec<f64> = slice
        .windows(2)
        .filter(|w| w[0] > 0.0 && w[1] > 0.0)
        .map(|w| w[1].ln() - w[0].ln())
        .collect();
    let sd = stdev(&log_returns)?;
    defined(sd * (TRADING_DAYS_PER_YEAR as f64).sqrt())
}

/// Arithmetic mean of the trailing `min(k, n)` points.
pub fn moving_average(prices: &[f64], k: usize) -> Option<f64> {
    mean(trailing(prices, k))
}

/// Wilder's RSI, reported at the end of the series.
///
/// The averages are seeded from the first `window + 1` price changes (divided by
/// `window`), then smoothed forward one change at a time with weight
/// `(window - 1) / window`. A zero average loss gives RS = 0.
pub fn rsi(prices: &[f64], window: usize) -> Option<f64> {
    if window == 0 || prices.len() < window + 1 {
        return None;
    }

    let deltas: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();
    let seed = &deltas[..deltas.len().min(window + 1)];
    let period = window as f64;

    let mut avg_gain = seed.iter().filter(|d| **d >= 0.0).sum::<f64>() / period;
    let mut avg_loss = -seed.iter().filter(|d| **d < 0.0).sum::<f64>() / period;
    let mut value = rsi_value(avg_gain, avg_loss);

    for i in window..prices.len() {
        let delta = deltas[i - 1];
        let (gain, loss) = if delta > 0.0 { (delta, 0.0) } else { (0.0, -delta) };
        avg_gain = (avg_gain * (period - 1.0) + gain) / period;
        avg_loss = (avg_loss * (period - 1.0) + loss) / period;
        value = rsi_value(avg_gain, avg_loss);
    }

    defined(value)
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    let rs = if avg_loss != 0.0 {
        avg_gain / avg_loss
    } else {
        0.0
    };
    100.0 - 100.0 / (1.0 + rs)
}

/// Slope of stock daily returns against market daily returns.
///
/// Both series must cover the same dates. Undefined when the market return
/// variance is zero.
pub fn beta(stock: &[f64], market: &[f64]) -> Option<f64> {
    if stock.len() != market.len() || stock.len() < 2 {
        return None;
    }
    if stock.iter().chain(market).any(|p| *p <= 0.0 || !p.is_finite()) {
        return None;
    }

    let returns = simple_returns(stock);
    let market_returns = simple_returns(market);
    let mean_r = mean(&returns)?;
    let mean_m = mean(&market_returns)?;

    let mut covariance = 0.0;
    let mut market_variance = 0.0;
    for (r, m) in returns.iter().zip(&market_returns) {
        covariance += (r - mean_r) * (m - mean_m);
        market_variance += (m - mean_m).powi(2);
    }

    if market_variance.abs() < f64::EPSILON {
        return None;
    }

    defined(covariance / market_variance)
}

/// Annualized Sharpe ratio of simple daily returns in excess of
/// `risk_free_rate / 252`.
pub fn sharpe_ratio(prices: &[f64], risk_free_rate: f64) -> Option<f64> {
    if prices.len() < 2 {
        return None;
    }
    let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR as f64;
    let excess: Vec<f64> = simple_returns(prices)
        .into_iter()
        .map(|r| r - daily_rf)
        .filter(|r| r.is_finite())
        .collect();

    let m = mean(&excess)?;
    let sd = stdev(&excess)?;
    if sd < MIN_STDEV {
        return None;
    }
    defined((TRADING_DAYS_PER_YEAR as f64).sqrt() * m / sd)
}

/// Largest peak-to-trough decline, as a fraction of the running peak.
pub fn max_drawdown(prices: &[f64]) -> Option<f64> {
    let (&first, rest) = prices.split_first()?;

    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &price in rest {
        if price > peak {
            peak = price;
        }
        if peak > 0.0 {
            let dd = (peak - price) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }

    defined(max_dd)
}
