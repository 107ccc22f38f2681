//! Alpha Vantage intraday quote feed.

use crate::domain::error::StockMetricsError;
use crate::domain::price::PricePoint;
use crate::ports::config_port::ConfigPort;
use crate::ports::quote_port::QuotePort;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co/query";
pub const DEFAULT_INTERVAL: &str = "5min";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum PriceFeedError {
    #[error("network error: {0}")]
    Network(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("bad response: {0}")]
    BadResponse(String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl PriceFeedError {
    fn for_symbol(self, symbol: &str) -> StockMetricsError {
        StockMetricsError::PriceFeed {
            symbol: symbol.to_string(),
            reason: self.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AvIntradayResponse {
    // Throttled: { "Note": "Thank you for using Alpha Vantage! ..." }
    #[serde(rename = "Note")]
    note: Option<String>,

    // Newer throttle/premium wording uses "Information" instead of "Note".
    #[serde(rename = "Information")]
    information: Option<String>,

    #[serde(rename = "Error Message")]
    error_message: Option<String>,

    // "Meta Data" and "Time Series (<interval>)"
    #[serde(flatten)]
    rest: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct AvBar {
    #[serde(rename = "4. close")]
    close: String,
}

/// Latest close in an intraday response body.
///
/// The most recent timestamp wins; its date part dates the point.
pub fn parse_intraday_response(
    symbol: &str,
    interval: &str,
    body: &str,
) -> Result<PricePoint, PriceFeedError> {
    let response: AvIntradayResponse =
        serde_json::from_str(body).map_err(|e| PriceFeedError::Parse(e.to_string()))?;

    if let Some(note) = response.note.or(response.information) {
        return Err(PriceFeedError::RateLimited(note));
    }
    if let Some(msg) = response.error_message {
        return Err(PriceFeedError::BadResponse(msg));
    }

    let key = format!("Time Series ({})", interval);
    let series = response
        .rest
        .get(&key)
        .cloned()
        .ok_or_else(|| PriceFeedError::Parse(format!("missing key '{}'", key)))?;
    let series: BTreeMap<String, AvBar> =
        serde_json::from_value(series).map_err(|e| PriceFeedError::Parse(e.to_string()))?;

    // "YYYY-MM-DD HH:MM:SS" keys sort chronologically
    let (timestamp, bar) = series
        .last_key_value()
        .ok_or_else(|| PriceFeedError::BadResponse(format!("empty '{}'", key)))?;

    let date_part = timestamp.get(..10).unwrap_or(timestamp);
    let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|e| PriceFeedError::Parse(format!("timestamp '{}': {}", timestamp, e)))?;
    let close = bar
        .close
        .trim()
        .parse::<f64>()
        .map_err(|e| PriceFeedError::Parse(format!("close '{}': {}", bar.close, e)))?;

    Ok(PricePoint::new(symbol, date, close))
}

pub struct AlphaVantageAdapter {
    client: reqwest::blocking::Client,
    api_key: String,
    base_url: String,
    interval: String,
}

impl AlphaVantageAdapter {
    pub fn new(api_key: impl Into<String>) -> Result<Self, StockMetricsError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StockMetricsError::ConfigInvalid {
                section: "feed".into(),
                key: "api_key".into(),
                reason: format!("cannot build HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            interval: DEFAULT_INTERVAL.to_string(),
        })
    }

    /// `[feed] api_key` (falling back to `ALPHAVANTAGE_API_KEY`), plus the
    /// optional `base_url` and `interval`.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, StockMetricsError> {
        let api_key = match config.require_string("feed", "api_key") {
            Ok(key) => key,
            Err(missing) => std::env::var("ALPHAVANTAGE_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty())
                .ok_or(missing)?,
        };

        let mut adapter = Self::new(api_key)?;
        if let Some(url) = config.get_string("feed", "base_url").filter(|s| !s.is_empty()) {
            adapter.base_url = url;
        }
        if let Some(interval) = config.get_string("feed", "interval").filter(|s| !s.is_empty()) {
            adapter.interval = interval;
        }
        Ok(adapter)
    }

    pub fn interval(&self) -> &str {
        &self.interval
    }

    fn fetch_body(&self, symbol: &str) -> Result<String, PriceFeedError> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("function", "TIME_SERIES_INTRADAY"),
                ("symbol", symbol),
                ("interval", self.interval.as_str()),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .map_err(|e| PriceFeedError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PriceFeedError::BadResponse(format!("HTTP {}", status)));
        }
        resp.text().map_err(|e| PriceFeedError::Network(e.to_string()))
    }
}

impl QuotePort for AlphaVantageAdapter {
    fn fetch_latest_point(&self, symbol: &str) -> Result<PricePoint, StockMetricsError> {
        tracing::debug!(symbol, interval = %self.interval, "requesting intraday series");
        let body = self.fetch_body(symbol).map_err(|e| e.for_symbol(symbol))?;
        parse_intraday_response(symbol, &self.interval, &body).map_err(|e| e.for_symbol(symbol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    const INTRADAY: &str = r#"{
        "Meta Data": {
            "1. Information": "Intraday (5min) open, high, low, close prices and volume",
            "2. Symbol": "IBM",
            "3. Last Refreshed": "2024-03-01 19:55:00",
            "4. Interval": "5min"
        },
        "Time Series (5min)": {
            "2024-02-29 19:55:00": {
                "1. open": "185.0000", "2. high": "185.1000", "3. low": "184.9000",
                "4. close": "185.0300", "5. volume": "120"
            },
            "2024-03-01 19:50:00": {
                "1. open": "185.5000", "2. high": "185.6000", "3. low": "185.4000",
                "4. close": "185.5500", "5. volume": "33"
            },
            "2024-03-01 19:55:00": {
                "1. open": "185.5500", "2. high": "185.8000", "3. low": "185.5000",
                "4. close": "185.7100", "5. volume": "85"
            }
        }
    }"#;

    #[test]
    fn takes_latest_timestamp() {
        let point = parse_intraday_response("IBM", "5min", INTRADAY).unwrap();
        assert_eq!(point.symbol, "IBM");
        assert_eq!(point.date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(point.closing_price, 185.71);
    }

    #[test]
    fn throttle_note_is_rate_limited() {
        let body = r#"{ "Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute." }"#;
        let err = parse_intraday_response("IBM", "5min", body).unwrap_err();
        assert!(matches!(err, PriceFeedError::RateLimited(msg) if msg.contains("5 calls")));
    }

    #[test]
    fn information_is_rate_limited() {
        let body = r#"{ "Information": "Please consider spreading out your free API requests." }"#;
        let err = parse_intraday_response("IBM", "5min", body).unwrap_err();
        assert!(matches!(err, PriceFeedError::RateLimited(_)));
    }

    #[test]
    fn error_message_is_bad_response() {
        let body = r#"{ "Error Message": "Invalid API call. Please retry or visit the documentation." }"#;
        let err = parse_intraday_response("NOPE", "5min", body).unwrap_err();
        assert!(matches!(err, PriceFeedError::BadResponse(msg) if msg.starts_with("Invalid API call")));
    }

    #[test]
    fn missing_series_key() {
        let err = parse_intraday_response("IBM", "1min", INTRADAY).unwrap_err();
        assert_eq!(err.to_string(), "parse error: missing key 'Time Series (1min)'");
    }

    #[test]
    fn unparsable_close() {
        let body = r#"{ "Time Series (5min)": { "2024-03-01 19:55:00": { "4. close": "n/a" } } }"#;
        assert!(matches!(
            parse_intraday_response("IBM", "5min", body),
            Err(PriceFeedError::Parse(_))
        ));
    }

    #[test]
    fn empty_series() {
        let body = r#"{ "Time Series (5min)": {} }"#;
        assert!(matches!(
            parse_intraday_response("IBM", "5min", body),
            Err(PriceFeedError::BadResponse(_))
        ));
    }

    #[test]
    fn not_json() {
        assert!(matches!(
            parse_intraday_response("IBM", "5min", "<html>"),
            Err(PriceFeedError::Parse(_))
        ));
    }

    #[test]
    fn error_carries_symbol() {
        let err = PriceFeedError::RateLimited("slow down".into()).for_symbol("MSFT");
        assert_eq!(
            err.to_string(),
            "price feed error for MSFT: rate limited: slow down"
        );
    }

    #[test]
    fn from_config_reads_feed_section() {
        let cfg = FileConfigAdapter::from_string(
            "[feed]\napi_key = demo\ninterval = 15min\nbase_url = http://localhost:9/query\n",
        )
        .unwrap();
        let adapter = AlphaVantageAdapter::from_config(&cfg).unwrap();
        assert_eq!(adapter.interval(), "15min");
        assert_eq!(adapter.base_url, "http://localhost:9/query");
    }

    #[test]
    fn unreachable_host_is_feed_error() {
        let cfg = FileConfigAdapter::from_string(
            "[feed]\napi_key = demo\nbase_url = http://127.0.0.1:9/query\n",
        )
        .unwrap();
        let adapter = AlphaVantageAdapter::from_config(&cfg).unwrap();
        let err = adapter.fetch_latest_close("IBM").unwrap_err();
        assert!(matches!(err, StockMetricsError::PriceFeed { symbol, .. } if symbol == "IBM"));
    }
}
