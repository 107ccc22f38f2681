#![allow(dead_code)]

use chrono::NaiveDate;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use stockmetrics::domain::error::StockMetricsError;
use stockmetrics::domain::metrics::MetricsRow;
use stockmetrics::domain::price::PricePoint;
use stockmetrics::ports::metrics_store_port::MetricsStorePort;
use stockmetrics::ports::price_store_port::PriceStorePort;

/// In-memory price store keyed by (symbol, date), with per-symbol query errors.
pub struct MockPriceStore {
    pub rows: RefCell<BTreeMap<(String, NaiveDate), f64>>,
    pub errors: HashMap<String, String>,
}

impl MockPriceStore {
    pub fn new() -> Self {
        Self {
            rows: RefCell::new(BTreeMap::new()),
            errors: HashMap::new(),
        }
    }

    pub fn with_prices(self, symbol: &str, start: NaiveDate, prices: &[f64]) -> Self {
        {
            let mut rows = self.rows.borrow_mut();
            for (i, &p) in prices.iter().enumerate() {
                rows.insert((symbol.to_string(), start + chrono::Duration::days(i as i64)), p);
            }
        }
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl PriceStorePort for MockPriceStore {
    fn upsert_batch(&self, points: &[PricePoint]) -> Result<usize, StockMetricsError> {
        let mut rows = self.rows.borrow_mut();
        for p in points {
            rows.insert((p.symbol.clone(), p.date), p.closing_price);
        }
        Ok(points.len())
    }

    fn query_range(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<(NaiveDate, f64)>, StockMetricsError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(StockMetricsError::DatabaseQuery {
                reason: reason.clone(),
            });
        }
        Ok(self
            .rows
            .borrow()
            .iter()
            .filter(|((s, d), _)| s == symbol && *d >= start_date && *d <= end_date)
            .map(|((_, d), p)| (*d, *p))
            .collect())
    }

    fn latest(&self, symbol: &str) -> Result<Option<(NaiveDate, f64)>, StockMetricsError> {
        Ok(self
            .rows
            .borrow()
            .iter()
            .filter(|((s, _), _)| s == symbol)
            .map(|((_, d), p)| (*d, *p))
            .last())
    }

    fn purge_older_than(&self, cutoff: NaiveDate) -> Result<usize, StockMetricsError> {
        let mut rows = self.rows.borrow_mut();
        let before = rows.len();
        rows.retain(|(_, d), _| *d >= cutoff);
        Ok(before - rows.len())
    }

    fn list_symbols(&self) -> Result<Vec<String>, StockMetricsError> {
        let mut symbols: Vec<String> = self.rows.borrow().keys().map(|(s, _)| s.clone()).collect();
        symbols.dedup();
        Ok(symbols)
    }

    fn count_on(&self, date: NaiveDate) -> Result<usize, StockMetricsError> {
        Ok(self.rows.borrow().keys().filter(|(_, d)| *d == date).count())
    }

    fn total_count(&self) -> Result<usize, StockMetricsError> {
        Ok(self.rows.borrow().len())
    }
}

/// In-memory metrics store; upserts for symbols in `failing` return an error.
#[derive(Default)]
pub struct MockMetricsStore {
    pub rows: RefCell<BTreeMap<(String, NaiveDate), MetricsRow>>,
    pub failing: Vec<String>,
    pub upserts: RefCell<usize>,
}

impl MockMetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(mut self, symbol: &str) -> Self {
        self.failing.push(symbol.to_string());
        self
    }

    pub fn row(&self, symbol: &str, date: NaiveDate) -> Option<MetricsRow> {
        self.rows.borrow().get(&(symbol.to_string(), date)).cloned()
    }
}

impl MetricsStorePort for MockMetricsStore {
    fn upsert(&self, row: &MetricsRow) -> Result<(), StockMetricsError> {
        if self.failing.contains(&row.symbol) {
            return Err(StockMetricsError::Database {
                reason: "connection reset".into(),
            });
        }
        *self.upserts.borrow_mut() += 1;
        self.rows
            .borrow_mut()
            .insert((row.symbol.clone(), row.date), row.clone());
        Ok(())
    }

    fn get(&self, symbol: &str, date: NaiveDate) -> Result<Option<MetricsRow>, StockMetricsError> {
        Ok(self.row(symbol, date))
    }

    fn latest(&self, symbol: &str) -> Result<Option<MetricsRow>, StockMetricsError> {
        Ok(self
            .rows
            .borrow()
            .iter()
            .filter(|((s, _), _)| s == symbol)
            .map(|(_, r)| r.clone())
            .last())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Deterministic, strictly positive price path of `count` closes.
pub fn wavy_prices(count: usize, start_price: f64) -> Vec<f64> {
    (0..count)
        .map(|i| {
            let t = i as f64;
            start_price * (1.0 + 0.0004 * t) + 3.0 * (t / 7.0).sin()
        })
        .collect()
}

pub fn points(symbol: &str, start: NaiveDate, prices: &[f64]) -> Vec<PricePoint> {
    prices
        .iter()
        .enumerate()
        .map(|(i, &p)| PricePoint::new(symbol, start + chrono::Duration::days(i as i64), p))
        .collect()
}
