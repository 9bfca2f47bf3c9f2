//! Tick feeds for the CLI driver.
//!
//! The core consumes per-tick snapshots with precomputed indicator
//! values; in production those come from a market-data service. Here we
//! build them from either a local CSV file or a seeded synthetic
//! random-walk universe, computing the handful of indicator names the
//! config subscribes to (rolling means for `sma_*`, mean absolute moves
//! for `atr_*`).

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rotalab_core::domain::{InstrumentSnapshot, MarketSnapshot};
use serde::Deserialize;
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;

/// One tick's worth of input for the engine.
pub struct Tick {
    pub snapshots: Vec<InstrumentSnapshot>,
    pub market: MarketSnapshot,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: NaiveDate,
    symbol: String,
    group: String,
    price: f64,
}

/// Rolling per-symbol state used to derive subscribed indicators.
struct SymbolWindow {
    prices: VecDeque<f64>,
    capacity: usize,
}

impl SymbolWindow {
    fn new(capacity: usize) -> Self {
        Self {
            prices: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, price: f64) {
        if self.prices.len() == self.capacity {
            self.prices.pop_front();
        }
        self.prices.push_back(price);
    }

    fn mean(&self, window: usize) -> Option<f64> {
        if self.prices.len() < window {
            return None;
        }
        let sum: f64 = self.prices.iter().rev().take(window).sum();
        Some(sum / window as f64)
    }

    /// Crude ATR stand-in: mean absolute tick-to-tick move.
    fn mean_abs_move(&self, window: usize) -> Option<f64> {
        if self.prices.len() < window + 1 {
            return None;
        }
        let recent: Vec<f64> = self.prices.iter().rev().take(window + 1).copied().collect();
        let sum: f64 = recent.windows(2).map(|w| (w[0] - w[1]).abs()).sum();
        Some(sum / window as f64)
    }
}

/// Derives subscribed indicator values from raw prices, tick by tick.
pub struct IndicatorPlumbing {
    subscribed: Vec<String>,
    windows: BTreeMap<String, SymbolWindow>,
    benchmark: SymbolWindow,
    trend_window: usize,
}

impl IndicatorPlumbing {
    pub fn new(subscribed: Vec<String>, trend_window: usize) -> Self {
        Self {
            subscribed,
            windows: BTreeMap::new(),
            benchmark: SymbolWindow::new(trend_window.max(1) + 1),
            trend_window,
        }
    }

    /// Record a benchmark price and report whether the trend holds
    /// (price at or above its rolling mean).
    pub fn observe_benchmark(&mut self, price: f64) -> bool {
        self.benchmark.push(price);
        match self.benchmark.mean(self.trend_window) {
            Some(mean) => price >= mean,
            None => false,
        }
    }

    /// Record a symbol price and compute every subscribed indicator
    /// that can be derived from prices alone. A name with an
    /// unrecognized shape is skipped; the engine fails closed on it.
    pub fn observe(&mut self, symbol: &str, price: f64) -> BTreeMap<String, f64> {
        let window = self
            .windows
            .entry(symbol.to_string())
            .or_insert_with(|| SymbolWindow::new(512));
        window.push(price);

        let mut values = BTreeMap::new();
        for name in &self.subscribed {
            let value = if let Some(period) = parse_period(name, "sma_") {
                window.mean(period)
            } else if let Some(period) = parse_period(name, "atr_") {
                window.mean_abs_move(period)
            } else {
                None
            };
            if let Some(value) = value {
                values.insert(name.clone(), value);
            }
        }
        values
    }
}

fn parse_period(name: &str, prefix: &str) -> Option<usize> {
    name.strip_prefix(prefix)?.parse().ok()
}

/// Load ticks from a CSV of `date,symbol,group,price` rows. Rows for
/// `benchmark_symbol` feed the market snapshot instead of the universe.
pub fn load_csv(
    path: &Path,
    benchmark_symbol: &str,
    plumbing: &mut IndicatorPlumbing,
) -> Result<Vec<Tick>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("open bars file {}", path.display()))?;

    let mut by_date: BTreeMap<NaiveDate, Vec<CsvRow>> = BTreeMap::new();
    for row in reader.deserialize() {
        let row: CsvRow = row.context("parse bars row")?;
        by_date.entry(row.date).or_default().push(row);
    }
    if by_date.is_empty() {
        bail!("bars file {} contains no rows", path.display());
    }

    let mut ticks = Vec::with_capacity(by_date.len());
    for (date, rows) in by_date {
        let benchmark_price = rows
            .iter()
            .find(|r| r.symbol == benchmark_symbol)
            .map(|r| r.price)
            .with_context(|| format!("no {benchmark_symbol} row on {date}"))?;
        let trend_ok = plumbing.observe_benchmark(benchmark_price);

        let snapshots = rows
            .iter()
            .filter(|r| r.symbol != benchmark_symbol)
            .map(|r| {
                let indicators = plumbing.observe(&r.symbol, r.price);
                InstrumentSnapshot {
                    id: r.symbol.as_str().into(),
                    group: r.group.as_str().into(),
                    price: r.price,
                    is_ready: true,
                    indicators,
                }
            })
            .collect();

        ticks.push(Tick {
            snapshots,
            market: MarketSnapshot::new(date, benchmark_price, trend_ok),
        });
    }
    Ok(ticks)
}

/// Generate a seeded synthetic feed for a universe: geometric random
/// walks with a per-symbol drift.
pub fn synthetic(
    members: &[(String, String)],
    ticks: usize,
    seed: u64,
    plumbing: &mut IndicatorPlumbing,
) -> Vec<Tick> {
    let mut rng = StdRng::seed_from_u64(seed);
    let start = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();

    let drifts: Vec<f64> = (0..members.len())
        .map(|_| rng.gen_range(-0.0015..0.0025))
        .collect();
    let mut prices: Vec<f64> = (0..members.len())
        .map(|_| rng.gen_range(20.0..400.0))
        .collect();
    let mut benchmark_price = 4000.0;

    let mut out = Vec::with_capacity(ticks);
    for t in 0..ticks {
        let date = start + chrono::Duration::days(t as i64);

        benchmark_price *= 1.0 + 0.0003 + rng.gen_range(-0.01..0.01);
        let trend_ok = plumbing.observe_benchmark(benchmark_price);

        let mut snapshots = Vec::with_capacity(members.len());
        for (i, (symbol, group)) in members.iter().enumerate() {
            prices[i] *= 1.0 + drifts[i] + rng.gen_range(-0.02..0.02);
            prices[i] = prices[i].max(0.01);
            let indicators = plumbing.observe(symbol, prices[i]);
            snapshots.push(InstrumentSnapshot {
                id: symbol.as_str().into(),
                group: group.as_str().into(),
                price: prices[i],
                is_ready: true,
                indicators,
            });
        }

        out.push(Tick {
            snapshots,
            market: MarketSnapshot::new(date, benchmark_price, trend_ok),
        });
    }
    out
}
