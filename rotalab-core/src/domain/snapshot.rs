//! Per-tick feed contracts.
//!
//! These are the only inputs the engine consumes. Market data retrieval
//! and indicator computation happen upstream; the engine sees one
//! consistent snapshot per instrument per tick, never a mix of stale and
//! fresh values.

use super::instrument::{GroupTag, InstrumentId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One instrument's view for a single tick.
///
/// `indicators` carries precomputed values keyed by name (e.g. `sma_200`,
/// `atr_14`, `adx_14`). A missing key means the upstream indicator has not
/// warmed up; the engine fails closed on it rather than erroring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentSnapshot {
    pub id: InstrumentId,
    pub group: GroupTag,
    pub price: f64,
    pub is_ready: bool,
    pub indicators: BTreeMap<String, f64>,
}

impl InstrumentSnapshot {
    /// A snapshot with no indicator values attached.
    pub fn bare(id: impl Into<InstrumentId>, group: impl Into<GroupTag>, price: f64) -> Self {
        Self {
            id: id.into(),
            group: group.into(),
            price,
            is_ready: true,
            indicators: BTreeMap::new(),
        }
    }

    pub fn with_indicator(mut self, name: impl Into<String>, value: f64) -> Self {
        self.indicators.insert(name.into(), value);
        self
    }

    /// A usable price: finite and strictly positive.
    pub fn has_valid_price(&self) -> bool {
        self.price.is_finite() && self.price > 0.0
    }
}

/// Global (benchmark-level) view for a single tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub date: NaiveDate,
    pub benchmark_price: f64,
    /// Benchmark price vs. its long moving average, computed upstream.
    pub benchmark_trend_ok: bool,
    /// VIX-like series value, when a graded regime gate is configured.
    pub volatility_proxy: Option<f64>,
}

impl MarketSnapshot {
    pub fn new(date: NaiveDate, benchmark_price: f64, benchmark_trend_ok: bool) -> Self {
        Self {
            date,
            benchmark_price,
            benchmark_trend_ok,
            volatility_proxy: None,
        }
    }

    pub fn with_volatility_proxy(mut self, proxy: f64) -> Self {
        self.volatility_proxy = Some(proxy);
        self
    }
}
