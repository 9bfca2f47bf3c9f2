//! Instrument State Store — bounded rolling history + readiness tracking.
//!
//! The store replaces the ambient per-symbol dictionaries of ad hoc
//! strategy code with one owned, injected component keyed by a stable
//! instrument id. It has an explicit create/destroy lifecycle tied to
//! universe membership; removal is deferred by the caller while an open
//! position still references the instrument.
//!
//! Every other component reads the store; only the tick pipeline writes
//! to it, once per tick, so all readers observe one consistent snapshot.

pub mod rolling;

pub use rolling::RollingSeries;

use crate::domain::{GroupTag, Instrument, InstrumentId, InstrumentSnapshot};
use crate::error::EvalError;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone)]
struct InstrumentState {
    group: GroupTag,
    prices: RollingSeries,
    /// Latest named indicator values, refreshed whole each tick.
    indicators: HashMap<String, f64>,
    /// Count of consecutive ticks each subscribed indicator has been present.
    indicator_depth: HashMap<String, usize>,
    feed_ready: bool,
}

/// Bounded rolling history and readiness tracking per instrument.
#[derive(Debug, Clone)]
pub struct InstrumentStateStore {
    capacity: usize,
    /// Window depth required before any instrument counts as ready.
    min_history: usize,
    /// Indicator names every ready instrument must supply.
    subscribed: Vec<String>,
    instruments: BTreeMap<InstrumentId, InstrumentState>,
}

impl InstrumentStateStore {
    pub fn new(capacity: usize, min_history: usize, subscribed: Vec<String>) -> Self {
        assert!(capacity >= min_history, "capacity must cover min_history");
        Self {
            capacity,
            min_history,
            subscribed,
            instruments: BTreeMap::new(),
        }
    }

    /// Create the instrument on universe entry (no-op if already tracked;
    /// a changed group tag is adopted).
    pub fn upsert(&mut self, id: InstrumentId, group: GroupTag) {
        match self.instruments.get_mut(&id) {
            Some(state) => state.group = group,
            None => {
                self.instruments.insert(
                    id,
                    InstrumentState {
                        group,
                        prices: RollingSeries::new(self.capacity),
                        indicators: HashMap::new(),
                        indicator_depth: HashMap::new(),
                        feed_ready: false,
                    },
                );
            }
        }
    }

    /// Destroy the instrument on universe exit. The pipeline only calls
    /// this once no open position references the id.
    pub fn retire(&mut self, id: &InstrumentId) {
        self.instruments.remove(id);
    }

    pub fn contains(&self, id: &InstrumentId) -> bool {
        self.instruments.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// Ingest one tick's observation for an instrument. Creates the
    /// instrument if the universe feed introduces it here.
    pub fn append(&mut self, snapshot: &InstrumentSnapshot) {
        self.upsert(snapshot.id.clone(), snapshot.group.clone());
        let Some(state) = self.instruments.get_mut(&snapshot.id) else {
            return;
        };

        state.prices.push(snapshot.price);
        state.feed_ready = snapshot.is_ready;
        state.indicators = snapshot
            .indicators
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        for name in &self.subscribed {
            let depth = state.indicator_depth.entry(name.clone()).or_insert(0);
            if snapshot.indicators.contains_key(name) {
                *depth = (*depth + 1).min(self.capacity);
            } else {
                *depth = 0;
            }
        }
    }

    /// True once the window holds at least the longest configured
    /// lookback, the feed flags the instrument ready, and every
    /// subscribed indicator has history at the latest tick.
    pub fn is_ready(&self, id: &InstrumentId) -> bool {
        let Some(state) = self.instruments.get(id) else {
            return false;
        };
        if !state.feed_ready || state.prices.len() < self.min_history {
            return false;
        }
        self.subscribed
            .iter()
            .all(|name| state.indicator_depth.get(name).copied().unwrap_or(0) > 0)
    }

    /// Simple return over the last `n` ticks of the price series.
    pub fn return_over(&self, id: &InstrumentId, n: usize) -> Result<f64, EvalError> {
        let state = self
            .instruments
            .get(id)
            .ok_or_else(|| EvalError::UnknownInstrument(id.clone()))?;
        state.prices.return_over(n)
    }

    /// Latest value of a named indicator, if present this tick.
    pub fn indicator(&self, id: &InstrumentId, name: &str) -> Option<f64> {
        self.instruments
            .get(id)
            .and_then(|s| s.indicators.get(name).copied())
    }

    pub fn latest_price(&self, id: &InstrumentId) -> Option<f64> {
        self.instruments.get(id).and_then(|s| s.prices.latest())
    }

    /// Materialized membership record for one instrument.
    pub fn instrument(&self, id: &InstrumentId) -> Option<Instrument> {
        self.instruments.get(id).map(|state| Instrument {
            id: id.clone(),
            group: state.group.clone(),
            latest_price: state.prices.latest().unwrap_or(f64::NAN),
            feed_ready: state.feed_ready,
        })
    }

    pub fn group(&self, id: &InstrumentId) -> Option<&GroupTag> {
        self.instruments.get(id).map(|s| &s.group)
    }

    /// Group tags for every tracked instrument, for the selector.
    pub fn groups(&self) -> BTreeMap<InstrumentId, GroupTag> {
        self.instruments
            .iter()
            .map(|(id, s)| (id.clone(), s.group.clone()))
            .collect()
    }

    /// Tracked instrument ids in stable (sorted) order.
    pub fn ids(&self) -> Vec<InstrumentId> {
        self.instruments.keys().cloned().collect()
    }
}
