//! Open position record tracked by the risk monitor.

use super::instrument::InstrumentId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a tracked position.
///
/// `Open` positions are evaluated by the risk monitor each tick. A
/// position moves to `Closing` the moment an exit condition fires; the
/// external execution layer owns the fill, after which the record is
/// dropped entirely (there is no persistent "closed" state).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionState {
    Open,
    Closing,
}

/// A single open position.
///
/// Two fields carry monotonicity invariants enforced by the risk monitor:
/// `peak_price` never decreases while the position is open, and
/// `stop_price` never moves down once set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: InstrumentId,
    pub entry_price: f64,
    pub entry_date: NaiveDate,
    pub bars_held: usize,
    pub peak_price: f64,
    pub stop_price: Option<f64>,
    /// ATR observed at entry, kept for reference in exit diagnostics.
    pub entry_atr: Option<f64>,
    pub state: PositionState,
}

impl Position {
    /// Open a new position. The initial stop, when `entry_atr` and a stop
    /// multiple are configured, is set by the risk monitor at open time.
    pub fn open(
        id: InstrumentId,
        entry_price: f64,
        entry_date: NaiveDate,
        entry_atr: Option<f64>,
    ) -> Self {
        Self {
            id,
            entry_price,
            entry_date,
            bars_held: 0,
            peak_price: entry_price,
            stop_price: None,
            entry_atr,
            state: PositionState::Open,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == PositionState::Open
    }

    /// Unrealized fractional return at `price`.
    pub fn unrealized_return(&self, price: f64) -> f64 {
        (price - self.entry_price) / self.entry_price
    }

    /// Record a new observed price: the peak only ratchets upward.
    pub fn observe_price(&mut self, price: f64) {
        if price > self.peak_price {
            self.peak_price = price;
        }
    }

    /// Propose a new stop level. The stop only ratchets upward — a
    /// proposal below the current stop is ignored.
    pub fn ratchet_stop(&mut self, proposed: f64) {
        match self.stop_price {
            Some(current) if proposed <= current => {}
            _ => self.stop_price = Some(proposed),
        }
    }
}
