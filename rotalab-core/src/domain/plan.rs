//! Rebalance plan and exit signal output contracts.
//!
//! A `RebalancePlan` is produced once per rebalance tick and handed to
//! the external execution layer. Closes are listed before opens/adjusts
//! to reflect freeing of capital first. `ExitSignal`s come from the risk
//! monitor on its own schedule, independent of rebalance plans.

use super::instrument::InstrumentId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a position was told to exit.
///
/// A closed enumeration so logging and property tests consume exit causes
/// uniformly — no ad hoc string tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    /// Unrealized return fell through the hard stop-loss percentage.
    StopLoss,
    /// Price crossed below the (possibly ratcheted) stop price.
    TrailingStop,
    /// Maximum holding period exceeded.
    TimeStop,
    /// The signal engine no longer passes the instrument.
    SignalReversal,
    /// Configured profit target reached.
    ProfitTarget,
    /// Regime gate went fully bearish; all positions force-closed.
    RegimeLiquidation,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::StopLoss => "stop_loss",
            Self::TrailingStop => "trailing_stop",
            Self::TimeStop => "time_stop",
            Self::SignalReversal => "signal_reversal",
            Self::ProfitTarget => "profit_target",
            Self::RegimeLiquidation => "regime_liquidation",
        };
        write!(f, "{tag}")
    }
}

/// Exit instruction for one open position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitSignal {
    pub instrument: InstrumentId,
    pub reason: ExitReason,
}

/// Plan emitted by one rebalance tick.
///
/// `closes` always precede `set_weights` when the plan is consumed in
/// order. A plan with both lists empty is a deliberate no-op tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RebalancePlan {
    pub closes: Vec<InstrumentId>,
    pub set_weights: Vec<(InstrumentId, f64)>,
}

impl RebalancePlan {
    pub fn is_empty(&self) -> bool {
        self.closes.is_empty() && self.set_weights.is_empty()
    }

    /// Number of instructions in the plan.
    pub fn len(&self) -> usize {
        self.closes.len() + self.set_weights.len()
    }

    /// Whether the plan closes a specific instrument.
    pub fn closes_instrument(&self, id: &InstrumentId) -> bool {
        self.closes.iter().any(|c| c == id)
    }

    /// Target weight for an instrument, if the plan adjusts it.
    pub fn target_weight(&self, id: &InstrumentId) -> Option<f64> {
        self.set_weights
            .iter()
            .find(|(w_id, _)| w_id == id)
            .map(|(_, w)| *w)
    }
}
