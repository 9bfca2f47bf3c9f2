//! Signal engine — turns indicator state into a pass/fail gate plus a
//! numeric score per instrument.
//!
//! The engine is portfolio-agnostic: it reads the instrument state store
//! and the benchmark history, never positions or holdings. It fails
//! closed — any missing or un-ready input yields `passes = false` with a
//! [`GateReason`], never an error. Scores for passing instruments are a
//! weighted sum of simple returns over the configured horizons, with an
//! optional acceleration multiplier.

pub mod gates;

use crate::config::SignalConfig;
use crate::domain::InstrumentId;
use crate::error::EvalError;
use crate::store::{InstrumentStateStore, RollingSeries};
use serde::{Deserialize, Serialize};

/// Why an instrument did or did not pass the signal gate.
///
/// A closed enumeration consumed uniformly by logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateReason {
    Passed,
    /// Store not warmed up, feed not ready, or a gate input missing.
    NotReady,
    /// A return horizon reaches past the available window.
    InsufficientHistory,
    /// A non-positive price made a return undefined.
    DivisionGuard,
    /// Price below the trend-confirmation moving average.
    BelowTrendMa,
    /// Instrument return did not beat the benchmark's.
    WeakRelativeStrength,
    /// Directional-strength indicator below threshold or lacking
    /// upward dominance.
    WeakTrendStrength,
}

/// Per-instrument signal for one rebalance tick. Never persisted across
/// ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: InstrumentId,
    pub score: f64,
    pub passes: bool,
    pub reason: GateReason,
}

impl Signal {
    fn rejected(id: InstrumentId, reason: GateReason) -> Self {
        Self {
            id,
            score: 0.0,
            passes: false,
            reason,
        }
    }
}

/// Momentum signal engine driven by a declarative [`SignalConfig`].
#[derive(Debug, Clone)]
pub struct SignalEngine {
    config: SignalConfig,
}

impl SignalEngine {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    /// Score one instrument. Ties across instruments are broken by the
    /// caller's stable iteration order, so identical inputs always rank
    /// identically.
    pub fn evaluate(
        &self,
        store: &InstrumentStateStore,
        id: &InstrumentId,
        benchmark: &RollingSeries,
    ) -> Signal {
        if !store.is_ready(id) {
            return Signal::rejected(id.clone(), GateReason::NotReady);
        }

        let composite = match self.composite_return(store, id) {
            Ok(score) => score,
            Err(reason) => return Signal::rejected(id.clone(), reason),
        };

        if let Some(gate) = &self.config.trend_gate {
            if let Err(reason) = gates::trend_confirmation(store, id, &gate.ma_indicator) {
                return Signal::rejected(id.clone(), reason);
            }
        }

        if let Some(gate) = &self.config.relative_strength {
            if let Err(reason) =
                gates::relative_strength(store, id, benchmark, gate.horizon_bars)
            {
                return Signal::rejected(id.clone(), reason);
            }
        }

        if let Some(gate) = &self.config.trend_strength {
            if let Err(reason) = gates::trend_strength(store, id, gate) {
                return Signal::rejected(id.clone(), reason);
            }
        }

        let score = match self.accelerate(store, id, composite) {
            Ok(score) => score,
            Err(reason) => return Signal::rejected(id.clone(), reason),
        };

        Signal {
            id: id.clone(),
            score,
            passes: true,
            reason: GateReason::Passed,
        }
    }

    /// Weighted sum of simple returns over the configured horizons.
    fn composite_return(
        &self,
        store: &InstrumentStateStore,
        id: &InstrumentId,
    ) -> Result<f64, GateReason> {
        let mut composite = 0.0;
        for horizon in &self.config.horizons {
            let ret = store
                .return_over(id, horizon.bars)
                .map_err(reason_for_eval_error)?;
            composite += horizon.weight * ret;
        }
        Ok(composite)
    }

    /// Optional acceleration: score * (1 + k * (short_ret - long_ret)).
    fn accelerate(
        &self,
        store: &InstrumentStateStore,
        id: &InstrumentId,
        score: f64,
    ) -> Result<f64, GateReason> {
        let Some(accel) = &self.config.acceleration else {
            return Ok(score);
        };
        let short = store
            .return_over(id, accel.short_bars)
            .map_err(reason_for_eval_error)?;
        let long = store
            .return_over(id, accel.long_bars)
            .map_err(reason_for_eval_error)?;
        Ok(score * (1.0 + accel.factor * (short - long)))
    }
}

fn reason_for_eval_error(err: EvalError) -> GateReason {
    match err {
        EvalError::InsufficientHistory { .. } => GateReason::InsufficientHistory,
        EvalError::DivisionGuard { .. } => GateReason::DivisionGuard,
        EvalError::UnknownInstrument(_) => GateReason::NotReady,
    }
}
