//! Signal gates — independent pass/fail checks applied after scoring.
//!
//! Each gate fails closed: a missing or NaN input rejects the instrument
//! with `GateReason::NotReady` rather than raising an error.

use crate::config::TrendStrengthGate;
use crate::domain::InstrumentId;
use crate::error::EvalError;
use crate::store::{InstrumentStateStore, RollingSeries};

use super::GateReason;

/// Price must be at or above the named moving average.
pub fn trend_confirmation(
    store: &InstrumentStateStore,
    id: &InstrumentId,
    ma_indicator: &str,
) -> Result<(), GateReason> {
    let price = store.latest_price(id).ok_or(GateReason::NotReady)?;
    let ma = store
        .indicator(id, ma_indicator)
        .filter(|v| v.is_finite())
        .ok_or(GateReason::NotReady)?;
    if price >= ma {
        Ok(())
    } else {
        Err(GateReason::BelowTrendMa)
    }
}

/// Instrument return must exceed the benchmark's return over the same
/// horizon.
pub fn relative_strength(
    store: &InstrumentStateStore,
    id: &InstrumentId,
    benchmark: &RollingSeries,
    horizon_bars: usize,
) -> Result<(), GateReason> {
    let instrument_return = store
        .return_over(id, horizon_bars)
        .map_err(not_ready_on_eval_error)?;
    let benchmark_return = benchmark
        .return_over(horizon_bars)
        .map_err(not_ready_on_eval_error)?;
    if instrument_return > benchmark_return {
        Ok(())
    } else {
        Err(GateReason::WeakRelativeStrength)
    }
}

/// Directional-strength indicator above threshold with upward dominance
/// (+DI strictly above -DI).
pub fn trend_strength(
    store: &InstrumentStateStore,
    id: &InstrumentId,
    gate: &TrendStrengthGate,
) -> Result<(), GateReason> {
    let strength = store
        .indicator(id, &gate.indicator)
        .filter(|v| v.is_finite())
        .ok_or(GateReason::NotReady)?;
    let plus_di = store
        .indicator(id, &gate.plus_di_indicator)
        .filter(|v| v.is_finite())
        .ok_or(GateReason::NotReady)?;
    let minus_di = store
        .indicator(id, &gate.minus_di_indicator)
        .filter(|v| v.is_finite())
        .ok_or(GateReason::NotReady)?;

    if strength >= gate.threshold && plus_di > minus_di {
        Ok(())
    } else {
        Err(GateReason::WeakTrendStrength)
    }
}

fn not_ready_on_eval_error(err: EvalError) -> GateReason {
    match err {
        EvalError::DivisionGuard { .. } => GateReason::DivisionGuard,
        _ => GateReason::NotReady,
    }
}
