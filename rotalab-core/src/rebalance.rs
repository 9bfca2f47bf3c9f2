//! Rebalancer — diffs current holdings against target weights and emits
//! close / set-weight instructions.
//!
//! Closes always come first (freeing capital before deploying it). The
//! hysteresis band suppresses small weight adjustments to avoid churn;
//! it never suppresses a required close — a deselected instrument is
//! closed regardless of how small its weight is.

use crate::allocator::TargetWeights;
use crate::domain::{InstrumentId, RebalancePlan};
use std::collections::BTreeMap;

/// Diff current holdings against targets.
///
/// Running this twice with identical current/target holdings produces an
/// empty second plan: a close removes the holding, and an in-band weight
/// match emits nothing.
pub fn plan(
    current: &BTreeMap<InstrumentId, f64>,
    targets: &TargetWeights,
    threshold: f64,
) -> RebalancePlan {
    let mut closes = Vec::new();
    for id in current.keys() {
        if targets.get(id).is_none() {
            closes.push(id.clone());
        }
    }

    let mut set_weights = Vec::new();
    for (id, target) in targets.iter() {
        let held = current.get(id).copied().unwrap_or(0.0);
        if (held - target).abs() > threshold {
            set_weights.push((id.clone(), target));
        }
    }

    RebalancePlan { closes, set_weights }
}

/// Close every current holding; no opens or adjusts. Used when the
/// regime gate goes fully bearish or the selection is infeasible.
pub fn liquidate_all(current: &BTreeMap<InstrumentId, f64>) -> RebalancePlan {
    RebalancePlan {
        closes: current.keys().cloned().collect(),
        set_weights: Vec::new(),
    }
}
