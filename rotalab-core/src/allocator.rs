//! Weight allocator — converts a selection into normalized target
//! weights honoring per-position and per-group caps.
//!
//! Raw weights come from the configured scheme, then pass through a
//! capping + proportional-redistribution loop to a fixed point, a
//! per-group scale-down, and finally a scale by the effective exposure
//! (configured max gross exposure times the regime multiplier). A scheme
//! whose denominator is zero or undefined falls back to equal weighting
//! rather than failing the tick.

use crate::config::{AllocatorConfig, WeightScheme};
use crate::domain::{GroupTag, InstrumentId};
use crate::selector::Selection;
use crate::store::InstrumentStateStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Non-negative target weight per selected instrument.
///
/// Deterministic iteration order (sorted by id). Invariants established
/// by [`allocate`]: each weight ≤ p_max, each group sum ≤ g_max, total
/// ≤ effective exposure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetWeights {
    weights: BTreeMap<InstrumentId, f64>,
}

impl TargetWeights {
    pub fn get(&self, id: &InstrumentId) -> Option<f64> {
        self.weights.get(id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&InstrumentId, f64)> {
        self.weights.iter().map(|(id, w)| (id, *w))
    }

    pub fn ids(&self) -> impl Iterator<Item = &InstrumentId> {
        self.weights.keys()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }

    /// Summed weight per group, for cap verification.
    pub fn group_sums(
        &self,
        groups: &BTreeMap<InstrumentId, GroupTag>,
    ) -> BTreeMap<GroupTag, f64> {
        let mut sums: BTreeMap<GroupTag, f64> = BTreeMap::new();
        for (id, weight) in &self.weights {
            if let Some(group) = groups.get(id) {
                *sums.entry(group.clone()).or_insert(0.0) += weight;
            }
        }
        sums
    }
}

impl FromIterator<(InstrumentId, f64)> for TargetWeights {
    fn from_iter<T: IntoIterator<Item = (InstrumentId, f64)>>(iter: T) -> Self {
        Self {
            weights: iter.into_iter().collect(),
        }
    }
}

const WEIGHT_EPS: f64 = 1e-12;

/// Allocate target weights for a selection.
///
/// `exposure_multiplier` comes from the regime gate; the final vector is
/// scaled by `max_gross_exposure * exposure_multiplier`. An empty
/// selection allocates nothing.
pub fn allocate(
    selection: &Selection,
    store: &InstrumentStateStore,
    config: &AllocatorConfig,
    exposure_multiplier: f64,
) -> TargetWeights {
    let k = selection.len();
    if k == 0 || exposure_multiplier <= 0.0 {
        return TargetWeights::default();
    }

    let ids: Vec<InstrumentId> = selection.ids();
    let mut weights = raw_weights(selection, store, config);

    cap_and_redistribute(&mut weights, config.max_position_weight);
    scale_groups(&ids, &mut weights, store, config.max_group_weight);

    let effective = config.max_gross_exposure * exposure_multiplier.min(1.0);
    for w in &mut weights {
        *w *= effective;
    }

    ids.into_iter().zip(weights).collect()
}

/// Raw weights per the configured scheme, before any capping.
fn raw_weights(
    selection: &Selection,
    store: &InstrumentStateStore,
    config: &AllocatorConfig,
) -> Vec<f64> {
    let k = selection.len();
    let equal = vec![1.0 / k as f64; k];

    match config.scheme {
        WeightScheme::Equal => equal,
        WeightScheme::ScoreProportional => {
            let scores: Vec<f64> = selection.accepted.iter().map(|s| s.score).collect();
            let sum: f64 = scores.iter().sum();
            if sum <= 0.0 || scores.iter().any(|s| *s <= 0.0) {
                return equal;
            }
            scores.iter().map(|s| s / sum).collect()
        }
        WeightScheme::InverseVolatility => {
            let Some(indicator) = &config.volatility_indicator else {
                return equal;
            };
            let mut inverses = Vec::with_capacity(k);
            for signal in &selection.accepted {
                match store.indicator(&signal.id, indicator).filter(|v| *v > 0.0) {
                    Some(vol) => inverses.push(1.0 / vol),
                    None => return equal,
                }
            }
            let sum: f64 = inverses.iter().sum();
            if sum <= 0.0 {
                return equal;
            }
            inverses.iter().map(|inv| inv / sum).collect()
        }
    }
}

/// Cap each weight at `p_max`, redistributing the removed excess
/// proportionally among still-uncapped positions, repeated to a fixed
/// point. Bounded by k iterations; if everything is capped the excess
/// is dropped (the portfolio simply holds more cash).
fn cap_and_redistribute(weights: &mut [f64], p_max: f64) {
    for _ in 0..weights.len() {
        let mut excess = 0.0;
        for w in weights.iter_mut() {
            if *w > p_max {
                excess += *w - p_max;
                *w = p_max;
            }
        }
        if excess <= WEIGHT_EPS {
            return;
        }
        let uncapped_sum: f64 = weights
            .iter()
            .filter(|w| **w < p_max - WEIGHT_EPS)
            .sum();
        if uncapped_sum <= WEIGHT_EPS {
            return;
        }
        for w in weights.iter_mut() {
            if *w < p_max - WEIGHT_EPS {
                *w += excess * *w / uncapped_sum;
            }
        }
    }
}

/// Scale every weight in a group down by `g_max / group_sum` when the
/// group's summed weight exceeds the cap.
fn scale_groups(
    ids: &[InstrumentId],
    weights: &mut [f64],
    store: &InstrumentStateStore,
    g_max: f64,
) {
    let mut group_sums: BTreeMap<GroupTag, f64> = BTreeMap::new();
    for (id, weight) in ids.iter().zip(weights.iter()) {
        if let Some(group) = store.group(id) {
            *group_sums.entry(group.clone()).or_insert(0.0) += *weight;
        }
    }

    for (id, weight) in ids.iter().zip(weights.iter_mut()) {
        let Some(group) = store.group(id) else {
            continue;
        };
        let sum = group_sums[group];
        if sum > g_max {
            *weight *= g_max / sum;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AllocatorConfig, WeightScheme};
    use crate::domain::InstrumentSnapshot;
    use crate::signal::{GateReason, Signal};

    fn passing(id: &str, score: f64) -> Signal {
        Signal {
            id: id.into(),
            score,
            passes: true,
            reason: GateReason::Passed,
        }
    }

    fn selection(entries: &[(&str, f64)]) -> Selection {
        Selection {
            accepted: entries.iter().map(|(id, s)| passing(id, *s)).collect(),
        }
    }

    fn store_with(entries: &[(&str, &str, &[(&str, f64)])]) -> InstrumentStateStore {
        let mut store = InstrumentStateStore::new(50, 1, vec![]);
        for (id, group, indicators) in entries {
            let mut snap = InstrumentSnapshot::bare(*id, *group, 100.0);
            for (name, value) in *indicators {
                snap = snap.with_indicator(*name, *value);
            }
            store.append(&snap);
        }
        store
    }

    fn config(scheme: WeightScheme, p_max: f64, g_max: f64, exposure: f64) -> AllocatorConfig {
        AllocatorConfig {
            scheme,
            max_position_weight: p_max,
            max_group_weight: g_max,
            max_gross_exposure: exposure,
            volatility_indicator: Some("atr_pct".into()),
        }
    }

    #[test]
    fn equal_weight_capping_leaves_cash() {
        // k=4, p_max=0.20: raw 0.25 each capped to 0.20; everything
        // capped, so no redistribution target remains. Total 0.80.
        let sel = selection(&[("a", 1.0), ("b", 1.0), ("c", 1.0), ("d", 1.0)]);
        let store = store_with(&[
            ("a", "A", &[]),
            ("b", "B", &[]),
            ("c", "C", &[]),
            ("d", "D", &[]),
        ]);
        let cfg = config(WeightScheme::Equal, 0.20, 1.0, 1.0);
        let weights = allocate(&sel, &store, &cfg, 1.0);
        for (_, w) in weights.iter() {
            assert!((w - 0.20).abs() < 1e-12);
        }
        assert!((weights.total() - 0.80).abs() < 1e-12);
    }

    #[test]
    fn score_proportional_weights() {
        let sel = selection(&[("a", 3.0), ("b", 1.0)]);
        let store = store_with(&[("a", "A", &[]), ("b", "B", &[])]);
        let cfg = config(WeightScheme::ScoreProportional, 1.0, 1.0, 1.0);
        let weights = allocate(&sel, &store, &cfg, 1.0);
        assert!((weights.get(&"a".into()).unwrap() - 0.75).abs() < 1e-12);
        assert!((weights.get(&"b".into()).unwrap() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn score_proportional_negative_score_falls_back_to_equal() {
        let sel = selection(&[("a", 3.0), ("b", -1.0)]);
        let store = store_with(&[("a", "A", &[]), ("b", "B", &[])]);
        let cfg = config(WeightScheme::ScoreProportional, 1.0, 1.0, 1.0);
        let weights = allocate(&sel, &store, &cfg, 1.0);
        assert!((weights.get(&"a".into()).unwrap() - 0.5).abs() < 1e-12);
        assert!((weights.get(&"b".into()).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn inverse_volatility_weights() {
        let sel = selection(&[("calm", 1.0), ("wild", 1.0)]);
        let store = store_with(&[
            ("calm", "A", &[("atr_pct", 1.0)]),
            ("wild", "B", &[("atr_pct", 3.0)]),
        ]);
        let cfg = config(WeightScheme::InverseVolatility, 1.0, 1.0, 1.0);
        let weights = allocate(&sel, &store, &cfg, 1.0);
        // 1/1 : 1/3 normalizes to 0.75 : 0.25
        assert!((weights.get(&"calm".into()).unwrap() - 0.75).abs() < 1e-12);
        assert!((weights.get(&"wild".into()).unwrap() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn inverse_volatility_missing_vol_falls_back_to_equal() {
        let sel = selection(&[("a", 1.0), ("b", 1.0)]);
        let store = store_with(&[("a", "A", &[("atr_pct", 1.0)]), ("b", "B", &[])]);
        let cfg = config(WeightScheme::InverseVolatility, 1.0, 1.0, 1.0);
        let weights = allocate(&sel, &store, &cfg, 1.0);
        assert!((weights.get(&"a".into()).unwrap() - 0.5).abs() < 1e-12);
        assert!((weights.get(&"b".into()).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn redistribution_reaches_fixed_point() {
        // Scores 60/30/10 with p_max 0.4: a capped at 0.4, excess 0.2
        // redistributed 3:1 over b and c, then re-capped as needed.
        let sel = selection(&[("a", 6.0), ("b", 3.0), ("c", 1.0)]);
        let store = store_with(&[("a", "A", &[]), ("b", "B", &[]), ("c", "C", &[])]);
        let cfg = config(WeightScheme::ScoreProportional, 0.4, 1.0, 1.0);
        let weights = allocate(&sel, &store, &cfg, 1.0);
        for (_, w) in weights.iter() {
            assert!(w <= 0.4 + 1e-9);
        }
        // b: 0.3 + 0.2 * 0.3/0.4 = 0.45 -> re-capped to 0.4;
        // c absorbs the remainder up to its proportional share
        assert!((weights.get(&"a".into()).unwrap() - 0.4).abs() < 1e-9);
        assert!((weights.get(&"b".into()).unwrap() - 0.4).abs() < 1e-9);
        assert!(weights.total() <= 1.0 + 1e-9);
    }

    #[test]
    fn group_cap_scales_group_down() {
        let sel = selection(&[("a", 1.0), ("b", 1.0), ("c", 1.0), ("d", 1.0)]);
        let store = store_with(&[
            ("a", "Tech", &[]),
            ("b", "Tech", &[]),
            ("c", "Energy", &[]),
            ("d", "Finance", &[]),
        ]);
        // Equal raw 0.25 each; Tech sums to 0.5 > g_max 0.4
        let cfg = config(WeightScheme::Equal, 0.3, 0.4, 1.0);
        let weights = allocate(&sel, &store, &cfg, 1.0);
        let tech_sum =
            weights.get(&"a".into()).unwrap() + weights.get(&"b".into()).unwrap();
        assert!(tech_sum <= 0.4 + 1e-9);
        assert!((weights.get(&"c".into()).unwrap() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn exposure_multiplier_scales_everything() {
        let sel = selection(&[("a", 1.0), ("b", 1.0)]);
        let store = store_with(&[("a", "A", &[]), ("b", "B", &[])]);
        let cfg = config(WeightScheme::Equal, 1.0, 1.0, 1.0);
        let weights = allocate(&sel, &store, &cfg, 0.5);
        assert!((weights.total() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn zero_exposure_allocates_nothing() {
        let sel = selection(&[("a", 1.0)]);
        let store = store_with(&[("a", "A", &[])]);
        let cfg = config(WeightScheme::Equal, 1.0, 1.0, 1.0);
        let weights = allocate(&sel, &store, &cfg, 0.0);
        assert!(weights.is_empty());
    }

    #[test]
    fn empty_selection_allocates_nothing() {
        let store = store_with(&[]);
        let cfg = config(WeightScheme::Equal, 1.0, 1.0, 1.0);
        let weights = allocate(&Selection::default(), &store, &cfg, 1.0);
        assert!(weights.is_empty());
    }
}
