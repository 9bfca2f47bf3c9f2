//! Selector — ranks passing signals and greedily picks up to N
//! instruments honoring per-group caps.
//!
//! A pure function of (signals, groups, config): no store access, no
//! portfolio access. The greedy pass is a deterministic approximation,
//! not a global optimum — reproducibility matters more than optimality
//! here. The sort is stable, so equal scores keep the caller's feed
//! order and identical inputs always produce the identical selection.

use crate::config::SelectorConfig;
use crate::domain::{GroupTag, InstrumentId};
use crate::signal::Signal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ordered list of accepted signals, best first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub accepted: Vec<Signal>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }

    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    pub fn ids(&self) -> Vec<InstrumentId> {
        self.accepted.iter().map(|s| s.id.clone()).collect()
    }

    pub fn contains(&self, id: &InstrumentId) -> bool {
        self.accepted.iter().any(|s| &s.id == id)
    }
}

/// Rank passing signals and greedily accept under the group cap.
///
/// Signals that do not pass are ignored. An instrument with no group
/// mapping is skipped — it cannot be counted against any cap. If fewer
/// candidates are accepted than `min_candidates`, the selection is
/// emptied rather than under-filled (forces cash).
pub fn select(
    signals: &[Signal],
    groups: &BTreeMap<InstrumentId, GroupTag>,
    config: &SelectorConfig,
) -> Selection {
    let mut ranked: Vec<&Signal> = signals.iter().filter(|s| s.passes).collect();
    // Stable: equal scores keep feed order
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut group_counts: BTreeMap<&GroupTag, usize> = BTreeMap::new();
    let mut accepted = Vec::with_capacity(config.target_count);

    for signal in ranked {
        if accepted.len() == config.target_count {
            break;
        }
        let Some(group) = groups.get(&signal.id) else {
            continue;
        };
        let count = group_counts.entry(group).or_insert(0);
        if *count >= config.group_cap {
            continue;
        }
        *count += 1;
        accepted.push(signal.clone());
    }

    if accepted.len() < config.min_candidates {
        return Selection::default();
    }

    Selection { accepted }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::GateReason;

    fn passing(id: &str, score: f64) -> Signal {
        Signal {
            id: id.into(),
            score,
            passes: true,
            reason: GateReason::Passed,
        }
    }

    fn failing(id: &str) -> Signal {
        Signal {
            id: id.into(),
            score: 0.0,
            passes: false,
            reason: GateReason::NotReady,
        }
    }

    fn groups(entries: &[(&str, &str)]) -> BTreeMap<InstrumentId, GroupTag> {
        entries
            .iter()
            .map(|(id, g)| (InstrumentId::from(*id), GroupTag::from(*g)))
            .collect()
    }

    fn config(target_count: usize, group_cap: usize, min_candidates: usize) -> SelectorConfig {
        SelectorConfig {
            target_count,
            group_cap,
            min_candidates,
        }
    }

    #[test]
    fn greedy_group_capped_selection() {
        // Scores [10, 8, 8, 5, 1], groups [A, A, B, B, C], N=3, cap=1:
        // accept i0 (A), reject i1 (A full), accept i2 (B),
        // reject i3 (B full), accept i4 (C).
        let signals = vec![
            passing("i0", 10.0),
            passing("i1", 8.0),
            passing("i2", 8.0),
            passing("i3", 5.0),
            passing("i4", 1.0),
        ];
        let groups = groups(&[
            ("i0", "A"),
            ("i1", "A"),
            ("i2", "B"),
            ("i3", "B"),
            ("i4", "C"),
        ]);
        let selection = select(&signals, &groups, &config(3, 1, 0));
        assert_eq!(selection.ids(), vec!["i0".into(), "i2".into(), "i4".into()]);
    }

    #[test]
    fn stops_at_target_count() {
        let signals = vec![
            passing("i0", 5.0),
            passing("i1", 4.0),
            passing("i2", 3.0),
        ];
        let groups = groups(&[("i0", "A"), ("i1", "B"), ("i2", "C")]);
        let selection = select(&signals, &groups, &config(2, 1, 0));
        assert_eq!(selection.len(), 2);
        assert_eq!(selection.ids(), vec!["i0".into(), "i1".into()]);
    }

    #[test]
    fn failing_signals_ignored() {
        let signals = vec![failing("i0"), passing("i1", 1.0)];
        let groups = groups(&[("i0", "A"), ("i1", "B")]);
        let selection = select(&signals, &groups, &config(3, 1, 0));
        assert_eq!(selection.ids(), vec!["i1".into()]);
    }

    #[test]
    fn under_minimum_forces_cash() {
        let signals = vec![passing("i0", 5.0)];
        let groups = groups(&[("i0", "A")]);
        let selection = select(&signals, &groups, &config(3, 1, 2));
        assert!(selection.is_empty());
    }

    #[test]
    fn equal_scores_keep_feed_order() {
        let signals = vec![
            passing("first", 7.0),
            passing("second", 7.0),
            passing("third", 7.0),
        ];
        let groups = groups(&[("first", "A"), ("second", "B"), ("third", "C")]);
        let selection = select(&signals, &groups, &config(2, 1, 0));
        assert_eq!(selection.ids(), vec!["first".into(), "second".into()]);
    }

    #[test]
    fn deterministic_across_runs() {
        let signals = vec![
            passing("i0", 3.0),
            passing("i1", 9.0),
            passing("i2", 9.0),
            passing("i3", 2.0),
        ];
        let groups = groups(&[("i0", "A"), ("i1", "B"), ("i2", "A"), ("i3", "B")]);
        let cfg = config(3, 2, 0);
        let first = select(&signals, &groups, &cfg);
        let second = select(&signals, &groups, &cfg);
        assert_eq!(first, second);
    }

    #[test]
    fn unmapped_group_is_skipped() {
        let signals = vec![passing("ghost", 10.0), passing("i1", 1.0)];
        let groups = groups(&[("i1", "B")]);
        let selection = select(&signals, &groups, &config(2, 1, 0));
        assert_eq!(selection.ids(), vec!["i1".into()]);
    }
}
