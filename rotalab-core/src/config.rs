//! Declarative strategy configuration.
//!
//! What varies between strategies is data, not code: horizons and their
//! weights, gate thresholds, caps, and exit parameters all live here.
//! Validation happens once at construction and fails fast — a config
//! that passes `validate()` can never produce a per-tick configuration
//! error.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// One return horizon and its weight in the composite score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizonWeight {
    pub bars: usize,
    pub weight: f64,
}

/// Score acceleration: multiply the composite score by
/// `1 + factor * (short_horizon_return - long_horizon_return)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Acceleration {
    pub factor: f64,
    pub short_bars: usize,
    pub long_bars: usize,
}

/// Trend-confirmation gate: price must be at or above a named moving
/// average supplied by the indicator feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendGate {
    pub ma_indicator: String,
}

/// Relative-strength gate: instrument return must exceed the benchmark's
/// return over the same horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelativeStrengthGate {
    pub horizon_bars: usize,
}

/// Trend-strength gate: a directional-strength indicator (ADX-style)
/// above a threshold, with upward directional dominance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendStrengthGate {
    pub indicator: String,
    pub threshold: f64,
    pub plus_di_indicator: String,
    pub minus_di_indicator: String,
}

/// Signal engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalConfig {
    pub horizons: Vec<HorizonWeight>,
    #[serde(default)]
    pub acceleration: Option<Acceleration>,
    #[serde(default)]
    pub trend_gate: Option<TrendGate>,
    #[serde(default)]
    pub relative_strength: Option<RelativeStrengthGate>,
    #[serde(default)]
    pub trend_strength: Option<TrendStrengthGate>,
}

/// One volatility band of a graded regime gate. Bands are matched in
/// order against the volatility proxy: the first band whose `upper`
/// edge is not exceeded wins. A proxy above every edge means exposure 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityBand {
    pub upper: f64,
    pub exposure: f64,
}

/// Regime gate configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RegimeConfig {
    /// Benchmark trend flag alone: exposure 1.0 or 0.0.
    Binary,
    /// Trend flag gates to zero; otherwise the volatility proxy is
    /// banded into graded exposure levels.
    Graded { bands: Vec<VolatilityBand> },
}

/// Selector configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Target number of selected instruments (N).
    pub target_count: usize,
    /// Maximum accepted instruments per group (C).
    pub group_cap: usize,
    /// Fewer passing candidates than this forces an empty selection (cash).
    pub min_candidates: usize,
}

/// Weighting scheme for the allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightScheme {
    Equal,
    ScoreProportional,
    InverseVolatility,
}

/// Weight allocator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocatorConfig {
    pub scheme: WeightScheme,
    /// Per-position cap (p_max).
    pub max_position_weight: f64,
    /// Per-group cap (g_max).
    pub max_group_weight: f64,
    /// Maximum gross exposure (E) before the regime multiplier.
    pub max_gross_exposure: f64,
    /// Indicator supplying per-instrument volatility for inverse-vol.
    #[serde(default)]
    pub volatility_indicator: Option<String>,
}

/// Rebalancer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalancerConfig {
    /// Hysteresis band: minimum |current - target| before a SET_WEIGHT
    /// is emitted.
    pub threshold: f64,
}

/// Volatility-based initial stop: entry - multiple * ATR-at-entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtrStop {
    pub indicator: String,
    pub multiple: f64,
}

/// Trailing stop: activates once unrealized return reaches
/// `activation_pct`, then trails `trail_pct` below the peak.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trailing {
    pub activation_pct: f64,
    pub trail_pct: f64,
}

/// Position risk monitor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    #[serde(default)]
    pub stop_loss_pct: Option<f64>,
    #[serde(default)]
    pub max_hold_bars: Option<usize>,
    #[serde(default)]
    pub exit_on_signal_loss: bool,
    #[serde(default)]
    pub profit_target_pct: Option<f64>,
    #[serde(default)]
    pub atr_stop: Option<AtrStop>,
    #[serde(default)]
    pub trailing: Option<Trailing>,
}

/// Instrument state store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Rolling window capacity per instrument.
    pub capacity: usize,
}

/// Complete declarative strategy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub name: String,
    pub store: StoreConfig,
    pub signal: SignalConfig,
    pub regime: RegimeConfig,
    pub selector: SelectorConfig,
    pub allocator: AllocatorConfig,
    pub rebalancer: RebalancerConfig,
    pub risk: RiskConfig,
}

/// Startup configuration failure. Raised once at construction, never
/// per-tick.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("signal horizons must not be empty")]
    EmptyHorizons,

    #[error("horizon bars must be >= 1")]
    ZeroHorizonBars,

    #[error("horizon weights must sum to 1.0, got {sum}")]
    HorizonWeightSum { sum: f64 },

    #[error("selector target_count must be >= 1")]
    ZeroTargetCount,

    #[error("selector group_cap must be >= 1")]
    ZeroGroupCap,

    #[error("selector min_candidates {min_candidates} exceeds target_count {target_count}")]
    MinCandidatesAboveTarget {
        min_candidates: usize,
        target_count: usize,
    },

    #[error("max_position_weight {p_max} must be in (0, 1]")]
    PositionCapOutOfRange { p_max: f64 },

    #[error("max_position_weight {p_max} is below the equal share 1/{target_count}")]
    CapBelowEqualShare { p_max: f64, target_count: usize },

    #[error("max_group_weight {g_max} must be >= max_position_weight {p_max} and <= 1")]
    GroupCapOutOfRange { g_max: f64, p_max: f64 },

    #[error("max_gross_exposure {exposure} must be in (0, 1]")]
    ExposureOutOfRange { exposure: f64 },

    #[error("rebalance threshold {threshold} must be in [0, 1)")]
    ThresholdOutOfRange { threshold: f64 },

    #[error("trailing config invalid: activation_pct {activation_pct}, trail_pct {trail_pct}")]
    InvalidTrailing {
        activation_pct: f64,
        trail_pct: f64,
    },

    #[error("regime bands must be non-empty, ascending, with exposures in [0, 1]")]
    InvalidRegimeBands,

    #[error("inverse_volatility scheme requires a volatility_indicator")]
    MissingVolatilityIndicator,

    #[error("risk parameter must be positive: {name}")]
    NonPositiveRiskParam { name: &'static str },

    #[error("store capacity {capacity} is below the required history {required}")]
    CapacityBelowHistory { capacity: usize, required: usize },

    #[error("read config file: {0}")]
    Io(String),

    #[error("parse config TOML: {0}")]
    Parse(String),
}

const WEIGHT_SUM_EPS: f64 = 1e-6;

impl StrategyConfig {
    /// Load and validate a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML (for round-trips and generated presets).
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validate every cross-field constraint. Called by `from_toml`;
    /// call directly when building a config in code.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let signal = &self.signal;
        if signal.horizons.is_empty() {
            return Err(ConfigError::EmptyHorizons);
        }
        if signal.horizons.iter().any(|h| h.bars == 0) {
            return Err(ConfigError::ZeroHorizonBars);
        }
        let sum: f64 = signal.horizons.iter().map(|h| h.weight).sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_EPS {
            return Err(ConfigError::HorizonWeightSum { sum });
        }
        if let Some(accel) = &signal.acceleration {
            if accel.short_bars == 0 || accel.long_bars == 0 {
                return Err(ConfigError::ZeroHorizonBars);
            }
        }
        if let Some(rs) = &signal.relative_strength {
            if rs.horizon_bars == 0 {
                return Err(ConfigError::ZeroHorizonBars);
            }
        }

        let sel = &self.selector;
        if sel.target_count == 0 {
            return Err(ConfigError::ZeroTargetCount);
        }
        if sel.group_cap == 0 {
            return Err(ConfigError::ZeroGroupCap);
        }
        if sel.min_candidates > sel.target_count {
            return Err(ConfigError::MinCandidatesAboveTarget {
                min_candidates: sel.min_candidates,
                target_count: sel.target_count,
            });
        }

        let alloc = &self.allocator;
        let p_max = alloc.max_position_weight;
        if p_max <= 0.0 || p_max > 1.0 {
            return Err(ConfigError::PositionCapOutOfRange { p_max });
        }
        if p_max + WEIGHT_SUM_EPS < 1.0 / sel.target_count as f64 {
            return Err(ConfigError::CapBelowEqualShare {
                p_max,
                target_count: sel.target_count,
            });
        }
        let g_max = alloc.max_group_weight;
        if g_max < p_max || g_max > 1.0 {
            return Err(ConfigError::GroupCapOutOfRange { g_max, p_max });
        }
        let exposure = alloc.max_gross_exposure;
        if exposure <= 0.0 || exposure > 1.0 {
            return Err(ConfigError::ExposureOutOfRange { exposure });
        }
        if alloc.scheme == WeightScheme::InverseVolatility && alloc.volatility_indicator.is_none() {
            return Err(ConfigError::MissingVolatilityIndicator);
        }

        let threshold = self.rebalancer.threshold;
        if !(0.0..1.0).contains(&threshold) {
            return Err(ConfigError::ThresholdOutOfRange { threshold });
        }

        if let RegimeConfig::Graded { bands } = &self.regime {
            if bands.is_empty() {
                return Err(ConfigError::InvalidRegimeBands);
            }
            let ascending = bands.windows(2).all(|w| w[0].upper < w[1].upper);
            let exposures_ok = bands
                .iter()
                .all(|b| (0.0..=1.0).contains(&b.exposure) && b.upper.is_finite());
            if !ascending || !exposures_ok {
                return Err(ConfigError::InvalidRegimeBands);
            }
        }

        let risk = &self.risk;
        if let Some(pct) = risk.stop_loss_pct {
            if pct <= 0.0 {
                return Err(ConfigError::NonPositiveRiskParam {
                    name: "stop_loss_pct",
                });
            }
        }
        if let Some(atr) = &risk.atr_stop {
            if atr.multiple <= 0.0 {
                return Err(ConfigError::NonPositiveRiskParam {
                    name: "atr_stop.multiple",
                });
            }
        }
        if let Some(trailing) = &risk.trailing {
            if trailing.activation_pct < 0.0
                || trailing.trail_pct <= 0.0
                || trailing.trail_pct >= 1.0
            {
                return Err(ConfigError::InvalidTrailing {
                    activation_pct: trailing.activation_pct,
                    trail_pct: trailing.trail_pct,
                });
            }
        }
        if let Some(pct) = risk.profit_target_pct {
            if pct <= 0.0 {
                return Err(ConfigError::NonPositiveRiskParam {
                    name: "profit_target_pct",
                });
            }
        }

        let required = self.min_history();
        if self.store.capacity < required {
            return Err(ConfigError::CapacityBelowHistory {
                capacity: self.store.capacity,
                required,
            });
        }

        Ok(())
    }

    /// Window depth required before an instrument counts as ready:
    /// the longest configured lookback plus the point it is measured from.
    pub fn min_history(&self) -> usize {
        let mut longest = self
            .signal
            .horizons
            .iter()
            .map(|h| h.bars)
            .max()
            .unwrap_or(0);
        if let Some(accel) = &self.signal.acceleration {
            longest = longest.max(accel.short_bars).max(accel.long_bars);
        }
        if let Some(rs) = &self.signal.relative_strength {
            longest = longest.max(rs.horizon_bars);
        }
        longest + 1
    }

    /// Indicator names every ready instrument must supply.
    pub fn subscribed_indicators(&self) -> Vec<String> {
        let mut names = Vec::new();
        if let Some(gate) = &self.signal.trend_gate {
            names.push(gate.ma_indicator.clone());
        }
        if let Some(gate) = &self.signal.trend_strength {
            names.push(gate.indicator.clone());
            names.push(gate.plus_di_indicator.clone());
            names.push(gate.minus_di_indicator.clone());
        }
        if let Some(vol) = &self.allocator.volatility_indicator {
            names.push(vol.clone());
        }
        if let Some(atr) = &self.risk.atr_stop {
            names.push(atr.indicator.clone());
        }
        names.sort();
        names.dedup();
        names
    }

    /// Deterministic configuration fingerprint: BLAKE3 over the canonical
    /// JSON rendering. Stable across platforms and builds; changes iff
    /// the configuration changes.
    pub fn fingerprint(&self) -> String {
        let canonical =
            serde_json::to_string(self).expect("strategy config serializes infallibly");
        blake3::hash(canonical.as_bytes()).to_hex().to_string()
    }

    /// A sensible monthly dual-momentum rotation baseline.
    pub fn default_rotation() -> Self {
        Self {
            name: "dual_momentum_rotation".into(),
            store: StoreConfig { capacity: 300 },
            signal: SignalConfig {
                horizons: vec![
                    HorizonWeight { bars: 63, weight: 0.5 },
                    HorizonWeight { bars: 126, weight: 0.3 },
                    HorizonWeight { bars: 252, weight: 0.2 },
                ],
                acceleration: None,
                trend_gate: Some(TrendGate {
                    ma_indicator: "sma_200".into(),
                }),
                relative_strength: Some(RelativeStrengthGate { horizon_bars: 126 }),
                trend_strength: None,
            },
            regime: RegimeConfig::Binary,
            selector: SelectorConfig {
                target_count: 5,
                group_cap: 2,
                min_candidates: 2,
            },
            allocator: AllocatorConfig {
                scheme: WeightScheme::Equal,
                max_position_weight: 0.25,
                max_group_weight: 0.40,
                max_gross_exposure: 1.0,
                volatility_indicator: None,
            },
            rebalancer: RebalancerConfig { threshold: 0.02 },
            risk: RiskConfig {
                stop_loss_pct: Some(0.15),
                atr_stop: Some(AtrStop {
                    indicator: "atr_14".into(),
                    multiple: 2.0,
                }),
                trailing: Some(Trailing {
                    activation_pct: 0.05,
                    trail_pct: 0.10,
                }),
                max_hold_bars: None,
                exit_on_signal_loss: true,
                profit_target_pct: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rotation_validates() {
        let config = StrategyConfig::default_rotation();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn weights_must_sum_to_one() {
        let mut config = StrategyConfig::default_rotation();
        config.signal.horizons[0].weight = 0.9;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::HorizonWeightSum { .. })
        ));
    }

    #[test]
    fn empty_horizons_rejected() {
        let mut config = StrategyConfig::default_rotation();
        config.signal.horizons.clear();
        assert_eq!(config.validate(), Err(ConfigError::EmptyHorizons));
    }

    #[test]
    fn cap_below_equal_share_rejected() {
        let mut config = StrategyConfig::default_rotation();
        // target_count 5 demands p_max >= 0.2
        config.allocator.max_position_weight = 0.10;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::CapBelowEqualShare { .. })
        ));
    }

    #[test]
    fn group_cap_must_cover_position_cap() {
        let mut config = StrategyConfig::default_rotation();
        config.allocator.max_group_weight = 0.20; // below p_max 0.25
        assert!(matches!(
            config.validate(),
            Err(ConfigError::GroupCapOutOfRange { .. })
        ));
    }

    #[test]
    fn inverse_vol_requires_indicator() {
        let mut config = StrategyConfig::default_rotation();
        config.allocator.scheme = WeightScheme::InverseVolatility;
        config.allocator.volatility_indicator = None;
        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingVolatilityIndicator)
        );
    }

    #[test]
    fn regime_bands_must_ascend() {
        let mut config = StrategyConfig::default_rotation();
        config.regime = RegimeConfig::Graded {
            bands: vec![
                VolatilityBand { upper: 30.0, exposure: 0.5 },
                VolatilityBand { upper: 20.0, exposure: 1.0 },
            ],
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidRegimeBands));
    }

    #[test]
    fn capacity_must_cover_longest_lookback() {
        let mut config = StrategyConfig::default_rotation();
        config.store.capacity = 100; // longest horizon is 252
        assert!(matches!(
            config.validate(),
            Err(ConfigError::CapacityBelowHistory { .. })
        ));
    }

    #[test]
    fn min_history_is_longest_lookback_plus_one() {
        let config = StrategyConfig::default_rotation();
        assert_eq!(config.min_history(), 253);
    }

    #[test]
    fn subscribed_indicators_collects_gates_and_risk() {
        let config = StrategyConfig::default_rotation();
        let subs = config.subscribed_indicators();
        assert!(subs.contains(&"sma_200".to_string()));
        assert!(subs.contains(&"atr_14".to_string()));
    }

    #[test]
    fn fingerprint_is_deterministic_and_sensitive() {
        let a = StrategyConfig::default_rotation();
        let b = StrategyConfig::default_rotation();
        assert_eq!(a.fingerprint(), b.fingerprint());

        let mut c = StrategyConfig::default_rotation();
        c.selector.target_count = 6;
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn toml_roundtrip() {
        let config = StrategyConfig::default_rotation();
        let toml_str = config.to_toml().unwrap();
        let parsed = StrategyConfig::from_toml(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn invalid_toml_reports_parse_error() {
        let err = StrategyConfig::from_toml("not valid toml [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
