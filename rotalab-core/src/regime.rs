//! Regime gate — global exposure multiplier in [0, 1].
//!
//! Binary mode follows the benchmark trend flag alone. Graded mode bands
//! a volatility proxy into stepped exposure levels; the trend flag still
//! dominates, so a broken trend means zero exposure regardless of the
//! proxy. A multiplier of 0 short-circuits the whole rebalance pipeline
//! to "liquidate everything."

use crate::config::RegimeConfig;
use crate::domain::MarketSnapshot;

/// Exposure gate derived from benchmark trend and volatility state.
#[derive(Debug, Clone)]
pub struct RegimeGate {
    config: RegimeConfig,
}

impl RegimeGate {
    pub fn new(config: RegimeConfig) -> Self {
        Self { config }
    }

    /// Exposure multiplier for this tick.
    ///
    /// Graded mode fails closed: a configured volatility banding with no
    /// proxy value in the snapshot yields 0.0 — the safe default is full
    /// liquidation, never an unscaled portfolio.
    pub fn exposure(&self, market: &MarketSnapshot) -> f64 {
        if !market.benchmark_trend_ok {
            return 0.0;
        }
        match &self.config {
            RegimeConfig::Binary => 1.0,
            RegimeConfig::Graded { bands } => {
                let Some(proxy) = market.volatility_proxy.filter(|p| p.is_finite()) else {
                    return 0.0;
                };
                for band in bands {
                    if proxy <= band.upper {
                        return band.exposure;
                    }
                }
                // Beyond the last band edge: extreme volatility
                0.0
            }
        }
    }

    /// Whether this tick calls for full liquidation.
    pub fn is_bearish(&self, market: &MarketSnapshot) -> bool {
        self.exposure(market) == 0.0
    }
}
