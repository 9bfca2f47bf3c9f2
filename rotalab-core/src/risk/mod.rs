//! Position risk monitor — a per-position state machine evaluating
//! stop-loss, trailing-stop, time-stop, signal-reversal, and
//! profit-target exits each period.
//!
//! States: none → Open → Closing → none. Exit conditions are checked in
//! fixed priority order and the first match wins. Two invariants hold
//! across ticks: the peak price never decreases, and the stop price
//! never moves down once set (stops tighten, never loosen — even when
//! volatility expands).
//!
//! A missing or invalid price is not an exit trigger: the position is
//! skipped for that tick. Time still advances on skipped ticks, so a
//! time stop that matures during a data gap fires on the next valid
//! price.

use crate::config::RiskConfig;
use crate::domain::{ExitReason, ExitSignal, InstrumentId, Position, PositionState};
use chrono::NaiveDate;
use tracing::debug;

/// Risk monitor driven by a declarative [`RiskConfig`].
#[derive(Debug, Clone)]
pub struct RiskMonitor {
    config: RiskConfig,
}

impl RiskMonitor {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    /// Open a position: peak seeds at entry, and the initial stop (when
    /// a volatility-based stop is configured and an ATR value was
    /// available at entry) sits `multiple × ATR` below the entry price.
    pub fn open_position(
        &self,
        id: InstrumentId,
        entry_price: f64,
        entry_date: NaiveDate,
        entry_atr: Option<f64>,
    ) -> Position {
        let mut position = Position::open(id, entry_price, entry_date, entry_atr);
        if let (Some(atr_stop), Some(atr)) = (&self.config.atr_stop, entry_atr) {
            if atr > 0.0 {
                position.ratchet_stop(entry_price - atr_stop.multiple * atr);
            }
        }
        position
    }

    /// Evaluate one open position for this tick.
    ///
    /// `price` is the current price if the instrument was observable this
    /// tick; `signal_passes` is the signal engine's latest verdict for
    /// the instrument, when one was computable. Returns the exit signal
    /// that fired, if any, leaving the position in `Closing` state.
    pub fn evaluate(
        &self,
        position: &mut Position,
        price: Option<f64>,
        signal_passes: Option<bool>,
    ) -> Option<ExitSignal> {
        if !position.is_open() {
            return None;
        }

        position.bars_held += 1;

        let price = price.filter(|p| p.is_finite() && *p > 0.0)?;

        position.observe_price(price);
        self.ratchet_trailing(position);

        let reason = self.first_exit(position, price, signal_passes)?;
        position.state = PositionState::Closing;
        debug!(instrument = %position.id, %reason, "exit condition fired");
        Some(ExitSignal {
            instrument: position.id.clone(),
            reason,
        })
    }

    /// Override the state machine: force-close for regime liquidation.
    pub fn force_close(&self, position: &mut Position) -> ExitSignal {
        position.state = PositionState::Closing;
        ExitSignal {
            instrument: position.id.clone(),
            reason: ExitReason::RegimeLiquidation,
        }
    }

    /// Trailing activates once the peak's unrealized return reaches the
    /// activation threshold; from then on the stop trails the peak and
    /// only ever ratchets upward.
    fn ratchet_trailing(&self, position: &mut Position) {
        let Some(trailing) = &self.config.trailing else {
            return;
        };
        let peak_return = position.unrealized_return(position.peak_price);
        if peak_return >= trailing.activation_pct {
            position.ratchet_stop(position.peak_price * (1.0 - trailing.trail_pct));
        }
    }

    /// Exit conditions in fixed priority order; first match wins.
    fn first_exit(
        &self,
        position: &Position,
        price: f64,
        signal_passes: Option<bool>,
    ) -> Option<ExitReason> {
        let unrealized = position.unrealized_return(price);

        if let Some(stop_loss_pct) = self.config.stop_loss_pct {
            if unrealized <= -stop_loss_pct {
                return Some(ExitReason::StopLoss);
            }
        }
        if let Some(stop) = position.stop_price {
            if price < stop {
                return Some(ExitReason::TrailingStop);
            }
        }
        if let Some(max_bars) = self.config.max_hold_bars {
            if position.bars_held >= max_bars {
                return Some(ExitReason::TimeStop);
            }
        }
        if self.config.exit_on_signal_loss && signal_passes == Some(false) {
            return Some(ExitReason::SignalReversal);
        }
        if let Some(target_pct) = self.config.profit_target_pct {
            if unrealized >= target_pct {
                return Some(ExitReason::ProfitTarget);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AtrStop, Trailing};

    fn entry_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
    }

    fn bare_config() -> RiskConfig {
        RiskConfig {
            stop_loss_pct: None,
            atr_stop: None,
            trailing: None,
            max_hold_bars: None,
            exit_on_signal_loss: false,
            profit_target_pct: None,
        }
    }

    fn full_config() -> RiskConfig {
        RiskConfig {
            stop_loss_pct: Some(0.15),
            atr_stop: Some(AtrStop {
                indicator: "atr_14".into(),
                multiple: 2.0,
            }),
            trailing: Some(Trailing {
                activation_pct: 0.05,
                trail_pct: 0.10,
            }),
            max_hold_bars: Some(100),
            exit_on_signal_loss: true,
            profit_target_pct: None,
        }
    }

    #[test]
    fn initial_stop_from_atr() {
        let monitor = RiskMonitor::new(full_config());
        let pos = monitor.open_position("AAPL".into(), 100.0, entry_date(), Some(5.0));
        assert_eq!(pos.stop_price, Some(90.0));
        assert_eq!(pos.peak_price, 100.0);
    }

    #[test]
    fn no_atr_means_no_initial_stop() {
        let monitor = RiskMonitor::new(full_config());
        let pos = monitor.open_position("AAPL".into(), 100.0, entry_date(), None);
        assert_eq!(pos.stop_price, None);
    }

    #[test]
    fn trailing_ratchets_then_fires() {
        // Entry 100, ATR 5, multiple 2 -> stop 90. Peak 120 activates
        // trailing (>= 5%), 10% trail -> stop max(90, 108) = 108.
        // Price 107 then breaches the ratcheted stop.
        let monitor = RiskMonitor::new(full_config());
        let mut pos = monitor.open_position("AAPL".into(), 100.0, entry_date(), Some(5.0));

        assert!(monitor.evaluate(&mut pos, Some(120.0), Some(true)).is_none());
        assert_eq!(pos.stop_price, Some(108.0));

        let exit = monitor.evaluate(&mut pos, Some(107.0), Some(true)).unwrap();
        assert_eq!(exit.reason, ExitReason::TrailingStop);
        assert_eq!(pos.state, PositionState::Closing);
    }

    #[test]
    fn stop_never_moves_down() {
        let monitor = RiskMonitor::new(full_config());
        let mut pos = monitor.open_position("AAPL".into(), 100.0, entry_date(), Some(5.0));
        monitor.evaluate(&mut pos, Some(120.0), Some(true));
        let high_water = pos.stop_price.unwrap();
        // Price retreats but stays above the stop; the stop must hold
        monitor.evaluate(&mut pos, Some(112.0), Some(true));
        assert_eq!(pos.stop_price, Some(high_water));
    }

    #[test]
    fn hard_stop_loss_takes_priority() {
        let monitor = RiskMonitor::new(full_config());
        let mut pos = monitor.open_position("AAPL".into(), 100.0, entry_date(), Some(5.0));
        // -16% breaches the 15% hard stop; the ATR stop at 90 would also
        // trigger, but the hard stop is checked first.
        let exit = monitor.evaluate(&mut pos, Some(84.0), Some(true)).unwrap();
        assert_eq!(exit.reason, ExitReason::StopLoss);
    }

    #[test]
    fn time_stop_fires_at_max_hold() {
        let config = RiskConfig {
            max_hold_bars: Some(3),
            ..bare_config()
        };
        let monitor = RiskMonitor::new(config);
        let mut pos = monitor.open_position("AAPL".into(), 100.0, entry_date(), None);
        assert!(monitor.evaluate(&mut pos, Some(100.0), None).is_none());
        assert!(monitor.evaluate(&mut pos, Some(100.0), None).is_none());
        let exit = monitor.evaluate(&mut pos, Some(100.0), None).unwrap();
        assert_eq!(exit.reason, ExitReason::TimeStop);
    }

    #[test]
    fn signal_reversal_exit() {
        let monitor = RiskMonitor::new(full_config());
        let mut pos = monitor.open_position("AAPL".into(), 100.0, entry_date(), Some(5.0));
        let exit = monitor.evaluate(&mut pos, Some(101.0), Some(false)).unwrap();
        assert_eq!(exit.reason, ExitReason::SignalReversal);
    }

    #[test]
    fn unknown_signal_state_is_not_a_reversal() {
        let monitor = RiskMonitor::new(full_config());
        let mut pos = monitor.open_position("AAPL".into(), 100.0, entry_date(), Some(5.0));
        assert!(monitor.evaluate(&mut pos, Some(101.0), None).is_none());
    }

    #[test]
    fn profit_target_exit() {
        let config = RiskConfig {
            profit_target_pct: Some(0.25),
            ..bare_config()
        };
        let monitor = RiskMonitor::new(config);
        let mut pos = monitor.open_position("AAPL".into(), 100.0, entry_date(), None);
        let exit = monitor.evaluate(&mut pos, Some(126.0), None).unwrap();
        assert_eq!(exit.reason, ExitReason::ProfitTarget);
    }

    #[test]
    fn missing_price_skips_but_time_advances() {
        let config = RiskConfig {
            max_hold_bars: Some(2),
            ..bare_config()
        };
        let monitor = RiskMonitor::new(config);
        let mut pos = monitor.open_position("AAPL".into(), 100.0, entry_date(), None);
        // Data gap: no exit, but the clock ticks
        assert!(monitor.evaluate(&mut pos, None, None).is_none());
        assert_eq!(pos.bars_held, 1);
        assert!(pos.is_open());
        // Matured time stop fires on the next valid price
        let exit = monitor.evaluate(&mut pos, Some(100.0), None).unwrap();
        assert_eq!(exit.reason, ExitReason::TimeStop);
    }

    #[test]
    fn nan_price_is_skipped() {
        let monitor = RiskMonitor::new(full_config());
        let mut pos = monitor.open_position("AAPL".into(), 100.0, entry_date(), Some(5.0));
        assert!(monitor.evaluate(&mut pos, Some(f64::NAN), Some(true)).is_none());
        assert!(pos.is_open());
    }

    #[test]
    fn closing_position_is_inert() {
        let monitor = RiskMonitor::new(full_config());
        let mut pos = monitor.open_position("AAPL".into(), 100.0, entry_date(), Some(5.0));
        let _ = monitor.force_close(&mut pos);
        assert_eq!(pos.state, PositionState::Closing);
        assert!(monitor.evaluate(&mut pos, Some(50.0), Some(false)).is_none());
    }

    #[test]
    fn force_close_reason_is_regime_liquidation() {
        let monitor = RiskMonitor::new(full_config());
        let mut pos = monitor.open_position("AAPL".into(), 100.0, entry_date(), None);
        let exit = monitor.force_close(&mut pos);
        assert_eq!(exit.reason, ExitReason::RegimeLiquidation);
    }
}
