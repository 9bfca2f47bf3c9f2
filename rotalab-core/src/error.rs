//! Per-tick evaluation errors.
//!
//! Everything here is recoverable locally: an instrument that cannot be
//! evaluated is skipped or excluded from ranking for the current tick.
//! Nothing in this module is ever fatal — fatal misconfiguration is
//! caught at startup by [`crate::config::ConfigError`].

use crate::domain::InstrumentId;
use thiserror::Error;

/// Recoverable per-tick evaluation failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// The rolling window does not hold enough points yet (warm-up).
    #[error("insufficient history: need {needed} points, have {have}")]
    InsufficientHistory { needed: usize, have: usize },

    /// A return or weight denominator was zero or negative.
    #[error("division guard: non-positive denominator {denominator}")]
    DivisionGuard { denominator: f64 },

    /// The instrument is not tracked by the state store.
    #[error("unknown instrument {0}")]
    UnknownInstrument(InstrumentId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let e = EvalError::InsufficientHistory { needed: 21, have: 5 };
        assert_eq!(
            e.to_string(),
            "insufficient history: need 21 points, have 5"
        );

        let e = EvalError::DivisionGuard { denominator: 0.0 };
        assert!(e.to_string().contains("non-positive denominator"));
    }
}
