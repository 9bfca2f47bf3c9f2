//! Domain types for RotaLab.

pub mod instrument;
pub mod plan;
pub mod position;
pub mod snapshot;

pub use instrument::{GroupTag, Instrument, InstrumentId};
pub use plan::{ExitReason, ExitSignal, RebalancePlan};
pub use position::{Position, PositionState};
pub use snapshot::{InstrumentSnapshot, MarketSnapshot};
