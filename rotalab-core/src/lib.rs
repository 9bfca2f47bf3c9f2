//! RotaLab Core — signal ranking, constrained allocation, rebalance
//! planning, and position risk management.
//!
//! This crate contains the heart of the rotation engine:
//! - Domain types (instruments, snapshots, positions, plans, exits)
//! - Instrument state store with bounded rolling history and readiness
//! - Momentum signal engine with fail-closed gates
//! - Regime gate (binary and graded volatility banding)
//! - Group-capped greedy selector
//! - Weight allocator with cap/redistribute fixed point
//! - Hysteresis-banded rebalance planner
//! - Position risk state machine with ratcheting stops
//!
//! Everything is single-threaded and tick-driven; market data retrieval,
//! indicator computation, and order execution are external collaborators
//! consumed through the plain data contracts in [`domain`].

pub mod allocator;
pub mod config;
pub mod domain;
pub mod error;
pub mod pipeline;
pub mod rebalance;
pub mod regime;
pub mod risk;
pub mod selector;
pub mod signal;
pub mod store;

pub use pipeline::Engine;
