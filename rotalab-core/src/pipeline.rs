//! Tick pipeline — wires the store, signal engine, regime gate,
//! selector, allocator, rebalancer, and risk monitor into two
//! cooperative schedules.
//!
//! Single-threaded and tick-driven: `rebalance_tick` runs on the
//! low-frequency schedule, `risk_tick` on the higher-frequency one.
//! Both ingest the same per-tick snapshots first, so every component
//! reads one consistent view — never a mix of stale and fresh values.
//!
//! The engine keeps its own holdings/position bookkeeping under the
//! assumption that emitted plans fill as stated; fill simulation and
//! execution reports live in the external execution layer.
//!
//! Cancellation: a fully bearish regime gate short-circuits the
//! rebalance tick to a liquidate-everything plan, and overrides the risk
//! tick to force-close every open position.

use crate::allocator;
use crate::config::{ConfigError, StrategyConfig};
use crate::domain::{
    ExitSignal, InstrumentId, InstrumentSnapshot, MarketSnapshot, Position, RebalancePlan,
};
use crate::rebalance;
use crate::regime::RegimeGate;
use crate::risk::RiskMonitor;
use crate::selector;
use crate::signal::SignalEngine;
use crate::store::{InstrumentStateStore, RollingSeries};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// The rotation engine: one strategy configuration, one universe, one
/// set of holdings.
#[derive(Debug, Clone)]
pub struct Engine {
    config: StrategyConfig,
    store: InstrumentStateStore,
    benchmark: RollingSeries,
    signal_engine: SignalEngine,
    regime: RegimeGate,
    monitor: RiskMonitor,
    holdings: BTreeMap<InstrumentId, f64>,
    positions: BTreeMap<InstrumentId, Position>,
}

impl Engine {
    /// Build an engine from a validated configuration. Misconfiguration
    /// fails here, never per-tick.
    pub fn new(config: StrategyConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let store = InstrumentStateStore::new(
            config.store.capacity,
            config.min_history(),
            config.subscribed_indicators(),
        );
        let benchmark = RollingSeries::new(config.store.capacity);
        let signal_engine = SignalEngine::new(config.signal.clone());
        let regime = RegimeGate::new(config.regime.clone());
        let monitor = RiskMonitor::new(config.risk.clone());
        Ok(Self {
            config,
            store,
            benchmark,
            signal_engine,
            regime,
            monitor,
            holdings: BTreeMap::new(),
            positions: BTreeMap::new(),
        })
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Current holdings as instrument → weight.
    pub fn holdings(&self) -> &BTreeMap<InstrumentId, f64> {
        &self.holdings
    }

    pub fn position(&self, id: &InstrumentId) -> Option<&Position> {
        self.positions.get(id)
    }

    pub fn open_position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn store(&self) -> &InstrumentStateStore {
        &self.store
    }

    /// Low-frequency schedule: rank, select, allocate, and plan.
    pub fn rebalance_tick(
        &mut self,
        snapshots: &[InstrumentSnapshot],
        market: &MarketSnapshot,
    ) -> RebalancePlan {
        self.ingest(snapshots, market);
        self.sync_universe(snapshots);

        let exposure = self.regime.exposure(market);
        if exposure == 0.0 {
            warn!(date = %market.date, "regime fully bearish, liquidating");
            return self.liquidate();
        }

        // Snapshot order is the stable tie-break order
        let signals: Vec<_> = snapshots
            .iter()
            .map(|s| self.signal_engine.evaluate(&self.store, &s.id, &self.benchmark))
            .collect();
        let passing = signals.iter().filter(|s| s.passes).count();
        debug!(date = %market.date, candidates = signals.len(), passing, "signals scored");

        let groups = self.store.groups();
        let selection = selector::select(&signals, &groups, &self.config.selector);
        if selection.is_empty() {
            // Constraint infeasible: go to cash rather than under-fill
            info!(date = %market.date, passing, "selection infeasible, going to cash");
            return self.liquidate();
        }

        let targets = allocator::allocate(&selection, &self.store, &self.config.allocator, exposure);
        let mut plan = rebalance::plan(&self.holdings, &targets, self.config.rebalancer.threshold);
        // A holding whose instrument left the screened universe is not
        // an in-universe deselection: it stays open until its own exit
        // condition fires, never closed implicitly by the diff.
        let universe: BTreeSet<&InstrumentId> = snapshots.iter().map(|s| &s.id).collect();
        plan.closes.retain(|id| universe.contains(id));
        info!(
            date = %market.date,
            selected = selection.len(),
            closes = plan.closes.len(),
            adjusts = plan.set_weights.len(),
            gross = targets.total(),
            "rebalance plan"
        );

        self.apply_plan(&plan, snapshots, market);
        plan
    }

    /// Higher-frequency schedule: evaluate every open position's exit
    /// conditions against this tick's snapshot.
    pub fn risk_tick(
        &mut self,
        snapshots: &[InstrumentSnapshot],
        market: &MarketSnapshot,
    ) -> Vec<ExitSignal> {
        self.ingest(snapshots, market);

        if self.regime.is_bearish(market) {
            let monitor = &self.monitor;
            let exits: Vec<_> = self
                .positions
                .values_mut()
                .map(|pos| monitor.force_close(pos))
                .collect();
            if !exits.is_empty() {
                warn!(date = %market.date, count = exits.len(), "regime override, force-closing all");
            }
            self.positions.clear();
            self.holdings.clear();
            return exits;
        }

        let prices: BTreeMap<&InstrumentId, f64> = snapshots
            .iter()
            .filter(|s| s.has_valid_price())
            .map(|s| (&s.id, s.price))
            .collect();

        let mut exits = Vec::new();
        let check_signal = self.config.risk.exit_on_signal_loss;
        let Self {
            positions,
            monitor,
            signal_engine,
            store,
            benchmark,
            ..
        } = self;
        for (id, position) in positions.iter_mut() {
            let price = prices.get(id).copied();
            let signal_passes = if check_signal && store.is_ready(id) {
                Some(signal_engine.evaluate(store, id, benchmark).passes)
            } else {
                None
            };
            if let Some(exit) = monitor.evaluate(position, price, signal_passes) {
                exits.push(exit);
            }
        }

        for exit in &exits {
            self.positions.remove(&exit.instrument);
            self.holdings.remove(&exit.instrument);
        }
        exits
    }

    /// Push this tick's observations into the store and benchmark
    /// history. One write per tick; every later read sees this snapshot.
    fn ingest(&mut self, snapshots: &[InstrumentSnapshot], market: &MarketSnapshot) {
        for snapshot in snapshots {
            self.store.append(snapshot);
        }
        self.benchmark.push(market.benchmark_price);
    }

    /// Retire instruments that left the screened universe — but never
    /// while an open position still references them. A held instrument
    /// stays tracked until its own exit condition fires.
    fn sync_universe(&mut self, snapshots: &[InstrumentSnapshot]) {
        let current: BTreeSet<&InstrumentId> = snapshots.iter().map(|s| &s.id).collect();
        let tracked = self.store.ids();
        for id in tracked {
            if !current.contains(&id) && !self.positions.contains_key(&id) {
                debug!(instrument = %id, "retiring instrument after universe exit");
                self.store.retire(&id);
            }
        }
    }

    /// Liquidate everything: close every holding, force-close every
    /// position, and return the pure-close plan.
    fn liquidate(&mut self) -> RebalancePlan {
        let plan = rebalance::liquidate_all(&self.holdings);
        let monitor = &self.monitor;
        for position in self.positions.values_mut() {
            let _ = monitor.force_close(position);
        }
        self.positions.clear();
        self.holdings.clear();
        plan
    }

    /// Book the emitted plan against internal state: closes drop
    /// positions, set-weights open or resize them.
    fn apply_plan(
        &mut self,
        plan: &RebalancePlan,
        snapshots: &[InstrumentSnapshot],
        market: &MarketSnapshot,
    ) {
        for id in &plan.closes {
            self.positions.remove(id);
            self.holdings.remove(id);
        }

        let prices: BTreeMap<&InstrumentId, f64> = snapshots
            .iter()
            .filter(|s| s.has_valid_price())
            .map(|s| (&s.id, s.price))
            .collect();

        for (id, weight) in &plan.set_weights {
            self.holdings.insert(id.clone(), *weight);
            if self.positions.contains_key(id) {
                continue;
            }
            let Some(entry_price) = prices.get(id).copied() else {
                // A selected instrument always had a valid price this
                // tick; treat a gap defensively as "do not track".
                warn!(instrument = %id, "no entry price for planned open, skipping position");
                self.holdings.remove(id);
                continue;
            };
            let entry_atr = self
                .config
                .risk
                .atr_stop
                .as_ref()
                .and_then(|atr| self.store.indicator(id, &atr.indicator));
            let position =
                self.monitor
                    .open_position(id.clone(), entry_price, market.date, entry_atr);
            self.positions.insert(id.clone(), position);
        }
    }
}
