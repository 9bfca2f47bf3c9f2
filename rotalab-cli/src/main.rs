//! RotaLab CLI — drive the rotation engine tick by tick.
//!
//! Commands:
//! - `run` — execute the pipeline over a CSV bars file or a synthetic
//!   universe, printing plans and exit signals as JSON lines
//! - `init-config` — write the default strategy config as TOML

mod feed;
mod universe;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rotalab_core::config::StrategyConfig;
use rotalab_core::Engine;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rotalab", about = "RotaLab CLI — momentum rotation engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute the pipeline and print plans/exits as JSON lines.
    Run {
        /// Path to a TOML strategy config. Defaults to the built-in
        /// dual-momentum rotation preset.
        #[arg(long)]
        config: Option<PathBuf>,

        /// CSV bars file with date,symbol,group,price rows.
        #[arg(long)]
        bars: Option<PathBuf>,

        /// Benchmark symbol inside the bars file.
        #[arg(long, default_value = "SPY")]
        benchmark: String,

        /// Generate a synthetic feed instead of reading bars.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Universe TOML (group → symbols) for the synthetic feed.
        /// Defaults to a built-in four-sector demo universe.
        #[arg(long)]
        universe: Option<PathBuf>,

        /// Synthetic tick count.
        #[arg(long, default_value_t = 400)]
        ticks: usize,

        /// Synthetic RNG seed.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Rebalance every N ticks (risk checks run every tick).
        #[arg(long, default_value_t = 21)]
        rebalance_every: usize,

        /// Benchmark trend window for the regime flag.
        #[arg(long, default_value_t = 200)]
        trend_window: usize,
    },
    /// Write the default strategy config as TOML.
    InitConfig {
        /// Output path.
        #[arg(long, default_value = "strategy.toml")]
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            config,
            bars,
            benchmark,
            synthetic,
            universe,
            ticks,
            seed,
            rebalance_every,
            trend_window,
        } => run(
            config,
            bars,
            benchmark,
            synthetic,
            universe,
            ticks,
            seed,
            rebalance_every,
            trend_window,
        ),
        Commands::InitConfig { path } => init_config(path),
    }
}

#[allow(clippy::too_many_arguments)]
fn run(
    config_path: Option<PathBuf>,
    bars: Option<PathBuf>,
    benchmark: String,
    synthetic: bool,
    universe_path: Option<PathBuf>,
    ticks: usize,
    seed: u64,
    rebalance_every: usize,
    trend_window: usize,
) -> Result<()> {
    if rebalance_every == 0 {
        bail!("--rebalance-every must be >= 1");
    }

    let config = match &config_path {
        Some(path) => StrategyConfig::from_file(path)
            .with_context(|| format!("load config {}", path.display()))?,
        None => StrategyConfig::default_rotation(),
    };
    info!(
        strategy = %config.name,
        fingerprint = %config.fingerprint(),
        "configuration loaded"
    );

    let mut plumbing =
        feed::IndicatorPlumbing::new(config.subscribed_indicators(), trend_window);
    let feed_ticks = match (&bars, synthetic) {
        (Some(path), false) => feed::load_csv(path, &benchmark, &mut plumbing)?,
        (None, true) => {
            let universe = match &universe_path {
                Some(path) => universe::Universe::from_file(path)
                    .with_context(|| format!("load universe {}", path.display()))?,
                None => universe::Universe::default_demo(),
            };
            info!(symbols = universe.symbol_count(), "synthetic universe");
            feed::synthetic(&universe.members(), ticks, seed, &mut plumbing)
        }
        (Some(_), true) => bail!("--bars and --synthetic are mutually exclusive"),
        (None, false) => bail!("either --bars or --synthetic is required"),
    };
    info!(ticks = feed_ticks.len(), "feed ready");

    let mut engine = Engine::new(config).context("build engine")?;
    let stdout = std::io::stdout();

    for (index, tick) in feed_ticks.iter().enumerate() {
        if index % rebalance_every == 0 {
            let plan = engine.rebalance_tick(&tick.snapshots, &tick.market);
            if !plan.is_empty() {
                let line = json!({
                    "tick": index,
                    "date": tick.market.date,
                    "event": "rebalance",
                    "plan": plan,
                });
                serde_json::to_writer(stdout.lock(), &line)?;
                println!();
            }
        } else {
            let exits = engine.risk_tick(&tick.snapshots, &tick.market);
            for exit in exits {
                let line = json!({
                    "tick": index,
                    "date": tick.market.date,
                    "event": "exit",
                    "instrument": exit.instrument,
                    "reason": exit.reason,
                });
                serde_json::to_writer(stdout.lock(), &line)?;
                println!();
            }
        }
    }

    for (id, weight) in engine.holdings() {
        if let Some(inst) = engine.store().instrument(id) {
            info!(
                instrument = %id,
                group = %inst.group,
                weight,
                price = inst.latest_price,
                "final holding"
            );
        }
    }
    let gross: f64 = engine.holdings().values().sum();
    info!(
        holdings = engine.holdings().len(),
        gross,
        "run complete"
    );
    Ok(())
}

fn init_config(path: PathBuf) -> Result<()> {
    let config = StrategyConfig::default_rotation();
    let toml = config.to_toml().context("serialize default config")?;
    std::fs::write(&path, toml).with_context(|| format!("write {}", path.display()))?;
    info!(path = %path.display(), "default config written");
    Ok(())
}
