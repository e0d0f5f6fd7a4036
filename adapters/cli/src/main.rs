#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that drives the adaptive arena headlessly.

mod pilot;
mod rooms;
mod session;

use std::{fs, path::PathBuf};

use adaptive_arena_config::{AdaptationConfig, BestPerformerStore, RuleOverrides, StrategyKind};
use adaptive_arena_system_fitness::FitnessFunction;
use adaptive_arena_system_rule_evaluator::RuleEvaluator;
use adaptive_arena_system_simulation::SimulationEngine;
use adaptive_arena_system_snapshot::{transfer, SnapshotService};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use session::{EncounterReport, Session};

#[derive(Parser)]
#[command(name = "adaptive-arena", about = "Headless adaptive combat arena")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a run of encounters, adapting the enemy between them
    Run {
        #[arg(long, default_value = "6")]
        encounters: u32,
        #[arg(long, default_value = "12345")]
        seed: u32,
        /// TOML adaptation config; defaults apply when absent or invalid
        #[arg(long)]
        config: Option<PathBuf>,
        /// JSON rule overrides keyed by archetype
        #[arg(long)]
        rules: Option<PathBuf>,
        /// JSON file receiving the best performer of each encounter
        #[arg(long)]
        store: Option<PathBuf>,
        /// Overrides the configured candidate strategy
        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,
        /// Writes the final encounter's replay package to this file
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Replay an exported package under the parameters it captured
    Replay {
        /// File holding an `arena:v1:` replay package
        package: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StrategyArg {
    Banded,
    Evolution,
}

impl From<StrategyArg> for StrategyKind {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::Banded => Self::Banded,
            StrategyArg::Evolution => Self::Evolution,
        }
    }
}

/// Entry point for the adaptive arena command-line interface.
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Commands::Run {
            encounters,
            seed,
            config,
            rules,
            store,
            strategy,
            export,
        } => {
            let mut config = AdaptationConfig::load_or_default(config.as_deref());
            if let Some(strategy) = strategy {
                config.strategy = strategy.into();
            }
            let overrides = RuleOverrides::load(
                rules.as_deref(),
                config.max_rules_per_archetype,
                config.weight_bounds(),
            );
            let store = store.map(BestPerformerStore::new);
            let mut session = Session::new(config, overrides, store, seed)
                .context("failed to start the evaluation pool")?;

            for report in session.play(encounters) {
                print_report(&report);
            }

            if let Some(path) = export {
                let snapshot = session
                    .last_snapshot()
                    .context("no encounter was played, nothing to export")?;
                let package = transfer::encode(snapshot).context("failed to encode snapshot")?;
                let digest = transfer::digest(snapshot).context("failed to digest snapshot")?;
                fs::write(&path, package)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("exported replay package {} ({digest})", path.display());
            }
        }
        Commands::Replay { package, config } => {
            let config = AdaptationConfig::load_or_default(config.as_deref());
            let contents = fs::read_to_string(&package)
                .with_context(|| format!("failed to read {}", package.display()))?;
            let snapshot = transfer::decode(&contents).context("invalid replay package")?;
            let digest = transfer::digest(&snapshot).context("failed to digest snapshot")?;

            let engine = SimulationEngine::new(
                RuleEvaluator::new(config.telegraph),
                config.weight_bounds(),
            );
            let mut parameters = snapshot.enemy().parameters.clone();
            parameters.clamp_weights(config.weight_bounds());
            let mut state = SnapshotService::restore(&snapshot, parameters);
            let log = engine.replay(&mut state);
            let fitness = FitnessFunction::new(config.fitness_weights).score(&log);

            println!("snapshot {digest} seed {} steps {}", snapshot.seed(), snapshot.steps());
            println!(
                "dps {:.3} control {:.3} jitter {:.3} economy {:.3} unfair {:.3}",
                log.dps, log.control_time, log.jitter, log.economy, log.unfair_flags
            );
            println!("fitness {fitness:.6}");
        }
    }
    Ok(())
}

fn print_report(report: &EncounterReport) {
    let best = report
        .best_fitness
        .map_or_else(|| "n/a".to_owned(), |fitness| format!("{fitness:.3}"));
    println!(
        "room {:>2} {:<6} {:?} after {} ticks, {} cycles, best {best}",
        report.room,
        report.archetype.name(),
        report.end,
        report.ticks,
        report.cycles,
    );
    for change in &report.summary.changes {
        println!(
            "  {:<12} {:.3} -> {:.3} ({:+.3})",
            change.rule_name, change.before, change.after, change.weight_delta
        );
    }
}
