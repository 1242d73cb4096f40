use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing_subscriber::filter::LevelFilter;

use gc_rescan::config::{DEFAULT_MAX_TRIALS, DEFAULT_NUM_SLOTS, DEFAULT_NUM_THREADS};
use gc_rescan::{
    explore, BarrierPolicy, ConfigError, ExplorationReport, ExploreConfig, ScanRestart, Strategy,
    TransitiveMark, TrialConfig, Unbarriered,
};

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PolicyArg {
    /// Mark the published object transitively under the shared stw lock
    TransitiveMark,
    /// Restart stack rescans when an unmarked object is published
    ScanRestart,
    /// No write barrier
    Unbarriered,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum StrategyArg {
    /// Seeded random trials
    Random,
    /// Exhaustive depth-first enumeration
    Dfs,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Write barrier to check
    #[arg(long, value_enum, default_value = "transitive-mark")]
    policy: PolicyArg,

    /// How to walk the choice space
    #[arg(long, value_enum, default_value = "random")]
    strategy: StrategyArg,

    /// Mutator threads
    #[arg(long, default_value_t = DEFAULT_NUM_THREADS)]
    threads: usize,

    /// Memory slots, null and stacks included
    #[arg(long, default_value_t = DEFAULT_NUM_SLOTS)]
    slots: usize,

    /// Give up rescanning after this many stack rescans
    #[arg(long)]
    max_rescans: Option<usize>,

    /// Trial bound; depth-first search runs to exhaustion without one
    #[arg(long)]
    trials: Option<u64>,

    /// Seed for random trials
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Worker threads for random trials
    #[arg(short, long, default_value_t = 1)]
    jobs: usize,

    /// Keep exploring after the first fault
    #[arg(long)]
    keep_going: bool,

    /// Log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn trial_config(&self) -> TrialConfig {
        TrialConfig {
            num_threads: self.threads,
            num_slots: self.slots,
            max_rescans: self.max_rescans,
        }
    }

    fn explore_config(&self) -> ExploreConfig {
        let strategy = match self.strategy {
            StrategyArg::Random => Strategy::Random,
            StrategyArg::Dfs => Strategy::DepthFirst,
        };
        let max_trials = match (strategy, self.trials) {
            (_, Some(trials)) => Some(trials),
            (Strategy::Random, None) => Some(DEFAULT_MAX_TRIALS),
            (Strategy::DepthFirst, None) => None,
        };
        ExploreConfig {
            strategy,
            max_trials,
            seed: self.seed,
            jobs: self.jobs,
            stop_on_fault: !self.keep_going,
        }
    }
}

fn run<P: BarrierPolicy>(cli: &Cli) -> Result<ExplorationReport, ConfigError> {
    explore::<P>(&cli.trial_config(), &cli.explore_config())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.policy {
        PolicyArg::TransitiveMark => run::<TransitiveMark>(&cli),
        PolicyArg::ScanRestart => run::<ScanRestart>(&cli),
        PolicyArg::Unbarriered => run::<Unbarriered>(&cli),
    };
    let report = match result {
        Ok(report) => report,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::from(2);
        }
    };

    println!("{report}");
    if let Some(record) = report.faults.first() {
        println!("first fault (trial {}):", record.trial_id.0);
        println!("{record}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
