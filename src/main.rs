// CLUSTERBENCH v1.0.0 -- MULTI-TRIAL BENCHMARK HARNESS
// DRIVES EXTERNAL CLUSTERING BACKENDS OVER DATASETS OR A PARAMETER SWEEP
//
// EVERYTHING IS SEQUENTIAL: ONE PROCESS AT A TIME, RUN TO COMPLETION.
// CONCURRENT RUNS WOULD PERTURB THE VERY TIMINGS BEING COLLECTED.

mod cli;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use clusterbench::config::{FileConfig, HarnessConfig, Overrides};
use clusterbench::metrics::TimeUnit;
use clusterbench::sink::Rounding;
use clusterbench::sweep::Mode;

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

#[derive(Parser)]
#[command(name = "clusterbench")]
#[command(about = "CLUSTERBENCH -- MULTI-TRIAL BENCHMARK HARNESS FOR CLUSTERING BACKENDS")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    // RUN EVERY DATASET THROUGH ONE BACKEND, WRITE ONE ROW PER DATASET
    Compare(SweepArgs),
    // SWEEP ONE PARAMETER OVER A FIXED DATASET, WRITE TABLE + CHART
    Scale(SweepArgs),
    // VERIFY EXECUTABLE, DATASET ROOT AND DATASETS WITHOUT RUNNING TRIALS
    Check {
        // CHECK THE SCALE CONFIGURATION INSTEAD OF COMPARE
        #[arg(long)]
        scale: bool,
        #[command(flatten)]
        sweep: SweepArgs,
    },
}

#[derive(Args)]
struct SweepArgs {
    // TOML CONFIG FILE. COMMAND-LINE FLAGS OVERRIDE IT.
    #[arg(long)]
    config: Option<PathBuf>,

    // BACKEND EXECUTABLE (PATH OR NAME ON $PATH)
    #[arg(long)]
    exe: Option<PathBuf>,

    // BACKEND NAME FOR REPORTS (DEFAULT: EXECUTABLE FILE NAME)
    #[arg(long)]
    name: Option<String>,

    // ONE POSITIONAL BACKEND ARGUMENT, REPEATABLE. {dataset} AND {param} ARE SUBSTITUTED.
    #[arg(long = "arg", allow_hyphen_values = true)]
    args: Vec<String>,

    // REPORT UNIT: ms OR s
    #[arg(long)]
    unit: Option<TimeUnit>,

    // CSV ROUNDING: exact OR nearest
    #[arg(long)]
    round: Option<Rounding>,

    // PER-TRIAL TIMEOUT IN SECONDS
    #[arg(long)]
    timeout: Option<u64>,

    // TRIALS PER SWEEP POINT
    #[arg(long)]
    trials: Option<u32>,

    // DIRECTORY DATASET REFERENCES ARE RELATIVE TO
    #[arg(long)]
    root: Option<PathBuf>,

    // CSV OUTPUT PATH
    #[arg(long, short)]
    output: Option<PathBuf>,

    // EMIT THE ITERATION COLUMNS
    #[arg(long, conflicts_with = "no_iterations")]
    iterations: bool,

    // DROP THE ITERATION COLUMNS
    #[arg(long)]
    no_iterations: bool,

    // DATASETS (COMPARE MODE)
    datasets: Vec<String>,

    // FIXED DATASET (SCALE MODE)
    #[arg(long)]
    dataset: Option<String>,

    // PARAMETER VALUES, COMMA-SEPARATED, IN SWEEP ORDER (SCALE MODE)
    #[arg(long, value_delimiter = ',')]
    params: Vec<u64>,

    // PARAMETER NAME FOR THE CSV COLUMN AND CHART AXIS
    #[arg(long)]
    param_label: Option<String>,

    // CHART OUTPUT PATH (SCALE MODE)
    #[arg(long)]
    chart: Option<PathBuf>,

    // SKIP THE CHART
    #[arg(long)]
    no_chart: bool,

    // PRINT EVERY TRIAL
    #[arg(long)]
    verbose: bool,

    // DUMP THE FULL TRIAL LOG ON EXIT
    #[arg(long)]
    dump_log: bool,
}

impl SweepArgs {
    fn resolve(self, mode: Mode) -> Result<(HarnessConfig, bool, bool)> {
        let file = match &self.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        let iterations = if self.iterations {
            Some(true)
        } else if self.no_iterations {
            Some(false)
        } else {
            None
        };
        let overrides = Overrides {
            executable: self.exe,
            name: self.name,
            args: non_empty(self.args),
            unit: self.unit,
            rounding: self.round,
            timeout_secs: self.timeout,
            iterations,
            trials: self.trials,
            dataset_root: self.root,
            datasets: non_empty(self.datasets),
            dataset: self.dataset,
            params: non_empty(self.params),
            param_label: self.param_label,
            output: self.output,
            chart: self.chart,
            no_chart: self.no_chart,
        };
        let cfg = HarnessConfig::resolve(mode, file, overrides)?;
        Ok((cfg, self.verbose, self.dump_log))
    }
}

fn non_empty<T>(v: Vec<T>) -> Option<Vec<T>> {
    (!v.is_empty()).then_some(v)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Check { scale, sweep } => {
            let mode = if scale { Mode::Scale } else { Mode::Compare };
            let (cfg, _, _) = sweep.resolve(mode)?;
            cli::check::run_check(&cfg)
        }
        Command::Compare(sweep) => run(sweep, Mode::Compare),
        Command::Scale(sweep) => run(sweep, Mode::Scale),
    }
}

fn run(sweep: SweepArgs, mode: Mode) -> Result<()> {
    let (cfg, verbose, dump_log) = sweep.resolve(mode)?;

    ctrlc::set_handler(move || {
        SHUTDOWN.store(true, Ordering::Relaxed);
    })?;

    cli::bench::run_bench(&cfg, verbose, dump_log, &SHUTDOWN)
}
