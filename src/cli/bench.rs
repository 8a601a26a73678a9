// SWEEP DRIVER: BANNER, PRE-FLIGHT, SWEEP, REPORT, PERSIST.
// RESULT FILES ARE WRITTEN ONLY AFTER THE WHOLE SWEEP COMPLETES.

use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};

use clusterbench::aggregate::Aggregator;
use clusterbench::chart::{write_chart, ChartSpec};
use clusterbench::config::{humanize, HarnessConfig};
use clusterbench::error::HarnessError;
use clusterbench::runner::TrialRunner;
use clusterbench::sink::{render_report, write_csv};
use clusterbench::sweep::{comparison_plan, scalability_plan, Mode, SweepController};

pub fn run_bench(cfg: &HarnessConfig, verbose: bool, dump_log: bool, shutdown: &AtomicBool) -> Result<()> {
    let sep = "=".repeat(60);
    let mode = match cfg.mode {
        Mode::Compare => "COMPARE",
        Mode::Scale => "SCALE",
    };

    println!("{}", sep);
    println!("CLUSTERBENCH {} -- {}", mode, cfg.backend.name.to_uppercase());
    println!("{}", sep);

    // PRE-FLIGHT: ANY FAILURE HERE ABORTS BEFORE THE FIRST TRIAL
    let exe = cfg.validate_environment()?;
    println!("EXECUTABLE:      {}", exe.display());
    println!("ARGS:            {}", cfg.backend.args.join(" "));
    println!("DATASET ROOT:    {}", cfg.dataset_root.display());
    println!("TRIALS/POINT:    {}", cfg.trials);
    println!("TIMEOUT:         {}s", cfg.backend.timeout.as_secs());
    println!("UNIT:            {} ({:?} rounding)", cfg.backend.unit, cfg.rounding);

    let plan = match cfg.mode {
        Mode::Compare => comparison_plan(&cfg.dataset_root, &cfg.datasets),
        Mode::Scale => {
            let plan = scalability_plan(&cfg.dataset_root, &cfg.datasets[0], &cfg.params)?;
            println!("PARAMS:          {:?} ({})", cfg.params, cfg.param_label);
            plan
        }
    };
    for skipped in &plan.skipped {
        println!("SKIPPED:         {} (no points/dimensions/clusters in name or header)", skipped);
    }
    println!("POINTS:          {}", plan.points.len());
    println!();

    let mut runner = TrialRunner::new(cfg.backend.clone())?;
    let aggregator = Aggregator::new(cfg.trials)?;
    let mut controller = SweepController::new(aggregator, &mut runner, verbose);

    let results = match controller.run(&plan.points, shutdown) {
        Ok(r) => r,
        Err(HarnessError::Interrupted) => {
            controller.log.summary();
            println!("\nINTERRUPTED -- NO RESULTS WRITTEN");
            return Err(HarnessError::Interrupted.into());
        }
        Err(e) if e.is_configuration() => {
            controller.log.summary();
            println!("\nCONFIGURATION ERROR -- SWEEP ABORTED, NO RESULTS WRITTEN");
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    if dump_log {
        controller.log.dump();
    }
    controller.log.summary();

    let format = cfg.table_format();
    println!();
    print!("{}", render_report(&cfg.title, &results, &format));

    write_csv(&cfg.output, &results, &format)
        .with_context(|| format!("writing {}", cfg.output.display()))?;
    println!("\nRESULTS SAVED TO {}", cfg.output.display());

    if let Some(chart) = &cfg.chart {
        let spec = ChartSpec {
            title: cfg.title.clone(),
            x_label: humanize(&cfg.param_label),
            unit: cfg.backend.unit,
        };
        write_chart(chart, &results, &spec)
            .with_context(|| format!("writing {}", chart.display()))?;
        println!("CHART SAVED TO {}", chart.display());
    }

    Ok(())
}
