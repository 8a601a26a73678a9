// CLUSTERBENCH PIPELINE TESTS
// SWEEP -> AGGREGATE -> SINK WITH A SCRIPTED TRIAL SOURCE.
//
// ALL TESTS USE THE PURE LIBRARY API. NO EXTERNAL PROCESSES. RUN OFFLINE.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use clusterbench::aggregate::Aggregator;
use clusterbench::chart::{render_html, ChartSpec};
use clusterbench::error::{HarnessError, Result};
use clusterbench::metrics::TimeUnit;
use clusterbench::runner::{TrialReport, TrialSource};
use clusterbench::sink::{render_csv, write_csv, Rounding, TableFormat};
use clusterbench::sweep::{comparison_plan, scalability_plan, SweepController, SweepPoint};

// REPLAYS A FIXED STDOUT SCRIPT PER DATASET (OR PER PARAM), CYCLING
struct Replay {
    unit: TimeUnit,
    scripts: HashMap<String, Vec<&'static str>>,
    cursor: HashMap<String, usize>,
}

impl Replay {
    fn new(unit: TimeUnit) -> Self {
        Self { unit, scripts: HashMap::new(), cursor: HashMap::new() }
    }

    fn on(mut self, key: &str, outputs: Vec<&'static str>) -> Self {
        self.scripts.insert(key.to_string(), outputs);
        self
    }

    fn key(point: &SweepPoint) -> String {
        match point.param {
            Some(p) => p.to_string(),
            None => point.dataset.file_name.clone(),
        }
    }
}

impl TrialSource for Replay {
    fn unit(&self) -> TimeUnit {
        self.unit
    }

    fn run_trial(&mut self, point: &SweepPoint, _shutdown: &AtomicBool) -> Result<TrialReport> {
        let key = Self::key(point);
        let outputs = self.scripts.get(&key).cloned().unwrap_or_default();
        let i = self.cursor.entry(key).or_insert(0);
        let out = if outputs.is_empty() { "" } else { outputs[*i % outputs.len()] };
        *i += 1;
        Ok(TrialReport::from_output(out, "", Some(0), Duration::from_millis(1)))
    }
}

// FAILS LIKE A MISSING EXECUTABLE ON THE FIRST TRIAL
struct Missing;

impl TrialSource for Missing {
    fn unit(&self) -> TimeUnit {
        TimeUnit::Millis
    }

    fn run_trial(&mut self, _point: &SweepPoint, _shutdown: &AtomicBool) -> Result<TrialReport> {
        Err(HarnessError::ExecutableNotFound("./cuda".into()))
    }
}

fn refs(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn compare_format() -> TableFormat {
    TableFormat {
        unit: TimeUnit::Millis,
        rounding: Rounding::Exact,
        param_column: None,
        iterations: true,
    }
}

// === COMPARISON MODE ===

#[test]
fn comparison_end_to_end() {
    let plan = comparison_plan(
        Path::new("/data"),
        &refs(&["dataset_2000_3_5.txt", "notadataset.txt", "dataset_5000_50_10.txt"]),
    );
    assert_eq!(plan.skipped, vec!["notadataset.txt".to_string()]);

    let mut src = Replay::new(TimeUnit::Millis)
        .on("dataset_2000_3_5.txt", vec![
            "Converged at iteration 5\nTotal execution time: 10.0 ms",
            "Converged at iteration 7\nTotal execution time: 20.0 ms",
            "Converged at iteration 6\nTotal execution time: 30.0 ms",
        ])
        .on("dataset_5000_50_10.txt", vec!["Total execution time: 4.0 ms"]);

    let mut ctl = SweepController::new(Aggregator::new(3).unwrap(), &mut src, false);
    let rows = ctl.run(&plan.points, &AtomicBool::new(false)).unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].avg_time, Some(20.0));
    assert_eq!(rows[0].avg_iterations, Some(6.0));
    assert_eq!(rows[1].avg_time, Some(4.0));
    assert_eq!(rows[1].avg_iterations, None);

    let csv = String::from_utf8(render_csv(&rows, &compare_format()).unwrap()).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "file_name,num_points,dimensions,num_clusters,avg_time_ms,avg_iterations,time_trials,iter_trials,trials,timeouts");
    assert_eq!(lines[1], "dataset_2000_3_5.txt,2000,3,5,20,6,3,3,3,0");
    assert_eq!(lines[2], "dataset_5000_50_10.txt,5000,50,10,4,,3,0,3,0");
}

#[test]
fn five_datasets_keep_their_order() {
    let names = [
        "dataset_20000_80_15.txt",
        "dataset_2000_3_5.txt",
        "dataset_50000_5_15.txt",
        "dataset_10000_20_10.txt",
        "dataset_5000_50_10.txt",
    ];
    let plan = comparison_plan(Path::new("/data"), &refs(&names));
    let mut src = Replay::new(TimeUnit::Millis);
    for n in names {
        src = src.on(n, vec!["Total execution time: 1 ms"]);
    }
    let rows = SweepController::new(Aggregator::new(1).unwrap(), &mut src, false)
        .run(&plan.points, &AtomicBool::new(false))
        .unwrap();
    let got: Vec<&str> = rows.iter().map(|r| r.point.dataset.file_name.as_str()).collect();
    assert_eq!(got, names);

    let csv = String::from_utf8(render_csv(&rows, &compare_format()).unwrap()).unwrap();
    let col: Vec<&str> = csv.lines().skip(1).map(|l| l.split(',').next().unwrap()).collect();
    assert_eq!(col, names);
}

#[test]
fn seconds_backend_reported_in_millis_rounded() {
    let plan = comparison_plan(Path::new("/data"), &refs(&["dataset_2000_3_5.txt"]));
    let mut src = Replay::new(TimeUnit::Millis).on("dataset_2000_3_5.txt", vec![
        "Execution Time: 0.123 seconds\nIterations till convergence: 11",
        "Execution Time: 0.125 seconds\nIterations till convergence: 12",
    ]);
    let rows = SweepController::new(Aggregator::new(2).unwrap(), &mut src, false)
        .run(&plan.points, &AtomicBool::new(false))
        .unwrap();
    assert!((rows[0].avg_time.unwrap() - 124.0).abs() < 1e-9);
    assert_eq!(rows[0].avg_iterations, Some(11.5));

    let fmt = TableFormat { rounding: Rounding::Nearest, ..compare_format() };
    let csv = String::from_utf8(render_csv(&rows, &fmt).unwrap()).unwrap();
    assert_eq!(csv.lines().nth(1).unwrap(), "dataset_2000_3_5.txt,2000,3,5,124,12,2,2,2,0");
}

// === MISSING-DATA POLICY ===

#[test]
fn all_trials_unparsed_is_flagged_not_zero() {
    let plan = comparison_plan(Path::new("/data"), &refs(&["dataset_2000_3_5.txt"]));
    let mut src = Replay::new(TimeUnit::Millis)
        .on("dataset_2000_3_5.txt", vec!["Error opening file", "Segmentation fault"]);
    let rows = SweepController::new(Aggregator::new(4).unwrap(), &mut src, false)
        .run(&plan.points, &AtomicBool::new(false))
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].avg_time, None);
    assert_eq!(rows[0].avg_iterations, None);
    assert_eq!(rows[0].time_trials, 0);
    assert_eq!(rows[0].attempted, 4);

    let csv = String::from_utf8(render_csv(&rows, &compare_format()).unwrap()).unwrap();
    assert_eq!(csv.lines().nth(1).unwrap(), "dataset_2000_3_5.txt,2000,3,5,,,0,0,4,0");
}

#[test]
fn partial_failures_average_over_successes() {
    let plan = comparison_plan(Path::new("/data"), &refs(&["dataset_2000_3_5.txt"]));
    let mut src = Replay::new(TimeUnit::Millis).on("dataset_2000_3_5.txt", vec![
        "Total execution time: 10 ms",
        "garbage",
        "Total execution time: 30 ms",
        "garbage",
    ]);
    let rows = SweepController::new(Aggregator::new(4).unwrap(), &mut src, false)
        .run(&plan.points, &AtomicBool::new(false))
        .unwrap();
    // 40 / 2 = 20, NOT 40 / 4 = 10
    assert_eq!(rows[0].avg_time, Some(20.0));
    assert_eq!(rows[0].time_trials, 2);
}

// === SCALABILITY MODE ===

#[test]
fn scalability_end_to_end() {
    let plan = scalability_plan(Path::new("/data"), "dataset_10000_20_10.txt", &[2, 64, 1024]).unwrap();
    let mut src = Replay::new(TimeUnit::Millis)
        .on("2", vec!["Total execution time: 80.0 ms"])
        .on("64", vec!["Total execution time: 11.0 ms", "Total execution time: 13.0 ms"])
        .on("1024", vec!["no metrics today"]);

    let rows = SweepController::new(Aggregator::new(2).unwrap(), &mut src, false)
        .run(&plan.points, &AtomicBool::new(false))
        .unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1].avg_time, Some(12.0));
    assert_eq!(rows[2].avg_time, None);

    let fmt = TableFormat {
        unit: TimeUnit::Millis,
        rounding: Rounding::Exact,
        param_column: Some("threads_per_block".into()),
        iterations: false,
    };
    let csv = String::from_utf8(render_csv(&rows, &fmt).unwrap()).unwrap();
    assert_eq!(csv.lines().nth(2).unwrap(), "dataset_10000_20_10.txt,10000,20,10,64,12,2,2,0");

    let html = render_html(&rows, &ChartSpec {
        title: "cuda Performance with Increasing Threads per Block".into(),
        x_label: "Threads per Block".into(),
        unit: TimeUnit::Millis,
    })
    .unwrap();
    assert_eq!(html.matches(r#"class="point""#).count(), 2);
    assert!(html.contains("Threads per Block: 64&#10;Execution Time: 12.00 ms"));
    assert!(html.contains("1 point(s) omitted"));
}

#[test]
fn scalability_dataset_must_resolve() {
    let err = scalability_plan(Path::new("/data"), "notadataset.txt", &[2, 4]);
    assert!(matches!(err, Err(HarnessError::DatasetUnresolved(_))));
}

// === FAILURE PROPAGATION ===

#[test]
fn configuration_failure_aborts_sweep() {
    let plan = comparison_plan(Path::new("/data"), &refs(&["dataset_2000_3_5.txt", "dataset_5000_50_10.txt"]));
    let mut src = Missing;
    let err = SweepController::new(Aggregator::new(3).unwrap(), &mut src, false)
        .run(&plan.points, &AtomicBool::new(false));
    assert!(matches!(err, Err(HarnessError::ExecutableNotFound(_))));
}

#[test]
fn interrupted_sweep_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("results.csv");
    let plan = comparison_plan(Path::new("/data"), &refs(&["dataset_2000_3_5.txt"]));
    let mut src = Replay::new(TimeUnit::Millis);

    let res = SweepController::new(Aggregator::new(3).unwrap(), &mut src, false)
        .run(&plan.points, &AtomicBool::new(true));
    match res {
        Ok(rows) => write_csv(&out, &rows, &compare_format()).unwrap(),
        Err(e) => assert!(matches!(e, HarnessError::Interrupted)),
    }
    assert!(!out.exists());
}

#[test]
fn identical_inputs_identical_rows() {
    let plan = comparison_plan(Path::new("/data"), &refs(&["dataset_2000_3_5.txt", "dataset_5000_50_10.txt"]));
    let make = || {
        Replay::new(TimeUnit::Millis)
            .on("dataset_2000_3_5.txt", vec!["Total execution time: 3.3 ms", "x"])
            .on("dataset_5000_50_10.txt", vec!["Converged at iteration 8"])
    };
    let stop = AtomicBool::new(false);
    let (mut a, mut b) = (make(), make());
    let ra = SweepController::new(Aggregator::new(5).unwrap(), &mut a, false).run(&plan.points, &stop).unwrap();
    let rb = SweepController::new(Aggregator::new(5).unwrap(), &mut b, false).run(&plan.points, &stop).unwrap();
    assert_eq!(ra, rb);
}
