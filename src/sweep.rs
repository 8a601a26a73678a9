// CLUSTERBENCH SWEEP CONTROLLER
// ENUMERATES SWEEP POINTS AND RUNS THE AGGREGATOR ONCE PER POINT, IN ORDER.
//
// COMPARISON MODE:  ONE POINT PER DATASET. UNRESOLVABLE REFERENCES ARE SKIPPED.
// SCALABILITY MODE: ONE FIXED DATASET, ONE POINT PER PARAMETER VALUE.
//                   THE DATASET MUST RESOLVE; NOTHING IS SKIPPED.
//
// OUTPUT ORDER == INPUT ORDER. IT DRIVES TABLE ROWS AND THE CHART X-AXIS.

use std::path::Path;
use std::sync::atomic::AtomicBool;

use crate::aggregate::{AggregateResult, Aggregator};
use crate::dataset::DatasetDescriptor;
use crate::error::{HarnessError, Result};
use crate::event::TrialLog;
use crate::runner::{TrialKind, TrialSource};

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SweepPoint {
    pub dataset: DatasetDescriptor,
    // THE RUN CONFIG. None IN COMPARISON MODE.
    pub param: Option<u64>,
}

impl SweepPoint {
    pub fn label(&self) -> String {
        match self.param {
            Some(p) => format!("{} @ {}", self.dataset.file_name, p),
            None => self.dataset.file_name.clone(),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Mode {
    Compare,
    Scale,
}

#[derive(Debug, Default)]
pub struct SweepPlan {
    pub points: Vec<SweepPoint>,
    // REFERENCES THAT FAILED BOTH NAMING CONVENTIONS (COMPARISON MODE ONLY)
    pub skipped: Vec<String>,
}

pub fn comparison_plan(root: &Path, references: &[String]) -> SweepPlan {
    let mut plan = SweepPlan::default();
    for reference in references {
        match DatasetDescriptor::resolve(root, reference) {
            Some((dataset, _)) => plan.points.push(SweepPoint { dataset, param: None }),
            None => plan.skipped.push(reference.clone()),
        }
    }
    plan
}

pub fn scalability_plan(root: &Path, reference: &str, params: &[u64]) -> Result<SweepPlan> {
    let (dataset, _) = DatasetDescriptor::resolve(root, reference)
        .ok_or_else(|| HarnessError::DatasetUnresolved(reference.to_string()))?;
    let points = params
        .iter()
        .map(|&p| SweepPoint { dataset: dataset.clone(), param: Some(p) })
        .collect();
    Ok(SweepPlan { points, skipped: Vec::new() })
}

pub struct SweepController<'a, S: TrialSource + ?Sized> {
    aggregator: Aggregator,
    source: &'a mut S,
    pub log: TrialLog,
    verbose: bool,
}

impl<'a, S: TrialSource + ?Sized> SweepController<'a, S> {
    pub fn new(aggregator: Aggregator, source: &'a mut S, verbose: bool) -> Self {
        let log = TrialLog::new(source.unit());
        Self { aggregator, source, log, verbose }
    }

    pub fn run(&mut self, points: &[SweepPoint], shutdown: &AtomicBool) -> Result<Vec<AggregateResult>> {
        let mut results = Vec::with_capacity(points.len());
        let total = points.len();
        let unit = self.source.unit();

        for (i, point) in points.iter().enumerate() {
            let label = point.label();
            println!("[{}/{}] {} ({}) x{}", i + 1, total, label,
                point.dataset.shape(), self.aggregator.trials());

            let idx = self.log.begin_point(label);
            let verbose = self.verbose;
            let log = &mut self.log;
            let result = self.aggregator.run(&mut *self.source, point, shutdown, |trial, report| {
                log.record(idx, trial, report);
                if verbose {
                    let m = report.metrics.normalize(unit);
                    println!("    TRIAL {:>3}: {:<10} TIME: {:>12}  ITERS: {:>6}  EXIT: {}",
                        trial,
                        report.kind.label(),
                        m.execution_time.map(|t| format!("{:.3}{}", t, unit)).unwrap_or_else(|| "-".into()),
                        m.iterations.map(|n| n.to_string()).unwrap_or_else(|| "-".into()),
                        report.exit_code.map(|c| c.to_string()).unwrap_or_else(|| "-".into()));
                    if report.kind != TrialKind::Measured && !report.stderr_tail.is_empty() {
                        println!("               STDERR: {}", report.stderr_tail);
                    }
                }
            })?;

            match result.avg_time {
                Some(t) => println!("    AVG TIME: {:.3} {} ({}/{} TRIALS)  AVG ITERS: {}",
                    t, unit, result.time_trials, result.attempted,
                    result.avg_iterations.map(|n| format!("{:.2}", n)).unwrap_or_else(|| "-".into())),
                None => println!("    NO VALID TIME IN {} TRIALS ({} TIMEOUTS)",
                    result.attempted, result.timeouts),
            }
            results.push(result);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::metrics::TimeUnit;
    use crate::runner::TrialReport;

    // EMITS A TIME DERIVED FROM THE DATASET SIZE SO ROWS ARE DISTINGUISHABLE
    struct BySize;

    impl TrialSource for BySize {
        fn unit(&self) -> TimeUnit {
            TimeUnit::Millis
        }

        fn run_trial(&mut self, point: &SweepPoint, _shutdown: &AtomicBool) -> Result<TrialReport> {
            let out = format!(
                "Total execution time: {} ms\nConverged at iteration {}",
                point.dataset.num_points,
                point.param.unwrap_or(1)
            );
            Ok(TrialReport::from_output(&out, "", Some(0), Duration::ZERO))
        }
    }

    fn refs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn comparison_plan_skips_bad_names() {
        let plan = comparison_plan(
            Path::new("/nonexistent-root"),
            &refs(&["dataset_2000_3_5.txt", "notadataset.txt", "dataset_5000_50_10.txt"]),
        );
        assert_eq!(plan.points.len(), 2);
        assert_eq!(plan.skipped, vec!["notadataset.txt".to_string()]);
        assert_eq!(plan.points[1].dataset.num_points, 5000);
    }

    #[test]
    fn scalability_plan_requires_dataset() {
        let err = scalability_plan(Path::new("/nonexistent-root"), "notadataset.txt", &[2, 4]);
        assert!(matches!(err, Err(HarnessError::DatasetUnresolved(_))));

        let plan = scalability_plan(Path::new("/data"), "dataset_10000_20_10.txt", &[2, 4, 8]).unwrap();
        let params: Vec<_> = plan.points.iter().map(|p| p.param).collect();
        assert_eq!(params, vec![Some(2), Some(4), Some(8)]);
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn output_order_matches_input_order() {
        let names = [
            "dataset_50000_5_15.txt",
            "dataset_2000_3_5.txt",
            "dataset_20000_80_15.txt",
            "dataset_5000_50_10.txt",
            "dataset_10000_20_10.txt",
        ];
        let plan = comparison_plan(Path::new("/data"), &refs(&names));
        let mut src = BySize;
        let mut ctl = SweepController::new(Aggregator::new(2).unwrap(), &mut src, false);
        let rows = ctl.run(&plan.points, &AtomicBool::new(false)).unwrap();

        let got: Vec<&str> = rows.iter().map(|r| r.point.dataset.file_name.as_str()).collect();
        assert_eq!(got, names);
        assert_eq!(rows[0].avg_time, Some(50000.0));
        assert_eq!(rows[1].avg_time, Some(2000.0));
        assert_eq!(ctl.log.totals().trials, 10);
    }

    #[test]
    fn scale_rows_carry_params() {
        let plan = scalability_plan(Path::new("/data"), "dataset_10000_20_10.txt", &[64, 2, 1024]).unwrap();
        let mut src = BySize;
        let mut ctl = SweepController::new(Aggregator::new(1).unwrap(), &mut src, true);
        let rows = ctl.run(&plan.points, &AtomicBool::new(false)).unwrap();
        let iters: Vec<_> = rows.iter().map(|r| r.avg_iterations).collect();
        assert_eq!(iters, vec![Some(64.0), Some(2.0), Some(1024.0)]);
    }
}
