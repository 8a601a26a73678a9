// CLUSTERBENCH AGGREGATOR
// RUNS ONE SWEEP POINT N TIMES, SEQUENTIALLY, AND AVERAGES WHAT PARSED.
//
// MISSING-DATA POLICY:
//   EACH METRIC HAS ITS OWN SUM AND ITS OWN COUNT OF PARSED VALUES.
//   MEAN = SUM / PARSED COUNT, NEVER SUM / CONFIGURED TRIALS.
//   ZERO PARSED VALUES -> THE FIELD IS None (WRITTEN AS AN EMPTY CELL), NOT 0.
//   VALID-TRIAL COUNTS TRAVEL WITH EVERY ROW SO A READER CAN SEE THE SAMPLE SIZE.
// NO ROUNDING HERE. ROUNDING IS A PRESENTATION CHOICE MADE BY THE SINK.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{HarnessError, Result};
use crate::metrics::{TimeUnit, TrialMetrics};
use crate::runner::{TrialKind, TrialReport, TrialSource};
use crate::sweep::SweepPoint;

#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct MetricAccumulator {
    time_sum: f64,
    time_count: u32,
    // WIDE ENOUGH FOR u32::MAX TRIALS OF u64::MAX ITERATIONS
    iter_sum: u128,
    iter_count: u32,
    attempted: u32,
    timeouts: u32,
}

impl MetricAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, m: TrialMetrics) {
        self.attempted += 1;
        if let Some(t) = m.execution_time {
            self.time_sum += t;
            self.time_count += 1;
        }
        if let Some(i) = m.iterations {
            self.iter_sum += u128::from(i);
            self.iter_count += 1;
        }
    }

    pub fn add_timeout(&mut self) {
        self.attempted += 1;
        self.timeouts += 1;
    }

    pub fn mean_time(&self) -> Option<f64> {
        mean(self.time_sum, self.time_count)
    }

    pub fn mean_iterations(&self) -> Option<f64> {
        mean(self.iter_sum as f64, self.iter_count)
    }

    pub fn finalize(self, point: SweepPoint, unit: TimeUnit) -> AggregateResult {
        AggregateResult {
            point,
            unit,
            avg_time: self.mean_time(),
            avg_iterations: self.mean_iterations(),
            time_trials: self.time_count,
            iter_trials: self.iter_count,
            attempted: self.attempted,
            timeouts: self.timeouts,
        }
    }
}

fn mean(sum: f64, count: u32) -> Option<f64> {
    (count > 0).then(|| sum / count as f64)
}

// ONE OUTPUT ROW. IMMUTABLE ONCE BUILT.
#[derive(Clone, PartialEq, Debug)]
pub struct AggregateResult {
    pub point: SweepPoint,
    pub unit: TimeUnit,
    pub avg_time: Option<f64>,
    pub avg_iterations: Option<f64>,
    pub time_trials: u32,
    pub iter_trials: u32,
    pub attempted: u32,
    pub timeouts: u32,
}

pub struct Aggregator {
    trials: u32,
}

impl Aggregator {
    pub fn new(trials: u32) -> Result<Self> {
        if trials == 0 {
            return Err(HarnessError::InvalidConfig(
                "trial count must be at least 1".to_string(),
            ));
        }
        Ok(Self { trials })
    }

    pub fn trials(&self) -> u32 {
        self.trials
    }

    // `observe` SEES EVERY TRIAL (1-BASED INDEX) FOR LOGGING.
    // ONLY CONFIGURATION ERRORS AND SHUTDOWN ESCAPE AS Err.
    pub fn run<S, F>(
        &self,
        source: &mut S,
        point: &SweepPoint,
        shutdown: &AtomicBool,
        mut observe: F,
    ) -> Result<AggregateResult>
    where
        S: TrialSource + ?Sized,
        F: FnMut(u32, &TrialReport),
    {
        let unit = source.unit();
        let mut acc = MetricAccumulator::new();

        for trial in 1..=self.trials {
            if shutdown.load(Ordering::Relaxed) {
                return Err(HarnessError::Interrupted);
            }
            let report = source.run_trial(point, shutdown)?;
            match report.kind {
                TrialKind::TimedOut => acc.add_timeout(),
                _ => acc.add(report.metrics.normalize(unit)),
            }
            observe(trial, &report);
        }

        Ok(acc.finalize(point.clone(), unit))
    }
}
