// CLUSTERBENCH TRIAL LOG
// RECORDS EVERY TRIAL OUTCOME DURING A SWEEP.
// PRE-ALLOCATED RING BUFFER. WRAPS AROUND AT CAPACITY -- OLDEST ENTRIES OVERWRITTEN.

use std::time::Duration;

use crate::metrics::TimeUnit;
use crate::runner::{TrialKind, TrialReport};

const MAX_RECORDS: usize = 4096;

#[derive(Clone, Copy)]
pub struct TrialRecord {
    pub point:      usize,
    pub trial:      u32,
    pub kind:       TrialKind,
    pub wall_ns:    u64,
    pub time:       Option<f64>,
    pub iterations: Option<u64>,
    pub exit_code:  Option<i32>,
}

const EMPTY: TrialRecord = TrialRecord {
    point: 0,
    trial: 0,
    kind: TrialKind::Unmeasured,
    wall_ns: 0,
    time: None,
    iterations: None,
    exit_code: None,
};

// LIFETIME TOTALS. UNAFFECTED BY RING WRAP.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct Totals {
    pub trials:      u64,
    pub measured:    u64,
    pub time_parsed: u64,
    pub iter_parsed: u64,
    pub timeouts:    u64,
    pub nonzero:     u64,
    pub wall_ns:     u64,
}

pub struct TrialLog {
    records: Vec<TrialRecord>,
    labels:  Vec<String>,
    unit:    TimeUnit,
    head:    usize,
    len:     usize,
    totals:  Totals,
}

impl TrialLog {
    pub fn new(unit: TimeUnit) -> Self {
        Self {
            records: vec![EMPTY; MAX_RECORDS],
            labels: Vec::new(),
            unit,
            head: 0,
            len: 0,
            totals: Totals::default(),
        }
    }

    // REGISTER A SWEEP POINT LABEL. RETURNS ITS INDEX FOR record().
    pub fn begin_point(&mut self, label: String) -> usize {
        self.labels.push(label);
        self.labels.len() - 1
    }

    pub fn record(&mut self, point: usize, trial: u32, report: &TrialReport) {
        let metrics = report.metrics.normalize(self.unit);
        let wall_ns = duration_ns(report.wall);
        self.records[self.head] = TrialRecord {
            point,
            trial,
            kind: report.kind,
            wall_ns,
            time: metrics.execution_time,
            iterations: metrics.iterations,
            exit_code: report.exit_code,
        };
        self.head = (self.head + 1) % MAX_RECORDS;
        if self.len < MAX_RECORDS {
            self.len += 1;
        }

        let t = &mut self.totals;
        t.trials += 1;
        t.wall_ns += wall_ns;
        match report.kind {
            TrialKind::Measured => t.measured += 1,
            TrialKind::TimedOut => t.timeouts += 1,
            TrialKind::Unmeasured => {}
        }
        if metrics.execution_time.is_some() {
            t.time_parsed += 1;
        }
        if metrics.iterations.is_some() {
            t.iter_parsed += 1;
        }
        if report.exit_code.is_some_and(|c| c != 0) {
            t.nonzero += 1;
        }
    }

    pub fn totals(&self) -> Totals {
        self.totals
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    // ITERATE RECORDS IN CHRONOLOGICAL ORDER
    fn iter_chronological(&self) -> impl Iterator<Item = &TrialRecord> {
        let start = if self.len < MAX_RECORDS { 0 } else { self.head };
        (0..self.len).map(move |i| &self.records[(start + i) % MAX_RECORDS])
    }

    // DUMP EVERY TRIAL AFTER THE SWEEP
    pub fn dump(&self) {
        if self.len == 0 {
            return;
        }

        let time_col = format!("TIME_{}", self.unit.label().to_uppercase());
        println!("\n{:<28} {:>5} {:<10} {:>12} {:>8} {:>6} {:>10}",
            "POINT", "TRIAL", "OUTCOME", time_col, "ITERS", "EXIT", "WALL_MS");
        println!("{}", "-".repeat(85));

        for r in self.iter_chronological() {
            let label = self.labels.get(r.point).map(String::as_str).unwrap_or("?");
            println!("{:<28} {:>5} {:<10} {:>12} {:>8} {:>6} {:>10.1}",
                truncate(label, 28),
                r.trial,
                r.kind.label(),
                r.time.map(|v| format!("{:.3}", v)).unwrap_or_else(|| "-".into()),
                r.iterations.map(|v| v.to_string()).unwrap_or_else(|| "-".into()),
                r.exit_code.map(|v| v.to_string()).unwrap_or_else(|| "-".into()),
                r.wall_ns as f64 / 1_000_000.0);
        }

        if self.totals.trials as usize > self.len {
            println!("\n(RING BUFFER WRAPPED -- SHOWING MOST RECENT {} TRIALS)", MAX_RECORDS);
        }
        println!("TOTAL TRIALS: {}", self.totals.trials);
    }

    pub fn summary(&self) {
        let t = &self.totals;
        if t.trials == 0 {
            return;
        }
        let wall_s = t.wall_ns as f64 / 1_000_000_000.0;

        println!("\n{}", "=".repeat(50));
        println!("TRIAL SUMMARY");
        println!("{}", "=".repeat(50));
        println!("  POINTS:            {}", self.labels.len());
        println!("  TRIALS:            {}", t.trials);
        println!("  MEASURED:          {} ({:.1}%)", t.measured,
            t.measured as f64 / t.trials as f64 * 100.0);
        println!("  TIME PARSED:       {}", t.time_parsed);
        println!("  ITERATIONS PARSED: {}", t.iter_parsed);
        println!("  TIMEOUTS:          {}", t.timeouts);
        println!("  NONZERO EXITS:     {}", t.nonzero);
        println!("  WALL TIME:         {:.1}s", wall_s);
    }
}

fn duration_ns(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}
