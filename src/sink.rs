// CLUSTERBENCH RESULT SINK
// PERSISTS THE ORDERED AggregateResult SEQUENCE AS A CSV TABLE.
//
// THE TABLE IS BUILT IN MEMORY AND WRITTEN ONCE: TEMP FILE, THEN RENAME.
// AN INTERRUPTED RUN NEVER LEAVES A HALF-WRITTEN TABLE BEHIND.
// THE SINK ONLY BORROWS THE RESULTS. IT NEVER REORDERS OR MUTATES THEM.
//
// SCHEMA (ROW ORDER = SWEEP ORDER):
//   file_name, num_points, dimensions, num_clusters, [<param>,]
//   avg_time_<unit>, [avg_iterations,] time_trials, [iter_trials,] trials
// A METRIC WITH ZERO VALID TRIALS IS AN EMPTY CELL, NEVER 0.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::aggregate::AggregateResult;
use crate::error::Result;
use crate::metrics::TimeUnit;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rounding {
    // FULL PRECISION
    #[default]
    Exact,
    // NEAREST INTEGER
    Nearest,
}

impl Rounding {
    pub fn format(self, v: f64) -> String {
        match self {
            Self::Exact => format!("{}", v),
            Self::Nearest => format!("{}", v.round() as i64),
        }
    }
}

impl std::str::FromStr for Rounding {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "nearest" | "round" => Ok(Self::Nearest),
            other => Err(format!("unknown rounding '{}' (expected exact or nearest)", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TableFormat {
    pub unit: TimeUnit,
    pub rounding: Rounding,
    // COLUMN NAME FOR THE RUN CONFIG. None DROPS THE COLUMN.
    pub param_column: Option<String>,
    pub iterations: bool,
}

impl TableFormat {
    pub fn header(&self) -> Vec<String> {
        let mut h: Vec<String> = ["file_name", "num_points", "dimensions", "num_clusters"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        if let Some(p) = &self.param_column {
            h.push(p.clone());
        }
        h.push(format!("avg_time_{}", self.unit.label()));
        if self.iterations {
            h.push("avg_iterations".into());
        }
        h.push("time_trials".into());
        if self.iterations {
            h.push("iter_trials".into());
        }
        h.push("trials".into());
        h.push("timeouts".into());
        h
    }

    pub fn row(&self, r: &AggregateResult) -> Vec<String> {
        let d = &r.point.dataset;
        let mut row = vec![
            d.file_name.clone(),
            d.num_points.to_string(),
            d.dimensions.to_string(),
            d.num_clusters.to_string(),
        ];
        if self.param_column.is_some() {
            row.push(r.point.param.map(|p| p.to_string()).unwrap_or_default());
        }
        row.push(self.cell(r.avg_time));
        if self.iterations {
            row.push(self.cell(r.avg_iterations));
        }
        row.push(r.time_trials.to_string());
        if self.iterations {
            row.push(r.iter_trials.to_string());
        }
        row.push(r.attempted.to_string());
        row.push(r.timeouts.to_string());
        row
    }

    fn cell(&self, v: Option<f64>) -> String {
        v.map(|v| self.rounding.format(v)).unwrap_or_default()
    }
}

pub fn render_csv(results: &[AggregateResult], format: &TableFormat) -> Result<Vec<u8>> {
    let mut w = csv::Writer::from_writer(Vec::new());
    w.write_record(format.header())?;
    for r in results {
        w.write_record(format.row(r))?;
    }
    w.into_inner().map_err(|e| e.into_error().into())
}

pub fn write_csv(path: &Path, results: &[AggregateResult], format: &TableFormat) -> Result<()> {
    let bytes = render_csv(results, format)?;
    write_atomic(path, &bytes)
}

// WRITE TO <path>.tmp, THEN RENAME OVER <path>
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);
    fs::write(&tmp, bytes)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

// HUMAN-READABLE REPORT FOR THE TERMINAL
pub fn render_report(title: &str, results: &[AggregateResult], format: &TableFormat) -> String {
    let sep = "=".repeat(78);
    let mut report = vec![sep.clone(), title.to_string(), sep.clone()];

    let param = format.param_column.as_deref().unwrap_or("");
    report.push(format!(
        "{:<28} {:>8} {:>5} {:>4} {:>8} {:>14} {:>10} {:>7}",
        "DATASET", "POINTS", "DIM", "K", param.to_uppercase(),
        format!("AVG_TIME_{}", format.unit.label().to_uppercase()), "AVG_ITERS", "VALID"
    ));
    report.push("-".repeat(78));
    for r in results {
        let d = &r.point.dataset;
        report.push(format!(
            "{:<28} {:>8} {:>5} {:>4} {:>8} {:>14} {:>10} {:>3}/{:<3}",
            d.file_name,
            d.num_points,
            d.dimensions,
            d.num_clusters,
            r.point.param.map(|p| p.to_string()).unwrap_or_default(),
            r.avg_time.map(|t| format.rounding.format(t)).unwrap_or_else(|| "MISSING".into()),
            r.avg_iterations.map(|n| format!("{:.2}", n)).unwrap_or_else(|| "-".into()),
            r.time_trials,
            r.attempted,
        ));
    }
    report.push(sep);
    report.join("\n") + "\n"
}
