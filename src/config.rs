// CLUSTERBENCH CONFIGURATION
// STATIC, CALLER-SUPPLIED BEFORE THE SWEEP BEGINS. NO RECONFIGURATION MID-RUN.
//
// LAYERS (LATER WINS):
//   1. BUILT-IN DEFAULTS PER MODE
//   2. OPTIONAL TOML FILE (--config)
//   3. COMMAND-LINE OVERRIDES
//
// EVERYTHING IS VALIDATED HERE. A RESOLVED HarnessConfig CANNOT FAIL FOR
// CONFIGURATION REASONS ONCE THE FIRST TRIAL STARTS.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{HarnessError, Result};
use crate::metrics::TimeUnit;
use crate::runner::{Backend, DATASET_PLACEHOLDER, PARAM_PLACEHOLDER};
use crate::sink::{Rounding, TableFormat};
use crate::sweep::Mode;

// THE FIVE REFERENCE DATASETS USED FOR BACKEND COMPARISON
pub const DEFAULT_DATASETS: [&str; 5] = [
    "dataset_2000_3_5.txt",
    "dataset_5000_50_10.txt",
    "dataset_10000_20_10.txt",
    "dataset_20000_80_15.txt",
    "dataset_50000_5_15.txt",
];

pub const DEFAULT_SCALE_DATASET: &str = "dataset_10000_20_10.txt";
pub const DEFAULT_SCALE_PARAMS: [u64; 10] = [2, 4, 8, 16, 32, 64, 128, 256, 512, 1024];

const DEFAULT_COMPARE_TRIALS: u32 = 5;
const DEFAULT_SCALE_TRIALS: u32 = 10;
const DEFAULT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_PARAM_LABEL: &str = "threads_per_block";

#[derive(Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub backend: Option<BackendSection>,
    pub trials: Option<u32>,
    pub dataset_root: Option<PathBuf>,
    pub datasets: Option<Vec<String>>,
    pub sweep: Option<SweepSection>,
    pub output: Option<PathBuf>,
    pub chart: Option<PathBuf>,
}

#[derive(Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct BackendSection {
    pub name: Option<String>,
    pub executable: Option<PathBuf>,
    pub args: Option<Vec<String>>,
    pub unit: Option<TimeUnit>,
    pub rounding: Option<Rounding>,
    pub timeout_secs: Option<u64>,
    pub iterations: Option<bool>,
}

#[derive(Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct SweepSection {
    pub dataset: Option<String>,
    pub params: Option<Vec<u64>>,
    pub param_label: Option<String>,
    pub title: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            HarnessError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

// COMMAND-LINE VALUES. None MEANS "NOT GIVEN".
#[derive(Default, Debug, Clone)]
pub struct Overrides {
    pub executable: Option<PathBuf>,
    pub name: Option<String>,
    pub args: Option<Vec<String>>,
    pub unit: Option<TimeUnit>,
    pub rounding: Option<Rounding>,
    pub timeout_secs: Option<u64>,
    pub iterations: Option<bool>,
    pub trials: Option<u32>,
    pub dataset_root: Option<PathBuf>,
    pub datasets: Option<Vec<String>>,
    pub dataset: Option<String>,
    pub params: Option<Vec<u64>>,
    pub param_label: Option<String>,
    pub output: Option<PathBuf>,
    pub chart: Option<PathBuf>,
    pub no_chart: bool,
}

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub mode: Mode,
    pub backend: Backend,
    pub rounding: Rounding,
    pub iterations: bool,
    pub trials: u32,
    pub dataset_root: PathBuf,
    // COMPARE: THE DATASET LIST. SCALE: EXACTLY ONE DATASET.
    pub datasets: Vec<String>,
    pub params: Vec<u64>,
    pub param_label: String,
    pub title: String,
    pub output: PathBuf,
    pub chart: Option<PathBuf>,
}

impl HarnessConfig {
    pub fn resolve(mode: Mode, file: FileConfig, cli: Overrides) -> Result<Self> {
        let b = file.backend.unwrap_or_default();
        let s = file.sweep.unwrap_or_default();

        let executable = cli.executable.or(b.executable).ok_or_else(|| {
            HarnessError::InvalidConfig("no backend executable configured".to_string())
        })?;
        let name = cli.name.or(b.name).unwrap_or_else(|| {
            executable
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "backend".to_string())
        });
        let args = cli.args.or(b.args).unwrap_or_else(|| default_args(mode));
        let timeout_secs = cli.timeout_secs.or(b.timeout_secs).unwrap_or(DEFAULT_TIMEOUT_SECS);

        let backend = Backend {
            name,
            executable,
            args,
            unit: cli.unit.or(b.unit).unwrap_or(TimeUnit::Millis),
            timeout: Duration::from_secs(timeout_secs),
        };

        let (datasets, params) = match mode {
            Mode::Compare => (
                cli.datasets.or(file.datasets).unwrap_or_else(|| {
                    DEFAULT_DATASETS.iter().map(|s| s.to_string()).collect()
                }),
                Vec::new(),
            ),
            Mode::Scale => (
                vec![cli.dataset.or(s.dataset).unwrap_or_else(|| DEFAULT_SCALE_DATASET.to_string())],
                cli.params.or(s.params).unwrap_or_else(|| DEFAULT_SCALE_PARAMS.to_vec()),
            ),
        };

        let param_label = cli.param_label.or(s.param_label).unwrap_or_else(|| DEFAULT_PARAM_LABEL.to_string());
        let title = s.title.unwrap_or_else(|| match mode {
            Mode::Compare => format!("{} COMPARISON", backend.name.to_uppercase()),
            Mode::Scale => format!("{} Performance with Increasing {}", backend.name, humanize(&param_label)),
        });

        let chart = match mode {
            Mode::Scale if !cli.no_chart => Some(
                cli.chart.or(file.chart).unwrap_or_else(|| PathBuf::from("performance.html")),
            ),
            _ => None,
        };

        let cfg = Self {
            mode,
            rounding: cli.rounding.or(b.rounding).unwrap_or_default(),
            iterations: cli.iterations.or(b.iterations).unwrap_or(mode == Mode::Compare),
            trials: cli.trials.or(file.trials).unwrap_or(match mode {
                Mode::Compare => DEFAULT_COMPARE_TRIALS,
                Mode::Scale => DEFAULT_SCALE_TRIALS,
            }),
            dataset_root: cli.dataset_root.or(file.dataset_root).unwrap_or_else(|| PathBuf::from(".")),
            datasets,
            params,
            param_label,
            title,
            output: cli.output.or(file.output).unwrap_or_else(|| PathBuf::from("results.csv")),
            chart,
            backend,
        };
        cfg.validate_shape()?;
        Ok(cfg)
    }

    // CHECKS THAT NEED NO FILESYSTEM ACCESS
    pub fn validate_shape(&self) -> Result<()> {
        let invalid = |m: &str| Err(HarnessError::InvalidConfig(m.to_string()));
        if self.trials == 0 {
            return invalid("trials must be at least 1");
        }
        if self.backend.timeout.is_zero() {
            return invalid("timeout must be at least 1 second");
        }
        if self.datasets.is_empty() {
            return invalid("dataset list is empty");
        }
        if !self.backend.args.iter().any(|a| a.contains(DATASET_PLACEHOLDER)) {
            return invalid("backend args never reference {dataset}");
        }
        match self.mode {
            Mode::Compare if self.backend.uses_param() => {
                invalid("{param} is only meaningful in scale mode")
            }
            Mode::Scale if self.params.is_empty() => invalid("parameter sweep list is empty"),
            Mode::Scale if !self.backend.uses_param() => {
                invalid("backend args never reference {param}; every point would be identical")
            }
            _ => Ok(()),
        }
    }

    // CHECKS AGAINST THE FILESYSTEM. RUN BEFORE ANY TRIAL.
    pub fn validate_environment(&self) -> Result<PathBuf> {
        std::fs::read_dir(&self.dataset_root).map_err(|source| HarnessError::DatasetRootUnreadable {
            path: self.dataset_root.clone(),
            source,
        })?;
        self.backend.validate()
    }

    pub fn table_format(&self) -> TableFormat {
        TableFormat {
            unit: self.backend.unit,
            rounding: self.rounding,
            param_column: (self.mode == Mode::Scale).then(|| self.param_label.clone()),
            iterations: self.iterations,
        }
    }
}

fn default_args(mode: Mode) -> Vec<String> {
    match mode {
        Mode::Compare => vec![DATASET_PLACEHOLDER.to_string()],
        Mode::Scale => vec![PARAM_PLACEHOLDER.to_string(), DATASET_PLACEHOLDER.to_string()],
    }
}

// "threads_per_block" -> "Threads per Block"
pub fn humanize(label: &str) -> String {
    label
        .split(|c| c == '_' || c == '-')
        .filter(|w| !w.is_empty())
        .enumerate()
        .map(|(i, w)| {
            let small = matches!(w, "per" | "of" | "a" | "the" | "in");
            if i > 0 && small {
                w.to_string()
            } else {
                let mut c = w.chars();
                c.next()
                    .map(|f| f.to_uppercase().collect::<String>() + c.as_str())
                    .unwrap_or_default()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
