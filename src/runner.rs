// CLUSTERBENCH TRIAL RUNNER
// ONE TRIAL = SPAWN THE BACKEND ONCE, DRAIN STDOUT/STDERR, WAIT (BOUNDED), PARSE.
//
// THREE OUTCOMES:
//   Ok(MEASURED)    PROCESS RAN, AT LEAST ONE METRIC PARSED (EXIT CODE IRRELEVANT)
//   Ok(UNMEASURED)  PROCESS RAN OR TIMED OUT, NOTHING USABLE
//   Err(..)         EXECUTABLE MISSING / NOT EXECUTABLE, OR SHUTDOWN REQUESTED.
//                   ABORTS THE WHOLE SWEEP.
//
// THE CHILD RUNS IN ITS OWN PROCESS GROUP SO A TIMEOUT KILLS EVERYTHING IT FORKED.
// THE GROUP NEVER SEES THE TERMINAL'S SIGINT, SO THE WAIT LOOP POLLS THE SHUTDOWN
// FLAG ITSELF AND KILLS THE GROUP ON CTRL+C.

use std::io::{self, Read};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::error::{HarnessError, Result};
use crate::metrics::{parse_metrics, RawMetrics, TimeUnit};
use crate::sweep::SweepPoint;

pub const DATASET_PLACEHOLDER: &str = "{dataset}";
pub const PARAM_PLACEHOLDER: &str = "{param}";

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Clone, Debug)]
pub struct Backend {
    pub name: String,
    pub executable: PathBuf,
    // POSITIONAL ARGUMENT TEMPLATE. {dataset} AND {param} ARE SUBSTITUTED PER POINT.
    pub args: Vec<String>,
    // UNIT THE RESULTS ARE REPORTED IN. PARSED VALUES ARE CONVERTED TO THIS.
    pub unit: TimeUnit,
    pub timeout: Duration,
}

impl Backend {
    pub fn args_for(&self, point: &SweepPoint) -> Vec<String> {
        let dataset = point.dataset.path.to_string_lossy();
        let param = point.param.map(|p| p.to_string()).unwrap_or_default();
        self.args
            .iter()
            .map(|a| {
                a.replace(DATASET_PLACEHOLDER, &dataset)
                    .replace(PARAM_PLACEHOLDER, &param)
            })
            .collect()
    }

    pub fn uses_param(&self) -> bool {
        self.args.iter().any(|a| a.contains(PARAM_PLACEHOLDER))
    }

    // RESOLVE AND VET THE EXECUTABLE BEFORE ANY TRIAL RUNS
    pub fn validate(&self) -> Result<PathBuf> {
        let path = resolve_executable(&self.executable)
            .ok_or_else(|| HarnessError::ExecutableNotFound(self.executable.clone()))?;
        let meta = std::fs::metadata(&path)
            .map_err(|_| HarnessError::ExecutableNotFound(path.clone()))?;
        if !meta.is_file() || meta.permissions().mode() & 0o111 == 0 {
            return Err(HarnessError::NotExecutable(path));
        }
        Ok(path)
    }
}

// BARE NAMES ARE LOOKED UP ON $PATH. ANYTHING WITH A SEPARATOR IS TAKEN AS-IS.
pub fn resolve_executable(exe: &Path) -> Option<PathBuf> {
    if exe.components().count() > 1 || exe.is_absolute() {
        return exe.exists().then(|| exe.to_path_buf());
    }
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(exe))
        .find(|candidate| candidate.is_file())
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TrialKind {
    Measured,
    Unmeasured,
    TimedOut,
}

impl TrialKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Measured => "OK",
            Self::Unmeasured => "NO METRICS",
            Self::TimedOut => "TIMEOUT",
        }
    }
}

#[derive(Clone, Debug)]
pub struct TrialReport {
    pub kind: TrialKind,
    pub metrics: RawMetrics,
    // NEGATIVE SIGNAL NUMBER WHEN KILLED BY A SIGNAL. None ON TIMEOUT.
    pub exit_code: Option<i32>,
    pub wall: Duration,
    pub stderr_tail: String,
}

impl TrialReport {
    pub fn timed_out(wall: Duration) -> Self {
        Self {
            kind: TrialKind::TimedOut,
            metrics: RawMetrics::default(),
            exit_code: None,
            wall,
            stderr_tail: String::new(),
        }
    }

    pub fn from_output(stdout: &str, stderr: &str, exit_code: Option<i32>, wall: Duration) -> Self {
        let metrics = parse_metrics(stdout);
        let kind = if metrics.is_empty() {
            TrialKind::Unmeasured
        } else {
            TrialKind::Measured
        };
        Self {
            kind,
            metrics,
            exit_code,
            wall,
            stderr_tail: last_line(stderr),
        }
    }
}

fn last_line(text: &str) -> String {
    text.lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .to_string()
}

// SEAM BETWEEN THE AGGREGATOR AND THE OUTSIDE WORLD. TESTS SUBSTITUTE SCRIPTED SOURCES.
pub trait TrialSource {
    fn unit(&self) -> TimeUnit;
    // `shutdown` IS POLLED WHILE THE TRIAL RUNS. SET -> Err(Interrupted).
    fn run_trial(&mut self, point: &SweepPoint, shutdown: &AtomicBool) -> Result<TrialReport>;
}

pub struct TrialRunner {
    backend: Backend,
    executable: PathBuf,
}

impl TrialRunner {
    pub fn new(backend: Backend) -> Result<Self> {
        let executable = backend.validate()?;
        Ok(Self { backend, executable })
    }

    pub fn run(&self, args: &[String], shutdown: &AtomicBool) -> Result<TrialReport> {
        let start = Instant::now();
        let mut child = Command::new(&self.executable)
            .args(args)
            .process_group(0)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(&self.executable, e))?;

        // DRAIN BOTH PIPES CONCURRENTLY OR A CHATTY CHILD BLOCKS ON A FULL PIPE
        let out = drain(child.stdout.take());
        let err = drain(child.stderr.take());

        let mut guard = ProcGuard::new(child);
        let wait = guard.wait_timeout(self.backend.timeout, shutdown);
        let wall = start.elapsed();

        // AFTER A KILL THE WHOLE GROUP IS GONE, SO THE PIPES HIT EOF
        let stdout = join_drain(out);
        let stderr = join_drain(err);

        match wait {
            Wait::Exited(status) => Ok(TrialReport::from_output(&stdout, &stderr, exit_code(status), wall)),
            Wait::TimedOut => Ok(TrialReport::timed_out(wall)),
            Wait::Interrupted => Err(HarnessError::Interrupted),
        }
    }
}

impl TrialSource for TrialRunner {
    fn unit(&self) -> TimeUnit {
        self.backend.unit
    }

    fn run_trial(&mut self, point: &SweepPoint, shutdown: &AtomicBool) -> Result<TrialReport> {
        let args = self.backend.args_for(point);
        self.run(&args, shutdown)
    }
}

fn spawn_error(exe: &Path, e: io::Error) -> HarnessError {
    match e.kind() {
        io::ErrorKind::NotFound => HarnessError::ExecutableNotFound(exe.to_path_buf()),
        io::ErrorKind::PermissionDenied => HarnessError::NotExecutable(exe.to_path_buf()),
        _ => HarnessError::Spawn { exe: exe.to_path_buf(), source: e },
    }
}

fn exit_code(status: ExitStatus) -> Option<i32> {
    status.code().or_else(|| status.signal().map(|s| -s))
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut p| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = p.read_to_end(&mut buf);
            buf
        })
    })
}

fn join_drain(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default()
}

enum Wait {
    Exited(ExitStatus),
    // GROUP ALREADY KILLED AND REAPED
    TimedOut,
    Interrupted,
}

// OWNS A CHILD RUNNING IN ITS OWN PROCESS GROUP. DROP KILLS THE GROUP.
struct ProcGuard {
    child: Option<Child>,
    pgid: i32,
}

impl ProcGuard {
    fn new(child: Child) -> Self {
        let pgid = child.id() as i32;
        Self {
            child: Some(child),
            pgid,
        }
    }

    fn wait_timeout(&mut self, timeout: Duration, shutdown: &AtomicBool) -> Wait {
        let Some(child) = self.child.as_mut() else {
            return Wait::TimedOut;
        };
        let deadline = Instant::now() + timeout;
        let outcome = loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    self.child = None;
                    // STRAGGLERS LEFT IN THE GROUP WOULD HOLD THE PIPES OPEN
                    unsafe {
                        libc::killpg(self.pgid, libc::SIGKILL);
                    }
                    return Wait::Exited(status);
                }
                Ok(None) if shutdown.load(Ordering::Relaxed) => break Wait::Interrupted,
                Ok(None) if Instant::now() >= deadline => break Wait::TimedOut,
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(_) => break Wait::TimedOut,
            }
        };
        self.kill();
        outcome
    }

    fn kill(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        // SAFETY: killpg ON A GROUP WE CREATED. THE LEADER IS NOT YET REAPED, SO THE
        // PGID CANNOT HAVE BEEN REUSED. WORST CASE IT IS ALREADY GONE (ESRCH).
        unsafe {
            libc::killpg(self.pgid, libc::SIGKILL);
        }
        let _ = child.wait();
    }
}

impl Drop for ProcGuard {
    fn drop(&mut self) {
        self.kill();
    }
}
