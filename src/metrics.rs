// CLUSTERBENCH METRICS PARSER
// SCRAPES SELF-REPORTED METRICS FROM THE STDOUT OF ONE EXTERNAL RUN.
//
// THE PATTERN TABLE BELOW IS THE ENTIRE TEXT PROTOCOL. IF A BACKEND CHANGES
// ITS PRINT STATEMENTS, THIS TABLE IS THE ONLY THING THAT MOVES.
// EACH PATTERN IS INDEPENDENT. A MISSING PATTERN IS AN ABSENT FIELD, NOT AN ERROR.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum TimeUnit {
    #[serde(rename = "ms")]
    Millis,
    #[serde(rename = "s")]
    Seconds,
}

impl TimeUnit {
    pub fn label(self) -> &'static str {
        match self {
            Self::Millis => "ms",
            Self::Seconds => "s",
        }
    }

    // CONVERT A VALUE EXPRESSED IN self INTO `to`
    pub fn convert(self, value: f64, to: TimeUnit) -> f64 {
        match (self, to) {
            (Self::Millis, Self::Seconds) => value / 1000.0,
            (Self::Seconds, Self::Millis) => value * 1000.0,
            _ => value,
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TimeUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ms" | "millis" | "milliseconds" => Ok(Self::Millis),
            "s" | "sec" | "secs" | "seconds" => Ok(Self::Seconds),
            other => Err(format!("unknown time unit '{}' (expected ms or s)", other)),
        }
    }
}

// A TIME VALUE EXACTLY AS PRINTED, WITH THE UNIT ITS PATTERN DECLARED.
// NORMALIZATION IS THE CALLER'S JOB.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct RawTime {
    pub value: f64,
    pub unit: TimeUnit,
}

#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct RawMetrics {
    pub time: Option<RawTime>,
    pub iterations: Option<u64>,
}

impl RawMetrics {
    pub fn is_empty(&self) -> bool {
        self.time.is_none() && self.iterations.is_none()
    }

    // EXPRESS THE TIME IN THE BACKEND'S REPORT UNIT
    pub fn normalize(&self, report: TimeUnit) -> TrialMetrics {
        TrialMetrics {
            execution_time: self.time.map(|t| t.unit.convert(t.value, report)),
            iterations: self.iterations,
        }
    }
}

// ONE TRIAL, NORMALIZED. ABSENT MEANS UNMEASURED, NEVER ZERO.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct TrialMetrics {
    pub execution_time: Option<f64>,
    pub iterations: Option<u64>,
}

#[derive(Clone, Copy)]
enum Field {
    Time(TimeUnit),
    Iterations,
}

// (PATTERN, FIELD). FIRST MATCH PER FIELD WINS, IN TABLE ORDER.
const PATTERNS: &[(&str, Field)] = &[
    (r"Total execution time:\s*([0-9]+(?:\.[0-9]*)?|\.[0-9]+)\s*ms", Field::Time(TimeUnit::Millis)),
    (r"Execution Time:\s*([0-9]+(?:\.[0-9]*)?|\.[0-9]+)\s*seconds", Field::Time(TimeUnit::Seconds)),
    (r"Converged at iteration\s+([0-9]+)", Field::Iterations),
    (r"Iterations till convergence:\s*([0-9]+)", Field::Iterations),
];

fn pattern_table() -> &'static [(Regex, Field)] {
    static TABLE: OnceLock<Vec<(Regex, Field)>> = OnceLock::new();
    TABLE.get_or_init(|| {
        PATTERNS
            .iter()
            .map(|(pat, field)| (Regex::new(pat).expect("metrics pattern is valid"), *field))
            .collect()
    })
}

pub fn parse_metrics(output: &str) -> RawMetrics {
    let mut out = RawMetrics::default();

    for (re, field) in pattern_table() {
        match field {
            Field::Time(unit) if out.time.is_none() => {
                out.time = capture(re, output)
                    .and_then(|s| s.parse::<f64>().ok())
                    .filter(|v| v.is_finite())
                    .map(|value| RawTime { value, unit: *unit });
            }
            Field::Iterations if out.iterations.is_none() => {
                out.iterations = capture(re, output).and_then(|s| s.parse::<u64>().ok());
            }
            _ => {}
        }
    }
    out
}

fn capture<'a>(re: &Regex, text: &'a str) -> Option<&'a str> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_table_compiles() {
        assert_eq!(pattern_table().len(), PATTERNS.len());
    }

    #[test]
    fn both_fields_extracted_verbatim() {
        let m = parse_metrics("Converged at iteration 42\nTotal execution time: 123.45 ms");
        assert_eq!(m.iterations, Some(42));
        assert_eq!(m.time, Some(RawTime { value: 123.45, unit: TimeUnit::Millis }));
    }

    #[test]
    fn seconds_backend_format() {
        let out = "Convergence reached at iteration 17.\n\nExecution Time: 0.482113 seconds\nIterations till convergence: 17\n";
        let m = parse_metrics(out);
        assert_eq!(m.time, Some(RawTime { value: 0.482113, unit: TimeUnit::Seconds }));
        assert_eq!(m.iterations, Some(17));
    }

    #[test]
    fn missing_iterations_keeps_time() {
        let m = parse_metrics("loading...\nTotal execution time: 88.5 ms\ndone");
        assert_eq!(m.iterations, None);
        assert_eq!(m.time.map(|t| t.value), Some(88.5));
    }

    #[test]
    fn missing_time_keeps_iterations() {
        let m = parse_metrics("Converged at iteration 9\nsegfault");
        assert_eq!(m.iterations, Some(9));
        assert_eq!(m.time, None);
    }

    #[test]
    fn noise_only_is_empty() {
        assert!(parse_metrics("").is_empty());
        assert!(parse_metrics("Error opening file: /nope\n").is_empty());
        assert!(parse_metrics("Total execution time: abc ms").is_empty());
    }

    #[test]
    fn first_match_wins() {
        let m = parse_metrics("Converged at iteration 3\nConverged at iteration 99");
        assert_eq!(m.iterations, Some(3));
    }

    #[test]
    fn normalize_converts_only_time() {
        let m = parse_metrics("Execution Time: 0.25 seconds\nIterations till convergence: 4");
        let t = m.normalize(TimeUnit::Millis);
        assert_eq!(t.execution_time, Some(250.0));
        assert_eq!(t.iterations, Some(4));
        assert_eq!(RawMetrics::default().normalize(TimeUnit::Millis), TrialMetrics::default());
    }

    #[test]
    fn unit_conversion() {
        assert_eq!(TimeUnit::Seconds.convert(1.5, TimeUnit::Millis), 1500.0);
        assert_eq!(TimeUnit::Millis.convert(250.0, TimeUnit::Seconds), 0.25);
        assert_eq!(TimeUnit::Millis.convert(7.0, TimeUnit::Millis), 7.0);
        assert_eq!("seconds".parse::<TimeUnit>(), Ok(TimeUnit::Seconds));
        assert!("hours".parse::<TimeUnit>().is_err());
    }
}
