// CLUSTERBENCH DATASET DESCRIPTORS
// A DATASET IS IDENTIFIED BY ITS STRUCTURAL ATTRIBUTES: POINTS, DIMENSIONS, CLUSTERS.
// TWO SOURCES, TRIED IN ORDER:
//   1. NAME:   dataset_<points>_<dimensions>_<clusters>.<ext>
//   2. HEADER: FIRST LINE OF THE FILE HOLDS THREE WHITESPACE-SEPARATED INTEGERS
// A REFERENCE THAT RESOLVES THROUGH NEITHER IS NOT A DATASET. NOTHING IS FABRICATED.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use flate2::read::GzDecoder;
use regex::Regex;
use serde::Serialize;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Source {
    Name,
    Header,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct DatasetDescriptor {
    pub file_name: String,
    #[serde(skip)]
    pub path: PathBuf,
    pub num_points: u64,
    pub dimensions: u64,
    pub num_clusters: u64,
}

impl DatasetDescriptor {
    // RESOLVE `reference` (RELATIVE TO `root` UNLESS ABSOLUTE). NAME FIRST, THEN HEADER.
    pub fn resolve(root: &Path, reference: &str) -> Option<(Self, Source)> {
        let path = root.join(reference);
        if let Some(d) = Self::from_name(&path) {
            return Some((d, Source::Name));
        }
        Self::from_header(&path).map(|d| (d, Source::Header))
    }

    pub fn from_name(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?;
        let caps = name_pattern().captures(file_name)?;
        let dims = [
            caps.get(1)?.as_str(),
            caps.get(2)?.as_str(),
            caps.get(3)?.as_str(),
        ];
        Self::build(path, dims)
    }

    pub fn from_header(path: &Path) -> Option<Self> {
        let line = read_first_line(path)?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 3 {
            return None;
        }
        Self::build(path, [fields[0], fields[1], fields[2]])
    }

    fn build(path: &Path, fields: [&str; 3]) -> Option<Self> {
        let mut vals = [0u64; 3];
        for (slot, raw) in vals.iter_mut().zip(fields) {
            *slot = raw.parse::<u64>().ok().filter(|&v| v > 0)?;
        }
        Some(Self {
            file_name: path.file_name()?.to_string_lossy().into_owned(),
            path: path.to_path_buf(),
            num_points: vals[0],
            dimensions: vals[1],
            num_clusters: vals[2],
        })
    }

    pub fn shape(&self) -> String {
        format!("{}x{} k={}", self.num_points, self.dimensions, self.num_clusters)
    }
}

fn name_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^dataset_([0-9]+)_([0-9]+)_([0-9]+)\.[A-Za-z0-9.]+$")
            .expect("dataset name pattern is valid")
    })
}

// READ ONLY THE HEADER LINE. DATASETS CAN BE HUNDREDS OF MB.
fn read_first_line(path: &Path) -> Option<String> {
    let file = File::open(path).ok()?;
    let reader: Box<dyn Read> = if path.extension().is_some_and(|e| e == "gz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    let mut line = String::new();
    BufReader::new(reader).read_line(&mut line).ok()?;
    Some(line)
}
