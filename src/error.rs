// CLUSTERBENCH ERROR TAXONOMY
// ONLY CONFIGURATION-LEVEL FAILURES ARE ERRORS. A TRIAL THAT TIMES OUT OR
// PRINTS GARBAGE IS A TrialReport OF THAT KIND, NEVER AN Err.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("executable not found: {0}")]
    ExecutableNotFound(PathBuf),

    #[error("not executable: {0}")]
    NotExecutable(PathBuf),

    #[error("failed to spawn {exe}: {source}")]
    Spawn {
        exe: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("dataset root unreadable: {path}: {source}")]
    DatasetRootUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("dataset has no structural attributes in name or header: {0}")]
    DatasetUnresolved(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("interrupted before the sweep completed")]
    Interrupted,
}

impl HarnessError {
    // TRUE FOR ERRORS THAT NAME AN UNAVAILABLE EXTERNAL RESOURCE
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ExecutableNotFound(_)
                | Self::NotExecutable(_)
                | Self::Spawn { .. }
                | Self::DatasetRootUnreadable { .. }
                | Self::DatasetUnresolved(_)
                | Self::InvalidConfig(_)
                | Self::Toml(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_are_classified() {
        assert!(HarnessError::ExecutableNotFound("./cuda".into()).is_configuration());
        assert!(HarnessError::DatasetUnresolved("x.txt".into()).is_configuration());
        assert!(!HarnessError::Interrupted.is_configuration());
        assert!(!HarnessError::Io(io::Error::other("disk")).is_configuration());
    }

    #[test]
    fn message_names_the_resource() {
        let e = HarnessError::ExecutableNotFound("./kmeans".into());
        assert_eq!(e.to_string(), "executable not found: ./kmeans");
    }
}
