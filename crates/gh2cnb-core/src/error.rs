use std::path::PathBuf;
use thiserror::Error;

/// Failures a conversion can surface to the caller.
///
/// Everything else (unknown `needs` references, unsupported triggers,
/// dangling aliases, steps with neither `uses` nor `run`) degrades to a
/// documented default and is reported through `Conversion::warnings`.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Failed to parse workflow: {0}")]
    Parse(String),

    #[error("Failed to expand YAML anchors: {0}")]
    Expansion(String),

    #[error("Dependency cycle detected between jobs: {}", .0.join(" -> "))]
    CycleDetected(Vec<String>),

    #[error("Failed to read workflow file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConvertError>;
