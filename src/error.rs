// Fatal error kinds. Row- and request-level problems are never errors: they
// are logged and counted, and the run continues.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("locations CSV not found: {0}")]
    MissingLocations(PathBuf),

    #[error("no locations source given")]
    NoLocationsSource,

    #[error("{source_name} CSV missing required column(s): {}", columns.join(", "))]
    MissingColumns {
        source_name: &'static str,
        columns: Vec<String>,
    },
}

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("could not find {0}")]
    MissingInput(PathBuf),

    #[error("invalid JSON in {path}: {source}")]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
