use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DB_PATH: &str = "data/locations.db";
pub const DEFAULT_CORPORATIONS_PATH: &str = "data/corporations.csv";
pub const DEFAULT_LOCATIONS_PATH: &str = "data/locations.csv";
pub const DEFAULT_REQUESTS_PATH: &str = "data/requests.json";
pub const DEFAULT_TRUTH_SET_PATH: &str = "data/truth_set.json";
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Switches for one import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Create a corporation for location rows whose owner cannot be resolved
    pub create_missing_corporations: bool,

    /// Resolve and diff everything, persist nothing
    pub dry_run: bool,
}

/// Inputs and transport settings for a match-rate run.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub base_url: String,
    pub requests_path: PathBuf,
    pub truth_set_path: PathBuf,
    pub timeout: Duration,
}

impl HarnessConfig {
    /// Endpoint the requests are posted to
    pub fn solution_url(&self) -> String {
        format!("{}/solution/", self.base_url.trim_end_matches('/'))
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        HarnessConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            requests_path: PathBuf::from(DEFAULT_REQUESTS_PATH),
            truth_set_path: PathBuf::from(DEFAULT_TRUTH_SET_PATH),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}
