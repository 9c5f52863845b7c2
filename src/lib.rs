// Location Resolver - Core Library
// Corporation/location import with identity resolution, plus the match-rate
// harness for merchant decision services. Used by the CLI, the server
// binary and the tests.

pub mod config;
pub mod diff;
pub mod entities;
pub mod error;
pub mod import;
pub mod match_rate;
pub mod parser;
pub mod resolver;
pub mod solution;
pub mod store;

// Re-export commonly used types
pub use config::{HarnessConfig, ImportOptions};
pub use entities::{Corporation, CorporationKey, Country, Location};
pub use error::{HarnessError, ImportError};
pub use import::{import_rows, run_import, ImportRun, RunCounters};
pub use match_rate::{
    check_match_rate, run_match_rate, DecisionService, HttpDecisionService, MatchReport,
    MerchantRequest, Outcome, TestRequest, TruthSet,
};
pub use resolver::{ExternalIdCache, MatchSource};
pub use solution::{propose_match, SolutionResponse};
pub use store::{RecordStore, SqliteStore, StagedStore};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log to stderr, filtered by `RUST_LOG` (default `location_resolver=info`).
/// Stdout is left to progress lines and summaries.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "location_resolver=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
