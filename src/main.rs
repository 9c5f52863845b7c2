use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;

use location_resolver::config::{
    DEFAULT_BASE_URL, DEFAULT_CORPORATIONS_PATH, DEFAULT_DB_PATH, DEFAULT_LOCATIONS_PATH,
    DEFAULT_REQUESTS_PATH, DEFAULT_TIMEOUT_SECS, DEFAULT_TRUTH_SET_PATH,
};
use location_resolver::{check_match_rate, run_import, HarnessConfig, ImportOptions, SqliteStore};

#[derive(Parser)]
#[command(
    name = "location-resolver",
    version,
    about = "Import corporations and locations, and score merchant decision services"
)]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, env = "LOCATIONS_DB", default_value = DEFAULT_DB_PATH)]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load corporations and locations from CSV files
    LoadCsv {
        #[arg(long, default_value = DEFAULT_CORPORATIONS_PATH)]
        corporations: PathBuf,

        #[arg(long, default_value = DEFAULT_LOCATIONS_PATH)]
        locations: PathBuf,

        /// Create a corporation for locations whose owner cannot be resolved
        #[arg(long)]
        create_missing_corps: bool,

        /// Resolve and diff everything without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Replay recorded requests against a decision service and report the match rate
    CheckMatchRate {
        #[arg(long, default_value = DEFAULT_BASE_URL)]
        base_url: String,

        #[arg(long, default_value = DEFAULT_REQUESTS_PATH)]
        requests: PathBuf,

        #[arg(long, default_value = DEFAULT_TRUTH_SET_PATH)]
        truth_set: PathBuf,

        /// Per-request timeout
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
        timeout_secs: u64,
    },
}

fn main() {
    location_resolver::init_tracing();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("ERROR: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::LoadCsv {
            corporations,
            locations,
            create_missing_corps,
            dry_run,
        } => {
            let options = ImportOptions {
                create_missing_corporations: create_missing_corps,
                dry_run,
            };
            load_csv(&cli.db, &corporations, &locations, options)
        }
        Commands::CheckMatchRate {
            base_url,
            requests,
            truth_set,
            timeout_secs,
        } => {
            let config = HarnessConfig {
                base_url,
                requests_path: requests,
                truth_set_path: truth_set,
                timeout: Duration::from_secs(timeout_secs),
            };
            let report = check_match_rate(&config)?;
            report.print();
            Ok(())
        }
    }
}

fn load_csv(
    db: &Path,
    corporations: &Path,
    locations: &Path,
    options: ImportOptions,
) -> Result<()> {
    let mut store = if options.dry_run {
        SqliteStore::open_for_preview(db)?
    } else {
        SqliteStore::open(db)?
    };
    println!("📂 Loading CSV into {}", db.display());

    let counters = run_import(&mut store, Some(corporations), Some(locations), options)?;
    println!("{}", counters.summary(options.dry_run));

    println!(
        "✓ Store holds {} corporations, {} locations",
        store.corporation_count()?,
        store.location_count()?
    );
    Ok(())
}
