//! The ETL entry point: raw song catalog + activity logs -> partitioned star schema.
//!
//! ## Steps
//!
//! 1. **Credentials** - read `[AWS]` keys from the config file. A missing file
//!    or key stops the run before any data is touched.
//! 2. **Load** - parse `song_data/` and `log-data/` under the input root.
//! 3. **Derive** - build the artists, songs, users, time and songplays tables.
//! 4. **Write** - stage every table as Hive-partitioned Parquet under the
//!    output root, then swap the staged tables into place.
//!
//! Set `RUST_LOG=debug` for per-file detail.

use std::path::PathBuf;

use clap::Parser;
use indicatif::{HumanCount, HumanDuration};
use tracing::{error, info};

use songplay_lake::config::{
    Credentials, DEFAULT_CONFIG_PATH, DEFAULT_INPUT_ROOT, DEFAULT_OUTPUT_ROOT, EtlConfig,
};
use songplay_lake::pipeline;
use songplay_lake::songplays::JoinPolicy;
use songplay_lake::source::DataSource;
use songplay_lake::writer::ParquetSink;

#[derive(Parser, Debug)]
#[command(about = "Build the songplays star schema from raw catalog and log data")]
struct Args {
    /// INI file holding the [AWS] credentials.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Root containing song_data/ and log-data/.
    #[arg(long, default_value = DEFAULT_INPUT_ROOT)]
    input: PathBuf,

    /// Root the five table directories are written under.
    #[arg(long, default_value = DEFAULT_OUTPUT_ROOT)]
    output: PathBuf,

    /// Match plays to catalog durations within this many seconds instead of exactly.
    #[arg(long)]
    duration_tolerance: Option<f64>,

    /// Hide progress bars.
    #[arg(long, default_value_t = false)]
    no_progress: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    // ── Step 1: Credentials ───────────────────────────────────────────────
    let credentials = match Credentials::from_file(&args.config) {
        Ok(credentials) => credentials,
        Err(e) => {
            error!("Cannot start: {e}");
            return Err(e.into());
        }
    };

    let join_policy = match args.duration_tolerance {
        Some(seconds) if seconds.is_finite() && seconds >= 0.0 => {
            JoinPolicy::DurationTolerance(seconds)
        }
        Some(seconds) => {
            return Err(format!("--duration-tolerance must be a non-negative number, got {seconds}").into());
        }
        None => JoinPolicy::Exact,
    };

    let config = EtlConfig::new(credentials)
        .with_input_root(&args.input)
        .with_output_root(&args.output)
        .with_join_policy(join_policy);

    info!("Config:   {}", args.config.display());
    info!("Input:    {}", config.input_root.display());
    info!("Output:   {}", config.output_root.display());
    info!("Key id:   {}", config.credentials.redacted_key_id());
    info!("Join:     {:?}", config.join_policy);

    let pipeline_start = std::time::Instant::now();

    // ── Steps 2-4: Load, derive, write ────────────────────────────────────
    let source = DataSource::new(&config.input_root, config.credentials.clone())?
        .with_progress(!args.no_progress);
    let mut sink = ParquetSink::new(&config.output_root)?;
    let summary = match pipeline::run(&config, &source, &mut sink) {
        Ok(summary) => summary,
        Err(e) => {
            error!("Run failed: {e}");
            return Err(e.into());
        }
    };

    let elapsed = pipeline_start.elapsed();
    info!("ETL complete in {}!", HumanDuration(elapsed));
    info!(
        "  Catalog entries: {}",
        HumanCount(summary.catalog_entries as u64)
    );
    info!(
        "  Log events:      {} ({} song plays, {} unmatched)",
        HumanCount(summary.log_events as u64),
        HumanCount(summary.play_events as u64),
        HumanCount(summary.unmatched_plays as u64)
    );
    for table in &summary.tables {
        info!(
            "  {:<10} {:>10} rows in {} files",
            table.table,
            HumanCount(table.rows as u64).to_string(),
            table.files
        );
    }

    Ok(())
}
