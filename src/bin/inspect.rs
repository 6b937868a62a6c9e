//! Inspect a written star schema: per-table row counts, partition layout and
//! sample rows in a human-readable format.
//!
//! ## Usage
//!
//! ```sh
//! cargo run --release --bin inspect -- --output-dir out/
//! cargo run --release --bin inspect -- --output-dir out/ --sample-rows 10
//! ```

use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use clap::Parser;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use walkdir::WalkDir;

use songplay_lake::config::DEFAULT_OUTPUT_ROOT;
use songplay_lake::table::TableKind;
use songplay_lake::writer::SUCCESS_MARKER;

#[derive(Parser, Debug)]
#[command(about = "Inspect the tables written by the etl binary")]
struct Args {
    /// Root the five table directories were written under.
    #[arg(long, default_value = DEFAULT_OUTPUT_ROOT)]
    output_dir: PathBuf,

    /// Number of sample rows to dump per table (0 to skip).
    #[arg(long, default_value_t = 5)]
    sample_rows: usize,
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// What was found on disk for one table.
struct TableScan {
    files: Vec<PathBuf>,
    partitions: BTreeSet<PathBuf>,
    rows: usize,
    complete: bool,
    sample: Vec<RecordBatch>,
    sample_partition: Option<PathBuf>,
}

fn scan_table(dir: &Path, sample_rows: usize) -> Result<TableScan, BoxError> {
    let mut scan = TableScan {
        files: Vec::new(),
        partitions: BTreeSet::new(),
        rows: 0,
        complete: dir.join(SUCCESS_MARKER).is_file(),
        sample: Vec::new(),
        sample_partition: None,
    };
    if !dir.is_dir() {
        return Ok(scan);
    }

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        let is_parquet = entry.file_type().is_file()
            && entry.path().extension().and_then(|e| e.to_str()) == Some("parquet");
        if is_parquet {
            scan.files.push(entry.into_path());
        }
    }

    for path in &scan.files {
        let relative_dir = path
            .parent()
            .and_then(|p| p.strip_prefix(dir).ok())
            .map(Path::to_path_buf)
            .unwrap_or_default();
        if !relative_dir.as_os_str().is_empty() {
            scan.partitions.insert(relative_dir.clone());
        }

        let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
        scan.rows += builder.metadata().file_metadata().num_rows() as usize;

        // Samples come from a single file so the partition shown with them is accurate.
        if sample_rows > 0 && scan.sample.is_empty() {
            let mut sampled = 0;
            for batch in builder.with_batch_size(sample_rows).build()? {
                let batch = batch?;
                let take = batch.num_rows().min(sample_rows - sampled);
                if take > 0 {
                    scan.sample.push(batch.slice(0, take));
                    sampled += take;
                }
                if sampled == sample_rows {
                    break;
                }
            }
            if sampled > 0 {
                scan.sample_partition = Some(relative_dir);
            }
        }
    }
    Ok(scan)
}

fn main() -> Result<(), BoxError> {
    let args = Args::parse();

    let mut scans = Vec::with_capacity(TableKind::ALL.len());
    for kind in TableKind::ALL {
        let dir = args.output_dir.join(kind.name());
        scans.push((kind, scan_table(&dir, args.sample_rows)?));
    }

    let total_rows: usize = scans.iter().map(|(_, s)| s.rows).sum();
    let total_files: usize = scans.iter().map(|(_, s)| s.files.len()).sum();
    let complete = scans.iter().filter(|(_, s)| s.complete).count();

    // ── Overview ──────────────────────────────────────────────────────────
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║  Output: {}", args.output_dir.display());
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  Tables:     {:>10} of {}", complete, TableKind::ALL.len());
    println!("║  Files:      {total_files:>10}");
    println!("║  Total rows: {total_rows:>10}");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    // ── Tables ────────────────────────────────────────────────────────────
    for (kind, scan) in &scans {
        println!("┌─ Table \"{}\"", kind.name());
        if scan.files.is_empty() && !scan.complete {
            println!("│  (not written)");
            println!("└──────────────────────────────────────────────────────────────");
            println!();
            continue;
        }

        let partition_by = kind.partition_columns();
        let status = if scan.complete { "complete" } else { "INCOMPLETE" };
        println!(
            "│  Rows: {}  Files: {}  Status: {status}",
            scan.rows,
            scan.files.len()
        );
        if partition_by.is_empty() {
            println!("│  Partitioned by: (none)");
        } else {
            println!(
                "│  Partitioned by: {}  ({} partitions)",
                partition_by.join(", "),
                scan.partitions.len()
            );
        }

        if !scan.sample.is_empty() {
            let shown: usize = scan.sample.iter().map(RecordBatch::num_rows).sum();
            println!("│");
            match scan.sample_partition.as_ref().filter(|p| !p.as_os_str().is_empty()) {
                Some(partition) => {
                    println!("│  Sample rows (first {shown} in {}):", partition.display())
                }
                None => println!("│  Sample rows (first {shown} of {}):", scan.rows),
            }
            for line in pretty_format_batches(&scan.sample)?.to_string().lines() {
                println!("│  {line}");
            }
        }
        println!("└──────────────────────────────────────────────────────────────");
        println!();
    }

    Ok(())
}
