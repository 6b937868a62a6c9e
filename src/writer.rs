//! Partitioned table output.
//!
//! ## Layout
//!
//! ```text
//! <output_root>/
//!   artists/part-00000.parquet
//!   songs/year=1998/artist_id=AR1/part-00000.parquet
//!   time/year=2018/month=11/part-00000.parquet
//!   ...
//!   <table>/_SUCCESS
//! ```
//!
//! Partition directories are Hive-style `column=value`; partition columns are
//! not repeated inside the files. A null or empty partition value is written
//! as [`DEFAULT_PARTITION`].
//!
//! Tables are staged under `<output_root>/_temporary/` and only swapped into
//! place by [`TableSink::commit`], which replaces any previous output. A run
//! that fails before commit leaves the previous output untouched.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use arrow::array::{Array, ArrayRef, UInt32Array};
use arrow::compute::take_record_batch;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use arrow::util::display::array_value_to_string;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::table::Table;

pub const STAGING_DIR: &str = "_temporary";
pub const SUCCESS_MARKER: &str = "_SUCCESS";
pub const DEFAULT_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    pub table: &'static str,
    pub rows: usize,
    /// Distinct partition directories (0 for unpartitioned tables).
    pub partitions: usize,
    pub files: usize,
}

/// Terminal sink for the derived tables.
pub trait TableSink {
    fn write_table(&mut self, table: &Table) -> Result<WriteSummary>;

    /// Publish every table written so far, replacing prior output.
    fn commit(&mut self) -> Result<()>;
}

// ============================================================================
// Partitioning
// ============================================================================

/// Row indices grouped by partition directory path (one `col=value` segment
/// per partition column). Groups are ordered by path.
pub fn partition_rows(
    batch: &RecordBatch,
    columns: &[&str],
) -> Result<BTreeMap<Vec<String>, Vec<u32>>> {
    let arrays: Vec<&ArrayRef> = columns
        .iter()
        .map(|c| {
            batch
                .column_by_name(c)
                .ok_or_else(|| ArrowError::SchemaError(format!("missing partition column {c}")))
        })
        .collect::<std::result::Result<_, _>>()?;

    let mut groups: BTreeMap<Vec<String>, Vec<u32>> = BTreeMap::new();
    for row in 0..batch.num_rows() {
        let mut key = Vec::with_capacity(columns.len());
        for (col, array) in columns.iter().zip(&arrays) {
            let value = if array.is_null(row) {
                DEFAULT_PARTITION.to_string()
            } else {
                let text = array_value_to_string(array, row)?;
                if text.is_empty() {
                    DEFAULT_PARTITION.to_string()
                } else {
                    escape_partition_value(&text)
                }
            };
            key.push(format!("{col}={value}"));
        }
        groups.entry(key).or_default().push(row as u32);
    }
    Ok(groups)
}

/// Percent-encode the characters Hive does not allow in partition paths.
pub fn escape_partition_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        let escape = matches!(
            c,
            '\u{01}'..='\u{1F}'
                | '"'
                | '#'
                | '%'
                | '\''
                | '*'
                | '/'
                | ':'
                | '='
                | '?'
                | '\\'
                | '\u{7F}'
                | '{'
                | '['
                | ']'
                | '^'
        );
        if escape {
            let _ = write!(out, "%{:02X}", c as u32);
        } else {
            out.push(c);
        }
    }
    out
}

/// The batch without its partition columns.
fn data_columns(batch: &RecordBatch, partition_columns: &[&str]) -> Result<RecordBatch> {
    let keep: Vec<usize> = batch
        .schema()
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, f)| !partition_columns.contains(&f.name().as_str()))
        .map(|(i, _)| i)
        .collect();
    Ok(batch.project(&keep)?)
}

fn part_file_name(ordinal: usize) -> String {
    format!("part-{ordinal:05}.parquet")
}

// ============================================================================
// Parquet sink
// ============================================================================

pub struct ParquetSink {
    output_root: PathBuf,
    staging_root: PathBuf,
    staged: Vec<&'static str>,
    props: WriterProperties,
}

impl ParquetSink {
    /// Prepare a sink under `output_root`, clearing any stale staging area
    /// left by an earlier failed run.
    pub fn new(output_root: impl Into<PathBuf>) -> Result<Self> {
        let output_root = output_root.into();
        let staging_root = output_root.join(STAGING_DIR);
        if staging_root.exists() {
            warn!("Removing stale staging dir {}", staging_root.display());
            fs::remove_dir_all(&staging_root)?;
        }
        fs::create_dir_all(&staging_root)?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .set_created_by(format!("songplay-lake {}", env!("CARGO_PKG_VERSION")))
            .build();
        Ok(Self {
            output_root,
            staging_root,
            staged: Vec::new(),
            props,
        })
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    fn write_file(&self, path: &Path, batch: &RecordBatch) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(self.props.clone()))?;
        writer.write(batch)?;
        writer.close()?;
        Ok(())
    }
}

impl TableSink for ParquetSink {
    fn write_table(&mut self, table: &Table) -> Result<WriteSummary> {
        let table_dir = self.staging_root.join(table.name());
        if table_dir.exists() {
            fs::remove_dir_all(&table_dir)?;
        }
        fs::create_dir_all(&table_dir)?;

        let columns = table.kind.partition_columns();
        let mut summary = WriteSummary {
            table: table.name(),
            rows: table.num_rows(),
            partitions: 0,
            files: 0,
        };

        if columns.is_empty() {
            self.write_file(&table_dir.join(part_file_name(0)), &table.batch)?;
            summary.files = 1;
        } else {
            let groups = partition_rows(&table.batch, columns)?;
            let data = data_columns(&table.batch, columns)?;
            for (ordinal, (segments, rows)) in groups.iter().enumerate() {
                let dir = segments.iter().fold(table_dir.clone(), |d, s| d.join(s));
                fs::create_dir_all(&dir)?;
                let indices = UInt32Array::from(rows.clone());
                let part = take_record_batch(&data, &indices)?;
                self.write_file(&dir.join(part_file_name(ordinal)), &part)?;
            }
            summary.partitions = groups.len();
            summary.files = groups.len();
        }

        File::create(table_dir.join(SUCCESS_MARKER))?;
        if !self.staged.contains(&table.name()) {
            self.staged.push(table.name());
        }
        debug!(
            "Staged {}: {} rows, {} partitions, {} files",
            summary.table, summary.rows, summary.partitions, summary.files
        );
        Ok(summary)
    }

    fn commit(&mut self) -> Result<()> {
        for name in self.staged.drain(..) {
            let target = self.output_root.join(name);
            if target.exists() {
                fs::remove_dir_all(&target)?;
            }
            fs::rename(self.staging_root.join(name), &target)?;
            info!("  Published {}", target.display());
        }
        fs::remove_dir_all(&self.staging_root)?;
        Ok(())
    }
}

// ============================================================================
// In-memory sink
// ============================================================================

/// Collects tables in memory. Used where the data should not hit disk.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub tables: Vec<Table>,
    pub committed: bool,
}

impl MemorySink {
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name() == name)
    }
}

impl TableSink for MemorySink {
    fn write_table(&mut self, table: &Table) -> Result<WriteSummary> {
        let columns = table.kind.partition_columns();
        let partitions = if columns.is_empty() {
            0
        } else {
            partition_rows(&table.batch, columns)?.len()
        };
        self.tables.retain(|t| t.kind != table.kind);
        self.tables.push(table.clone());
        Ok(WriteSummary {
            table: table.name(),
            rows: table.num_rows(),
            partitions,
            files: partitions.max(1),
        })
    }

    fn commit(&mut self) -> Result<()> {
        self.committed = true;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
