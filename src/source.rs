//! Raw record discovery and parsing.
//!
//! ## Input layout
//!
//! - `<input_root>/song_data/*/*/*/*.json`: catalog, one track per record
//! - `<input_root>/log-data/**/*.json`: log events, one file per batch
//!
//! Files hold line-delimited JSON objects; blank lines are skipped. Files are
//! parsed in parallel and concatenated in sorted path order, so the record
//! order (and with it the first-seen dedup survivors) is deterministic.

use std::fs;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::common::{CatalogEntry, LogEvent};
use crate::config::Credentials;
use crate::error::{EtlError, Result};

pub const SONG_DATA_DIR: &str = "song_data";
pub const LOG_DATA_DIR: &str = "log-data";
const RECORD_EXTENSION: &str = "json";

/// Catalog files sit exactly this many directory levels below `song_data/`.
const CATALOG_DEPTH: usize = 4;

const REMOTE_SCHEMES: [&str; 4] = ["s3://", "s3a://", "s3n://", "gs://"];

/// Read access to the two input collections under one root.
pub struct DataSource {
    root: PathBuf,
    credentials: Credentials,
    show_progress: bool,
}

impl DataSource {
    /// Remote object-store roots are rejected: only local paths are readable.
    pub fn new(root: impl Into<PathBuf>, credentials: Credentials) -> Result<Self> {
        let root = root.into();
        let text = root.to_string_lossy();
        if REMOTE_SCHEMES.iter().any(|scheme| text.starts_with(scheme)) {
            return Err(EtlError::UnsupportedLocation(text.into_owned()));
        }
        debug!(
            "Data source {} (access key {})",
            root.display(),
            credentials.redacted_key_id()
        );
        Ok(Self {
            root,
            credentials,
            show_progress: false,
        })
    }

    /// Show a progress bar while files are parsed.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn catalog_files(&self) -> Result<Vec<PathBuf>> {
        find_record_files(
            &self.root.join(SONG_DATA_DIR),
            CATALOG_DEPTH,
            CATALOG_DEPTH,
        )
    }

    pub fn log_files(&self) -> Result<Vec<PathBuf>> {
        find_record_files(&self.root.join(LOG_DATA_DIR), 1, usize::MAX)
    }

    pub fn read_catalog(&self) -> Result<Vec<CatalogEntry>> {
        let files = self.catalog_files()?;
        info!("  Reading {} catalog files", files.len());
        read_records(&files, self.progress_bar("Catalog", files.len()))
    }

    pub fn read_log_events(&self) -> Result<Vec<LogEvent>> {
        let files = self.log_files()?;
        info!("  Reading {} log files", files.len());
        read_records(&files, self.progress_bar("Logs", files.len()))
    }

    fn progress_bar(&self, label: &str, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        let template =
            format!("  {label:<10} {{bar:40.cyan/blue}} {{pos}}/{{len}} files [{{elapsed_precise}}]");
        if let Ok(style) = ProgressStyle::with_template(&template) {
            pb.set_style(style.progress_chars("##-"));
        }
        pb
    }
}

/// `.json` files between `min_depth` and `max_depth` levels below `dir`,
/// sorted by path. A missing directory is an error; an empty one is not.
pub fn find_record_files(dir: &Path, min_depth: usize, max_depth: usize) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(EtlError::MissingInput(dir.display().to_string()));
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(min_depth)
        .max_depth(max_depth)
        .sort_by_file_name()
    {
        let entry = entry?;
        let is_record = entry.file_type().is_file()
            && entry.path().extension().and_then(|e| e.to_str()) == Some(RECORD_EXTENSION);
        if is_record {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Parse every file in parallel, keeping file order.
fn read_records<T>(files: &[PathBuf], pb: ProgressBar) -> Result<Vec<T>>
where
    T: DeserializeOwned + Send,
{
    let per_file: Vec<Vec<T>> = files
        .par_iter()
        .map(|path| {
            let text = fs::read_to_string(path)?;
            let records = parse_json_lines(path, &text);
            pb.inc(1);
            records
        })
        .collect::<Result<_>>()?;
    pb.finish_and_clear();
    Ok(per_file.into_iter().flatten().collect())
}

/// Parse line-delimited JSON. The first bad line aborts with its 1-based
/// line number.
pub fn parse_json_lines<T: DeserializeOwned>(path: &Path, text: &str) -> Result<Vec<T>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|source| EtlError::MalformedRecord {
                path: path.display().to_string(),
                line: i + 1,
                source,
            })
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials::new("AKIAEXAMPLE1234", "s3cr3t")
    }

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_parse_json_lines_skips_blank_lines() {
        let text = "{\"page\":\"NextSong\"}\n\n  \n{\"page\":\"Home\"}\n";
        let events: Vec<LogEvent> = parse_json_lines(Path::new("x.json"), text).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].page.as_deref(), Some("Home"));
    }

    #[test]
    fn test_malformed_line_reports_location() {
        let text = "{\"page\":\"NextSong\"}\n{\"page\": \n";
        let err = parse_json_lines::<LogEvent>(Path::new("events.json"), text).unwrap_err();
        match err {
            EtlError::MalformedRecord { path, line, .. } => {
                assert_eq!(path, "events.json");
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_remote_root_is_rejected() {
        let err = DataSource::new("s3a://udacity-dend/", creds()).err().unwrap();
        assert!(matches!(err, EtlError::UnsupportedLocation(_)));
    }

    #[test]
    fn test_catalog_files_respect_depth() {
        let dir = tempfile::tempdir().unwrap();
        let song_data = dir.path().join(SONG_DATA_DIR);
        write(&song_data.join("A/B/C/TRABCEI128F424C983.json"), "{}");
        write(&song_data.join("A/B/D/TRABDEI128F424C983.json"), "{}");
        write(&song_data.join("A/B/too_shallow.json"), "{}");
        write(&song_data.join("A/B/C/notes.txt"), "");

        let source = DataSource::new(dir.path(), creds()).unwrap();
        let files = source.catalog_files().unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("A/B/C/TRABCEI128F424C983.json"));
        assert!(files[1].ends_with("A/B/D/TRABDEI128F424C983.json"));
    }

    #[test]
    fn test_read_log_events_in_path_order() {
        let dir = tempfile::tempdir().unwrap();
        let log_data = dir.path().join(LOG_DATA_DIR);
        write(
            &log_data.join("2018/11/2018-11-02-events.json"),
            "{\"page\":\"NextSong\",\"userId\":\"3\"}\n",
        );
        write(
            &log_data.join("2018/11/2018-11-01-events.json"),
            "{\"page\":\"NextSong\",\"userId\":\"1\"}\n{\"page\":\"Home\",\"userId\":\"2\"}\n",
        );

        let source = DataSource::new(dir.path(), creds()).unwrap();
        let events = source.read_log_events().unwrap();
        let ids: Vec<_> = events.iter().map(|e| e.user_id.as_deref()).collect();
        assert_eq!(ids, vec![Some("1"), Some("2"), Some("3")]);
    }

    #[test]
    fn test_missing_input_dirs_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let source = DataSource::new(dir.path(), creds()).unwrap();
        let err = source.read_catalog().unwrap_err();
        assert!(matches!(err, EtlError::MissingInput(ref p) if p.ends_with(SONG_DATA_DIR)));
        let err = source.read_log_events().unwrap_err();
        assert!(matches!(err, EtlError::MissingInput(ref p) if p.ends_with("log-data")));
    }

    #[test]
    fn test_empty_input_dir_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(LOG_DATA_DIR)).unwrap();
        let source = DataSource::new(dir.path(), creds()).unwrap();
        assert!(source.read_log_events().unwrap().is_empty());
    }

    #[test]
    fn test_log_events_read_from_hyphenated_dir() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("log-data/2018/11/2018-11-01-events.json"),
            "{\"page\":\"NextSong\",\"userId\":\"7\"}\n",
        );
        write(&dir.path().join("log_data/2018/11/ignored.json"), "{\"page\":\"Home\"}\n");
        let source = DataSource::new(dir.path(), creds()).unwrap();
        let events = source.read_log_events().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].user_id.as_deref(), Some("7"));
    }
}
