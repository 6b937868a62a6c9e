//! Run configuration.
//!
//! Credentials come from an INI file with an `[AWS]` section:
//!
//! ```ini
//! [AWS]
//! AWS_ACCESS_KEY_ID=AKIA...
//! AWS_SECRET_ACCESS_KEY=...
//! ```
//!
//! They are loaded once at startup and handed to the components that need
//! them; nothing reads credentials from the process environment.

use std::fmt;
use std::path::{Path, PathBuf};

use config::{Config, File, FileFormat};

use crate::error::{EtlError, Result};
use crate::songplays::JoinPolicy;

pub const DEFAULT_CONFIG_PATH: &str = "dl.cfg";
pub const DEFAULT_INPUT_ROOT: &str = "data/";
pub const DEFAULT_OUTPUT_ROOT: &str = "out/";

const CREDENTIALS_SECTION: &str = "AWS";
const ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
const SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";

// ============================================================================
// Credentials
// ============================================================================

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    access_key_id: String,
    secret_access_key: String,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }

    /// Load credentials from an INI file. A missing file, section or key (or
    /// an empty value) is reported as [`EtlError::MissingCredentials`].
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(EtlError::MissingCredentials(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let cfg = Config::builder()
            .add_source(File::from(path).format(FileFormat::Ini))
            .build()?;
        Ok(Self {
            access_key_id: lookup(&cfg, ACCESS_KEY_ID)?,
            secret_access_key: lookup(&cfg, SECRET_ACCESS_KEY)?,
        })
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    /// The access key id with all but its last four characters masked.
    pub fn redacted_key_id(&self) -> String {
        let visible: String = {
            let chars: Vec<char> = self.access_key_id.chars().collect();
            chars[chars.len().saturating_sub(4)..].iter().collect()
        };
        format!("****{visible}")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.redacted_key_id())
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Key lookup that tolerates the parser normalizing key case.
fn lookup(cfg: &Config, key: &str) -> Result<String> {
    let exact = format!("{CREDENTIALS_SECTION}.{key}");
    let value = cfg
        .get_string(&exact)
        .or_else(|_| cfg.get_string(&exact.to_lowercase()))
        .map_err(|_| {
            EtlError::MissingCredentials(format!("[{CREDENTIALS_SECTION}] {key} is not set"))
        })?;
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(EtlError::MissingCredentials(format!(
            "[{CREDENTIALS_SECTION}] {key} is empty"
        )));
    }
    Ok(value)
}

// ============================================================================
// EtlConfig
// ============================================================================

/// Everything a run needs, built once by the entry point.
#[derive(Debug, Clone)]
pub struct EtlConfig {
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    pub credentials: Credentials,
    pub join_policy: JoinPolicy,
}

impl EtlConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            input_root: PathBuf::from(DEFAULT_INPUT_ROOT),
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            credentials,
            join_policy: JoinPolicy::default(),
        }
    }

    pub fn with_input_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.input_root = root.into();
        self
    }

    pub fn with_output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = root.into();
        self
    }

    pub fn with_join_policy(mut self, policy: JoinPolicy) -> Self {
        self.join_policy = policy;
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_cfg(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dl.cfg");
        fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_load_credentials() {
        let (_dir, path) = write_cfg(
            "[AWS]\nAWS_ACCESS_KEY_ID=AKIAEXAMPLE1234\nAWS_SECRET_ACCESS_KEY=s3cr3t\n",
        );
        let creds = Credentials::from_file(&path).unwrap();
        assert_eq!(creds.access_key_id(), "AKIAEXAMPLE1234");
        assert_eq!(creds.secret_access_key(), "s3cr3t");
    }

    #[test]
    fn test_missing_file_is_missing_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let err = Credentials::from_file(&dir.path().join("nope.cfg")).unwrap_err();
        assert!(matches!(err, EtlError::MissingCredentials(_)));
        assert!(err.is_startup_failure());
    }

    #[test]
    fn test_missing_key_is_missing_credentials() {
        let (_dir, path) = write_cfg("[AWS]\nAWS_ACCESS_KEY_ID=AKIAEXAMPLE1234\n");
        let err = Credentials::from_file(&path).unwrap_err();
        assert!(matches!(err, EtlError::MissingCredentials(ref m) if m.contains(SECRET_ACCESS_KEY)));
    }

    #[test]
    fn test_empty_value_is_missing_credentials() {
        let (_dir, path) =
            write_cfg("[AWS]\nAWS_ACCESS_KEY_ID=\nAWS_SECRET_ACCESS_KEY=s3cr3t\n");
        let err = Credentials::from_file(&path).unwrap_err();
        assert!(matches!(err, EtlError::MissingCredentials(_)));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let creds = Credentials::new("AKIAEXAMPLE1234", "s3cr3t");
        let shown = format!("{creds:?}");
        assert!(!shown.contains("s3cr3t"));
        assert!(!shown.contains("AKIAEXAMPLE"));
        assert!(shown.contains("****1234"));
    }

    #[test]
    fn test_config_defaults_and_overrides() {
        let cfg = EtlConfig::new(Credentials::new("a", "b"))
            .with_input_root("in")
            .with_join_policy(JoinPolicy::DurationTolerance(0.01));
        assert_eq!(cfg.input_root, PathBuf::from("in"));
        assert_eq!(cfg.output_root, PathBuf::from(DEFAULT_OUTPUT_ROOT));
        assert_eq!(cfg.join_policy, JoinPolicy::DurationTolerance(0.01));
    }
}
