//! crates/cli/src/config.rs
//!
//! Environment-driven configuration, resolved once at startup.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use engine::SessionConfig;

use crate::error::CliError;

const STORAGE_BUCKET: &str = "STORAGE_BUCKET";
const INTERNAL_BUCKET: &str = "INTERNAL_BUCKET";
const SYNC_METADATA_PREFIX: &str = "SYNC_METADATA_PREFIX";
const LOCAL_DB: &str = "LOCAL_DB";
const SIGNATURE_FOLDER: &str = "SIGNATURE_FOLDER";
const SYNC_INTERVAL_SECS: &str = "SYNC_INTERVAL_SECS";

const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(60);

/// Everything the commands need from the environment.
#[derive(Clone, Debug)]
pub struct Config {
    /// Bucket holding content blobs.
    pub storage_bucket: String,
    /// Bucket holding histories and entry metadata.
    pub internal_bucket: String,
    /// Sub-prefix for sync metadata under the session prefix.
    pub metadata_prefix: String,
    /// Path of the local sync-state database.
    pub local_db: PathBuf,
    /// Directory caching entry signatures.
    pub signature_folder: PathBuf,
    /// Delay between scheduled sync passes.
    pub sync_interval: Duration,
}

impl Config {
    /// Reads the configuration from the environment.
    pub fn from_env() -> Result<Self, CliError> {
        Ok(Self {
            storage_bucket: required(STORAGE_BUCKET)?,
            internal_bucket: required(INTERNAL_BUCKET)?,
            metadata_prefix: required(SYNC_METADATA_PREFIX)?,
            local_db: PathBuf::from(required(LOCAL_DB)?),
            signature_folder: PathBuf::from(required(SIGNATURE_FOLDER)?),
            sync_interval: interval_from_env()?,
        })
    }

    /// The engine-facing slice of this configuration.
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            storage_bucket: self.storage_bucket.clone(),
            internal_bucket: self.internal_bucket.clone(),
            metadata_prefix: self.metadata_prefix.clone(),
            signature_folder: self.signature_folder.clone(),
            sync_interval: self.sync_interval,
        }
    }
}

fn required(name: &'static str) -> Result<String, CliError> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(CliError::MissingEnv { name }),
    }
}

fn interval_from_env() -> Result<Duration, CliError> {
    match env::var(SYNC_INTERVAL_SECS) {
        Err(_) => Ok(DEFAULT_SYNC_INTERVAL),
        Ok(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| CliError::InvalidEnv {
                name: SYNC_INTERVAL_SECS,
                value: raw,
            }),
    }
}
