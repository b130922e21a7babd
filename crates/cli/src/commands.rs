//! crates/cli/src/commands.rs
//!
//! The four commands, each wiring configuration and backends into the
//! engine.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use engine::session::Session;
use engine::worker::SyncWorker;
use localdb::LocalDb;
use remote::{ObjectStore, S3Store};
use tracing::info;

use crate::config::Config;
use crate::error::CliError;
use crate::ClearTarget;

type CliResult = Result<(), CliError>;

fn open_session(config: &Config, s3_prefix: &str, root_folder: &Path) -> Result<Session, CliError> {
    let store: Arc<dyn ObjectStore> = Arc::new(S3Store::new()?);
    let db = LocalDb::open(&config.local_db)?;
    Ok(Session::create(
        config.session_config(),
        s3_prefix,
        root_folder,
        store,
        db,
    )?)
}

/// `run`: the daemon loop, or a single pass with `--once`.
pub(crate) fn run_sync(s3_prefix: &str, root_folder: &Path, once: bool) -> CliResult {
    let config = Config::from_env()?;
    let session = open_session(&config, s3_prefix, root_folder)?;
    let mut worker = SyncWorker::new(session);

    if once {
        worker.run_once()?;
    } else {
        info!(
            prefix = s3_prefix,
            root = %root_folder.display(),
            "starting sync daemon"
        );
        worker.run()?;
    }
    Ok(())
}

/// `clear`: reset remote and/or local state.
pub(crate) fn clear(target: ClearTarget, s3_prefix: &str, root_folder: &Path) -> CliResult {
    let config = Config::from_env()?;
    match target {
        ClearTarget::All => {
            clear_remote(&config, s3_prefix)?;
            clear_local(&config, root_folder)
        }
        ClearTarget::Remote => clear_remote(&config, s3_prefix),
        ClearTarget::Local => clear_local(&config, root_folder),
    }
}

fn clear_remote(config: &Config, s3_prefix: &str) -> CliResult {
    let store = S3Store::new()?;
    let content = store.purge_prefix(&config.storage_bucket, s3_prefix)?;
    let metadata = store.purge_prefix(
        &config.internal_bucket,
        &format!("{s3_prefix}/{}", config.metadata_prefix),
    )?;
    info!(
        content_versions = content,
        metadata_versions = metadata,
        "remote state cleared"
    );
    Ok(())
}

fn clear_local(config: &Config, root_folder: &Path) -> CliResult {
    if root_folder.exists() {
        fs::remove_dir_all(root_folder)?;
    }
    fs::create_dir_all(root_folder)?;

    if config.local_db.exists() {
        fs::remove_file(&config.local_db)?;
    }
    if config.signature_folder.exists() {
        fs::remove_dir_all(&config.signature_folder)?;
    }
    info!(root = %root_folder.display(), "local state cleared");
    Ok(())
}

/// `rebuild-base`: collapse the final delta of one file's chain into a
/// fresh full base.
pub(crate) fn rebuild_base(s3_prefix: &str, root_folder: &Path, path: &Path) -> CliResult {
    let config = Config::from_env()?;
    let session = open_session(&config, s3_prefix, root_folder)?;
    let absolute = path.canonicalize()?;
    engine::rebuild::create_full_version(&session, &absolute)?;
    Ok(())
}

/// `show-versions`: print the latest version of every object under a
/// prefix.
pub(crate) fn show_versions(bucket: &str, prefix: &str) -> CliResult {
    let store = S3Store::new()?;
    for record in store.list_latest_versions(bucket, prefix)? {
        let timestamp = record
            .last_modified
            .map_or_else(|| "-".to_owned(), |t| t.to_rfc3339());
        println!(
            "{}\t{}\t{}\t{}\t{}",
            record.key, record.version_id, record.size, record.etag, timestamp
        );
    }
    Ok(())
}
