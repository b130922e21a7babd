#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `cli` is the thin command-line front-end for deltasync. It parses the
//! command tree, resolves configuration from the environment, initialises
//! logging, and delegates to the engine:
//!
//! - `run <s3_prefix> <root_folder> [--once]`: the sync daemon, or a single
//!   pass with `--once`.
//! - `clear <all|remote|local> <s3_prefix> <root_folder>`: reset remote
//!   and/or local state.
//! - `rebuild-base <s3_prefix> <root_folder> <path>`: collapse the final
//!   delta of a file's chain into a fresh full base.
//! - `show-versions <bucket> <prefix>`: list latest object versions.
//!
//! # Errors
//!
//! Fatal initialisation or run errors print to stderr and exit non-zero;
//! a clean daemon shutdown and every completed utility exits zero.

mod commands;
mod config;
mod error;

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

pub use config::Config;
pub use error::CliError;

#[derive(Parser)]
#[command(
    name = "deltasyncd",
    about = "Versioned delta synchronization between a folder and an object store",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the sync daemon against a remote prefix and a local folder.
    Run {
        /// Remote prefix shared by all clients of this tree.
        s3_prefix: String,
        /// Local directory to synchronize.
        root_folder: PathBuf,
        /// Run a single sync pass and exit instead of looping.
        #[arg(long)]
        once: bool,
    },
    /// Delete sync state: remote objects, local files and bookkeeping, or
    /// both.
    Clear {
        /// Which side to clear.
        target: ClearTarget,
        /// Remote prefix to clear.
        s3_prefix: String,
        /// Local root folder to clear.
        root_folder: PathBuf,
    },
    /// Rebuild a full base for the latest version of one file.
    RebuildBase {
        /// Remote prefix shared by all clients of this tree.
        s3_prefix: String,
        /// Local directory being synchronized.
        root_folder: PathBuf,
        /// File (under the root folder) whose chain gets a fresh base.
        path: PathBuf,
    },
    /// List the latest version of every object under a prefix.
    ShowVersions {
        /// Bucket to list.
        bucket: String,
        /// Key prefix to list under.
        prefix: String,
    },
}

/// Sides that `clear` can reset.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum ClearTarget {
    /// Remote and local state.
    All,
    /// Remote objects only.
    Remote,
    /// Local files, database, and signature cache only.
    Local,
}

/// Parses arguments and runs the selected command, returning the process
/// status: `0` on success (including rendered help/version output), `1` on
/// any fatal error.
pub fn run<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => {
            // Clap renders its own help/version/usage output.
            let _ = err.print();
            return i32::from(err.use_stderr());
        }
    };

    init_logging();

    let result = match cli.command {
        Command::Run {
            s3_prefix,
            root_folder,
            once,
        } => commands::run_sync(&s3_prefix, &root_folder, once),
        Command::Clear {
            target,
            s3_prefix,
            root_folder,
        } => commands::clear(target, &s3_prefix, &root_folder),
        Command::RebuildBase {
            s3_prefix,
            root_folder,
            path,
        } => commands::rebuild_base(&s3_prefix, &root_folder, &path),
        Command::ShowVersions { bucket, prefix } => commands::show_versions(&bucket, &prefix),
    };

    match result {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("deltasyncd: {err}");
            1
        }
    }
}

/// Maps a [`run`] status onto the process exit code.
#[must_use]
pub fn exit_code_from(status: i32) -> ExitCode {
    if status == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
