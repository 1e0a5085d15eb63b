//! Crate error type.
//!
//! Errors that occur while loading or running a single job never abort the
//! session: the session driver (`session::run_session`) catches them at the
//! per-job boundary and turns them into `JobResult::Error`. Only CLI-level
//! failures (unreadable config root, bad arguments) are allowed to terminate
//! the process; those are surfaced as `anyhow::Error` in `main.rs`/`cli.rs`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid duration: {0:?}")]
    InvalidDuration(String),

    #[error("can't parse env file line {0:?}")]
    EnvParseLine(String),

    #[error("can't substitute env variable: {0:?}")]
    EnvSubstitute(String),

    #[error("job directory not found: {}", .0.display())]
    JobDirMissing(PathBuf),

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
