//! `Job`: an immutable value describing one job loaded from its
//! configuration directory.
//!
//! Reads `env`, `filename`, `jitter`, `queue`, `schedule`, and `notify` from
//! the job directory, each falling back to a default when the file is
//! absent. `enabled` has no dedicated on-disk file in the layout this reads
//! (see DESIGN.md for the `disabled`-marker decision).

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::env::Env;
use crate::error::Result;

pub const RESERVED_DEFAULTS_DIR: &str = "defaults";

const FILENAME_DEFAULT: &str = "script";
const SCHEDULE_DEFAULT: &str = "1d";
const JITTER_DEFAULT: &str = "";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyPolicy {
    Never,
    Always,
    OnError,
}

impl NotifyPolicy {
    pub fn parse(text: &str) -> NotifyPolicy {
        // Case-insensitive; hyphen or space accepted between "on" and "error".
        match text.trim().to_ascii_lowercase().replace(' ', "-").as_str() {
            "never" => NotifyPolicy::Never,
            "always" => NotifyPolicy::Always,
            _ => NotifyPolicy::OnError,
        }
    }

    fn default_value() -> NotifyPolicy {
        NotifyPolicy::OnError
    }
}

#[derive(Debug, Clone)]
pub struct Job {
    pub dir: PathBuf,
    pub name: String,
    pub filename: String,
    pub schedule: Duration,
    pub jitter: Duration,
    pub queue: String,
    pub notify: NotifyPolicy,
    pub env: Env,
    pub enabled: bool,
}

impl Job {
    /// Load a job from its configuration directory. Invalid durations fail
    /// here; the caller converts the error into a `JobResult::Error` for
    /// that job without aborting the session.
    pub fn load(job_dir: &Path, outer_env: Option<&Env>) -> Result<Job> {
        let name = job_name(job_dir);

        let filename = read_text_or_default(&job_dir.join("filename"), FILENAME_DEFAULT);
        let schedule_text = read_text_or_default(&job_dir.join("schedule"), SCHEDULE_DEFAULT);
        let jitter_text = read_text_or_default(&job_dir.join("jitter"), JITTER_DEFAULT);
        let queue = read_text_or_default(&job_dir.join("queue"), &name);
        let notify = match std::fs::read_to_string(job_dir.join("notify")) {
            Ok(text) => NotifyPolicy::parse(&text),
            Err(_) => NotifyPolicy::default_value(),
        };

        let schedule = crate::duration::parse(&schedule_text)?;
        let jitter = crate::duration::parse(&jitter_text)?;
        let env = crate::env::load_file(&job_dir.join("env"), outer_env)?;
        let enabled = !job_dir.join("disabled").exists();

        Ok(Job {
            dir: job_dir.to_path_buf(),
            name,
            filename,
            schedule,
            jitter,
            queue,
            notify,
            env,
            enabled,
        })
    }

    pub fn script_path(&self) -> PathBuf {
        self.dir.join(&self.filename)
    }
}

pub fn job_name(job_dir: &Path) -> String {
    job_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn read_text_or_default(path: &Path, default: &str) -> String {
    match std::fs::read_to_string(path) {
        Ok(text) => text.trim_end().to_string(),
        Err(_) => default.to_string(),
    }
}

/// List job directories under `config_root`, sorted by name, excluding the
/// reserved `defaults` directory and any non-directory entries.
pub fn available_job_dirs(config_root: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    if !config_root.exists() {
        return Ok(dirs);
    }
    for entry in std::fs::read_dir(config_root)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        if job_name(&path) == RESERVED_DEFAULTS_DIR {
            continue;
        }
        dirs.push(path);
    }
    dirs.sort();
    Ok(dirs)
}
