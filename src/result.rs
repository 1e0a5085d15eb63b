//! `JobResult`: the tagged sum every job execution collapses into, and
//! `Log`, a value wrapper around a captured log file.
//!
//! Modeled as an enum, never inheritance: consumers pattern-match.

use std::time::SystemTime;

/// Captured lines from one of `stdout.log` / `stderr.log`, loaded on demand.
#[derive(Debug, Clone, Default)]
pub struct Log {
    pub filename: String,
    pub modified: Option<SystemTime>,
    pub lines: Vec<String>,
}

impl Log {
    pub fn load(path: &std::path::Path) -> Log {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok();
        let lines = std::fs::read_to_string(path)
            .map(|text| text.lines().map(str::to_string).collect())
            .unwrap_or_default();
        Log {
            filename,
            modified,
            lines,
        }
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

#[derive(Debug, Clone)]
pub enum JobResult {
    Completed {
        name: String,
        exit_status: i32,
        stdout: Log,
        stderr: Log,
    },
    Error {
        name: String,
        message: String,
        log: String,
    },
    Locked {
        name: String,
    },
    Skipped {
        name: String,
    },
}

impl JobResult {
    pub fn name(&self) -> &str {
        match self {
            JobResult::Completed { name, .. } => name,
            JobResult::Error { name, .. } => name,
            JobResult::Locked { name } => name,
            JobResult::Skipped { name } => name,
        }
    }
}
