//! Command-line front-end: a thin wrapper around the core for the
//! `list` / `run due` / `run now` / `status` subcommands. Argument parsing
//! uses `clap`'s derive macros.

use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;

use crate::config::Config;
use crate::job::{self, Job};
use crate::paths;
use crate::result::JobResult;
use crate::session;

#[derive(Parser)]
#[command(name = "regular", about = "A user-level periodic job runner")]
pub struct Cli {
    /// Increase log verbosity (-v, -vv).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Override the config root (takes priority over REGULAR_CONFIG_DIR).
    #[arg(long = "config-dir", global = true)]
    pub config_dir: Option<String>,

    /// Override the state root (takes priority over REGULAR_STATE_DIR).
    #[arg(long = "state-dir", global = true)]
    pub state_dir: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print available job names.
    List {
        #[arg(short = 'j', long = "jsonl")]
        jsonl: bool,
    },
    /// Run jobs, subject to due/force semantics.
    Run {
        #[command(subcommand)]
        mode: RunMode,
    },
    /// Print configuration and state for jobs.
    Status {
        jobs: Vec<String>,
        #[arg(short = 'j', long = "jsonl")]
        jsonl: bool,
        #[arg(short = 'l', long = "lines")]
        lines: Option<usize>,
    },
}

#[derive(Subcommand)]
pub enum RunMode {
    /// Run selected (or all) jobs only if due.
    Due {
        #[arg(long)]
        all: bool,
        jobs: Vec<String>,
    },
    /// Run selected (or all) jobs unconditionally.
    Now {
        #[arg(long)]
        all: bool,
        jobs: Vec<String>,
    },
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let config_root = paths::resolve_config_root(cli.config_dir.as_deref());
    let state_root = paths::resolve_state_root(cli.state_dir.as_deref());
    let config = Config::load(&config_root, &state_root)?;

    match cli.command {
        Command::List { jsonl } => list(&config, jsonl),
        Command::Run { mode } => match mode {
            RunMode::Due { all, jobs } => run_jobs(&config, false, all, jobs),
            RunMode::Now { all, jobs } => run_jobs(&config, true, all, jobs),
        },
        Command::Status { jobs, jsonl, lines } => status(&config, &jobs, jsonl, lines.unwrap_or(10)),
    }
}

fn selection(all: bool, jobs: Vec<String>) -> Option<Vec<String>> {
    if all || jobs.is_empty() {
        None
    } else {
        Some(jobs)
    }
}

#[derive(Serialize)]
struct JobSummary {
    name: String,
}

fn list(config: &Config, jsonl: bool) -> anyhow::Result<()> {
    let dirs = job::available_job_dirs(&config.config_root)?;
    for dir in dirs {
        let name = job::job_name(&dir);
        if jsonl {
            println!("{}", serde_json::to_string(&JobSummary { name })?);
        } else {
            println!("{name}");
        }
    }
    Ok(())
}

fn run_jobs(config: &Config, force: bool, all: bool, jobs: Vec<String>) -> anyhow::Result<()> {
    let names = selection(all, jobs);
    if names.is_none() {
        // Surface an unreadable config root as a fatal CLI error rather
        // than letting the session driver's best-effort listing silently
        // treat it as "no jobs available".
        job::available_job_dirs(&config.config_root)?;
    }
    let results = session::run_session(config, force, names.as_deref());
    for result in &results {
        println!("{}", describe_result(result));
    }
    Ok(())
}

fn describe_result(result: &JobResult) -> String {
    match result {
        JobResult::Completed { name, exit_status, .. } => {
            format!("{name}: completed (exit {exit_status})")
        }
        JobResult::Error { name, message, .. } => format!("{name}: error ({message})"),
        JobResult::Locked { name } => format!("{name}: locked"),
        JobResult::Skipped { name } => format!("{name}: skipped"),
    }
}

#[derive(Serialize)]
struct StatusData {
    name: String,
    schedule_ms: u64,
    queue: String,
    last_run_epoch_s: Option<u64>,
    exit_status: Option<i32>,
    stdout: Vec<String>,
    stderr: Vec<String>,
}

#[derive(Serialize)]
struct StatusError {
    name: String,
    error: String,
}

fn status(config: &Config, jobs: &[String], jsonl: bool, lines: usize) -> anyhow::Result<()> {
    let dirs = if jobs.is_empty() {
        job::available_job_dirs(&config.config_root)?
    } else {
        jobs.iter().map(|name| config.config_root.join(name)).collect()
    };

    for dir in dirs {
        let name = job::job_name(&dir);
        let outer_env = config.job_outer_env();
        match Job::load(&dir, Some(&outer_env)) {
            Ok(job) => print_status(config, &job, jsonl, lines)?,
            Err(e) => {
                if jsonl {
                    let payload = StatusError {
                        name,
                        error: e.to_string(),
                    };
                    println!("{}", serde_json::to_string(&payload)?);
                } else {
                    println!("{name}: error loading job ({e})");
                }
            }
        }
    }
    Ok(())
}

fn print_status(config: &Config, job: &Job, jsonl: bool, lines: usize) -> anyhow::Result<()> {
    let state_dir = config.state_root.join(&job.name);
    let last_modified = std::fs::metadata(state_dir.join("last"))
        .and_then(|m| m.modified())
        .ok();
    let exit_status = std::fs::read_to_string(state_dir.join("exit-status"))
        .ok()
        .and_then(|s| s.trim().parse::<i32>().ok());
    let stdout_tail = tail_lines(&state_dir.join("stdout.log"), lines);
    let stderr_tail = tail_lines(&state_dir.join("stderr.log"), lines);

    if jsonl {
        let payload = StatusData {
            name: job.name.clone(),
            schedule_ms: job.schedule.as_millis() as u64,
            queue: job.queue.clone(),
            last_run_epoch_s: last_modified.map(humantime_epoch),
            exit_status,
            stdout: stdout_tail,
            stderr: stderr_tail,
        };
        println!("{}", serde_json::to_string(&payload)?);
    } else {
        let last = last_modified
            .map(|t| humantime_epoch(t).to_string())
            .unwrap_or_else(|| "never".to_string());
        let status = exit_status
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{}: last={last} exit={status}", job.name);
    }
    Ok(())
}

fn humantime_epoch(t: std::time::SystemTime) -> u64 {
    t.duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn tail_lines(path: &std::path::Path, n: usize) -> Vec<String> {
    std::fs::read_to_string(path)
        .map(|text| {
            let all: Vec<String> = text.lines().map(str::to_string).collect();
            let start = all.len().saturating_sub(n);
            all[start..].to_vec()
        })
        .unwrap_or_default()
}
