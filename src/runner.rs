//! Job runner (`run_job`): acquire the per-job lock, enter the named queue,
//! then execute the script and record the outcome.
//!
//! Composes `lock.rs` (per-job exclusion) and `queue.rs` (FIFO
//! serialization) around the actual script execution. Log capture uses
//! plain `Stdio` redirection to freshly truncated files; the child is
//! waited on synchronously inside the worker since there is no detached
//! supervisor process to outlive the session.

use std::fs::File;
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, SystemTime};

use rand::Rng;

use crate::config::Config;
use crate::env::{self, Env};
use crate::error::{Error, Result};
use crate::job::Job;
use crate::lock;
use crate::queue;
use crate::result::{JobResult, Log};

pub fn run_job(job: &Job, config: &Config, force: bool) -> JobResult {
    let state_dir = config.state_root.join(&job.name);
    if let Err(e) = std::fs::create_dir_all(&state_dir) {
        return error_result(&job.name, e);
    }

    let lock_path = state_dir.join("lock");
    let guard = match lock::try_lock_exclusive(&lock_path) {
        Ok(Some(guard)) => guard,
        Ok(None) => return JobResult::Locked {
            name: job.name.clone(),
        },
        Err(e) => return error_result(&job.name, e),
    };

    let queue_dir = config.state_root.join(&job.queue).join("queue");
    let outcome = queue::run_in_queue(&queue_dir, &job.name, || run_body(job, &state_dir, config, force));
    drop(guard);

    match outcome {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => error_result(&job.name, e),
        Err(e) => error_result(&job.name, e),
    }
}

fn error_result(name: &str, err: impl Into<Error>) -> JobResult {
    JobResult::Error {
        name: name.to_string(),
        message: err.into().to_string(),
        log: String::new(),
    }
}

fn run_body(job: &Job, state_dir: &Path, config: &Config, force: bool) -> Result<JobResult> {
    if !job.dir.exists() {
        return Err(Error::JobDirMissing(job.dir.clone()));
    }

    let last_path = state_dir.join("last");
    let exit_status_path = state_dir.join("exit-status");

    if !force && !is_due(&last_path, job.schedule)? {
        return Ok(JobResult::Skipped {
            name: job.name.clone(),
        });
    }

    sleep_jitter(job.jitter);

    remove_if_present(&exit_status_path)?;
    std::fs::write(&last_path, std::process::id().to_string())?;

    let stdout_path = state_dir.join("stdout.log");
    let stderr_path = state_dir.join("stderr.log");
    let stdout_file = File::create(&stdout_path)?;
    let stderr_file = File::create(&stderr_path)?;

    let env = compose_env(config, job);

    let status = Command::new(job.script_path())
        .current_dir(&job.dir)
        .env_clear()
        .envs(env)
        .stdout(Stdio::from(stdout_file))
        .stderr(Stdio::from(stderr_file))
        .status()?;

    let exit_status = status.code().unwrap_or(-1);
    std::fs::write(&exit_status_path, exit_status.to_string())?;

    Ok(JobResult::Completed {
        name: job.name.clone(),
        exit_status,
        stdout: Log::load(&stdout_path),
        stderr: Log::load(&stderr_path),
    })
}

fn compose_env(config: &Config, job: &Job) -> Env {
    env::merge([
        config.process_env.clone(),
        config.defaults.env.clone(),
        job.env.clone(),
    ])
}

fn sleep_jitter(jitter: Duration) {
    if jitter.is_zero() {
        return;
    }
    let max_ms = jitter.as_millis().min(u64::MAX as u128) as u64;
    let sleep_ms = rand::thread_rng().gen_range(0..max_ms);
    std::thread::sleep(Duration::from_millis(sleep_ms));
}

/// A job is due if `last` is missing, or enough time has elapsed since its
/// mtime net of the tolerance slack below.
fn is_due(last_path: &Path, schedule: Duration) -> Result<bool> {
    let metadata = match std::fs::metadata(last_path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(Error::Io(e)),
    };
    let modified = metadata.modified()?;
    let elapsed = SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::ZERO);
    Ok(elapsed >= schedule.saturating_sub(tolerance(schedule)))
}

/// Tolerance slack that absorbs external-scheduler jitter so a nominally
/// "every 1m" job isn't deferred to "every 2m".
fn tolerance(schedule: Duration) -> Duration {
    let secs = schedule.as_secs();
    if secs >= 300 {
        Duration::from_secs(60)
    } else if secs >= 60 {
        Duration::from_secs(12)
    } else if secs >= 10 {
        Duration::from_secs(2)
    } else {
        Duration::ZERO
    }
}

fn remove_if_present(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn write_script(path: &Path, body: &str) {
        std::fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut perms = std::fs::metadata(path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(path, perms).unwrap();
    }

    fn make_job(root: &Path, name: &str, schedule: Duration, body: &str) -> Job {
        let job_dir = root.join(name);
        std::fs::create_dir_all(&job_dir).unwrap();
        write_script(&job_dir.join("script"), body);
        Job {
            dir: job_dir,
            name: name.to_string(),
            filename: "script".to_string(),
            schedule,
            jitter: Duration::ZERO,
            queue: name.to_string(),
            notify: crate::job::NotifyPolicy::OnError,
            env: Env::new(),
            enabled: true,
        }
    }

    fn make_config(dir: &Path) -> Config {
        Config::load(&dir.join("config"), &dir.join("state")).unwrap()
    }

    #[test]
    fn completed_then_skipped_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let job = make_job(dir.path(), "bar", Duration::from_secs(60), "echo bar");
        let config = make_config(dir.path());

        let first = run_job(&job, &config, false);
        match first {
            JobResult::Completed {
                exit_status,
                stdout,
                ..
            } => {
                assert_eq!(exit_status, 0);
                assert_eq!(stdout.text(), "bar");
            }
            other => panic!("expected Completed, got {other:?}"),
        }

        let second = run_job(&job, &config, false);
        assert!(matches!(second, JobResult::Skipped { .. }));
    }

    #[test]
    fn force_runs_even_when_not_due() {
        let dir = tempfile::tempdir().unwrap();
        let job = make_job(dir.path(), "foo", Duration::from_secs(60), "echo foo");
        let config = make_config(dir.path());

        run_job(&job, &config, false);
        let second = run_job(&job, &config, true);
        assert!(matches!(second, JobResult::Completed { .. }));
    }

    #[test]
    fn missing_job_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = make_job(dir.path(), "gone", Duration::ZERO, "echo hi");
        std::fs::remove_dir_all(&job.dir).unwrap();
        job.dir = dir.path().join("gone");
        let config = make_config(dir.path());

        let result = run_job(&job, &config, true);
        assert!(matches!(result, JobResult::Error { .. }));
    }

    #[test]
    fn concurrent_runs_yield_one_completed_and_one_locked() {
        use std::sync::Arc;

        let dir = tempfile::tempdir().unwrap();
        let job = Arc::new(make_job(dir.path(), "wait", Duration::ZERO, "sleep 0.2"));
        let config = Arc::new(make_config(dir.path()));

        let (j1, c1) = (Arc::clone(&job), Arc::clone(&config));
        let h1 = std::thread::spawn(move || run_job(&j1, &c1, true));
        std::thread::sleep(Duration::from_millis(20));
        let (j2, c2) = (Arc::clone(&job), Arc::clone(&config));
        let h2 = std::thread::spawn(move || run_job(&j2, &c2, true));

        let r1 = h1.join().unwrap();
        let r2 = h2.join().unwrap();

        let completed = matches!(r1, JobResult::Completed { .. }) as u8
            + matches!(r2, JobResult::Completed { .. }) as u8;
        let locked = matches!(r1, JobResult::Locked { .. }) as u8
            + matches!(r2, JobResult::Locked { .. }) as u8;
        assert_eq!(completed, 1);
        assert_eq!(locked, 1);
    }
}
