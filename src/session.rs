//! Session driver (`run_session`): enumerate selected jobs, dispatch them
//! to a bounded worker pool, and apply the notification policy to each
//! outcome.
//!
//! The result list mirrors input selection order regardless of completion
//! order, via pre-allocated, index-addressed result slots filled by the
//! `rayon` thread pool.

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::config::Config;
use crate::job::{self, Job};
use crate::notify;
use crate::result::JobResult;
use crate::runner;

/// Run one session: select jobs (all available, or the named subset),
/// dispatch them to a bounded worker pool, and apply the notification
/// policy to each outcome.
pub fn run_session(config: &Config, force: bool, names: Option<&[String]>) -> Vec<JobResult> {
    let selection = select_job_dirs(config, names);

    let pool = build_pool(config.max_workers, selection.len());
    let mut results: Vec<Option<JobResult>> = (0..selection.len()).map(|_| None).collect();

    pool.scope(|scope| {
        for (slot, item) in results.iter_mut().zip(selection.into_iter()) {
            scope.spawn(move |_| {
                *slot = Some(run_one(item, config, force));
            });
        }
    });

    results.into_iter().map(|r| r.expect("every slot filled")).collect()
}

enum Selected {
    Dir(std::path::PathBuf),
    Missing(String),
}

fn select_job_dirs(config: &Config, names: Option<&[String]>) -> Vec<Selected> {
    match names {
        None => job::available_job_dirs(&config.config_root)
            .unwrap_or_default()
            .into_iter()
            .map(Selected::Dir)
            .collect(),
        Some(names) => names
            .iter()
            .map(|name| {
                let dir = config.config_root.join(name);
                if dir.is_dir() {
                    Selected::Dir(dir)
                } else {
                    Selected::Missing(name.clone())
                }
            })
            .collect(),
    }
}

fn run_one(item: Selected, config: &Config, force: bool) -> JobResult {
    let dir = match item {
        Selected::Dir(dir) => dir,
        Selected::Missing(name) => {
            return JobResult::Error {
                message: crate::error::Error::JobNotFound(name.clone()).to_string(),
                name,
                log: String::new(),
            };
        }
    };

    let outer_env = config.job_outer_env();
    let job = match Job::load(&dir, Some(&outer_env)) {
        Ok(job) => job,
        Err(e) => {
            let name = job::job_name(&dir);
            return JobResult::Error {
                name,
                message: e.to_string(),
                log: String::new(),
            };
        }
    };

    let result = runner::run_job(&job, config, force);
    notify::notify_if_necessary(job.notify, &result, &config.notifiers);
    result
}

/// Size the worker pool. `max_workers` is the configured cap; when absent,
/// "unbounded" means no cap at all below the number of jobs in this
/// selection, not rayon's logical-CPU-sized default pool, since most
/// workers spend their time blocked in jitter sleep, the queue's settle
/// sleep, a predecessor's lock wait, or the child `wait` rather than
/// running on a CPU.
fn build_pool(max_workers: Option<usize>, job_count: usize) -> ThreadPool {
    let threads = max_workers.unwrap_or(job_count).max(1);
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .expect("failed to build worker pool")
}
