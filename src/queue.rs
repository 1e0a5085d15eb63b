//! FIFO queue primitive (`run_in_queue`), the nq algorithm: a cross-process
//! serializer built from advisory file locks so that entries sharing a
//! queue directory run strictly in publish order.
//!
//! Built on the same `fs2`-based lock idiom as `lock.rs`, composed into the
//! dotted-pre-ticket / exclusive-lock / rename-publish / shared-lock-wait
//! protocol using the lock primitives `lock.rs` exposes.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::{Error, Result};
use crate::lock;

const SETTLE_SLEEP: Duration = Duration::from_millis(10);

/// Run `body` inside the named queue's critical section, serializing it
/// against every other ticket holder in the same `queue_dir` (the
/// `<state_root>/<queue>/queue` directory; the caller passes the `queue`
/// directory itself, this function creates the `queue/` subdirectory).
pub fn run_in_queue<T>(queue_dir: &Path, name: &str, body: impl FnOnce() -> T) -> Result<T> {
    std::fs::create_dir_all(queue_dir)?;

    cleanup_stale_tickets(queue_dir)?;

    let ticket = format_ticket(name);
    let published = queue_dir.join(&ticket);
    let pre_ticket = queue_dir.join(format!(".{ticket}"));

    let _guard = lock::lock_exclusive(&pre_ticket)?;
    std::fs::rename(&pre_ticket, &published)?;

    std::thread::sleep(SETTLE_SLEEP);

    wait_for_predecessors(queue_dir, &ticket)?;

    let result = body();

    remove_if_present(&published)?;
    remove_if_present(&pre_ticket)?;
    // `_guard`'s drop releases the exclusive lock after cleanup.

    Ok(result)
}

fn wait_for_predecessors(queue_dir: &Path, our_ticket: &str) -> Result<()> {
    let mut seen: HashSet<String> = HashSet::new();

    loop {
        let mut predecessors: Vec<String> = std::fs::read_dir(queue_dir)?
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|n| !n.starts_with('.'))
            .filter(|n| n.as_str() < our_ticket)
            .filter(|n| !seen.contains(n))
            .collect();

        if predecessors.is_empty() {
            return Ok(());
        }

        predecessors.sort();
        for ticket in &predecessors {
            let path = queue_dir.join(ticket);
            match lock::lock_shared(&path) {
                Ok(file) => drop(file),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::Io(e)),
            }
            seen.insert(ticket.clone());
        }
    }
}

/// Best-effort removal of tickets left by a session that crashed before
/// releasing its exclusive lock. Decided open question (DESIGN.md): run at
/// queue entry, before publishing our own ticket, since it is pure
/// housekeeping with no bearing on correctness.
fn cleanup_stale_tickets(queue_dir: &Path) -> Result<()> {
    let entries: Vec<PathBuf> = std::fs::read_dir(queue_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| !n.starts_with('.'))
                .unwrap_or(false)
        })
        .collect();

    for path in entries {
        if let Some(file) = lock::try_lock_exclusive(&path)? {
            remove_if_present(&path)?;
            drop(file);
        }
    }
    Ok(())
}

fn remove_if_present(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Io(e)),
    }
}

fn format_ticket(name: &str) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO);
    let ms = now.as_millis();
    format!("{ms:013}-{name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn single_caller_runs_body_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let queue_dir = dir.path().join("queue");

        let value = run_in_queue(&queue_dir, "job", || 42).unwrap();
        assert_eq!(value, 42);

        let remaining: Vec<_> = std::fs::read_dir(&queue_dir).unwrap().collect();
        assert!(remaining.is_empty());
    }

    #[test]
    fn concurrent_entries_in_same_queue_do_not_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let queue_dir = Arc::new(dir.path().join("queue"));
        let active = Arc::new(Mutex::new(0usize));
        let overlapped = Arc::new(Mutex::new(false));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let queue_dir = Arc::clone(&queue_dir);
                let active = Arc::clone(&active);
                let overlapped = Arc::clone(&overlapped);
                std::thread::spawn(move || {
                    run_in_queue(&queue_dir, &format!("job{i}"), || {
                        {
                            let mut a = active.lock().unwrap();
                            *a += 1;
                            if *a > 1 {
                                *overlapped.lock().unwrap() = true;
                            }
                        }
                        std::thread::sleep(Duration::from_millis(20));
                        *active.lock().unwrap() -= 1;
                    })
                    .unwrap();
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert!(!*overlapped.lock().unwrap());
    }

    #[test]
    fn distinct_queues_run_independently() {
        let dir = tempfile::tempdir().unwrap();
        let foo = dir.path().join("foo-queue");
        let bar = dir.path().join("bar-queue");

        let h1 = {
            let foo = foo.clone();
            std::thread::spawn(move || {
                run_in_queue(&foo, "a", || std::thread::sleep(Duration::from_millis(50))).unwrap();
            })
        };
        let h2 = {
            let bar = bar.clone();
            std::thread::spawn(move || {
                run_in_queue(&bar, "b", || std::thread::sleep(Duration::from_millis(50))).unwrap();
            })
        };
        let start = std::time::Instant::now();
        h1.join().unwrap();
        h2.join().unwrap();
        assert!(start.elapsed() < Duration::from_millis(95));
    }
}
