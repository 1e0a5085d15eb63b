//! Per-job exclusive advisory lock helpers, shared by the queue primitive
//! (`queue.rs`, exclusive on tickets, shared on predecessors) and the job
//! runner (`runner.rs`, exclusive non-blocking on `<job>/lock`).
//!
//! Uses the `fs2::FileExt` lock pattern: advisory locks compile to
//! `flock()`/`fcntl()` on Unix and `LockFileEx` on Windows, released
//! automatically when the file descriptor is dropped. A non-blocking
//! exclusive attempt that sees `WouldBlock` means another holder already
//! owns the file.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use fs2::FileExt;

/// Open (creating if absent) and take a non-blocking exclusive lock on
/// `path`. Returns `Ok(None)` if another holder already owns it.
pub fn try_lock_exclusive(path: &Path) -> io::Result<Option<File>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = open_for_lock(path)?;
    match file.try_lock_exclusive() {
        Ok(()) => Ok(Some(file)),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(e) => Err(e),
    }
}

/// Open and take a blocking exclusive lock, held for the full duration of
/// a queue ticket's publish-through-critical-section protocol.
pub fn lock_exclusive(path: &Path) -> io::Result<File> {
    let file = open_for_lock(path)?;
    file.lock_exclusive()?;
    Ok(file)
}

/// Open an existing file and take a blocking shared lock, used by queue
/// waiters to detect when a predecessor's exclusive lock is released.
pub fn lock_shared(path: &Path) -> io::Result<File> {
    let file = File::open(path)?;
    file.lock_shared()?;
    Ok(file)
}

fn open_for_lock(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
}
