//! Process Lock: one bridge per data directory
//!
//! The pending queue is rewritten wholesale on every sync pass, which is
//! only safe while a single process owns it. A PID file in the data
//! directory enforces that.

use anyhow::{bail, Context, Result};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How long an empty lock file is treated as held by a process still writing it.
const FRESH_LOCK_GRACE: Duration = Duration::from_secs(2);

/// PID lock held for the lifetime of the bridge process.
#[derive(Debug)]
pub struct ProcessLock {
    lock_path: PathBuf,
    owned: bool,
}

impl ProcessLock {
    const LOCK_FILE_NAME: &'static str = ".rollcall.lock";

    /// Acquire the lock for `data_dir`, creating the directory if needed.
    ///
    /// Fails if the lock file names a live `rollcall` process. A lock file
    /// left behind by a dead process is replaced.
    pub fn acquire<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let lock_path = data_dir.join(Self::LOCK_FILE_NAME);
        let pid = std::process::id();

        // Two attempts: the second follows removal of a stale lock.
        for _ in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(&lock_path) {
                Ok(mut file) => {
                    file.write_all(format!("{pid}\n").as_bytes())
                        .and_then(|()| file.sync_all())
                        .with_context(|| {
                            format!("Failed to write lock file: {}", lock_path.display())
                        })?;

                    tracing::debug!(pid, path = %lock_path.display(), "Acquired process lock");
                    return Ok(Self {
                        lock_path,
                        owned: true,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    Self::clear_stale(data_dir, &lock_path)?;
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("Failed to create lock file: {}", lock_path.display())
                    });
                }
            }
        }

        bail!(
            "Lock file {} keeps reappearing; another rollcall instance is starting",
            lock_path.display()
        )
    }

    /// Remove `lock_path` unless it belongs to a live bridge.
    fn clear_stale(data_dir: &Path, lock_path: &Path) -> Result<()> {
        match Self::holder_pid(lock_path) {
            Some(pid) if Self::is_bridge_running(pid) => {
                bail!(
                    "Another rollcall instance already owns {} (PID: {})\n\
                     Stop it, or remove the stale lock file if it is not running:\n\
                     \n    rm {}",
                    data_dir.display(),
                    pid,
                    lock_path.display()
                );
            }
            None if Self::is_being_written(lock_path) => {
                bail!(
                    "Another rollcall instance is acquiring {} right now",
                    data_dir.display()
                );
            }
            _ => {
                tracing::info!(path = %lock_path.display(), "Removing stale lock file");
                match fs::remove_file(lock_path) {
                    Ok(()) => Ok(()),
                    Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                    Err(e) => Err(e).context("Failed to remove stale lock file"),
                }
            }
        }
    }

    /// An empty lock file created moments ago: its owner has not written
    /// the PID yet.
    fn is_being_written(lock_path: &Path) -> bool {
        fs::metadata(lock_path).is_ok_and(|meta| {
            meta.len() == 0
                && meta
                    .modified()
                    .ok()
                    .and_then(|modified| modified.elapsed().ok())
                    .is_some_and(|age| age < FRESH_LOCK_GRACE)
        })
    }

    /// PID recorded in an existing lock file, if it parses.
    fn holder_pid(lock_path: &Path) -> Option<u32> {
        fs::read_to_string(lock_path).ok()?.trim().parse().ok()
    }

    #[cfg(unix)]
    fn is_bridge_running(pid: u32) -> bool {
        // A recycled PID belonging to some other program does not count.
        fs::read_to_string(format!("/proc/{pid}/cmdline"))
            .is_ok_and(|cmdline| cmdline.contains("rollcall"))
    }

    #[cfg(not(unix))]
    fn is_bridge_running(_pid: u32) -> bool {
        true
    }

    /// Release the lock (called automatically on drop)
    pub fn release(&mut self) {
        if self.owned {
            if let Err(e) = fs::remove_file(&self.lock_path) {
                tracing::warn!(error = %e, "Failed to remove lock file");
            } else {
                tracing::debug!(path = %self.lock_path.display(), "Released process lock");
            }
            self.owned = false;
        }
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        self.release();
    }
}
