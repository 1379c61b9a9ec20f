//! Durable Storage
//!
//! Flat, line-oriented CSV files on local disk:
//!
//! - [`RosterStore`]: read-only roster, scanned linearly on every lookup
//! - [`AttendanceLog`]: one append-only partition per calendar date
//! - [`UnknownLog`]: single append-only log of unresolved UIDs
//! - [`ProcessLock`]: single-instance guard for the data directory
//!
//! Appends are flushed to disk (`sync_data`) before returning so a power
//! cut right after a scan response does not lose the record.

pub mod attendance;
pub mod lockfile;
pub mod roster;
pub mod unknown;

pub use attendance::AttendanceLog;
pub use lockfile::ProcessLock;
pub use roster::RosterStore;
pub use unknown::UnknownLog;

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error on {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl StorageError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Append one newline-terminated line to `path`, creating the file if absent,
/// and flush it to disk before returning.
pub(crate) fn append_line(path: &Path, line: &str) -> Result<(), StorageError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| StorageError::io(path, e))?;

    let mut buf = String::with_capacity(line.len() + 1);
    buf.push_str(line);
    buf.push('\n');

    file.write_all(buf.as_bytes())
        .map_err(|e| StorageError::io(path, e))?;
    file.sync_data().map_err(|e| StorageError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_line_creates_and_appends() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("log.csv");

        append_line(&path, "first").unwrap();
        append_line(&path, "second").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn test_append_line_reports_path_on_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("missing-dir").join("log.csv");

        let err = append_line(&path, "x").unwrap_err();
        assert!(err.to_string().contains("missing-dir"));
    }
}
