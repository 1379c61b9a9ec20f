//! Unknown-Tag Log: append-only record of UIDs not found on the roster

use std::path::{Path, PathBuf};
use tracing::debug;

use super::{append_line, StorageError};

#[derive(Debug, Clone)]
pub struct UnknownLog {
    path: PathBuf,
}

impl UnknownLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one UID and flush it to disk.
    pub fn append(&self, uid: &str) -> Result<(), StorageError> {
        append_line(&self.path, uid)?;
        debug!(uid, "Unknown tag logged");
        Ok(())
    }
}
