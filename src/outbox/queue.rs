//! Pending Delivery Queue: file-backed outbox for remote delivery
//!
//! Every resolved scan appends one `name,roll,class,uid` line. A sync pass
//! reads the whole file, attempts delivery of each record in enqueue order,
//! and atomically replaces the file with the records that failed.
//!
//! The replace is write-temp + fsync + rename, so an interrupted pass
//! leaves either the old or the new contents, never a truncated file.
//! The queue is not safe against an `enqueue` landing in the middle of a
//! `drain_and_retry`; the processing loop never lets the two overlap.

use std::fs::{self, File};
use std::future::Future;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::storage::{append_line, StorageError};
use crate::types::PendingRecord;

/// One line of the queue file.
#[derive(Debug, Clone, PartialEq, Eq)]
enum QueueEntry {
    Record(PendingRecord),
    /// Line that does not parse as a record. Carried forward untouched.
    Unparsed(String),
}

/// Outcome of one drain pass over the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Records handed to the delivery function
    pub attempted: usize,
    /// Records delivered and dropped from the queue
    pub delivered: usize,
    /// Records that failed and were written back
    pub retained: usize,
    /// Unparseable lines written back verbatim
    pub unparsed: usize,
}

/// Disk-backed pending delivery queue.
#[derive(Debug, Clone)]
pub struct PendingQueue {
    path: PathBuf,
}

impl PendingQueue {
    /// Open the queue at `path`, creating its parent directory if needed.
    ///
    /// The file itself is only created by the first `enqueue`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, QueueError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
        }

        let queue = Self { path };

        let pending = queue.pending_count()?;
        if pending > 0 {
            info!(pending, "Pending queue opened with undelivered records");
        } else {
            debug!("Pending queue opened (empty)");
        }

        Ok(queue)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record to the queue and flush it to disk.
    ///
    /// No de-duplication: scanning the same tag twice queues two records.
    pub fn enqueue(&self, record: &PendingRecord) -> Result<(), QueueError> {
        append_line(&self.path, &record.to_line())?;
        debug!(uid = %record.uid, "Record queued for delivery");
        Ok(())
    }

    /// All parseable records currently queued, in enqueue order.
    pub fn pending(&self) -> Result<Vec<PendingRecord>, QueueError> {
        Ok(self
            .load()?
            .into_iter()
            .filter_map(|entry| match entry {
                QueueEntry::Record(record) => Some(record),
                QueueEntry::Unparsed(_) => None,
            })
            .collect())
    }

    /// Number of parseable records currently queued.
    pub fn pending_count(&self) -> Result<usize, QueueError> {
        Ok(self.pending()?.len())
    }

    /// Attempt delivery of every queued record and keep only the failures.
    ///
    /// `deliver` is called once per record, in enqueue order, and returns
    /// whether the record was accepted. A failure does not stop the pass.
    /// With nothing queued this is a no-op and the file is left untouched.
    pub async fn drain_and_retry<F, Fut>(&self, mut deliver: F) -> Result<DrainReport, QueueError>
    where
        F: FnMut(PendingRecord) -> Fut,
        Fut: Future<Output = bool>,
    {
        let entries = self.load()?;
        if !entries.iter().any(|e| matches!(e, QueueEntry::Record(_))) {
            return Ok(DrainReport::default());
        }

        let mut report = DrainReport::default();
        let mut carried = String::new();

        for entry in entries {
            let line = match entry {
                QueueEntry::Record(record) => {
                    report.attempted += 1;
                    let line = record.to_line();
                    if deliver(record).await {
                        report.delivered += 1;
                        continue;
                    }
                    report.retained += 1;
                    line
                }
                QueueEntry::Unparsed(line) => {
                    report.unparsed += 1;
                    line
                }
            };
            carried.push_str(&line);
            carried.push('\n');
        }

        self.replace_contents(&carried)?;

        if report.unparsed > 0 {
            warn!(
                unparsed = report.unparsed,
                path = %self.path.display(),
                "Pending queue contains unparseable lines; kept as-is"
            );
        }

        Ok(report)
    }

    /// Read every non-empty line. A missing file is an empty queue.
    fn load(&self) -> Result<Vec<QueueEntry>, QueueError> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(&self.path, e).into()),
        };

        let mut entries = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| StorageError::io(&self.path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(match PendingRecord::parse_line(&line) {
                Some(record) => QueueEntry::Record(record),
                None => QueueEntry::Unparsed(line),
            });
        }
        Ok(entries)
    }

    /// Atomically replace the queue file with `contents`.
    fn replace_contents(&self, contents: &str) -> Result<(), QueueError> {
        let tmp_path = self.path.with_extension("tmp");

        let write_tmp = || -> std::io::Result<()> {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(contents.as_bytes())?;
            tmp.sync_all()
        };

        let result = write_tmp().and_then(|()| fs::rename(&tmp_path, &self.path));
        if let Err(e) = result {
            let _ = fs::remove_file(&tmp_path);
            return Err(StorageError::io(&self.path, e).into());
        }
        Ok(())
    }
}

/// Queue errors
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}
