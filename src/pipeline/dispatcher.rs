//! Event Dispatcher: resolves one scan and records the result
//!
//! Stateless across messages. For each payload:
//!
//! ```text
//! decode bounded UID -> roster lookup
//!   found:     attendance partition append + pending queue enqueue -> "name,roll,class"
//!   not found: unknown log append                                  -> "UNKNOWN"
//! ```
//!
//! Storage failures are logged and never stop the response from being
//! published. A scan can therefore be in the attendance partition without
//! a queued delivery record if the disk fills between the two writes.

use std::path::Path;
use tracing::{info, warn};

use crate::bus::ScanBus;
use crate::config::{ScanConfig, StorageConfig};
use crate::outbox::{PendingQueue, QueueError};
use crate::storage::{AttendanceLog, RosterStore, UnknownLog};
use crate::types::{decode_uid, AttendanceEvent, PendingRecord, ScanOutcome};

#[derive(Debug, Clone)]
pub struct EventDispatcher {
    roster: RosterStore,
    attendance: AttendanceLog,
    unknown: UnknownLog,
    queue: PendingQueue,
    max_uid_len: usize,
}

impl EventDispatcher {
    pub const fn new(
        roster: RosterStore,
        attendance: AttendanceLog,
        unknown: UnknownLog,
        queue: PendingQueue,
        max_uid_len: usize,
    ) -> Self {
        Self {
            roster,
            attendance,
            unknown,
            queue,
            max_uid_len,
        }
    }

    /// Build a dispatcher over the files named in `storage`.
    pub fn from_config(storage: &StorageConfig, scan: &ScanConfig) -> Result<Self, QueueError> {
        Ok(Self::new(
            RosterStore::new(storage.roster_path()),
            AttendanceLog::new(&storage.data_dir, &storage.attendance_prefix),
            UnknownLog::new(storage.unknown_path()),
            PendingQueue::open(storage.pending_path())?,
            scan.max_uid_len,
        ))
    }

    pub const fn roster(&self) -> &RosterStore {
        &self.roster
    }

    pub const fn attendance(&self) -> &AttendanceLog {
        &self.attendance
    }

    pub const fn queue(&self) -> &PendingQueue {
        &self.queue
    }

    pub fn unknown_log_path(&self) -> &Path {
        self.unknown.path()
    }

    /// Decode, resolve and record one scan payload.
    pub fn resolve(&self, payload: &[u8]) -> ScanOutcome {
        let uid = decode_uid(payload, self.max_uid_len);

        let Some(record) = self.roster.lookup(&uid) else {
            if let Err(e) = self.unknown.append(&uid) {
                warn!(uid = %uid, error = %e, "Failed to log unknown tag");
            }
            info!(uid = %uid, "❓ Unknown tag");
            return ScanOutcome::Unknown(uid);
        };

        let event = AttendanceEvent::now(record.clone());
        if let Err(e) = self.attendance.append(&event) {
            warn!(uid = %uid, error = %e, "Failed to write attendance record");
        }
        if let Err(e) = self.queue.enqueue(&PendingRecord::from(&record)) {
            warn!(uid = %uid, error = %e, "Failed to queue record for delivery");
        }

        info!(
            uid = %uid,
            name = %record.name,
            roll = %record.roll,
            class = %record.class,
            "✓ Attendance recorded"
        );
        ScanOutcome::Recorded(record)
    }

    /// Resolve one scan and publish the response on `bus`.
    pub async fn handle<B: ScanBus>(&self, bus: &mut B, payload: &[u8]) -> ScanOutcome {
        let outcome = self.resolve(payload);
        if let Err(e) = bus.publish_response(&outcome.response_payload()).await {
            warn!(uid = %outcome.uid(), error = %e, "Failed to publish scan response");
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use std::fs;

    fn dispatcher_in(tmp: &tempfile::TempDir) -> EventDispatcher {
        let storage = StorageConfig {
            data_dir: tmp.path().to_path_buf(),
            ..StorageConfig::default()
        };
        fs::write(storage.roster_path(), "A1,Jane,07,10A\nB2,Ravi,12,9B\n").unwrap();
        EventDispatcher::from_config(&storage, &ScanConfig::default()).unwrap()
    }

    #[test]
    fn test_known_tag_writes_attendance_and_queue() {
        let tmp = tempfile::tempdir().unwrap();
        let dispatcher = dispatcher_in(&tmp);

        let outcome = dispatcher.resolve(b"A1");
        assert_eq!(outcome.response_payload(), "Jane,07,10A");

        let today = Local::now().date_naive();
        let partition = fs::read_to_string(dispatcher.attendance().partition_path(today)).unwrap();
        assert_eq!(partition.lines().count(), 1);
        assert!(partition.trim_end().ends_with("A1,Jane,07,10A"));

        assert_eq!(
            fs::read_to_string(dispatcher.queue().path()).unwrap(),
            "Jane,07,10A,A1\n"
        );
        assert!(!dispatcher.unknown_log_path().exists());
    }

    #[test]
    fn test_unknown_tag_only_writes_unknown_log() {
        let tmp = tempfile::tempdir().unwrap();
        let dispatcher = dispatcher_in(&tmp);

        let outcome = dispatcher.resolve(b"ZZZZ");
        assert_eq!(outcome, ScanOutcome::Unknown("ZZZZ".to_string()));
        assert_eq!(outcome.response_payload(), "UNKNOWN");

        assert_eq!(fs::read_to_string(dispatcher.unknown_log_path()).unwrap(), "ZZZZ\n");
        assert_eq!(dispatcher.queue().pending_count().unwrap(), 0);
        assert_eq!(dispatcher.attendance().count_for(Local::now().date_naive()), 0);
    }

    #[test]
    fn test_oversized_payload_is_truncated() {
        let tmp = tempfile::tempdir().unwrap();
        let dispatcher = dispatcher_in(&tmp);

        let payload = vec![b'7'; 500];
        let outcome = dispatcher.resolve(&payload);

        assert_eq!(outcome.uid().len(), 63);
        assert!(!outcome.is_known());
    }

    #[test]
    fn test_unreadable_roster_classifies_unknown() {
        let tmp = tempfile::tempdir().unwrap();
        let dispatcher = dispatcher_in(&tmp);
        fs::remove_file(dispatcher.roster().path()).unwrap();

        assert!(!dispatcher.resolve(b"A1").is_known());
    }

    #[test]
    fn test_queue_failure_still_records_attendance() {
        let tmp = tempfile::tempdir().unwrap();
        let dispatcher = dispatcher_in(&tmp);
        // A directory in place of the queue file makes every append fail.
        fs::create_dir(dispatcher.queue().path()).unwrap();

        let outcome = dispatcher.resolve(b"B2");

        assert!(outcome.is_known());
        assert_eq!(dispatcher.attendance().count_for(Local::now().date_naive()), 1);
    }
}
