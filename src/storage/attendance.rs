//! Attendance Log: date-partitioned append-only record of resolved scans
//!
//! One file per calendar date, `<prefix>_YYYY-MM-DD.csv`, each line
//! `date,time,uid,name,roll,class`. The partition is picked from the
//! event's own timestamp, which the dispatcher stamps with local time.

use chrono::NaiveDate;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{append_line, StorageError};
use crate::types::AttendanceEvent;

/// Append-only attendance partitions under a data directory.
#[derive(Debug, Clone)]
pub struct AttendanceLog {
    dir: PathBuf,
    prefix: String,
}

impl AttendanceLog {
    pub fn new<P: AsRef<Path>>(dir: P, prefix: &str) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            prefix: prefix.to_string(),
        }
    }

    /// File path of the partition for `date`.
    pub fn partition_path(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{}_{}.csv", self.prefix, date.format("%Y-%m-%d")))
    }

    /// Append one event to its date partition and flush it to disk.
    pub fn append(&self, event: &AttendanceEvent) -> Result<(), StorageError> {
        let path = self.partition_path(event.date());
        append_line(&path, &event.to_line())?;
        debug!(uid = %event.record.uid, partition = %path.display(), "Attendance logged");
        Ok(())
    }

    /// Number of lines in the partition for `date`. Zero if it does not exist.
    pub fn count_for(&self, date: NaiveDate) -> usize {
        File::open(self.partition_path(date)).map_or(0, |file| {
            BufReader::new(file)
                .lines()
                .map_while(Result::ok)
                .filter(|line| !line.is_empty())
                .count()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RosterRecord;
    use std::fs;

    fn event_on(day: u32, hour: u32, uid: &str) -> AttendanceEvent {
        let ts = NaiveDate::from_ymd_opt(2026, 10, day)
            .unwrap()
            .and_hms_opt(hour, 30, 0)
            .unwrap();
        AttendanceEvent::at(
            ts,
            RosterRecord {
                uid: uid.to_string(),
                name: "Jane".to_string(),
                roll: "07".to_string(),
                class: "10A".to_string(),
            },
        )
    }

    #[test]
    fn test_partition_naming() {
        let log = AttendanceLog::new("/data", "attendance");
        let date = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        assert_eq!(
            log.partition_path(date),
            PathBuf::from("/data/attendance_2026-01-05.csv")
        );
    }

    #[test]
    fn test_append_writes_line() {
        let tmp = tempfile::tempdir().unwrap();
        let log = AttendanceLog::new(tmp.path(), "attendance");

        let event = event_on(19, 9, "A1");
        log.append(&event).unwrap();

        let contents = fs::read_to_string(log.partition_path(event.date())).unwrap();
        assert_eq!(contents, "2026-10-19,09:30:00,A1,Jane,07,10A\n");
    }

    #[test]
    fn test_repeat_scans_each_append() {
        let tmp = tempfile::tempdir().unwrap();
        let log = AttendanceLog::new(tmp.path(), "attendance");

        log.append(&event_on(19, 9, "A1")).unwrap();
        log.append(&event_on(19, 10, "A1")).unwrap();

        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(log.count_for(date), 2);
    }

    #[test]
    fn test_events_split_by_date() {
        let tmp = tempfile::tempdir().unwrap();
        let log = AttendanceLog::new(tmp.path(), "attendance");

        log.append(&event_on(19, 23, "A1")).unwrap();
        log.append(&event_on(20, 0, "A1")).unwrap();

        assert_eq!(log.count_for(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()), 1);
        assert_eq!(log.count_for(NaiveDate::from_ymd_opt(2026, 10, 20).unwrap()), 1);
        assert_eq!(log.count_for(NaiveDate::from_ymd_opt(2026, 10, 21).unwrap()), 0);
    }
}
