//! Roster Store: read-only UID lookup against the roster CSV
//!
//! The file is re-read and scanned line by line on every lookup, so edits
//! to the roster take effect on the next scan without a restart. There is
//! no in-memory index; lookup cost grows with roster size.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::types::RosterRecord;

/// Roster lookup over a `uid,name,roll,class` file.
#[derive(Debug, Clone)]
pub struct RosterStore {
    path: PathBuf,
}

impl RosterStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Find the first roster record whose UID matches exactly.
    ///
    /// An unreadable roster is treated as "not found", so every tag is
    /// classified unknown until the file is restored. Lines with fewer
    /// than four fields are skipped.
    pub fn lookup(&self, uid: &str) -> Option<RosterRecord> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Roster unreadable, treating tag as unknown");
                return None;
            }
        };

        let found = BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .filter_map(|line| RosterRecord::parse_line(&line))
            .find(|record| record.uid == uid);

        if found.is_none() {
            debug!(uid, "UID not on roster");
        }
        found
    }

    /// Number of well-formed roster records. Zero if the file is unreadable.
    pub fn len(&self) -> usize {
        File::open(&self.path).map_or(0, |file| {
            BufReader::new(file)
                .lines()
                .map_while(Result::ok)
                .filter(|line| RosterRecord::parse_line(line).is_some())
                .count()
        })
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn roster_with(contents: &str) -> (tempfile::TempDir, RosterStore) {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("students.csv");
        fs::write(&path, contents).unwrap();
        let store = RosterStore::new(&path);
        (tmp, store)
    }

    #[test]
    fn test_lookup_known_uid() {
        let (_tmp, store) = roster_with("A1,Jane,07,10A\nB2,Ravi,12,9B\n");

        let record = store.lookup("B2").unwrap();
        assert_eq!(record.name, "Ravi");
        assert_eq!(record.roll, "12");
        assert_eq!(record.class, "9B");
    }

    #[test]
    fn test_lookup_unknown_uid() {
        let (_tmp, store) = roster_with("A1,Jane,07,10A\n");
        assert!(store.lookup("ZZZZ").is_none());
    }

    #[test]
    fn test_first_match_wins() {
        let (_tmp, store) = roster_with("A1,Jane,07,10A\nA1,Impostor,99,1Z\n");
        assert_eq!(store.lookup("A1").unwrap().name, "Jane");
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let (_tmp, store) = roster_with("garbage\nA1,Jane\n\nB2,Ravi,12,9B\n");

        assert!(store.lookup("A1").is_none());
        assert_eq!(store.lookup("B2").unwrap().name, "Ravi");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_uid_match_is_exact() {
        let (_tmp, store) = roster_with("A1,Jane,07,10A\n");
        assert!(store.lookup("A").is_none());
        assert!(store.lookup("A10").is_none());
        assert!(store.lookup("a1").is_none());
    }

    #[test]
    fn test_unreadable_roster_is_unknown() {
        let tmp = tempfile::tempdir().unwrap();
        let store = RosterStore::new(tmp.path().join("missing.csv"));

        assert!(store.lookup("A1").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_roster_edits_visible_without_reload() {
        let (tmp, store) = roster_with("A1,Jane,07,10A\n");
        assert!(store.lookup("C3").is_none());

        fs::write(tmp.path().join("students.csv"), "A1,Jane,07,10A\nC3,Mei,03,11C\n").unwrap();
        assert_eq!(store.lookup("C3").unwrap().name, "Mei");
    }
}
