//! Core record types shared by the storage, outbox and pipeline modules.
//!
//! Every durable file is flat, line-oriented, comma-separated text. UIDs,
//! names and roll numbers never contain commas; the class field may, so
//! it is always parsed as "whatever sits between the fixed fields".

use chrono::{Local, NaiveDate, NaiveDateTime};
use std::fmt;

use crate::config::defaults::UNKNOWN_RESPONSE;

fn strip_line_ending(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}

// ============================================================================
// Roster
// ============================================================================

/// One person on the roster, keyed by the UID of their tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterRecord {
    pub uid: String,
    pub name: String,
    pub roll: String,
    pub class: String,
}

impl RosterRecord {
    /// Parse a roster line (`uid,name,roll,class`). Class takes the remainder.
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut parts = strip_line_ending(line).splitn(4, ',');
        let (uid, name, roll, class) = (
            parts.next()?,
            parts.next()?,
            parts.next()?,
            parts.next()?,
        );
        Some(Self {
            uid: uid.to_string(),
            name: name.to_string(),
            roll: roll.to_string(),
            class: class.to_string(),
        })
    }

    /// Response payload published for a resolved scan (`name,roll,class`).
    pub fn response_payload(&self) -> String {
        format!("{},{},{}", self.name, self.roll, self.class)
    }
}

impl fmt::Display for RosterRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.uid, self.name, self.roll, self.class)
    }
}

// ============================================================================
// Attendance
// ============================================================================

/// A resolved scan, stamped with local wall-clock time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceEvent {
    pub timestamp: NaiveDateTime,
    pub record: RosterRecord,
}

impl AttendanceEvent {
    /// Stamp a record with the current local time.
    pub fn now(record: RosterRecord) -> Self {
        Self::at(Local::now().naive_local(), record)
    }

    pub const fn at(timestamp: NaiveDateTime, record: RosterRecord) -> Self {
        Self { timestamp, record }
    }

    /// Calendar date the event is partitioned under.
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// Attendance line (`date,time,uid,name,roll,class`).
    pub fn to_line(&self) -> String {
        format!(
            "{},{},{}",
            self.timestamp.format("%Y-%m-%d"),
            self.timestamp.format("%H:%M:%S"),
            self.record
        )
    }
}

// ============================================================================
// Pending Delivery
// ============================================================================

/// A record waiting in the outbox for remote delivery.
///
/// Field order matches the queue file: `name,roll,class,uid`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRecord {
    pub name: String,
    pub roll: String,
    pub class: String,
    pub uid: String,
}

impl PendingRecord {
    /// Parse a queue line (`name,roll,class,uid`).
    ///
    /// Name and roll come off the front and the UID off the back; class is
    /// everything in between, commas included.
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut front = strip_line_ending(line).splitn(3, ',');
        let (name, roll, rest) = (front.next()?, front.next()?, front.next()?);
        let (class, uid) = rest.rsplit_once(',')?;
        Some(Self {
            name: name.to_string(),
            roll: roll.to_string(),
            class: class.to_string(),
            uid: uid.to_string(),
        })
    }

    /// Queue line without the trailing newline.
    pub fn to_line(&self) -> String {
        format!("{},{},{},{}", self.name, self.roll, self.class, self.uid)
    }
}

impl From<&RosterRecord> for PendingRecord {
    fn from(record: &RosterRecord) -> Self {
        Self {
            name: record.name.clone(),
            roll: record.roll.clone(),
            class: record.class.clone(),
            uid: record.uid.clone(),
        }
    }
}

// ============================================================================
// Scan Outcome
// ============================================================================

/// Result of resolving one scan against the roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Tag is on the roster; attendance was recorded and queued for delivery.
    Recorded(RosterRecord),
    /// Tag is not on the roster (or the roster is unreadable).
    Unknown(String),
}

impl ScanOutcome {
    /// Payload published on the response topic.
    pub fn response_payload(&self) -> String {
        match self {
            Self::Recorded(record) => record.response_payload(),
            Self::Unknown(_) => UNKNOWN_RESPONSE.to_string(),
        }
    }

    pub fn uid(&self) -> &str {
        match self {
            Self::Recorded(record) => &record.uid,
            Self::Unknown(uid) => uid,
        }
    }

    pub const fn is_known(&self) -> bool {
        matches!(self, Self::Recorded(_))
    }
}

// ============================================================================
// UID Decoding
// ============================================================================

/// Decode a raw bus payload into a bounded UID string.
///
/// Reads up to the first NUL byte, decodes lossily, keeps at most
/// `max_len` bytes (cut on a character boundary) and trims surrounding
/// whitespace. Oversized payloads are truncated, never rejected.
///
/// Commas and control characters left inside the UID are replaced with
/// `_` so the value stays one field on one line in the CSV logs. Such a
/// UID can never match the roster, whose key field has no commas.
pub fn decode_uid(payload: &[u8], max_len: usize) -> String {
    let nul = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
    // A char is at most 4 bytes, so this slice covers every complete char
    // that can start before `max_len`.
    let end = nul.min(max_len.saturating_add(3));
    let text = String::from_utf8_lossy(payload.get(..end).unwrap_or_default());

    let mut cut = max_len.min(text.len());
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }

    text.get(..cut)
        .unwrap_or_default()
        .trim()
        .chars()
        .map(|c| if c == ',' || c.is_control() { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn jane() -> RosterRecord {
        RosterRecord::parse_line("A1,Jane,07,10A\n").unwrap()
    }

    #[test]
    fn test_roster_line_parsing() {
        let record = jane();
        assert_eq!(record.uid, "A1");
        assert_eq!(record.name, "Jane");
        assert_eq!(record.roll, "07");
        assert_eq!(record.class, "10A");
        assert_eq!(record.response_payload(), "Jane,07,10A");
    }

    #[test]
    fn test_roster_line_tolerates_crlf_and_rejects_short_lines() {
        assert_eq!(RosterRecord::parse_line("A1,Jane,07,10A\r\n"), Some(jane()));
        assert_eq!(RosterRecord::parse_line("A1,Jane,07"), None);
        assert_eq!(RosterRecord::parse_line(""), None);
    }

    #[test]
    fn test_last_field_keeps_remainder() {
        let record = RosterRecord::parse_line("B2,Ravi,12,Grade 9, Section B").unwrap();
        assert_eq!(record.class, "Grade 9, Section B");
    }

    #[test]
    fn test_attendance_line_format() {
        let ts = NaiveDate::from_ymd_opt(2026, 3, 9)
            .unwrap()
            .and_hms_opt(8, 5, 3)
            .unwrap();
        let event = AttendanceEvent::at(ts, jane());
        assert_eq!(event.to_line(), "2026-03-09,08:05:03,A1,Jane,07,10A");
        assert_eq!(event.date(), NaiveDate::from_ymd_opt(2026, 3, 9).unwrap());
    }

    #[test]
    fn test_pending_record_field_order() {
        let pending = PendingRecord::from(&jane());
        assert_eq!(pending.to_line(), "Jane,07,10A,A1");
        assert_eq!(PendingRecord::parse_line("Jane,07,10A,A1\n"), Some(pending));
    }

    #[test]
    fn test_outcome_response_payload() {
        assert_eq!(ScanOutcome::Recorded(jane()).response_payload(), "Jane,07,10A");
        let unknown = ScanOutcome::Unknown("ZZZZ".to_string());
        assert_eq!(unknown.response_payload(), "UNKNOWN");
        assert_eq!(unknown.uid(), "ZZZZ");
        assert!(!unknown.is_known());
    }

    #[test]
    fn test_decode_uid_bounds_payload() {
        assert_eq!(decode_uid(b"A1", 63), "A1");
        assert_eq!(decode_uid(b"A1\n", 63), "A1");
        assert_eq!(decode_uid(b"A1\0garbage", 63), "A1");

        let long = vec![b'X'; 200];
        assert_eq!(decode_uid(&long, 63).len(), 63);
    }

    #[test]
    fn test_decode_uid_cuts_on_char_boundary() {
        // "abé" is 4 bytes; a 3-byte bound would split the é.
        assert_eq!(decode_uid("abé".as_bytes(), 3), "ab");
        assert_eq!(decode_uid("abé".as_bytes(), 4), "abé");
        assert!(!decode_uid("日本語タグ".as_bytes(), 7).contains('\u{FFFD}'));
    }

    #[test]
    fn test_decode_uid_keeps_one_field_on_one_line() {
        assert_eq!(decode_uid(b"A\nB,C", 63), "A_B_C");
        assert_eq!(decode_uid(b"  A1\r\n", 63), "A1");
    }

    #[test]
    fn test_pending_line_with_comma_in_class() {
        let roster = RosterRecord::parse_line("B2,Ravi,12,Grade 9, Section B").unwrap();
        let pending = PendingRecord::from(&roster);

        let parsed = PendingRecord::parse_line(&pending.to_line()).unwrap();
        assert_eq!(parsed.class, "Grade 9, Section B");
        assert_eq!(parsed.uid, "B2");
        assert_eq!(parsed, pending);
    }

    #[test]
    fn test_pending_line_rejects_short_lines() {
        assert_eq!(PendingRecord::parse_line("Jane,07,A1"), None);
        assert_eq!(PendingRecord::parse_line("broken-line"), None);
    }

    #[test]
    fn test_decode_uid_empty_payload() {
        assert_eq!(decode_uid(b"", 63), "");
    }
}
