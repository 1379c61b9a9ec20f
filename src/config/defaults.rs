//! System-wide default constants.
//!
//! Every value here is the built-in default for a field in
//! [`RollcallConfig`](super::RollcallConfig). Grouped by subsystem.

// ============================================================================
// Message Bus
// ============================================================================

/// MQTT broker host.
pub const BROKER_HOST: &str = "localhost";

/// MQTT broker port.
pub const BROKER_PORT: u16 = 1883;

/// MQTT client identifier.
pub const BROKER_CLIENT_ID: &str = "rollcall";

/// MQTT keep-alive interval (seconds).
pub const BROKER_KEEP_ALIVE_SECS: u64 = 60;

/// Topic the tag readers publish raw UIDs on.
pub const SCAN_TOPIC: &str = "rfid/uid";

/// Topic the lookup result is published back on.
pub const RESPONSE_TOPIC: &str = "rfid/response";

/// How long startup waits for the broker's ConnAck before giving up (seconds).
pub const BROKER_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Pause between reconnection attempts after the broker connection drops (seconds).
pub const BROKER_RECONNECT_DELAY_SECS: u64 = 5;

/// Capacity of the request channel between the MQTT client handle and its event loop.
pub const BROKER_CHANNEL_CAPACITY: usize = 10;

// ============================================================================
// Storage
// ============================================================================

/// Directory all data files are resolved against.
pub const DATA_DIR: &str = ".";

/// Roster file (`uid,name,roll,class`).
pub const ROSTER_FILE: &str = "students.csv";

/// Unknown-tag log (`uid`).
pub const UNKNOWN_FILE: &str = "unknown.csv";

/// Pending delivery queue (`name,roll,class,uid`).
pub const PENDING_FILE: &str = "pending_upload.csv";

/// Attendance partition prefix. Files are named `<prefix>_YYYY-MM-DD.csv`.
pub const ATTENDANCE_PREFIX: &str = "attendance";

// ============================================================================
// Delivery
// ============================================================================

/// Remote attendance endpoint. Must be replaced with the deployed web app URL.
pub const ENDPOINT_URL: &str = "https://script.google.com/macros/s/DEPLOYMENT_ID/exec";

/// Well-known HTTPS target used only as a liveness gate.
pub const PROBE_URL: &str = "https://www.google.com";

/// Connectivity probe timeout (seconds).
pub const PROBE_TIMEOUT_SECS: u64 = 3;

/// Per-record delivery timeout (seconds).
pub const REQUEST_TIMEOUT_SECS: u64 = 5;

/// Interval between sync passes (seconds).
pub const SYNC_INTERVAL_SECS: u64 = 30;

// ============================================================================
// Scan Decoding
// ============================================================================

/// Maximum UID length in bytes. Longer payloads are truncated.
pub const MAX_UID_LEN: usize = 63;

/// Fixed response payload for tags that are not on the roster.
pub const UNKNOWN_RESPONSE: &str = "UNKNOWN";
