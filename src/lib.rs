//! Rollcall: RFID attendance bridge
//!
//! Turns tag scans arriving over MQTT into durable attendance records and
//! forwards them to a web endpoint whenever the station is online.
//!
//! ## Architecture
//!
//! - **Storage**: roster lookup, daily attendance partitions, unknown-tag log
//! - **Outbox**: file-backed pending queue drained by a probe-gated sync engine
//! - **Pipeline**: event dispatcher + single-threaded processing loop
//! - **Bus**: MQTT adapter (production) and stdin adapter (bench testing)

pub mod bus;
pub mod config;
pub mod outbox;
pub mod pipeline;
pub mod storage;
pub mod types;

pub use config::RollcallConfig;

pub use types::{AttendanceEvent, PendingRecord, RosterRecord, ScanOutcome};

pub use bus::{BusEvent, ScanBus};
pub use outbox::{Courier, DeliveryError, HttpCourier, PendingQueue, SyncEngine, SyncReport};
pub use pipeline::{EventDispatcher, ProcessingLoop, ProcessingStats};
pub use storage::{AttendanceLog, ProcessLock, RosterStore, StorageError, UnknownLog};
