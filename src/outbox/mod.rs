//! Outbox: at-least-once delivery of attendance records to the web endpoint
//!
//! ## Architecture
//!
//! - **PendingQueue**: file-backed queue, one `name,roll,class,uid` line per record
//! - **Courier**: connectivity probe + per-record HTTP delivery (`HttpCourier`)
//! - **SyncEngine**: probe-gated drain pass, run on a fixed interval
//!
//! ## Design Principles
//!
//! - Local autonomy: scans are recorded whether or not the endpoint is reachable
//! - At-least-once: a record leaves the queue only after its request completes;
//!   a crash between the two can deliver it again
//! - No de-duplication: the same tag scanned twice is delivered twice

pub mod courier;
pub mod queue;
pub mod sync;

pub use courier::{Courier, DeliveryError, HttpCourier};
pub use queue::{DrainReport, PendingQueue, QueueError};
pub use sync::{SyncEngine, SyncReport};
