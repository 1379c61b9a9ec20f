//! Scan Processing Pipeline
//!
//! ```text
//! bus scan ──> EventDispatcher ──> RosterStore lookup
//!                                    ├─ found:   AttendanceLog + PendingQueue ─> "name,roll,class"
//!                                    └─ unknown: UnknownLog                   ─> "UNKNOWN"
//!
//! sync timer ──> SyncEngine ──> probe ──> PendingQueue::drain_and_retry
//! ```
//!
//! Both paths run on one task inside [`ProcessingLoop`].

mod dispatcher;
pub mod processing_loop;

pub use dispatcher::EventDispatcher;
pub use processing_loop::{ProcessingLoop, ProcessingStats};
