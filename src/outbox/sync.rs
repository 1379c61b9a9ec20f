//! Delivery Sync Engine: one probe-then-drain pass over the pending queue
//!
//! The processing loop calls [`SyncEngine::run_pass`] on a fixed interval.
//! No backoff: a record that fails is simply retried on the next pass,
//! indefinitely.

use tracing::{debug, info, warn};

use super::courier::Courier;
use super::queue::{DrainReport, PendingQueue};

/// Result of one sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncReport {
    /// Probe failed; the queue was not touched.
    Offline,
    /// Queue was drained (possibly with nothing in it).
    Drained(DrainReport),
    /// Queue could not be read or rewritten; retried next pass.
    StorageFailed,
}

/// Drains the pending queue against a [`Courier`].
#[derive(Debug)]
pub struct SyncEngine<C: Courier> {
    queue: PendingQueue,
    courier: C,
}

impl<C: Courier> SyncEngine<C> {
    pub const fn new(queue: PendingQueue, courier: C) -> Self {
        Self { queue, courier }
    }

    pub const fn queue(&self) -> &PendingQueue {
        &self.queue
    }

    /// Probe connectivity, then attempt every queued record once.
    pub async fn run_pass(&self) -> SyncReport {
        if !self.courier.is_reachable().await {
            debug!("Sync pass skipped: endpoint unreachable");
            return SyncReport::Offline;
        }

        let courier = &self.courier;
        let result = self
            .queue
            .drain_and_retry(|record| async move {
                match courier.deliver(&record).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(uid = %record.uid, error = %e, "Delivery failed, will retry next pass");
                        false
                    }
                }
            })
            .await;

        match result {
            Ok(report) => {
                if report.attempted > 0 {
                    info!(
                        delivered = report.delivered,
                        retained = report.retained,
                        "Sync pass complete"
                    );
                }
                SyncReport::Drained(report)
            }
            Err(e) => {
                warn!(error = %e, "Sync pass failed on pending queue");
                SyncReport::StorageFailed
            }
        }
    }
}
