//! Single-threaded worker loop shared by every bus mode.
//!
//! Scan handling and sync passes run on the same task, one at a time. The
//! pending queue's read-all/rewrite-all replacement relies on that: no
//! enqueue can land while a sync pass has the queue open.

use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::dispatcher::EventDispatcher;
use crate::bus::{BusEvent, ScanBus};
use crate::outbox::{Courier, SyncEngine, SyncReport};
use crate::types::ScanOutcome;

// ============================================================================
// Statistics
// ============================================================================

/// Counters reported when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessingStats {
    pub scans: u64,
    pub recorded: u64,
    pub unknown: u64,
    pub sync_passes: u64,
    pub offline_passes: u64,
    pub delivered: u64,
}

impl ProcessingStats {
    fn record_scan(&mut self, outcome: &ScanOutcome) {
        self.scans += 1;
        if outcome.is_known() {
            self.recorded += 1;
        } else {
            self.unknown += 1;
        }
    }

    fn record_sync(&mut self, report: SyncReport) {
        self.sync_passes += 1;
        match report {
            SyncReport::Offline => self.offline_passes += 1,
            SyncReport::Drained(drain) => self.delivered += drain.delivered as u64,
            SyncReport::StorageFailed => {}
        }
    }
}

// ============================================================================
// Processing Loop
// ============================================================================

/// What woke the loop up.
enum Wakeup {
    Shutdown,
    SyncDue,
    Bus(anyhow::Result<BusEvent>),
}

/// Owns the bus, dispatcher and sync engine for the lifetime of the bridge.
pub struct ProcessingLoop<B: ScanBus, C: Courier> {
    bus: B,
    dispatcher: EventDispatcher,
    sync: SyncEngine<C>,
    sync_interval: Duration,
    cancel_token: CancellationToken,
}

impl<B: ScanBus, C: Courier> ProcessingLoop<B, C> {
    pub const fn new(
        bus: B,
        dispatcher: EventDispatcher,
        sync: SyncEngine<C>,
        sync_interval: Duration,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            bus,
            dispatcher,
            sync,
            sync_interval,
            cancel_token,
        }
    }

    /// Run until cancelled or the bus closes, then disconnect.
    ///
    /// The first sync pass runs immediately, then every `sync_interval`.
    /// An unrecoverable bus error still disconnects and logs statistics,
    /// then is returned.
    pub async fn run(mut self) -> anyhow::Result<ProcessingStats> {
        let mut stats = ProcessingStats::default();
        let mut bus_failure = None;
        let mut sync_timer = tokio::time::interval(self.sync_interval);
        sync_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            bus = self.bus.bus_name(),
            sync_interval_secs = self.sync_interval.as_secs(),
            "📡 Listening for scans"
        );

        loop {
            let wakeup = tokio::select! {
                biased;
                () = self.cancel_token.cancelled() => Wakeup::Shutdown,
                _ = sync_timer.tick() => Wakeup::SyncDue,
                result = self.bus.next_event() => Wakeup::Bus(result),
            };

            match wakeup {
                Wakeup::Shutdown => {
                    info!("[ProcessingLoop] Shutdown signal received");
                    break;
                }
                Wakeup::SyncDue => {
                    let report = self.sync.run_pass().await;
                    stats.record_sync(report);
                }
                Wakeup::Bus(Ok(BusEvent::Scan(payload))) => {
                    let outcome = self.dispatcher.handle(&mut self.bus, &payload).await;
                    stats.record_scan(&outcome);
                }
                Wakeup::Bus(Ok(BusEvent::Closed)) => {
                    info!(scans = stats.scans, "[ProcessingLoop] Bus closed");
                    break;
                }
                Wakeup::Bus(Err(e)) => {
                    error!(error = %e, "[ProcessingLoop] Bus failed");
                    bus_failure = Some(e);
                    break;
                }
            }
        }

        if let Err(e) = self.bus.disconnect().await {
            warn!(error = %e, "Bus disconnect failed");
        }

        let pending = self.sync.queue().pending_count().unwrap_or_default();
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("📊 FINAL STATISTICS");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("   Scans Received:       {}", stats.scans);
        info!("   Attendance Recorded:  {}", stats.recorded);
        info!("   Unknown Tags:         {}", stats.unknown);
        info!("   Sync Passes:          {} ({} offline)", stats.sync_passes, stats.offline_passes);
        info!("   Records Delivered:    {}", stats.delivered);
        info!("   Still Pending:        {}", pending);
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        match bus_failure {
            Some(e) => Err(e.context(format!("{} bus failed", self.bus.bus_name()))),
            None => Ok(stats),
        }
    }
}
