//! Message bus abstraction for scan ingestion and response publishing.
//!
//! Provides a unified trait over where scans come from: an MQTT broker in
//! production, or stdin for bench testing a station without a broker.

use anyhow::Result;
use async_trait::async_trait;

pub mod mqtt;
pub mod stdin;

pub use mqtt::MqttBus;
pub use stdin::StdinBus;

/// Events produced by a bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// Raw payload received on the scan topic.
    Scan(Vec<u8>),
    /// The bus will deliver no more scans (EOF for stdin).
    Closed,
}

/// Trait abstracting the publish/subscribe transport.
///
/// The processing loop calls [`next_event`](ScanBus::next_event) inside a
/// `select!` with cancellation and the sync timer, so implementations must
/// tolerate the returned future being dropped before it completes.
#[async_trait]
pub trait ScanBus: Send + 'static {
    /// Wait for the next scan.
    ///
    /// Returns `Err` only on unrecoverable failures; transient connection
    /// loss is handled inside the implementation.
    async fn next_event(&mut self) -> Result<BusEvent>;

    /// Publish a lookup result on the response topic.
    async fn publish_response(&mut self, payload: &str) -> Result<()>;

    /// Disconnect cleanly. Called once, on shutdown.
    async fn disconnect(&mut self) -> Result<()>;

    /// Human-readable name for logging (e.g. "MQTT", "stdin").
    fn bus_name(&self) -> &str;
}
