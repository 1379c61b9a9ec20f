//! MQTT bus adapter over `rumqttc`.
//!
//! The client handle and its event loop live together in [`MqttBus`] and
//! are driven from the processing loop's task; nothing polls the event
//! loop in the background. Outgoing publishes are flushed on the next
//! call to [`next_event`](ScanBus::next_event).
//!
//! Only the first connection is fatal. After that, a dropped connection
//! is retried every `reconnect_delay_secs` and the scan topic is
//! re-subscribed on every ConnAck, since sessions are not persisted.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{BusEvent, ScanBus};
use crate::config::defaults::BROKER_CHANNEL_CAPACITY;
use crate::config::BrokerConfig;

/// Upper bound on waiting for the DISCONNECT packet to leave on shutdown.
const DISCONNECT_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

pub struct MqttBus {
    client: AsyncClient,
    eventloop: EventLoop,
    scan_topic: String,
    response_topic: String,
    reconnect_delay: Duration,
    broker: String,
}

impl MqttBus {
    /// Connect to the broker and subscribe to the scan topic.
    ///
    /// Fails if no ConnAck arrives within `connect_timeout_secs`.
    pub async fn connect(config: &BrokerConfig) -> Result<Self> {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
        options.set_clean_session(true);

        let (client, eventloop) = AsyncClient::new(options, BROKER_CHANNEL_CAPACITY);
        let mut bus = Self {
            client,
            eventloop,
            scan_topic: config.scan_topic.clone(),
            response_topic: config.response_topic.clone(),
            reconnect_delay: Duration::from_secs(config.reconnect_delay_secs),
            broker: format!("{}:{}", config.host, config.port),
        };

        let timeout = Duration::from_secs(config.connect_timeout_secs);
        let broker = bus.broker.clone();
        tokio::time::timeout(timeout, bus.await_connack())
            .await
            .map_err(|_| anyhow!("Timed out after {timeout:?} waiting for broker {broker}"))??;

        info!(broker = %bus.broker, topic = %bus.scan_topic, "Connected to MQTT broker");
        Ok(bus)
    }

    async fn await_connack(&mut self) -> Result<()> {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => return self.subscribe().await,
                Ok(_) => {}
                Err(e) => {
                    return Err(anyhow::Error::new(e)
                        .context(format!("Failed to connect to MQTT broker {}", self.broker)));
                }
            }
        }
    }

    /// `&mut self`: `EventLoop` is not `Sync`, so `&Self` held across the
    /// await would make `next_event` non-`Send`.
    async fn subscribe(&mut self) -> Result<()> {
        self.client
            .subscribe(&self.scan_topic, QoS::AtMostOnce)
            .await
            .with_context(|| format!("Failed to subscribe to {}", self.scan_topic))
    }
}

#[async_trait]
impl ScanBus for MqttBus {
    async fn next_event(&mut self) -> Result<BusEvent> {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if publish.topic == self.scan_topic {
                        return Ok(BusEvent::Scan(publish.payload.to_vec()));
                    }
                    debug!(topic = %publish.topic, "Ignoring message on unexpected topic");
                }
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!(broker = %self.broker, "Reconnected to MQTT broker");
                    self.subscribe().await?;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        broker = %self.broker,
                        error = %e,
                        retry_in_secs = self.reconnect_delay.as_secs(),
                        "MQTT connection lost, retrying"
                    );
                    tokio::time::sleep(self.reconnect_delay).await;
                }
            }
        }
    }

    async fn publish_response(&mut self, payload: &str) -> Result<()> {
        self.client
            .publish(&self.response_topic, QoS::AtMostOnce, false, payload.as_bytes().to_vec())
            .await
            .with_context(|| format!("Failed to publish to {}", self.response_topic))
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.client
            .disconnect()
            .await
            .context("Failed to request MQTT disconnect")?;

        let eventloop = &mut self.eventloop;
        let flush = async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        };
        if tokio::time::timeout(DISCONNECT_FLUSH_TIMEOUT, flush).await.is_err() {
            warn!("Timed out flushing MQTT disconnect");
        }

        info!(broker = %self.broker, "Disconnected from MQTT broker");
        Ok(())
    }

    fn bus_name(&self) -> &str {
        "MQTT"
    }
}
