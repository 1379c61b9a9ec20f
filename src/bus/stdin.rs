//! Stdin bus: one UID per line, responses go to the log.
//!
//! Used to exercise a station without a broker:
//! `printf 'A1\nZZZZ\n' | rollcall --stdin`
//!
//! Lines are read on a background task and handed over a channel.
//! `read_line` is not cancel-safe, and the processing loop drops
//! `next_event` whenever the sync timer fires; `mpsc::Receiver::recv` is.

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::info;

use super::{BusEvent, ScanBus};

/// Lines buffered between the reader task and the processing loop.
const LINE_CHANNEL_CAPACITY: usize = 64;

pub struct StdinBus {
    lines: mpsc::Receiver<std::io::Result<String>>,
}

impl StdinBus {
    /// Read from process stdin. Must be called inside a tokio runtime.
    pub fn new() -> Self {
        Self::from_reader(tokio::io::stdin())
    }

    /// Read lines from any async reader.
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if tx.send(Ok(line)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        break;
                    }
                }
            }
        });
        Self { lines: rx }
    }
}

impl Default for StdinBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScanBus for StdinBus {
    async fn next_event(&mut self) -> Result<BusEvent> {
        loop {
            match self.lines.recv().await {
                None => return Ok(BusEvent::Closed),
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    return Ok(BusEvent::Scan(line.into_bytes()));
                }
            }
        }
    }

    async fn publish_response(&mut self, payload: &str) -> Result<()> {
        info!(response = payload, "[stdin] Response");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.lines.close();
        Ok(())
    }

    fn bus_name(&self) -> &str {
        "stdin"
    }
}
