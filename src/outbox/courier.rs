//! Courier: outbound HTTP delivery and connectivity probing
//!
//! The remote endpoint is a web app that takes one GET per record with a
//! single `data` query parameter: the four fields percent-escaped and
//! joined by `%20`, in order `name roll class uid`. Any completed HTTP
//! exchange counts as delivered; the status code is not inspected and
//! redirects are not followed (the usual web-app deployment answers with
//! a 302 once the request is accepted).

use async_trait::async_trait;
use reqwest::redirect::Policy;
use std::time::Duration;

use crate::config::DeliveryConfig;
use crate::types::PendingRecord;

/// Delivery errors
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(reqwest::Error),
    /// For [`Courier`] implementations that inspect the reply and refuse a
    /// record. `HttpCourier` never returns it: any completed exchange counts.
    #[error("Endpoint rejected delivery: {0}")]
    Rejected(String),
}

/// Seam between the sync engine and the network.
#[async_trait]
pub trait Courier: Send + Sync {
    /// Cheap liveness check run before every sync pass.
    async fn is_reachable(&self) -> bool;

    /// Deliver one record to the remote endpoint.
    async fn deliver(&self, record: &PendingRecord) -> Result<(), DeliveryError>;
}

/// Build the delivery URL for one record.
pub fn delivery_url(endpoint: &str, record: &PendingRecord) -> String {
    let separator = if endpoint.contains('?') { '&' } else { '?' };
    format!(
        "{endpoint}{separator}data={}%20{}%20{}%20{}",
        urlencoding::encode(&record.name),
        urlencoding::encode(&record.roll),
        urlencoding::encode(&record.class),
        urlencoding::encode(&record.uid),
    )
}

/// `reqwest`-backed courier.
#[derive(Debug, Clone)]
pub struct HttpCourier {
    http: reqwest::Client,
    endpoint_url: String,
    probe_url: String,
    probe_timeout: Duration,
    request_timeout: Duration,
}

impl HttpCourier {
    pub fn new(config: &DeliveryConfig) -> Result<Self, DeliveryError> {
        Self::with_builder(config, reqwest::Client::builder())
    }

    fn with_builder(
        config: &DeliveryConfig,
        builder: reqwest::ClientBuilder,
    ) -> Result<Self, DeliveryError> {
        let http = builder
            .redirect(Policy::none())
            .build()
            .map_err(DeliveryError::ClientBuild)?;

        Ok(Self {
            http,
            endpoint_url: config.endpoint_url.clone(),
            probe_url: config.probe_url.clone(),
            probe_timeout: config.probe_timeout(),
            request_timeout: config.request_timeout(),
        })
    }

    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }
}

#[async_trait]
impl Courier for HttpCourier {
    async fn is_reachable(&self) -> bool {
        match self
            .http
            .head(&self.probe_url)
            .timeout(self.probe_timeout)
            .send()
            .await
        {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(probe = %self.probe_url, error = %e, "Connectivity probe failed");
                false
            }
        }
    }

    async fn deliver(&self, record: &PendingRecord) -> Result<(), DeliveryError> {
        let url = delivery_url(&self.endpoint_url, record);
        let resp = self
            .http
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await?;
        tracing::debug!(uid = %record.uid, status = %resp.status(), "Record delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn jane() -> PendingRecord {
        PendingRecord {
            name: "Jane".to_string(),
            roll: "07".to_string(),
            class: "10A".to_string(),
            uid: "A1".to_string(),
        }
    }

    #[test]
    fn test_delivery_url_joins_fields_with_escaped_spaces() {
        let url = delivery_url("https://example.org/exec", &jane());
        assert_eq!(url, "https://example.org/exec?data=Jane%2007%2010A%20A1");
    }

    #[test]
    fn test_delivery_url_escapes_each_field() {
        let record = PendingRecord {
            name: "Mary Ann".to_string(),
            roll: "7&8".to_string(),
            class: "10/A".to_string(),
            uid: "A1".to_string(),
        };
        let url = delivery_url("https://example.org/exec", &record);
        assert_eq!(
            url,
            "https://example.org/exec?data=Mary%20Ann%207%268%2010%2FA%20A1"
        );
    }

    #[test]
    fn test_delivery_url_respects_existing_query() {
        let url = delivery_url("https://example.org/exec?key=1", &jane());
        assert!(url.starts_with("https://example.org/exec?key=1&data="));
    }

    /// Serve `response` to every connection on a local port, after reading
    /// the request head. Returns the base URL.
    async fn serve(response: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => head.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{addr}")
    }

    /// Accept connections and never answer.
    async fn serve_silence() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        format!("http://{addr}")
    }

    async fn closed_port_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}")
    }

    fn courier_for(url: &str) -> HttpCourier {
        let config = DeliveryConfig {
            endpoint_url: format!("{url}/exec"),
            probe_url: url.to_string(),
            probe_timeout_secs: 1,
            request_timeout_secs: 1,
            ..DeliveryConfig::default()
        };
        // Keep a host proxy setting from intercepting loopback requests.
        HttpCourier::with_builder(&config, reqwest::Client::builder().no_proxy()).unwrap()
    }

    const SERVER_ERROR: &str =
        "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

    #[tokio::test]
    async fn test_server_error_counts_as_delivered() {
        let courier = courier_for(&serve(SERVER_ERROR.to_string()).await);

        assert!(courier.is_reachable().await);
        assert!(courier.deliver(&jane()).await.is_ok());
    }

    #[tokio::test]
    async fn test_redirect_counts_as_delivered_and_is_not_followed() {
        // Following the redirect would hit a closed port and fail.
        let target = closed_port_url().await;
        let response = format!(
            "HTTP/1.1 302 Found\r\nLocation: {target}/moved\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        );
        let courier = courier_for(&serve(response).await);

        assert!(courier.deliver(&jane()).await.is_ok());
    }

    #[tokio::test]
    async fn test_refused_connection_fails() {
        let courier = courier_for(&closed_port_url().await);

        assert!(!courier.is_reachable().await);
        assert!(matches!(
            courier.deliver(&jane()).await,
            Err(DeliveryError::Http(_))
        ));
    }

    #[tokio::test]
    async fn test_silent_endpoint_times_out() {
        let courier = courier_for(&serve_silence().await);

        assert!(!courier.is_reachable().await);
        assert!(courier.deliver(&jane()).await.is_err());
    }

    #[test]
    fn test_http_courier_from_default_config() {
        let courier = HttpCourier::new(&DeliveryConfig::default()).unwrap();
        assert!(courier.endpoint_url().starts_with("https://"));
    }
}
