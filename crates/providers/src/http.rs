//! reqwest-backed [`HttpTransport`].
//!
//! One `post` is one attempt. The connect and read timeouts are set on the
//! client; the write timeout bounds sending the request and receiving the
//! response head. The streamed body is only bounded by the read timeout,
//! so long generations are not cut off.

use async_trait::async_trait;
use futures::StreamExt;
use monadic_core::{HttpRequest, HttpResponse, HttpTransport, TransportError};
use std::time::Duration;
use tracing::debug;

/// Per-attempt timeouts.
#[derive(Debug, Clone, Copy)]
pub struct TransportTimeouts {
    pub connect: Duration,
    pub read: Duration,
    pub write: Duration,
}

impl Default for TransportTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            read: Duration::from_secs(60),
            write: Duration::from_secs(60),
        }
    }
}

pub struct ReqwestTransport {
    client: reqwest::Client,
    write_timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(timeouts: TransportTimeouts) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeouts.connect)
            .read_timeout(timeouts.read)
            .build()
            .map_err(|e| TransportError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            write_timeout: timeouts.write,
        })
    }
}

/// Map a reqwest error without leaking the URL (Gemini keys live in it).
fn map_error(e: reqwest::Error) -> TransportError {
    let timed_out = e.is_timeout();
    let message = e.without_url().to_string();
    if timed_out {
        TransportError::Timeout(message)
    } else {
        TransportError::Network(message)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        // Headers come from the adapter, content-type included.
        let body = serde_json::to_vec(&request.body)
            .map_err(|e| TransportError::Network(format!("failed to encode request body: {e}")))?;
        let mut builder = self.client.post(&request.url).body(body);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = tokio::time::timeout(self.write_timeout, builder.send())
            .await
            .map_err(|_| {
                TransportError::Timeout(format!(
                    "no response within {}s",
                    self.write_timeout.as_secs()
                ))
            })?
            .map_err(map_error)?;

        let status = response.status().as_u16();
        debug!(status, "Response received");

        let body = response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|e| TransportError::StreamInterrupted(e.without_url().to_string()))
        });

        Ok(HttpResponse {
            status,
            body: Box::pin(body),
        })
    }
}
