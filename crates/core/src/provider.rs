//! Vendor and transport seams.
//!
//! A [`VendorAdapter`] knows one vendor's wire format: it turns a session
//! into a request body and hands out a [`StreamDecoder`] that normalizes
//! the vendor's stream objects. The bytes themselves move through an
//! [`HttpTransport`], so the turn logic never touches a socket directly.
//!
//! Implementations: Gemini, OpenAI-compatible (OpenAI, Grok), Claude.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::pin::Pin;

use crate::error::{TransportError, TurnError};
use crate::finish::FinishReason;
use crate::message::{Role, Session};
use crate::tool::ToolCall;

/// An outgoing POST request.
#[derive(Clone)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl std::fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let url = match self.url.split_once("key=") {
            Some((prefix, _)) => format!("{prefix}key=[REDACTED]"),
            None => self.url.clone(),
        };
        let headers: Vec<_> = self
            .headers
            .iter()
            .map(|(k, v)| {
                let sensitive = k.eq_ignore_ascii_case("authorization")
                    || k.eq_ignore_ascii_case("x-api-key");
                (k.as_str(), if sensitive { "[REDACTED]" } else { v.as_str() })
            })
            .collect();
        f.debug_struct("HttpRequest")
            .field("url", &url)
            .field("headers", &headers)
            .finish_non_exhaustive()
    }
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Response body as a stream of raw byte chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, TransportError>> + Send>>;

/// Status plus a body that has not been read yet.
pub struct HttpResponse {
    pub status: u16,
    pub body: ByteStream,
}

impl HttpResponse {
    /// A response whose body is already in memory.
    pub fn from_chunks(status: u16, chunks: Vec<Vec<u8>>) -> Self {
        Self {
            status,
            body: Box::pin(futures::stream::iter(chunks.into_iter().map(Ok))),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Drain the body into a string (used for error bodies).
    pub async fn text(mut self) -> Result<String, TransportError> {
        let mut buf = Vec::new();
        while let Some(chunk) = self.body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Sends one request attempt. Retries are the caller's business.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// A normalized piece of a streamed response.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    /// Model text, in arrival order
    Text(String),
    /// A function-call part was seen; one per part
    ToolCallStarted(String),
    /// The vendor reported why it stopped
    Finish(FinishReason),
}

/// Per-request decoder state.
///
/// Fed one complete JSON object at a time. Tool calls are assembled
/// across objects and only handed out by [`StreamDecoder::finish`].
pub trait StreamDecoder: Send {
    fn decode(&mut self, object: Value) -> Result<Vec<StreamItem>, TurnError>;

    /// Tool calls collected over the whole stream, in stream order.
    fn finish(&mut self) -> Result<Vec<ToolCall>, TurnError>;
}

/// One vendor's request shape and stream vocabulary.
pub trait VendorAdapter: Send + Sync {
    /// Vendor name as used in app settings (`gemini`, `openai`, ...).
    fn name(&self) -> &str;

    /// Name of the key resolved through [`ConfigSource::lookup`].
    fn api_key_name(&self) -> &str;

    /// Recursion cap used when the app does not set one.
    fn default_max_function_calls(&self) -> u32;

    /// Build the request for the next round. Pure in `(session, role)`.
    fn build_request(&self, session: &Session, role: Role, api_key: &str) -> HttpRequest;

    fn new_decoder(&self) -> Box<dyn StreamDecoder>;
}

/// Read-only access to configured secrets and settings.
pub trait ConfigSource: Send + Sync {
    fn lookup(&self, key: &str) -> Option<String>;
}

impl ConfigSource for HashMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}
