//! Shared test helpers for turn tests.

use crate::turn::{StreamingToolCallSession, TurnOptions};
use async_trait::async_trait;
use monadic_core::{
    FnTool, HttpRequest, HttpResponse, HttpTransport, Parameters, Session, ToolDefinition,
    ToolRegistry, TransportError,
};
use monadic_providers::GeminiAdapter;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted answer to a `post`.
pub enum Scripted {
    Respond { status: u16, chunks: Vec<Vec<u8>> },
    /// A 200 whose body yields these items, errors included.
    Broken(Vec<Result<Vec<u8>, TransportError>>),
    Fail(TransportError),
}

impl Scripted {
    pub fn ok(chunks: Vec<Vec<u8>>) -> Self {
        Self::Respond { status: 200, chunks }
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self::Respond {
            status,
            chunks: vec![body.as_bytes().to_vec()],
        }
    }

    pub fn fail(error: TransportError) -> Self {
        Self::Fail(error)
    }

    /// `chunks` followed by a body error.
    pub fn broken(chunks: Vec<Vec<u8>>, error: TransportError) -> Self {
        let mut items: Vec<_> = chunks.into_iter().map(Ok).collect();
        items.push(Err(error));
        Self::Broken(items)
    }
}

/// A transport that plays back a script and records every request.
///
/// Once the script runs out, every further attempt is a network error.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn attempts(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Respond { status, chunks }) => Ok(HttpResponse::from_chunks(status, chunks)),
            Some(Scripted::Broken(items)) => Ok(HttpResponse {
                status: 200,
                body: Box::pin(futures::stream::iter(items)),
            }),
            Some(Scripted::Fail(e)) => Err(e),
            None => Err(TransportError::Network("script exhausted".into())),
        }
    }
}

pub fn keys(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Fast pacing so tests do not sleep for real.
pub fn fast_options(max_call_depth: u32) -> TurnOptions {
    TurnOptions {
        max_call_depth,
        max_retries: 2,
        retry_delay: Duration::from_millis(1),
        fragment_delay: Duration::ZERO,
    }
}

pub fn gemini_session(
    transport: Arc<ScriptedTransport>,
    tools: ToolRegistry,
    max_call_depth: u32,
) -> StreamingToolCallSession {
    StreamingToolCallSession::new(
        Arc::new(GeminiAdapter::new()),
        transport,
        Arc::new(tools),
        Arc::new(keys(&[("GEMINI_API_KEY", "test-key")])),
        fast_options(max_call_depth),
    )
}

/// A session with `message` staged and the registry's tools declared.
pub fn user_session(message: &str, context_size: usize) -> Session {
    let mut session = Session::new(Parameters {
        app_name: "chat_gemini".into(),
        model: "gemini-1.5-flash".into(),
        temperature: Some(0.3),
        context_size,
        initial_prompt: "You are a helpful assistant.".into(),
        tools: vec![ToolDefinition {
            name: "current_date".into(),
            description: "Today's date".into(),
            parameters: json!({"type": "object", "properties": {}}),
        }],
        ..Parameters::default()
    });
    session.set_message(message, None);
    session
}

/// A registry with one `current_date` tool that always says 2024-05-01.
pub fn date_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(FnTool::new(
        "current_date",
        "Today's date",
        json!({"type": "object", "properties": {}}),
        |_| Ok("2024-05-01".to_string()),
    ));
    registry
}

fn gemini_array(elements: &[Value]) -> Vec<Vec<u8>> {
    vec![Value::Array(elements.to_vec()).to_string().into_bytes()]
}

pub fn gemini_text(text: &str, finish_reason: &str) -> Vec<Vec<u8>> {
    gemini_array(&[json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": finish_reason
        }]
    })])
}

pub fn gemini_call(name: &str, args: Value) -> Vec<Vec<u8>> {
    gemini_array(&[json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"functionCall": {"name": name, "args": args}}]},
            "finishReason": "STOP"
        }]
    })])
}

pub fn gemini_text_and_call(text: &str, name: &str, args: Value) -> Vec<Vec<u8>> {
    gemini_array(&[
        json!({"candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]}),
        json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"functionCall": {"name": name, "args": args}}]},
                "finishReason": "STOP"
            }]
        }),
    ])
}

/// An SSE body with one `data:` line per payload and a closing `[DONE]`.
pub fn sse(payloads: &[&str]) -> Vec<Vec<u8>> {
    let mut body = String::new();
    for p in payloads {
        body.push_str("data: ");
        body.push_str(p);
        body.push_str("\n\n");
    }
    body.push_str("data: [DONE]\n\n");
    vec![body.into_bytes()]
}

/// Cut `bytes` into chunks of `size`, ignoring character boundaries.
pub fn split_bytes(bytes: &[u8], size: usize) -> Vec<Vec<u8>> {
    bytes.chunks(size).map(<[u8]>::to_vec).collect()
}
