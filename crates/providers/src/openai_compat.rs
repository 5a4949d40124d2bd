//! OpenAI-compatible adapter.
//!
//! Works with: OpenAI and xAI Grok, which share the `/chat/completions`
//! request shape and the SSE delta format.
//!
//! Tool call deltas arrive indexed: the first delta of a call carries its
//! id and name, later ones append argument text. Arguments are only parsed
//! once the stream ends.

use monadic_core::{
    FinishReason, HttpRequest, Role, Session, SessionMessage, StreamDecoder, StreamItem, ToolCall,
    ToolRound, TurnError, VendorAdapter,
};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use tracing::{debug, trace};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const GROK_BASE_URL: &str = "https://api.x.ai/v1";

/// An OpenAI-compatible vendor.
pub struct OpenAiCompatAdapter {
    name: String,
    key_name: String,
    base_url: String,
}

impl OpenAiCompatAdapter {
    pub fn new(
        name: impl Into<String>,
        key_name: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            key_name: key_name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// OpenAI (convenience constructor).
    pub fn openai() -> Self {
        Self::new("openai", "OPENAI_API_KEY", OPENAI_BASE_URL)
    }

    /// xAI Grok (convenience constructor).
    pub fn grok() -> Self {
        Self::new("grok", "XAI_API_KEY", GROK_BASE_URL)
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn to_api_message(msg: &SessionMessage) -> Value {
        let role = match msg.role {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Tool => "tool",
        };
        match &msg.image {
            Some(image) if msg.role == Role::User => {
                let mut content = Vec::new();
                if !msg.text.is_empty() {
                    content.push(json!({ "type": "text", "text": msg.text }));
                }
                content.push(json!({ "type": "image_url", "image_url": { "url": image.data } }));
                json!({ "role": role, "content": content })
            }
            _ => json!({ "role": role, "content": msg.text }),
        }
    }

    /// The assistant's call message followed by one `tool` message per result.
    fn round_messages(round: &ToolRound) -> Vec<Value> {
        let calls: Vec<Value> = round
            .results
            .iter()
            .map(|r| {
                json!({
                    "id": r.call.id,
                    "type": "function",
                    "function": {
                        "name": r.call.name,
                        "arguments": Value::Object(r.call.arguments.clone()).to_string(),
                    }
                })
            })
            .collect();

        let content = if round.text.is_empty() {
            Value::Null
        } else {
            json!(round.text)
        };

        let mut messages = vec![json!({
            "role": "assistant",
            "content": content,
            "tool_calls": calls,
        })];
        messages.extend(round.results.iter().map(|r| {
            json!({
                "role": "tool",
                "tool_call_id": r.call.id,
                "name": r.call.name,
                "content": r.return_value,
            })
        }));
        messages
    }
}

impl VendorAdapter for OpenAiCompatAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn api_key_name(&self) -> &str {
        &self.key_name
    }

    fn default_max_function_calls(&self) -> u32 {
        10
    }

    fn build_request(&self, session: &Session, _role: Role, api_key: &str) -> HttpRequest {
        let params = &session.parameters;

        let mut messages = Vec::new();
        let prompt = params.system_prompt();
        if !prompt.is_empty() {
            messages.push(json!({ "role": "system", "content": prompt }));
        }
        messages.extend(session.context_messages().iter().map(Self::to_api_message));
        for round in &params.tool_rounds {
            messages.extend(Self::round_messages(round));
        }

        let mut body = json!({
            "model": params.model,
            "stream": true,
            "messages": messages,
        });

        if let Some(t) = params.temperature {
            body["temperature"] = json!(t);
        }
        if let Some(m) = params.max_tokens {
            body["max_tokens"] = json!(m);
        }
        if let Some(p) = params.top_p {
            body["top_p"] = json!(p);
        }

        if !params.tools.is_empty() {
            let tools: Vec<Value> = params
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = json!(tools);
        }

        debug!(vendor = %self.name, model = %params.model, "Built request");

        HttpRequest {
            url: format!("{}/chat/completions", self.base_url),
            headers: vec![
                ("Authorization".into(), format!("Bearer {api_key}")),
                ("Content-Type".into(), "application/json".into()),
                ("Accept".into(), "text/event-stream".into()),
            ],
            body,
        }
    }

    fn new_decoder(&self) -> Box<dyn StreamDecoder> {
        Box::new(OpenAiStreamDecoder::default())
    }
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

/// A tool call delta. Arrives incrementally across chunks.
#[derive(Debug, Deserialize)]
struct StreamToolCallDelta {
    #[serde(default)]
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

/// Accumulates incremental tool call deltas into a complete tool call.
#[derive(Debug, Default)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    arguments: String,
}

impl ToolCallAccumulator {
    fn into_tool_call(self) -> Result<ToolCall, TurnError> {
        let arguments = if self.arguments.trim().is_empty() {
            Map::new()
        } else {
            match serde_json::from_str::<Value>(&self.arguments) {
                Ok(Value::Object(map)) => map,
                Ok(other) => {
                    return Err(TurnError::invalid_arguments(
                        self.name,
                        format!("arguments are not an object: {other}"),
                    ));
                }
                Err(e) => {
                    return Err(TurnError::invalid_arguments(
                        self.name,
                        format!("arguments are not valid JSON: {e}"),
                    ));
                }
            }
        };

        if self.id.is_empty() {
            return Ok(ToolCall::generated(self.name, arguments));
        }
        Ok(ToolCall {
            id: self.id,
            name: self.name,
            arguments,
        })
    }
}

/// Decoder state for one OpenAI-compatible stream.
#[derive(Debug, Default)]
pub struct OpenAiStreamDecoder {
    // Keyed by delta index; BTreeMap keeps stream order.
    accumulators: BTreeMap<u32, ToolCallAccumulator>,
}

impl StreamDecoder for OpenAiStreamDecoder {
    fn decode(&mut self, object: Value) -> Result<Vec<StreamItem>, TurnError> {
        if let Some(error) = object.get("error") {
            return Err(TurnError::Vendor {
                status: 200,
                body: error.to_string(),
            });
        }

        let resp: StreamResponse = match serde_json::from_value(object) {
            Ok(r) => r,
            Err(e) => {
                trace!(error = %e, "Ignoring unrecognized stream object");
                return Ok(Vec::new());
            }
        };

        let mut items = Vec::new();
        let Some(choice) = resp.choices.into_iter().next() else {
            return Ok(items);
        };

        if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
            items.push(StreamItem::Text(content));
        }

        for delta in choice.delta.tool_calls.unwrap_or_default() {
            let acc = self.accumulators.entry(delta.index).or_default();
            if let Some(id) = delta.id {
                acc.id = id;
            }
            if let Some(func) = delta.function {
                if let Some(name) = func.name.filter(|n| !n.is_empty()) {
                    if acc.name.is_empty() {
                        items.push(StreamItem::ToolCallStarted(name.clone()));
                    }
                    acc.name = name;
                }
                if let Some(args) = func.arguments {
                    acc.arguments.push_str(&args);
                }
            }
        }

        if let Some(reason) = choice.finish_reason {
            items.push(StreamItem::Finish(FinishReason::from_openai(&reason)));
        }

        Ok(items)
    }

    fn finish(&mut self) -> Result<Vec<ToolCall>, TurnError> {
        std::mem::take(&mut self.accumulators)
            .into_values()
            .map(ToolCallAccumulator::into_tool_call)
            .collect()
    }
}
