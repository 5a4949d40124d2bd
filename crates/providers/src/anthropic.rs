//! Anthropic Claude adapter.
//!
//! Uses Anthropic's Messages API directly.
//!
//! Features:
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as top-level field
//! - Native tool use with `tool_use` / `tool_result` content blocks
//! - Streaming via SSE with `content_block_*` and `message_delta` events

use monadic_core::{
    FinishReason, HttpRequest, Role, Session, SessionMessage, StreamDecoder, StreamItem, ToolCall,
    ToolRound, TurnError, VendorAdapter,
};
use serde_json::{Map, Value, json};
use tracing::{debug, trace};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct ClaudeAdapter {
    base_url: String,
}

impl ClaudeAdapter {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn to_api_message(msg: &SessionMessage) -> Value {
        let role = match msg.role {
            Role::Assistant => "assistant",
            _ => "user",
        };
        match &msg.image {
            Some(image) => {
                let mut content = Vec::new();
                if !msg.text.is_empty() {
                    content.push(json!({ "type": "text", "text": msg.text }));
                }
                content.push(json!({
                    "type": "image",
                    "source": {
                        "type": "base64",
                        "media_type": image.mime_type,
                        "data": image.base64_payload(),
                    }
                }));
                json!({ "role": role, "content": content })
            }
            None => json!({ "role": role, "content": msg.text }),
        }
    }

    /// Assistant `tool_use` blocks, then a user turn of `tool_result` blocks.
    fn round_messages(round: &ToolRound) -> [Value; 2] {
        let mut blocks = Vec::new();
        if !round.text.is_empty() {
            blocks.push(json!({ "type": "text", "text": round.text }));
        }
        blocks.extend(round.results.iter().map(|r| {
            json!({
                "type": "tool_use",
                "id": r.call.id,
                "name": r.call.name,
                "input": r.call.arguments,
            })
        }));

        let results: Vec<Value> = round
            .results
            .iter()
            .map(|r| {
                json!({
                    "type": "tool_result",
                    "tool_use_id": r.call.id,
                    "content": r.return_value,
                })
            })
            .collect();

        [
            json!({ "role": "assistant", "content": blocks }),
            json!({ "role": "user", "content": results }),
        ]
    }
}

impl Default for ClaudeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl VendorAdapter for ClaudeAdapter {
    fn name(&self) -> &str {
        "claude"
    }

    fn api_key_name(&self) -> &str {
        "ANTHROPIC_API_KEY"
    }

    fn default_max_function_calls(&self) -> u32 {
        10
    }

    fn build_request(&self, session: &Session, _role: Role, api_key: &str) -> HttpRequest {
        let params = &session.parameters;

        // The Messages API rejects a conversation that opens with the assistant.
        let mut messages: Vec<Value> = session
            .context_messages()
            .iter()
            .filter(|m| m.role != Role::System)
            .skip_while(|m| m.role != Role::User)
            .map(Self::to_api_message)
            .collect();
        for round in &params.tool_rounds {
            messages.extend(Self::round_messages(round));
        }

        let mut body = json!({
            "model": params.model,
            "messages": messages,
            "max_tokens": params.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "stream": true,
        });

        let prompt = params.system_prompt();
        if !prompt.is_empty() {
            body["system"] = json!(prompt);
        }
        if let Some(t) = params.temperature {
            body["temperature"] = json!(t);
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
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.parameters,
                    })
                })
                .collect();
            body["tools"] = json!(tools);
        }

        debug!(vendor = "claude", model = %params.model, "Built request");

        HttpRequest {
            url: format!("{}/messages", self.base_url),
            headers: vec![
                ("x-api-key".into(), api_key.to_string()),
                ("anthropic-version".into(), ANTHROPIC_VERSION.into()),
                ("content-type".into(), "application/json".into()),
            ],
            body,
        }
    }

    fn new_decoder(&self) -> Box<dyn StreamDecoder> {
        Box::new(ClaudeStreamDecoder::default())
    }
}

/// The `tool_use` block currently being streamed.
#[derive(Debug, Default)]
struct PendingToolUse {
    id: String,
    name: String,
    input_json: String,
}

impl PendingToolUse {
    fn into_tool_call(self) -> Result<ToolCall, TurnError> {
        let arguments = if self.input_json.trim().is_empty() {
            Map::new()
        } else {
            match serde_json::from_str::<Value>(&self.input_json) {
                Ok(Value::Object(map)) => map,
                Ok(_) | Err(_) => {
                    let reason = format!("input is not a JSON object: {}", self.input_json);
                    return Err(TurnError::invalid_arguments(self.name, reason));
                }
            }
        };
        Ok(ToolCall {
            id: self.id,
            name: self.name,
            arguments,
        })
    }
}

/// Decoder state for one Claude SSE stream.
#[derive(Debug, Default)]
pub struct ClaudeStreamDecoder {
    current: Option<PendingToolUse>,
    calls: Vec<ToolCall>,
}

impl ClaudeStreamDecoder {
    fn close_block(&mut self) -> Result<(), TurnError> {
        if let Some(pending) = self.current.take() {
            self.calls.push(pending.into_tool_call()?);
        }
        Ok(())
    }
}

impl StreamDecoder for ClaudeStreamDecoder {
    fn decode(&mut self, event: Value) -> Result<Vec<StreamItem>, TurnError> {
        let mut items = Vec::new();

        match event["type"].as_str().unwrap_or("") {
            "error" => {
                return Err(TurnError::Vendor {
                    status: 200,
                    body: event["error"].to_string(),
                });
            }
            "content_block_start" => {
                let block = &event["content_block"];
                if block["type"].as_str() == Some("tool_use") {
                    self.close_block()?;
                    let name = block["name"].as_str().unwrap_or_default().to_string();
                    items.push(StreamItem::ToolCallStarted(name.clone()));
                    self.current = Some(PendingToolUse {
                        id: block["id"].as_str().unwrap_or_default().to_string(),
                        name,
                        input_json: String::new(),
                    });
                }
            }
            "content_block_delta" => {
                let delta = &event["delta"];
                match delta["type"].as_str().unwrap_or("") {
                    "text_delta" => {
                        if let Some(text) = delta["text"].as_str().filter(|t| !t.is_empty()) {
                            items.push(StreamItem::Text(text.to_string()));
                        }
                    }
                    "input_json_delta" => {
                        if let (Some(pending), Some(partial)) =
                            (self.current.as_mut(), delta["partial_json"].as_str())
                        {
                            pending.input_json.push_str(partial);
                        }
                    }
                    other => trace!(delta_type = other, "Ignoring delta"),
                }
            }
            "content_block_stop" => self.close_block()?,
            "message_delta" => {
                if let Some(reason) = event["delta"]["stop_reason"].as_str() {
                    items.push(StreamItem::Finish(FinishReason::from_claude(reason)));
                }
            }
            _ => {}
        }

        Ok(items)
    }

    fn finish(&mut self) -> Result<Vec<ToolCall>, TurnError> {
        self.close_block()?;
        Ok(std::mem::take(&mut self.calls))
    }
}
