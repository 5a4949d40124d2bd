//! Google Gemini adapter.
//!
//! Uses the `streamGenerateContent` endpoint, which answers with one JSON
//! array whose elements arrive over time. The key travels as a query
//! parameter, not a header.
//!
//! Gemini does not assign ids to function calls, so ids are generated
//! locally (`call_<uuid>`) and only used for bookkeeping.

use monadic_core::{
    FinishReason, HttpRequest, Role, Session, SessionMessage, StreamDecoder, StreamItem, ToolCall,
    ToolRound, TurnError, VendorAdapter,
};
use serde_json::{Map, Value, json};
use tracing::{debug, trace};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

pub struct GeminiAdapter {
    base_url: String,
}

impl GeminiAdapter {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn to_content(msg: &SessionMessage) -> Value {
        let role = match msg.role {
            Role::Assistant => "model",
            Role::Tool => "function",
            Role::User | Role::System => "user",
        };
        let mut parts = Vec::new();
        if !msg.text.is_empty() || msg.image.is_none() {
            parts.push(json!({ "text": msg.text }));
        }
        if let Some(image) = &msg.image {
            parts.push(json!({
                "inlineData": {
                    "mimeType": image.mime_type,
                    "data": image.base64_payload(),
                }
            }));
        }
        json!({ "role": role, "parts": parts })
    }

    /// The model's call turn and the function-response turn for one round.
    fn round_contents(round: &ToolRound) -> [Value; 2] {
        let model_parts: Vec<Value> = round
            .results
            .iter()
            .map(|r| {
                json!({
                    "functionCall": { "name": r.call.name, "args": r.call.arguments }
                })
            })
            .collect();

        let function_parts: Vec<Value> = round
            .results
            .iter()
            .map(|r| {
                json!({
                    "functionResponse": {
                        "name": r.call.name,
                        "response": {
                            "name": r.call.name,
                            "content": { "result": r.return_value }
                        }
                    }
                })
            })
            .collect();

        [
            json!({ "role": "model", "parts": model_parts }),
            json!({ "role": "function", "parts": function_parts }),
        ]
    }
}

impl Default for GeminiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl VendorAdapter for GeminiAdapter {
    fn name(&self) -> &str {
        "gemini"
    }

    fn api_key_name(&self) -> &str {
        "GEMINI_API_KEY"
    }

    fn default_max_function_calls(&self) -> u32 {
        5
    }

    fn build_request(&self, session: &Session, _role: Role, api_key: &str) -> HttpRequest {
        let params = &session.parameters;

        let mut contents: Vec<Value> = session
            .context_messages()
            .iter()
            .filter(|m| m.role != Role::System)
            .map(Self::to_content)
            .collect();
        for round in &params.tool_rounds {
            contents.extend(Self::round_contents(round));
        }

        let safety: Vec<Value> = HARM_CATEGORIES
            .iter()
            .map(|c| json!({ "category": c, "threshold": "BLOCK_ONLY_HIGH" }))
            .collect();

        let mut body = json!({
            "contents": contents,
            "safetySettings": safety,
        });

        let mut generation = Map::new();
        if let Some(t) = params.temperature {
            generation.insert("temperature".into(), json!(t));
        }
        if let Some(m) = params.max_tokens {
            generation.insert("maxOutputTokens".into(), json!(m));
        }
        if let Some(p) = params.top_p {
            generation.insert("topP".into(), json!(p));
        }
        if !generation.is_empty() {
            body["generationConfig"] = Value::Object(generation);
        }

        let prompt = params.system_prompt();
        if !prompt.is_empty() {
            body["systemInstruction"] = json!({ "parts": [{ "text": prompt }] });
        }

        if !params.tools.is_empty() {
            let declarations: Vec<Value> = params
                .tools
                .iter()
                .map(|t| json!({ "name": t.name, "description": t.description, "parameters": t.parameters }))
                .collect();
            body["tools"] = json!([{ "functionDeclarations": declarations }]);
        }

        debug!(vendor = "gemini", model = %params.model, contents = contents_len(&body), "Built request");

        HttpRequest {
            url: format!(
                "{}/models/{}:streamGenerateContent?key={}",
                self.base_url, params.model, api_key
            ),
            headers: vec![("content-type".into(), "application/json".into())],
            body,
        }
    }

    fn new_decoder(&self) -> Box<dyn StreamDecoder> {
        Box::new(GeminiDecoder::default())
    }
}

fn contents_len(body: &Value) -> usize {
    body["contents"].as_array().map_or(0, Vec::len)
}

/// Decodes `{"candidates": [...]}` stream elements.
#[derive(Debug, Default)]
pub struct GeminiDecoder {
    calls: Vec<ToolCall>,
}

impl StreamDecoder for GeminiDecoder {
    fn decode(&mut self, object: Value) -> Result<Vec<StreamItem>, TurnError> {
        if let Some(error) = object.get("error") {
            return Err(TurnError::Vendor {
                status: error["code"].as_u64().and_then(|c| u16::try_from(c).ok()).unwrap_or(200),
                body: error.to_string(),
            });
        }

        let mut items = Vec::new();
        let Some(candidate) = object["candidates"].get(0) else {
            trace!("Stream object without candidates");
            return Ok(items);
        };

        if let Some(parts) = candidate["content"]["parts"].as_array() {
            for part in parts {
                if let Some(text) = part["text"].as_str() {
                    items.push(StreamItem::Text(text.to_string()));
                } else if let Some(call) = part.get("functionCall") {
                    let name = call["name"].as_str().unwrap_or_default().to_string();
                    let args = call["args"].as_object().cloned().unwrap_or_default();
                    items.push(StreamItem::ToolCallStarted(name.clone()));
                    self.calls.push(ToolCall::generated(name, args));
                }
            }
        }

        if let Some(reason) = candidate["finishReason"].as_str() {
            items.push(StreamItem::Finish(FinishReason::from_gemini(reason)));
        }

        Ok(items)
    }

    fn finish(&mut self) -> Result<Vec<ToolCall>, TurnError> {
        Ok(std::mem::take(&mut self.calls))
    }
}
