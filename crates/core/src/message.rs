//! Session, message and parameter types.
//!
//! A [`Session`] is owned by the caller (a UI connection handler, the CLI)
//! and lent mutably to each turn. The turn appends the user's message,
//! slides the active-context window and records tool rounds; it never
//! removes stored messages.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::monad;
use crate::tool::{ToolDefinition, ToolRound};

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The model
    Assistant,
    /// System instructions
    System,
    /// Continuation after tool results were attached
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An image attached to a user message, carried as a data URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAttachment {
    /// MIME type, e.g. `image/png`
    #[serde(rename = "type")]
    pub mime_type: String,

    /// `data:<mime>;base64,<payload>`
    pub data: String,
}

impl ImageAttachment {
    /// The base64 payload without the data-URL prefix.
    pub fn base64_payload(&self) -> &str {
        match self.data.split_once(',') {
            Some((_, payload)) => payload,
            None => &self.data,
        }
    }
}

/// One stored turn record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMessage {
    /// Short message id
    pub mid: String,

    pub role: Role,

    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageAttachment>,

    /// Whether this message is inside the current context window
    #[serde(default)]
    pub active: bool,

    pub timestamp: DateTime<Utc>,
}

impl SessionMessage {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            mid: new_mid(),
            role,
            text: text.into(),
            image: None,
            active: true,
            timestamp: Utc::now(),
        }
    }

    pub fn with_image(mut self, image: Option<ImageAttachment>) -> Self {
        self.image = image;
        self
    }
}

fn new_mid() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// Per-turn configuration, seeded from the app settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Parameters {
    pub app_name: String,

    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Number of most-recent messages sent with each request
    pub context_size: usize,

    /// System prompt; `{{DATE}}` is replaced at request time
    #[serde(default)]
    pub initial_prompt: String,

    /// Function declarations advertised to the model
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// The pending user message, consumed by the next user turn
    #[serde(default)]
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageAttachment>,

    /// Tool rounds of the turn in progress, replayed on every continuation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_rounds: Vec<ToolRound>,

    /// Wrap user messages and replies as `{message, context}` JSON
    #[serde(default)]
    pub monadic: bool,

    /// Context carried between monadic turns
    #[serde(default)]
    pub monadic_context: Value,

    /// Appended to the last context message of every request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_suffix: Option<String>,
}

impl Parameters {
    /// The system prompt with `{{DATE}}` expanded to today's date.
    pub fn system_prompt(&self) -> String {
        self.initial_prompt
            .replace("{{DATE}}", &Local::now().format("%Y-%m-%d").to_string())
    }
}

/// A conversation plus the parameters of the turn being run against it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    pub messages: Vec<SessionMessage>,
    pub parameters: Parameters,
}

impl Session {
    pub fn new(parameters: Parameters) -> Self {
        Self {
            messages: Vec::new(),
            parameters,
        }
    }

    /// Stage a user message for the next user turn.
    pub fn set_message(&mut self, text: impl Into<String>, image: Option<ImageAttachment>) {
        self.parameters.message = text.into();
        self.parameters.image = image;
    }

    /// Move the pending user message into the history.
    ///
    /// Returns the message as the user wrote it, or `None` when nothing was
    /// pending, so re-sending a finished turn never duplicates a user message.
    /// An image without text is committed with empty text. In monadic mode
    /// the stored text is the wrapped monad.
    pub fn commit_pending_message(&mut self) -> Option<SessionMessage> {
        let text = std::mem::take(&mut self.parameters.message);
        let image = self.parameters.image.take();
        if text.is_empty() && image.is_none() {
            return None;
        }

        let written = SessionMessage::new(Role::User, text).with_image(image);
        let mut stored = written.clone();
        if self.parameters.monadic && !written.text.is_empty() {
            stored.text = monad::unit(&written.text, &self.parameters.monadic_context);
        }
        self.messages.push(stored);
        Some(written)
    }

    /// Record the model's reply so later turns see it in context.
    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.messages.push(SessionMessage::new(Role::Assistant, text));
    }

    /// Mark only the last `context_size` messages active.
    ///
    /// Older messages stay stored but are excluded from the next request.
    /// Returns the number of active messages.
    pub fn slide_window(&mut self) -> usize {
        let keep = self.parameters.context_size.min(self.messages.len());
        let boundary = self.messages.len() - keep;
        for (i, msg) in self.messages.iter_mut().enumerate() {
            msg.active = i >= boundary;
        }
        keep
    }

    pub fn active_messages(&self) -> impl Iterator<Item = &SessionMessage> {
        self.messages.iter().filter(|m| m.active)
    }

    /// The active messages as sent to the model, with the prompt suffix
    /// appended to the last one.
    pub fn context_messages(&self) -> Vec<SessionMessage> {
        let mut messages: Vec<SessionMessage> = self.active_messages().cloned().collect();
        if let Some(suffix) = self.parameters.prompt_suffix.as_deref().filter(|s| !s.is_empty())
            && let Some(last) = messages.last_mut()
        {
            last.text = format!("{}\n\n{suffix}", last.text);
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(context_size: usize) -> Session {
        Session::new(Parameters {
            context_size,
            ..Parameters::default()
        })
    }

    #[test]
    fn commit_consumes_pending_message() {
        let mut s = session(10);
        s.set_message("Hello", None);
        let written = s.commit_pending_message().unwrap();
        assert_eq!(written.text, "Hello");
        assert!(s.commit_pending_message().is_none());
        assert_eq!(s.messages.len(), 1);
        assert_eq!(s.messages[0].role, Role::User);
        assert_eq!(s.messages[0].mid, written.mid);
        assert!(s.parameters.message.is_empty());
    }

    #[test]
    fn image_without_text_is_committed() {
        let mut s = session(10);
        let image = ImageAttachment {
            mime_type: "image/png".into(),
            data: "data:image/png;base64,AAAA".into(),
        };
        s.set_message("", Some(image.clone()));
        let written = s.commit_pending_message().unwrap();
        assert_eq!(written.image, Some(image));
        assert_eq!(s.messages.len(), 1);
        assert!(s.messages[0].text.is_empty());
        assert!(s.parameters.image.is_none());
    }

    #[test]
    fn monadic_message_is_stored_wrapped() {
        let mut s = session(10);
        s.parameters.monadic = true;
        s.parameters.monadic_context = serde_json::json!({"topic": "tea"});
        s.set_message("Hello", None);

        let written = s.commit_pending_message().unwrap();
        assert_eq!(written.text, "Hello");
        let stored: Value = serde_json::from_str(&s.messages[0].text).unwrap();
        assert_eq!(stored["message"], "Hello");
        assert_eq!(stored["context"]["topic"], "tea");
    }

    #[test]
    fn prompt_suffix_decorates_last_context_message() {
        let mut s = session(10);
        s.parameters.prompt_suffix = Some("Answer in French.".into());
        s.messages.push(SessionMessage::new(Role::User, "first"));
        s.messages.push(SessionMessage::new(Role::User, "second"));
        s.slide_window();

        let context = s.context_messages();
        assert_eq!(context[0].text, "first");
        assert_eq!(context[1].text, "second\n\nAnswer in French.");
        assert_eq!(s.messages[1].text, "second");
    }

    #[test]
    fn sliding_window_keeps_most_recent() {
        let mut s = session(3);
        for i in 0..5 {
            s.messages.push(SessionMessage::new(Role::User, format!("m{i}")));
        }
        assert_eq!(s.slide_window(), 3);
        let active: Vec<_> = s.active_messages().map(|m| m.text.as_str()).collect();
        assert_eq!(active, vec!["m2", "m3", "m4"]);
        assert_eq!(s.messages.len(), 5);
        assert!(!s.messages[0].active);
    }

    #[test]
    fn sliding_window_smaller_history() {
        let mut s = session(20);
        s.push_assistant("only one");
        assert_eq!(s.slide_window(), 1);
        assert!(s.messages[0].active);
    }

    #[test]
    fn image_payload_strips_data_url_prefix() {
        let img = ImageAttachment {
            mime_type: "image/png".into(),
            data: "data:image/png;base64,AAAA".into(),
        };
        assert_eq!(img.base64_payload(), "AAAA");
    }

    #[test]
    fn system_prompt_expands_date() {
        let params = Parameters {
            initial_prompt: "Today is {{DATE}}.".into(),
            ..Parameters::default()
        };
        let prompt = params.system_prompt();
        assert!(!prompt.contains("{{DATE}}"));
        assert!(prompt.starts_with("Today is 2"));
    }

    #[test]
    fn mid_is_short() {
        let msg = SessionMessage::new(Role::User, "x");
        assert_eq!(msg.mid.len(), 8);
    }
}
