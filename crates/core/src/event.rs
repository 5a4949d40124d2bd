//! Stream events pushed to the UI while a turn runs.
//!
//! Events are transient: they go to an [`EventSink`] as they happen and are
//! never stored on the session.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::finish::FinishReason;
use crate::message::{ImageAttachment, SessionMessage};

/// Shown while the model is waiting on local function calls.
pub const CALLING_FUNCTIONS: &str = "<i class='fas fa-cogs'></i> CALLING FUNCTIONS";

/// Content of the terminal `message` event.
pub const DONE: &str = "DONE";

/// A UI event.
///
/// Serializes as `{"type": "fragment", "content": "..."}` etc.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Echo of the user message just committed, sent before the request
    User { content: UserEcho },

    /// One character of model text
    Fragment { content: String },

    /// Progress notice (function calls in flight)
    Wait { content: String },

    /// The turn finished normally
    Message {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        finish_reason: Option<FinishReason>,
    },

    /// The turn failed
    Error { content: String },
}

/// The user message as shown back to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserEcho {
    pub mid: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageAttachment>,
}

impl StreamEvent {
    pub fn user(message: &SessionMessage) -> Self {
        Self::User {
            content: UserEcho {
                mid: message.mid.clone(),
                text: message.text.clone(),
                image: message.image.clone(),
            },
        }
    }

    pub fn fragment(content: impl Into<String>) -> Self {
        Self::Fragment {
            content: content.into(),
        }
    }

    pub fn wait(content: impl Into<String>) -> Self {
        Self::Wait {
            content: content.into(),
        }
    }

    pub fn done(finish_reason: Option<FinishReason>) -> Self {
        Self::Message {
            content: DONE.to_string(),
            finish_reason,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::Error {
            content: content.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Receives events in the order they are produced.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: StreamEvent);
}

impl<F> EventSink for F
where
    F: Fn(StreamEvent) + Send + Sync,
{
    fn emit(&self, event: StreamEvent) {
        self(event)
    }
}

/// A sink that keeps every event, for tests and batch callers.
#[derive(Debug, Default)]
pub struct EventCollector {
    events: Mutex<Vec<StreamEvent>>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StreamEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Concatenation of every fragment received so far.
    pub fn text(&self) -> String {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                StreamEvent::Fragment { content } => Some(content),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for EventCollector {
    fn emit(&self, event: StreamEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
