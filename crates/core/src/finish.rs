//! Canonical finish reasons and the vendor vocabularies that map onto them.

use serde::{Deserialize, Serialize};

/// Why the model stopped producing output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    Safety,
    ToolUse,
    Other,
}

impl FinishReason {
    /// Gemini `finishReason`.
    pub fn from_gemini(reason: &str) -> Self {
        match reason {
            "STOP" => Self::Stop,
            "MAX_TOKENS" => Self::Length,
            "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" => Self::Safety,
            _ => Self::Other,
        }
    }

    /// OpenAI-compatible `finish_reason`.
    pub fn from_openai(reason: &str) -> Self {
        match reason {
            "stop" => Self::Stop,
            "length" => Self::Length,
            "content_filter" => Self::Safety,
            "tool_calls" | "function_call" => Self::ToolUse,
            _ => Self::Other,
        }
    }

    /// Claude `stop_reason`.
    pub fn from_claude(reason: &str) -> Self {
        match reason {
            "end_turn" | "stop_sequence" => Self::Stop,
            "max_tokens" => Self::Length,
            "tool_use" => Self::ToolUse,
            "refusal" => Self::Safety,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::Safety => "safety",
            Self::ToolUse => "tool_use",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemini_reasons() {
        assert_eq!(FinishReason::from_gemini("STOP"), FinishReason::Stop);
        assert_eq!(FinishReason::from_gemini("MAX_TOKENS"), FinishReason::Length);
        assert_eq!(FinishReason::from_gemini("SAFETY"), FinishReason::Safety);
        assert_eq!(FinishReason::from_gemini("RECITATION"), FinishReason::Safety);
        assert_eq!(FinishReason::from_gemini("FINISH_REASON_UNSPECIFIED"), FinishReason::Other);
    }

    #[test]
    fn openai_reasons() {
        assert_eq!(FinishReason::from_openai("stop"), FinishReason::Stop);
        assert_eq!(FinishReason::from_openai("length"), FinishReason::Length);
        assert_eq!(FinishReason::from_openai("content_filter"), FinishReason::Safety);
        assert_eq!(FinishReason::from_openai("tool_calls"), FinishReason::ToolUse);
    }

    #[test]
    fn claude_reasons() {
        assert_eq!(FinishReason::from_claude("end_turn"), FinishReason::Stop);
        assert_eq!(FinishReason::from_claude("max_tokens"), FinishReason::Length);
        assert_eq!(FinishReason::from_claude("tool_use"), FinishReason::ToolUse);
        assert_eq!(FinishReason::from_claude("pause_turn"), FinishReason::Other);
    }

    #[test]
    fn serializes_snake_case() {
        assert_eq!(serde_json::to_string(&FinishReason::ToolUse).unwrap(), "\"tool_use\"");
        assert_eq!(FinishReason::Length.to_string(), "length");
    }
}
