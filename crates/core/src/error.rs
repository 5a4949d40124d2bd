//! Error types for the Monadic domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Every failure of a turn is a [`TurnError`]; tool handlers report
//! [`ToolError`], which the turn wraps as a dispatch failure.

use thiserror::Error;

/// Everything that can end a turn early.
///
/// None of these escape the turn boundary: the session converts each one
/// into a single `error` stream event.
#[derive(Debug, Clone, Error)]
pub enum TurnError {
    // --- Local, non-retryable ---
    #[error("ERROR: {0}")]
    Configuration(String),

    // --- Network ---
    #[error("HTTP ERROR: {message} (after {attempts} attempts)")]
    Transport { attempts: u32, message: String },

    #[error("API ERROR: status {status}: {body}")]
    Vendor { status: u16, body: String },

    // --- Stream decoding ---
    #[error("PARSE ERROR: {0}")]
    Parse(String),

    // --- Tools ---
    #[error("TOOL ERROR: {0}")]
    ToolDispatch(#[from] ToolError),

    #[error("ERROR: Call depth exceeded (max {max})")]
    RecursionLimit { max: u32 },
}

impl TurnError {
    /// Call arguments the model sent that cannot be used. Fails dispatch.
    pub fn invalid_arguments(tool_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ToolDispatch(ToolError::InvalidArguments {
            tool_name: tool_name.into(),
            reason: reason.into(),
        })
    }

    /// Whether another attempt of the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Vendor { .. })
    }
}

/// Failure while dispatching a tool call. Always names the function.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("function not found: {0}")]
    NotFound(String),

    #[error("invalid arguments for {tool_name}: {reason}")]
    InvalidArguments { tool_name: String, reason: String },

    #[error("{tool_name} failed: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },
}

impl ToolError {
    /// The name of the function the failure belongs to.
    pub fn tool_name(&self) -> &str {
        match self {
            Self::NotFound(name) => name,
            Self::InvalidArguments { tool_name, .. } | Self::ExecutionFailed { tool_name, .. } => {
                tool_name
            }
        }
    }
}

/// Failure of a single HTTP attempt, as reported by an `HttpTransport`.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("stream interrupted: {0}")]
    StreamInterrupted(String),
}
