//! # Monadic Core
//!
//! Domain types, traits, and error definitions for the Monadic Chat
//! streaming runtime. This crate has **no runtime or HTTP dependencies**:
//! it defines the model that the other crates implement against.
//!
//! ## Design
//!
//! Every seam is a trait here ([`VendorAdapter`], [`HttpTransport`],
//! [`Tool`], [`EventSink`], [`ConfigSource`]). Implementations live in
//! their own crates, so tests can swap any of them for a scripted stand-in.

pub mod error;
pub mod event;
pub mod finish;
pub mod message;
pub mod monad;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{ToolError, TransportError, TurnError};
pub use event::{EventCollector, EventSink, StreamEvent, UserEcho};
pub use finish::FinishReason;
pub use message::{ImageAttachment, Parameters, Role, Session, SessionMessage};
pub use provider::{
    ByteStream, ConfigSource, HttpRequest, HttpResponse, HttpTransport, StreamDecoder, StreamItem,
    VendorAdapter,
};
pub use tool::{FnTool, Tool, ToolCall, ToolDefinition, ToolRegistry, ToolResult, ToolRound};
