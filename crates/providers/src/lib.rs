//! Vendor adapters and HTTP transport for Monadic Chat.
//!
//! All adapters implement the `monadic_core::VendorAdapter` trait.
//! The router selects the correct adapter based on an app's vendor.

pub mod anthropic;
pub mod gemini;
pub mod http;
pub mod json_reader;
pub mod openai_compat;
pub mod router;

pub use anthropic::ClaudeAdapter;
pub use gemini::GeminiAdapter;
pub use http::{ReqwestTransport, TransportTimeouts};
pub use json_reader::IncrementalJsonReader;
pub use openai_compat::OpenAiCompatAdapter;
pub use router::adapter_for;
