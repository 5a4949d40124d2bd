//! Vendor router: selects the adapter for an app's configured vendor.

use monadic_core::VendorAdapter;
use std::sync::Arc;

use crate::anthropic::{self, ClaudeAdapter};
use crate::gemini::{self, GeminiAdapter};
use crate::openai_compat::{self, OpenAiCompatAdapter};

/// Build the adapter for `vendor`, optionally pointed at a custom endpoint.
///
/// Returns `None` for an unknown vendor name.
pub fn adapter_for(vendor: &str, api_url: Option<&str>) -> Option<Arc<dyn VendorAdapter>> {
    let base = api_url.or_else(|| default_base_url(vendor))?;
    let adapter: Arc<dyn VendorAdapter> = match vendor {
        "gemini" => Arc::new(GeminiAdapter::with_base_url(base)),
        "openai" => Arc::new(OpenAiCompatAdapter::openai().with_base_url(base)),
        "grok" => Arc::new(OpenAiCompatAdapter::grok().with_base_url(base)),
        "claude" => Arc::new(ClaudeAdapter::with_base_url(base)),
        _ => return None,
    };
    Some(adapter)
}

/// Default API base URL for a vendor.
pub fn default_base_url(vendor: &str) -> Option<&'static str> {
    match vendor {
        "gemini" => Some(gemini::DEFAULT_BASE_URL),
        "openai" => Some(openai_compat::OPENAI_BASE_URL),
        "grok" => Some(openai_compat::GROK_BASE_URL),
        "claude" => Some(anthropic::DEFAULT_BASE_URL),
        _ => None,
    }
}

/// Name of the key a vendor's adapter resolves, without building it.
pub fn api_key_name(vendor: &str) -> Option<&'static str> {
    match vendor {
        "gemini" => Some("GEMINI_API_KEY"),
        "openai" => Some("OPENAI_API_KEY"),
        "grok" => Some("XAI_API_KEY"),
        "claude" => Some("ANTHROPIC_API_KEY"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vendors_resolve() {
        for vendor in ["gemini", "openai", "grok", "claude"] {
            let adapter = adapter_for(vendor, None).unwrap();
            assert_eq!(adapter.name(), vendor);
            assert_eq!(Some(adapter.api_key_name()), api_key_name(vendor));
        }
    }

    #[test]
    fn unknown_vendor() {
        assert!(adapter_for("llama", None).is_none());
        assert!(adapter_for("llama", Some("http://localhost")).is_none());
    }

    #[test]
    fn vendor_recursion_defaults() {
        assert_eq!(adapter_for("gemini", None).unwrap().default_max_function_calls(), 5);
        assert_eq!(adapter_for("claude", None).unwrap().default_max_function_calls(), 10);
    }
}
