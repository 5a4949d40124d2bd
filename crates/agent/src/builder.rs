//! Wiring an app from configuration into a ready turn engine.

use crate::turn::{StreamingToolCallSession, TurnOptions};
use monadic_config::{AppConfig, ConfigError};
use monadic_core::{ConfigSource, HttpTransport, Parameters, Session, ToolRegistry};
use monadic_providers::adapter_for;
use std::sync::Arc;
use tracing::{debug, warn};

/// Build the turn engine and a fresh session for the app named `app_name`.
///
/// The registry is narrowed to the functions the app declares. A declared
/// function with no registered implementation is still advertised to the
/// model; calling it fails the turn.
pub fn build_app_session(
    config: &AppConfig,
    app_name: &str,
    registry: &ToolRegistry,
    transport: Arc<dyn HttpTransport>,
    keys: Arc<dyn ConfigSource>,
) -> Result<(StreamingToolCallSession, Session), ConfigError> {
    let settings = config.app(app_name)?;

    let adapter = adapter_for(&settings.vendor, config.api_url(&settings.vendor)).ok_or_else(
        || ConfigError::ValidationError(format!("unknown vendor '{}'", settings.vendor)),
    )?;

    let declared: Vec<&str> = settings.tools.iter().map(|t| t.name.as_str()).collect();
    for name in &declared {
        if !registry.contains(name) {
            warn!(app = app_name, tool = %name, "Declared function has no implementation");
        }
    }
    let tools = registry.restricted_to(declared.iter().copied());

    let model = if settings.model.is_empty() {
        config
            .providers
            .get(&settings.vendor)
            .and_then(|p| p.default_model.clone())
            .ok_or_else(|| {
                ConfigError::ValidationError(format!("app '{app_name}' has no model"))
            })?
    } else {
        settings.model.clone()
    };

    let options = TurnOptions {
        max_call_depth: settings
            .max_function_calls
            .unwrap_or_else(|| adapter.default_max_function_calls()),
        max_retries: config.defaults.max_retries,
        retry_delay: config.defaults.retry_delay(),
        fragment_delay: config.defaults.fragment_delay(),
    };

    debug!(
        app = app_name,
        vendor = %settings.vendor,
        model = %model,
        tools = tools.len(),
        max_call_depth = options.max_call_depth,
        "App session built"
    );

    let session = Session::new(Parameters {
        app_name: app_name.to_string(),
        model,
        temperature: settings.temperature,
        max_tokens: settings.max_tokens,
        top_p: settings.top_p,
        context_size: settings.context_size,
        initial_prompt: settings.initial_prompt.clone(),
        tools: settings.tools.clone(),
        monadic: settings.monadic,
        prompt_suffix: settings.prompt_suffix.clone(),
        ..Parameters::default()
    });

    let engine = StreamingToolCallSession::new(adapter, transport, Arc::new(tools), keys, options);
    Ok((engine, session))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedTransport, date_registry, keys};

    fn build(app: &str) -> Result<(StreamingToolCallSession, Session), ConfigError> {
        let config = AppConfig::default();
        build_app_session(
            &config,
            app,
            &date_registry(),
            ScriptedTransport::new(vec![]),
            Arc::new(keys(&[])),
        )
    }

    #[test]
    fn gemini_app_uses_vendor_depth() {
        let (engine, session) = build("chat_gemini").unwrap();
        assert_eq!(engine.vendor(), "gemini");
        assert_eq!(engine.options().max_call_depth, 5);
        assert_eq!(session.parameters.app_name, "chat_gemini");
        assert!(session.messages.is_empty());
    }

    #[test]
    fn openai_app_uses_vendor_depth() {
        let (engine, _) = build("chat_openai").unwrap();
        assert_eq!(engine.vendor(), "openai");
        assert_eq!(engine.options().max_call_depth, 10);
    }

    #[test]
    fn registry_narrowed_to_declared_tools() {
        let (engine, session) = build("code_gemini").unwrap();
        assert_eq!(engine.tools().names(), vec!["current_date"]);
        assert_eq!(session.parameters.tools.len(), 3);
        assert_eq!(session.parameters.temperature, Some(0.0));

        let (engine, _) = build("chat_gemini").unwrap();
        assert!(engine.tools().is_empty());
    }

    #[test]
    fn monadic_app_flags_reach_the_session() {
        let (_, session) = build("chat_plus_gemini").unwrap();
        assert!(session.parameters.monadic);
        assert!(session.parameters.prompt_suffix.is_some());

        let (_, session) = build("chat_gemini").unwrap();
        assert!(!session.parameters.monadic);
        assert!(session.parameters.prompt_suffix.is_none());
    }

    #[test]
    fn unknown_app_is_error() {
        assert!(matches!(build("nope"), Err(ConfigError::UnknownApp(_))));
    }

    #[test]
    fn runtime_defaults_flow_into_options() {
        let (engine, _) = build("chat_claude").unwrap();
        assert_eq!(engine.options().max_retries, 5);
        assert_eq!(engine.options().retry_delay, std::time::Duration::from_secs(1));
        assert_eq!(engine.options().fragment_delay, std::time::Duration::from_millis(10));
    }
}
