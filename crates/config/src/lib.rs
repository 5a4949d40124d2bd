//! Configuration loading, validation, and management for Monadic Chat.
//!
//! Loads configuration from `~/.monadic/config.toml` with environment
//! variable overrides. Validates all settings at startup. After loading the
//! configuration is read-only and shared as `Arc<AppConfig>`.

use monadic_core::{ConfigSource, ToolDefinition};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Vendor names an app may use.
pub const KNOWN_VENDORS: &[&str] = &["gemini", "openai", "claude", "grok"];

/// The root configuration structure.
///
/// Maps directly to `~/.monadic/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API keys by name (`GEMINI_API_KEY`, ...). The environment wins.
    #[serde(default)]
    pub keys: HashMap<String, String>,

    /// Directory shared with local tools
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Network and pacing defaults
    #[serde(default)]
    pub defaults: RuntimeDefaults,

    /// Per-vendor endpoint overrides
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// App definitions; built-in apps are merged in unless overridden
    #[serde(default)]
    pub apps: BTreeMap<String, AppSettings>,
}

fn default_data_dir() -> PathBuf {
    AppConfig::config_dir().join("data")
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut key_names: Vec<_> = self.keys.keys().collect();
        key_names.sort();
        f.debug_struct("AppConfig")
            .field("keys", &key_names)
            .field("data_dir", &self.data_dir)
            .field("defaults", &self.defaults)
            .field("providers", &self.providers)
            .field("apps", &self.apps.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Endpoint override for one vendor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeDefaults {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,

    #[serde(default = "default_write_timeout")]
    pub write_timeout_secs: u64,

    /// Pause between emitted characters
    #[serde(default = "default_fragment_delay_ms")]
    pub fragment_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    5
}
fn default_retry_delay_ms() -> u64 {
    1000
}
fn default_connect_timeout() -> u64 {
    5
}
fn default_read_timeout() -> u64 {
    60
}
fn default_write_timeout() -> u64 {
    60
}
fn default_fragment_delay_ms() -> u64 {
    10
}

impl Default for RuntimeDefaults {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            write_timeout_secs: default_write_timeout(),
            fragment_delay_ms: default_fragment_delay_ms(),
        }
    }
}

impl RuntimeDefaults {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn fragment_delay(&self) -> Duration {
        Duration::from_millis(self.fragment_delay_ms)
    }
}

/// One chat app: a vendor, a model and the functions it may call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub display_name: String,

    #[serde(default)]
    pub description: String,

    /// One of [`KNOWN_VENDORS`]
    pub vendor: String,

    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(default = "default_context_size")]
    pub context_size: usize,

    /// Falls back to the vendor default (Gemini 5, others 10)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_function_calls: Option<u32>,

    /// System prompt; `{{DATE}}` expands to today's date
    #[serde(default)]
    pub initial_prompt: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Wrap user messages as `{"message", "context"}` and carry the
    /// model's returned context into the next turn
    #[serde(default)]
    pub monadic: bool,

    /// Appended to the last message of every request, never stored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_suffix: Option<String>,
}

fn default_context_size() -> usize {
    20
}

impl AppSettings {
    fn builtin(display_name: &str, description: &str, vendor: &str, model: &str) -> Self {
        Self {
            display_name: display_name.into(),
            description: description.into(),
            vendor: vendor.into(),
            model: model.into(),
            temperature: Some(0.3),
            max_tokens: Some(4000),
            top_p: None,
            context_size: default_context_size(),
            max_function_calls: None,
            initial_prompt: CHAT_PROMPT.into(),
            tools: Vec::new(),
            monadic: false,
            prompt_suffix: None,
        }
    }
}

const CHAT_PROMPT: &str = "You are a friendly and professional assistant. \
Today is {{DATE}}. Answer in the language the user writes in, and keep \
replies concise unless asked for detail.";

const CODE_PROMPT: &str = "You are an assistant that helps the user write and run code. \
Today is {{DATE}}. Use `run_bash_command` to check files and commands, \
`fetch_text_from_file` to read a file from the shared data directory, and \
`current_date` when you need the date. Show errors to the user verbatim.";

const CHAT_PLUS_PROMPT: &str = "You are a friendly assistant. Today is {{DATE}}. \
Each user message is a JSON object with a \"message\" and a \"context\". \
Reply with a JSON object of the same shape: put your answer in \"message\" and \
an updated context in \"context\" with the keys \"topics\" (a list of what has \
been discussed) and \"target_length\" (words you aim to keep replies under).";

const CHAT_PLUS_SUFFIX: &str = "Return your response as a JSON object with \"message\" and \"context\".";

fn builtin_apps() -> BTreeMap<String, AppSettings> {
    let mut apps = BTreeMap::new();

    apps.insert(
        "chat_gemini".into(),
        AppSettings::builtin(
            "Talk to Google Gemini",
            "Chat with Google Gemini",
            "gemini",
            "gemini-1.5-flash",
        ),
    );

    let mut code = AppSettings::builtin(
        "Code with Gemini",
        "Write and run code with Google Gemini",
        "gemini",
        "gemini-1.5-flash",
    );
    code.temperature = Some(0.0);
    code.initial_prompt = CODE_PROMPT.into();
    code.tools = code_tools();
    apps.insert("code_gemini".into(), code);

    let mut plus = AppSettings::builtin(
        "Chat Plus",
        "Chat with Google Gemini, keeping a running topic summary",
        "gemini",
        "gemini-1.5-flash",
    );
    plus.initial_prompt = CHAT_PLUS_PROMPT.into();
    plus.monadic = true;
    plus.prompt_suffix = Some(CHAT_PLUS_SUFFIX.into());
    apps.insert("chat_plus_gemini".into(), plus);

    apps.insert(
        "chat_openai".into(),
        AppSettings::builtin("Chat with OpenAI", "Chat with OpenAI GPT models", "openai", "gpt-4.1"),
    );
    apps.insert(
        "chat_claude".into(),
        AppSettings::builtin(
            "Chat with Claude",
            "Chat with Anthropic Claude",
            "claude",
            "claude-3-5-sonnet-20241022",
        ),
    );
    apps.insert(
        "chat_grok".into(),
        AppSettings::builtin("Chat with Grok", "Chat with xAI Grok", "grok", "grok-4-0709"),
    );

    apps
}

fn code_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "fetch_text_from_file".into(),
            description: "Read a text file from the shared data directory.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "file": { "type": "string", "description": "File name relative to the data directory" }
                },
                "required": ["file"]
            }),
        },
        ToolDefinition {
            name: "run_bash_command".into(),
            description: "Run a shell command and return its output.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string", "description": "The command line to run" }
                },
                "required": ["command"]
            }),
        },
        ToolDefinition {
            name: "current_date".into(),
            description: "Return today's date as YYYY-MM-DD.".into(),
            parameters: serde_json::json!({ "type": "object", "properties": {} }),
        },
    ]
}

impl AppConfig {
    /// Load configuration from the default path (~/.monadic/config.toml).
    ///
    /// Environment overrides:
    /// - `MONADIC_CONFIG`: alternate config file path
    /// - `MONADIC_DATA_DIR`: directory shared with local tools
    ///
    /// API keys are not copied here; [`ConfigSource::lookup`] reads the
    /// environment on every call.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::config_path())?;

        if let Ok(dir) = std::env::var("MONADIC_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        for (name, app) in builtin_apps() {
            config.apps.entry(name).or_insert(app);
        }

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".monadic")
    }

    /// The config file path, honoring `MONADIC_CONFIG`.
    pub fn config_path() -> PathBuf {
        std::env::var("MONADIC_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::config_dir().join("config.toml"))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, app) in &self.apps {
            if !KNOWN_VENDORS.contains(&app.vendor.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "app '{name}': unknown vendor '{}' (expected one of {})",
                    app.vendor,
                    KNOWN_VENDORS.join(", ")
                )));
            }

            if let Some(t) = app.temperature
                && !(0.0..=2.0).contains(&t)
            {
                return Err(ConfigError::ValidationError(format!(
                    "app '{name}': temperature must be between 0.0 and 2.0"
                )));
            }

            if app.context_size == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "app '{name}': context_size must be at least 1"
                )));
            }
        }

        for vendor in self.providers.keys() {
            if !KNOWN_VENDORS.contains(&vendor.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "unknown provider '{vendor}'"
                )));
            }
        }

        Ok(())
    }

    /// Settings of one app by name.
    pub fn app(&self, name: &str) -> Result<&AppSettings, ConfigError> {
        self.apps
            .get(name)
            .ok_or_else(|| ConfigError::UnknownApp(name.to_string()))
    }

    /// Endpoint override for a vendor, if configured.
    pub fn api_url(&self, vendor: &str) -> Option<&str> {
        self.providers.get(vendor).and_then(|p| p.api_url.as_deref())
    }

    /// Copy of this configuration with every key value masked.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        for value in config.keys.values_mut() {
            *value = "[REDACTED]".into();
        }
        config
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        Self::default().to_toml().unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            keys: HashMap::new(),
            data_dir: default_data_dir(),
            defaults: RuntimeDefaults::default(),
            providers: HashMap::new(),
            apps: builtin_apps(),
        }
    }
}

impl ConfigSource for AppConfig {
    /// Process environment first, then the `[keys]` table.
    fn lookup(&self, key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| self.keys.get(key).cloned())
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Failed to serialize config: {0}")]
    SerializeError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Unknown app: {0}")]
    UnknownApp(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.defaults.max_retries, 5);
        assert_eq!(config.defaults.retry_delay(), Duration::from_secs(1));
        assert_eq!(config.defaults.connect_timeout_secs, 5);
        assert_eq!(config.defaults.fragment_delay_ms, 10);
    }

    #[test]
    fn builtin_apps_present() {
        let config = AppConfig::default();
        for name in ["chat_gemini", "code_gemini", "chat_plus_gemini", "chat_openai", "chat_claude", "chat_grok"] {
            assert!(config.apps.contains_key(name), "missing {name}");
        }
        let code = config.app("code_gemini").unwrap();
        let tools: Vec<_> = code.tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tools, vec!["fetch_text_from_file", "run_bash_command", "current_date"]);
        assert_eq!(code.display_name, "Code with Gemini");
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = config.to_toml().unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.apps.len(), config.apps.len());
        assert_eq!(parsed.app("code_gemini").unwrap().tools, config.app("code_gemini").unwrap().tools);
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert!(config.apps.contains_key("chat_gemini"));
    }

    #[test]
    fn file_apps_merge_with_builtins() {
        let file = write_config(
            r#"
[keys]
GEMINI_API_KEY = "from-file"

[defaults]
max_retries = 2

[apps.chat_gemini]
display_name = "My Gemini"
vendor = "gemini"
model = "gemini-2.0-flash"
context_size = 4
max_function_calls = 3
"#,
        );

        let config = AppConfig::load_from(file.path()).unwrap();
        let app = config.app("chat_gemini").unwrap();
        assert_eq!(app.model, "gemini-2.0-flash");
        assert_eq!(app.max_function_calls, Some(3));
        assert_eq!(config.defaults.max_retries, 2);
        assert_eq!(config.defaults.read_timeout_secs, 60);
        assert!(config.apps.contains_key("code_gemini"));
    }

    #[test]
    fn monadic_settings_parse_from_file() {
        let file = write_config(
            r#"
[apps.diary]
display_name = "Diary"
vendor = "claude"
model = "claude-3-5-sonnet-20241022"
monadic = true
prompt_suffix = "Keep the JSON shape."
"#,
        );

        let config = AppConfig::load_from(file.path()).unwrap();
        let diary = config.app("diary").unwrap();
        assert!(diary.monadic);
        assert_eq!(diary.prompt_suffix.as_deref(), Some("Keep the JSON shape."));
        let chat = config.app("chat_gemini").unwrap();
        assert!(!chat.monadic);
        assert!(chat.prompt_suffix.is_none());
        assert!(config.app("chat_plus_gemini").unwrap().monadic);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        if let Some(app) = config.apps.get_mut("chat_openai") {
            app.temperature = Some(5.0);
        }
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_vendor_rejected() {
        let file = write_config(
            r#"
[apps.chat_llama]
display_name = "Llama"
vendor = "llama"
model = "llama3"
"#,
        );
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(ref m) if m.contains("llama")));
    }

    #[test]
    fn zero_context_size_rejected() {
        let mut config = AppConfig::default();
        if let Some(app) = config.apps.get_mut("chat_claude") {
            app.context_size = 0;
        }
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let file = write_config("this is = = not toml");
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn lookup_reads_keys_table() {
        let mut config = AppConfig::default();
        config
            .keys
            .insert("MONADIC_TEST_ONLY_KEY".into(), "from-table".into());
        assert_eq!(config.lookup("MONADIC_TEST_ONLY_KEY").as_deref(), Some("from-table"));
        assert!(config.lookup("MONADIC_TEST_ABSENT_KEY").is_none());
    }

    #[test]
    fn debug_and_redacted_hide_key_values() {
        let mut config = AppConfig::default();
        config.keys.insert("OPENAI_API_KEY".into(), "sk-secret".into());

        let debug = format!("{config:?}");
        assert!(debug.contains("OPENAI_API_KEY"));
        assert!(!debug.contains("sk-secret"));

        let shown = config.redacted().to_toml().unwrap();
        assert!(!shown.contains("sk-secret"));
        assert!(shown.contains("[REDACTED]"));
    }

    #[test]
    fn unknown_app_error() {
        let config = AppConfig::default();
        assert!(matches!(config.app("nope"), Err(ConfigError::UnknownApp(_))));
    }
}
