//! `run_bash_command`: run a command with `sh -c`.
//!
//! Supports command allowlisting, a working directory, and a timeout.

use async_trait::async_trait;
use monadic_core::{Tool, ToolError};
use serde_json::{Map, Value, json};
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

const NAME: &str = "run_bash_command";

/// Shell syntax that can start a command outside the checked segments:
/// line breaks, substitution, expansion, redirection, subshells.
const FORBIDDEN: &[char] = &['\n', '\r', '`', '$', '<', '>', '(', ')'];

/// Execute shell commands with safety constraints.
pub struct ShellTool {
    /// If non-empty, only these base commands are allowed.
    allowed_commands: Vec<String>,
    working_dir: Option<PathBuf>,
    timeout: Duration,
}

impl ShellTool {
    pub fn new(allowed_commands: Vec<String>) -> Self {
        Self {
            allowed_commands,
            working_dir: None,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn is_command_allowed(&self, command: &str) -> bool {
        if self.allowed_commands.is_empty() {
            return true;
        }

        if command.contains(FORBIDDEN) {
            return false;
        }

        // Every segment of a pipeline or command list must be allowed.
        command
            .split(['|', ';', '&'])
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .all(|segment| {
                let base = segment.split_whitespace().next().unwrap_or("");
                self.allowed_commands.iter().any(|a| a == base)
            })
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Run a bash command and return its output. Use this for listing files, checking tools, and running small programs."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The command to run"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, arguments: Map<String, Value>) -> Result<String, ToolError> {
        let command = arguments
            .get("command")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments {
                tool_name: NAME.into(),
                reason: "'command' must be a string".into(),
            })?;

        if !self.is_command_allowed(command) {
            return Err(ToolError::ExecutionFailed {
                tool_name: NAME.into(),
                reason: format!("command '{command}' is not in the allowlist"),
            });
        }

        debug!(command = %command, "Executing shell command");

        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]).kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| ToolError::ExecutionFailed {
                tool_name: NAME.into(),
                reason: format!("timed out after {}s", self.timeout.as_secs()),
            })?
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: NAME.into(),
                reason: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if output.status.success() {
            let mut text = format!("Command executed successfully.\n{stdout}");
            if !stderr.trim().is_empty() {
                text.push_str(&format!("\n[stderr]: {stderr}"));
            }
            Ok(text.trim_end().to_string())
        } else {
            let code = output.status.code().unwrap_or(-1);
            warn!(command = %command, exit_code = code, "Command failed");
            Ok(format!("[exit code: {code}]\n{stdout}\n{stderr}").trim().to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(command: &str) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("command".into(), json!(command));
        map
    }

    #[test]
    fn allowlist_check() {
        let tool = ShellTool::new(vec!["ls".into(), "cat".into(), "grep".into()]);
        assert!(tool.is_command_allowed("ls -la"));
        assert!(tool.is_command_allowed("cat file.txt | grep foo"));
        assert!(!tool.is_command_allowed("rm -rf /"));
        assert!(!tool.is_command_allowed("ls; rm -rf /"));
        assert!(!tool.is_command_allowed("ls && sudo reboot"));
    }

    #[test]
    fn hidden_commands_are_rejected() {
        let tool = ShellTool::new(vec!["ls".into(), "echo".into(), "cat".into()]);
        for command in [
            "ls\ntouch pwned",
            "ls\r\ntouch pwned",
            "echo $(touch pwned)",
            "echo `touch pwned`",
            "echo ${HOME}",
            "echo x > pwned",
            "cat < /etc/passwd",
            "(touch pwned)",
        ] {
            assert!(!tool.is_command_allowed(command), "allowed: {command:?}");
        }
    }

    #[tokio::test]
    async fn newline_cannot_smuggle_a_second_command() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ShellTool::new(vec!["ls".into()]).in_dir(dir.path());

        let result = tool.execute(args("ls\ntouch pwned")).await;

        assert!(matches!(result, Err(ToolError::ExecutionFailed { .. })));
        assert!(!dir.path().join("pwned").exists());
    }

    #[test]
    fn empty_allowlist_allows_all() {
        let tool = ShellTool::new(vec![]);
        assert!(tool.is_command_allowed("anything goes"));
    }

    #[tokio::test]
    async fn execute_echo() {
        let tool = ShellTool::new(vec![]);
        let output = tool.execute(args("echo hello")).await.unwrap();
        assert!(output.starts_with("Command executed successfully."));
        assert!(output.contains("hello"));
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported_not_raised() {
        let tool = ShellTool::new(vec![]);
        let output = tool.execute(args("echo oops >&2; exit 3")).await.unwrap();
        assert!(output.starts_with("[exit code: 3]"));
        assert!(output.contains("oops"));
    }

    #[tokio::test]
    async fn runs_in_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
        let tool = ShellTool::new(vec![]).in_dir(dir.path());
        let output = tool.execute(args("ls")).await.unwrap();
        assert!(output.contains("marker.txt"));
    }

    #[tokio::test]
    async fn blocked_command() {
        let tool = ShellTool::new(vec!["ls".into()]);
        let result = tool.execute(args("rm -rf /")).await;
        assert!(matches!(result, Err(ToolError::ExecutionFailed { .. })));
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let tool = ShellTool::new(vec![]).with_timeout(Duration::from_millis(100));
        let result = tool.execute(args("sleep 5")).await;
        assert!(matches!(result, Err(ToolError::ExecutionFailed { reason, .. }) if reason.contains("timed out")));
    }
}
