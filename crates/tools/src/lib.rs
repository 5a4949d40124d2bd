//! Built-in function implementations for Monadic Chat apps.
//!
//! Apps declare the functions they offer the model; these are the ones
//! that run locally: reading files from the shared data directory,
//! running allowlisted shell commands, and telling the date.

pub mod date;
pub mod file_read;
pub mod shell;

use monadic_core::ToolRegistry;
use std::path::Path;

/// Base commands `run_bash_command` accepts by default.
pub const SAFE_COMMANDS: &[&str] = &[
    "ls", "cat", "head", "tail", "echo", "pwd", "date", "whoami", "wc", "grep", "which", "uniq",
    "file",
];

/// Create a registry with every built-in function, scoped to `data_dir`.
///
/// Security defaults:
/// - Shell: only [`SAFE_COMMANDS`], run inside the data directory
/// - File read: paths must resolve inside the data directory
pub fn default_registry(data_dir: &Path) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    let safe_commands = SAFE_COMMANDS.iter().map(|c| c.to_string()).collect();
    registry.register(shell::ShellTool::new(safe_commands).in_dir(data_dir));
    registry.register(file_read::FileReadTool::new(data_dir));
    registry.register(date::CurrentDateTool);
    registry
}
