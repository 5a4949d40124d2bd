//! `fetch_text_from_file`: read a text file under the data directory.

use async_trait::async_trait;
use monadic_core::{Tool, ToolError};
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};

const NAME: &str = "fetch_text_from_file";

pub struct FileReadTool {
    /// Files must resolve inside this directory.
    root: PathBuf,
}

impl FileReadTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn failed(reason: impl Into<String>) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: NAME.into(),
            reason: reason.into(),
        }
    }

    /// Resolve `file` against the root, rejecting anything that escapes it.
    fn resolve(&self, file: &str) -> Result<PathBuf, ToolError> {
        let root = self
            .root
            .canonicalize()
            .map_err(|e| Self::failed(format!("data directory unavailable: {e}")))?;

        let requested = Path::new(file);
        let joined = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            root.join(requested)
        };

        let resolved = joined
            .canonicalize()
            .map_err(|e| Self::failed(format!("cannot open '{file}': {e}")))?;

        if !resolved.starts_with(&root) {
            return Err(Self::failed(format!(
                "'{file}' is outside the data directory"
            )));
        }
        Ok(resolved)
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Read the text content of a file in the shared data directory."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file": {
                    "type": "string",
                    "description": "File name, relative to the data directory"
                }
            },
            "required": ["file"]
        })
    }

    async fn execute(&self, arguments: Map<String, Value>) -> Result<String, ToolError> {
        let file = arguments
            .get("file")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments {
                tool_name: NAME.into(),
                reason: "'file' must be a string".into(),
            })?;

        let path = self.resolve(file)?;
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| Self::failed(format!("failed to read '{file}': {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args(file: &str) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("file".into(), json!(file));
        map
    }

    #[test]
    fn tool_definition() {
        let tool = FileReadTool::new("/tmp");
        let def = tool.to_definition();
        assert_eq!(def.name, "fetch_text_from_file");
        assert_eq!(def.parameters["required"], json!(["file"]));
    }

    #[tokio::test]
    async fn read_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("notes.txt")).unwrap();
        writeln!(f, "Hello, world!").unwrap();

        let tool = FileReadTool::new(dir.path());
        let content = tool.execute(args("notes.txt")).await.unwrap();
        assert!(content.contains("Hello, world!"));
    }

    #[tokio::test]
    async fn read_nonexistent_file() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileReadTool::new(dir.path());
        let err = tool.execute(args("missing.txt")).await.unwrap_err();
        assert_eq!(err.tool_name(), "fetch_text_from_file");
    }

    #[tokio::test]
    async fn path_traversal_blocked() {
        let outer = tempfile::tempdir().unwrap();
        let root = outer.path().join("data");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(outer.path().join("secret.txt"), "nope").unwrap();

        let tool = FileReadTool::new(&root);
        let err = tool.execute(args("../secret.txt")).await.unwrap_err();
        assert!(err.to_string().contains("outside the data directory"));
    }

    #[tokio::test]
    async fn absolute_path_outside_root_blocked() {
        let dir = tempfile::tempdir().unwrap();
        let other = tempfile::NamedTempFile::new().unwrap();
        let tool = FileReadTool::new(dir.path());
        let result = tool.execute(args(other.path().to_str().unwrap())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn missing_file_argument() {
        let tool = FileReadTool::new("/tmp");
        let result = tool.execute(Map::new()).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments { .. })));
    }
}
