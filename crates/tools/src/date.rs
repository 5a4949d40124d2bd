//! `current_date`: today's local date.

use async_trait::async_trait;
use chrono::Local;
use monadic_core::{Tool, ToolError};
use serde_json::{Map, Value, json};

pub struct CurrentDateTool;

#[async_trait]
impl Tool for CurrentDateTool {
    fn name(&self) -> &str {
        "current_date"
    }

    fn description(&self) -> &str {
        "Get today's date in YYYY-MM-DD format."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _arguments: Map<String, Value>) -> Result<String, ToolError> {
        Ok(Local::now().format("%Y-%m-%d").to_string())
    }
}
