//! Clock tool — reports the current local date and time.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use librarian_core::error::ToolError;
use librarian_core::progress::ToolProgress;
use librarian_core::tool::Tool;

pub struct DateTimeTool;

impl DateTimeTool {
    fn render(now: DateTime<Local>) -> String {
        format!("The current time is {}", now.to_rfc3339())
    }
}

#[async_trait]
impl Tool for DateTimeTool {
    fn name(&self) -> &str {
        "date_time"
    }

    fn description(&self) -> &str {
        "A tool that returns the current date and time in ISO 8601 format."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(
        &self,
        _arguments: serde_json::Map<String, serde_json::Value>,
        _progress: &ToolProgress,
    ) -> Result<String, ToolError> {
        Ok(Self::render(Local::now()))
    }
}
