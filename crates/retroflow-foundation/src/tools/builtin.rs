//! Builtin tools.
//!
//! A small library of ready-made [`Tool`] implementations used by demos and
//! tests:
//!
//! - [`EchoTool`]: return the input arguments unchanged.
//! - [`DateTimeTool`]: current UTC time, optionally formatted.
//! - [`JsonQueryTool`]: look up a dotted path inside a JSON value.

use async_trait::async_trait;
use chrono::Utc;
use retroflow_kernel::tool::{Tool, ToolInput, ToolResult};
use serde_json::json;

/// Return the input arguments unchanged.
///
/// Useful as a probe: whatever parameters the executor passed show up
/// verbatim in the step's tool results.
#[derive(Debug)]
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Return the input parameters unchanged. Useful for inspecting what a step passes to its tools."
    }

    async fn execute(&self, input: ToolInput) -> ToolResult {
        ToolResult::success(input.arguments)
    }
}

/// Get the current UTC time.
///
/// | Parameter | Type   | Required | Description                           |
/// |-----------|--------|----------|---------------------------------------|
/// | `format`  | string | no       | `strftime` format, defaults to RFC3339 |
#[derive(Debug)]
pub struct DateTimeTool;

#[async_trait]
impl Tool for DateTimeTool {
    fn name(&self) -> &str {
        "datetime"
    }

    fn description(&self) -> &str {
        "Get the current UTC date and time, optionally with a custom strftime format."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "format": {
                    "type": "string",
                    "description": "strftime format string (e.g. %Y-%m-%d). Defaults to RFC3339."
                }
            }
        })
    }

    async fn execute(&self, input: ToolInput) -> ToolResult {
        let now = Utc::now();
        let formatted = match input.get_str("format") {
            Some(format) => now.format(format).to_string(),
            None => now.to_rfc3339(),
        };
        ToolResult::success(json!({ "now": formatted }))
    }
}

/// Look up a dotted path inside a JSON value.
///
/// | Parameter | Type   | Required | Description                        |
/// |-----------|--------|----------|------------------------------------|
/// | `value`   | any    | yes      | JSON value to query                |
/// | `path`    | string | yes      | Dotted key path, e.g. `step.id`    |
#[derive(Debug)]
pub struct JsonQueryTool;

#[async_trait]
impl Tool for JsonQueryTool {
    fn name(&self) -> &str {
        "json_query"
    }

    fn description(&self) -> &str {
        "Look up a dotted key path inside a JSON value and return what it points at."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "value": { "description": "JSON value to query" },
                "path": { "type": "string", "description": "Dotted key path" }
            },
            "required": ["value", "path"]
        })
    }

    async fn execute(&self, input: ToolInput) -> ToolResult {
        let Some(path) = input.get_str("path") else {
            return ToolResult::failure("missing required parameter: path");
        };
        let Some(value) = input.arguments.get("value") else {
            return ToolResult::failure("missing required parameter: value");
        };

        let mut cursor = value;
        for key in path.split('.') {
            match cursor.get(key) {
                Some(next) => cursor = next,
                None => return ToolResult::failure(format!("path not found: {path}")),
            }
        }
        ToolResult::success(cursor.clone())
    }
}
