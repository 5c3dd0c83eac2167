//! Tool trait and registry interface
//!
//! A tool is a named, invocable capability. Plan steps reference tools by
//! name (`tools_needed`); at execution time the executor resolves those names
//! against a [`ToolRegistry`] and fans the step out to every resolved tool.
//!
//! The registry interface is defined here; the concrete in-memory
//! implementation lives in `retroflow-foundation`.

use crate::error::{EngineError, EngineResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Unified tool trait
///
/// # Example
///
/// ```rust,ignore
/// use retroflow_kernel::tool::{Tool, ToolInput, ToolResult};
///
/// struct Echo;
///
/// #[async_trait]
/// impl Tool for Echo {
///     fn name(&self) -> &str { "echo" }
///     fn description(&self) -> &str { "Return the input unchanged" }
///     async fn execute(&self, input: ToolInput) -> ToolResult {
///         ToolResult::success(input.arguments)
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (unique identifier)
    fn name(&self) -> &str;

    /// Tool description
    fn description(&self) -> &str;

    /// Parameters JSON Schema
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object" })
    }

    /// Execute the tool
    async fn execute(&self, input: ToolInput) -> ToolResult;

    /// Validate input before execution
    fn validate_input(&self, input: &ToolInput) -> EngineResult<()> {
        let _ = input;
        Ok(())
    }
}

/// Tool input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInput {
    /// Structured arguments
    pub arguments: serde_json::Value,
    /// Raw input (optional)
    pub raw_input: Option<String>,
}

impl ToolInput {
    /// Create from JSON arguments
    pub fn from_json(arguments: serde_json::Value) -> Self {
        Self {
            arguments,
            raw_input: None,
        }
    }

    /// Create from a raw string
    pub fn from_raw(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self {
            arguments: serde_json::Value::String(raw.clone()),
            raw_input: Some(raw),
        }
    }

    /// Get a typed parameter value
    pub fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.arguments
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Get a string parameter
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(|v| v.as_str())
    }

    /// Get a number parameter
    pub fn get_number(&self, key: &str) -> Option<f64> {
        self.arguments.get(key).and_then(|v| v.as_f64())
    }

    /// Get a boolean parameter
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.arguments.get(key).and_then(|v| v.as_bool())
    }
}

impl From<serde_json::Value> for ToolInput {
    fn from(v: serde_json::Value) -> Self {
        Self::from_json(v)
    }
}

impl From<&str> for ToolInput {
    fn from(s: &str) -> Self {
        Self::from_raw(s)
    }
}

/// Tool execution result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the invocation succeeded
    pub success: bool,
    /// Output content (opaque to the executor, stored as-is)
    pub output: serde_json::Value,
    /// Error message (if failed)
    pub error: Option<String>,
    /// Additional metadata
    pub metadata: HashMap<String, String>,
}

impl ToolResult {
    /// Create a success result
    pub fn success(output: serde_json::Value) -> Self {
        Self {
            success: true,
            output,
            error: None,
            metadata: HashMap::new(),
        }
    }

    /// Create a text success result
    pub fn success_text(text: impl Into<String>) -> Self {
        Self::success(serde_json::Value::String(text.into()))
    }

    /// Create a failure result
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: serde_json::Value::Null,
            error: Some(error.into()),
            metadata: HashMap::new(),
        }
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Get the text output, if the output is a string
    pub fn as_text(&self) -> Option<&str> {
        self.output.as_str()
    }
}

/// Tool descriptor (for listing and for tool-selection policies)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name
    pub name: String,
    /// Tool description
    pub description: String,
    /// Parameters schema
    pub parameters_schema: serde_json::Value,
}

impl ToolDescriptor {
    /// Create a descriptor from a tool
    pub fn from_tool(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters_schema: tool.parameters_schema(),
        }
    }
}

// ============================================================================
// Tool Registry trait (interface defined here only)
// ============================================================================

/// Tool registration interface; the concrete implementation is in the
/// foundation layer.
///
/// Registration is an idempotent upsert keyed by tool name: registering a
/// second tool under the same name replaces the first. There is no interior
/// locking — callers that share a registry across tasks wrap it before the
/// run starts and must not mutate it mid-execution.
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    /// Register a tool (upsert by name)
    fn register(&mut self, tool: Arc<dyn Tool>) -> EngineResult<()>;

    /// Batch register tools
    fn register_all(&mut self, tools: Vec<Arc<dyn Tool>>) -> EngineResult<()> {
        for tool in tools {
            self.register(tool)?;
        }
        Ok(())
    }

    /// Get a tool by name
    fn get(&self, name: &str) -> Option<Arc<dyn Tool>>;

    /// Remove a tool; returns whether anything was removed
    fn unregister(&mut self, name: &str) -> EngineResult<bool>;

    /// List all tools as descriptors
    fn list(&self) -> Vec<ToolDescriptor>;

    /// List all tool names
    fn list_names(&self) -> Vec<String>;

    /// Check whether a tool exists
    fn contains(&self, name: &str) -> bool;

    /// Number of registered tools
    fn count(&self) -> usize;

    /// Resolve and execute a tool by name
    async fn execute(&self, name: &str, input: ToolInput) -> EngineResult<ToolResult> {
        let tool = self
            .get(name)
            .ok_or_else(|| EngineError::ToolNotFound(name.to_string()))?;
        tool.validate_input(&input)?;
        Ok(tool.execute(input).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_input_from_json() {
        let input = ToolInput::from_json(serde_json::json!({
            "name": "test",
            "count": 42
        }));

        assert_eq!(input.get_str("name"), Some("test"));
        assert_eq!(input.get_number("count"), Some(42.0));
    }

    #[test]
    fn test_tool_input_from_raw() {
        let input = ToolInput::from_raw("plain text");
        assert_eq!(input.raw_input.as_deref(), Some("plain text"));
    }

    #[test]
    fn test_tool_result() {
        let success = ToolResult::success_text("OK");
        assert!(success.success);
        assert_eq!(success.as_text(), Some("OK"));

        let failure = ToolResult::failure("Something went wrong");
        assert!(!failure.success);
        assert!(failure.error.is_some());
        assert!(failure.output.is_null());
    }
}
