//! Engine error types
//!
//! One closed error enumeration for the whole crate family. The planner,
//! executor, and workflow engine all surface failures through [`EngineError`]
//! so callers can match on the kind instead of parsing messages.
//!
//! The distinction that matters most to the executor is preserved in the type
//! system: a tool *missing from the registry* is fatal for the whole run
//! ([`EngineError::ToolNotFound`]), while a tool that *fails while running* is
//! absorbed per step and only ever appears inside a `tool-error` event payload
//! ([`EngineError::ToolExecutionFailed`]).

use std::fmt;
use thiserror::Error;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine error type
#[derive(Debug, Error)]
pub enum EngineError {
    /// Backward-step synthesis failed; planning aborts and no plan is produced
    #[error("Planning failed: {0}")]
    Planning(String),

    /// An operation was called before its preconditions held
    /// (e.g. `execute()` before the plan was ready)
    #[error("Execution preconditions not met: {0}")]
    Precondition(String),

    /// A step referenced a tool name absent from the registry
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// An individual tool failed while executing. Recoverable: the executor
    /// absorbs this per step and never aborts the run because of it.
    #[error("Tool execution failed: {tool_name}: {message}")]
    ToolExecutionFailed { tool_name: String, message: String },

    /// A workflow step failed during engine execution
    #[error("Workflow step failed: {step_id}: {message}")]
    WorkflowStep { step_id: String, message: String },

    /// A human-task result was submitted for the wrong step or step kind
    #[error("Unexpected step: expected {expected}, got {got}")]
    UnexpectedStep { expected: String, got: String },

    /// Execution was cancelled through the cancellation token
    #[error("Operation was interrupted")]
    Interrupted,

    /// Invalid configuration or step graph
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Create a tool execution failure
    pub fn tool_execution_failed(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecutionFailed {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Create a workflow step failure
    pub fn workflow_step(step_id: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::WorkflowStep {
            step_id: step_id.into(),
            message: message.to_string(),
        }
    }

    /// Create an unexpected-step error
    pub fn unexpected_step(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Self::UnexpectedStep {
            expected: expected.into(),
            got: got.into(),
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}
