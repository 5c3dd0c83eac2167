//! Workflow step graph types
//!
//! The generic orchestrator chains heterogeneous steps — agent calls,
//! human-in-the-loop pauses, conditional branches, bounded loops — over a
//! shared mutable context. This module defines the step graph value types,
//! the agent-collaborator traits, and the pure routing function; the engine
//! that walks the graph lives in `retroflow-foundation`.
//!
//! Routing never mutates a step: [`resolve_next`] computes the successor id
//! fresh each time a step is left, so the graph stays immutable and safe to
//! inspect while a run is in flight.

use crate::error::EngineResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Conditions
// ---------------------------------------------------------------------------

/// A branch condition evaluated against the shared variables map.
#[derive(Clone)]
pub enum ConditionSpec {
    /// True when the named variable exists and is truthy
    /// (non-null, non-false, non-zero, non-empty-string).
    VariableTruthy(String),
    /// Arbitrary predicate over the variables map.
    Predicate(Arc<dyn Fn(&HashMap<String, Value>) -> bool + Send + Sync>),
}

impl ConditionSpec {
    /// Build a predicate condition.
    pub fn predicate(f: impl Fn(&HashMap<String, Value>) -> bool + Send + Sync + 'static) -> Self {
        Self::Predicate(Arc::new(f))
    }

    /// Evaluate against the variables map.
    pub fn eval(&self, variables: &HashMap<String, Value>) -> bool {
        match self {
            Self::VariableTruthy(name) => variables.get(name).is_some_and(is_truthy),
            Self::Predicate(f) => f(variables),
        }
    }
}

impl fmt::Debug for ConditionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VariableTruthy(name) => write!(f, "VariableTruthy({name})"),
            Self::Predicate(_) => write!(f, "Predicate(..)"),
        }
    }
}

/// JavaScript-style truthiness for routing decisions.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// ---------------------------------------------------------------------------
// Step kinds
// ---------------------------------------------------------------------------

/// Configuration for an agent step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStepConfig {
    /// Which agent to construct (interpreted by the [`AgentFactory`]).
    pub agent_id: Option<String>,
    /// Task prompt handed to the collaborator.
    pub prompt: String,
    /// Inject the accumulated variables map into the prompt as extra context.
    #[serde(default)]
    pub use_context: bool,
}

/// Configuration for a human-in-the-loop step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanStepConfig {
    /// What the human is being asked to do.
    pub prompt: String,
}

/// Configuration for a bounded loop step.
///
/// A loop step keeps an iteration counter in
/// `variables["{step_id}_iterations"]`. While the counter is below
/// `max_iterations` and the condition holds (an absent condition always
/// holds), routing takes the back-edge via `alternate_step_id`; otherwise the
/// loop exits via `next_step_id`.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Optional loop condition; `None` means loop until the bound.
    pub condition: Option<ConditionSpec>,
    /// Hard iteration bound.
    pub max_iterations: u32,
}

/// The kind of a workflow step, with per-kind configuration.
///
/// A closed set: engines match on it exhaustively.
#[derive(Debug, Clone)]
pub enum StepKind {
    /// Run an external agent collaborator.
    Agent(AgentStepConfig),
    /// Pause and wait for an external human result.
    Human(HumanStepConfig),
    /// Branch on a condition over the variables map.
    Condition(ConditionSpec),
    /// Bounded back-edge loop.
    Loop(LoopConfig),
}

// ---------------------------------------------------------------------------
// Workflow step
// ---------------------------------------------------------------------------

/// One node in the workflow graph.
///
/// Steps form a singly-linked directed graph through `next_step_id`, with an
/// optional `alternate_step_id` used by condition branches and loop
/// back-edges. The engine performs no cycle detection on `next_step_id`
/// chains; a misconfigured cycle runs until the cancellation token fires.
#[derive(Debug, Clone)]
pub struct WorkflowStep {
    /// Unique step id within the workflow.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Step kind and configuration.
    pub kind: StepKind,
    /// Default successor.
    pub next_step_id: Option<String>,
    /// Alternate successor (condition false branch / loop body entry).
    pub alternate_step_id: Option<String>,
}

impl WorkflowStep {
    /// Create a step of the given kind.
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: StepKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            kind,
            next_step_id: None,
            alternate_step_id: None,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the default successor.
    pub fn then(mut self, next: impl Into<String>) -> Self {
        self.next_step_id = Some(next.into());
        self
    }

    /// Set the alternate successor.
    pub fn otherwise(mut self, alternate: impl Into<String>) -> Self {
        self.alternate_step_id = Some(alternate.into());
        self
    }

    /// Key under which this step's loop counter is stored.
    pub fn iteration_key(&self) -> String {
        format!("{}_iterations", self.id)
    }
}

/// Compute the successor of a step without mutating the graph.
///
/// - Condition steps route to `next_step_id` when the condition holds,
///   otherwise to `alternate_step_id` (falling back to `next_step_id` when no
///   alternate is configured).
/// - Loop steps route to `alternate_step_id` (the body entry) while the
///   iteration counter in `variables` is below the bound and the condition
///   holds; the engine owns incrementing the counter when the back-edge is
///   taken.
/// - Every other kind routes to `next_step_id`.
///
/// `None` means the workflow completes after this step.
pub fn resolve_next(step: &WorkflowStep, variables: &HashMap<String, Value>) -> Option<String> {
    match &step.kind {
        StepKind::Condition(condition) => {
            if condition.eval(variables) {
                step.next_step_id.clone()
            } else {
                step.alternate_step_id
                    .clone()
                    .or_else(|| step.next_step_id.clone())
            }
        }
        StepKind::Loop(config) => {
            let iterations = variables
                .get(&step.iteration_key())
                .and_then(Value::as_u64)
                .unwrap_or(0);
            let condition_holds = config
                .condition
                .as_ref()
                .is_none_or(|c| c.eval(variables));
            if iterations < u64::from(config.max_iterations) && condition_holds {
                step.alternate_step_id
                    .clone()
                    .or_else(|| step.next_step_id.clone())
            } else {
                step.next_step_id.clone()
            }
        }
        _ => step.next_step_id.clone(),
    }
}

// ---------------------------------------------------------------------------
// Workflow context
// ---------------------------------------------------------------------------

/// Engine status. `Completed` and `Failed` are terminal; `Paused` is
/// resumable via a human-task result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowStatus {
    NotStarted,
    Running,
    Paused,
    Completed,
    Failed(String),
}

/// Shared mutable state of one workflow run.
///
/// Owned exclusively by the engine instance; every executed step reads and
/// writes `variables`, and each step's result lands in `results` keyed by
/// step id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowContext {
    /// Variables shared across steps.
    pub variables: HashMap<String, Value>,
    /// Per-step results.
    pub results: HashMap<String, AgentRunResult>,
    /// Id of the step the engine is at.
    pub current_step_id: String,
    /// Engine status.
    pub status: WorkflowStatus,
}

impl Default for WorkflowStatus {
    fn default() -> Self {
        Self::NotStarted
    }
}

// ---------------------------------------------------------------------------
// Agent collaborator interface
// ---------------------------------------------------------------------------

/// Terminal status of one agent task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
    RequiresAction,
}

/// Result returned by an agent collaborator (or recorded for a human step).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRunResult {
    /// Textual result content.
    pub content: String,
    /// Terminal status.
    pub status: RunStatus,
    /// Opaque extra data.
    pub metadata: Option<Value>,
}

impl AgentRunResult {
    /// A completed result with the given content.
    pub fn completed(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            status: RunStatus::Completed,
            metadata: None,
        }
    }

    /// Wrap a submitted human-task value.
    pub fn from_human(value: &Value) -> Self {
        let content = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Self {
            content,
            status: RunStatus::Completed,
            metadata: None,
        }
    }
}

/// Progress notification payload for the engine's progress callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Human-readable message.
    pub message: String,
    /// Coarse-grained progress, 0–100.
    pub percent: u8,
}

/// Callback fired at step start and step completion.
pub type ProgressCallback = Arc<dyn Fn(&str, ProgressUpdate) + Send + Sync>;

/// External agent collaborator, driven by agent steps.
#[async_trait::async_trait]
pub trait AgentRunner: Send {
    /// Prepare the collaborator for use.
    async fn initialize(&mut self) -> EngineResult<()>;

    /// Run the task and return its result.
    async fn execute_task(
        &mut self,
        prompt: &str,
        on_progress: Option<ProgressCallback>,
    ) -> EngineResult<AgentRunResult>;

    /// Release any held resources.
    async fn cleanup(&mut self) -> EngineResult<()>;
}

/// Builds agent collaborators from agent-step configuration.
pub trait AgentFactory: Send + Sync {
    /// Construct a collaborator for the given step config.
    fn create(&self, config: &AgentStepConfig) -> EngineResult<Box<dyn AgentRunner>>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn truthiness() {
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!("yes")));
        assert!(is_truthy(&json!({})));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&Value::Null));
    }

    #[test]
    fn condition_routes_to_next_when_true() {
        let step = WorkflowStep::new(
            "check",
            "Check approval",
            StepKind::Condition(ConditionSpec::VariableTruthy("approved".into())),
        )
        .then("publish")
        .otherwise("revise");

        let next = resolve_next(&step, &vars(&[("approved", json!(true))]));
        assert_eq!(next.as_deref(), Some("publish"));
    }

    #[test]
    fn condition_routes_to_alternate_when_false() {
        let step = WorkflowStep::new(
            "check",
            "Check approval",
            StepKind::Condition(ConditionSpec::VariableTruthy("approved".into())),
        )
        .then("publish")
        .otherwise("revise");

        let next = resolve_next(&step, &vars(&[]));
        assert_eq!(next.as_deref(), Some("revise"));

        // Resolving is side-effect free: same answer twice.
        let again = resolve_next(&step, &vars(&[]));
        assert_eq!(again.as_deref(), Some("revise"));
    }

    #[test]
    fn condition_without_alternate_falls_back_to_next() {
        let step = WorkflowStep::new(
            "check",
            "Check",
            StepKind::Condition(ConditionSpec::VariableTruthy("flag".into())),
        )
        .then("done");

        assert_eq!(resolve_next(&step, &vars(&[])).as_deref(), Some("done"));
    }

    #[test]
    fn predicate_condition() {
        let step = WorkflowStep::new(
            "check",
            "Check",
            StepKind::Condition(ConditionSpec::predicate(|vars| {
                vars.get("count").and_then(Value::as_u64).unwrap_or(0) > 2
            })),
        )
        .then("many")
        .otherwise("few");

        assert_eq!(
            resolve_next(&step, &vars(&[("count", json!(5))])).as_deref(),
            Some("many")
        );
        assert_eq!(
            resolve_next(&step, &vars(&[("count", json!(1))])).as_deref(),
            Some("few")
        );
    }

    #[test]
    fn loop_takes_back_edge_until_bound() {
        let step = WorkflowStep::new(
            "retry",
            "Retry loop",
            StepKind::Loop(LoopConfig {
                condition: None,
                max_iterations: 3,
            }),
        )
        .then("exit")
        .otherwise("body");

        assert_eq!(resolve_next(&step, &vars(&[])).as_deref(), Some("body"));
        assert_eq!(
            resolve_next(&step, &vars(&[("retry_iterations", json!(2))])).as_deref(),
            Some("body")
        );
        assert_eq!(
            resolve_next(&step, &vars(&[("retry_iterations", json!(3))])).as_deref(),
            Some("exit")
        );
    }

    #[test]
    fn loop_condition_can_exit_early() {
        let step = WorkflowStep::new(
            "poll",
            "Poll until ready",
            StepKind::Loop(LoopConfig {
                condition: Some(ConditionSpec::VariableTruthy("keep_going".into())),
                max_iterations: 10,
            }),
        )
        .then("exit")
        .otherwise("body");

        assert_eq!(
            resolve_next(&step, &vars(&[("keep_going", json!(true))])).as_deref(),
            Some("body")
        );
        assert_eq!(resolve_next(&step, &vars(&[])).as_deref(), Some("exit"));
    }

    #[test]
    fn agent_run_result_from_human() {
        let result = AgentRunResult::from_human(&json!("looks good"));
        assert_eq!(result.content, "looks good");
        assert_eq!(result.status, RunStatus::Completed);

        let structured = AgentRunResult::from_human(&json!({ "approved": true }));
        assert!(structured.content.contains("approved"));
    }
}
