//! Backward plans and plan state
//!
//! The planner works backwards from a goal: the first step generated is the
//! one closest to the goal, and each following step describes what must be
//! true immediately before it. The backward chain is then reversed into the
//! forward execution plan by [`reverse_plan`].
//!
//! Steps are immutable values. Reversal produces fresh copies with new
//! forward ids rather than re-keying the originals, so the backward chain and
//! the forward plan never alias the same step.
//!
//! # Example
//!
//! ```rust,ignore
//! use retroflow_kernel::plan::{Step, reverse_plan};
//!
//! let backwards = vec![
//!     Step::new("back-0", "Publish the report").with_tool("publisher"),
//!     Step::new("back-1", "Draft the report"),
//!     Step::new("back-2", "Collect the source data").with_tool("web_search"),
//! ];
//!
//! let forward = reverse_plan(&backwards);
//! assert_eq!(forward[0].description, "Collect the source data");
//! assert_eq!(forward[0].id, "forward-0");
//! ```

use crate::error::EngineResult;
use crate::tool::ToolDescriptor;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// A single step in a plan.
///
/// Backward steps and forward steps are structurally identical; they occupy
/// separate sequences with independently namespaced ids (`back-*` vs
/// `forward-*`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Unique identifier within its list.
    pub id: String,

    /// Human-readable description of what this step accomplishes.
    pub description: String,

    /// Conditions that must hold before this step can run.
    pub prerequisites: Vec<String>,

    /// Names of tools this step invokes. Resolved against the registry at
    /// execution time; an unresolvable name fails the run.
    pub tools_needed: Vec<String>,

    /// Whether the step has been executed.
    #[serde(default)]
    pub completed: bool,

    /// Outcome recorded by the executor (populated after execution).
    pub result: Option<StepOutcome>,
}

impl Step {
    /// Create a new step with the given id and description.
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            prerequisites: Vec::new(),
            tools_needed: Vec::new(),
            completed: false,
            result: None,
        }
    }

    /// Add a prerequisite.
    pub fn with_prerequisite(mut self, prerequisite: impl Into<String>) -> Self {
        self.prerequisites.push(prerequisite.into());
        self
    }

    /// Add a required tool name.
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tools_needed.push(tool.into());
        self
    }
}

/// Outcome of an executed step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Collected outputs of the step's successful tool invocations, in the
    /// order the tools were listed. Failed invocations contribute nothing.
    pub tool_results: Vec<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Plan reversal
// ---------------------------------------------------------------------------

/// Reverse a backward chain into a forward execution plan.
///
/// Pure transform: reversed order, value copies re-keyed `forward-0..n`,
/// every other field preserved. Deterministic given its input.
pub fn reverse_plan(backwards: &[Step]) -> Vec<Step> {
    backwards
        .iter()
        .rev()
        .enumerate()
        .map(|(i, step)| {
            let mut forward = step.clone();
            forward.id = format!("forward-{i}");
            forward
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Plan state
// ---------------------------------------------------------------------------

/// Full state of one planning/execution run.
///
/// Invariants:
/// - `forward_plan == reverse_plan(&backwards_steps)` once planning completes
/// - `completed_steps.len() == current_step_index` during and after execution
/// - `plan_ready` is false until backward generation finishes and the
///   reversal is applied; the executor rejects runs while it is false
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanState {
    /// The goal this run works backwards from.
    pub goal_state: String,

    /// The state the backward chain has reached so far (the earliest known
    /// precondition after planning completes).
    pub current_state: String,

    /// Backward chain in generation order, goal-nearest first.
    pub backwards_steps: Vec<Step>,

    /// Forward execution plan (reverse of `backwards_steps`).
    pub forward_plan: Vec<Step>,

    /// Steps executed so far, in execution order.
    pub completed_steps: Vec<Step>,

    /// Remaining slice of `forward_plan` from `current_step_index` on.
    pub pending_steps: Vec<Step>,

    /// Index of the next step to execute.
    pub current_step_index: usize,

    /// Whether the forward plan is ready to execute.
    pub plan_ready: bool,

    /// Human-readable progress string ("N/M steps completed").
    pub current_progress: String,
}

impl PlanState {
    /// Create an empty state for the given goal.
    pub fn new(goal: impl Into<String>) -> Self {
        let goal = goal.into();
        Self {
            current_state: goal.clone(),
            goal_state: goal,
            backwards_steps: Vec::new(),
            forward_plan: Vec::new(),
            completed_steps: Vec::new(),
            pending_steps: Vec::new(),
            current_step_index: 0,
            plan_ready: false,
            current_progress: String::new(),
        }
    }

    /// Apply the reversal: derive the forward plan from the backward chain
    /// and mark the plan ready.
    pub fn apply_reversal(&mut self) {
        self.forward_plan = reverse_plan(&self.backwards_steps);
        self.pending_steps = self.forward_plan.clone();
        self.current_step_index = 0;
        self.plan_ready = true;
    }

    /// Whether every forward step has been executed.
    pub fn is_fully_executed(&self) -> bool {
        self.current_step_index >= self.forward_plan.len()
    }
}

// ---------------------------------------------------------------------------
// Step generator trait
// ---------------------------------------------------------------------------

/// Inputs for synthesizing the next backward step.
#[derive(Debug, Clone)]
pub struct StepRequest<'a> {
    /// The overall goal.
    pub goal: &'a str,
    /// The state the chain has reached (goal on the first request).
    pub current_state: &'a str,
    /// Zero-based index of the step being generated.
    pub index: usize,
    /// Tools available in the registry, for the selection policy.
    pub tools: &'a [ToolDescriptor],
}

/// One synthesized backward step, before it is given an id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedStep {
    /// What must be done to get from the predecessor state to the current one.
    pub description: String,
    /// Condition that must hold before the step.
    pub prerequisite: String,
    /// Names of tools the step needs.
    pub tools_needed: Vec<String>,
    /// The synthetic state the chain moves to (input to the next request).
    pub predecessor_state: String,
}

/// Trait for backward-step synthesis.
///
/// Implementors decide *how* a goal decomposes into prerequisite steps — an
/// LLM call, a rule engine, or the bundled template generator in
/// `retroflow-foundation`. The planner drives this one step at a time and
/// owns id assignment and event emission.
#[async_trait::async_trait]
pub trait StepGenerator: Send + Sync {
    /// Decide how many backward steps to generate for this goal.
    async fn plan_length(&self, goal: &str) -> EngineResult<usize>;

    /// Synthesize the next backward step.
    async fn next_step(&self, request: StepRequest<'_>) -> EngineResult<GeneratedStep>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
