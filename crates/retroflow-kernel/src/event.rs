//! Lifecycle events and the pub/sub bus
//!
//! The planner and executor do not inherit an emitter; they compose an
//! [`EventBus`] and publish typed [`PlanningEvent`]s through it. Listeners
//! are invoked synchronously, in registration order, on the task that emits —
//! the event sequence therefore matches the causal order of the algorithm
//! exactly.
//!
//! Every event carries a stable kebab-case wire name ([`PlanningEvent::name`])
//! so UI collaborators can subscribe by name without depending on the enum.

use crate::plan::Step;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Events emitted during planning and plan execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub enum PlanningEvent {
    /// Backward planning has started.
    Thinking { message: String },

    /// One backward-chaining iteration finished.
    ThinkingProgress { message: String, current_state: String },

    /// A step was appended to the backward chain.
    BackwardStepAdded { step: Step },

    /// The backward chain was reversed into a forward plan.
    PlanCreated { message: String, plan: Vec<Step> },

    /// The forward plan is ready to execute.
    PlanReady { message: String, plan: Vec<Step> },

    /// Plan execution has started.
    ExecutionStart { message: String, plan: Vec<Step> },

    /// A forward step started executing.
    StepStart { message: String, step: Step },

    /// A forward step finished; `result` holds its collected tool outputs.
    StepComplete {
        message: String,
        step: Step,
        result: crate::plan::StepOutcome,
    },

    /// An individual tool failed. Recoverable: the step and the run continue.
    ToolError { message: String, error: String },

    /// The step budget was reached; execution truncated gracefully.
    MaxStepsReached {
        message: String,
        completed_steps: Vec<Step>,
        remaining_steps: Vec<Step>,
    },

    /// Execution finished (by completion or by budget truncation).
    ExecutionComplete { message: String, completed_steps: Vec<Step> },

    /// Execution stopped because the cancellation token fired.
    ExecutionCancelled { message: String, completed_steps: Vec<Step> },

    /// A fatal failure; the run's promise is rejected alongside this event.
    Error { message: String },
}

impl PlanningEvent {
    /// The event's kind, for filtered subscription.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Thinking { .. } => EventKind::Thinking,
            Self::ThinkingProgress { .. } => EventKind::ThinkingProgress,
            Self::BackwardStepAdded { .. } => EventKind::BackwardStepAdded,
            Self::PlanCreated { .. } => EventKind::PlanCreated,
            Self::PlanReady { .. } => EventKind::PlanReady,
            Self::ExecutionStart { .. } => EventKind::ExecutionStart,
            Self::StepStart { .. } => EventKind::StepStart,
            Self::StepComplete { .. } => EventKind::StepComplete,
            Self::ToolError { .. } => EventKind::ToolError,
            Self::MaxStepsReached { .. } => EventKind::MaxStepsReached,
            Self::ExecutionComplete { .. } => EventKind::ExecutionComplete,
            Self::ExecutionCancelled { .. } => EventKind::ExecutionCancelled,
            Self::Error { .. } => EventKind::Error,
        }
    }

    /// Stable kebab-case wire name.
    pub fn name(&self) -> &'static str {
        self.kind().name()
    }
}

/// Discriminant of [`PlanningEvent`], used as the subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum EventKind {
    Thinking,
    ThinkingProgress,
    BackwardStepAdded,
    PlanCreated,
    PlanReady,
    ExecutionStart,
    StepStart,
    StepComplete,
    ToolError,
    MaxStepsReached,
    ExecutionComplete,
    ExecutionCancelled,
    Error,
}

impl EventKind {
    /// Stable kebab-case wire name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Thinking => "thinking",
            Self::ThinkingProgress => "thinking-progress",
            Self::BackwardStepAdded => "backward-step-added",
            Self::PlanCreated => "plan-created",
            Self::PlanReady => "plan-ready",
            Self::ExecutionStart => "execution-start",
            Self::StepStart => "step-start",
            Self::StepComplete => "step-complete",
            Self::ToolError => "tool-error",
            Self::MaxStepsReached => "max-steps-reached",
            Self::ExecutionComplete => "execution-complete",
            Self::ExecutionCancelled => "execution-cancelled",
            Self::Error => "error",
        }
    }
}

// ---------------------------------------------------------------------------
// Event bus
// ---------------------------------------------------------------------------

/// Listener callback type.
pub type EventListener = Box<dyn Fn(&PlanningEvent) + Send + Sync>;

/// Synchronous publish/subscribe channel for [`PlanningEvent`]s.
///
/// Within one emitted event, kind-filtered listeners fire first, then
/// catch-all listeners, each group in registration order. No ordering is
/// guaranteed across distinct event kinds.
///
/// Listeners must not subscribe new listeners from inside a callback.
#[derive(Default)]
pub struct EventBus {
    by_kind: RwLock<HashMap<EventKind, Vec<EventListener>>>,
    any: RwLock<Vec<EventListener>>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to one event kind.
    pub fn on(&self, kind: EventKind, listener: impl Fn(&PlanningEvent) + Send + Sync + 'static) {
        self.by_kind
            .write()
            .entry(kind)
            .or_default()
            .push(Box::new(listener));
    }

    /// Subscribe to every event.
    pub fn on_any(&self, listener: impl Fn(&PlanningEvent) + Send + Sync + 'static) {
        self.any.write().push(Box::new(listener));
    }

    /// Publish an event to all matching listeners, synchronously.
    pub fn emit(&self, event: &PlanningEvent) {
        tracing::debug!(event = event.name(), "emit");
        if let Some(listeners) = self.by_kind.read().get(&event.kind()) {
            for listener in listeners {
                listener(event);
            }
        }
        for listener in self.any.read().iter() {
            listener(event);
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("kinds", &self.by_kind.read().len())
            .field("any", &self.any.read().len())
            .finish()
    }
}
