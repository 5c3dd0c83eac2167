//! Retroflow Kernel
//!
//! Core types and traits for the backward-planning engine and the generic
//! workflow orchestrator. This crate defines interfaces only; concrete
//! planners, executors, and engines live in `retroflow-foundation`.

// error module
pub mod error;

// event module (typed lifecycle events + pub/sub bus)
pub mod event;

// plan module (steps, plan state, reversal, generator trait)
pub mod plan;

// tool module (tool trait + registry trait)
pub mod tool;

// workflow module (step graph types, context, agent collaborator traits)
pub mod workflow;

pub use error::{EngineError, EngineResult};
pub use event::{EventBus, EventKind, PlanningEvent};
pub use plan::{GeneratedStep, PlanState, Step, StepGenerator, StepOutcome, StepRequest, reverse_plan};
pub use tool::{Tool, ToolDescriptor, ToolInput, ToolRegistry, ToolResult};
pub use workflow::{
    AgentFactory, AgentRunResult, AgentRunner, AgentStepConfig, ConditionSpec, HumanStepConfig,
    LoopConfig, ProgressCallback, ProgressUpdate, RunStatus, StepKind, WorkflowContext,
    WorkflowStatus, WorkflowStep, resolve_next,
};
