//! Retroflow Foundation
//!
//! Concrete implementations of the kernel interfaces: the backward planner,
//! the sequential plan executor, the generic workflow engine, the in-memory
//! tool registry, and a small library of builtin tools.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use retroflow_foundation::{PlanExecutor, SimpleToolRegistry, StepBackPlanner, TemplateStepGenerator};
//! use retroflow_kernel::{EventBus, ToolRegistry};
//!
//! let mut registry = SimpleToolRegistry::new();
//! registry.register(Arc::new(retroflow_foundation::tools::builtin::EchoTool))?;
//! let registry: Arc<dyn ToolRegistry> = Arc::new(registry);
//!
//! let bus = Arc::new(EventBus::new());
//! let planner = StepBackPlanner::new(
//!     Arc::new(TemplateStepGenerator::fixed(4)),
//!     registry.clone(),
//!     bus.clone(),
//! );
//!
//! let mut state = planner.plan_backwards("publish the quarterly report").await?;
//! let report = PlanExecutor::new(registry, bus).execute(&mut state).await?;
//! assert!(report.success);
//! ```

// workflow engine (agent/human/condition/loop orchestrator)
pub mod engine;

// plan executor (sequential walk with per-step tool fan-out)
pub mod executor;

// template step generator (reference StepGenerator implementation)
pub mod generator;

// backward planner
pub mod planner;

// tool registry and builtin tools
pub mod tools;

pub use engine::WorkflowEngine;
pub use executor::{ExecutionReport, ExecutorConfig, PlanExecutor};
pub use generator::{LengthPolicy, TemplateStepGenerator};
pub use planner::StepBackPlanner;
pub use tools::SimpleToolRegistry;
