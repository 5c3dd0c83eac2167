//! Plan executor
//!
//! Walks a forward plan strictly sequentially: step N+1 never starts before
//! step N's tool fan-out has fully resolved. The only concurrency is inside
//! one step, where every required tool is invoked at once and the results are
//! joined.
//!
//! The failure asymmetry matters here and is deliberate:
//!
//! - a tool name that does not resolve against the registry aborts the whole
//!   run (`missing required tool` — fail fast, nothing is skipped);
//! - a resolved tool that fails while running is absorbed: a `tool-error`
//!   event goes out, the tool contributes no result, and the step still
//!   completes.
//!
//! Hitting the configured step budget is not an error either; it truncates
//! the run gracefully (`max-steps-reached`) and the final report says
//! `success = false`.

use futures::future::join_all;
use retroflow_kernel::error::{EngineError, EngineResult};
use retroflow_kernel::event::{EventBus, PlanningEvent};
use retroflow_kernel::plan::{PlanState, Step, StepOutcome};
use retroflow_kernel::tool::{Tool, ToolInput, ToolRegistry};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Executor configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum number of steps executed per run.
    pub max_steps: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { max_steps: 10 }
    }
}

impl ExecutorConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the step budget.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }
}

/// Final result of one execution run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExecutionReport {
    /// True only when every forward step was executed.
    pub success: bool,
    /// Steps executed, in execution order.
    pub completed_steps: Vec<Step>,
    /// Steps left unexecuted (budget truncation or cancellation).
    pub pending_steps: Vec<Step>,
    /// Final progress string ("N/M steps completed").
    pub current_progress: String,
}

/// Sequential plan executor with per-step tool fan-out.
pub struct PlanExecutor {
    registry: Arc<dyn ToolRegistry>,
    bus: Arc<EventBus>,
    config: ExecutorConfig,
    cancel: CancellationToken,
}

impl PlanExecutor {
    /// Create an executor over the given registry and event bus.
    pub fn new(registry: Arc<dyn ToolRegistry>, bus: Arc<EventBus>) -> Self {
        Self {
            registry,
            bus,
            config: ExecutorConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Attach a cancellation token. The token is observed between steps; an
    /// in-flight fan-out completes before cancellation takes effect.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Execute the forward plan, resuming from `current_step_index`.
    ///
    /// Requires `plan_ready`; rejects otherwise without invoking any tool.
    pub async fn execute(&self, state: &mut PlanState) -> EngineResult<ExecutionReport> {
        if !state.plan_ready {
            let message = "execution preconditions not met: plan is not ready".to_string();
            self.bus.emit(&PlanningEvent::Error {
                message: message.clone(),
            });
            return Err(EngineError::Precondition(message));
        }

        let total = state.forward_plan.len();
        info!(goal = %state.goal_state, steps = total, "starting plan execution");
        self.bus.emit(&PlanningEvent::ExecutionStart {
            message: format!("Executing plan for goal: {}", state.goal_state),
            plan: state.forward_plan.clone(),
        });

        let mut cancelled = false;
        while state.current_step_index < total {
            if self.cancel.is_cancelled() {
                cancelled = true;
                warn!("plan execution cancelled");
                self.bus.emit(&PlanningEvent::ExecutionCancelled {
                    message: format!("Execution cancelled after {}", state.current_progress),
                    completed_steps: state.completed_steps.clone(),
                });
                break;
            }

            if state.current_step_index >= self.config.max_steps {
                info!(budget = self.config.max_steps, "step budget reached");
                self.bus.emit(&PlanningEvent::MaxStepsReached {
                    message: format!("Step budget of {} reached", self.config.max_steps),
                    completed_steps: state.completed_steps.clone(),
                    remaining_steps: state.pending_steps.clone(),
                });
                break;
            }

            let mut step = state.forward_plan[state.current_step_index].clone();
            self.bus.emit(&PlanningEvent::StepStart {
                message: format!("Starting step: {}", step.description),
                step: step.clone(),
            });

            let tools = self.resolve_tools(&step)?;
            let outcome = self.fan_out(&step, tools).await?;

            step.completed = true;
            step.result = Some(outcome.clone());
            state.forward_plan[state.current_step_index] = step.clone();
            state.completed_steps.push(step.clone());
            state.current_step_index += 1;
            state.pending_steps = state.forward_plan[state.current_step_index..].to_vec();
            state.current_progress =
                format!("{}/{} steps completed", state.current_step_index, total);

            self.bus.emit(&PlanningEvent::StepComplete {
                message: format!("Completed step: {}", step.description),
                step,
                result: outcome,
            });
        }

        if !cancelled {
            info!(progress = %state.current_progress, "plan execution finished");
            self.bus.emit(&PlanningEvent::ExecutionComplete {
                message: format!("Execution finished: {}", state.current_progress),
                completed_steps: state.completed_steps.clone(),
            });
        }

        Ok(ExecutionReport {
            success: state.is_fully_executed(),
            completed_steps: state.completed_steps.clone(),
            pending_steps: state.pending_steps.clone(),
            current_progress: state.current_progress.clone(),
        })
    }

    /// Resolve every tool a step needs, failing the run on the first miss.
    fn resolve_tools(&self, step: &Step) -> EngineResult<Vec<(String, Arc<dyn Tool>)>> {
        let mut tools = Vec::with_capacity(step.tools_needed.len());
        for name in &step.tools_needed {
            let Some(tool) = self.registry.get(name) else {
                let message = format!("missing required tool: {name}");
                error!(step_id = %step.id, tool = %name, "aborting execution");
                self.bus.emit(&PlanningEvent::Error {
                    message: message.clone(),
                });
                return Err(EngineError::ToolNotFound(name.clone()));
            };
            tools.push((name.clone(), tool));
        }
        Ok(tools)
    }

    /// Invoke all of a step's tools concurrently and join the results.
    /// Individual failures are absorbed and reported as `tool-error` events.
    async fn fan_out(
        &self,
        step: &Step,
        tools: Vec<(String, Arc<dyn Tool>)>,
    ) -> EngineResult<StepOutcome> {
        let step_value = serde_json::to_value(step)?;

        let invocations = tools.into_iter().map(|(name, tool)| {
            let input = ToolInput::from_json(serde_json::json!({ "step": step_value.clone() }));
            async move { (name, tool.execute(input).await) }
        });

        let mut outcome = StepOutcome::default();
        for (name, result) in join_all(invocations).await {
            if result.success {
                outcome.tool_results.push(result.output);
            } else {
                let error = result
                    .error
                    .unwrap_or_else(|| "unknown tool error".to_string());
                warn!(step_id = %step.id, tool = %name, %error, "tool failed, continuing");
                self.bus.emit(&PlanningEvent::ToolError {
                    message: format!("Tool '{name}' failed during step '{}'", step.id),
                    error,
                });
            }
        }
        Ok(outcome)
    }
}
