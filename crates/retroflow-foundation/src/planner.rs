//! Backward planner
//!
//! Drives a [`StepGenerator`] one step at a time, goal-nearest first,
//! building the backward chain and then reversing it into the forward
//! execution plan. Lifecycle events go out on the composed [`EventBus`] in
//! strict causal order: `thinking`, then per step `thinking-progress` and
//! `backward-step-added`, then `plan-created` and `plan-ready`.
//!
//! Any generator error aborts planning: an `error` event is emitted, the
//! call returns [`EngineError::Planning`], and the plan stays not-ready so
//! the executor will refuse it.

use retroflow_kernel::error::{EngineError, EngineResult};
use retroflow_kernel::event::{EventBus, PlanningEvent};
use retroflow_kernel::plan::{PlanState, Step, StepGenerator, StepRequest};
use retroflow_kernel::tool::ToolRegistry;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Synthesizes a backward chain of prerequisite steps from a goal.
///
/// One planner instance serves one planning run; the resulting [`PlanState`]
/// is handed to the executor.
pub struct StepBackPlanner {
    generator: Arc<dyn StepGenerator>,
    registry: Arc<dyn ToolRegistry>,
    bus: Arc<EventBus>,
}

impl StepBackPlanner {
    /// Create a planner over the given generator, registry, and event bus.
    pub fn new(
        generator: Arc<dyn StepGenerator>,
        registry: Arc<dyn ToolRegistry>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            generator,
            registry,
            bus,
        }
    }

    /// Work backwards from `goal` and produce a ready-to-execute plan.
    pub async fn plan_backwards(&self, goal: &str) -> EngineResult<PlanState> {
        let mut state = PlanState::new(goal);

        info!(goal, "starting backward planning");
        self.bus.emit(&PlanningEvent::Thinking {
            message: format!("Working backwards from goal: {goal}"),
        });

        let length = match self.generator.plan_length(goal).await {
            Ok(length) => length,
            Err(err) => return Err(self.fail(err)),
        };
        let tools = self.registry.list();

        for index in 0..length {
            let current_state = state.current_state.clone();
            let request = StepRequest {
                goal,
                current_state: &current_state,
                index,
                tools: &tools,
            };

            let generated = match self.generator.next_step(request).await {
                Ok(generated) => generated,
                Err(err) => return Err(self.fail(err)),
            };

            let step = Step {
                id: format!("back-{index}"),
                description: generated.description,
                prerequisites: vec![generated.prerequisite],
                tools_needed: generated.tools_needed,
                completed: false,
                result: None,
            };
            debug!(step_id = %step.id, "backward step synthesized");

            state.backwards_steps.push(step.clone());
            self.bus.emit(&PlanningEvent::ThinkingProgress {
                message: format!("Identified prerequisite step {}/{length}", index + 1),
                current_state,
            });
            self.bus.emit(&PlanningEvent::BackwardStepAdded { step });

            state.current_state = generated.predecessor_state;
        }

        state.apply_reversal();
        state.current_progress = format!("0/{} steps completed", state.forward_plan.len());

        info!(steps = state.forward_plan.len(), "forward plan ready");
        self.bus.emit(&PlanningEvent::PlanCreated {
            message: format!("Forward plan created with {} steps", state.forward_plan.len()),
            plan: state.forward_plan.clone(),
        });
        self.bus.emit(&PlanningEvent::PlanReady {
            message: "Plan is ready for execution".to_string(),
            plan: state.forward_plan.clone(),
        });

        Ok(state)
    }

    /// Emit the error event and wrap the cause as a planning failure.
    fn fail(&self, err: EngineError) -> EngineError {
        let message = format!("Planning failed: {err}");
        error!(%err, "backward planning aborted");
        self.bus.emit(&PlanningEvent::Error {
            message: message.clone(),
        });
        EngineError::Planning(err.to_string())
    }
}
