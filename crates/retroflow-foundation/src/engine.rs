//! Workflow engine
//!
//! Walks a singly-linked graph of heterogeneous steps over a shared variables
//! map. Agent steps run an external collaborator built by the configured
//! [`AgentFactory`]; human steps pause the run until a result is submitted;
//! condition and loop steps only route.
//!
//! Routing is computed by the pure kernel function
//! [`resolve_next`](retroflow_kernel::workflow::resolve_next) — the graph is
//! never mutated mid-run. The one piece of loop bookkeeping, the iteration
//! counter, lives in the variables map under `"{step_id}_iterations"` and is
//! incremented here each time a back-edge is taken.
//!
//! The pause/resume contract is explicit: reaching a human step leaves the
//! engine `Paused` with `current_step_id` on that step. The caller submits the
//! human's answer with [`WorkflowEngine::submit_human_task_result`] and then
//! calls [`WorkflowEngine::continue_execution`]; resuming without a submitted
//! result is a precondition error.

use retroflow_kernel::error::{EngineError, EngineResult};
use retroflow_kernel::workflow::{
    AgentFactory, AgentRunResult, AgentStepConfig, ProgressCallback, ProgressUpdate, StepKind,
    WorkflowContext, WorkflowStatus, WorkflowStep, resolve_next,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Orchestrates one workflow run over a step graph.
///
/// One engine instance owns one run: the step graph, the shared
/// [`WorkflowContext`], and the agent factory that builds collaborators for
/// agent steps.
pub struct WorkflowEngine {
    run_id: Uuid,
    steps: HashMap<String, WorkflowStep>,
    factory: Arc<dyn AgentFactory>,
    context: WorkflowContext,
    progress: Option<ProgressCallback>,
    cancel: CancellationToken,
}

impl WorkflowEngine {
    /// Create an engine with an empty step graph.
    pub fn new(factory: Arc<dyn AgentFactory>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            steps: HashMap::new(),
            factory,
            context: WorkflowContext::default(),
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Identifier of this run, for log correlation.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Attach a cancellation token, observed before each step.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Set the progress callback, forwarded into agent collaborators and
    /// fired by the engine when a step starts.
    pub fn on_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Add a step to the graph. Upsert by step id.
    pub fn add_step(&mut self, step: WorkflowStep) {
        self.steps.insert(step.id.clone(), step);
    }

    /// Add several steps at once.
    pub fn add_steps(&mut self, steps: impl IntoIterator<Item = WorkflowStep>) {
        for step in steps {
            self.add_step(step);
        }
    }

    /// Seed a shared variable before the run starts.
    pub fn set_variable(&mut self, key: impl Into<String>, value: Value) {
        self.context.variables.insert(key.into(), value);
    }

    /// The run's shared context.
    pub fn context(&self) -> &WorkflowContext {
        &self.context
    }

    /// Current engine status.
    pub fn status(&self) -> &WorkflowStatus {
        &self.context.status
    }

    /// Result recorded for a step, if it has executed.
    pub fn result_of(&self, step_id: &str) -> Option<&AgentRunResult> {
        self.context.results.get(step_id)
    }

    /// Run the workflow from `start_step_id` until it completes, pauses on a
    /// human step, or fails.
    ///
    /// Returns the status the run stopped in (`Completed` or `Paused`);
    /// failures are returned as errors with the status set to `Failed`.
    pub async fn execute_workflow(&mut self, start_step_id: &str) -> EngineResult<WorkflowStatus> {
        if self.context.status == WorkflowStatus::Running {
            return Err(EngineError::Precondition(
                "workflow is already running".to_string(),
            ));
        }
        if !self.steps.contains_key(start_step_id) {
            return Err(EngineError::Validation(format!(
                "unknown start step: {start_step_id}"
            )));
        }

        info!(run_id = %self.run_id, start = start_step_id, "starting workflow");
        self.context.current_step_id = start_step_id.to_string();
        self.context.status = WorkflowStatus::Running;
        self.run_loop().await
    }

    /// Submit the human's answer for the step the engine is paused on.
    ///
    /// The value lands in `variables[step_id]` and, wrapped as an
    /// [`AgentRunResult`], in `results[step_id]`. The engine then advances
    /// past the human step and returns to `Running` (or `Completed` when the
    /// step had no successor) — but the loop itself only resumes when the
    /// caller invokes [`continue_execution`](Self::continue_execution).
    ///
    /// Rejected unless the engine is paused exactly on `step_id`.
    pub fn submit_human_task_result(&mut self, step_id: &str, value: Value) -> EngineResult<()> {
        if self.context.status != WorkflowStatus::Paused {
            return Err(EngineError::Precondition(
                "no human task is awaiting a result".to_string(),
            ));
        }
        if self.context.current_step_id != step_id {
            return Err(EngineError::unexpected_step(
                self.context.current_step_id.clone(),
                step_id,
            ));
        }

        debug!(step_id, "human task result submitted");
        let step = self.current_step()?;
        let result = AgentRunResult::from_human(&value);
        self.context.variables.insert(step_id.to_string(), value);
        self.context.results.insert(step_id.to_string(), result);
        self.notify(step_id, format!("Completed step: {}", step.name));

        match self.advance(&step) {
            Some(next) => {
                self.context.current_step_id = next;
                self.context.status = WorkflowStatus::Running;
            }
            None => self.context.status = WorkflowStatus::Completed,
        }
        Ok(())
    }

    /// Resume the step loop after a human-task result was submitted.
    pub async fn continue_execution(&mut self) -> EngineResult<WorkflowStatus> {
        match self.context.status {
            WorkflowStatus::Running => {
                info!(step_id = %self.context.current_step_id, "resuming workflow");
                self.run_loop().await
            }
            // The submitted human step was the last one; nothing left to run.
            WorkflowStatus::Completed => Ok(WorkflowStatus::Completed),
            _ => Err(EngineError::Precondition(
                "workflow is not resumable: no human task result was submitted".to_string(),
            )),
        }
    }

    /// Main step loop. Runs until completion, a pause, a failure, or
    /// cancellation.
    async fn run_loop(&mut self) -> EngineResult<WorkflowStatus> {
        loop {
            if self.cancel.is_cancelled() {
                warn!("workflow cancelled");
                self.context.status = WorkflowStatus::Failed("interrupted".to_string());
                return Err(EngineError::Interrupted);
            }

            let step = match self.current_step() {
                Ok(step) => step,
                Err(err) => {
                    self.context.status = WorkflowStatus::Failed(err.to_string());
                    return Err(err);
                }
            };
            debug!(step_id = %step.id, name = %step.name, "entering step");
            self.notify(&step.id, format!("Starting step: {}", step.name));

            match &step.kind {
                StepKind::Agent(config) => {
                    if let Err(err) = self.run_agent_step(&step, config).await {
                        error!(step_id = %step.id, %err, "agent step failed");
                        self.context.status = WorkflowStatus::Failed(err.to_string());
                        return Err(EngineError::workflow_step(&step.id, err));
                    }
                }
                StepKind::Human(config) => {
                    info!(step_id = %step.id, prompt = %config.prompt, "pausing for human input");
                    self.context.status = WorkflowStatus::Paused;
                    return Ok(WorkflowStatus::Paused);
                }
                StepKind::Condition(_) | StepKind::Loop(_) => {}
            }
            self.notify(&step.id, format!("Completed step: {}", step.name));

            match self.advance(&step) {
                Some(next) => self.context.current_step_id = next,
                None => {
                    info!("workflow completed");
                    self.context.status = WorkflowStatus::Completed;
                    return Ok(WorkflowStatus::Completed);
                }
            }
        }
    }

    /// Route past `step` and do the loop-counter bookkeeping when a back-edge
    /// is taken.
    fn advance(&mut self, step: &WorkflowStep) -> Option<String> {
        let next = resolve_next(step, &self.context.variables);
        if matches!(step.kind, StepKind::Loop(_))
            && next.is_some()
            && next == step.alternate_step_id
        {
            let key = step.iteration_key();
            let iterations = self
                .context
                .variables
                .get(&key)
                .and_then(Value::as_u64)
                .unwrap_or(0);
            self.context.variables.insert(key, Value::from(iterations + 1));
        }
        next
    }

    /// Build and drive a collaborator for one agent step, recording its
    /// result into the context.
    async fn run_agent_step(
        &mut self,
        step: &WorkflowStep,
        config: &AgentStepConfig,
    ) -> EngineResult<()> {
        let prompt = self.build_prompt(config)?;

        let mut runner = self.factory.create(config)?;
        runner.initialize().await?;
        let outcome = runner.execute_task(&prompt, self.progress.clone()).await;
        let cleanup = runner.cleanup().await;

        let result = outcome?;
        cleanup?;

        self.context.variables.insert(
            format!("{}_result", step.id),
            Value::String(result.content.clone()),
        );
        self.context.results.insert(step.id.clone(), result);
        Ok(())
    }

    /// The step prompt, with the variables map appended when the step opted
    /// into context injection.
    fn build_prompt(&self, config: &AgentStepConfig) -> EngineResult<String> {
        if !config.use_context || self.context.variables.is_empty() {
            return Ok(config.prompt.clone());
        }
        let context = serde_json::to_string_pretty(&self.context.variables)?;
        Ok(format!("{}\n\nContext:\n{}", config.prompt, context))
    }

    fn notify(&self, step_id: &str, message: String) {
        if let Some(progress) = &self.progress {
            progress(
                step_id,
                ProgressUpdate {
                    message,
                    percent: self.percent_done(),
                },
            );
        }
    }

    /// Coarse progress estimate: executed steps over graph size.
    fn percent_done(&self) -> u8 {
        if self.steps.is_empty() {
            return 0;
        }
        let done = self.context.results.len().min(self.steps.len());
        ((done * 100) / self.steps.len()) as u8
    }

    fn current_step(&self) -> EngineResult<WorkflowStep> {
        let id = &self.context.current_step_id;
        self.steps.get(id).cloned().ok_or_else(|| {
            EngineError::workflow_step(id.clone(), "step id not present in the workflow")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use retroflow_kernel::workflow::{
        AgentRunner, ConditionSpec, HumanStepConfig, LoopConfig, RunStatus,
    };
    use serde_json::json;

    /// Factory whose collaborators echo a canned reply and log every prompt.
    struct ScriptedFactory {
        reply: String,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedFactory {
        fn new(reply: &str) -> (Arc<Self>, Arc<Mutex<Vec<String>>>) {
            let prompts = Arc::new(Mutex::new(Vec::new()));
            let factory = Arc::new(Self {
                reply: reply.to_string(),
                prompts: prompts.clone(),
            });
            (factory, prompts)
        }
    }

    impl AgentFactory for ScriptedFactory {
        fn create(&self, _config: &AgentStepConfig) -> EngineResult<Box<dyn AgentRunner>> {
            Ok(Box::new(ScriptedRunner {
                reply: self.reply.clone(),
                prompts: self.prompts.clone(),
            }))
        }
    }

    struct ScriptedRunner {
        reply: String,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl AgentRunner for ScriptedRunner {
        async fn initialize(&mut self) -> EngineResult<()> {
            Ok(())
        }

        async fn execute_task(
            &mut self,
            prompt: &str,
            _on_progress: Option<ProgressCallback>,
        ) -> EngineResult<AgentRunResult> {
            self.prompts.lock().push(prompt.to_string());
            Ok(AgentRunResult::completed(self.reply.clone()))
        }

        async fn cleanup(&mut self) -> EngineResult<()> {
            Ok(())
        }
    }

    struct FailingFactory;

    impl AgentFactory for FailingFactory {
        fn create(&self, _config: &AgentStepConfig) -> EngineResult<Box<dyn AgentRunner>> {
            Ok(Box::new(FailingRunner))
        }
    }

    struct FailingRunner;

    #[async_trait]
    impl AgentRunner for FailingRunner {
        async fn initialize(&mut self) -> EngineResult<()> {
            Ok(())
        }

        async fn execute_task(
            &mut self,
            _prompt: &str,
            _on_progress: Option<ProgressCallback>,
        ) -> EngineResult<AgentRunResult> {
            Err(EngineError::Internal("agent blew up".to_string()))
        }

        async fn cleanup(&mut self) -> EngineResult<()> {
            Ok(())
        }
    }

    fn agent_step(id: &str, prompt: &str) -> WorkflowStep {
        WorkflowStep::new(
            id,
            format!("Agent {id}"),
            StepKind::Agent(AgentStepConfig {
                agent_id: None,
                prompt: prompt.to_string(),
                use_context: false,
            }),
        )
    }

    #[tokio::test]
    async fn linear_run_completes() {
        let (factory, _) = ScriptedFactory::new("done");
        let mut engine = WorkflowEngine::new(factory);
        engine.add_steps([agent_step("a", "first").then("b"), agent_step("b", "second")]);

        let status = engine.execute_workflow("a").await.unwrap();

        assert_eq!(status, WorkflowStatus::Completed);
        assert_eq!(engine.result_of("a").unwrap().status, RunStatus::Completed);
        assert_eq!(engine.result_of("b").unwrap().content, "done");
        assert_eq!(engine.context().variables["a_result"], json!("done"));
    }

    #[tokio::test]
    async fn human_step_pauses_then_resumes() {
        let (factory, _) = ScriptedFactory::new("drafted");
        let mut engine = WorkflowEngine::new(factory);
        engine.add_steps([
            agent_step("draft", "write a draft").then("review"),
            WorkflowStep::new(
                "review",
                "Human review",
                StepKind::Human(HumanStepConfig {
                    prompt: "approve the draft".to_string(),
                }),
            )
            .then("publish"),
            agent_step("publish", "publish it"),
        ]);

        let status = engine.execute_workflow("draft").await.unwrap();
        assert_eq!(status, WorkflowStatus::Paused);
        assert_eq!(engine.context().current_step_id, "review");
        // The step after the pause has not run.
        assert!(engine.result_of("publish").is_none());

        engine
            .submit_human_task_result("review", json!("approved"))
            .unwrap();
        let status = engine.continue_execution().await.unwrap();

        assert_eq!(status, WorkflowStatus::Completed);
        assert_eq!(engine.result_of("review").unwrap().content, "approved");
        assert!(engine.result_of("publish").is_some());
    }

    #[tokio::test]
    async fn submit_for_wrong_step_is_rejected() {
        let (factory, _) = ScriptedFactory::new("x");
        let mut engine = WorkflowEngine::new(factory);
        engine.add_steps([WorkflowStep::new(
            "gate",
            "Gate",
            StepKind::Human(HumanStepConfig {
                prompt: "confirm".to_string(),
            }),
        )]);

        engine.execute_workflow("gate").await.unwrap();
        let err = engine
            .submit_human_task_result("other", json!("yes"))
            .unwrap_err();
        assert!(matches!(err, EngineError::UnexpectedStep { .. }));
    }

    #[tokio::test]
    async fn resume_without_result_is_rejected() {
        let (factory, _) = ScriptedFactory::new("x");
        let mut engine = WorkflowEngine::new(factory);
        engine.add_steps([WorkflowStep::new(
            "gate",
            "Gate",
            StepKind::Human(HumanStepConfig {
                prompt: "confirm".to_string(),
            }),
        )]);

        engine.execute_workflow("gate").await.unwrap();
        let err = engine.continue_execution().await.unwrap_err();
        assert!(matches!(err, EngineError::Precondition(_)));
        assert_eq!(*engine.status(), WorkflowStatus::Paused);
    }

    #[tokio::test]
    async fn condition_routes_on_variables() {
        let (factory, _) = ScriptedFactory::new("ok");
        let mut engine = WorkflowEngine::new(factory);
        engine.add_steps([
            WorkflowStep::new(
                "check",
                "Check flag",
                StepKind::Condition(ConditionSpec::VariableTruthy("flag".to_string())),
            )
            .then("yes")
            .otherwise("no"),
            agent_step("yes", "taken when truthy"),
            agent_step("no", "taken when falsy"),
        ]);
        engine.set_variable("flag", json!(true));

        engine.execute_workflow("check").await.unwrap();

        assert!(engine.result_of("yes").is_some());
        assert!(engine.result_of("no").is_none());
    }

    #[tokio::test]
    async fn loop_runs_body_until_bound() {
        let (factory, _) = ScriptedFactory::new("pass");
        let mut engine = WorkflowEngine::new(factory);
        engine.add_steps([
            WorkflowStep::new(
                "retry",
                "Retry loop",
                StepKind::Loop(LoopConfig {
                    condition: None,
                    max_iterations: 3,
                }),
            )
            .then("exit")
            .otherwise("body"),
            agent_step("body", "one attempt").then("retry"),
            agent_step("exit", "after the loop"),
        ]);

        let status = engine.execute_workflow("retry").await.unwrap();

        assert_eq!(status, WorkflowStatus::Completed);
        assert_eq!(engine.context().variables["retry_iterations"], json!(3));
        assert!(engine.result_of("exit").is_some());
    }

    #[tokio::test]
    async fn context_injection_appends_variables() {
        let (factory, prompts) = ScriptedFactory::new("seen");
        let mut engine = WorkflowEngine::new(factory);
        engine.add_step(WorkflowStep::new(
            "summarize",
            "Summarize",
            StepKind::Agent(AgentStepConfig {
                agent_id: None,
                prompt: "summarize the findings".to_string(),
                use_context: true,
            }),
        ));
        engine.set_variable("topic", json!("backward planning"));

        engine.execute_workflow("summarize").await.unwrap();

        let prompt = prompts.lock()[0].clone();
        assert!(prompt.starts_with("summarize the findings"));
        assert!(prompt.contains("backward planning"));
    }

    #[tokio::test]
    async fn agent_failure_fails_the_run() {
        let mut engine = WorkflowEngine::new(Arc::new(FailingFactory));
        engine.add_steps([agent_step("a", "will fail").then("b"), agent_step("b", "never runs")]);

        let err = engine.execute_workflow("a").await.unwrap_err();

        assert!(matches!(err, EngineError::WorkflowStep { ref step_id, .. } if step_id == "a"));
        assert!(matches!(engine.status(), WorkflowStatus::Failed(_)));
        assert!(engine.result_of("b").is_none());
    }

    #[tokio::test]
    async fn dangling_next_step_fails() {
        let (factory, _) = ScriptedFactory::new("x");
        let mut engine = WorkflowEngine::new(factory);
        engine.add_step(agent_step("a", "first").then("ghost"));

        let err = engine.execute_workflow("a").await.unwrap_err();
        assert!(matches!(err, EngineError::WorkflowStep { ref step_id, .. } if step_id == "ghost"));
    }

    #[tokio::test]
    async fn unknown_start_step_is_rejected() {
        let (factory, _) = ScriptedFactory::new("x");
        let mut engine = WorkflowEngine::new(factory);

        let err = engine.execute_workflow("missing").await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(*engine.status(), WorkflowStatus::NotStarted);
    }

    #[tokio::test]
    async fn cancellation_interrupts_the_run() {
        let (factory, _) = ScriptedFactory::new("x");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut engine = WorkflowEngine::new(factory).with_cancellation(cancel);
        engine.add_step(agent_step("a", "never runs"));

        let err = engine.execute_workflow("a").await.unwrap_err();
        assert!(matches!(err, EngineError::Interrupted));
        assert!(matches!(engine.status(), WorkflowStatus::Failed(_)));
    }

    #[test]
    fn step_kind_set_is_closed() {
        // Exhaustive match from outside the kernel crate; no wildcard arm.
        let label = |kind: &StepKind| match kind {
            StepKind::Agent(_) => "agent",
            StepKind::Human(_) => "human",
            StepKind::Condition(_) => "condition",
            StepKind::Loop(_) => "loop",
        };
        assert_eq!(label(&agent_step("a", "p").kind), "agent");
        assert_eq!(
            label(&StepKind::Human(HumanStepConfig {
                prompt: "confirm".to_string(),
            })),
            "human"
        );
    }

    #[tokio::test]
    async fn progress_reports_start_and_completion_for_every_step() {
        let (factory, _) = ScriptedFactory::new("ok");
        let log: Arc<Mutex<Vec<(String, String)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let callback: ProgressCallback = Arc::new(move |step_id, update| {
            sink.lock().push((step_id.to_string(), update.message));
        });

        let mut engine = WorkflowEngine::new(factory).on_progress(callback);
        engine.add_steps([
            agent_step("a", "work").then("check"),
            WorkflowStep::new(
                "check",
                "Check flag",
                StepKind::Condition(ConditionSpec::VariableTruthy("flag".to_string())),
            )
            .then("gate"),
            WorkflowStep::new(
                "gate",
                "Gate",
                StepKind::Human(HumanStepConfig {
                    prompt: "confirm".to_string(),
                }),
            ),
        ]);

        engine.execute_workflow("a").await.unwrap();

        let phases = |entries: &[(String, String)]| -> Vec<(String, &'static str)> {
            entries
                .iter()
                .map(|(id, message)| {
                    let phase = if message.starts_with("Completed") {
                        "complete"
                    } else {
                        "start"
                    };
                    (id.clone(), phase)
                })
                .collect()
        };

        // Agent and condition steps both report start and completion; the
        // human step has only started.
        assert_eq!(
            phases(&log.lock()),
            vec![
                ("a".to_string(), "start"),
                ("a".to_string(), "complete"),
                ("check".to_string(), "start"),
                ("check".to_string(), "complete"),
                ("gate".to_string(), "start"),
            ]
        );

        engine.submit_human_task_result("gate", json!("yes")).unwrap();
        assert_eq!(
            phases(&log.lock()).last().cloned(),
            Some(("gate".to_string(), "complete"))
        );
        assert_eq!(*engine.status(), WorkflowStatus::Completed);
    }
}
