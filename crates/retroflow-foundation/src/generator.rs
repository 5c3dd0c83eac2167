//! Template step generator
//!
//! Reference implementation of the kernel [`StepGenerator`] trait. Real
//! deployments put an LLM behind that trait; this one synthesizes template
//! text so the planning loop can run end to end without a model.
//!
//! Two things are deliberately better-defined than a model would be:
//!
//! - the chain length is a policy ([`LengthPolicy`]) — a bounded random range
//!   by default, or a fixed count for deterministic tests;
//! - tool selection is a keyword-overlap ranking over the registered tool
//!   descriptors, not an arbitrary subset, so the same goal always selects
//!   the same tools.

use async_trait::async_trait;
use rand::Rng;
use retroflow_kernel::error::{EngineError, EngineResult};
use retroflow_kernel::plan::{GeneratedStep, StepGenerator, StepRequest};
use retroflow_kernel::tool::ToolDescriptor;
use std::collections::HashSet;
use std::time::Duration;

/// How many backward steps to generate.
#[derive(Debug, Clone, Copy)]
pub enum LengthPolicy {
    /// Always this many steps.
    Fixed(usize),
    /// Uniformly random within the inclusive range, chosen per plan.
    Range(usize, usize),
}

/// Template-text step generator.
#[derive(Debug, Clone)]
pub struct TemplateStepGenerator {
    length: LengthPolicy,
    max_tools_per_step: usize,
    latency: Option<Duration>,
}

impl TemplateStepGenerator {
    /// Generator with the default policy: 3–5 steps per plan.
    pub fn new() -> Self {
        Self {
            length: LengthPolicy::Range(3, 5),
            max_tools_per_step: 3,
            latency: None,
        }
    }

    /// Generator with a fixed chain length.
    pub fn fixed(steps: usize) -> Self {
        Self {
            length: LengthPolicy::Fixed(steps),
            ..Self::new()
        }
    }

    /// Generator with a bounded random chain length.
    pub fn range(min: usize, max: usize) -> Self {
        Self {
            length: LengthPolicy::Range(min, max),
            ..Self::new()
        }
    }

    /// Cap the number of tools assigned per step.
    pub fn with_max_tools_per_step(mut self, max: usize) -> Self {
        self.max_tools_per_step = max;
        self
    }

    /// Sleep this long before each generated step, simulating model latency.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Rank registered tools by keyword overlap with the goal and current
    /// state, and keep the best-scoring ones.
    fn select_tools(&self, request: &StepRequest<'_>) -> Vec<String> {
        let wanted: HashSet<String> = tokenize(request.goal)
            .chain(tokenize(request.current_state))
            .collect();

        let mut scored: Vec<(usize, &ToolDescriptor)> = request
            .tools
            .iter()
            .filter_map(|tool| {
                let score = tokenize(&tool.name)
                    .chain(tokenize(&tool.description))
                    .filter(|word| wanted.contains(word))
                    .count();
                (score > 0).then_some((score, tool))
            })
            .collect();

        // Highest score first; ties broken by name so HashMap listing order
        // never leaks into the plan.
        scored.sort_by(|(sa, ta), (sb, tb)| sb.cmp(sa).then_with(|| ta.name.cmp(&tb.name)));
        scored
            .into_iter()
            .take(self.max_tools_per_step)
            .map(|(_, tool)| tool.name.clone())
            .collect()
    }
}

impl Default for TemplateStepGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StepGenerator for TemplateStepGenerator {
    async fn plan_length(&self, _goal: &str) -> EngineResult<usize> {
        match self.length {
            LengthPolicy::Fixed(n) if n > 0 => Ok(n),
            LengthPolicy::Fixed(n) => Err(EngineError::Validation(format!(
                "plan length must be positive, got {n}"
            ))),
            LengthPolicy::Range(min, max) if min > 0 && min <= max => {
                Ok(rand::thread_rng().gen_range(min..=max))
            }
            LengthPolicy::Range(min, max) => Err(EngineError::Validation(format!(
                "invalid plan length range {min}..={max}"
            ))),
        }
    }

    async fn next_step(&self, request: StepRequest<'_>) -> EngineResult<GeneratedStep> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let description = if request.index == 0 {
            format!("Carry out the final action that produces: {}", request.current_state)
        } else {
            format!("Bring about: {}", request.current_state)
        };

        Ok(GeneratedStep {
            description,
            prerequisite: format!("everything '{}' depends on is in place", request.current_state),
            tools_needed: self.select_tools(&request),
            predecessor_state: format!(
                "prerequisites (level {}) for: {}",
                request.index + 1,
                request.goal
            ),
        })
    }
}

/// Lowercased alphanumeric words of three or more characters.
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.len() >= 3)
        .map(str::to_lowercase)
}
