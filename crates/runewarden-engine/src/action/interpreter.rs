use std::collections::VecDeque;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::Next;
use crate::context::ExecutionContext;
use crate::error::{EngineError, EngineResult};
use crate::step::StepStatus;

/// Bounds of one interpreter run
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    pub max_iterations: u64,
    pub max_duration: Duration,
    /// Sleep between two polls of an unresolved step
    pub poll_interval: Duration,
    /// Random extra delay added to each poll sleep
    pub poll_jitter: Duration,
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
            max_duration: Duration::from_secs(15 * 60),
            poll_interval: Duration::from_millis(100),
            poll_jitter: Duration::ZERO,
        }
    }
}

/// Drives a chain against a live session until it runs dry
#[derive(Debug, Clone, Default)]
pub struct Interpreter {
    budget: Budget,
}

impl Interpreter {
    pub fn new(budget: Budget) -> Self {
        Self { budget }
    }

    pub fn budget(&self) -> &Budget {
        &self.budget
    }

    /// Evaluate `chain` until it is empty.
    ///
    /// Every tick starts with a stop/pause checkpoint and a fresh snapshot.
    /// The time budget only counts time the session was not suspended.
    /// Action errors and terminal step failures abort the chain; transient
    /// step failures are retried within the step's attempt bound.
    pub async fn run(&self, ctx: &mut ExecutionContext, chain: Vec<Next>) -> EngineResult<()> {
        let mut queue: VecDeque<Next> = chain.into();
        let started = Instant::now();
        let suspended_before = ctx.suspended();
        let mut iterations: u64 = 0;

        while let Some(next) = queue.pop_front() {
            iterations += 1;
            // Paused and arbitration waits do not count against the budget
            let elapsed = started
                .elapsed()
                .saturating_sub(ctx.suspended().saturating_sub(suspended_before));
            if iterations > self.budget.max_iterations || elapsed > self.budget.max_duration {
                return Err(EngineError::Stuck {
                    iterations: iterations - 1,
                    elapsed,
                    last_action: ctx.debug.last_action.clone(),
                    last_step: ctx.debug.last_step.clone(),
                });
            }

            ctx.checkpoint().await?;
            if !ctx.game().process_alive() {
                return Err(EngineError::ProcessFailure("client process is gone".into()));
            }
            ctx.refresh_game_data();

            match next {
                Next::Action(action) => {
                    ctx.debug.last_action = action.name().to_string();
                    let children = action.evaluate(ctx.data())?;
                    for child in children.into_iter().rev() {
                        queue.push_front(child);
                    }
                }
                Next::Step(mut step) => {
                    ctx.debug.last_step = step.name().to_string();
                    match step.status(ctx) {
                        StepStatus::Completed => {
                            debug!(target: "engine", "[{}] {} completed", ctx.name(), step.name());
                            step.on_completed(ctx);
                        }
                        StepStatus::Failed => {
                            return Err(EngineError::TerminalStepFailure {
                                step: step.name(),
                                attempts: step.attempts(),
                            });
                        }
                        StepStatus::NotStarted | StepStatus::InProgress => {
                            if let Err(e) = step.run(ctx).await {
                                if !e.is_retryable() {
                                    return Err(e);
                                }
                                warn!(target: "engine", "[{}] {}", ctx.name(), e);
                            }
                            queue.push_front(Next::Step(step));
                            ctx.sleep(self.poll_delay()).await?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn poll_delay(&self) -> Duration {
        let jitter_ms = self.budget.poll_jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.budget.poll_interval;
        }
        self.budget.poll_interval + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}
