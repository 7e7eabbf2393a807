//! Steps: the smallest retryable unit of interaction with the client.
//!
//! A step is driven by repeatedly calling [`Step::run`] until
//! [`Step::status`] reports a terminal state. `run` issues physical input and
//! is throttled by a cool-down; `status` only reads the latest snapshot and
//! waits for a settle delay after the last run before trusting a negative read.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::context::ExecutionContext;
use crate::error::EngineResult;

mod attack;
mod interact;
mod key;
mod menus;
mod movement;
mod portal;
mod skill;

pub use attack::Attack;
pub use interact::{InteractObject, InteractTarget, PickupItem, SelectWaypoint};
pub use key::PressKey;
pub use menus::CloseAllMenus;
pub use movement::MoveTo;
pub use portal::OpenPortal;
pub use skill::SetSkill;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepStatus {
    NotStarted,
    InProgress,
    Completed,
    Failed,
}

impl StepStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Failed)
    }
}

/// Timing and retry bounds of a step
#[derive(Debug, Clone, Copy)]
pub struct StepPolicy {
    /// Minimum time between two physical attempts
    pub cooldown: Duration,
    /// Time after an attempt before a negative read is trusted
    pub settle: Duration,
    /// Attempts after which an unsuccessful step fails
    pub max_attempts: u32,
}

impl StepPolicy {
    pub const fn new(cooldown: Duration, settle: Duration, max_attempts: u32) -> Self {
        Self {
            cooldown,
            settle,
            max_attempts,
        }
    }
}

/// Completion state machine shared by every built-in step.
///
/// Status only ever moves forward: once `Completed` or `Failed` it stays there.
#[derive(Debug, Clone)]
pub struct StepState {
    status: StepStatus,
    attempts: u32,
    last_run: Option<Instant>,
    policy: StepPolicy,
}

impl StepState {
    pub fn new(policy: StepPolicy) -> Self {
        Self {
            status: StepStatus::NotStarted,
            attempts: 0,
            last_run: None,
            policy,
        }
    }

    pub fn status(&self) -> StepStatus {
        self.status
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn policy(&self) -> &StepPolicy {
        &self.policy
    }

    pub fn since_last_run(&self) -> Option<Duration> {
        self.last_run.map(|t| t.elapsed())
    }

    /// Whether a new physical attempt is allowed right now
    pub fn can_fire(&self) -> bool {
        if self.status.is_terminal() || self.attempts >= self.policy.max_attempts {
            return false;
        }
        self.since_last_run()
            .map_or(true, |since| since >= self.policy.cooldown)
    }

    /// Whether enough time passed since the last attempt to trust a read
    pub fn is_settled(&self) -> bool {
        self.since_last_run()
            .map_or(true, |since| since >= self.policy.settle)
    }

    /// Record a physical attempt
    pub fn mark_run(&mut self) {
        self.attempts += 1;
        self.last_run = Some(Instant::now());
        if self.status == StepStatus::NotStarted {
            self.status = StepStatus::InProgress;
        }
    }

    /// Move to `to` unless the current status is terminal
    pub fn try_transition(&mut self, to: StepStatus) -> StepStatus {
        if !self.status.is_terminal() {
            self.status = to;
        }
        self.status
    }

    /// Resolve the status from a goal observation.
    ///
    /// A positive observation completes the step. A negative one fails it
    /// only once the attempt bound is reached and the last attempt settled.
    pub fn resolve(&mut self, goal_reached: bool) -> StepStatus {
        if self.status.is_terminal() {
            return self.status;
        }
        if goal_reached {
            return self.try_transition(StepStatus::Completed);
        }
        if self.attempts >= self.policy.max_attempts && self.is_settled() {
            return self.try_transition(StepStatus::Failed);
        }
        self.status
    }
}

/// A retryable, pollable unit of physical interaction
#[async_trait]
pub trait Step: Send {
    fn name(&self) -> &'static str;

    /// Derive completion from the latest snapshot. Never issues input.
    fn status(&mut self, ctx: &ExecutionContext) -> StepStatus;

    /// Attempt one unit of interaction, a no-op while cooling down
    async fn run(&mut self, ctx: &mut ExecutionContext) -> EngineResult<()>;

    fn attempts(&self) -> u32;

    /// Called once when the interpreter observes `Completed`
    fn on_completed(&mut self, _ctx: &ExecutionContext) {}
}
