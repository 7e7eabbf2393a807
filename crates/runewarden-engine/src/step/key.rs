use std::time::Duration;

use async_trait::async_trait;

use super::{Step, StepPolicy, StepState, StepStatus};
use crate::context::ExecutionContext;
use crate::error::EngineResult;
use crate::io::KeyCode;

/// Presses a key once, then completes after a short settle
pub struct PressKey {
    state: StepState,
    key: KeyCode,
    label: &'static str,
}

impl PressKey {
    pub fn new(key: KeyCode, label: &'static str) -> Self {
        Self {
            state: StepState::new(StepPolicy::new(
                Duration::from_millis(100),
                Duration::from_millis(100),
                1,
            )),
            key,
            label,
        }
    }
}

#[async_trait]
impl Step for PressKey {
    fn name(&self) -> &'static str {
        self.label
    }

    fn status(&mut self, _ctx: &ExecutionContext) -> StepStatus {
        let pressed = self.state.attempts() >= 1 && self.state.is_settled();
        self.state.resolve(pressed)
    }

    async fn run(&mut self, ctx: &mut ExecutionContext) -> EngineResult<()> {
        if !self.state.can_fire() {
            return Ok(());
        }
        let lease = ctx.pause_if_not_priority().await?;
        lease.press_key(self.key);
        self.state.mark_run();
        Ok(())
    }

    fn attempts(&self) -> u32 {
        self.state.attempts()
    }
}
