use std::time::Duration;

use async_trait::async_trait;

use super::{Step, StepPolicy, StepState, StepStatus};
use crate::context::ExecutionContext;
use crate::error::EngineResult;
use crate::io::MouseButton;

/// Time for the portal to pop up before another cast is attempted
const PORTAL_POLICY: StepPolicy =
    StepPolicy::new(Duration::from_secs(2), Duration::from_secs(1), 5);

/// Casts a town portal with the tome key binding
pub struct OpenPortal {
    state: StepState,
    key: char,
}

impl OpenPortal {
    pub fn new(key: char) -> Self {
        Self {
            state: StepState::new(PORTAL_POLICY),
            key,
        }
    }
}

#[async_trait]
impl Step for OpenPortal {
    fn name(&self) -> &'static str {
        "OpenPortal"
    }

    fn status(&mut self, ctx: &ExecutionContext) -> StepStatus {
        // Hovering the portal position before it shows can keep another
        // entity focused, so even a positive read waits for the settle delay
        let goal = self.state.is_settled() && ctx.data().has_portal();
        self.state.resolve(goal)
    }

    async fn run(&mut self, ctx: &mut ExecutionContext) -> EngineResult<()> {
        if !self.state.can_fire() {
            return Ok(());
        }

        let lease = ctx.pause_if_not_priority().await?;
        lease.press_key(lease.ascii_code(self.key));
        self.state.mark_run();
        ctx.sleep(Duration::from_millis(250)).await?;
        lease.click(MouseButton::Right, 300, 300);
        Ok(())
    }

    fn attempts(&self) -> u32 {
        self.state.attempts()
    }
}
