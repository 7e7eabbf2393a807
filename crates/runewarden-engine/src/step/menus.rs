use std::time::Duration;

use async_trait::async_trait;

use super::{Step, StepPolicy, StepState, StepStatus};
use crate::context::ExecutionContext;
use crate::error::EngineResult;
use crate::io::keys;

const MENUS_POLICY: StepPolicy =
    StepPolicy::new(Duration::from_millis(200), Duration::from_millis(200), 11);

/// Presses escape until no menu is open
pub struct CloseAllMenus {
    state: StepState,
}

impl CloseAllMenus {
    pub fn new() -> Self {
        Self {
            state: StepState::new(MENUS_POLICY),
        }
    }
}

impl Default for CloseAllMenus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Step for CloseAllMenus {
    fn name(&self) -> &'static str {
        "CloseAllMenus"
    }

    fn status(&mut self, ctx: &ExecutionContext) -> StepStatus {
        self.state.resolve(!ctx.data().menus.is_menu_open())
    }

    async fn run(&mut self, ctx: &mut ExecutionContext) -> EngineResult<()> {
        if !self.state.can_fire() {
            return Ok(());
        }
        let lease = ctx.pause_if_not_priority().await?;
        lease.press_key(keys::ESCAPE);
        self.state.mark_run();
        Ok(())
    }

    fn attempts(&self) -> u32 {
        self.state.attempts()
    }
}
