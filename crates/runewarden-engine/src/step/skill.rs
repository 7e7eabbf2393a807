use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{Step, StepPolicy, StepState, StepStatus};
use crate::context::ExecutionContext;
use crate::error::EngineResult;
use crate::snapshot::SkillId;

const SKILL_POLICY: StepPolicy =
    StepPolicy::new(Duration::from_millis(300), Duration::from_millis(300), 3);

/// Selects a skill on the right mouse button through its key binding.
///
/// Skills without a key binding are left alone.
pub struct SetSkill {
    state: StepState,
    skill: SkillId,
}

impl SetSkill {
    pub fn new(skill: SkillId) -> Self {
        Self {
            state: StepState::new(SKILL_POLICY),
            skill,
        }
    }
}

#[async_trait]
impl Step for SetSkill {
    fn name(&self) -> &'static str {
        "SetSkill"
    }

    fn status(&mut self, ctx: &ExecutionContext) -> StepStatus {
        let world = ctx.data();
        if world.key_binding_for_skill(self.skill).is_none() {
            debug!(target: "engine", "No key binding for skill {:?}", self.skill);
            return self.state.resolve(true);
        }
        self.state.resolve(world.player.right_skill == self.skill)
    }

    async fn run(&mut self, ctx: &mut ExecutionContext) -> EngineResult<()> {
        if !self.state.can_fire() {
            return Ok(());
        }
        let Some(binding) = ctx.data().key_binding_for_skill(self.skill) else {
            return Ok(());
        };
        let lease = ctx.pause_if_not_priority().await?;
        lease.press_key(binding);
        self.state.mark_run();
        Ok(())
    }

    fn attempts(&self) -> u32 {
        self.state.attempts()
    }
}
