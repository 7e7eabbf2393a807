use std::time::Duration;

use async_trait::async_trait;

use super::{Step, StepPolicy, StepState, StepStatus};
use crate::context::ExecutionContext;
use crate::error::EngineResult;
use crate::io::MouseButton;
use crate::snapshot::{SkillId, UnitId};

/// Attacks a monster a number of times from within a distance band
pub struct Attack {
    state: StepState,
    target: UnitId,
    attacks: u32,
    attacks_done: u32,
    max_distance: f64,
    aura: Option<SkillId>,
}

impl Attack {
    pub fn new(target: UnitId, attacks: u32) -> Self {
        Self {
            state: StepState::new(StepPolicy::new(
                Duration::from_millis(200),
                Duration::from_millis(200),
                attacks.saturating_mul(4).max(1),
            )),
            target,
            attacks,
            attacks_done: 0,
            max_distance: 3.0,
            aura: None,
        }
    }

    pub fn within(mut self, max_distance: f64) -> Self {
        self.max_distance = max_distance;
        self
    }

    /// Keep an aura selected on the right button while attacking
    pub fn with_aura(mut self, aura: SkillId) -> Self {
        self.aura = Some(aura);
        self
    }
}

#[async_trait]
impl Step for Attack {
    fn name(&self) -> &'static str {
        "Attack"
    }

    fn status(&mut self, ctx: &ExecutionContext) -> StepStatus {
        let target_gone = ctx
            .data()
            .monster(self.target)
            .map_or(true, |m| !m.is_alive());
        let done = self.attacks_done >= self.attacks && self.state.is_settled();
        self.state.resolve(target_gone || done)
    }

    async fn run(&mut self, ctx: &mut ExecutionContext) -> EngineResult<()> {
        if !self.state.can_fire() {
            return Ok(());
        }
        let world = ctx.data();
        let Some(monster) = world.monster(self.target) else {
            return Ok(());
        };
        let position = monster.position;
        let distance = ctx.pathfinder().distance_from_me(world, position);
        let screen = ctx.pathfinder().screen_point(world, position);
        let aura_key = self
            .aura
            .filter(|aura| world.player.right_skill != *aura)
            .and_then(|aura| world.key_binding_for_skill(aura));
        let in_range = distance <= self.max_distance;

        let lease = ctx.pause_if_not_priority().await?;
        if let Some(key) = aura_key {
            lease.press_key(key);
        }
        // Out of range: the click walks towards the monster instead
        lease.click(MouseButton::Left, screen.x, screen.y);
        if in_range {
            self.attacks_done += 1;
        }
        self.state.mark_run();
        Ok(())
    }

    fn attempts(&self) -> u32 {
        self.state.attempts()
    }
}
