use std::collections::HashSet;

use tracing::warn;

use super::{Action, Next};
use crate::error::EngineResult;
use crate::snapshot::{SkillId, UnitId, WorldState};
use crate::step::{Attack, SetSkill};

/// Attack loops spent on one target before giving up on it
const MAX_ATTACK_LOOPS: u32 = 10;

/// How a character hits a single target once
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttackPattern {
    pub attacks: u32,
    pub max_distance: f64,
    pub aura: Option<SkillId>,
    /// Skill selected on the right button before each loop
    pub skill: Option<SkillId>,
}

impl Default for AttackPattern {
    fn default() -> Self {
        Self {
            attacks: 5,
            max_distance: 3.0,
            aura: None,
            skill: None,
        }
    }
}

type Selector = Box<dyn Fn(&WorldState) -> Option<UnitId> + Send>;

/// Repeatedly attacks whatever monster the selector points at.
///
/// The loop counter resets when the selector switches targets. Ends once the
/// selector finds nothing or the current target survived the loop cap.
pub struct KillMonsterSequence {
    selector: Selector,
    pattern: AttackPattern,
    target: Option<UnitId>,
    loops: u32,
}

impl KillMonsterSequence {
    pub fn new(
        selector: impl Fn(&WorldState) -> Option<UnitId> + Send + 'static,
        pattern: AttackPattern,
    ) -> Self {
        Self {
            selector: Box::new(selector),
            pattern,
            target: None,
            loops: 0,
        }
    }

    /// Kill one specific monster
    pub fn target(id: UnitId, pattern: AttackPattern) -> Self {
        Self::new(
            move |world: &WorldState| world.monster(id).filter(|m| m.is_alive()).map(|m| m.id),
            pattern,
        )
    }
}

impl Action for KillMonsterSequence {
    fn name(&self) -> &str {
        "KillMonsterSequence"
    }

    fn evaluate(mut self: Box<Self>, world: &WorldState) -> EngineResult<Vec<Next>> {
        let Some(id) = (self.selector)(world) else {
            return Ok(Vec::new());
        };
        let alive = world.monster(id).map_or(false, |m| m.is_alive());
        if !alive {
            return Ok(Vec::new());
        }

        if self.target != Some(id) {
            self.target = Some(id);
            self.loops = 0;
        }
        if self.loops >= MAX_ATTACK_LOOPS {
            warn!(target: "engine", "Giving up on monster {:?} after {} attack loops", id, self.loops);
            return Ok(Vec::new());
        }
        self.loops += 1;

        let mut next = Vec::with_capacity(3);
        if let Some(skill) = self.pattern.skill {
            next.push(Next::step(SetSkill::new(skill)));
        }
        let mut attack = Attack::new(id, self.pattern.attacks).within(self.pattern.max_distance);
        if let Some(aura) = self.pattern.aura {
            attack = attack.with_aura(aura);
        }
        next.push(Next::step(attack));
        next.push(Next::Action(self));
        Ok(next)
    }
}

/// Kills every monster of the level, nearest first.
///
/// A monster still alive after its kill sequence ended survived the attack
/// loop cap and is skipped from then on.
pub struct ClearCurrentLevel {
    pattern: AttackPattern,
    radius: Option<f64>,
    engaged: Option<UnitId>,
    given_up: HashSet<UnitId>,
}

impl ClearCurrentLevel {
    pub fn new(pattern: AttackPattern) -> Self {
        Self {
            pattern,
            radius: None,
            engaged: None,
            given_up: HashSet::new(),
        }
    }

    /// Only consider monsters within `radius` of the player
    pub fn within(mut self, radius: f64) -> Self {
        self.radius = Some(radius);
        self
    }

    fn nearest(world: &WorldState, radius: Option<f64>, skip: &HashSet<UnitId>) -> Option<UnitId> {
        let me = world.player.position;
        world
            .monsters
            .iter()
            .filter(|m| m.is_alive() && !skip.contains(&m.id))
            .map(|m| (m.id, me.distance(&m.position)))
            .filter(|(_, d)| radius.map_or(true, |r| *d <= r))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }
}

impl Action for ClearCurrentLevel {
    fn name(&self) -> &str {
        "ClearCurrentLevel"
    }

    fn evaluate(mut self: Box<Self>, world: &WorldState) -> EngineResult<Vec<Next>> {
        if let Some(previous) = self.engaged.take() {
            if world.monster(previous).map_or(false, |m| m.is_alive()) {
                warn!(target: "engine", "Skipping monster {:?}, it survived its kill sequence", previous);
                self.given_up.insert(previous);
            }
        }
        let Some(id) = Self::nearest(world, self.radius, &self.given_up) else {
            return Ok(Vec::new());
        };
        self.engaged = Some(id);
        Ok(vec![
            Next::action(KillMonsterSequence::target(id, self.pattern)),
            Next::Action(self),
        ])
    }
}
