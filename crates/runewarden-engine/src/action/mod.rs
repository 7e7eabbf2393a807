//! Actions and chains.
//!
//! An [`Action`] looks at the latest snapshot and decides what to do next:
//! further actions, steps to drive, or nothing when its goal already holds.
//! Actions are re-evaluated every tick by the [`Interpreter`]; a decision is
//! never trusted past the snapshot it was made on.

use std::fmt;

use crate::error::EngineResult;
use crate::snapshot::WorldState;
use crate::step::Step;

mod combat;
mod interpreter;
mod movement;
mod survival;

pub use combat::{AttackPattern, ClearCurrentLevel, KillMonsterSequence};
pub use interpreter::{Budget, Interpreter};
pub use movement::{DiscoverWaypoint, MoveToArea, MoveToTarget, ReturnToTown, WayPoint};
pub use survival::{DrinkIllegalRejuvs, HealthGuard, PickupItems, PotionThresholds};

/// Item of a chain
pub enum Next {
    Action(Box<dyn Action>),
    Step(Box<dyn Step>),
}

impl Next {
    pub fn action(action: impl Action + 'static) -> Self {
        Next::Action(Box::new(action))
    }

    pub fn step(step: impl Step + 'static) -> Self {
        Next::Step(Box::new(step))
    }

    /// A chain generated from the snapshot until it runs dry
    pub fn chain(
        name: &'static str,
        generator: impl FnMut(&WorldState) -> Vec<Next> + Send + 'static,
    ) -> Self {
        Next::action(DynamicChain::new(name, generator))
    }

    pub fn name(&self) -> &str {
        match self {
            Next::Action(action) => action.name(),
            Next::Step(step) => step.name(),
        }
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Next::Action(action) => write!(f, "Action({})", action.name()),
            Next::Step(step) => write!(f, "Step({})", step.name()),
        }
    }
}

/// Decision node evaluated against a snapshot.
///
/// Evaluation consumes the action; an action that wants another look on the
/// next tick returns itself among its children. Returning an empty list means
/// the goal is reached (or there is nothing to do) and must not issue input.
pub trait Action: Send {
    fn name(&self) -> &str;

    fn evaluate(self: Box<Self>, world: &WorldState) -> EngineResult<Vec<Next>>;
}

/// Number of consecutive empty evaluations on an unchanged snapshot after
/// which a dynamic chain is exhausted
const EXHAUSTED_AFTER: u32 = 2;

/// Chain produced by a generator re-evaluated every tick
pub struct DynamicChain<F> {
    name: &'static str,
    generator: F,
    empty_signature: Option<u64>,
    empty_evaluations: u32,
}

impl<F> DynamicChain<F>
where
    F: FnMut(&WorldState) -> Vec<Next> + Send,
{
    pub fn new(name: &'static str, generator: F) -> Self {
        Self {
            name,
            generator,
            empty_signature: None,
            empty_evaluations: 0,
        }
    }
}

impl<F> Action for DynamicChain<F>
where
    F: FnMut(&WorldState) -> Vec<Next> + Send + 'static,
{
    fn name(&self) -> &str {
        self.name
    }

    fn evaluate(mut self: Box<Self>, world: &WorldState) -> EngineResult<Vec<Next>> {
        let mut next = (self.generator)(world);
        if !next.is_empty() {
            self.empty_signature = None;
            self.empty_evaluations = 0;
            next.push(Next::Action(self));
            return Ok(next);
        }

        let signature = world.signature();
        if self.empty_signature == Some(signature) {
            self.empty_evaluations += 1;
        } else {
            self.empty_signature = Some(signature);
            self.empty_evaluations = 1;
        }
        if self.empty_evaluations >= EXHAUSTED_AFTER {
            return Ok(Vec::new());
        }
        Ok(vec![Next::Action(self)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dynamic_chain_exhausts_on_unchanged_snapshot() {
        let world = WorldState::default();
        let chain: Box<dyn Action> = Box::new(DynamicChain::new("empty", |_: &WorldState| Vec::new()));

        let mut next = chain.evaluate(&world).unwrap();
        assert_eq!(next.len(), 1);
        let Some(Next::Action(again)) = next.pop() else {
            panic!("chain should re-emit itself after the first empty evaluation");
        };
        assert!(again.evaluate(&world).unwrap().is_empty());
    }

    #[test]
    fn test_dynamic_chain_restarts_count_on_changed_snapshot() {
        let mut world = WorldState::default();
        let chain: Box<dyn Action> = Box::new(DynamicChain::new("empty", |_: &WorldState| Vec::new()));

        let Some(Next::Action(again)) = chain.evaluate(&world).unwrap().pop() else {
            panic!("expected the chain back");
        };
        world.player.life = 10;
        let next = again.evaluate(&world).unwrap();
        assert_eq!(next.len(), 1);
    }

    #[test]
    fn test_dynamic_chain_appends_itself_after_generated_items() {
        let world = WorldState::default();
        let mut remaining = 1;
        let chain: Box<dyn Action> = Box::new(DynamicChain::new("once", move |_: &WorldState| {
            if remaining == 0 {
                return Vec::new();
            }
            remaining -= 1;
            vec![Next::chain("inner", |_: &WorldState| Vec::new())]
        }));

        let next = chain.evaluate(&world).unwrap();
        assert_eq!(next.len(), 2);
        assert_eq!(next[0].name(), "inner");
        assert_eq!(next[1].name(), "once");
    }
}
