//! Character and run scripts: content built on top of the engine's actions.

mod character;
mod runs;

pub use character::{Character, MeleeCharacter};
pub use runs::{ArachnidLair, Countess, Eldritch, LowerKurast};

use runewarden_engine::action::{
    DrinkIllegalRejuvs, HealthGuard, PickupItems, PotionThresholds, ReturnToTown,
};
use runewarden_engine::Next;

use crate::config::{CharacterConfig, RunName};

/// A farming route, built fresh for every game
pub trait Run: Send + Sync {
    fn name(&self) -> &'static str;

    fn build_actions(&self, character: &dyn Character) -> Vec<Next>;
}

pub fn build_character(config: &CharacterConfig) -> Box<dyn Character> {
    Box::new(MeleeCharacter::new(config.kind))
}

pub fn build_runs(config: &CharacterConfig) -> Vec<Box<dyn Run>> {
    config
        .runs
        .iter()
        .map(|run| -> Box<dyn Run> {
            match run {
                RunName::Countess => Box::new(Countess),
                RunName::Eldritch => Box::new(Eldritch {
                    kill_shenk: config.eldritch.kill_shenk,
                }),
                RunName::LowerKurast => Box::new(LowerKurast),
                RunName::ArachnidLair => Box::new(ArachnidLair),
            }
        })
        .collect()
}

fn thresholds(config: &CharacterConfig) -> PotionThresholds {
    PotionThresholds {
        healing: config.health.healing_potion_at,
        mana: config.health.mana_potion_at,
        rejuvenation: config.health.rejuv_potion_at,
        chicken: config.health.chicken_at,
    }
}

/// Full chain of one run: belt cleanup, the route with a health check after
/// every leg, then loot and a portal home
pub fn run_chain(config: &CharacterConfig, character: &dyn Character, run: &dyn Run) -> Vec<Next> {
    let guard = thresholds(config);
    let mut chain = vec![Next::action(DrinkIllegalRejuvs::new(config.rejuv_columns.clone()))];
    for action in run.build_actions(character) {
        chain.push(action);
        chain.push(Next::action(HealthGuard::new(guard)));
    }
    chain.push(Next::action(PickupItems::new(config.pickit.clone())));
    chain.push(Next::action(ReturnToTown::new(config.town_portal_key)));
    chain
}
