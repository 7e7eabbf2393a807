use runewarden_engine::action::{MoveToArea, MoveToTarget, WayPoint};
use runewarden_engine::snapshot::{AreaId, MonsterKind, NpcId, Position, WorldState};
use runewarden_engine::Next;

use super::{Character, Run};

const BLACK_MARSH: AreaId = AreaId(6);
const FORGOTTEN_TOWER: AreaId = AreaId(20);
const TOWER_CELLAR: [AreaId; 5] = [AreaId(21), AreaId(22), AreaId(23), AreaId(24), AreaId(25)];
const SPIDER_FOREST: AreaId = AreaId(76);
const LOWER_KURAST: AreaId = AreaId(79);
const ARACHNID_LAIR: AreaId = AreaId(85);
const FRIGID_HIGHLANDS: AreaId = AreaId(111);

const COUNTESS: NpcId = NpcId(45);
const ELDRITCH: NpcId = NpcId(571);
const SHENK: NpcId = NpcId(562);

const GOOD_CHEST: &str = "GoodChest";
const SHENK_POSITION: Position = Position { x: 3876, y: 5130 };

pub struct Countess;

impl Run for Countess {
    fn name(&self) -> &'static str {
        "countess"
    }

    fn build_actions(&self, character: &dyn Character) -> Vec<Next> {
        let mut actions = vec![Next::action(WayPoint::new(BLACK_MARSH))];
        actions.push(Next::action(MoveToArea::new(FORGOTTEN_TOWER)));
        actions.extend(TOWER_CELLAR.iter().map(|a| Next::action(MoveToArea::new(*a))));

        // The chest sits next to the Countess and is visible from further away
        actions.push(Next::action(MoveToTarget::new(
            "MoveToCountess",
            |world: &WorldState| {
                world
                    .objects
                    .iter()
                    .find(|o| o.name == GOOD_CHEST)
                    .map(|o| o.position)
                    .or_else(|| {
                        world
                            .find_monster(COUNTESS, MonsterKind::SuperUnique)
                            .map(|m| m.position)
                    })
            },
        )));
        actions.push(character.kill_monster(COUNTESS, MonsterKind::SuperUnique));
        actions
    }
}

pub struct Eldritch {
    pub kill_shenk: bool,
}

impl Run for Eldritch {
    fn name(&self) -> &'static str {
        "eldritch"
    }

    fn build_actions(&self, character: &dyn Character) -> Vec<Next> {
        let mut actions = vec![
            Next::action(WayPoint::new(FRIGID_HIGHLANDS)),
            character.kill_monster(ELDRITCH, MonsterKind::SuperUnique),
        ];
        if self.kill_shenk {
            actions.push(Next::action(MoveToTarget::position(SHENK_POSITION)));
            actions.push(character.kill_monster(SHENK, MonsterKind::SuperUnique));
        }
        actions
    }
}

pub struct LowerKurast;

impl Run for LowerKurast {
    fn name(&self) -> &'static str {
        "lower_kurast"
    }

    fn build_actions(&self, character: &dyn Character) -> Vec<Next> {
        vec![
            Next::action(WayPoint::new(LOWER_KURAST)),
            character.clear_level(),
        ]
    }
}

pub struct ArachnidLair;

impl Run for ArachnidLair {
    fn name(&self) -> &'static str {
        "arachnid_lair"
    }

    fn build_actions(&self, character: &dyn Character) -> Vec<Next> {
        vec![
            Next::action(WayPoint::new(SPIDER_FOREST)),
            Next::action(MoveToArea::new(ARACHNID_LAIR)),
            character.clear_level(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CharacterKind;
    use crate::scripts::MeleeCharacter;

    fn names(actions: &[Next]) -> Vec<String> {
        actions.iter().map(|n| n.name().to_string()).collect()
    }

    #[test]
    fn test_countess_walks_the_tower() {
        let actions = Countess.build_actions(&MeleeCharacter::new(CharacterKind::Melee));
        assert_eq!(actions.len(), 9);
        assert_eq!(actions[0].name(), "WayPoint");
        assert_eq!(actions[7].name(), "MoveToCountess");
        assert_eq!(actions[8].name(), "KillMonsterSequence");
    }

    #[test]
    fn test_eldritch_shenk_is_optional() {
        let melee = MeleeCharacter::new(CharacterKind::Melee);
        let with = Eldritch { kill_shenk: true }.build_actions(&melee);
        let without = Eldritch { kill_shenk: false }.build_actions(&melee);
        assert_eq!(
            names(&with),
            ["WayPoint", "KillMonsterSequence", "MoveToPosition", "KillMonsterSequence"]
        );
        assert_eq!(names(&without), ["WayPoint", "KillMonsterSequence"]);
    }
}
