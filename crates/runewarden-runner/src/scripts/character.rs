use runewarden_engine::action::{AttackPattern, ClearCurrentLevel, KillMonsterSequence};
use runewarden_engine::snapshot::{MonsterKind, NpcId, SkillId, WorldState};
use runewarden_engine::Next;

use crate::config::CharacterKind;

const ZEAL_DISTANCE: f64 = 3.0;
const HOLY_FIRE: SkillId = SkillId(102);

/// Combat behavior of a character class
pub trait Character: Send + Sync {
    fn kind(&self) -> CharacterKind;

    fn attack_pattern(&self) -> AttackPattern;

    /// Kill the first living monster of a class and type
    fn kill_monster(&self, npc: NpcId, kind: MonsterKind) -> Next {
        Next::action(KillMonsterSequence::new(
            move |world: &WorldState| world.find_monster(npc, kind).map(|m| m.id),
            self.attack_pattern(),
        ))
    }

    fn clear_level(&self) -> Next {
        Next::action(ClearCurrentLevel::new(self.attack_pattern()))
    }
}

/// Generic melee character
#[derive(Debug, Clone)]
pub struct MeleeCharacter {
    kind: CharacterKind,
    pattern: AttackPattern,
}

impl MeleeCharacter {
    pub fn new(kind: CharacterKind) -> Self {
        let pattern = match kind {
            CharacterKind::Melee => AttackPattern::default(),
            CharacterKind::Zealer => AttackPattern {
                attacks: 1,
                max_distance: ZEAL_DISTANCE,
                aura: Some(HOLY_FIRE),
                skill: None,
            },
        };
        Self { kind, pattern }
    }
}

impl Character for MeleeCharacter {
    fn kind(&self) -> CharacterKind {
        self.kind
    }

    fn attack_pattern(&self) -> AttackPattern {
        self.pattern
    }
}
