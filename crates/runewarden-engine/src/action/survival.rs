use tracing::debug;

use super::{Action, Next};
use crate::error::{EngineError, EngineResult};
use crate::io::KeyCode;
use crate::snapshot::{PotionKind, WorldState};
use crate::step::{MoveTo, PickupItem, PressKey};

/// Key of a belt column, `1` for the leftmost one
fn belt_key(column: u8) -> KeyCode {
    KeyCode::from(b'1') + KeyCode::from(column)
}

/// Percentages under which a potion is drunk.
///
/// `chicken` is the health percentage under which the run is abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PotionThresholds {
    pub healing: u32,
    pub mana: u32,
    pub rejuvenation: u32,
    pub chicken: u32,
}

impl Default for PotionThresholds {
    fn default() -> Self {
        Self {
            healing: 60,
            mana: 25,
            rejuvenation: 40,
            chicken: 20,
        }
    }
}

/// Drinks potions according to thresholds
pub struct HealthGuard {
    thresholds: PotionThresholds,
}

impl HealthGuard {
    pub fn new(thresholds: PotionThresholds) -> Self {
        Self { thresholds }
    }
}

impl Action for HealthGuard {
    fn name(&self) -> &str {
        "HealthGuard"
    }

    fn evaluate(self: Box<Self>, world: &WorldState) -> EngineResult<Vec<Next>> {
        let t = self.thresholds;
        let health = world.player.health_percent();
        let mana = world.player.mana_percent();

        if health < t.chicken {
            return Err(EngineError::action(
                self.name(),
                format!("health at {}%, below chicken threshold {}%", health, t.chicken),
            ));
        }

        let mut next = Vec::new();
        let rejuv = world.belt.first_column_with(PotionKind::Rejuvenation);
        let healing = world.belt.first_column_with(PotionKind::Healing);
        match (health < t.rejuvenation, rejuv, health < t.healing, healing) {
            (true, Some(column), _, _) => {
                next.push(Next::step(PressKey::new(belt_key(column), "DrinkRejuvenation")));
            }
            (_, _, true, Some(column)) => {
                next.push(Next::step(PressKey::new(belt_key(column), "DrinkHealing")));
            }
            (_, _, true, None) => {
                debug!(target: "engine", "Health at {}% but no healing potion left", health);
            }
            _ => {}
        }
        if mana < t.mana {
            if let Some(column) = world.belt.first_column_with(PotionKind::Mana) {
                next.push(Next::step(PressKey::new(belt_key(column), "DrinkMana")));
            }
        }
        Ok(next)
    }
}

/// Drinks rejuvenation potions sitting in columns reserved for other potions
pub struct DrinkIllegalRejuvs {
    allowed_columns: Vec<u8>,
}

impl DrinkIllegalRejuvs {
    pub fn new(allowed_columns: Vec<u8>) -> Self {
        Self { allowed_columns }
    }
}

impl Action for DrinkIllegalRejuvs {
    fn name(&self) -> &str {
        "DrinkIllegalRejuvs"
    }

    fn evaluate(self: Box<Self>, world: &WorldState) -> EngineResult<Vec<Next>> {
        let illegal = world
            .belt
            .potions
            .iter()
            .filter(|p| p.kind == PotionKind::Rejuvenation)
            .map(|p| p.column)
            .find(|c| !self.allowed_columns.contains(c));
        let Some(column) = illegal else {
            return Ok(Vec::new());
        };
        Ok(vec![
            Next::step(PressKey::new(belt_key(column), "DrinkRejuvenation")),
            Next::Action(self),
        ])
    }
}

/// Picks up ground items listed in the pickit, nearest first
pub struct PickupItems {
    pickit: Vec<String>,
    radius: f64,
}

impl PickupItems {
    pub fn new(pickit: Vec<String>) -> Self {
        Self {
            pickit: pickit.into_iter().map(|n| n.to_lowercase()).collect(),
            radius: 25.0,
        }
    }

    fn wanted(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.pickit.iter().any(|p| *p == name)
    }
}

impl Action for PickupItems {
    fn name(&self) -> &str {
        "PickupItems"
    }

    fn evaluate(self: Box<Self>, world: &WorldState) -> EngineResult<Vec<Next>> {
        let me = world.player.position;
        let item = world
            .ground_items
            .iter()
            .filter(|i| self.wanted(&i.name))
            .map(|i| (i, me.distance(&i.position)))
            .filter(|(_, d)| *d <= self.radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i.clone());
        let Some(item) = item else {
            return Ok(Vec::new());
        };
        Ok(vec![
            Next::step(MoveTo::within(item.position, 2.0)),
            Next::step(PickupItem::new(item.id, item.name, item.quality)),
            Next::Action(self),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{BeltPotion, GroundItem, ItemQuality, Position, UnitId};

    fn evaluate(action: impl Action + 'static, world: &WorldState) -> EngineResult<Vec<Next>> {
        let action: Box<dyn Action> = Box::new(action);
        action.evaluate(world)
    }

    fn names(next: &[Next]) -> Vec<String> {
        next.iter().map(|n| n.name().to_string()).collect()
    }

    fn world_with_life(life: i32) -> WorldState {
        let mut world = WorldState::default();
        world.player.life = life;
        world.player.max_life = 100;
        world.player.mana = 100;
        world.player.max_mana = 100;
        world.belt.potions = vec![
            BeltPotion { kind: PotionKind::Healing, column: 0 },
            BeltPotion { kind: PotionKind::Mana, column: 2 },
            BeltPotion { kind: PotionKind::Rejuvenation, column: 3 },
        ];
        world
    }

    #[test]
    fn test_healthy_player_drinks_nothing() {
        let next = evaluate(HealthGuard::new(PotionThresholds::default()), &world_with_life(90)).unwrap();
        assert!(next.is_empty());
    }

    #[test]
    fn test_low_health_prefers_rejuvenation() {
        let guard = HealthGuard::new(PotionThresholds::default());
        let next = evaluate(guard, &world_with_life(30)).unwrap();
        assert_eq!(names(&next), ["DrinkRejuvenation"]);

        let guard = HealthGuard::new(PotionThresholds::default());
        let next = evaluate(guard, &world_with_life(50)).unwrap();
        assert_eq!(names(&next), ["DrinkHealing"]);
    }

    #[test]
    fn test_chicken_aborts() {
        let guard = HealthGuard::new(PotionThresholds::default());
        assert!(matches!(
            evaluate(guard, &world_with_life(10)),
            Err(EngineError::Action { .. })
        ));
    }

    #[test]
    fn test_illegal_rejuvs() {
        let world = world_with_life(100);
        assert!(evaluate(DrinkIllegalRejuvs::new(vec![3]), &world).unwrap().is_empty());
        let next = evaluate(DrinkIllegalRejuvs::new(vec![0, 1]), &world).unwrap();
        assert_eq!(names(&next), ["DrinkRejuvenation", "DrinkIllegalRejuvs"]);
    }

    #[test]
    fn test_belt_keys() {
        assert_eq!(belt_key(0), 0x31);
        assert_eq!(belt_key(3), 0x34);
    }

    #[test]
    fn test_pickit_matches_case_insensitively() {
        let mut world = WorldState::default();
        world.ground_items.push(GroundItem {
            id: UnitId(3),
            name: "Shako".into(),
            quality: ItemQuality::Unique,
            position: Position::new(4, 4),
        });
        world.ground_items.push(GroundItem {
            id: UnitId(4),
            name: "Short Sword".into(),
            quality: ItemQuality::Normal,
            position: Position::new(1, 1),
        });

        let next = evaluate(PickupItems::new(vec!["shako".into()]), &world).unwrap();
        assert_eq!(names(&next), ["MoveTo", "PickupItem", "PickupItems"]);
        assert!(evaluate(PickupItems::new(Vec::new()), &world).unwrap().is_empty());
    }
}
