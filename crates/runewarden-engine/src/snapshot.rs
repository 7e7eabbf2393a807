use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Identifier of a unit (monster, object, item) inside the game world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub u32);

/// Area (level) identifier as reported by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AreaId(pub u32);

impl AreaId {
    pub const ROGUE_ENCAMPMENT: AreaId = AreaId(1);
    pub const LUT_GHOLEIN: AreaId = AreaId(40);
    pub const KURAST_DOCKS: AreaId = AreaId(75);
    pub const PANDEMONIUM_FORTRESS: AreaId = AreaId(103);
    pub const HARROGATH: AreaId = AreaId(109);

    pub fn is_town(self) -> bool {
        matches!(
            self,
            AreaId::ROGUE_ENCAMPMENT
                | AreaId::LUT_GHOLEIN
                | AreaId::KURAST_DOCKS
                | AreaId::PANDEMONIUM_FORTRESS
                | AreaId::HARROGATH
        )
    }
}

/// Skill identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SkillId(pub u32);

/// Monster class identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NpcId(pub u32);

/// World position in game coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Straight-line distance, used when no path is needed
    pub fn distance(&self, other: &Position) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Point on the client window in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScreenPoint {
    pub x: i32,
    pub y: i32,
}

impl ScreenPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonsterKind {
    Normal,
    Champion,
    Minion,
    Unique,
    SuperUnique,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Monster {
    pub id: UnitId,
    pub npc: NpcId,
    pub kind: MonsterKind,
    pub position: Position,
    pub life: i32,
}

impl Monster {
    pub fn is_alive(&self) -> bool {
        self.life > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Portal,
    Waypoint,
    Chest,
    Shrine,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GameObject {
    pub id: UnitId,
    pub kind: ObjectKind,
    pub name: String,
    pub position: Position,
    pub selectable: bool,
}

impl GameObject {
    pub fn is_portal(&self) -> bool {
        self.kind == ObjectKind::Portal
    }

    pub fn is_waypoint(&self) -> bool {
        self.kind == ObjectKind::Waypoint
    }
}

/// Menus currently open on the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OpenMenus {
    pub inventory: bool,
    pub stash: bool,
    pub waypoint: bool,
    pub npc_interact: bool,
    pub character: bool,
    pub skill_tree: bool,
    pub quit_menu: bool,
}

impl OpenMenus {
    pub fn is_menu_open(&self) -> bool {
        self.inventory
            || self.stash
            || self.waypoint
            || self.npc_interact
            || self.character
            || self.skill_tree
            || self.quit_menu
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct PlayerUnit {
    pub area: AreaId,
    pub position: Position,
    pub life: i32,
    pub max_life: i32,
    pub mana: i32,
    pub max_mana: i32,
    pub level: u32,
    pub right_skill: SkillId,
    pub left_skill: SkillId,
}

impl Default for AreaId {
    fn default() -> Self {
        AreaId::ROGUE_ENCAMPMENT
    }
}

impl Default for SkillId {
    fn default() -> Self {
        SkillId(0)
    }
}

impl PlayerUnit {
    /// Health as a percentage of max life (0 when max life is unknown)
    pub fn health_percent(&self) -> u32 {
        if self.max_life <= 0 {
            return 0;
        }
        ((self.life.max(0) as i64 * 100) / self.max_life as i64) as u32
    }

    pub fn mana_percent(&self) -> u32 {
        if self.max_mana <= 0 {
            return 0;
        }
        ((self.mana.max(0) as i64 * 100) / self.max_mana as i64) as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PotionKind {
    Healing,
    Mana,
    Rejuvenation,
}

/// A potion sitting in a belt column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BeltPotion {
    pub kind: PotionKind,
    pub column: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Belt {
    pub rows: u8,
    pub potions: Vec<BeltPotion>,
}

impl Belt {
    pub fn count(&self, kind: PotionKind) -> usize {
        self.potions.iter().filter(|p| p.kind == kind).count()
    }

    pub fn first_column_with(&self, kind: PotionKind) -> Option<u8> {
        self.potions
            .iter()
            .filter(|p| p.kind == kind)
            .map(|p| p.column)
            .min()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemQuality {
    Normal,
    Magic,
    Rare,
    Set,
    Unique,
}

impl std::fmt::Display for ItemQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Normal => "normal",
            Self::Magic => "magic",
            Self::Rare => "rare",
            Self::Set => "set",
            Self::Unique => "unique",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroundItem {
    pub id: UnitId,
    pub name: String,
    pub quality: ItemQuality,
    pub position: Position,
}

/// Entry of the waypoint menu, visible while the menu is open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaypointEntry {
    pub area: AreaId,
    pub screen: ScreenPoint,
}

/// Exit from the current level towards an adjacent one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LevelExit {
    pub area: AreaId,
    pub position: Position,
}

/// Point-in-time read of the game world.
///
/// A snapshot is captured by a [`GameStateSource`](crate::io::GameStateSource)
/// and never mutated afterwards; the next poll supersedes it.
#[derive(Debug, Clone, Default)]
pub struct WorldState {
    pub player: PlayerUnit,
    pub monsters: Vec<Monster>,
    pub objects: Vec<GameObject>,
    pub ground_items: Vec<GroundItem>,
    pub menus: OpenMenus,
    pub belt: Belt,
    pub key_bindings: HashMap<SkillId, u16>,
    pub waypoint_entries: Vec<WaypointEntry>,
    pub level_exits: Vec<LevelExit>,
    pub game_area: (i32, i32),
}

impl WorldState {
    pub fn monster(&self, id: UnitId) -> Option<&Monster> {
        self.monsters.iter().find(|m| m.id == id)
    }

    pub fn find_monster(&self, npc: NpcId, kind: MonsterKind) -> Option<&Monster> {
        self.monsters
            .iter()
            .find(|m| m.npc == npc && m.kind == kind && m.is_alive())
    }

    pub fn object(&self, id: UnitId) -> Option<&GameObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn has_portal(&self) -> bool {
        self.objects.iter().any(GameObject::is_portal)
    }

    pub fn key_binding_for_skill(&self, skill: SkillId) -> Option<u16> {
        self.key_bindings.get(&skill).copied()
    }

    pub fn level_exit(&self, area: AreaId) -> Option<&LevelExit> {
        self.level_exits.iter().find(|e| e.area == area)
    }

    /// Center of the game area, used for menu confirmations
    pub fn screen_center(&self) -> ScreenPoint {
        ScreenPoint::new(self.game_area.0 / 2, self.game_area.1 / 2)
    }

    /// Hash of everything a decision can depend on.
    ///
    /// Two snapshots with the same signature are considered unchanged.
    pub fn signature(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.player.hash(&mut hasher);
        self.monsters.hash(&mut hasher);
        self.objects.hash(&mut hasher);
        self.ground_items.hash(&mut hasher);
        self.menus.hash(&mut hasher);
        self.belt.hash(&mut hasher);
        self.waypoint_entries.hash(&mut hasher);
        self.level_exits.hash(&mut hasher);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_tracks_monster_life() {
        let mut world = WorldState::default();
        world.monsters.push(Monster {
            id: UnitId(7),
            npc: NpcId(45),
            kind: MonsterKind::Normal,
            position: Position::new(10, 10),
            life: 100,
        });
        let before = world.signature();
        assert_eq!(before, world.clone().signature());

        world.monsters[0].life = 0;
        assert_ne!(before, world.signature());
    }

    #[test]
    fn test_health_percent() {
        let player = PlayerUnit {
            life: 250,
            max_life: 1000,
            ..Default::default()
        };
        assert_eq!(player.health_percent(), 25);
        assert_eq!(PlayerUnit::default().health_percent(), 0);
    }

    #[test]
    fn test_towns() {
        assert!(AreaId::HARROGATH.is_town());
        assert!(!AreaId(21).is_town());
    }
}
