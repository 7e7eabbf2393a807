//! Narrow interfaces to the external collaborators of a session.
//!
//! Implementations live outside the engine (memory readers, HID injectors,
//! map-based pathfinding). The engine only ever talks to them through these
//! traits, which keeps every session independently testable.

use crate::snapshot::{Position, ScreenPoint, WorldState};

/// Virtual key code understood by an [`InputDevice`]
pub type KeyCode = u16;

/// Commonly used virtual key codes
pub mod keys {
    use super::KeyCode;

    pub const BACKSPACE: KeyCode = 0x08;
    pub const RETURN: KeyCode = 0x0D;
    pub const ESCAPE: KeyCode = 0x1B;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
}

/// Source of point-in-time world snapshots.
///
/// Must be cheap enough to poll at any rate and must never block
/// indefinitely; it returns the best-effort last known state.
pub trait GameStateSource: Send + Sync {
    fn snapshot(&self) -> WorldState;

    fn in_game(&self) -> bool;

    fn is_in_character_selection_screen(&self) -> bool;

    /// Whether the client process is still alive
    fn process_alive(&self) -> bool {
        true
    }
}

/// Executes discrete input primitives against one client window.
///
/// There is no internal queueing: the caller paces the input.
pub trait InputDevice: Send + Sync {
    fn press_key(&self, key: KeyCode);

    fn click(&self, button: MouseButton, x: i32, y: i32);

    fn move_pointer(&self, x: i32, y: i32);

    fn ascii_code(&self, ch: char) -> KeyCode;

    /// Bring the target window to the foreground before injecting input
    fn activate_window(&self) {}
}

/// Movement path and distance computation, read-only on the world
pub trait Pathfinder: Send + Sync {
    fn distance_from_me(&self, world: &WorldState, to: Position) -> f64;

    /// Walkable path from the player to `to`, `None` when unreachable
    fn path(&self, world: &WorldState, to: Position) -> Option<Vec<Position>>;

    /// Window coordinates of a world position relative to the player
    fn screen_point(&self, world: &WorldState, position: Position) -> ScreenPoint;
}
