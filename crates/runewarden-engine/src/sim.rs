//! In-memory simulated client.
//!
//! Implements every external interface of a session on top of a shared,
//! scriptable [`WorldState`], records all input it receives and can react to
//! input the way a real client roughly would. Used by tests and by the CLI's
//! dry-run backend.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::context::SessionBackend;
use crate::io::{keys, GameStateSource, InputDevice, KeyCode, MouseButton, Pathfinder};
use crate::snapshot::{Position, ScreenPoint, WorldState};

/// Pixels per world unit used by the simulated projection
const SCREEN_SCALE: i32 = 8;

/// Input primitive received by the simulated device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Key(KeyCode),
    Click(MouseButton, i32, i32),
    Move(i32, i32),
    Activate,
}

type Reaction = Box<dyn FnMut(&InputEvent, &mut SimState) + Send>;

/// Mutable state behind a [`SimulatedClient`]
pub struct SimState {
    pub world: WorldState,
    pub in_game: bool,
    /// Answers consumed by `in_game()` before falling back to `in_game`
    pub in_game_script: VecDeque<bool>,
    pub in_character_selection: bool,
    pub alive: bool,
    pub inputs: Vec<InputEvent>,
    pub in_game_polls: usize,
    pub snapshot_polls: usize,
}

struct Inner {
    state: SimState,
    reaction: Option<Reaction>,
}

/// Cloneable handle to one simulated client
#[derive(Clone)]
pub struct SimulatedClient {
    inner: Arc<Mutex<Inner>>,
}

impl SimulatedClient {
    pub fn new() -> Self {
        let mut world = WorldState::default();
        world.game_area = (1280, 720);
        world.player.life = 1000;
        world.player.max_life = 1000;
        world.player.mana = 500;
        world.player.max_mana = 500;
        Self::with_world(world)
    }

    pub fn with_world(world: WorldState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: SimState {
                    world,
                    in_game: true,
                    in_game_script: VecDeque::new(),
                    in_character_selection: false,
                    alive: true,
                    inputs: Vec::new(),
                    in_game_polls: 0,
                    snapshot_polls: 0,
                },
                reaction: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Install a callback run on every input primitive
    pub fn set_reaction(&self, reaction: impl FnMut(&InputEvent, &mut SimState) + Send + 'static) {
        self.lock().reaction = Some(Box::new(reaction));
    }

    /// Install reactions approximating a real client: escape closes menus or
    /// opens the quit menu, confirming the quit menu leaves the game, clicks on
    /// the character selection screen enter a game, left clicks walk towards
    /// the clicked point, pick up an item or damage a monster under the cursor.
    pub fn with_default_reactions(self) -> Self {
        self.set_reaction(default_reaction);
        self
    }

    /// Run `f` against the mutable simulated state
    pub fn update<R>(&self, f: impl FnOnce(&mut SimState) -> R) -> R {
        f(&mut self.lock().state)
    }

    pub fn inputs(&self) -> Vec<InputEvent> {
        self.lock().state.inputs.clone()
    }

    pub fn key_presses(&self) -> usize {
        self.count(|e| matches!(e, InputEvent::Key(_)))
    }

    pub fn clicks(&self) -> usize {
        self.count(|e| matches!(e, InputEvent::Click(..)))
    }

    fn count(&self, pred: impl Fn(&InputEvent) -> bool) -> usize {
        self.lock().state.inputs.iter().filter(|e| pred(e)).count()
    }

    pub fn in_game_polls(&self) -> usize {
        self.lock().state.in_game_polls
    }

    /// Bundle this client as the backend of a session
    pub fn backend(&self) -> SessionBackend {
        SessionBackend {
            game: Arc::new(self.clone()),
            input: Arc::new(self.clone()),
            pathfinder: Arc::new(self.clone()),
        }
    }

    fn record(&self, event: InputEvent) {
        let mut inner = self.lock();
        let Inner { state, reaction } = &mut *inner;
        state.inputs.push(event);
        if let Some(reaction) = reaction.as_mut() {
            reaction(&event, state);
        }
    }
}

impl Default for SimulatedClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GameStateSource for SimulatedClient {
    fn snapshot(&self) -> WorldState {
        let mut inner = self.lock();
        inner.state.snapshot_polls += 1;
        inner.state.world.clone()
    }

    fn in_game(&self) -> bool {
        let mut inner = self.lock();
        let state = &mut inner.state;
        state.in_game_polls += 1;
        state.in_game_script.pop_front().unwrap_or(state.in_game)
    }

    fn is_in_character_selection_screen(&self) -> bool {
        self.lock().state.in_character_selection
    }

    fn process_alive(&self) -> bool {
        self.lock().state.alive
    }
}

impl InputDevice for SimulatedClient {
    fn press_key(&self, key: KeyCode) {
        self.record(InputEvent::Key(key));
    }

    fn click(&self, button: MouseButton, x: i32, y: i32) {
        self.record(InputEvent::Click(button, x, y));
    }

    fn move_pointer(&self, x: i32, y: i32) {
        self.record(InputEvent::Move(x, y));
    }

    fn ascii_code(&self, ch: char) -> KeyCode {
        ch.to_ascii_uppercase() as KeyCode
    }

    fn activate_window(&self) {
        self.lock().state.inputs.push(InputEvent::Activate);
    }
}

impl Pathfinder for SimulatedClient {
    fn distance_from_me(&self, world: &WorldState, to: Position) -> f64 {
        world.player.position.distance(&to)
    }

    fn path(&self, world: &WorldState, to: Position) -> Option<Vec<Position>> {
        let from = world.player.position;
        let steps = (from.distance(&to) / 10.0).ceil().max(1.0) as i32;
        Some(
            (1..=steps)
                .map(|i| {
                    Position::new(
                        from.x + (to.x - from.x) * i / steps,
                        from.y + (to.y - from.y) * i / steps,
                    )
                })
                .collect(),
        )
    }

    fn screen_point(&self, world: &WorldState, position: Position) -> ScreenPoint {
        let center = world.screen_center();
        let dx = (position.x - world.player.position.x) * SCREEN_SCALE;
        let dy = (position.y - world.player.position.y) * SCREEN_SCALE;
        ScreenPoint::new(
            (center.x + dx).clamp(0, world.game_area.0),
            (center.y + dy).clamp(0, world.game_area.1),
        )
    }
}

fn world_position_at(world: &WorldState, x: i32, y: i32) -> Position {
    let center = world.screen_center();
    Position::new(
        world.player.position.x + (x - center.x) / SCREEN_SCALE,
        world.player.position.y + (y - center.y) / SCREEN_SCALE,
    )
}

fn default_reaction(event: &InputEvent, state: &mut SimState) {
    match *event {
        InputEvent::Key(keys::ESCAPE) => {
            if state.world.menus.is_menu_open() {
                state.world.menus = Default::default();
            } else if state.in_game {
                state.world.menus.quit_menu = true;
            }
        }
        InputEvent::Click(MouseButton::Left, x, y) => {
            if state.in_character_selection && !state.in_game {
                state.in_game = true;
                state.in_character_selection = false;
                return;
            }
            if state.world.menus.quit_menu {
                state.world.menus.quit_menu = false;
                state.in_game = false;
                state.in_character_selection = true;
                return;
            }
            let target = world_position_at(&state.world, x, y);
            if let Some(monster) = state
                .world
                .monsters
                .iter_mut()
                .find(|m| m.is_alive() && m.position.distance(&target) <= 2.0)
            {
                monster.life = (monster.life - 50).max(0);
                return;
            }
            let items = &mut state.world.ground_items;
            if let Some(idx) = items.iter().position(|i| i.position.distance(&target) <= 1.0) {
                items.remove(idx);
                return;
            }
            state.world.player.position = target;
        }
        _ => {}
    }
}
