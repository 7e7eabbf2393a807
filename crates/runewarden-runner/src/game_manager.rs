use std::time::Duration;

use runewarden_engine::io::keys;
use runewarden_engine::{EngineError, ExecutionContext, MouseButton};
use tracing::{debug, info};

use crate::config::{CompanionConfig, Difficulty};

const EXIT_POLLS: u32 = 5;
const EXIT_MENU_ATTEMPTS: u32 = 10;
const EXIT_POLL_INTERVAL: Duration = Duration::from_secs(1);

const CHARACTER_SELECT_POLLS: u32 = 30;
const NEW_GAME_POLLS: u32 = 12;
const NEW_GAME_POLL_INTERVAL: Duration = Duration::from_millis(500);

const ONLINE_GAME_POLLS: u32 = 30;
const ONLINE_GAME_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Game name field is cleared with this many backspaces
const NAME_FIELD_LENGTH: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("error exiting game: timeout")]
    ExitTimeout,
    #[error("character still in a game")]
    StillInGame,
    #[error("character selection screen not found")]
    CharacterSelectTimeout,
    #[error("error creating new game: timeout")]
    NewGameTimeout,
    #[error("error creating online game {0}: timeout")]
    CreateGameTimeout(String),
    #[error("error joining game {0}: timeout")]
    JoinGameTimeout(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Leaves, creates and joins games on one client.
///
/// Exiting only uses plain bounded waits so it still works while the session
/// is stopping; creating and joining observe stop requests.
#[derive(Debug, Clone)]
pub struct GameManager {
    difficulty: Difficulty,
    companion: CompanionConfig,
    games_created: u32,
}

impl GameManager {
    pub fn new(difficulty: Difficulty, companion: CompanionConfig) -> Self {
        Self {
            difficulty,
            companion,
            games_created: 0,
        }
    }

    pub fn games_created(&self) -> u32 {
        self.games_created
    }

    pub async fn exit_game(&self, ctx: &mut ExecutionContext) -> Result<(), GameError> {
        if !ctx.game().in_game() {
            return Ok(());
        }

        // Fast path: escape menu, then "save and exit"
        let (width, height) = ctx.refresh_game_data().game_area;
        {
            let lease = ctx.pause_if_not_priority().await?;
            lease.press_key(keys::ESCAPE);
            lease.click(
                MouseButton::Left,
                width / 2,
                (height as f64 / 2.2) as i32,
            );
        }
        if wait_until_out_of_game(ctx).await {
            return Ok(());
        }

        for attempt in 0..EXIT_MENU_ATTEMPTS {
            if !ctx.game().in_game() {
                return Ok(());
            }
            let world = ctx.refresh_game_data();
            if world.menus.quit_menu {
                let (x, y) = (world.game_area.0 / 2, (world.game_area.1 as f64 / 2.2) as i32);
                ctx.pause_if_not_priority().await?.click(MouseButton::Left, x, y);
                if wait_until_out_of_game(ctx).await {
                    return Ok(());
                }
            }
            debug!(target: "game", "[{}] Exit attempt {} did not leave the game", ctx.name(), attempt + 1);
            ctx.pause_if_not_priority().await?.press_key(keys::ESCAPE);
            tokio::time::sleep(EXIT_POLL_INTERVAL).await;
        }

        Err(GameError::ExitTimeout)
    }

    /// Start an offline game from the character selection screen
    pub async fn new_game(&mut self, ctx: &mut ExecutionContext) -> Result<(), GameError> {
        if ctx.game().in_game() {
            return Err(GameError::StillInGame);
        }

        let mut at_selection = false;
        for _ in 0..CHARACTER_SELECT_POLLS {
            if ctx.game().is_in_character_selection_screen() {
                at_selection = true;
                break;
            }
            ctx.sleep(NEW_GAME_POLL_INTERVAL).await?;
        }
        if !at_selection {
            return Err(GameError::CharacterSelectTimeout);
        }

        let (x, y) = difficulty_position(self.difficulty);
        {
            let lease = ctx.pause_if_not_priority().await?;
            lease.click(MouseButton::Left, 600, 650);
            ctx.sleep(Duration::from_millis(250)).await?;
            lease.click(MouseButton::Left, x, y);
        }

        for _ in 0..NEW_GAME_POLLS {
            if ctx.game().in_game() {
                self.games_created += 1;
                info!(target: "game", "[{}] New {} game started", ctx.name(), self.difficulty);
                return Ok(());
            }
            ctx.sleep(NEW_GAME_POLL_INTERVAL).await?;
        }
        Err(GameError::NewGameTimeout)
    }

    /// Create a named online game, returning its name
    pub async fn create_online_game(&mut self, ctx: &mut ExecutionContext) -> Result<String, GameError> {
        let name = format!("{}{}", self.companion.game_name_template, self.games_created + 1);
        {
            let lease = ctx.pause_if_not_priority().await?;
            lease.click(MouseButton::Left, 845, 54);
            ctx.sleep(Duration::from_millis(200)).await?;
            lease.click(MouseButton::Left, online_difficulty_x(self.difficulty), 252);
            ctx.sleep(Duration::from_millis(200)).await?;

            lease.click(MouseButton::Left, 1000, 116);
            for _ in 0..NAME_FIELD_LENGTH {
                lease.press_key(keys::BACKSPACE);
            }
            lease.type_text(&name);
            if !self.companion.game_password.is_empty() {
                lease.click(MouseButton::Left, 1000, 161);
                lease.type_text(&self.companion.game_password);
            }
            lease.press_key(keys::RETURN);
        }

        if wait_in_game(ctx).await? {
            self.games_created += 1;
            info!(target: "game", "[{}] Created online game {}", ctx.name(), name);
            return Ok(name);
        }
        Err(GameError::CreateGameTimeout(name))
    }

    pub async fn join_online_game(
        &self,
        ctx: &mut ExecutionContext,
        game: &str,
        password: &str,
    ) -> Result<(), GameError> {
        {
            let lease = ctx.pause_if_not_priority().await?;
            lease.click(MouseButton::Left, 977, 54);
            ctx.sleep(Duration::from_millis(200)).await?;
            lease.click(MouseButton::Left, 950, 100);
            lease.type_text(game);
            if !password.is_empty() {
                lease.click(MouseButton::Left, 1130, 100);
                lease.type_text(password);
            }
            lease.press_key(keys::RETURN);
        }

        if wait_in_game(ctx).await? {
            info!(target: "game", "[{}] Joined game {}", ctx.name(), game);
            return Ok(());
        }
        Err(GameError::JoinGameTimeout(game.to_string()))
    }
}

async fn wait_until_out_of_game(ctx: &ExecutionContext) -> bool {
    for _ in 0..EXIT_POLLS {
        if !ctx.game().in_game() {
            return true;
        }
        tokio::time::sleep(EXIT_POLL_INTERVAL).await;
    }
    false
}

async fn wait_in_game(ctx: &mut ExecutionContext) -> Result<bool, GameError> {
    for _ in 0..ONLINE_GAME_POLLS {
        if ctx.game().in_game() {
            return Ok(true);
        }
        ctx.sleep(ONLINE_GAME_POLL_INTERVAL).await?;
    }
    Ok(false)
}

fn difficulty_position(difficulty: Difficulty) -> (i32, i32) {
    match difficulty {
        Difficulty::Normal => (640, 311),
        Difficulty::Nightmare => (640, 355),
        Difficulty::Hell => (640, 403),
    }
}

fn online_difficulty_x(difficulty: Difficulty) -> i32 {
    match difficulty {
        Difficulty::Normal => 900,
        Difficulty::Nightmare => 980,
        Difficulty::Hell => 1065,
    }
}
