pub mod commands;
pub mod config;
pub mod event_bus;
mod event_consumer;
pub mod game_manager;
pub mod launcher;
pub mod logging;
mod manager;
pub mod scripts;
mod supervisor;

pub use commands::{Command, CommandError, CommandTable};
pub use event_bus::{EventBus, EventEnvelope, EventSender, SupervisorEvent};
pub use event_consumer::{spawn_consumer, EventConsumer, LoggingConsumer};
pub use game_manager::{GameError, GameManager};
pub use launcher::{ClientLauncher, ClientProcess, CommandLauncher, LaunchError, SimulatedLauncher};
pub use manager::SupervisorManager;
pub use supervisor::{
    DroppedItem, SharedResources, Supervisor, SupervisorError, SupervisorSettings, SupervisorStats,
    SupervisorStatus,
};
