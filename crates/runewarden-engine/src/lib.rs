pub mod action;
pub mod arbiter;
pub mod context;
pub mod error;
pub mod io;
pub mod sim;
pub mod snapshot;
pub mod step;

pub use action::{Action, Budget, DynamicChain, Interpreter, Next};
pub use arbiter::{InputArbiter, InputLease, Priority, SessionId};
pub use context::{ContextEvent, ExecutionContext, PickedItem, SessionBackend, SessionControl};
pub use error::{EngineError, EngineResult};
pub use io::{GameStateSource, InputDevice, KeyCode, MouseButton, Pathfinder};
pub use snapshot::WorldState;
pub use step::{Step, StepStatus};
