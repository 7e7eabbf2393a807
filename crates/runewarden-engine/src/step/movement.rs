use std::time::Duration;

use async_trait::async_trait;

use super::{Step, StepPolicy, StepState, StepStatus};
use crate::context::ExecutionContext;
use crate::error::{EngineError, EngineResult};
use crate::io::MouseButton;
use crate::snapshot::Position;

const MOVE_POLICY: StepPolicy =
    StepPolicy::new(Duration::from_millis(250), Duration::from_millis(250), 60);

/// Path nodes skipped ahead per click
const NODES_PER_CLICK: usize = 3;

/// Walks towards a position until within `tolerance`
pub struct MoveTo {
    state: StepState,
    target: Position,
    tolerance: f64,
}

impl MoveTo {
    pub fn new(target: Position) -> Self {
        Self::within(target, 5.0)
    }

    pub fn within(target: Position, tolerance: f64) -> Self {
        Self {
            state: StepState::new(MOVE_POLICY),
            target,
            tolerance,
        }
    }
}

#[async_trait]
impl Step for MoveTo {
    fn name(&self) -> &'static str {
        "MoveTo"
    }

    fn status(&mut self, ctx: &ExecutionContext) -> StepStatus {
        let distance = ctx.pathfinder().distance_from_me(ctx.data(), self.target);
        self.state.resolve(distance <= self.tolerance)
    }

    async fn run(&mut self, ctx: &mut ExecutionContext) -> EngineResult<()> {
        if !self.state.can_fire() {
            return Ok(());
        }
        // An empty path is as unreachable as no path
        let next = ctx
            .pathfinder()
            .path(ctx.data(), self.target)
            .and_then(|path| path.get(NODES_PER_CLICK.min(path.len().saturating_sub(1))).copied());
        let Some(next) = next else {
            self.state.mark_run();
            return Err(EngineError::transient(self.name(), "no path to target"));
        };
        let screen = ctx.pathfinder().screen_point(ctx.data(), next);

        let lease = ctx.pause_if_not_priority().await?;
        lease.click(MouseButton::Left, screen.x, screen.y);
        self.state.mark_run();
        Ok(())
    }

    fn attempts(&self) -> u32 {
        self.state.attempts()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::action::{Interpreter, Next};
    use crate::arbiter::{InputArbiter, SessionId};
    use crate::context::{SessionBackend, SessionControl};
    use crate::io::Pathfinder;
    use crate::sim::SimulatedClient;
    use crate::snapshot::{ScreenPoint, WorldState};

    /// Pathfinder that finds a path with no nodes
    struct EmptyPaths;

    impl Pathfinder for EmptyPaths {
        fn distance_from_me(&self, world: &WorldState, to: Position) -> f64 {
            world.player.position.distance(&to)
        }

        fn path(&self, _world: &WorldState, _to: Position) -> Option<Vec<Position>> {
            Some(Vec::new())
        }

        fn screen_point(&self, _world: &WorldState, _position: Position) -> ScreenPoint {
            ScreenPoint::new(0, 0)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_path_fails_within_attempt_bound() {
        let client = SimulatedClient::new();
        let backend = SessionBackend {
            pathfinder: Arc::new(EmptyPaths),
            ..client.backend()
        };
        let control = SessionControl::default();
        let arbiter = Arc::new(InputArbiter::new(Duration::from_secs(30)));
        let mut ctx = ExecutionContext::new(SessionId(1), "move", backend, arbiter, &control);

        let result = Interpreter::default()
            .run(&mut ctx, vec![Next::step(MoveTo::new(Position::new(100, 100)))])
            .await;
        match result {
            Err(EngineError::TerminalStepFailure { step, attempts }) => {
                assert_eq!(step, "MoveTo");
                assert_eq!(attempts, MOVE_POLICY.max_attempts);
            }
            other => panic!("expected terminal failure, got {:?}", other),
        }
        assert_eq!(client.clicks(), 0);
    }
}
