use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::{Step, StepPolicy, StepState, StepStatus};
use crate::context::{ContextEvent, ExecutionContext, PickedItem};
use crate::error::{EngineError, EngineResult};
use crate::io::MouseButton;
use crate::snapshot::{AreaId, ItemQuality, Position, UnitId, WorldState};

const INTERACT_POLICY: StepPolicy =
    StepPolicy::new(Duration::from_secs(1), Duration::from_millis(500), 5);

const WAYPOINT_POLICY: StepPolicy =
    StepPolicy::new(Duration::from_secs(1), Duration::from_secs(1), 3);

const PICKUP_POLICY: StepPolicy =
    StepPolicy::new(Duration::from_millis(500), Duration::from_millis(500), 5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractTarget {
    Object(UnitId),
    Position(Position),
}

type Goal = Box<dyn Fn(&WorldState) -> bool + Send + Sync>;

/// Clicks an object (or a fixed spot) until `goal` holds on the snapshot
pub struct InteractObject {
    state: StepState,
    target: InteractTarget,
    goal: Goal,
}

impl InteractObject {
    pub fn new(
        target: InteractTarget,
        goal: impl Fn(&WorldState) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            state: StepState::new(INTERACT_POLICY),
            target,
            goal: Box::new(goal),
        }
    }

    fn target_position(&self, world: &WorldState) -> Option<Position> {
        match self.target {
            InteractTarget::Object(id) => world.object(id).map(|o| o.position),
            InteractTarget::Position(position) => Some(position),
        }
    }
}

#[async_trait]
impl Step for InteractObject {
    fn name(&self) -> &'static str {
        "InteractObject"
    }

    fn status(&mut self, ctx: &ExecutionContext) -> StepStatus {
        self.state.resolve((self.goal)(ctx.data()))
    }

    async fn run(&mut self, ctx: &mut ExecutionContext) -> EngineResult<()> {
        if !self.state.can_fire() {
            return Ok(());
        }
        let Some(position) = self.target_position(ctx.data()) else {
            self.state.mark_run();
            return Err(EngineError::transient(self.name(), "target object not found"));
        };
        let screen = ctx.pathfinder().screen_point(ctx.data(), position);

        let lease = ctx.pause_if_not_priority().await?;
        lease.move_pointer(screen.x, screen.y);
        ctx.sleep(Duration::from_millis(100)).await?;
        lease.click(MouseButton::Left, screen.x, screen.y);
        self.state.mark_run();
        Ok(())
    }

    fn attempts(&self) -> u32 {
        self.state.attempts()
    }
}

/// Clicks a waypoint menu entry until the player arrives in its area
pub struct SelectWaypoint {
    state: StepState,
    area: AreaId,
}

impl SelectWaypoint {
    pub fn new(area: AreaId) -> Self {
        Self {
            state: StepState::new(WAYPOINT_POLICY),
            area,
        }
    }
}

#[async_trait]
impl Step for SelectWaypoint {
    fn name(&self) -> &'static str {
        "SelectWaypoint"
    }

    fn status(&mut self, ctx: &ExecutionContext) -> StepStatus {
        self.state.resolve(ctx.data().player.area == self.area)
    }

    async fn run(&mut self, ctx: &mut ExecutionContext) -> EngineResult<()> {
        if !self.state.can_fire() {
            return Ok(());
        }
        let entry = ctx
            .data()
            .waypoint_entries
            .iter()
            .find(|e| e.area == self.area)
            .copied();
        let Some(entry) = entry else {
            self.state.mark_run();
            return Err(EngineError::transient(
                self.name(),
                format!("no waypoint entry for area {:?}", self.area),
            ));
        };

        let lease = ctx.pause_if_not_priority().await?;
        lease.click(MouseButton::Left, entry.screen.x, entry.screen.y);
        self.state.mark_run();
        Ok(())
    }

    fn attempts(&self) -> u32 {
        self.state.attempts()
    }
}

/// Picks an item up from the ground and reports it once it is gone
pub struct PickupItem {
    state: StepState,
    item: UnitId,
    name: String,
    quality: ItemQuality,
}

impl PickupItem {
    pub fn new(item: UnitId, name: impl Into<String>, quality: ItemQuality) -> Self {
        Self {
            state: StepState::new(PICKUP_POLICY),
            item,
            name: name.into(),
            quality,
        }
    }
}

#[async_trait]
impl Step for PickupItem {
    fn name(&self) -> &'static str {
        "PickupItem"
    }

    fn status(&mut self, ctx: &ExecutionContext) -> StepStatus {
        let on_ground = ctx.data().ground_items.iter().any(|i| i.id == self.item);
        self.state.resolve(!on_ground)
    }

    async fn run(&mut self, ctx: &mut ExecutionContext) -> EngineResult<()> {
        if !self.state.can_fire() {
            return Ok(());
        }
        let position = ctx
            .data()
            .ground_items
            .iter()
            .find(|i| i.id == self.item)
            .map(|i| i.position);
        let Some(position) = position else {
            return Ok(());
        };
        let screen = ctx.pathfinder().screen_point(ctx.data(), position);

        let lease = ctx.pause_if_not_priority().await?;
        lease.click(MouseButton::Left, screen.x, screen.y);
        self.state.mark_run();
        Ok(())
    }

    fn attempts(&self) -> u32 {
        self.state.attempts()
    }

    fn on_completed(&mut self, ctx: &ExecutionContext) {
        // Items never clicked vanished on their own (someone else picked them)
        if self.state.attempts() == 0 {
            return;
        }
        info!(target: "engine", "[{}] Picked up {} ({:?})", ctx.name(), self.name, self.quality);
        ctx.emit(ContextEvent::ItemPicked(PickedItem {
            name: self.name.clone(),
            quality: self.quality,
        }));
    }
}
