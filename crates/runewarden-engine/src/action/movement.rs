use super::{Action, Next};
use crate::error::{EngineError, EngineResult};
use crate::snapshot::{AreaId, Position, WorldState};
use crate::step::{CloseAllMenus, InteractObject, InteractTarget, MoveTo, OpenPortal, SelectWaypoint};

/// Distance at which an interaction target is considered reachable
const INTERACT_DISTANCE: f64 = 5.0;

type Locator = Box<dyn Fn(&WorldState) -> Option<Position> + Send>;

/// Walks to a position found on every snapshot.
///
/// Yields nothing when the locator finds no target or the player is already
/// close enough.
pub struct MoveToTarget {
    name: &'static str,
    locator: Locator,
    tolerance: f64,
}

impl MoveToTarget {
    pub fn new(
        name: &'static str,
        locator: impl Fn(&WorldState) -> Option<Position> + Send + 'static,
    ) -> Self {
        Self {
            name,
            locator: Box::new(locator),
            tolerance: INTERACT_DISTANCE,
        }
    }

    pub fn position(position: Position) -> Self {
        Self::new("MoveToPosition", move |_: &WorldState| Some(position))
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }
}

impl Action for MoveToTarget {
    fn name(&self) -> &str {
        self.name
    }

    fn evaluate(self: Box<Self>, world: &WorldState) -> EngineResult<Vec<Next>> {
        let Some(target) = (self.locator)(world) else {
            return Ok(Vec::new());
        };
        if world.player.position.distance(&target) <= self.tolerance {
            return Ok(Vec::new());
        }
        Ok(vec![
            Next::step(MoveTo::within(target, self.tolerance)),
            Next::Action(self),
        ])
    }
}

/// Travels to an area through the waypoint next to the player
pub struct WayPoint {
    area: AreaId,
}

impl WayPoint {
    pub fn new(area: AreaId) -> Self {
        Self { area }
    }
}

impl Action for WayPoint {
    fn name(&self) -> &str {
        "WayPoint"
    }

    fn evaluate(self: Box<Self>, world: &WorldState) -> EngineResult<Vec<Next>> {
        let area = self.area;
        if world.player.area == area {
            return Ok(Vec::new());
        }
        if world.menus.waypoint {
            return Ok(vec![Next::step(SelectWaypoint::new(area))]);
        }
        let Some(waypoint) = world.objects.iter().find(|o| o.is_waypoint()) else {
            return Err(EngineError::action(self.name(), "no waypoint nearby"));
        };
        Ok(vec![
            Next::step(MoveTo::within(waypoint.position, INTERACT_DISTANCE)),
            Next::step(InteractObject::new(
                InteractTarget::Object(waypoint.id),
                move |w: &WorldState| w.menus.waypoint || w.player.area == area,
            )),
            Next::Action(self),
        ])
    }
}

/// Walks to the exit towards an adjacent area and takes it
pub struct MoveToArea {
    area: AreaId,
}

impl MoveToArea {
    pub fn new(area: AreaId) -> Self {
        Self { area }
    }
}

impl Action for MoveToArea {
    fn name(&self) -> &str {
        "MoveToArea"
    }

    fn evaluate(self: Box<Self>, world: &WorldState) -> EngineResult<Vec<Next>> {
        let area = self.area;
        if world.player.area == area {
            return Ok(Vec::new());
        }
        let Some(exit) = world.level_exit(area) else {
            return Err(EngineError::action(
                self.name(),
                format!("no exit from {:?} to {:?}", world.player.area, area),
            ));
        };
        Ok(vec![
            Next::step(MoveTo::within(exit.position, INTERACT_DISTANCE)),
            Next::step(InteractObject::new(
                InteractTarget::Position(exit.position),
                move |w: &WorldState| w.player.area == area,
            )),
        ])
    }
}

/// Activates the waypoint of the current area if it is not known yet
pub struct DiscoverWaypoint;

impl Action for DiscoverWaypoint {
    fn name(&self) -> &str {
        "DiscoverWaypoint"
    }

    fn evaluate(self: Box<Self>, world: &WorldState) -> EngineResult<Vec<Next>> {
        let here = world.player.area;
        if world.waypoint_entries.iter().any(|e| e.area == here) {
            return Ok(Vec::new());
        }
        let Some(waypoint) = world.objects.iter().find(|o| o.is_waypoint()) else {
            return Err(EngineError::action(self.name(), "no waypoint in this area"));
        };
        Ok(vec![
            Next::step(MoveTo::within(waypoint.position, INTERACT_DISTANCE)),
            Next::step(InteractObject::new(
                InteractTarget::Object(waypoint.id),
                |w: &WorldState| w.menus.waypoint,
            )),
            Next::step(CloseAllMenus::new()),
        ])
    }
}

/// Opens a town portal and steps through it
pub struct ReturnToTown {
    portal_key: char,
}

impl ReturnToTown {
    pub fn new(portal_key: char) -> Self {
        Self { portal_key }
    }
}

impl Action for ReturnToTown {
    fn name(&self) -> &str {
        "ReturnToTown"
    }

    fn evaluate(self: Box<Self>, world: &WorldState) -> EngineResult<Vec<Next>> {
        if world.player.area.is_town() {
            return Ok(Vec::new());
        }
        if let Some(portal) = world.objects.iter().find(|o| o.is_portal()) {
            return Ok(vec![Next::step(InteractObject::new(
                InteractTarget::Object(portal.id),
                |w: &WorldState| w.player.area.is_town(),
            ))]);
        }
        Ok(vec![Next::step(OpenPortal::new(self.portal_key)), Next::Action(self)])
    }
}
