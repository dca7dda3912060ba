//! Motion controllers
//!
//! Three kinds share one pattern: a controller is stepped once per scheduler
//! tick and reports whether it wants to keep running.
//! - `LoopingScroller`: moves every entity of a role forever, wrapping at a bound
//! - `BoundedStep`: nudges one car a fixed number of steps
//! - `Sweep`: moves a set of entities until each leaves the field, removing them
//!
//! Each kind only accepts entities of the roles it owns, so two kinds never
//! move the same entity.

use std::collections::{BTreeMap, BTreeSet};

use glam::Vec2;
use rand::Rng;
use rand::seq::IndexedRandom;

use super::scene::{EntityId, Role, Scene};
use super::scheduler::{Scheduler, TaskHandle};
use crate::consts::*;
use crate::error::GameError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControllerId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionKind {
    Loop,
    BoundedStep,
    Sweep,
}

impl MotionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MotionKind::Loop => "loop",
            MotionKind::BoundedStep => "bounded-step",
            MotionKind::Sweep => "sweep",
        }
    }

    /// Roles this kind is allowed to move
    pub fn owns(&self, role: Role) -> bool {
        match self {
            MotionKind::Loop => matches!(role, Role::MovingLine | Role::Npc),
            MotionKind::BoundedStep => role == Role::Car,
            MotionKind::Sweep => role == Role::FinishSegment,
        }
    }
}

/// Result of one controller step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Finished,
}

/// Infinite scroller over every entity holding `role`
#[derive(Debug, Clone)]
pub struct LoopingScroller {
    pub role: Role,
    pub step: Vec2,
    /// Passing this y triggers a wrap
    pub bound_y: f32,
    pub reset_y: f32,
    /// When non-empty, a wrapped entity re-enters in one of these x lanes
    pub reset_lanes: Vec<f32>,
}

impl LoopingScroller {
    /// Dashed lane markers scrolling down the road
    pub fn road_lines(step: f32) -> Self {
        Self {
            role: Role::MovingLine,
            step: Vec2::new(0.0, step),
            bound_y: FIELD_HEIGHT,
            reset_y: LINE_RESET_Y,
            reset_lanes: Vec::new(),
        }
    }

    /// Ambient traffic driving up the road
    pub fn traffic(step: f32) -> Self {
        Self {
            role: Role::Npc,
            step: Vec2::new(0.0, -step),
            bound_y: NPC_BOUND_Y,
            reset_y: NPC_RESET_Y,
            reset_lanes: NPC_LANES.to_vec(),
        }
    }

    fn passed(&self, y: f32) -> bool {
        if self.step.y >= 0.0 {
            y >= self.bound_y
        } else {
            y <= self.bound_y
        }
    }

    pub fn step<R: Rng + ?Sized>(&self, scene: &mut Scene, rng: &mut R) -> StepOutcome {
        for id in scene.with_role(self.role) {
            let Some(pos) = scene.translate(id, self.step) else {
                continue;
            };
            if self.passed(pos.y) {
                let x = self.reset_lanes.choose(rng).copied().unwrap_or(pos.x);
                scene.set_position(id, Vec2::new(x, self.reset_y));
            }
        }
        StepOutcome::Continue
    }
}

/// Which way a car is nudged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Up the screen
    TowardFinish,
    /// Down the screen, never past the start boundary
    TowardStart,
}

/// Finite nudge of one car
#[derive(Debug, Clone)]
pub struct BoundedStep {
    pub entity: EntityId,
    pub steps_remaining: u32,
    pub step: f32,
    pub direction: Direction,
    pub start_boundary_y: f32,
}

impl BoundedStep {
    pub fn new(entity: EntityId, steps: u32, step: f32, direction: Direction) -> Self {
        Self {
            entity,
            steps_remaining: steps,
            step,
            direction,
            start_boundary_y: CAR_START_Y,
        }
    }

    pub fn step(&mut self, scene: &mut Scene) -> StepOutcome {
        if self.steps_remaining == 0 {
            return StepOutcome::Finished;
        }
        let Some(pos) = scene.position(self.entity) else {
            self.steps_remaining = 0;
            return StepOutcome::Finished;
        };

        let dy = match self.direction {
            Direction::TowardFinish => -self.step,
            Direction::TowardStart => {
                if pos.y >= self.start_boundary_y {
                    self.steps_remaining = 0;
                    return StepOutcome::Finished;
                }
                self.step
            }
        };
        scene.translate(self.entity, Vec2::new(0.0, dy));

        self.steps_remaining -= 1;
        if self.steps_remaining == 0 {
            StepOutcome::Finished
        } else {
            StepOutcome::Continue
        }
    }
}

/// Finite sweep of a set of entities off the bottom of the field
#[derive(Debug, Clone)]
pub struct Sweep {
    pub entities: BTreeSet<EntityId>,
    pub step: Vec2,
    pub bound_y: f32,
}

impl Sweep {
    pub fn finish_line(entities: impl IntoIterator<Item = EntityId>, step: f32) -> Self {
        Self {
            entities: entities.into_iter().collect(),
            step: Vec2::new(0.0, step),
            bound_y: FIELD_HEIGHT,
        }
    }

    pub fn step(&mut self, scene: &mut Scene) -> StepOutcome {
        let mut gone = Vec::new();
        for &id in &self.entities {
            match scene.position(id) {
                Some(pos) if pos.y < self.bound_y => {
                    scene.translate(id, self.step);
                }
                Some(_) => {
                    scene.remove(id);
                    gone.push(id);
                }
                None => gone.push(id),
            }
        }
        for id in gone {
            self.entities.remove(&id);
        }

        if self.entities.is_empty() {
            StepOutcome::Finished
        } else {
            StepOutcome::Continue
        }
    }
}

#[derive(Debug, Clone)]
pub enum Controller {
    Loop(LoopingScroller),
    Bounded(BoundedStep),
    Sweep(Sweep),
}

impl Controller {
    pub fn kind(&self) -> MotionKind {
        match self {
            Controller::Loop(_) => MotionKind::Loop,
            Controller::Bounded(_) => MotionKind::BoundedStep,
            Controller::Sweep(_) => MotionKind::Sweep,
        }
    }

    pub fn step<R: Rng + ?Sized>(&mut self, scene: &mut Scene, rng: &mut R) -> StepOutcome {
        match self {
            Controller::Loop(scroller) => scroller.step(scene, rng),
            Controller::Bounded(bounded) => bounded.step(scene),
            Controller::Sweep(sweep) => sweep.step(scene),
        }
    }

    /// Whether this controller may move `entity` right now
    pub fn drives(&self, entity: EntityId, scene: &Scene) -> bool {
        match self {
            Controller::Loop(scroller) => scene.role(entity) == Some(scroller.role),
            Controller::Bounded(bounded) => bounded.entity == entity,
            Controller::Sweep(sweep) => sweep.entities.contains(&entity),
        }
    }
}

#[derive(Debug)]
struct ActiveController {
    controller: Controller,
    handle: TaskHandle,
}

/// Live controllers and the scheduler handles driving them
#[derive(Debug)]
pub struct Motions {
    controllers: BTreeMap<ControllerId, ActiveController>,
    next_id: u32,
}

impl Default for Motions {
    fn default() -> Self {
        Self::new()
    }
}

impl Motions {
    pub fn new() -> Self {
        Self {
            controllers: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Check that `controller` only targets roles its kind owns, and that no
    /// other loop already scrolls the same role.
    fn check_ownership(&self, controller: &Controller, scene: &Scene) -> Result<(), GameError> {
        let kind = controller.kind();
        let violation = |entity, role| GameError::OwnershipViolation {
            entity,
            role,
            kind: kind.as_str(),
        };

        match controller {
            Controller::Loop(scroller) => {
                if !kind.owns(scroller.role) {
                    return Err(violation(None, scroller.role));
                }
                let taken = self.controllers.values().any(|active| {
                    matches!(&active.controller, Controller::Loop(other) if other.role == scroller.role)
                });
                if taken {
                    return Err(violation(None, scroller.role));
                }
            }
            Controller::Bounded(bounded) => {
                let role = scene
                    .role(bounded.entity)
                    .ok_or(GameError::UnknownEntity(bounded.entity))?;
                if !kind.owns(role) {
                    return Err(violation(Some(bounded.entity), role));
                }
            }
            Controller::Sweep(sweep) => {
                for &id in &sweep.entities {
                    let role = scene.role(id).ok_or(GameError::UnknownEntity(id))?;
                    if !kind.owns(role) {
                        return Err(violation(Some(id), role));
                    }
                    let claimed = self.controllers.values().any(|active| {
                        matches!(&active.controller, Controller::Sweep(other) if other.entities.contains(&id))
                    });
                    if claimed {
                        return Err(violation(Some(id), role));
                    }
                }
            }
        }
        Ok(())
    }

    /// Register `controller` and drive it every `interval_ms` on `sched`
    pub fn start<T>(
        &mut self,
        controller: Controller,
        interval_ms: u64,
        scene: &Scene,
        sched: &mut Scheduler<T>,
        make_task: impl FnOnce(ControllerId) -> T,
    ) -> Result<ControllerId, GameError> {
        self.check_ownership(&controller, scene)?;

        let id = ControllerId(self.next_id);
        self.next_id += 1;
        log::debug!("Starting {} controller {:?}", controller.kind().as_str(), id);

        let handle = sched.schedule_repeating(interval_ms, make_task(id));
        self.controllers.insert(
            id,
            ActiveController {
                controller,
                handle,
            },
        );
        Ok(id)
    }

    /// Step a controller. `None` when it is no longer registered.
    pub fn step<R: Rng + ?Sized>(
        &mut self,
        id: ControllerId,
        scene: &mut Scene,
        rng: &mut R,
    ) -> Option<StepOutcome> {
        let active = self.controllers.get_mut(&id)?;
        let outcome = active.controller.step(scene, rng);
        if outcome == StepOutcome::Finished {
            log::debug!("Controller {:?} finished", id);
            self.controllers.remove(&id);
        }
        Some(outcome)
    }

    /// Stop a controller and its scheduler task
    pub fn cancel<T>(&mut self, id: ControllerId, sched: &mut Scheduler<T>) -> Option<Controller> {
        let active = self.controllers.remove(&id)?;
        sched.cancel(active.handle);
        log::debug!("Cancelled controller {:?}", id);
        Some(active.controller)
    }

    /// Stop every controller
    pub fn cancel_all<T>(&mut self, sched: &mut Scheduler<T>) {
        for (_, active) in std::mem::take(&mut self.controllers) {
            sched.cancel(active.handle);
        }
    }

    pub fn get(&self, id: ControllerId) -> Option<&Controller> {
        self.controllers.get(&id).map(|active| &active.controller)
    }

    pub fn is_live(&self, id: ControllerId) -> bool {
        self.controllers.contains_key(&id)
    }

    /// Live controllers currently moving `entity`
    pub fn driving(&self, entity: EntityId, scene: &Scene) -> Vec<ControllerId> {
        self.controllers
            .iter()
            .filter(|(_, active)| active.controller.drives(entity, scene))
            .map(|(&id, _)| id)
            .collect()
    }

    /// Live controllers of `kind`
    pub fn of_kind(&self, kind: MotionKind) -> Vec<ControllerId> {
        self.controllers
            .iter()
            .filter(|(_, active)| active.controller.kind() == kind)
            .map(|(&id, _)| id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::scheduler::TaskControl;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn rng() -> Pcg32 {
        Pcg32::seed_from_u64(12345)
    }

    fn nudge(car: EntityId, direction: Direction) -> Controller {
        Controller::Bounded(BoundedStep::new(car, 10, 5.0, direction))
    }

    fn start(
        motions: &mut Motions,
        controller: Controller,
        scene: &Scene,
        sched: &mut Scheduler<ControllerId>,
    ) -> Result<ControllerId, GameError> {
        motions.start(controller, 40, scene, sched, |id| id)
    }

    #[test]
    fn test_road_line_wraps_to_top() {
        let mut scene = Scene::new();
        let line = scene.spawn(Role::MovingLine, Vec2::new(150.0, 780.0));
        let scroller = LoopingScroller::road_lines(10.0);
        let mut rng = rng();

        scroller.step(&mut scene, &mut rng);
        assert_eq!(scene.position(line), Some(Vec2::new(150.0, 790.0)));
        scroller.step(&mut scene, &mut rng);
        assert_eq!(scene.position(line), Some(Vec2::new(150.0, LINE_RESET_Y)));
    }

    #[test]
    fn test_traffic_reenters_in_a_lane() {
        let mut scene = Scene::new();
        let npc = scene.spawn(Role::Npc, Vec2::new(175.0, NPC_BOUND_Y + 10.0));
        let scroller = LoopingScroller::traffic(10.0);
        scroller.step(&mut scene, &mut rng());

        let pos = scene.position(npc).unwrap();
        assert_eq!(pos.y, NPC_RESET_Y);
        assert!(NPC_LANES.contains(&pos.x));
    }

    #[test]
    fn test_bounded_forward_runs_exact_steps() {
        let mut scene = Scene::new();
        let car = scene.spawn(Role::Car, Vec2::new(175.0, 700.0));
        let mut nudge = BoundedStep::new(car, 10, 5.0, Direction::TowardFinish);

        let mut ticks = 0;
        while nudge.step(&mut scene) == StepOutcome::Continue {
            ticks += 1;
        }
        assert_eq!(ticks + 1, 10);
        assert_eq!(scene.position(car).unwrap().y, 650.0);
        assert_eq!(nudge.step(&mut scene), StepOutcome::Finished);
    }

    #[test]
    fn test_bounded_backward_stops_at_start_boundary() {
        let mut scene = Scene::new();
        let car = scene.spawn(Role::Car, Vec2::new(175.0, 690.0));
        let mut nudge = BoundedStep::new(car, 10, 5.0, Direction::TowardStart);

        assert_eq!(nudge.step(&mut scene), StepOutcome::Continue);
        assert_eq!(nudge.step(&mut scene), StepOutcome::Continue);
        assert_eq!(scene.position(car).unwrap().y, 700.0);
        assert_eq!(nudge.step(&mut scene), StepOutcome::Finished);
        assert_eq!(scene.position(car).unwrap().y, 700.0);
    }

    #[test]
    fn test_sweep_removes_entities_then_finishes() {
        let mut scene = Scene::new();
        let a = scene.spawn(Role::FinishSegment, Vec2::new(100.0, 780.0));
        let b = scene.spawn(Role::FinishSegment, Vec2::new(110.0, 790.0));
        let mut sweep = Sweep::finish_line([a, b], 10.0);

        assert_eq!(sweep.step(&mut scene), StepOutcome::Continue);
        assert_eq!(scene.position(a).unwrap().y, 790.0);
        assert_eq!(scene.position(b).unwrap().y, 800.0);

        assert_eq!(sweep.step(&mut scene), StepOutcome::Continue);
        assert!(!scene.contains(b));
        assert_eq!(scene.position(a).unwrap().y, 800.0);

        assert_eq!(sweep.step(&mut scene), StepOutcome::Finished);
        assert_eq!(scene.count(Role::FinishSegment), 0);
    }

    #[test]
    fn test_ownership_rejects_foreign_roles() {
        let mut scene = Scene::new();
        let line = scene.spawn(Role::MovingLine, Vec2::ZERO);
        let car = scene.spawn(Role::Car, Vec2::ZERO);
        let mut motions = Motions::new();
        let mut sched: Scheduler<ControllerId> = Scheduler::new();

        let bounded_on_line = nudge(line, Direction::TowardFinish);
        assert!(matches!(
            start(&mut motions, bounded_on_line, &scene, &mut sched),
            Err(GameError::OwnershipViolation { .. })
        ));

        let sweep_car = Controller::Sweep(Sweep::finish_line([car], 10.0));
        assert!(start(&mut motions, sweep_car, &scene, &mut sched).is_err());

        let lines = Controller::Loop(LoopingScroller::road_lines(10.0));
        start(&mut motions, lines.clone(), &scene, &mut sched).unwrap();
        assert!(start(&mut motions, lines, &scene, &mut sched).is_err());
        assert_eq!(motions.len(), 1);
        assert_eq!(sched.pending(), 1);
    }

    #[test]
    fn test_retriggered_bounded_animators_finish_independently() {
        let mut scene = Scene::new();
        let car = scene.spawn(Role::Car, Vec2::new(175.0, 700.0));
        let mut motions = Motions::new();
        let mut sched: Scheduler<ControllerId> = Scheduler::new();
        let mut rng = rng();

        let first =
            start(&mut motions, nudge(car, Direction::TowardFinish), &scene, &mut sched).unwrap();
        sched.advance(120, &mut (), |_, _, _, id| {
            motions.step(id, &mut scene, &mut rng);
            Ok(TaskControl::Continue)
        });
        let second =
            start(&mut motions, nudge(car, Direction::TowardFinish), &scene, &mut sched).unwrap();
        assert_eq!(motions.driving(car, &scene), vec![first, second]);

        let mut finished = Vec::new();
        sched.advance(1_000, &mut finished, |finished, _, _, id| {
            match motions.step(id, &mut scene, &mut rng) {
                Some(StepOutcome::Continue) => Ok(TaskControl::Continue),
                _ => {
                    finished.push(id);
                    Ok(TaskControl::Stop)
                }
            }
        });

        // Both ran their full 10 steps: 20 * 5px overshoot preserved
        assert_eq!(finished, vec![first, second]);
        assert_eq!(scene.position(car).unwrap().y, 600.0);
        assert!(motions.is_empty());
        assert_eq!(sched.pending(), 0);
    }

    #[test]
    fn test_cancel_stops_scheduler_task() {
        let mut scene = Scene::new();
        let car = scene.spawn(Role::Car, Vec2::new(175.0, 700.0));
        let mut motions = Motions::new();
        let mut sched: Scheduler<ControllerId> = Scheduler::new();

        let id =
            start(&mut motions, nudge(car, Direction::TowardStart), &scene, &mut sched).unwrap();
        assert!(motions.cancel(id, &mut sched).is_some());
        assert!(!motions.is_live(id));
        assert_eq!(sched.pending(), 0);
        assert!(motions.cancel(id, &mut sched).is_none());
    }

    proptest! {
        #[test]
        fn prop_road_lines_stay_in_field(start in 0u32..80, ticks in 1usize..400) {
            let mut scene = Scene::new();
            let line = scene.spawn(Role::MovingLine, Vec2::new(200.0, start as f32 * 10.0));
            let scroller = LoopingScroller::road_lines(10.0);
            let mut rng = rng();

            let mut last = scene.position(line).unwrap().y;
            for _ in 0..ticks {
                scroller.step(&mut scene, &mut rng);
                let y = scene.position(line).unwrap().y;
                prop_assert!((LINE_RESET_Y..FIELD_HEIGHT).contains(&y));
                if y < last {
                    prop_assert_eq!(y, LINE_RESET_Y);
                }
                last = y;
            }
        }
    }
}
