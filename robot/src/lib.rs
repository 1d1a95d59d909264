//! Robot state machine: interpolated movement, picking timer, and the
//! bidirectional path execution described in spec §4.5.
//!
//! The robot takes ownership of its `current_order` while it is in
//! flight (spec §3: "owned by robot until completed") — that is the one
//! exception to "components never hold references to other components'
//! mutable state" (spec §9): the order's ownership has genuinely
//! transferred from the queue to the robot, not been borrowed.

use std::collections::VecDeque;

use common::time::{Dt, SimTime};
use config::{NavigationConfig, RobotConfig};
use eventbus::{Bus, Event};
use grid::{Coordinate, PACKOUT};
use inventory::Inventory;
use orders::Order;
use pathengine::{DirectionState, NavConfig, PathError, PlannedSegment};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobotState {
    Idle,
    MovingToItem,
    CollectingItem,
    Returning,
}

impl RobotState {
    pub fn as_str(self) -> &'static str {
        match self {
            RobotState::Idle => "IDLE",
            RobotState::MovingToItem => "MOVING_TO_ITEM",
            RobotState::CollectingItem => "COLLECTING_ITEM",
            RobotState::Returning => "RETURNING",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RobotError {
    #[error("robot is not idle, cannot accept a new order")]
    NotIdle,
    #[error("order has {0} items, exceeding held-items capacity {1}")]
    HeldItemsExceeded(usize, usize),
    #[error("item/location count mismatch: {0} items, {1} locations")]
    LocationCountMismatch(usize, usize),
    #[error(transparent)]
    Path(#[from] PathError),
}

fn nav_config_from(cfg: &NavigationConfig) -> NavConfig {
    NavConfig {
        aisle_traversal_s: cfg.aisle_traversal_s,
        direction_cooldown_s: cfg.direction_cooldown_s,
    }
}

/// The robot controller. One instance per simulation (spec §1 non-goal:
/// multi-robot coordination is out of scope).
pub struct Robot {
    pub id: String,
    pub position: Coordinate,
    pub state: RobotState,
    pub held_items: Vec<String>,
    pub current_order: Option<Order>,
    pub speed: f64,
    pub pick_timer: f64,

    max_items: usize,
    pick_time_s: f64,
    nav_cfg: NavConfig,
    direction_state: DirectionState,

    /// Coordinates still to visit for the current order: remaining item
    /// locations, in order, with packout implicitly appended once all
    /// items are visited.
    remaining_targets: VecDeque<(Option<String>, Coordinate)>,
    /// The path of the leg currently being walked, and how far along it
    /// (in fractional grid-units) the robot has traveled.
    path: Vec<Coordinate>,
    path_progress: f64,
    cancel_requested: bool,
}

impl Robot {
    pub fn new(id: String, robot_cfg: &RobotConfig, nav_cfg: &NavigationConfig) -> Self {
        Self {
            id,
            position: PACKOUT,
            state: RobotState::Idle,
            held_items: Vec::new(),
            current_order: None,
            speed: robot_cfg.speed,
            pick_timer: 0.0,
            max_items: robot_cfg.max_items as usize,
            pick_time_s: robot_cfg.pick_time_s,
            nav_cfg: nav_config_from(nav_cfg),
            direction_state: DirectionState::default(),
            remaining_targets: VecDeque::new(),
            path: Vec::new(),
            path_progress: 0.0,
            cancel_requested: false,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == RobotState::Idle
    }

    /// Assigns a new order. `item_locations` is the resolved coordinate
    /// for each `order.items` entry, in the same order (held-items
    /// invariant is enforced here per spec §4.5).
    pub fn assign(
        &mut self,
        mut order: Order,
        item_locations: Vec<Coordinate>,
        now: SimTime,
        bus: &Bus,
    ) -> Result<(), RobotError> {
        if !self.is_idle() {
            return Err(RobotError::NotIdle);
        }
        if order.items.len() != item_locations.len() {
            return Err(RobotError::LocationCountMismatch(
                order.items.len(),
                item_locations.len(),
            ));
        }
        if order.items.len() > self.max_items {
            return Err(RobotError::HeldItemsExceeded(order.items.len(), self.max_items));
        }

        order
            .assign(self.id.clone(), now)
            .expect("freshly-dequeued order is always PENDING");

        bus.publish(
            Event::OrderAssigned {
                order_id: order.id.clone(),
                robot_id: self.id.clone(),
            },
            now,
        );

        self.remaining_targets = order
            .items
            .iter()
            .cloned()
            .zip(item_locations)
            .map(|(id, loc)| (Some(id), loc))
            .collect();
        self.current_order = Some(order);
        self.cancel_requested = false;

        self.plan_next_leg(now)?;
        self.transition(RobotState::MovingToItem, now, bus);
        Ok(())
    }

    /// Marks the in-flight order for cancellation. Per spec §4.5(c) the
    /// robot finishes whatever it is doing at the nearest safe boundary
    /// (the rest of an in-flight pick, or the next integer coordinate of
    /// an in-flight move) before redirecting to packout.
    pub fn request_cancel(&mut self) {
        if self.current_order.is_some() {
            self.cancel_requested = true;
        }
    }

    fn plan_next_leg(&mut self, now: SimTime) -> Result<(), RobotError> {
        let target = self
            .remaining_targets
            .front()
            .map(|(_, loc)| *loc)
            .unwrap_or(PACKOUT);
        let segment = pathengine::plan_segment(
            self.position,
            target,
            &self.nav_cfg,
            &mut self.direction_state,
            now,
        )?;
        self.path = segment.path;
        self.path_progress = 0.0;
        Ok(())
    }

    fn transition(&mut self, next: RobotState, now: SimTime, bus: &Bus) {
        if self.state == next {
            return;
        }
        tracing::debug!(robot = %self.id, from = self.state.as_str(), to = next.as_str(), "robot.state_changed");
        bus.publish(
            Event::RobotStateChanged {
                robot_id: self.id.clone(),
                from: self.state.as_str().to_string(),
                to: next.as_str().to_string(),
            },
            now,
        );
        self.state = next;
    }

    /// Advances the kernel by one tick. The only component-local update
    /// each tick performs; safe to call every tick regardless of state.
    pub fn tick(&mut self, dt: Dt, now: SimTime, inventory: &Inventory, bus: &Bus) -> Result<(), RobotError> {
        match self.state {
            RobotState::Idle => {}
            RobotState::MovingToItem | RobotState::Returning => self.tick_moving(dt, now, inventory, bus)?,
            RobotState::CollectingItem => self.tick_collecting(dt, now, inventory, bus)?,
        }
        Ok(())
    }

    fn tick_moving(&mut self, dt: Dt, now: SimTime, inventory: &Inventory, bus: &Bus) -> Result<(), RobotError> {
        let mut grid_units = self.speed * dt;

        let redirecting_for_cancel = self.cancel_requested && self.state == RobotState::MovingToItem;
        if redirecting_for_cancel {
            let next_boundary = self.path_progress.floor() + 1.0;
            grid_units = grid_units.min((next_boundary - self.path_progress).max(0.0));
        }

        let reached_leg_end = self.advance(grid_units, bus, now);

        if redirecting_for_cancel {
            self.redirect_to_packout(now)?;
            return Ok(());
        }

        if reached_leg_end {
            self.on_leg_arrival(now, inventory, bus)?;
        }
        Ok(())
    }

    /// Moves `grid_units` along `self.path`, snapping and emitting
    /// `ROBOT_MOVED` at every integer boundary crossed. Returns whether
    /// the end of the path was reached.
    fn advance(&mut self, grid_units: f64, bus: &Bus, now: SimTime) -> bool {
        if self.path.len() <= 1 {
            return true;
        }
        let max_progress = (self.path.len() - 1) as f64;
        let mut remaining = grid_units;

        while remaining > 1e-12 && self.path_progress < max_progress {
            let current_index = self.path_progress.floor() as usize;
            let next_boundary = (current_index + 1) as f64;
            let step = (next_boundary - self.path_progress).min(remaining);
            self.path_progress += step;
            remaining -= step;

            if self.path_progress >= next_boundary - 1e-9 {
                self.path_progress = next_boundary;
                let from = self.path[current_index];
                let to = self.path[current_index + 1];
                self.position = to;
                if let Some(order) = self.current_order.as_mut() {
                    order.total_distance += 1;
                }
                bus.publish(
                    Event::RobotMoved {
                        robot_id: self.id.clone(),
                        from,
                        to,
                    },
                    now,
                );
            }
        }

        self.path_progress >= max_progress
    }

    /// Current continuous position for rendering: interpolated between
    /// the two path nodes straddling `path_progress`. Logic (arrival,
    /// adjacency) never consults this — only integer crossings matter
    /// there (spec §4.5 "Interpolation").
    pub fn continuous_position(&self) -> (f64, f64) {
        if self.path.len() <= 1 {
            return (self.position.aisle() as f64, self.position.rack() as f64);
        }
        let idx = (self.path_progress.floor() as usize).min(self.path.len() - 2);
        let frac = self.path_progress - idx as f64;
        let a = self.path[idx];
        let b = self.path[idx + 1];
        (
            a.aisle() as f64 + (b.aisle() as f64 - a.aisle() as f64) * frac,
            a.rack() as f64 + (b.rack() as f64 - a.rack() as f64) * frac,
        )
    }

    fn on_leg_arrival(&mut self, now: SimTime, inventory: &Inventory, bus: &Bus) -> Result<(), RobotError> {
        match self.state {
            RobotState::MovingToItem => self.arrive_at_item(now, inventory, bus),
            RobotState::Returning => self.arrive_at_packout(now, bus),
            _ => Ok(()),
        }
    }

    fn arrive_at_item(&mut self, now: SimTime, inventory: &Inventory, bus: &Bus) -> Result<(), RobotError> {
        let Some((item_id, _)) = self.remaining_targets.front().cloned() else {
            // No item queued (shouldn't happen while MOVING_TO_ITEM) — fall
            // back to returning rather than getting stuck.
            return self.begin_return_leg(now);
        };
        let Some(item_id) = item_id else {
            return self.begin_return_leg(now);
        };

        if inventory.get(&item_id).is_none() {
            let order_id = self
                .current_order
                .as_ref()
                .map(|o| o.id.clone())
                .unwrap_or_default();
            tracing::warn!(robot = %self.id, order = %order_id, item = %item_id, "pick_failed: item missing from inventory");
            bus.publish(
                Event::PickFailed {
                    order_id,
                    item_id,
                    reason: "item missing from inventory".to_string(),
                },
                now,
            );
            self.remaining_targets.pop_front();
            return self.advance_to_next_target(now, bus);
        }

        self.pick_timer = self.pick_time_s;
        self.transition(RobotState::CollectingItem, now, bus);
        Ok(())
    }

    fn tick_collecting(&mut self, dt: Dt, now: SimTime, inventory: &Inventory, bus: &Bus) -> Result<(), RobotError> {
        self.pick_timer -= dt;
        if self.pick_timer > 1e-9 {
            return Ok(());
        }
        self.complete_pick(now, inventory, bus)
    }

    fn complete_pick(&mut self, now: SimTime, inventory: &Inventory, bus: &Bus) -> Result<(), RobotError> {
        let Some((Some(item_id), _)) = self.remaining_targets.pop_front() else {
            return self.begin_return_leg(now);
        };

        let _ = inventory.apply_collection(&item_id, bus, now);
        self.held_items.push(item_id.clone());
        if let Some(order) = self.current_order.as_mut() {
            order.mark_collected(&item_id);
        }
        let order_id = self
            .current_order
            .as_ref()
            .map(|o| o.id.clone())
            .unwrap_or_default();
        bus.publish(
            Event::ItemCollected {
                order_id,
                item_id,
                robot_id: self.id.clone(),
            },
            now,
        );

        if self.cancel_requested {
            // Spec S5: finish the in-flight pick, then go straight back
            // without visiting any further items.
            return self.begin_return_leg(now);
        }

        self.advance_to_next_target(now, bus)
    }

    fn advance_to_next_target(&mut self, now: SimTime, bus: &Bus) -> Result<(), RobotError> {
        if self.remaining_targets.is_empty() {
            return self.begin_return_leg(now);
        }
        match self.plan_next_leg(now) {
            Ok(()) => {
                self.transition(RobotState::MovingToItem, now, bus);
                Ok(())
            }
            Err(err) => self.abort_order_failed(now, bus, &err.to_string()).map(|_| ()),
        }
    }

    fn begin_return_leg(&mut self, now: SimTime) -> Result<(), RobotError> {
        self.remaining_targets.clear();
        match pathengine::plan_segment(self.position, PACKOUT, &self.nav_cfg, &mut self.direction_state, now) {
            Ok(segment) => {
                self.path = segment.path;
                self.path_progress = 0.0;
                self.state = RobotState::Returning;
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn redirect_to_packout(&mut self, now: SimTime) -> Result<(), RobotError> {
        self.remaining_targets.clear();
        let segment =
            pathengine::plan_segment(self.position, PACKOUT, &self.nav_cfg, &mut self.direction_state, now)?;
        self.path = segment.path;
        self.path_progress = 0.0;
        self.state = RobotState::Returning;
        Ok(())
    }

    fn arrive_at_packout(&mut self, now: SimTime, bus: &Bus) -> Result<(), RobotError> {
        self.held_items.clear();
        let Some(mut order) = self.current_order.take() else {
            self.transition(RobotState::Idle, now, bus);
            return Ok(());
        };

        if self.cancel_requested {
            self.cancel_requested = false;
            let _ = order.cancel(now);
            bus.publish(
                Event::OrderCancelled {
                    order_id: order.id.clone(),
                    reason: "cancelled while in progress".to_string(),
                },
                now,
            );
        } else if order.is_fully_collected() {
            let created_at = order.created_at;
            let _ = order.complete(now);
            bus.publish(
                Event::OrderCompleted {
                    order_id: order.id.clone(),
                    distance: order.total_distance,
                    duration: now - created_at,
                },
                now,
            );
        } else {
            // Every item failed to pick (all PICK_FAILED): the order
            // cannot be fulfilled (spec §7 invariant-violation path).
            let _ = order.fail(now);
            bus.publish(
                Event::OrderFailed {
                    order_id: order.id.clone(),
                    reason: "no items were collected".to_string(),
                },
                now,
            );
        }

        self.transition(RobotState::Idle, now, bus);
        Ok(())
    }

    fn abort_order_failed(&mut self, now: SimTime, bus: &Bus, reason: &str) -> Result<(), RobotError> {
        self.remaining_targets.clear();
        if let Some(mut order) = self.current_order.take() {
            let _ = order.fail(now);
            bus.publish(
                Event::OrderFailed {
                    order_id: order.id.clone(),
                    reason: reason.to_string(),
                },
                now,
            );
        }
        self.held_items.clear();
        self.cancel_requested = false;

        match pathengine::plan_segment(self.position, PACKOUT, &self.nav_cfg, &mut self.direction_state, now) {
            Ok(segment) => {
                self.path = segment.path;
                self.path_progress = 0.0;
                self.transition(RobotState::Returning, now, bus);
            }
            Err(_) => {
                // Grid is fixed and packout is always reachable; this is
                // an unrecoverable defensive fallback only.
                self.position = PACKOUT;
                self.transition(RobotState::Idle, now, bus);
            }
        }
        Ok(())
    }

    /// Forcibly resolves any in-flight order during shutdown (spec
    /// §4.11: "let IN_PROGRESS finish or cancel per policy" — this
    /// kernel's policy is to cancel immediately, since shutdown does not
    /// keep ticking the clock; see DESIGN.md). Leaves the robot IDLE at
    /// whatever position it currently occupies — shutdown does not
    /// guarantee the packout-return invariant that ordinary tick-driven
    /// completion does.
    pub fn shutdown_abort(&mut self, now: SimTime, bus: &Bus) {
        self.cancel_requested = false;
        self.remaining_targets.clear();
        self.held_items.clear();
        self.path.clear();
        self.path_progress = 0.0;
        if let Some(mut order) = self.current_order.take() {
            if order.cancel(now).is_ok() {
                bus.publish(
                    Event::OrderCancelled {
                        order_id: order.id.clone(),
                        reason: "shutdown".to_string(),
                    },
                    now,
                );
            }
        }
        self.transition(RobotState::Idle, now, bus);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn c(aisle: u32, rack: u32) -> Coordinate {
        Coordinate::new(aisle, rack).unwrap()
    }

    fn robot() -> Robot {
        Robot::new("R1".into(), &RobotConfig::default(), &NavigationConfig::default())
    }

    fn inventory_with(ids: &[&str]) -> Inventory {
        let mut items = HashMap::new();
        for id in ids {
            items.insert(
                id.to_string(),
                inventory::Item {
                    id: id.to_string(),
                    location: c(5, 10),
                    quantity: 1.0,
                    category: inventory::Category::Electronics,
                    created_at: 0.0,
                    updated_at: 0.0,
                },
            );
        }
        Inventory::new(items)
    }

    #[test]
    fn single_item_order_happy_path_matches_s1() {
        let mut r = robot();
        let bus = Bus::new();
        let inv = inventory_with(&["ITEM_A1"]);
        let order = Order::new("O1".into(), vec!["ITEM_A1".into()], 0.0).unwrap();

        r.assign(order, vec![c(5, 10)], 0.0, &bus).unwrap();
        assert_eq!(r.state, RobotState::MovingToItem);

        let mut now = 0.0;
        // Drive the robot to completion with small ticks.
        for _ in 0..100_000 {
            now += 0.01;
            r.tick(0.01, now, &inv, &bus).unwrap();
            if r.state == RobotState::Idle {
                break;
            }
        }

        assert_eq!(r.state, RobotState::Idle);
        assert_eq!(r.position, PACKOUT);
    }

    #[test]
    fn held_items_invariant_enforced_on_assignment() {
        let mut r = Robot::new(
            "R1".into(),
            &config::RobotConfig { max_items: 2, ..RobotConfig::default() },
            &NavigationConfig::default(),
        );
        let bus = Bus::new();
        let order = Order::new(
            "O1".into(),
            vec!["A".into(), "B".into(), "C".into()],
            0.0,
        )
        .unwrap();
        let err = r
            .assign(order, vec![c(2, 2), c(3, 3), c(4, 4)], 0.0, &bus)
            .unwrap_err();
        assert_eq!(err, RobotError::HeldItemsExceeded(3, 2));
    }

    #[test]
    fn pick_failed_advances_without_aborting_order() {
        let mut r = robot();
        let bus = Bus::new();
        let inv = inventory_with(&[]); // ITEM_A1 missing
        let order = Order::new("O1".into(), vec!["ITEM_A1".into()], 0.0).unwrap();
        r.assign(order, vec![c(2, 2)], 0.0, &bus).unwrap();

        let mut now = 0.0;
        for _ in 0..100_000 {
            now += 0.01;
            r.tick(0.01, now, &inv, &bus).unwrap();
            if r.state == RobotState::Idle {
                break;
            }
        }
        assert_eq!(r.state, RobotState::Idle);
        assert_eq!(r.position, PACKOUT);
    }

    #[test]
    fn cancel_mid_pick_finishes_pick_then_returns() {
        let mut r = robot();
        let bus = Bus::new();
        let inv = inventory_with(&["ITEM_A1"]);
        let order = Order::new("O1".into(), vec!["ITEM_A1".into()], 0.0).unwrap();
        r.assign(order, vec![c(1, 3)], 0.0, &bus).unwrap();

        let mut now = 0.0;
        // Drive until collecting.
        for _ in 0..10_000 {
            now += 0.01;
            r.tick(0.01, now, &inv, &bus).unwrap();
            if r.state == RobotState::CollectingItem {
                break;
            }
        }
        assert_eq!(r.state, RobotState::CollectingItem);
        r.request_cancel();

        for _ in 0..100_000 {
            now += 0.01;
            r.tick(0.01, now, &inv, &bus).unwrap();
            if r.state == RobotState::Idle {
                break;
            }
        }
        assert_eq!(r.state, RobotState::Idle);
        assert_eq!(r.position, PACKOUT);
    }

    #[test]
    fn shutdown_abort_cancels_in_flight_order_and_goes_idle() {
        let mut r = robot();
        let bus = Bus::new();
        let inv = inventory_with(&["ITEM_A1"]);
        let order = Order::new("O1".into(), vec!["ITEM_A1".into()], 0.0).unwrap();
        r.assign(order, vec![c(5, 10)], 0.0, &bus).unwrap();
        r.tick(0.1, 0.1, &inv, &bus).unwrap();

        r.shutdown_abort(1.0, &bus);

        assert_eq!(r.state, RobotState::Idle);
        assert!(r.current_order.is_none());
        assert!(r.held_items.is_empty());

        bus.drain(1.0);
        assert_eq!(bus.stats().get("ORDER_CANCELLED").map(|k| k.count), Some(1));
    }
}
