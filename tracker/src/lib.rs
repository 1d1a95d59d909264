//! Per-order live status tracking (spec §4.8). Subscribes to
//! `ITEM_COLLECTED`, `ROBOT_STATE_CHANGED`, and `ROBOT_MOVED` to build a
//! read-side view of each in-flight order, and to the terminal order
//! events to retain/evict rows for the analytics rolling window.
//!
//! `ORDER_COMPLETED` is emitted by `robot` — the one component with
//! direct knowledge of "order fully collected AND robot back at
//! packout" at the instant it becomes true (spec §4.5's state diagram
//! names the same transition). This tracker mirrors that completion
//! condition independently (for its own read model and as a sanity
//! check) but never re-emits `ORDER_COMPLETED` itself, which would
//! violate the "emitted exactly once" law (spec §8).

use std::collections::{HashMap, HashSet};

use common::time::{SharedClock, SimTime};
use eventbus::Event;
use grid::PACKOUT;
use orders::OrderStatus;
use parking_lot::Mutex;

#[derive(Debug, Clone)]
pub struct TrackedOrder {
    pub status: OrderStatus,
    pub collected: HashSet<String>,
    pub total_items: usize,
    pub started_at: Option<SimTime>,
    pub last_event_at: SimTime,
    pub distance_at_completion: Option<u32>,
}

struct State {
    orders: HashMap<String, TrackedOrder>,
    robot_at_packout: bool,
}

pub struct Tracker {
    state: Mutex<State>,
    clock: SharedClock,
    retention_s: f64,
}

impl Tracker {
    pub fn new(clock: SharedClock, retention_s: f64) -> Self {
        Self {
            state: Mutex::new(State {
                orders: HashMap::new(),
                robot_at_packout: true,
            }),
            clock,
            retention_s,
        }
    }

    pub fn clock(&self) -> SharedClock {
        self.clock.clone()
    }

    /// Handler body for bus subscription; register via
    /// `bus.subscribe(|_| true, move |e| tracker.record(e))`.
    pub fn record(&self, event: &Event) {
        let now = self.clock.get();
        let mut state = self.state.lock();

        match event {
            Event::OrderCreated { order_id, items } => {
                state.orders.insert(
                    order_id.clone(),
                    TrackedOrder {
                        status: OrderStatus::Pending,
                        collected: HashSet::new(),
                        total_items: items.len(),
                        started_at: None,
                        last_event_at: now,
                        distance_at_completion: None,
                    },
                );
            }
            Event::OrderAssigned { order_id, .. } => {
                if let Some(row) = state.orders.get_mut(order_id) {
                    row.status = OrderStatus::InProgress;
                    row.started_at = Some(now);
                    row.last_event_at = now;
                }
            }
            Event::ItemCollected { order_id, item_id, .. } => {
                if let Some(row) = state.orders.get_mut(order_id) {
                    row.collected.insert(item_id.clone());
                    row.last_event_at = now;
                }
            }
            Event::RobotMoved { to, .. } => {
                state.robot_at_packout = *to == PACKOUT;
            }
            Event::RobotStateChanged { .. } => {}
            Event::OrderCompleted { order_id, distance, .. } => {
                let at_packout = state.robot_at_packout;
                if let Some(row) = state.orders.get_mut(order_id) {
                    if row.collected.len() != row.total_items || !at_packout {
                        tracing::warn!(
                            order = %order_id,
                            collected = row.collected.len(),
                            total = row.total_items,
                            at_packout,
                            "order completed without tracker's own completion condition holding"
                        );
                    }
                    row.status = OrderStatus::Completed;
                    row.distance_at_completion = Some(*distance);
                    row.last_event_at = now;
                }
            }
            Event::OrderFailed { order_id, .. } => {
                if let Some(row) = state.orders.get_mut(order_id) {
                    row.status = OrderStatus::Failed;
                    row.last_event_at = now;
                }
            }
            Event::OrderCancelled { order_id, .. } => {
                if let Some(row) = state.orders.get_mut(order_id) {
                    row.status = OrderStatus::Cancelled;
                    row.last_event_at = now;
                }
            }
            _ => {}
        }
    }

    pub fn get(&self, order_id: &str) -> Option<TrackedOrder> {
        self.state.lock().orders.get(order_id).cloned()
    }

    pub fn live_count(&self) -> usize {
        self.state.lock().orders.len()
    }

    /// Evicts terminal orders whose `last_event_at` is older than
    /// `retention_s` (the analytics rolling window). Called once per
    /// tick by the integration layer.
    pub fn update(&self, now: SimTime) {
        let mut state = self.state.lock();
        state.orders.retain(|_, row| {
            if !matches!(
                row.status,
                OrderStatus::Completed | OrderStatus::Failed | OrderStatus::Cancelled
            ) {
                return true;
            }
            now - row.last_event_at <= self.retention_s
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_lifecycle_through_completion() {
        let clock = SharedClock::new();
        let tracker = Tracker::new(clock.clone(), 3600.0);

        clock.set(0.0);
        tracker.record(&Event::OrderCreated {
            order_id: "O1".into(),
            items: vec!["ITEM_A1".into()],
        });
        assert_eq!(tracker.get("O1").unwrap().status, OrderStatus::Pending);

        clock.set(1.0);
        tracker.record(&Event::OrderAssigned {
            order_id: "O1".into(),
            robot_id: "R1".into(),
        });
        assert_eq!(tracker.get("O1").unwrap().status, OrderStatus::InProgress);

        clock.set(5.0);
        tracker.record(&Event::ItemCollected {
            order_id: "O1".into(),
            item_id: "ITEM_A1".into(),
            robot_id: "R1".into(),
        });
        assert!(tracker.get("O1").unwrap().collected.contains("ITEM_A1"));

        clock.set(6.0);
        tracker.record(&Event::RobotMoved {
            robot_id: "R1".into(),
            from: grid::Coordinate::new(1, 2).unwrap(),
            to: PACKOUT,
        });

        clock.set(7.0);
        tracker.record(&Event::OrderCompleted {
            order_id: "O1".into(),
            distance: 26,
            duration: 7.0,
        });
        let row = tracker.get("O1").unwrap();
        assert_eq!(row.status, OrderStatus::Completed);
        assert_eq!(row.distance_at_completion, Some(26));
    }

    #[test]
    fn evicts_terminal_orders_past_retention() {
        let clock = SharedClock::new();
        let tracker = Tracker::new(clock.clone(), 10.0);
        tracker.record(&Event::OrderCreated {
            order_id: "O1".into(),
            items: vec!["ITEM_A1".into()],
        });
        tracker.record(&Event::OrderFailed {
            order_id: "O1".into(),
            reason: "test".into(),
        });
        assert_eq!(tracker.live_count(), 1);
        tracker.update(5.0);
        assert_eq!(tracker.live_count(), 1, "still within retention");
        tracker.update(20.0);
        assert_eq!(tracker.live_count(), 0, "evicted past retention");
    }

    #[test]
    fn in_progress_orders_are_never_evicted() {
        let clock = SharedClock::new();
        let tracker = Tracker::new(clock.clone(), 1.0);
        tracker.record(&Event::OrderCreated {
            order_id: "O1".into(),
            items: vec!["ITEM_A1".into()],
        });
        tracker.update(1000.0);
        assert_eq!(tracker.live_count(), 1);
    }
}
