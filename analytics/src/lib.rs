//! Rolling-window KPI engine (spec §4.9). Subscribes to the event
//! stream and maintains incremental counters plus a ring buffer of
//! completed-order samples sized by the configured window, so
//! `snapshot()` stays O(1) and never copies the underlying buffer.
//!
//! Mean path efficiency needs each order's optimal Manhattan tour
//! length, which the event catalog doesn't carry — `ORDER_CREATED`
//! only has item ids, not locations. This engine resolves locations
//! itself from a shared `Inventory` handle and caches the optimal tour
//! (computed once, with a fresh direction-cooldown state so the cache
//! reflects an unhurried plan rather than whatever cooldown history the
//! robot happened to be in) until the matching `ORDER_COMPLETED` or
//! terminal failure/cancellation arrives.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use common::time::{SharedClock, SimTime};
use config::NavigationConfig;
use eventbus::{BusStats, Event};
use grid::{Coordinate, PACKOUT};
use inventory::Inventory;
use parking_lot::Mutex;
use pathengine::{DirectionState, NavConfig};

/// A hard ceiling on ring-buffer length so a misconfigured window (or a
/// burst far denser than expected) cannot exhaust memory.
const MAX_SAMPLES: usize = 100_000;
/// Same ceiling, for the per-tick and per-event ring buffers that back
/// utilization, queue length and throughput.
const MAX_TICK_SAMPLES: usize = 100_000;
const MAX_EVENT_SAMPLES: usize = 100_000;

#[derive(Debug, Clone, Copy)]
struct CompletionSample {
    at: SimTime,
    duration: f64,
    efficiency: Option<f64>,
}

/// One `tick()` call's contribution to the busy/observed/queue-length
/// running sums, kept around so `evict_expired` can subtract it back out
/// once it falls outside the window.
#[derive(Debug, Clone, Copy)]
struct TickSample {
    at: SimTime,
    dt: f64,
    busy: bool,
    queue_len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AnalyticsSnapshot {
    pub orders_per_hour: f64,
    pub mean_completion_time_s: f64,
    pub mean_path_efficiency: f64,
    pub robot_utilization: f64,
    pub mean_queue_length: f64,
    pub event_throughput_per_s: f64,
    pub mean_handler_latency_s: f64,
}

struct State {
    window_s: f64,
    completions: VecDeque<CompletionSample>,
    pending_optimal: HashMap<String, u32>,
    ticks: VecDeque<TickSample>,
    busy_time_s: f64,
    observed_time_s: f64,
    queue_len_integral: f64,
    events: VecDeque<SimTime>,
}

pub struct Analytics {
    state: Mutex<State>,
    inventory: Arc<Inventory>,
    nav_cfg: NavConfig,
    clock: SharedClock,
}

impl Analytics {
    pub fn new(window_s: f64, inventory: Arc<Inventory>, nav_cfg: &NavigationConfig, clock: SharedClock) -> Self {
        Self {
            state: Mutex::new(State {
                window_s,
                completions: VecDeque::new(),
                pending_optimal: HashMap::new(),
                ticks: VecDeque::new(),
                busy_time_s: 0.0,
                observed_time_s: 0.0,
                queue_len_integral: 0.0,
                events: VecDeque::new(),
            }),
            inventory,
            nav_cfg: NavConfig {
                aisle_traversal_s: nav_cfg.aisle_traversal_s,
                direction_cooldown_s: nav_cfg.direction_cooldown_s,
            },
            clock,
        }
    }

    /// Handler body for bus subscription; register via
    /// `bus.subscribe(|_| true, move |e| analytics.record(e))`.
    pub fn record(&self, event: &Event) {
        let now = self.clock.get();
        let mut state = self.state.lock();
        state.events.push_back(now);
        if state.events.len() > MAX_EVENT_SAMPLES {
            state.events.pop_front();
        }
        match event {
            Event::OrderCreated { order_id, items } => {
                if let Some(optimal) = self.optimal_tour_distance(items, now) {
                    state.pending_optimal.insert(order_id.clone(), optimal);
                }
            }
            Event::OrderCompleted {
                order_id,
                distance,
                duration,
            } => {
                let optimal = state.pending_optimal.remove(order_id);
                let efficiency = optimal.and_then(|opt| {
                    if *distance == 0 {
                        None
                    } else {
                        Some(opt as f64 / *distance as f64)
                    }
                });
                state.completions.push_back(CompletionSample {
                    at: now,
                    duration: *duration,
                    efficiency,
                });
                if state.completions.len() > MAX_SAMPLES {
                    state.completions.pop_front();
                }
            }
            Event::OrderFailed { order_id, .. } | Event::OrderCancelled { order_id, .. } => {
                state.pending_optimal.remove(order_id);
            }
            _ => {}
        }
        self.evict_expired(&mut state, now);
    }

    fn optimal_tour_distance(&self, item_ids: &[String], now: SimTime) -> Option<u32> {
        let locations: Option<Vec<Coordinate>> = item_ids
            .iter()
            .map(|id| self.inventory.location_of(id))
            .collect();
        let locations = locations?;
        let mut dir_state = DirectionState::default();
        let legs = pathengine::plan_tour_now(PACKOUT, &locations, &self.nav_cfg, &mut dir_state, now).ok()?;
        Some(pathengine::total_distance(&legs))
    }

    fn evict_expired(&self, state: &mut State, now: SimTime) {
        let window_s = state.window_s;
        while let Some(front) = state.completions.front() {
            if now - front.at > window_s {
                state.completions.pop_front();
            } else {
                break;
            }
        }
        while let Some(front) = state.ticks.front() {
            if now - front.at > window_s {
                let sample = state.ticks.pop_front().unwrap();
                state.observed_time_s -= sample.dt;
                if sample.busy {
                    state.busy_time_s -= sample.dt;
                }
                state.queue_len_integral -= sample.queue_len as f64 * sample.dt;
            } else {
                break;
            }
        }
        while let Some(front) = state.events.front() {
            if now - *front > window_s {
                state.events.pop_front();
            } else {
                break;
            }
        }
    }

    /// Called once per tick by the integration layer with the queue's
    /// current length and whether the robot is idle, so utilization and
    /// queue-length time-averages are measured continuously rather than
    /// only at event boundaries. Samples are kept in a ring buffer and
    /// evicted the same way completions are, so these running sums stay
    /// scoped to the configured window instead of growing for the life
    /// of the simulation.
    pub fn tick(&self, now: SimTime, dt: f64, queue_len: usize, robot_idle: bool) {
        let mut state = self.state.lock();
        if dt > 0.0 {
            let busy = !robot_idle;
            state.observed_time_s += dt;
            if busy {
                state.busy_time_s += dt;
            }
            state.queue_len_integral += queue_len as f64 * dt;
            state.ticks.push_back(TickSample { at: now, dt, busy, queue_len });
            if state.ticks.len() > MAX_TICK_SAMPLES {
                state.ticks.pop_front();
            }
        }
        self.evict_expired(&mut state, now);
    }

    pub fn snapshot(&self, bus_stats: &BusStats) -> AnalyticsSnapshot {
        let state = self.state.lock();

        let n = state.completions.len() as f64;
        let orders_per_hour = if state.window_s > 0.0 {
            n * 3600.0 / state.window_s
        } else {
            0.0
        };
        let mean_completion_time_s = if n > 0.0 {
            state.completions.iter().map(|c| c.duration).sum::<f64>() / n
        } else {
            0.0
        };
        let efficiencies: Vec<f64> = state.completions.iter().filter_map(|c| c.efficiency).collect();
        let mean_path_efficiency = if !efficiencies.is_empty() {
            efficiencies.iter().sum::<f64>() / efficiencies.len() as f64
        } else {
            0.0
        };
        let robot_utilization = if state.observed_time_s > 0.0 {
            state.busy_time_s / state.observed_time_s
        } else {
            0.0
        };
        let mean_queue_length = if state.observed_time_s > 0.0 {
            state.queue_len_integral / state.observed_time_s
        } else {
            0.0
        };

        // Throughput is this engine's own windowed event count, not the
        // bus's lifetime total — the bus's `BusStats` are cumulative
        // since startup and never evicted.
        let event_throughput_per_s = if state.window_s > 0.0 {
            state.events.len() as f64 / state.window_s
        } else {
            0.0
        };
        let (total_count, total_latency) = bus_stats
            .values()
            .fold((0u64, 0.0f64), |(c, l), k| (c + k.count, l + k.total_latency_s));
        let mean_handler_latency_s = if total_count > 0 {
            total_latency / total_count as f64
        } else {
            0.0
        };

        AnalyticsSnapshot {
            orders_per_hour,
            mean_completion_time_s,
            mean_path_efficiency,
            robot_utilization,
            mean_queue_length,
            event_throughput_per_s,
            mean_handler_latency_s,
        }
    }
}
