//! Priority event bus: the only channel components use to talk to each
//! other. Dispatch is cooperative on the scheduler's tick thread —
//! handlers must not block — and a panicking handler never takes down
//! the rest of the dispatch.

use std::collections::{HashMap, VecDeque};

use common::time::SimTime;
use grid::Coordinate;
use parking_lot::Mutex;

/// The closed event catalog. Payloads are fixed per spec.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    SimStarted,
    SimStopped,
    SimPaused,
    SimResumed,
    Tick {
        dt: f64,
    },
    OrderCreated {
        order_id: String,
        items: Vec<String>,
    },
    OrderAssigned {
        order_id: String,
        robot_id: String,
    },
    OrderCompleted {
        order_id: String,
        distance: u32,
        duration: f64,
    },
    OrderCancelled {
        order_id: String,
        reason: String,
    },
    OrderFailed {
        order_id: String,
        reason: String,
    },
    RobotStateChanged {
        robot_id: String,
        from: String,
        to: String,
    },
    RobotMoved {
        robot_id: String,
        from: Coordinate,
        to: Coordinate,
    },
    ItemCollected {
        order_id: String,
        item_id: String,
        robot_id: String,
    },
    PickFailed {
        order_id: String,
        item_id: String,
        reason: String,
    },
    InventoryUpdated {
        item_id: String,
        quantity: f64,
    },
    PerfWarning {
        kind: String,
        measured: f64,
        threshold: f64,
    },
}

impl Event {
    pub fn priority(&self) -> Priority {
        match self {
            Event::SimStarted | Event::SimStopped | Event::SimPaused | Event::SimResumed => {
                Priority::High
            }
            Event::PerfWarning { .. } => Priority::High,
            Event::Tick { .. } | Event::RobotMoved { .. } | Event::InventoryUpdated { .. } => {
                Priority::Low
            }
            _ => Priority::Medium,
        }
    }

    /// Stable name for predicates, stats keys, and log lines — matches
    /// the event catalog's column names exactly.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::SimStarted => "SIM_STARTED",
            Event::SimStopped => "SIM_STOPPED",
            Event::SimPaused => "SIM_PAUSED",
            Event::SimResumed => "SIM_RESUMED",
            Event::Tick { .. } => "TICK",
            Event::OrderCreated { .. } => "ORDER_CREATED",
            Event::OrderAssigned { .. } => "ORDER_ASSIGNED",
            Event::OrderCompleted { .. } => "ORDER_COMPLETED",
            Event::OrderCancelled { .. } => "ORDER_CANCELLED",
            Event::OrderFailed { .. } => "ORDER_FAILED",
            Event::RobotStateChanged { .. } => "ROBOT_STATE_CHANGED",
            Event::RobotMoved { .. } => "ROBOT_MOVED",
            Event::ItemCollected { .. } => "ITEM_COLLECTED",
            Event::PickFailed { .. } => "PICK_FAILED",
            Event::InventoryUpdated { .. } => "INVENTORY_UPDATED",
            Event::PerfWarning { .. } => "PERF_WARNING",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone)]
struct Envelope {
    event: Event,
    published_at: SimTime,
}

struct Subscriber {
    predicate: Box<dyn Fn(&Event) -> bool + Send + Sync>,
    handler: Box<dyn Fn(&Event) + Send + Sync>,
}

type Middleware = Box<dyn Fn(Event) -> Option<Event> + Send + Sync>;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KindStats {
    pub count: u64,
    pub total_latency_s: f64,
}

pub type BusStats = HashMap<&'static str, KindStats>;

/// The event bus. Owns its queues and subscriber list behind internal
/// locks, so `&Bus` is all callers ever need — no external
/// synchronization required.
pub struct Bus {
    high: Mutex<VecDeque<Envelope>>,
    medium: Mutex<VecDeque<Envelope>>,
    low: Mutex<VecDeque<Envelope>>,
    subscribers: Mutex<Vec<Subscriber>>,
    middleware: Mutex<Vec<Middleware>>,
    stats: Mutex<BusStats>,
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus {
    pub fn new() -> Self {
        Self {
            high: Mutex::new(VecDeque::new()),
            medium: Mutex::new(VecDeque::new()),
            low: Mutex::new(VecDeque::new()),
            subscribers: Mutex::new(Vec::new()),
            middleware: Mutex::new(Vec::new()),
            stats: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a handler that only fires for events matching
    /// `predicate`. Handlers run in registration order within a given
    /// event's dispatch.
    pub fn subscribe(
        &self,
        predicate: impl Fn(&Event) -> bool + Send + Sync + 'static,
        handler: impl Fn(&Event) + Send + Sync + 'static,
    ) {
        self.subscribers.lock().push(Subscriber {
            predicate: Box::new(predicate),
            handler: Box::new(handler),
        });
    }

    /// Appends a middleware stage to the dispatch chain. Stages run in
    /// the order they were added, each able to drop the event (return
    /// `None`) or rewrite it (return `Some(other)`) before the next
    /// stage and, eventually, subscribers see it.
    pub fn use_middleware(&self, stage: impl Fn(Event) -> Option<Event> + Send + Sync + 'static) {
        self.middleware.lock().push(Box::new(stage));
    }

    /// Enqueues `event` for the next `drain`. Does not dispatch
    /// immediately — dispatch only happens on the scheduler's tick.
    pub fn publish(&self, event: Event, now: SimTime) {
        let envelope = Envelope {
            event,
            published_at: now,
        };
        let queue = match envelope.event.priority() {
            Priority::High => &self.high,
            Priority::Medium => &self.medium,
            Priority::Low => &self.low,
        };
        queue.lock().push_back(envelope);
    }

    /// Drains everything queued as of this call: all of HIGH first
    /// (FIFO), then all of MEDIUM, then all of LOW. Events published by
    /// a handler mid-drain land in the queues for the *next* drain, so
    /// one tick's dispatch always terminates.
    pub fn drain(&self, now: SimTime) {
        let batch: Vec<Envelope> = {
            let mut high = self.high.lock();
            let mut medium = self.medium.lock();
            let mut low = self.low.lock();
            high.drain(..)
                .chain(medium.drain(..))
                .chain(low.drain(..))
                .collect()
        };

        for envelope in batch {
            self.dispatch_one(envelope, now);
        }
    }

    fn dispatch_one(&self, envelope: Envelope, now: SimTime) {
        let mut event = envelope.event;
        for stage in self.middleware.lock().iter() {
            match stage(event) {
                Some(next) => event = next,
                None => return,
            }
        }

        let kind = event.kind();
        {
            let mut stats = self.stats.lock();
            let entry = stats.entry(kind).or_default();
            entry.count += 1;
            entry.total_latency_s += (now - envelope.published_at).max(0.0);
        }

        for subscriber in self.subscribers.lock().iter() {
            if !(subscriber.predicate)(&event) {
                continue;
            }
            let handler = &subscriber.handler;
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                handler(&event);
            }));
            if let Err(panic) = outcome {
                tracing::error!(event = kind, ?panic, "event handler panicked");
            }
        }
    }

    pub fn stats(&self) -> BusStats {
        self.stats.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn order_created(id: &str) -> Event {
        Event::OrderCreated {
            order_id: id.into(),
            items: vec!["ITEM_A1".into()],
        }
    }

    #[test]
    fn priority_ordering_drains_high_then_medium_then_low() {
        let bus = Bus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let o = order.clone();
        bus.subscribe(|_| true, move |e| o.lock().push(e.kind()));

        bus.publish(Event::Tick { dt: 0.1 }, 0.0); // low
        bus.publish(order_created("O1"), 0.0); // medium
        bus.publish(Event::SimStarted, 0.0); // high

        bus.drain(0.0);

        assert_eq!(
            *order.lock(),
            vec!["SIM_STARTED", "ORDER_CREATED", "TICK"]
        );
    }

    #[test]
    fn fifo_within_a_priority() {
        let bus = Bus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        bus.subscribe(|_| true, move |e| {
            if let Event::OrderCreated { order_id, .. } = e {
                s.lock().push(order_id.clone());
            }
        });

        bus.publish(order_created("O1"), 0.0);
        bus.publish(order_created("O2"), 0.0);
        bus.publish(order_created("O3"), 0.0);
        bus.drain(0.0);

        assert_eq!(*seen.lock(), vec!["O1", "O2", "O3"]);
    }

    #[test]
    fn predicate_filters_by_event_type() {
        let bus = Bus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        bus.subscribe(
            |e| matches!(e, Event::ItemCollected { .. }),
            move |_| {
                h.fetch_add(1, Ordering::SeqCst);
            },
        );

        bus.publish(order_created("O1"), 0.0);
        bus.publish(
            Event::ItemCollected {
                order_id: "O1".into(),
                item_id: "ITEM_A1".into(),
                robot_id: "R1".into(),
            },
            0.0,
        );
        bus.drain(0.0);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn middleware_can_drop_an_event() {
        let bus = Bus::new();
        bus.use_middleware(|e| match e {
            Event::Tick { .. } => None,
            other => Some(other),
        });
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        bus.subscribe(|_| true, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(Event::Tick { dt: 0.1 }, 0.0);
        bus.publish(Event::SimStarted, 0.0);
        bus.drain(0.0);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn middleware_chain_runs_in_registration_order() {
        let bus = Bus::new();
        bus.use_middleware(|e| match e {
            Event::PerfWarning {
                kind,
                measured,
                threshold,
            } => Some(Event::PerfWarning {
                kind: format!("{kind}:stage1"),
                measured,
                threshold,
            }),
            other => Some(other),
        });
        bus.use_middleware(|e| match e {
            Event::PerfWarning {
                kind,
                measured,
                threshold,
            } => Some(Event::PerfWarning {
                kind: format!("{kind}:stage2"),
                measured,
                threshold,
            }),
            other => Some(other),
        });

        let seen = Arc::new(Mutex::new(String::new()));
        let s = seen.clone();
        bus.subscribe(
            |e| matches!(e, Event::PerfWarning { .. }),
            move |e| {
                if let Event::PerfWarning { kind, .. } = e {
                    *s.lock() = kind.clone();
                }
            },
        );

        bus.publish(
            Event::PerfWarning {
                kind: "tick_overrun".into(),
                measured: 20.0,
                threshold: 16.0,
            },
            0.0,
        );
        bus.drain(0.0);

        assert_eq!(*seen.lock(), "tick_overrun:stage1:stage2");
    }

    #[test]
    fn one_panicking_handler_does_not_block_the_others() {
        let bus = Bus::new();
        bus.subscribe(|_| true, |_| panic!("boom"));
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        bus.subscribe(|_| true, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(Event::SimStarted, 0.0);
        bus.drain(0.0);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stats_count_and_accumulate_latency() {
        let bus = Bus::new();
        bus.publish(order_created("O1"), 0.0);
        bus.publish(order_created("O2"), 1.0);
        bus.drain(2.0);

        let stats = bus.stats();
        let s = stats.get("ORDER_CREATED").unwrap();
        assert_eq!(s.count, 2);
        // latencies: (2.0 - 0.0) + (2.0 - 1.0) = 3.0
        assert!((s.total_latency_s - 3.0).abs() < 1e-9);
    }

    #[test]
    fn events_published_during_drain_wait_for_the_next_drain() {
        let bus = Arc::new(Bus::new());
        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        let inner = bus.clone();
        bus.subscribe(
            |e| matches!(e, Event::SimStarted),
            move |_| {
                f.fetch_add(1, Ordering::SeqCst);
                inner.publish(Event::SimStopped, 0.0);
            },
        );
        let stopped = Arc::new(AtomicUsize::new(0));
        let st = stopped.clone();
        bus.subscribe(
            |e| matches!(e, Event::SimStopped),
            move |_| {
                st.fetch_add(1, Ordering::SeqCst);
            },
        );

        bus.publish(Event::SimStarted, 0.0);
        bus.drain(0.0);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(stopped.load(Ordering::SeqCst), 0);

        bus.drain(0.0);
        assert_eq!(stopped.load(Ordering::SeqCst), 1);
    }
}
