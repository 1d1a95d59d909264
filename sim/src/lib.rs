//! Integration layer (spec §4.11): owns construction order, wires every
//! component's events through the one shared [`Bus`], translates the
//! external control commands (§6) into [`Clock`] actions, and
//! coordinates orderly shutdown.
//!
//! No component here calls into another's mutable state directly —
//! `Sim::on_tick` is the only place that touches more than one
//! component's lock in the same call, and it only ever does so to move
//! data *between* them (dequeue an order, hand it to the robot), never
//! to reach into another component's internals.

pub mod bootstrap;
pub mod error;

use std::sync::Arc;

use analytics::{Analytics, AnalyticsSnapshot};
use common::time::{Dt, SharedClock, SimTime};
use config::Config;
use eventbus::{Bus, Event};
use grid::Coordinate;
use inventory::Inventory;
use orders::{GeneratorConfig, Order, OrderGenerator, OrderQueue};
use parking_lot::Mutex;
use robot::Robot;
use scheduler::{Clock, ClockState};
use tracker::Tracker;

pub use error::SimError;

/// A read-only point-in-time view of the whole kernel, returned by the
/// `status` control command (spec §6).
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub clock_state: ClockState,
    pub sim_time: SimTime,
    pub speed: f64,
    pub queue_len: usize,
    pub queue_cap: u32,
    pub robot_state: &'static str,
    pub robot_position: Coordinate,
    pub analytics: AnalyticsSnapshot,
}

/// The assembled simulation kernel. Construction order follows spec
/// §4.11 exactly: `Config -> Grid -> EventBus -> Clock -> Inventory ->
/// PathEngine -> Robot -> Queue -> Generator -> Tracker -> Analytics`.
/// `Grid` and `PathEngine` are pure value/function modules with nothing
/// to own here; every other step below owns one field.
pub struct Sim {
    config: Arc<config::Registry>,
    bus: Arc<Bus>,
    clock: Arc<Clock>,
    shared_clock: SharedClock,
    inventory: Arc<Inventory>,
    item_ids: Vec<String>,
    robot: Mutex<Robot>,
    queue: Mutex<OrderQueue>,
    generator: Mutex<OrderGenerator>,
    tracker: Arc<Tracker>,
    analytics: Arc<Analytics>,
}

impl Sim {
    pub fn build(cfg: Config, seed: u64) -> Result<Arc<Sim>, SimError> {
        cfg.validate()?;
        let registry = Arc::new(config::Registry::new(cfg));
        let cfg = registry.load();

        let bus = Arc::new(Bus::new());
        let clock = Arc::new(Clock::new(
            cfg.timing.target_fps,
            cfg.timing.simulation_speed,
            cfg.analytics.warn_tick_ms,
        ));
        let shared_clock = SharedClock::new();

        let items = inventory::generate_items(seed, 0.0, inventory::DEFAULT_PER_LETTER_CAP);
        let item_ids: Vec<String> = items.keys().cloned().collect();
        let inventory = Arc::new(Inventory::new(items));

        let robot = Mutex::new(Robot::new("R1".to_string(), &cfg.robot, &cfg.navigation));
        let queue = Mutex::new(OrderQueue::new(cfg.orders.queue_cap));
        let generator = Mutex::new(OrderGenerator::new(
            seed,
            GeneratorConfig::from_orders_config(&cfg.orders),
        ));

        let tracker = Arc::new(Tracker::new(shared_clock.clone(), cfg.analytics.window_s));
        let analytics = Arc::new(Analytics::new(
            cfg.analytics.window_s,
            inventory.clone(),
            &cfg.navigation,
            shared_clock.clone(),
        ));

        {
            let t = tracker.clone();
            bus.subscribe(|_| true, move |e| t.record(e));
        }
        {
            let a = analytics.clone();
            bus.subscribe(|_| true, move |e| a.record(e));
        }
        bus.use_middleware(|event| {
            tracing::debug!(target: "eventbus", kind = event.kind(), "event.dispatch");
            Some(event)
        });

        Ok(Arc::new(Sim {
            config: registry,
            bus,
            clock,
            shared_clock,
            inventory,
            item_ids,
            robot,
            queue,
            generator,
            tracker,
            analytics,
        }))
    }

    pub fn config(&self) -> Arc<Config> {
        self.config.load()
    }

    pub fn inventory(&self) -> &Arc<Inventory> {
        &self.inventory
    }

    pub fn bus(&self) -> &Arc<Bus> {
        &self.bus
    }

    // -- control commands (spec §6) ----------------------------------

    pub fn start(&self) {
        self.clock.start(&self.bus, self.clock.sim_time());
    }

    pub fn stop(&self) {
        self.clock.stop(&self.bus, self.clock.sim_time());
    }

    pub fn pause(&self) {
        self.clock.pause(&self.bus, self.clock.sim_time());
    }

    pub fn resume(&self) {
        self.clock.resume(&self.bus, self.clock.sim_time());
    }

    pub fn set_speed(&self, requested: f64) -> f64 {
        self.clock.set_speed(requested)
    }

    pub fn clock_state(&self) -> ClockState {
        self.clock.state()
    }

    pub fn sim_time(&self) -> SimTime {
        self.clock.sim_time()
    }

    pub fn status(&self) -> StatusSnapshot {
        let robot = self.robot.lock();
        let queue = self.queue.lock();
        StatusSnapshot {
            clock_state: self.clock.state(),
            sim_time: self.clock.sim_time(),
            speed: self.clock.speed(),
            queue_len: queue.size(),
            queue_cap: queue.capacity(),
            robot_state: robot.state.as_str(),
            robot_position: robot.position,
            analytics: self.analytics.snapshot(&self.bus.stats()),
        }
    }

    /// Coordinates orderly shutdown (spec §4.11): drains the queue to a
    /// known state (every still-`PENDING` order is cancelled), resolves
    /// whatever order the robot currently holds (cancelled immediately —
    /// see `Robot::shutdown_abort` and DESIGN.md for why), stops the
    /// clock, and flushes the bus so every subscriber observes the final
    /// state. Subscribers themselves are torn down simply by dropping
    /// this `Sim` — the bus holds no resources beyond their closures.
    pub fn shutdown(&self) {
        tracing::info!("sim.shutdown: beginning orderly shutdown");
        let now = self.clock.sim_time();

        {
            let mut queue = self.queue.lock();
            let pending_ids: Vec<String> = queue.snapshot().into_iter().map(|o| o.id).collect();
            for id in pending_ids {
                if let Some(mut order) = queue.remove(&id) {
                    if order.cancel(now).is_ok() {
                        self.bus.publish(
                            Event::OrderCancelled {
                                order_id: order.id.clone(),
                                reason: "shutdown: queue drained".to_string(),
                            },
                            now,
                        );
                    }
                }
            }
        }

        {
            let mut robot = self.robot.lock();
            robot.shutdown_abort(now, &self.bus);
        }

        self.clock.stop(&self.bus, now);
        self.bus.drain(now);
        tracing::info!("sim.shutdown: complete");
    }

    // -- tick loop -----------------------------------------------------

    /// Drives the production tick loop: a fixed-rate `tokio::time::interval`
    /// owned by `Clock::run`, calling [`Sim::on_tick`] once per wakeup.
    /// Returns once a command has called [`Sim::stop`] or [`Sim::shutdown`].
    pub async fn run(self: Arc<Self>) {
        let bus = self.bus.clone();
        self.clock.run(&bus, |dt, now| self.on_tick(dt, now)).await;
    }

    /// Advances the kernel by exactly `dt` simulated seconds, bypassing
    /// `Clock`'s own pacing. Used by tests to drive deterministic
    /// scenarios without depending on wall-clock sleeps (spec §8's
    /// scenario suite; matches this codebase's existing "drive by hand,
    /// never sleep" testing convention).
    pub fn tick(&self, dt: Dt) -> SimTime {
        let now = self.clock.step(dt);
        self.on_tick(dt, now);
        now
    }

    /// One tick's worth of cross-component work, in the fixed order
    /// spec §5 mandates: Generator -> Robot -> Queue/Assigner -> Tracker
    /// -> Analytics -> EventBus drain.
    fn on_tick(&self, dt: Dt, now: SimTime) {
        self.shared_clock.set(now);

        {
            let mut queue = self.queue.lock();
            let mut generator = self.generator.lock();
            generator.update(dt, now, &mut queue, &self.item_ids, &self.bus);
        }

        {
            let mut robot = self.robot.lock();
            if let Err(err) = robot.tick(dt, now, &self.inventory, &self.bus) {
                tracing::warn!(error = %err, "robot tick failed");
            }
        }

        {
            let mut robot = self.robot.lock();
            if robot.is_idle() {
                let dequeued = {
                    let mut queue = self.queue.lock();
                    orders::try_assign(&mut queue, true)
                };
                if let Some(order) = dequeued {
                    self.assign_or_fail(&mut robot, order, now);
                }
            }
        }

        self.tracker.update(now);

        {
            let queue_len = self.queue.lock().size();
            let robot_idle = self.robot.lock().is_idle();
            self.analytics.tick(now, dt, queue_len, robot_idle);
        }

        self.bus.drain(now);
    }

    fn assign_or_fail(&self, robot: &mut Robot, order: Order, now: SimTime) {
        match self.resolve_locations(&order) {
            Some(locations) => {
                if let Err(err) = robot.assign(order, locations, now, &self.bus) {
                    tracing::warn!(error = %err, "order assignment rejected");
                }
            }
            None => {
                // Invariant violation (spec §7): an order referenced an
                // item id the inventory has never heard of. Can't happen
                // via the generator (it only ever samples existing ids)
                // but is handled per the invariant-violation disposition
                // rather than panicking.
                let mut order = order;
                tracing::warn!(order = %order.id, "order references unknown item location(s); aborting");
                if order.fail(now).is_ok() {
                    self.bus.publish(
                        Event::OrderFailed {
                            order_id: order.id.clone(),
                            reason: "unresolvable item location".to_string(),
                        },
                        now,
                    );
                }
            }
        }
    }

    fn resolve_locations(&self, order: &Order) -> Option<Vec<Coordinate>> {
        order.items.iter().map(|id| self.inventory.location_of(id)).collect()
    }
}
