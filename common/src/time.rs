//! Simulated-time primitives shared across the kernel.
//!
//! Every timestamp in this workspace is simulated seconds since the sim
//! started, never wall-clock time — this keeps the whole kernel
//! reproducible under `speed_multiplier` and under tests that drive `dt`
//! by hand instead of sleeping.

use std::sync::Arc;

use parking_lot::Mutex;

/// Simulated time, in seconds, since the clock started running.
pub type SimTime = f64;

/// Simulated time delta for one tick, in seconds. `0.0` while paused.
pub type Dt = f64;

/// A small shared cell carrying "now" into event-bus subscriber closures.
///
/// `eventbus::Bus` dispatches handlers as plain `Fn(&Event)` — the event
/// itself carries no timestamp. Components that need simulated time
/// inside a handler (tracker, analytics) hold a clone of the same
/// `SharedClock` the integration layer updates immediately before each
/// `Bus::drain` call, so every handler invoked during that drain observes
/// the correct tick's `now`.
#[derive(Clone, Default)]
pub struct SharedClock(Arc<Mutex<SimTime>>);

impl SharedClock {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(0.0)))
    }

    pub fn set(&self, now: SimTime) {
        *self.0.lock() = now;
    }

    pub fn get(&self) -> SimTime {
        *self.0.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_clock_reads_back_what_was_set() {
        let clock = SharedClock::new();
        assert_eq!(clock.get(), 0.0);
        clock.set(12.5);
        assert_eq!(clock.get(), 12.5);
        let cloned = clock.clone();
        assert_eq!(cloned.get(), 12.5);
    }
}
