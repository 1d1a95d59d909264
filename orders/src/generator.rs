//! Periodic order creation (spec §4.7). Draws a seeded sample of item
//! ids at a configurable cadence, honors pause semantics implicitly (no
//! timer advance when `dt == 0`), and backs off with hysteresis once the
//! queue fills.

use common::time::{Dt, SimTime};
use eventbus::{Bus, Event};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::order::Order;
use crate::queue::OrderQueue;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratorConfig {
    pub interval_s: f64,
    pub min_items: u32,
    pub max_items: u32,
    /// Once the queue has hit capacity, emission stays suppressed until
    /// the queue drains to at or below this mark (hysteresis avoids
    /// flapping right at the cap). Not part of the externally-supplied
    /// config schema (§6); chosen here as half of `queue_cap` — see
    /// DESIGN.md.
    pub low_water_mark: u32,
}

impl GeneratorConfig {
    pub fn from_orders_config(cfg: &config::OrdersConfig) -> Self {
        Self {
            interval_s: cfg.interval_s,
            min_items: cfg.min_items,
            max_items: cfg.max_items,
            low_water_mark: cfg.queue_cap / 2,
        }
    }
}

pub struct OrderGenerator {
    cfg: GeneratorConfig,
    rng: ChaCha8Rng,
    timer: f64,
    suppressed: bool,
    backoff_count: u64,
    next_seq: u64,
}

impl OrderGenerator {
    pub fn new(seed: u64, cfg: GeneratorConfig) -> Self {
        Self {
            cfg,
            rng: ChaCha8Rng::seed_from_u64(seed),
            timer: 0.0,
            suppressed: false,
            backoff_count: 0,
            next_seq: 1,
        }
    }

    pub fn backoff_count(&self) -> u64 {
        self.backoff_count
    }

    /// Advances the cadence timer by `dt` and creates however many orders
    /// have become due (normally zero or one; more than one only if a
    /// single tick's `dt` — under a high speed multiplier — spans more
    /// than one interval). `dt == 0` (paused) never advances the timer,
    /// so no emission happens while paused.
    pub fn update(
        &mut self,
        dt: Dt,
        now: SimTime,
        queue: &mut OrderQueue,
        available_item_ids: &[String],
        bus: &Bus,
    ) {
        if dt <= 0.0 {
            return;
        }
        self.timer += dt;
        while self.timer >= self.cfg.interval_s {
            self.timer -= self.cfg.interval_s;
            self.try_emit(now, queue, available_item_ids, bus);
        }
    }

    fn try_emit(&mut self, now: SimTime, queue: &mut OrderQueue, available_item_ids: &[String], bus: &Bus) {
        if self.suppressed {
            if queue.size() as u32 > self.cfg.low_water_mark {
                self.backoff_count += 1;
                return;
            }
            self.suppressed = false;
        }

        if queue.is_full() {
            self.suppressed = true;
            self.backoff_count += 1;
            return;
        }

        let count = self
            .rng
            .gen_range(self.cfg.min_items..=self.cfg.max_items)
            .max(1) as usize;
        let items = self.sample_items(available_item_ids, count);
        if items.is_empty() {
            return;
        }

        let id = format!("ORDER_{}", self.next_seq);
        self.next_seq += 1;
        let order = match Order::new(id.clone(), items.clone(), now) {
            Ok(order) => order,
            Err(_) => return,
        };

        match queue.enqueue(order) {
            Ok(()) => bus.publish(
                Event::OrderCreated {
                    order_id: id,
                    items,
                },
                now,
            ),
            Err(_) => {
                self.suppressed = true;
                self.backoff_count += 1;
            }
        }
    }

    fn sample_items(&mut self, available: &[String], count: usize) -> Vec<String> {
        if available.is_empty() {
            return Vec::new();
        }
        let count = count.min(available.len());
        let mut pool: Vec<&String> = available.iter().collect();
        pool.shuffle(&mut self.rng);
        pool.into_iter().take(count).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> Vec<String> {
        (1..=10).map(|i| format!("ITEM_A{i}")).collect()
    }

    #[test]
    fn emits_one_order_per_elapsed_interval() {
        let cfg = GeneratorConfig {
            interval_s: 30.0,
            min_items: 1,
            max_items: 4,
            low_water_mark: 1,
        };
        let mut gen = OrderGenerator::new(1, cfg);
        let mut queue = OrderQueue::new(50);
        let bus = Bus::new();

        gen.update(10.0, 10.0, &mut queue, &items(), &bus);
        assert_eq!(queue.size(), 0);
        gen.update(20.0, 30.0, &mut queue, &items(), &bus);
        assert_eq!(queue.size(), 1);
    }

    #[test]
    fn paused_tick_never_emits() {
        let cfg = GeneratorConfig {
            interval_s: 1.0,
            min_items: 1,
            max_items: 4,
            low_water_mark: 1,
        };
        let mut gen = OrderGenerator::new(1, cfg);
        let mut queue = OrderQueue::new(50);
        let bus = Bus::new();
        gen.update(0.0, 0.0, &mut queue, &items(), &bus);
        assert_eq!(queue.size(), 0);
    }

    #[test]
    fn backs_off_once_queue_is_full_and_records_it() {
        let cfg = GeneratorConfig {
            interval_s: 1.0,
            min_items: 1,
            max_items: 1,
            low_water_mark: 1,
        };
        let mut gen = OrderGenerator::new(2, cfg);
        let mut queue = OrderQueue::new(2);
        let bus = Bus::new();

        gen.update(1.0, 1.0, &mut queue, &items(), &bus);
        gen.update(1.0, 2.0, &mut queue, &items(), &bus);
        assert_eq!(queue.size(), 2);

        // third interval: queue full, generator must back off instead of
        // emitting (spec S4: "no silent drop", explicit backoff counter).
        gen.update(1.0, 3.0, &mut queue, &items(), &bus);
        assert_eq!(queue.size(), 2);
        assert_eq!(gen.backoff_count(), 1);
    }

    #[test]
    fn resumes_only_after_low_water_mark() {
        let cfg = GeneratorConfig {
            interval_s: 1.0,
            min_items: 1,
            max_items: 1,
            low_water_mark: 1,
        };
        let mut gen = OrderGenerator::new(2, cfg);
        let mut queue = OrderQueue::new(2);
        let bus = Bus::new();

        gen.update(1.0, 1.0, &mut queue, &items(), &bus);
        gen.update(1.0, 2.0, &mut queue, &items(), &bus);
        gen.update(1.0, 3.0, &mut queue, &items(), &bus); // suppressed
        assert_eq!(gen.backoff_count(), 1);

        queue.dequeue(); // drain to size 1, at the low-water mark (not below)
        gen.update(1.0, 4.0, &mut queue, &items(), &bus);
        assert_eq!(gen.backoff_count(), 2, "still suppressed at the mark itself");

        queue.dequeue(); // drain to size 0, below the mark
        gen.update(1.0, 5.0, &mut queue, &items(), &bus);
        assert_eq!(queue.size(), 1, "resumes emitting once below the mark");
    }
}
