//! Order lifecycle, the bounded FIFO queue that holds pending orders, and
//! the periodic generator that fills it. Assignment (robot IDLE + queue
//! non-empty -> dequeue head) is a single free function here rather than
//! a type of its own: it has no state of its own beyond the queue, and
//! keeping it state-free avoids a dependency from this crate onto
//! `robot`'s types (spec §9: "no component calls into another's mutable
//! state directly").

pub mod generator;
pub mod order;
pub mod queue;

pub use generator::{GeneratorConfig, OrderGenerator};
pub use order::{Order, OrderError, OrderStatus};
pub use queue::{OrderQueue, QueueError};

/// Dequeues the head order iff the robot is idle and the queue holds at
/// least one order. The assigner never looks past the head (spec §4.7).
pub fn try_assign(queue: &mut OrderQueue, robot_is_idle: bool) -> Option<Order> {
    if !robot_is_idle {
        return None;
    }
    queue.dequeue()
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::time::SimTime;

    fn order(id: &str) -> Order {
        Order::new(id.to_string(), vec!["ITEM_A1".to_string()], 0.0 as SimTime).unwrap()
    }

    #[test]
    fn assigner_only_dequeues_when_robot_idle() {
        let mut q = OrderQueue::new(10);
        q.enqueue(order("O1")).unwrap();
        assert!(try_assign(&mut q, false).is_none());
        assert_eq!(q.size(), 1);
        let assigned = try_assign(&mut q, true).unwrap();
        assert_eq!(assigned.id, "O1");
        assert_eq!(q.size(), 0);
    }

    #[test]
    fn assigner_never_looks_past_the_head() {
        let mut q = OrderQueue::new(10);
        q.enqueue(order("O1")).unwrap();
        q.enqueue(order("O2")).unwrap();
        let assigned = try_assign(&mut q, true).unwrap();
        assert_eq!(assigned.id, "O1");
        assert_eq!(q.size(), 1);
    }
}
