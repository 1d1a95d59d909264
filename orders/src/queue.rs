//! Bounded FIFO order queue (spec §3, §4.7). One dequeue path, one
//! enqueue path; overflow is an explicit rejection, never a silent drop.

use std::collections::VecDeque;

use thiserror::Error;

use crate::order::Order;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue is full (capacity {0})")]
    Full(u32),
}

pub struct OrderQueue {
    items: VecDeque<Order>,
    capacity: u32,
}

impl OrderQueue {
    pub fn new(capacity: u32) -> Self {
        Self {
            items: VecDeque::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn size(&self) -> usize {
        self.items.len()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() as u32 >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn enqueue(&mut self, order: Order) -> Result<(), QueueError> {
        if self.is_full() {
            return Err(QueueError::Full(self.capacity));
        }
        self.items.push_back(order);
        Ok(())
    }

    pub fn dequeue(&mut self) -> Option<Order> {
        self.items.pop_front()
    }

    /// Removes an order by id regardless of queue position (cancellation
    /// of a still-PENDING order).
    pub fn remove(&mut self, order_id: &str) -> Option<Order> {
        let pos = self.items.iter().position(|o| o.id == order_id)?;
        self.items.remove(pos)
    }

    pub fn snapshot(&self) -> Vec<Order> {
        self.items.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(id: &str) -> Order {
        Order::new(id.to_string(), vec!["ITEM_A1".to_string()], 0.0).unwrap()
    }

    #[test]
    fn fifo_order_preserved() {
        let mut q = OrderQueue::new(5);
        q.enqueue(order("O1")).unwrap();
        q.enqueue(order("O2")).unwrap();
        assert_eq!(q.dequeue().unwrap().id, "O1");
        assert_eq!(q.dequeue().unwrap().id, "O2");
        assert!(q.dequeue().is_none());
    }

    #[test]
    fn overflow_is_an_explicit_rejection() {
        let mut q = OrderQueue::new(2);
        q.enqueue(order("O1")).unwrap();
        q.enqueue(order("O2")).unwrap();
        assert_eq!(q.enqueue(order("O3")).unwrap_err(), QueueError::Full(2));
        assert_eq!(q.size(), 2);
    }

    #[test]
    fn remove_by_id_works_from_any_position() {
        let mut q = OrderQueue::new(5);
        q.enqueue(order("O1")).unwrap();
        q.enqueue(order("O2")).unwrap();
        q.enqueue(order("O3")).unwrap();
        let removed = q.remove("O2").unwrap();
        assert_eq!(removed.id, "O2");
        assert_eq!(q.size(), 2);
        assert_eq!(q.snapshot().iter().map(|o| o.id.clone()).collect::<Vec<_>>(), vec!["O1", "O3"]);
    }
}
