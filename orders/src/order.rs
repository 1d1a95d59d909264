//! The `Order` model and its one-way lifecycle (spec §3).

use std::collections::HashSet;

use common::time::SimTime;
use thiserror::Error;

pub const MIN_ITEMS_PER_ORDER: usize = 1;
pub const MAX_ITEMS_PER_ORDER: usize = 4;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("order must have at least one item")]
    EmptyItems,
    #[error("order has {0} items, exceeding the cap of {MAX_ITEMS_PER_ORDER}")]
    TooManyItems(usize),
    #[error("illegal status transition from {from:?} to {to:?}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl OrderStatus {
    /// Status transitions are one-way along PENDING -> IN_PROGRESS ->
    /// {COMPLETED | FAILED | CANCELLED} (spec §3).
    fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (InProgress, Cancelled)
                // Cancellation may also land on a still-Pending order
                // (dequeued from the queue, never assigned to a robot).
                | (Pending, Cancelled)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: String,
    pub items: Vec<String>,
    pub created_at: SimTime,
    pub assigned_at: Option<SimTime>,
    pub completed_at: Option<SimTime>,
    pub status: OrderStatus,
    pub assigned_robot: Option<String>,
    pub collected: HashSet<String>,
    pub total_distance: u32,
}

impl Order {
    pub fn new(id: String, items: Vec<String>, created_at: SimTime) -> Result<Self, OrderError> {
        if items.is_empty() {
            return Err(OrderError::EmptyItems);
        }
        if items.len() > MAX_ITEMS_PER_ORDER {
            return Err(OrderError::TooManyItems(items.len()));
        }
        Ok(Self {
            id,
            items,
            created_at,
            assigned_at: None,
            completed_at: None,
            status: OrderStatus::Pending,
            assigned_robot: None,
            collected: HashSet::new(),
            total_distance: 0,
        })
    }

    pub fn assign(&mut self, robot_id: String, now: SimTime) -> Result<(), OrderError> {
        self.transition(OrderStatus::InProgress)?;
        self.assigned_robot = Some(robot_id);
        self.assigned_at = Some(now);
        Ok(())
    }

    pub fn mark_collected(&mut self, item_id: &str) {
        self.collected.insert(item_id.to_string());
    }

    pub fn is_fully_collected(&self) -> bool {
        self.items.iter().all(|i| self.collected.contains(i))
    }

    pub fn complete(&mut self, now: SimTime) -> Result<(), OrderError> {
        self.transition(OrderStatus::Completed)?;
        self.completed_at = Some(now);
        Ok(())
    }

    pub fn fail(&mut self, now: SimTime) -> Result<(), OrderError> {
        self.transition(OrderStatus::Failed)?;
        self.completed_at = Some(now);
        Ok(())
    }

    pub fn cancel(&mut self, now: SimTime) -> Result<(), OrderError> {
        self.transition(OrderStatus::Cancelled)?;
        self.completed_at = Some(now);
        Ok(())
    }

    fn transition(&mut self, next: OrderStatus) -> Result<(), OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::IllegalTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::Completed | OrderStatus::Failed | OrderStatus::Cancelled
        )
    }
}
