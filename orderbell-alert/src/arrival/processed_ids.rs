//! Bounded, insertion-ordered set of already-handled order ids

use orderbell_common::OrderId;
use std::collections::{HashSet, VecDeque};

/// FIFO-evicting set of order ids
///
/// `len() <= cap()` holds after every insert.
#[derive(Debug, Clone)]
pub struct ProcessedIdSet {
    order: VecDeque<OrderId>,
    members: HashSet<OrderId>,
    cap: usize,
}

impl ProcessedIdSet {
    pub fn new(cap: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(cap.min(1024)),
            members: HashSet::with_capacity(cap.min(1024)),
            cap,
        }
    }

    pub fn contains(&self, id: OrderId) -> bool {
        self.members.contains(&id)
    }

    /// Insert `id`, evicting the oldest entries beyond the cap
    ///
    /// Returns `false` if the id was already present.
    pub fn insert(&mut self, id: OrderId) -> bool {
        if !self.members.insert(id) {
            return false;
        }
        self.order.push_back(id);
        self.trim_to_cap();
        true
    }

    /// Drop the oldest entries until the cap holds; returns how many
    pub fn trim_to_cap(&mut self) -> usize {
        let mut removed = 0;
        while self.order.len() > self.cap {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
                removed += 1;
            }
        }
        removed
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }
}
