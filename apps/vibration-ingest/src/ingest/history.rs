use std::collections::VecDeque;

/// Five minutes of readings at 1 Hz.
pub const DEFAULT_MAX_HISTORY: usize = 300;

/// Fixed-capacity FIFO. Once full, every push evicts exactly the oldest entry.
#[derive(Debug, Clone)]
pub struct HistoryRing<T> {
    capacity: usize,
    buffer: VecDeque<T>,
}

impl<T: Clone> HistoryRing<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            buffer: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, item: T) {
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(item);
    }

    /// Oldest first. A copy; the live ring is untouched.
    pub fn to_vec(&self) -> Vec<T> {
        self.buffer.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<&T> {
        self.buffer.back()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
