//! Bounded history of the most recent events of one type.

use std::collections::VecDeque;

/// Largest up-front allocation for a replay buffer; bigger buffers grow on demand.
const PREALLOC_LIMIT: usize = 64;

/// FIFO buffer that keeps the last `capacity` events ("last R wins").
///
/// A capacity of zero disables replay: every appended event is evicted
/// immediately. The buffer has no locking of its own; the owning topic
/// serializes access to it.
#[derive(Debug, Clone)]
pub struct ReplayBuffer<E> {
    items: VecDeque<E>,
    capacity: usize,
}

impl<E> ReplayBuffer<E> {
    /// Create an empty buffer holding at most `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity.min(PREALLOC_LIMIT)),
            capacity,
        }
    }

    /// Append an event at the tail.
    ///
    /// Returns the event that fell out of the buffer, if any. With a zero
    /// capacity that is the appended event itself.
    pub fn append(&mut self, event: E) -> Option<E> {
        if self.capacity == 0 {
            return Some(event);
        }
        let evicted = if self.items.len() >= self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(event);
        evicted
    }

    /// Iterate over the buffered events, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.items.iter()
    }

    /// Number of buffered events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the buffer holds no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Maximum number of events retained.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every buffered event.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<E: Clone> ReplayBuffer<E> {
    /// Copy of the buffered events in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<E> {
        self.items.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_last_r_events() {
        let mut buffer = ReplayBuffer::new(2);
        assert_eq!(buffer.append(1), None);
        assert_eq!(buffer.append(2), None);
        assert_eq!(buffer.append(3), Some(1));
        assert_eq!(buffer.snapshot(), vec![2, 3]);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_zero_capacity_retains_nothing() {
        let mut buffer = ReplayBuffer::new(0);
        assert_eq!(buffer.append("a"), Some("a"));
        assert!(buffer.is_empty());
        assert!(buffer.snapshot().is_empty());
    }

    #[test]
    fn test_eviction_order_is_oldest_first() {
        let mut buffer = ReplayBuffer::new(3);
        let evicted: Vec<_> = (0..10).filter_map(|i| buffer.append(i)).collect();
        assert_eq!(evicted, (0..7).collect::<Vec<_>>());
        assert_eq!(buffer.snapshot(), vec![7, 8, 9]);
    }

    #[test]
    fn test_snapshot_does_not_drain() {
        let mut buffer = ReplayBuffer::new(4);
        buffer.append('x');
        let first = buffer.snapshot();
        let second = buffer.snapshot();
        assert_eq!(first, second);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_large_capacity_does_not_preallocate_everything() {
        let buffer: ReplayBuffer<u8> = ReplayBuffer::new(1_000_000);
        assert_eq!(buffer.capacity(), 1_000_000);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut buffer = ReplayBuffer::new(2);
        buffer.append(1);
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), 2);
    }
}
