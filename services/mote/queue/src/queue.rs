//! Fixed-capacity FIFO with drop-newest overflow

use crate::{QueueError, QueueStats, MAX_CAPACITY};
use std::collections::VecDeque;
use tracing::trace;

/// Bounded forwarding queue.
///
/// Storage is reserved once in [`ForwardingQueue::with_capacity`]; enqueue and
/// dequeue never allocate afterwards.
#[derive(Debug, Clone)]
pub struct ForwardingQueue<T> {
    entries: VecDeque<T>,
    capacity: u8,
    stats: QueueStats,
}

impl<T> ForwardingQueue<T> {
    /// Create a queue holding at most `capacity` entries
    pub fn with_capacity(capacity: usize) -> Result<Self, QueueError> {
        if capacity == 0 || capacity > MAX_CAPACITY {
            return Err(QueueError::Capacity(capacity));
        }

        Ok(Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity as u8,
            stats: QueueStats::default(),
        })
    }

    /// Append at the tail; refused without eviction when full
    pub fn enqueue(&mut self, entry: T) -> Result<(), QueueError> {
        if self.is_full() {
            self.stats.rejected += 1;
            trace!(
                "queue full, rejecting entry (depth={}/{})",
                self.entries.len(),
                self.capacity
            );
            return Err(QueueError::Full {
                capacity: self.capacity,
            });
        }

        self.entries.push_back(entry);
        self.stats.enqueued += 1;

        let depth = self.len();
        if depth > self.stats.high_water {
            self.stats.high_water = depth;
        }

        trace!("enqueued entry (depth={}/{})", depth, self.capacity);
        Ok(())
    }

    /// Remove from the head
    pub fn dequeue(&mut self) -> Option<T> {
        let entry = self.entries.pop_front()?;
        self.stats.dequeued += 1;
        trace!("dequeued entry (depth={}/{})", self.entries.len(), self.capacity);
        Some(entry)
    }

    /// Head entry without removing it
    pub fn peek(&self) -> Option<&T> {
        self.entries.front()
    }

    /// Current depth
    pub fn len(&self) -> u8 {
        // never exceeds capacity, which fits in a u8
        self.entries.len() as u8
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the next enqueue will be refused
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity as usize
    }

    /// Configured capacity
    pub fn capacity(&self) -> u8 {
        self.capacity
    }

    /// Entries from head to tail
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    /// Drop everything queued, keeping the reserved storage
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Counters since construction
    pub fn stats(&self) -> QueueStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_CAPACITY;

    #[test]
    fn test_capacity_bounds() {
        assert_eq!(
            ForwardingQueue::<u32>::with_capacity(0).unwrap_err(),
            QueueError::Capacity(0)
        );
        assert_eq!(
            ForwardingQueue::<u32>::with_capacity(256).unwrap_err(),
            QueueError::Capacity(256)
        );

        let max = ForwardingQueue::<u32>::with_capacity(255).unwrap();
        assert_eq!(max.capacity(), 255);

        let default = ForwardingQueue::<u32>::with_capacity(DEFAULT_CAPACITY as usize).unwrap();
        assert_eq!(default.capacity(), 128);
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = ForwardingQueue::with_capacity(8).unwrap();
        for i in 0..8 {
            queue.enqueue(i).unwrap();
        }

        let drained: Vec<_> = std::iter::from_fn(|| queue.dequeue()).collect();
        assert_eq!(drained, (0..8).collect::<Vec<_>>());
        assert!(queue.is_empty());
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn test_full_queue_rejects_newest() {
        let mut queue = ForwardingQueue::with_capacity(3).unwrap();
        queue.enqueue("a").unwrap();
        queue.enqueue("b").unwrap();
        queue.enqueue("c").unwrap();
        assert!(queue.is_full());

        assert_eq!(queue.enqueue("d"), Err(QueueError::Full { capacity: 3 }));

        // contents and order untouched
        assert_eq!(queue.iter().copied().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(queue.peek(), Some(&"a"));
        assert_eq!(queue.stats().rejected, 1);
    }

    #[test]
    fn test_interleaved_operations_keep_order() {
        let mut queue = ForwardingQueue::with_capacity(2).unwrap();
        queue.enqueue(1).unwrap();
        queue.enqueue(2).unwrap();
        assert_eq!(queue.dequeue(), Some(1));
        queue.enqueue(3).unwrap();
        assert!(queue.enqueue(4).is_err());
        assert_eq!(queue.dequeue(), Some(2));
        assert_eq!(queue.dequeue(), Some(3));
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn test_stats() {
        let mut queue = ForwardingQueue::with_capacity(2).unwrap();
        queue.enqueue(1).unwrap();
        queue.enqueue(2).unwrap();
        let _ = queue.enqueue(3);
        queue.dequeue();

        let stats = queue.stats();
        assert_eq!(stats.enqueued, 2);
        assert_eq!(stats.dequeued, 1);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.high_water, 2);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_full_at_max_capacity_len_fits_u8() {
        let mut queue = ForwardingQueue::with_capacity(MAX_CAPACITY).unwrap();
        for i in 0..MAX_CAPACITY {
            queue.enqueue(i).unwrap();
        }
        assert_eq!(queue.len(), u8::MAX);
        assert!(queue.enqueue(0).is_err());
        assert_eq!(queue.len(), u8::MAX);
    }

    #[test]
    fn test_clear() {
        let mut queue = ForwardingQueue::with_capacity(4).unwrap();
        queue.enqueue(1).unwrap();
        queue.clear();
        assert!(queue.is_empty());
        queue.enqueue(2).unwrap();
        assert_eq!(queue.dequeue(), Some(2));
    }
}
