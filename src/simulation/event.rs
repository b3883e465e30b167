//! Timestamped simulation events and the queue which orders them.

use std::{cmp::Ordering, collections::BinaryHeap};

use crate::{
    block::{BlockId, Side, TimeMs},
    node_view::NodeId,
};

/// Something that happens at a point in simulated time.
///
/// Variant order is the tie-break between events scheduled for the same
/// millisecond: a block is mined before deliveries are processed, deliveries
/// before the adversary reacts, and the adversary before convergence is
/// checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The network finds a new block.
    MineBlock,
    /// `peer` receives `block` on `side`.
    BlockDeliver {
        peer: NodeId,
        side: Side,
        block: BlockId,
    },
    /// The adversary learns that `peer` received `block` on `side`.
    AdvReceivedBlock {
        side: Side,
        block: BlockId,
        peer: NodeId,
    },
    /// Check whether all honest nodes agree on a side.
    CheckMerge,
    /// Nothing is left to process.
    QueueEmpty,
}

impl Event {
    /// Rank among events at the same timestamp; lower runs first.
    #[inline]
    pub fn priority(&self) -> u8 {
        match self {
            Event::MineBlock => 0,
            Event::BlockDeliver { .. } => 1,
            Event::AdvReceivedBlock { .. } => 2,
            Event::CheckMerge => 3,
            Event::QueueEmpty => 4,
        }
    }
}

#[derive(Debug, Clone)]
struct ScheduledEvent {
    time_ms: TimeMs,
    /// Insertion order, for FIFO among otherwise identical keys.
    seq: u64,
    event: Event,
}

impl ScheduledEvent {
    #[inline]
    fn key(&self) -> (TimeMs, u8, u64) {
        (self.time_ms, self.event.priority(), self.seq)
    }
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ScheduledEvent {}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the max-heap pops the earliest event.
        other.key().cmp(&self.key())
    }
}

/// Min-priority queue of events keyed by (timestamp, event kind, insertion
/// order).
#[derive(Debug, Default, Clone)]
pub struct EventQueue {
    events: BinaryHeap<ScheduledEvent>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, time_ms: TimeMs, event: Event) {
        self.events.push(ScheduledEvent {
            time_ms,
            seq: self.next_seq,
            event,
        });
        self.next_seq += 1;
    }

    /// Removes the earliest event.
    pub fn pop(&mut self) -> Option<(TimeMs, Event)> {
        self.events
            .pop()
            .map(|scheduled| (scheduled.time_ms, scheduled.event))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{Event, EventQueue};
    use crate::block::{BlockId, Side};

    fn deliver(block: i64) -> Event {
        Event::BlockDeliver {
            peer: 0.into(),
            side: Side::Left,
            block: BlockId(block),
        }
    }

    #[test]
    fn pops_in_timestamp_order() {
        let mut queue = EventQueue::new();
        queue.push(30, Event::CheckMerge);
        queue.push(10, deliver(1));
        queue.push(20, Event::MineBlock);

        assert_eq!(queue.pop(), Some((10, deliver(1))));
        assert_eq!(queue.pop(), Some((20, Event::MineBlock)));
        assert_eq!(queue.pop(), Some((30, Event::CheckMerge)));
        assert_eq!(queue.pop(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn same_timestamp_follows_event_kind_order() {
        let mut queue = EventQueue::new();
        queue.push(5, Event::QueueEmpty);
        queue.push(5, Event::CheckMerge);
        queue.push(
            5,
            Event::AdvReceivedBlock {
                side: Side::Right,
                block: BlockId(2),
                peer: 1.into(),
            },
        );
        queue.push(5, deliver(1));
        queue.push(5, Event::MineBlock);

        let order: Vec<u8> =
            std::iter::from_fn(|| queue.pop()).map(|(_, e)| e.priority()).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn identical_keys_are_fifo() {
        let mut queue = EventQueue::new();
        for block in 0..5 {
            queue.push(7, deliver(block));
        }
        assert_eq!(queue.len(), 5);

        for block in 0..5 {
            assert_eq!(queue.pop(), Some((7, deliver(block))));
        }
    }
}
