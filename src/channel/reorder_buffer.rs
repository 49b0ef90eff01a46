use std::collections::VecDeque;

/// Result of inserting a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Buffered,
    /// Older than the playout head, or already present.
    Dropped,
    /// Too far ahead; the buffer restarted at this packet.
    Reset,
}

/// What [`ReorderBuffer::pop`] found at the head slot.
#[derive(Debug, PartialEq)]
pub enum Slot<T> {
    Packet(T),
    /// A gap with later packets behind it. Treated as lost.
    Missing,
}

/// Orders packets by extended sequence number.
///
/// Slot `i` holds sequence `next_expected_seq + i`. Holes stay `None` until
/// the packet arrives or the head passes them.
pub struct ReorderBuffer<T> {
    slots: VecDeque<Option<T>>,
    next_expected_seq: Option<u64>,
    capacity: usize,
}

impl<T> std::fmt::Debug for ReorderBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReorderBuffer")
            .field("capacity", &self.capacity)
            .field("next_expected_seq", &self.next_expected_seq)
            .field("slots", &self.slots.len())
            .finish()
    }
}

impl<T> ReorderBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: VecDeque::with_capacity(capacity),
            next_expected_seq: None,
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, seq: u64, item: T) -> PushOutcome {
        let next_seq = *self.next_expected_seq.get_or_insert(seq);

        if seq < next_seq {
            return PushOutcome::Dropped;
        }

        let offset = (seq - next_seq) as usize;

        // Too far in the future: skip what we have and catch up.
        if offset >= self.capacity {
            self.slots.clear();
            self.next_expected_seq = Some(seq);
            self.slots.push_back(Some(item));
            return PushOutcome::Reset;
        }

        while self.slots.len() <= offset {
            self.slots.push_back(None);
        }

        if self.slots[offset].is_some() {
            return PushOutcome::Dropped;
        }
        self.slots[offset] = Some(item);
        PushOutcome::Buffered
    }

    pub fn pop(&mut self) -> Option<Slot<T>> {
        let slot = self.slots.pop_front()?;
        self.next_expected_seq = self.next_expected_seq.map(|n| n + 1);
        Some(match slot {
            Some(item) => Slot::Packet(item),
            None => Slot::Missing,
        })
    }

    /// Slots up to and including the newest packet.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter_packets(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().flatten()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.next_expected_seq = None;
    }
}
