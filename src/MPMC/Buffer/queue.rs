// Per-reader packet queues.
//
// Both queues hold packets that were delivered to a reader but are not yet
// at its head. The packet being read has already been popped, so nothing
// pushed later can preempt it.

use std::collections::VecDeque;

use crate::MPMC::Structs::Buffer_Structs::PacketHandle;

/// One queued packet with the keys needed to order it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct QueueEntry {
    pub(crate) packet: PacketHandle,
    pub(crate) priority: u16,
    pub(crate) index: u64,
}

impl QueueEntry {
    /// True if `self` should be delivered before `other`:
    /// higher priority first, then earlier arrival.
    #[inline]
    fn before(&self, other: &QueueEntry) -> bool {
        (self.priority, other.index) > (other.priority, self.index)
    }
}

/// Which ordering a reader applies to its backlog.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum QueueKind {
    Fifo,
    Priority,
}

/// Bounded queue of delivered packets, in FIFO or priority order.
#[derive(Debug)]
pub(crate) enum ReadQueue {
    Fifo(FifoQueue),
    Priority(PriorityHeap),
}

impl ReadQueue {
    pub(crate) fn new(kind: QueueKind, depth: usize) -> Self {
        match kind {
            QueueKind::Fifo => ReadQueue::Fifo(FifoQueue::new(depth)),
            QueueKind::Priority => ReadQueue::Priority(PriorityHeap::new(depth)),
        }
    }

    /// Returns false if the queue is full; the entry is not stored.
    pub(crate) fn push(&mut self, entry: QueueEntry) -> bool {
        match self {
            ReadQueue::Fifo(q) => q.push(entry),
            ReadQueue::Priority(q) => q.push(entry),
        }
    }

    pub(crate) fn pop(&mut self) -> Option<QueueEntry> {
        match self {
            ReadQueue::Fifo(q) => q.pop(),
            ReadQueue::Priority(q) => q.pop(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            ReadQueue::Fifo(q) => q.entries.len(),
            ReadQueue::Priority(q) => q.heap.len(),
        }
    }

    pub(crate) fn is_full(&self) -> bool {
        match self {
            ReadQueue::Fifo(q) => q.entries.len() >= q.depth,
            ReadQueue::Priority(q) => q.heap.len() >= q.depth,
        }
    }

    /// Iterate the queued packets in storage order.
    pub(crate) fn packets(&self) -> impl Iterator<Item = PacketHandle> + '_ {
        let (fifo, heap) = match self {
            ReadQueue::Fifo(q) => (Some(q.entries.iter()), None),
            ReadQueue::Priority(q) => (None, Some(q.heap.iter())),
        };
        fifo.into_iter()
            .flatten()
            .chain(heap.into_iter().flatten())
            .map(|e| e.packet)
    }

    pub(crate) fn consistency(&self) -> bool {
        match self {
            ReadQueue::Fifo(q) => q.consistency(),
            ReadQueue::Priority(q) => q.consistency(),
        }
    }
}

/// First-in, first-out ring. O(1) push and pop.
#[derive(Debug)]
pub(crate) struct FifoQueue {
    entries: VecDeque<QueueEntry>,
    depth: usize,
}

impl FifoQueue {
    fn new(depth: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(depth),
            depth,
        }
    }

    fn push(&mut self, entry: QueueEntry) -> bool {
        if self.entries.len() >= self.depth {
            return false;
        }
        self.entries.push_back(entry);
        true
    }

    fn pop(&mut self) -> Option<QueueEntry> {
        self.entries.pop_front()
    }

    /// Entries must be in strictly increasing arrival order.
    fn consistency(&self) -> bool {
        self.entries.len() <= self.depth
            && self
                .entries
                .iter()
                .zip(self.entries.iter().skip(1))
                .all(|(a, b)| a.index < b.index)
    }
}

/// Binary max-heap keyed by (priority, earliest arrival).
/// O(log n) push and pop.
#[derive(Debug)]
pub(crate) struct PriorityHeap {
    heap: Vec<QueueEntry>,
    depth: usize,
}

impl PriorityHeap {
    fn new(depth: usize) -> Self {
        Self {
            heap: Vec::with_capacity(depth),
            depth,
        }
    }

    fn push(&mut self, entry: QueueEntry) -> bool {
        if self.heap.len() >= self.depth {
            return false;
        }
        self.heap.push(entry);
        // Sift up until the parent outranks the new entry.
        let mut idx = self.heap.len() - 1;
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if !self.heap[idx].before(&self.heap[parent]) {
                break;
            }
            self.heap.swap(idx, parent);
            idx = parent;
        }
        true
    }

    fn pop(&mut self) -> Option<QueueEntry> {
        if self.heap.is_empty() {
            return None;
        }
        let top = self.heap.swap_remove(0);
        // Sift the moved entry down below any child that outranks it.
        let len = self.heap.len();
        let mut idx = 0;
        loop {
            let left = 2 * idx + 1;
            let right = left + 1;
            let mut best = idx;
            if left < len && self.heap[left].before(&self.heap[best]) {
                best = left;
            }
            if right < len && self.heap[right].before(&self.heap[best]) {
                best = right;
            }
            if best == idx {
                break;
            }
            self.heap.swap(idx, best);
            idx = best;
        }
        Some(top)
    }

    /// No child may outrank its parent. This is necessary and sufficient
    /// for the whole tree to be ordered.
    fn consistency(&self) -> bool {
        self.heap.len() <= self.depth
            && (1..self.heap.len()).all(|i| !self.heap[i].before(&self.heap[(i - 1) / 2]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(priority: u16, index: u64) -> QueueEntry {
        QueueEntry {
            packet: PacketHandle {
                slot: index as u32,
                generation: 0,
            },
            priority,
            index,
        }
    }

    #[test]
    fn fifo_pops_in_push_order_and_rejects_when_full() {
        let mut q = ReadQueue::new(QueueKind::Fifo, 3);
        assert!(q.push(entry(5, 0)));
        assert!(q.push(entry(0, 1)));
        assert!(q.push(entry(9, 2)));
        assert!(q.is_full());
        assert!(!q.push(entry(1, 3)));
        assert!(q.consistency());

        let order: Vec<u64> = std::iter::from_fn(|| q.pop()).map(|e| e.index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn heap_orders_by_priority_then_arrival() {
        let mut q = ReadQueue::new(QueueKind::Priority, 16);
        let input = [(1, 0), (3, 1), (1, 2), (0, 3), (3, 4), (2, 5)];
        for (p, i) in input {
            assert!(q.push(entry(p, i)));
            assert!(q.consistency());
        }

        let mut order = Vec::new();
        while let Some(e) = q.pop() {
            assert!(q.consistency());
            order.push((e.priority, e.index));
        }
        assert_eq!(order, vec![(3, 1), (3, 4), (2, 5), (1, 0), (1, 2), (0, 3)]);
    }

    #[test]
    fn heap_ties_preserve_arrival_order() {
        let mut q = ReadQueue::new(QueueKind::Priority, 32);
        for i in 0..20 {
            q.push(entry(7, i));
        }
        let order: Vec<u64> = std::iter::from_fn(|| q.pop()).map(|e| e.index).collect();
        assert_eq!(order, (0..20).collect::<Vec<_>>());
    }
}
