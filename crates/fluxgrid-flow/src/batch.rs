//! Batch scheduling for large networks.
//!
//! Allocation walks connections in fixed-size batches so a cycle over a
//! large network can be budgeted (and cut short) without losing
//! determinism: batch boundaries come from connection-id order, never from
//! timing.

use fluxgrid_core::id::ConnectionId;

/// Splits an id-ordered connection list into fixed-size batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchScheduler {
    batch_size: usize,
}

impl BatchScheduler {
    /// A scheduler with the given batch size. Zero is coerced to 1 so a
    /// misconfigured scheduler degrades to one-connection batches instead
    /// of looping forever.
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// The number of batches a list of `len` connections splits into.
    pub fn batch_count(&self, len: usize) -> usize {
        len.div_ceil(self.batch_size)
    }

    /// The `index`-th batch of the list, empty when past the end.
    pub fn batch<'a>(&self, connections: &'a [ConnectionId], index: usize) -> &'a [ConnectionId] {
        let start = index.saturating_mul(self.batch_size).min(connections.len());
        let end = start.saturating_add(self.batch_size).min(connections.len());
        &connections[start..end]
    }

    /// Split off the next batch, returning it with the rest of the list.
    pub fn next_batch<'a>(
        &self,
        remaining: &'a [ConnectionId],
    ) -> (&'a [ConnectionId], &'a [ConnectionId]) {
        remaining.split_at(self.batch_size.min(remaining.len()))
    }

    /// Iterate all batches in order.
    pub fn partition<'a>(
        &self,
        connections: &'a [ConnectionId],
    ) -> impl Iterator<Item = &'a [ConnectionId]> {
        connections.chunks(self.batch_size)
    }
}
