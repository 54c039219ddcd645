//! Restartable sequence of item identifiers over a fixed snapshot

use std::fmt;
use std::sync::Arc;

use tracing::{trace, warn};

use crate::idlist::IdList;
use crate::Result;

/// Result of one [`IdEnumerator::next_batch`] or [`IdEnumerator::next_with`] call
#[derive(Debug)]
pub struct Batch<T = IdList> {
    pub items: Vec<T>,
    /// Fewer items than requested were handed out
    pub exhausted: bool,
}

impl<T> Batch<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Cursor over a snapshot of identifiers captured when browsing started.
///
/// The snapshot itself never changes; clones share it and keep their own
/// cursor. Every identifier handed out is a fresh copy owned by the caller.
#[derive(Debug, Clone)]
pub struct IdEnumerator {
    snapshot: Arc<[IdList]>,
    cursor: usize,
}

impl IdEnumerator {
    pub fn new(items: Vec<IdList>) -> Self {
        Self {
            snapshot: items.into(),
            cursor: 0,
        }
    }

    /// Total identifiers in the snapshot
    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.snapshot.len() - self.cursor
    }

    /// Copy up to `max` identifiers from the cursor and advance past them.
    ///
    /// A copy that fails to allocate ends the batch early; whatever was
    /// copied before it is still returned.
    pub fn next_batch(&mut self, max: usize) -> Batch {
        self.next_with(max, IdList::try_clone)
    }

    /// Hand out up to `max` identifiers through `copy`.
    ///
    /// The cursor only moves past items `copy` accepted, so an item whose
    /// copy failed is the first one offered by the next call.
    pub fn next_with<T, E, F>(&mut self, max: usize, mut copy: F) -> Batch<T>
    where
        E: fmt::Display,
        F: FnMut(&IdList) -> std::result::Result<T, E>,
    {
        let mut items = Vec::with_capacity(max.min(self.remaining()));
        while items.len() < max && self.cursor < self.snapshot.len() {
            match copy(&self.snapshot[self.cursor]) {
                Ok(item) => items.push(item),
                Err(e) => {
                    warn!("Copy of item {} failed: {}", self.cursor, e);
                    break;
                }
            }
            self.cursor += 1;
        }
        trace!("Fetched {} of {} requested", items.len(), max);

        let exhausted = items.len() < max;
        Batch { items, exhausted }
    }

    /// Move the cursor forward, stopping at the end of the snapshot.
    /// Returns whether any identifiers remain afterwards.
    pub fn advance(&mut self, count: usize) -> bool {
        self.cursor = self.cursor.saturating_add(count).min(self.snapshot.len());
        self.cursor < self.snapshot.len()
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Independent sequence with the same snapshot and cursor
    pub fn try_clone(&self) -> Result<Self> {
        let snapshot = self
            .snapshot
            .iter()
            .map(IdList::try_clone)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            snapshot: snapshot.into(),
            cursor: self.cursor,
        })
    }
}

impl Iterator for IdEnumerator {
    type Item = IdList;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch(1).items.pop()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{pidl, Error};

    fn sample(n: usize) -> IdEnumerator {
        let items = (0..n)
            .map(|i| pidl::encode(&format!("C:\\m{}.dll", i), 0x1000 * i as u64, 0x100).unwrap())
            .collect();
        IdEnumerator::new(items)
    }

    fn paths(batch: &Batch) -> Vec<String> {
        batch.items.iter().map(|item| pidl::path(item.view())).collect()
    }

    #[test]
    fn test_batches_until_exhausted() {
        let mut seq = sample(5);

        let first = seq.next_batch(3);
        assert_eq!(first.len(), 3);
        assert!(!first.exhausted);

        let second = seq.next_batch(3);
        assert_eq!(second.len(), 2);
        assert!(second.exhausted);
        assert_eq!(paths(&second), ["C:\\m3.dll", "C:\\m4.dll"]);

        let third = seq.next_batch(3);
        assert!(third.is_empty());
        assert!(third.exhausted);
    }

    #[test]
    fn test_exact_batch_is_not_exhausted() {
        let mut seq = sample(2);
        assert!(!seq.next_batch(2).exhausted);
        assert!(seq.next_batch(1).exhausted);
    }

    #[test]
    fn test_advance_clamps() {
        let mut seq = sample(4);
        assert!(seq.advance(2));
        assert_eq!(seq.position(), 2);

        assert!(!seq.advance(4 + 5));
        assert_eq!(seq.position(), 4);
        assert!(seq.next_batch(1).exhausted);

        assert!(!seq.advance(usize::MAX));
    }

    #[test]
    fn test_reset_restarts() {
        let mut seq = sample(3);
        let fresh = paths(&seq.next_batch(3));
        assert!(seq.next_batch(1).is_empty());

        seq.reset();
        assert_eq!(paths(&seq.next_batch(3)), fresh);
    }

    #[test]
    fn test_clones_advance_independently() {
        let mut seq = sample(4);
        seq.next_batch(1);

        let mut clone = seq.try_clone().unwrap();
        assert_eq!(clone.position(), 1);

        clone.next_batch(2);
        assert_eq!(clone.position(), 3);
        assert_eq!(seq.position(), 1);
        assert_eq!(paths(&seq.next_batch(1)), ["C:\\m1.dll"]);
    }

    #[test]
    fn test_iterator_yields_every_item() {
        let seq = sample(3);
        let all: Vec<_> = seq.map(|item| pidl::path(item.view())).collect();
        assert_eq!(all, ["C:\\m0.dll", "C:\\m1.dll", "C:\\m2.dll"]);
    }

    #[test]
    fn test_empty_snapshot() {
        let mut seq = IdEnumerator::new(Vec::new());
        assert!(seq.is_empty());
        assert!(!seq.advance(0));
        assert!(seq.next_batch(0).items.is_empty());
    }

    #[test]
    fn test_advance_to_end_then_fetch() {
        let mut seq = sample(3);
        assert!(!seq.advance(3));
        assert_eq!(seq.position(), 3);

        let batch = seq.next_batch(2);
        assert!(batch.is_empty());
        assert!(batch.exhausted);

        assert!(!seq.advance(1));
        assert_eq!(seq.position(), 3);
        assert!(seq.next_batch(1).exhausted);
    }

    #[test]
    fn test_failed_copy_returns_partial_batch() {
        let mut seq = sample(4);
        let mut calls = 0;
        let batch = seq.next_with(3, |item| {
            calls += 1;
            if calls == 2 {
                Err(Error::OutOfMemory(0x24))
            } else {
                item.try_clone()
            }
        });

        assert_eq!(paths(&batch), ["C:\\m0.dll"]);
        assert!(batch.exhausted);
        assert_eq!(seq.position(), 1);

        // the item that failed is offered again
        assert_eq!(paths(&seq.next_batch(3)), ["C:\\m1.dll", "C:\\m2.dll", "C:\\m3.dll"]);
    }

    #[test]
    fn test_next_with_maps_items() {
        let mut seq = sample(2);
        let batch = seq.next_with(5, |item| Ok::<_, Error>(pidl::base_address(item.view())));
        assert_eq!(batch.items, [0, 0x1000]);
        assert!(batch.exhausted);
    }
}
