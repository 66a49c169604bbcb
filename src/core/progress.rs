//! Per-input progress tracking
//!
//! One slot per submitted input, indexed by batch position. Every update
//! publishes a fresh snapshot; a snapshot a reader already holds never
//! changes underneath it.

use std::sync::Arc;

use serde::{Serialize, Serializer};
use tokio::sync::watch;

/// Immutable list of per-input percentages (0.0 - 100.0)
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot(Arc<[f32]>);

impl ProgressSnapshot {
    /// A snapshot with `len` slots, all at zero
    pub fn zeroed(len: usize) -> Self {
        Self(vec![0.0; len].into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f32> {
        self.0.get(index).copied()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self::zeroed(0)
    }
}

impl Serialize for ProgressSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

/// Shared, observable progress list for the current batch
///
/// Clones share the same underlying channel. Each job only ever writes
/// its own slot.
#[derive(Debug, Clone)]
pub struct ProgressBoard {
    tx: Arc<watch::Sender<ProgressSnapshot>>,
}

impl ProgressBoard {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ProgressSnapshot::default());
        Self { tx: Arc::new(tx) }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.tx.borrow().clone()
    }

    /// Receive every new snapshot as it is published
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.tx.subscribe()
    }

    /// Replace the list with `len` zeroed slots
    pub fn reset(&self, len: usize) {
        self.tx.send_replace(ProgressSnapshot::zeroed(len));
    }

    /// Empty the list
    pub fn clear(&self) {
        self.reset(0);
    }

    /// Publish a new value for one slot
    ///
    /// Values are clamped to 0..=100 and a slot never moves backwards
    /// within a batch. Out-of-range indices are ignored.
    pub fn update(&self, index: usize, percent: f32) {
        if !percent.is_finite() {
            return;
        }
        let percent = percent.clamp(0.0, 100.0);

        self.tx.send_if_modified(|current| {
            let Some(previous) = current.get(index) else {
                log::debug!(
                    "Ignoring progress for slot {} (batch has {} slots)",
                    index,
                    current.len()
                );
                return false;
            };
            if percent <= previous {
                return false;
            }

            let mut next = current.as_slice().to_vec();
            next[index] = percent;
            *current = ProgressSnapshot(next.into());
            true
        });
    }
}

impl Default for ProgressBoard {
    fn default() -> Self {
        Self::new()
    }
}
