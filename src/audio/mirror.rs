//! In-process copies of externally owned audio state
//!
//! A mirror stores one immutable snapshot behind an `Arc`. Refreshing swaps the
//! whole snapshot at once, so readers see either the old list or the new one.

use super::{Sink, SinkInput};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Notified after a mirror's snapshot was replaced
#[async_trait]
pub trait ChangeObserver: Send + Sync {
    async fn snapshot_changed(&self);
}

/// Wholesale-refreshed snapshot plus its change observers
pub struct Mirror<T> {
    name: &'static str,
    snapshot: RwLock<Arc<[T]>>,
    observers: RwLock<Vec<Arc<dyn ChangeObserver>>>,
}

pub type SinkMirror = Mirror<Sink>;
pub type SinkInputMirror = Mirror<SinkInput>;

impl<T: Send + Sync> Mirror<T> {
    /// Empty mirror
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            snapshot: RwLock::new(Arc::from(Vec::new())),
            observers: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Current snapshot
    pub fn get(&self) -> Arc<[T]> {
        self.snapshot.read().clone()
    }

    /// Replace the snapshot, then notify observers one after the other
    pub async fn refresh(&self, items: Vec<T>) {
        let count = items.len();
        *self.snapshot.write() = Arc::from(items);
        debug!("Refreshed {} mirror ({} entries)", self.name, count);

        // No lock may be held across the awaits below
        let observers = self.observers.read().clone();
        for observer in observers {
            observer.snapshot_changed().await;
        }
    }

    /// Append an observer; observers run in registration order
    pub fn register_on_change(&self, observer: Arc<dyn ChangeObserver>) {
        self.observers.write().push(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }
}
