//! Filtered projections over a mirror

use super::mirror::Mirror;
use super::{Sink, SinkInput};
use std::fmt;
use std::sync::Arc;

type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Predicate over a mirror's latest snapshot
///
/// `get` filters the current snapshot on every call; nothing is cached. The
/// description only appears in logs and error messages.
pub struct View<T> {
    mirror: Arc<Mirror<T>>,
    predicate: Predicate<T>,
    description: String,
}

pub type SinkView = View<Sink>;
pub type SinkInputView = View<SinkInput>;

impl<T> Clone for View<T> {
    fn clone(&self) -> Self {
        Self {
            mirror: self.mirror.clone(),
            predicate: self.predicate.clone(),
            description: self.description.clone(),
        }
    }
}

impl<T: Clone + Send + Sync> View<T> {
    pub fn new<F>(mirror: Arc<Mirror<T>>, description: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            mirror,
            predicate: Arc::new(predicate),
            description: description.into(),
        }
    }

    /// Entries of the current snapshot matching the predicate
    pub fn get(&self) -> Vec<T> {
        self.mirror
            .get()
            .iter()
            .filter(|item| (self.predicate)(item))
            .cloned()
            .collect()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn mirror(&self) -> &Arc<Mirror<T>> {
        &self.mirror
    }
}

impl<T> fmt::Debug for View<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View").field("description", &self.description).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_view_reflects_latest_refresh() {
        let mirror = Arc::new(Mirror::<u32>::new("numbers"));
        let even = View::new(mirror.clone(), "even numbers", |n: &u32| n % 2 == 0);

        mirror.refresh(vec![1, 2, 3, 4]).await;
        assert_eq!(even.get(), vec![2, 4]);

        mirror.refresh(vec![6, 7]).await;
        assert_eq!(even.get(), vec![6]);
        assert_eq!(even.description(), "even numbers");
    }

    #[tokio::test]
    async fn test_empty_mirror_yields_nothing() {
        let mirror = Arc::new(Mirror::<u32>::new("numbers"));
        let all = View::new(mirror, "all", |_: &u32| true);
        assert!(all.get().is_empty());
    }
}
