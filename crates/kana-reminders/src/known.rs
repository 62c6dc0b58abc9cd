//! The process-local, always-sorted list of upcoming events.

use std::sync::Arc;

use tokio::sync::watch;

use kana_types::{CatalogId, Event};

/// Shared handle to the Known Event List.
///
/// Each update swaps in a whole new list; readers hold an `Arc` snapshot and
/// never observe a partially written list.
#[derive(Clone)]
pub struct KnownEvents {
    tx: Arc<watch::Sender<Arc<Vec<Event>>>>,
}

impl KnownEvents {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(Vec::new()));
        Self { tx: Arc::new(tx) }
    }

    /// Current list, ascending by premiere.
    pub fn snapshot(&self) -> Arc<Vec<Event>> {
        self.tx.borrow().clone()
    }

    /// Replace the list and return the one it superseded.
    pub fn replace(&self, mut events: Vec<Event>) -> Arc<Vec<Event>> {
        events.sort_by_key(|e| e.premiere_at);
        self.tx.send_replace(Arc::new(events))
    }

    /// Receive a notification whenever the list is replaced.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<Event>>> {
        self.tx.subscribe()
    }

    pub fn contains_catalog(&self, catalog_id: CatalogId) -> bool {
        self.tx
            .borrow()
            .iter()
            .any(|e| e.catalog_id == Some(catalog_id))
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for KnownEvents {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::event_at;

    #[test]
    fn test_replace_sorts_by_premiere() {
        let known = KnownEvents::new();
        known.replace(vec![
            event_at(Some(3), "C", 90),
            event_at(Some(1), "A", 10),
            event_at(Some(2), "B", 30),
        ]);
        let titles: Vec<_> = known
            .snapshot()
            .iter()
            .map(|e| e.title.romaji.clone())
            .collect();
        assert_eq!(titles, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_replace_returns_previous_and_keeps_old_snapshot() {
        let known = KnownEvents::new();
        known.replace(vec![event_at(Some(1), "A", 10)]);
        let held = known.snapshot();

        let previous = known.replace(vec![event_at(Some(2), "B", 20)]);
        assert_eq!(previous.len(), 1);
        assert_eq!(previous[0].title.romaji, "A");
        // A reader holding the old snapshot is unaffected by the swap.
        assert_eq!(held[0].title.romaji, "A");
        assert_eq!(known.snapshot()[0].title.romaji, "B");
    }

    #[test]
    fn test_contains_catalog() {
        let known = KnownEvents::new();
        assert!(known.is_empty());
        known.replace(vec![event_at(Some(7), "A", 10), event_at(None, "B", 20)]);
        assert!(known.contains_catalog(7));
        assert!(!known.contains_catalog(8));
        assert_eq!(known.len(), 2);
    }

    #[tokio::test]
    async fn test_subscribe_sees_replacement() {
        let known = KnownEvents::new();
        let mut rx = known.subscribe();
        known.replace(vec![event_at(Some(1), "A", 10)]);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().len(), 1);
    }
}
