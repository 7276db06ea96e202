//! Change notification for UI bindings.
//!
//! Models and collections own an [`Emitter`] and fire an event after each
//! completed mutation. Listeners run synchronously, in subscription order.

use crate::model::Attributes;

/// Handle returned by [`Emitter::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener<E> = Box<dyn Fn(&E) + Send + Sync>;

pub struct Emitter<E> {
    listeners: Vec<(SubscriptionId, Listener<E>)>,
    next_id: u64,
}

impl<E> Emitter<E> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            next_id: 0,
        }
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    pub fn emit(&self, event: &E) {
        for (_, listener) in &self.listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl<E> Default for Emitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for Emitter<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Fired by a `Model` after a mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    /// A `set` applied these keys and values.
    Change { changed: Attributes },
    Unset { key: String },
    Clear,
    /// A server response was merged by `save`.
    Sync,
}

/// Fired by a `Collection` after a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionEvent {
    /// A model landed at `index` after sorting.
    Add { index: usize },
    Reset { len: usize },
    Remove { count: usize },
    Sort,
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn listeners_receive_events_until_unsubscribed() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut emitter = Emitter::<CollectionEvent>::new();
        let counter = Arc::clone(&hits);
        let id = emitter.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        emitter.emit(&CollectionEvent::Sort);
        emitter.emit(&CollectionEvent::Reset { len: 0 });
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        assert!(emitter.unsubscribe(id));
        assert!(!emitter.unsubscribe(id));
        emitter.emit(&CollectionEvent::Sort);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(emitter.listener_count(), 0);
    }

    #[test]
    fn ids_are_unique() {
        let mut emitter = Emitter::<ModelEvent>::new();
        let a = emitter.subscribe(|_| {});
        let b = emitter.subscribe(|_| {});
        assert_ne!(a, b);
    }
}
