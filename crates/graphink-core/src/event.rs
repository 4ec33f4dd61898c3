//! Synchronous publish/subscribe event dispatch.
//!
//! Every stateful component (model, view, graph facade) owns an
//! [`EventSource`] and fires typed events through it. Dispatch is
//! single-threaded, synchronous, and re-entrant safe: handlers may add or
//! remove listeners, or fire further events, while a dispatch is in
//! progress, because each dispatch iterates over a snapshot of the
//! listener list taken when it starts.

use std::cell::{Cell as StdCell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Implemented by event enums so listeners can filter on a discriminant.
pub trait Event {
    /// The discriminant type used to register interest in a subset of events.
    type Kind: Copy + PartialEq;

    /// The discriminant of this event value.
    fn kind(&self) -> Self::Kind;
}

/// What a handler did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    /// Let default behavior proceed.
    Continue,
    /// Request that the caller skip its default behavior. Cooperative:
    /// remaining listeners are still invoked.
    Consumed,
}

/// Error raised by a listener during dispatch.
pub type ListenerError = Box<dyn std::error::Error>;

/// Result returned by each handler.
pub type HandlerResult = Result<Handled, ListenerError>;

/// Aggregate outcome of one dispatch.
///
/// `consumed` replaces the mutable consumed flag of event-object designs:
/// callers that honor short-circuiting check it after [`EventSource::fire`]
/// returns. A failing listener never blocks delivery to the remaining
/// listeners; all failures are collected here and surfaced together.
#[derive(Debug, Default)]
pub struct Dispatch {
    pub consumed: bool,
    pub errors: Vec<ListenerError>,
}

impl Dispatch {
    /// True if no listener failed.
    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Handle returned by listener registration, used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Handler<E> = Rc<dyn Fn(&E) -> HandlerResult>;

struct Listener<E: Event> {
    id: u64,
    /// `None` listens to every event kind.
    filter: Option<E::Kind>,
    handler: Handler<E>,
}

impl<E: Event> Clone for Listener<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            filter: self.filter,
            handler: Rc::clone(&self.handler),
        }
    }
}

/// An event dispatcher owned by a stateful component.
pub struct EventSource<E: Event> {
    listeners: RefCell<Vec<Listener<E>>>,
    next_id: StdCell<u64>,
}

impl<E: Event> Default for EventSource<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> EventSource<E> {
    pub fn new() -> Self {
        Self {
            listeners: RefCell::new(Vec::new()),
            next_id: StdCell::new(0),
        }
    }

    /// Register a handler for one event kind.
    pub fn add_listener(
        &self,
        kind: E::Kind,
        handler: impl Fn(&E) -> HandlerResult + 'static,
    ) -> ListenerId {
        self.register(Some(kind), Rc::new(handler))
    }

    /// Register a handler invoked for every event kind.
    pub fn add_wildcard_listener(
        &self,
        handler: impl Fn(&E) -> HandlerResult + 'static,
    ) -> ListenerId {
        self.register(None, Rc::new(handler))
    }

    fn register(&self, filter: Option<E::Kind>, handler: Handler<E>) -> ListenerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.listeners.borrow_mut().push(Listener { id, filter, handler });
        ListenerId(id)
    }

    /// Remove a previously registered listener.
    /// Returns false if the id was unknown (e.g. already removed).
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|l| l.id != id.0);
        listeners.len() != before
    }

    /// Number of registered listeners (including wildcards).
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Deliver an event to every matching listener, in registration order.
    ///
    /// The listener list is snapshotted before the first handler runs, so
    /// handlers that add or remove listeners only affect later dispatches.
    pub fn fire(&self, event: &E) -> Dispatch {
        let snapshot: Vec<Listener<E>> = self.listeners.borrow().clone();
        let mut outcome = Dispatch::default();
        for listener in snapshot {
            if let Some(filter) = listener.filter {
                if filter != event.kind() {
                    continue;
                }
            }
            match (listener.handler)(event) {
                Ok(Handled::Consumed) => outcome.consumed = true,
                Ok(Handled::Continue) => {}
                Err(err) => {
                    log::error!("event listener failed: {err}");
                    outcome.errors.push(err);
                }
            }
        }
        outcome
    }
}

impl<E: Event> fmt::Debug for EventSource<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSource")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum TestKind {
        Ping,
        Pong,
    }

    #[derive(Debug)]
    enum TestEvent {
        Ping(u32),
        Pong,
    }

    impl Event for TestEvent {
        type Kind = TestKind;

        fn kind(&self) -> TestKind {
            match self {
                TestEvent::Ping(_) => TestKind::Ping,
                TestEvent::Pong => TestKind::Pong,
            }
        }
    }

    #[test]
    fn test_dispatch_filters_by_kind() {
        let source = EventSource::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let seen2 = Rc::clone(&seen);
        source.add_listener(TestKind::Ping, move |event| {
            if let TestEvent::Ping(n) = event {
                seen2.borrow_mut().push(*n);
            }
            Ok(Handled::Continue)
        });

        source.fire(&TestEvent::Ping(1));
        source.fire(&TestEvent::Pong);
        source.fire(&TestEvent::Ping(2));

        assert_eq!(*seen.borrow(), vec![1, 2]);
    }

    #[test]
    fn test_wildcard_sees_everything() {
        let source = EventSource::new();
        let count = Rc::new(StdCell::new(0));

        let count2 = Rc::clone(&count);
        source.add_wildcard_listener(move |_| {
            count2.set(count2.get() + 1);
            Ok(Handled::Continue)
        });

        source.fire(&TestEvent::Ping(0));
        source.fire(&TestEvent::Pong);
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn test_consumed_does_not_stop_delivery() {
        let source = EventSource::new();
        let count = Rc::new(StdCell::new(0));

        source.add_listener(TestKind::Ping, |_| Ok(Handled::Consumed));
        let count2 = Rc::clone(&count);
        source.add_listener(TestKind::Ping, move |_| {
            count2.set(count2.get() + 1);
            Ok(Handled::Continue)
        });

        let outcome = source.fire(&TestEvent::Ping(0));
        assert!(outcome.consumed);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_failing_listener_is_isolated() {
        let source = EventSource::new();
        let count = Rc::new(StdCell::new(0));

        source.add_listener(TestKind::Ping, |_| Err("boom".into()));
        let count2 = Rc::clone(&count);
        source.add_listener(TestKind::Ping, move |_| {
            count2.set(count2.get() + 1);
            Ok(Handled::Continue)
        });

        let outcome = source.fire(&TestEvent::Ping(0));
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_listener_may_mutate_list_during_dispatch() {
        let source = Rc::new(EventSource::new());
        let count = Rc::new(StdCell::new(0));

        let source2 = Rc::clone(&source);
        let count2 = Rc::clone(&count);
        let id = source.add_listener(TestKind::Ping, move |_| {
            // Registering during dispatch must not affect this dispatch.
            let count3 = Rc::clone(&count2);
            source2.add_listener(TestKind::Ping, move |_| {
                count3.set(count3.get() + 10);
                Ok(Handled::Continue)
            });
            count2.set(count2.get() + 1);
            Ok(Handled::Continue)
        });

        source.fire(&TestEvent::Ping(0));
        assert_eq!(count.get(), 1);

        // The listener added mid-dispatch participates in the next one.
        source.remove_listener(id);
        source.fire(&TestEvent::Ping(0));
        assert_eq!(count.get(), 11);
    }

    #[test]
    fn test_remove_listener() {
        let source = EventSource::new();
        let count = Rc::new(StdCell::new(0));

        let count2 = Rc::clone(&count);
        let id = source.add_listener(TestKind::Ping, move |_| {
            count2.set(count2.get() + 1);
            Ok(Handled::Continue)
        });

        source.fire(&TestEvent::Ping(0));
        assert!(source.remove_listener(id));
        assert!(!source.remove_listener(id));
        source.fire(&TestEvent::Ping(0));
        assert_eq!(count.get(), 1);
    }
}
