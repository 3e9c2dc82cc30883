//! Session event router: ordered subscriber lists, one per event kind.
//!
//! # How dispatch works (for beginners)
//!
//! The host registers closures with `on_receive`, `on_connect` and friends.
//! Each registration returns a [`ListenerId`] that can later be passed to
//! [`EventRouter::unsubscribe`].  During a tick the endpoint hands each
//! [`SessionEvent`] to [`EventRouter::route`], which calls every listener for
//! that event's kind, in registration order, before returning.
//!
//! Listeners return a [`ListenerResult`].  The first `Err` stops the dispatch
//! and comes back to the caller as a [`DispatchError`]; the router does not
//! catch, log or retry listener failures.
//!
//! `route` borrows the router mutably for the whole dispatch, so a listener
//! cannot subscribe or unsubscribe while it is being called.

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

use crate::domain::events::{
    ConnectEvent, DisconnectEvent, ErrorEvent, EventKind, ReceiveEvent, ReceiveUnconnectedEvent,
    SessionEvent,
};

/// Handle returned by every `on_*` registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// A failure raised by a listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Other(Box<dyn StdError + Send + Sync>),
}

impl ListenerError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Wraps any error type, including `anyhow::Error`.
    pub fn other(error: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Other(error.into())
    }
}

pub type ListenerResult = Result<(), ListenerError>;

/// A listener failed while handling an event.
#[derive(Debug, Error)]
#[error("{kind} listener {listener} failed: {source}")]
pub struct DispatchError {
    pub kind: EventKind,
    pub listener: ListenerId,
    #[source]
    pub source: ListenerError,
}

type Listener<E> = Box<dyn FnMut(&E) -> ListenerResult>;

struct Subscribers<E> {
    entries: Vec<(ListenerId, Listener<E>)>,
}

impl<E> Default for Subscribers<E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<E> Subscribers<E> {
    fn push(&mut self, id: ListenerId, listener: Listener<E>) {
        self.entries.push((id, listener));
    }

    fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn dispatch(&mut self, kind: EventKind, event: &E) -> Result<(), DispatchError> {
        for (id, listener) in &mut self.entries {
            listener(event).map_err(|source| DispatchError {
                kind,
                listener: *id,
                source,
            })?;
        }
        Ok(())
    }
}

/// Per-kind listener registry.
#[derive(Default)]
pub struct EventRouter {
    next_id: u64,
    receive: Subscribers<ReceiveEvent>,
    receive_unconnected: Subscribers<ReceiveUnconnectedEvent>,
    error: Subscribers<ErrorEvent>,
    disconnect: Subscribers<DisconnectEvent>,
    connect: Subscribers<ConnectEvent>,
}

impl fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRouter")
            .field("receive", &self.receive.len())
            .field("receive_unconnected", &self.receive_unconnected.len())
            .field("error", &self.error.len())
            .field("disconnect", &self.disconnect.len())
            .field("connect", &self.connect.len())
            .finish()
    }
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn on_receive<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&ReceiveEvent) -> ListenerResult + 'static,
    {
        let id = self.allocate();
        self.receive.push(id, Box::new(listener));
        id
    }

    pub fn on_receive_unconnected<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&ReceiveUnconnectedEvent) -> ListenerResult + 'static,
    {
        let id = self.allocate();
        self.receive_unconnected.push(id, Box::new(listener));
        id
    }

    pub fn on_error<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&ErrorEvent) -> ListenerResult + 'static,
    {
        let id = self.allocate();
        self.error.push(id, Box::new(listener));
        id
    }

    pub fn on_disconnect<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&DisconnectEvent) -> ListenerResult + 'static,
    {
        let id = self.allocate();
        self.disconnect.push(id, Box::new(listener));
        id
    }

    pub fn on_connect<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&ConnectEvent) -> ListenerResult + 'static,
    {
        let id = self.allocate();
        self.connect.push(id, Box::new(listener));
        id
    }

    /// Removes a listener.  Returns `false` if `id` was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.receive.remove(id)
            || self.receive_unconnected.remove(id)
            || self.error.remove(id)
            || self.disconnect.remove(id)
            || self.connect.remove(id)
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        match kind {
            EventKind::Receive => self.receive.len(),
            EventKind::ReceiveUnconnected => self.receive_unconnected.len(),
            EventKind::Error => self.error.len(),
            EventKind::Disconnect => self.disconnect.len(),
            EventKind::Connect => self.connect.len(),
        }
    }

    /// Delivers `event` to every listener of its kind, in registration order.
    ///
    /// # Errors
    ///
    /// Returns the first listener failure; later listeners are not called.
    pub fn route(&mut self, event: &SessionEvent) -> Result<(), DispatchError> {
        let kind = event.kind();
        match event {
            SessionEvent::Receive(e) => self.receive.dispatch(kind, e),
            SessionEvent::ReceiveUnconnected(e) => self.receive_unconnected.dispatch(kind, e),
            SessionEvent::Error(e) => self.error.dispatch(kind, e),
            SessionEvent::Disconnect(e) => self.disconnect.dispatch(kind, e),
            SessionEvent::Connect(e) => self.connect.dispatch(kind, e),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::net::SocketAddr;
    use std::rc::Rc;

    use super::*;
    use crate::domain::session::{
        DeliveryMethod, DisconnectReason, SessionHandle, SessionId, UnconnectedMessageType,
    };

    fn handle(id: u64) -> SessionHandle {
        SessionHandle::new(SessionId(id), "10.1.1.2:9055".parse().unwrap())
    }

    fn connect(id: u64) -> SessionEvent {
        SessionEvent::Connect(ConnectEvent { session: handle(id) })
    }

    #[test]
    fn test_listeners_run_in_registration_order() {
        // Arrange
        let mut router = EventRouter::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for name in ["first", "second", "third"] {
            let log = Rc::clone(&log);
            router.on_connect(move |_| {
                log.borrow_mut().push(name);
                Ok(())
            });
        }

        // Act
        router.route(&connect(1)).unwrap();

        // Assert
        assert_eq!(*log.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_events_reach_only_their_own_kind() {
        // Arrange
        let mut router = EventRouter::new();
        let hits = Rc::new(RefCell::new(Vec::new()));
        let h = Rc::clone(&hits);
        router.on_disconnect(move |e| {
            h.borrow_mut().push(format!("disconnect {}", e.reason));
            Ok(())
        });
        let h = Rc::clone(&hits);
        router.on_receive(move |e| {
            h.borrow_mut().push(format!("receive ch{} {}B", e.channel, e.len()));
            Ok(())
        });

        // Act
        router.route(&connect(1)).unwrap();
        router
            .route(&SessionEvent::Receive(ReceiveEvent::new(
                handle(1),
                3,
                DeliveryMethod::ReliableOrdered,
                vec![1, 2, 3],
            )))
            .unwrap();
        router
            .route(&SessionEvent::Disconnect(DisconnectEvent {
                session: handle(1),
                reason: DisconnectReason::Timeout,
            }))
            .unwrap();

        // Assert
        assert_eq!(*hits.borrow(), vec!["receive ch3 3B", "disconnect timeout"]);
    }

    #[test]
    fn test_event_with_no_listeners_is_a_no_op() {
        let mut router = EventRouter::new();
        let addr: SocketAddr = "10.1.1.9:1234".parse().unwrap();
        let event = SessionEvent::ReceiveUnconnected(ReceiveUnconnectedEvent::new(
            addr,
            UnconnectedMessageType::Basic,
            vec![9],
        ));
        assert!(router.route(&event).is_ok());
    }

    #[test]
    fn test_listener_error_stops_dispatch_and_propagates() {
        // Arrange
        let mut router = EventRouter::new();
        let later_called = Rc::new(RefCell::new(false));
        router.on_connect(|_| Ok(()));
        let failing = router.on_connect(|_| Err(ListenerError::msg("handler exploded")));
        let flag = Rc::clone(&later_called);
        router.on_connect(move |_| {
            *flag.borrow_mut() = true;
            Ok(())
        });

        // Act
        let err = router.route(&connect(4)).unwrap_err();

        // Assert
        assert_eq!(err.kind, EventKind::Connect);
        assert_eq!(err.listener, failing);
        assert_eq!(err.to_string(), format!("connect listener {failing} failed: handler exploded"));
        assert!(!*later_called.borrow());
    }

    #[test]
    fn test_unsubscribe_removes_listener() {
        // Arrange
        let mut router = EventRouter::new();
        let count = Rc::new(RefCell::new(0));
        let c = Rc::clone(&count);
        let id = router.on_connect(move |_| {
            *c.borrow_mut() += 1;
            Ok(())
        });

        // Act
        router.route(&connect(1)).unwrap();
        let removed = router.unsubscribe(id);
        router.route(&connect(2)).unwrap();

        // Assert
        assert!(removed);
        assert!(!router.unsubscribe(id));
        assert_eq!(*count.borrow(), 1);
        assert_eq!(router.listener_count(EventKind::Connect), 0);
    }

    #[test]
    fn test_listener_ids_are_unique_across_kinds() {
        let mut router = EventRouter::new();
        let a = router.on_error(|_| Ok(()));
        let b = router.on_receive(|_| Ok(()));
        let c = router.on_error(|_| Ok(()));
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_eq!(router.listener_count(EventKind::Error), 2);
    }

    #[test]
    fn test_listener_error_wraps_foreign_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err = ListenerError::other(io);
        assert_eq!(err.to_string(), "disk full");
    }
}
