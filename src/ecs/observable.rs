//! Typed publish/subscribe
//!
//! [`Observable`] is the event primitive entities use for their membership
//! notifications, and that components embed when they want to publish events
//! of their own (a collider announcing a hit, a ball leaving the field).
//!
//! # Example
//!
//! ```ignore
//! let events = Observable::<EntityEvent>::new();
//! let id = events.on(EntityEventKind::EntityAdded, |event| log::info!("{event:?}"));
//! events.emit(&EntityEvent::EntityAdded(child));
//! events.off(id);
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

/// An event that can be published through an [`Observable`].
///
/// The kind is used to route events to listeners registered with
/// [`Observable::on`].
pub trait Event {
    /// Discriminant type, usually a fieldless enum mirroring the event enum.
    type Kind: Copy + Eq + fmt::Debug;

    /// The kind of this event.
    fn kind(&self) -> Self::Kind;
}

/// Identifies a registered listener so it can be removed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener<E> = Rc<dyn Fn(&E)>;

struct Entry<E: Event> {
    id: SubscriptionId,
    /// `None` listens to every kind
    kind: Option<E::Kind>,
    listener: Listener<E>,
}

/// A set of listeners for events of type `E`.
///
/// All methods take `&self`; listeners may subscribe or unsubscribe (including
/// themselves) while an event is being emitted, the change applies to the
/// next emission.
pub struct Observable<E: Event> {
    next_id: Cell<u64>,
    listeners: RefCell<Vec<Entry<E>>>,
}

impl<E: Event> Observable<E> {
    /// Create an observable with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(1),
            listeners: RefCell::new(Vec::new()),
        }
    }

    fn insert(&self, kind: Option<E::Kind>, listener: Listener<E>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().push(Entry { id, kind, listener });
        id
    }

    /// Listen to events of one kind.
    pub fn on(&self, kind: E::Kind, listener: impl Fn(&E) + 'static) -> SubscriptionId {
        self.insert(Some(kind), Rc::new(listener))
    }

    /// Listen to every event regardless of kind.
    pub fn subscribe(&self, listener: impl Fn(&E) + 'static) -> SubscriptionId {
        self.insert(None, Rc::new(listener))
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        match listeners.iter().position(|entry| entry.id == id) {
            Some(index) => {
                listeners.remove(index);
                true
            }
            None => false,
        }
    }

    /// Deliver an event to all matching listeners in registration order.
    ///
    /// Returns the number of listeners that were notified.
    pub fn emit(&self, event: &E) -> usize {
        let kind = event.kind();
        let targets: SmallVec<[Listener<E>; 4]> = self
            .listeners
            .borrow()
            .iter()
            .filter(|entry| entry.kind.is_none_or(|k| k == kind))
            .map(|entry| Rc::clone(&entry.listener))
            .collect();

        for listener in &targets {
            listener(event);
        }
        targets.len()
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Remove every listener.
    pub fn clear(&self) {
        self.listeners.borrow_mut().clear();
    }
}

impl<E: Event> Default for Observable<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> fmt::Debug for Observable<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
