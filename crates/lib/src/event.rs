//! Lifecycle notifications.
//!
//! Instances raise an [`Event`] when they are created, modified or destroyed;
//! domain code raises `Add`/`Remove` when it changes membership of its own
//! child lists. Handlers receive the event by value and never a borrow of the
//! entity. The lifecycle raises its events once the entity is released, so a
//! handler may look the entity up and inspect it. The exception is
//! `Instance::set_dirty` called through a live borrow; generic code uses
//! `Instance::mark_dirty` instead.

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
};

use tracing::trace;

use crate::Guid;

/// Kinds of lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Create,
    Modify,
    Destroy,
    Add,
    Remove,
}

/// A single notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    /// Identifier of the entity the event is about
    pub guid: Guid,
    /// Type tag of that entity
    pub e_type: String,
}

impl Event {
    pub fn new(kind: EventKind, guid: Guid, e_type: impl Into<String>) -> Self {
        Self {
            kind,
            guid,
            e_type: e_type.into(),
        }
    }
}

/// Opaque handle returned by [`EventBus::register_handler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

type Handler = Rc<dyn Fn(&Event)>;

/// Dispatches events to registered handlers in registration order.
#[derive(Default)]
pub struct EventBus {
    handlers: RefCell<Vec<(HandlerId, Handler)>>,
    next_id: Cell<u64>,
    suspended: Cell<u32>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.handlers.borrow().len())
            .field("suspended", &self.suspended.get())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_handler(&self, handler: impl Fn(&Event) + 'static) -> HandlerId {
        let id = HandlerId(self.next_id.get() + 1);
        self.next_id.set(id.0);
        self.handlers.borrow_mut().push((id, Rc::new(handler)));
        id
    }

    /// Removes a handler. Returns false if the id is unknown.
    pub fn unregister_handler(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        let before = handlers.len();
        handlers.retain(|(hid, _)| *hid != id);
        before != handlers.len()
    }

    /// Suspends delivery. Calls nest; events raised while suspended are dropped.
    pub fn suspend(&self) {
        self.suspended.set(self.suspended.get() + 1);
    }

    pub fn resume(&self) {
        self.suspended.set(self.suspended.get().saturating_sub(1));
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.get() > 0
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.borrow().len()
    }

    pub fn emit(&self, event: &Event) {
        if self.is_suspended() {
            trace!(kind = ?event.kind, guid = %event.guid, "event dropped while suspended");
            return;
        }
        // Handlers may register or unregister others while running.
        let handlers: Vec<Handler> = self
            .handlers
            .borrow()
            .iter()
            .map(|(_, h)| Rc::clone(h))
            .collect();
        for handler in handlers {
            handler(event);
        }
    }
}
