//! Cross-book twins and unresolved references.
//!
//! When an entity is copied into another book the copy is its *twin*. Each
//! destination book remembers, weakly, which local entity is the twin of
//! which foreign one, keyed by (foreign book, foreign identifier). References
//! the copy could not follow are kept as [`EntityReference`] records for
//! later reconciliation.

use std::{
    cell::RefCell,
    collections::HashMap,
    rc::{Rc, Weak},
};

use crate::{
    Guid,
    instance::{Entity, EntityRef},
};

use super::Book;

type WeakEntity = Weak<RefCell<dyn Entity>>;

#[derive(Default)]
pub(crate) struct TwinTable {
    twins: HashMap<(Guid, Guid), WeakEntity>,
}

impl TwinTable {
    fn get(&self, source_book: Guid, source: Guid) -> Option<EntityRef> {
        self.twins.get(&(source_book, source))?.upgrade()
    }

    fn insert(&mut self, source_book: Guid, source: Guid, twin: &EntityRef) {
        self.twins.insert((source_book, source), Rc::downgrade(twin));
    }

    fn live_count(&self) -> usize {
        self.twins.values().filter(|w| w.strong_count() > 0).count()
    }

    pub(crate) fn clear(&mut self) {
        self.twins.clear();
    }
}

/// A reference from a copied entity to one that was not copied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityReference {
    /// Type of the referenced entity
    pub e_type: String,
    /// Identifier of the referenced entity in its own book
    pub ref_guid: Guid,
    /// Parameter on the referring entity that held the reference
    pub param: String,
    /// Identifier of the referring entity in this book
    pub ent_guid: Guid,
}

impl Book {
    /// The local twin of entity `source` from book `source_book`, if alive.
    pub fn twin_of(&self, source_book: Guid, source: Guid) -> Option<EntityRef> {
        self.inner.twins.borrow().get(source_book, source)
    }

    pub(crate) fn record_twin(&self, source_book: Guid, source: Guid, twin: &EntityRef) {
        self.inner.twins.borrow_mut().insert(source_book, source, twin);
    }

    /// Number of twins still alive in this book.
    pub fn twin_count(&self) -> usize {
        self.inner.twins.borrow().live_count()
    }

    pub fn add_reference(&self, reference: EntityReference) {
        self.inner.references.borrow_mut().push(reference);
    }

    /// Unresolved references recorded so far, oldest first.
    pub fn references(&self) -> Vec<EntityReference> {
        self.inner.references.borrow().clone()
    }

    /// Removes and returns the unresolved references.
    pub fn take_references(&self) -> Vec<EntityReference> {
        std::mem::take(&mut *self.inner.references.borrow_mut())
    }
}
