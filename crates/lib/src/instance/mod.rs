//!
//! Base entity state and the edit lifecycle.
//!
//! Every concrete entity type embeds an [`Instance`] and exposes it through the
//! [`Entity`] trait. The generic machinery (collections, dirty scanning, events,
//! deep copy) only ever talks to entities through that trait plus the
//! parameter registry, never through type-specific code.
//!
//! Entities are shared as [`EntityRef`] (`Rc<RefCell<dyn Entity>>`). Lifecycle
//! operations that may call out to a backend or remove the entity from its
//! collection take the `EntityRef` and manage the borrow themselves; callers
//! must not hold a borrow of the entity across those calls.
//!
//! ```text
//!   Infant --begin--> Editing(n) --commit(n=0)--> Clean/Dirty
//!                                  `-- destroying --> Destroyed (freed)
//! ```

use std::{
    any::Any,
    cell::RefCell,
    cmp::Ordering,
    fmt,
    rc::Rc,
};

use tracing::{debug, error, trace, warn};

use crate::{
    Frame, Guid, Timespec,
    backend::{BackendError, BackendRef},
    book::{Book, WeakBook},
    collection::{Collection, WeakCollection},
    event::{Event, EventKind},
    value::Value,
};

pub mod errors;

pub use errors::InstanceError;


/// Dynamic downcasting support for entities.
///
/// Blanket-implemented for every `'static` type; entity authors never
/// implement it by hand.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A registered entity: anything that embeds an [`Instance`].
pub trait Entity: AsAny {
    fn instance(&self) -> &Instance;
    fn instance_mut(&mut self) -> &mut Instance;
}

/// Shared handle to a live entity.
pub type EntityRef = Rc<RefCell<dyn Entity>>;

/// Downcasts a type-erased entity to its concrete type.
pub fn downcast_ref<T: Entity + Any>(entity: &dyn Entity) -> Option<&T> {
    AsAny::as_any(entity).downcast_ref::<T>()
}

pub fn downcast_mut<T: Entity + Any>(entity: &mut dyn Entity) -> Option<&mut T> {
    AsAny::as_any_mut(entity).downcast_mut::<T>()
}

/// Runs `f` against the concrete entity behind `entity`.
///
/// Returns `None` if the entity is of another type or is mutably borrowed.
pub fn with_entity<T: Entity + Any, R>(entity: &EntityRef, f: impl FnOnce(&T) -> R) -> Option<R> {
    let guard = entity.try_borrow().ok()?;
    downcast_ref::<T>(&*guard).map(f)
}

/// Mutable counterpart of [`with_entity`].
pub fn with_entity_mut<T: Entity + Any, R>(
    entity: &EntityRef,
    f: impl FnOnce(&mut T) -> R,
) -> Option<R> {
    let mut guard = entity.try_borrow_mut().ok()?;
    downcast_mut::<T>(&mut *guard).map(f)
}

/// Identifier of `entity`, or `None` while it is mutably borrowed.
pub fn entity_guid(entity: &EntityRef) -> Option<Guid> {
    entity.try_borrow().ok().map(|e| e.instance().guid())
}

/// Type tag of `entity`, or `None` while it is mutably borrowed.
pub fn entity_type(entity: &EntityRef) -> Option<String> {
    entity
        .try_borrow()
        .ok()
        .map(|e| e.instance().e_type().to_string())
}

fn commit_to_backend(
    backend: &BackendRef,
    entity: &EntityRef,
    guid: Guid,
) -> Option<Result<(), BackendError>> {
    let Ok(mut be) = backend.try_borrow_mut() else {
        debug!(guid = %guid, "backend busy, skipping commit notification");
        return None;
    };
    Some(be.commit(entity))
}

/// Outcome of a successful [`Instance::commit_edit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    /// An outer edit level is still open
    Nested,
    /// The outermost edit finished
    Done,
    /// The instance was destroyed and removed from its collection
    Destroyed,
}

/// State shared by every entity.
pub struct Instance {
    guid: Guid,
    e_type: String,
    book: Option<WeakBook>,
    collection: Option<WeakCollection>,
    kvp: Frame,
    edit_level: u32,
    dirty: bool,
    destroying: bool,
    infant: bool,
    freed: bool,
    pending_modify: bool,
    last_update: Timespec,
    version: i32,
    version_check: u32,
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("guid", &self.guid)
            .field("e_type", &self.e_type)
            .field("edit_level", &self.edit_level)
            .field("dirty", &self.dirty)
            .field("destroying", &self.destroying)
            .field("infant", &self.infant)
            .field("freed", &self.freed)
            .finish_non_exhaustive()
    }
}

impl Default for Instance {
    fn default() -> Self {
        Self::new()
    }
}

impl Entity for Instance {
    fn instance(&self) -> &Instance {
        self
    }

    fn instance_mut(&mut self) -> &mut Instance {
        self
    }
}

impl Instance {
    /// Creates detached state with a fresh identifier.
    pub fn new() -> Self {
        Self::with_guid(Guid::new())
    }

    /// Creates detached state with a known identifier, as backends do when
    /// restoring stored entities.
    pub fn with_guid(guid: Guid) -> Self {
        Self {
            guid,
            e_type: String::new(),
            book: None,
            collection: None,
            kvp: Frame::new(),
            edit_level: 0,
            dirty: false,
            destroying: false,
            infant: true,
            freed: false,
            pending_modify: false,
            last_update: Timespec::ZERO,
            version: 0,
            version_check: 0,
        }
    }

    /// Wraps a bare instance as an entity handle.
    pub fn into_entity(self) -> EntityRef {
        Rc::new(RefCell::new(self))
    }

    pub fn guid(&self) -> Guid {
        self.guid
    }

    pub fn e_type(&self) -> &str {
        &self.e_type
    }

    pub(crate) fn set_e_type(&mut self, e_type: &str) {
        self.e_type = e_type.to_string();
    }

    pub fn book(&self) -> Option<Book> {
        self.book.as_ref()?.upgrade()
    }

    /// Attaches the instance to `book`.
    ///
    /// The first assignment wins. Assigning the same book again is a no-op;
    /// pointing an attached instance at a different live book is refused.
    pub fn set_book(&mut self, book: &Book) -> Result<(), InstanceError> {
        if let Some(current) = self.book() {
            if current.ptr_eq(book) {
                return Ok(());
            }
            warn!(guid = %self.guid, "refusing to move instance to another book");
            return Err(InstanceError::BookAlreadySet { guid: self.guid });
        }
        self.book = Some(book.downgrade());
        Ok(())
    }

    pub fn collection(&self) -> Option<Collection> {
        self.collection.as_ref()?.upgrade()
    }

    pub(crate) fn set_collection(&mut self, collection: Option<&Collection>) {
        self.collection = collection.map(Collection::downgrade);
    }

    pub fn kvp(&self) -> &Frame {
        &self.kvp
    }

    pub fn kvp_mut(&mut self) -> &mut Frame {
        &mut self.kvp
    }

    pub fn set_kvp(&mut self, frame: Frame) {
        self.kvp = frame;
    }

    pub fn edit_level(&self) -> u32 {
        self.edit_level
    }

    pub fn is_destroying(&self) -> bool {
        self.destroying
    }

    /// Marks the instance for destruction at its next outermost commit.
    pub fn set_destroying(&mut self, destroying: bool) {
        if self.freed {
            warn!(guid = %self.guid, "set_destroying on freed instance");
            return;
        }
        self.destroying = destroying;
    }

    pub fn is_infant(&self) -> bool {
        self.infant
    }

    pub fn is_freed(&self) -> bool {
        self.freed
    }

    /// The raw dirty flag, ignoring collection state.
    pub fn dirty_flag(&self) -> bool {
        self.dirty
    }

    pub fn set_dirty_flag(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    /// Whether the instance has unsaved changes.
    ///
    /// In normal mode a clean collection means its members are clean too,
    /// whatever their own flag says. In alternate mode only the flag counts.
    pub fn is_dirty(&self) -> bool {
        if !self.dirty {
            return false;
        }
        if self.alternate_dirty_mode() {
            return true;
        }
        self.collection().is_none_or(|c| c.is_dirty())
    }

    /// Records a change.
    ///
    /// In normal mode the owning collection is marked dirty as well. The
    /// modify notification fires now at edit level zero, otherwise at the
    /// matching outermost commit. Handlers fired from here run while the
    /// caller still borrows the entity; [`Instance::mark_dirty`] releases it
    /// first.
    pub fn set_dirty(&mut self) {
        if let Some(event) = self.record_change() {
            self.emit_event(&event);
        }
    }

    /// Like [`set_dirty`](Self::set_dirty), but raises the modify event after
    /// the entity is released, so handlers may look it up and borrow it.
    pub fn mark_dirty(entity: &EntityRef) -> Result<(), InstanceError> {
        let (event, book) = {
            let mut guard = entity.try_borrow_mut().map_err(|_| InstanceError::Busy {
                guid: Guid::null(),
            })?;
            let inst = guard.instance_mut();
            if inst.freed {
                warn!(guid = %inst.guid, e_type = %inst.e_type, "mark_dirty on freed instance");
                return Err(InstanceError::Freed { guid: inst.guid });
            }
            (inst.record_change(), inst.book())
        };
        if let (Some(event), Some(book)) = (event, book) {
            book.runtime().events().emit(&event);
        }
        Ok(())
    }

    /// Sets the dirty state and returns the modify event due now, if any.
    fn record_change(&mut self) -> Option<Event> {
        if self.freed {
            warn!(guid = %self.guid, e_type = %self.e_type, "set_dirty on freed instance");
            return None;
        }
        self.dirty = true;
        if !self.alternate_dirty_mode()
            && let Some(collection) = self.collection()
        {
            collection.mark_dirty();
        }
        if self.edit_level == 0 {
            Some(Event::new(EventKind::Modify, self.guid, self.e_type.clone()))
        } else {
            self.pending_modify = true;
            None
        }
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn last_update(&self) -> Timespec {
        self.last_update
    }

    pub fn set_last_update(&mut self, when: Timespec) {
        self.last_update = when;
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn set_version(&mut self, version: i32) {
        self.version = version;
    }

    pub fn version_check(&self) -> u32 {
        self.version_check
    }

    pub fn set_version_check(&mut self, value: u32) {
        self.version_check = value;
    }

    /// Copies the version stamp (update time, version and check counter).
    pub fn copy_version(&mut self, from: &Instance) {
        self.last_update = from.last_update;
        self.version = from.version;
        self.version_check = from.version_check;
    }

    /// Orders two instances by last update time only.
    ///
    /// A missing instance is earlier than any present one.
    pub fn version_cmp(left: Option<&Instance>, right: Option<&Instance>) -> Ordering {
        left.map(|i| i.last_update)
            .cmp(&right.map(|i| i.last_update))
    }

    pub fn guid_compare(&self, other: &Instance) -> Ordering {
        self.guid.cmp(&other.guid)
    }

    /// Raises an event about this instance on its runtime's bus.
    pub fn emit(&self, kind: EventKind) {
        self.emit_event(&Event::new(kind, self.guid, self.e_type.clone()));
    }

    fn emit_event(&self, event: &Event) {
        if let Some(book) = self.book() {
            book.runtime().events().emit(event);
        }
    }

    pub(crate) fn backend(&self) -> Option<BackendRef> {
        self.book()?.backend()
    }

    fn alternate_dirty_mode(&self) -> bool {
        self.book()
            .is_some_and(|book| book.runtime().alternate_dirty_mode())
    }

    /// Attaches a freshly created entity to `book` as a member of type `e_type`.
    ///
    /// Inserts it into the book's collection for that type, refusing an
    /// identifier already in use, and raises a create event.
    pub fn init_data(entity: &EntityRef, e_type: &str, book: &Book) -> Result<(), InstanceError> {
        let guid = {
            let mut guard = entity
                .try_borrow_mut()
                .map_err(|_| InstanceError::Busy { guid: Guid::null() })?;
            let inst = guard.instance_mut();
            inst.set_book(book)?;
            inst.set_e_type(e_type);
            inst.guid
        };

        let collection = book.get_collection(e_type);
        collection.add(entity)?;
        trace!(guid = %guid, e_type, "instance initialised");

        book.runtime()
            .events()
            .emit(&Event::new(EventKind::Create, guid, e_type));
        Ok(())
    }

    /// Opens an edit bracket.
    ///
    /// The outermost begin is reported to the book's backend. Returns false if
    /// the edit was refused (freed or busy entity).
    pub fn begin_edit(entity: &EntityRef) -> bool {
        let backend = {
            let Ok(mut guard) = entity.try_borrow_mut() else {
                warn!("begin_edit on an entity that is already borrowed");
                return false;
            };
            let inst = guard.instance_mut();
            if inst.freed {
                warn!(guid = %inst.guid, "begin_edit on freed instance");
                return false;
            }
            inst.edit_level += 1;
            if inst.edit_level > 1 {
                return true;
            }
            inst.backend()
        };

        if let Some(backend) = backend {
            match backend.try_borrow_mut() {
                Ok(mut be) => {
                    if let Err(err) = be.begin(entity) {
                        warn!(error = %err, "backend begin failed");
                    }
                }
                Err(_) => debug!("backend busy, skipping begin notification"),
            }
        }
        true
    }

    /// Closes an edit bracket.
    ///
    /// At the outermost level the backend sees the commit, the infant flag is
    /// cleared and any deferred modify event fires. A destroying instance is
    /// removed from its collection and freed instead. If the backend refuses,
    /// the pending destroy is cancelled and the error is returned.
    pub fn commit_edit(entity: &EntityRef) -> Result<Commit, InstanceError> {
        let (guid, backend) = {
            let mut guard = entity.try_borrow_mut().map_err(|_| InstanceError::Busy {
                guid: Guid::null(),
            })?;
            let inst = guard.instance_mut();
            if inst.freed {
                warn!(guid = %inst.guid, "commit_edit on freed instance");
                return Err(InstanceError::Freed { guid: inst.guid });
            }
            if inst.edit_level == 0 {
                error!(guid = %inst.guid, e_type = %inst.e_type, "commit_edit without matching begin_edit");
                return Err(InstanceError::OverCommit { guid: inst.guid });
            }
            inst.edit_level -= 1;
            if inst.edit_level > 0 {
                return Ok(Commit::Nested);
            }
            (inst.guid, inst.backend())
        };

        let committed = backend.and_then(|backend| commit_to_backend(&backend, entity, guid));

        let mut guard = entity
            .try_borrow_mut()
            .map_err(|_| InstanceError::Busy { guid })?;
        let inst = guard.instance_mut();
        match committed {
            Some(Err(source)) => {
                warn!(guid = %guid, error = %source, "backend refused commit");
                inst.destroying = false;
                return Err(InstanceError::CommitFailed { guid, source });
            }
            Some(Ok(())) => inst.dirty = false,
            None => {}
        }
        inst.infant = false;

        if inst.destroying {
            let collection = inst.collection();
            let book = inst.book();
            let e_type = inst.e_type.clone();
            inst.freed = true;
            inst.collection = None;
            drop(guard);

            if let Some(collection) = collection {
                collection.remove_guid(&guid);
            }
            if let Some(book) = book {
                book.runtime()
                    .events()
                    .emit(&Event::new(EventKind::Destroy, guid, e_type));
            }
            debug!(guid = %guid, "instance destroyed");
            return Ok(Commit::Destroyed);
        }

        if inst.pending_modify {
            inst.pending_modify = false;
            let event = Event::new(EventKind::Modify, guid, inst.e_type.clone());
            let book = inst.book();
            drop(guard);
            if let Some(book) = book {
                book.runtime().events().emit(&event);
            }
        }
        Ok(Commit::Done)
    }

    /// Display string from the type's printable hook, if it has one.
    pub fn display_name(entity: &EntityRef) -> Option<String> {
        let book = entity.try_borrow().ok()?.instance().book()?;
        book.runtime().objects().printable(entity)
    }

    /// Every entity in `book` holding a reference to `target` through one of
    /// its registered parameters.
    pub fn referring_objects(book: &Book, target: &EntityRef) -> Vec<EntityRef> {
        let Some(target_guid) = entity_guid(target) else {
            return Vec::new();
        };
        let target_type = entity_type(target).unwrap_or_default();
        let runtime = book.runtime();
        let mut found = Vec::new();

        for e_type in runtime.objects().registered_types() {
            let params: Vec<_> = runtime
                .classes()
                .params(&e_type)
                .into_iter()
                .filter(|p| p.kind().may_refer_to(&target_type))
                .collect();
            if params.is_empty() {
                continue;
            }
            let Some(collection) = book.collection(&e_type) else {
                continue;
            };
            collection.foreach(|candidate| {
                let refers = match candidate.try_borrow() {
                    Ok(guard) => params.iter().any(|param| match param.get(&*guard) {
                        Ok(Value::Entity(Some(r))) => entity_guid(&r) == Some(target_guid),
                        Ok(Value::Collection(members)) => members
                            .iter()
                            .any(|m| entity_guid(m) == Some(target_guid)),
                        _ => false,
                    }),
                    Err(_) => false,
                };
                if refers {
                    found.push(Rc::clone(candidate));
                }
            });
        }
        found
    }
}
