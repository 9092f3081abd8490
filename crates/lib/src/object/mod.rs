//! Object registry.
//!
//! One [`ObjectDescriptor`] per entity type supplies the lifecycle hooks the
//! generic machinery needs: how to create an instance, what to do when a book
//! opens or closes, how to scan a collection for unsaved changes, how to
//! enumerate its members and how to print one.
//!
//! The registry also tracks the open books so that a type registered late
//! still sees `book_begin` for every book that already exists.

use std::{
    any::Any,
    cell::RefCell,
    cmp::Ordering,
    collections::HashMap,
    fmt,
    rc::Rc,
};

use tracing::{debug, info, warn};

use crate::{
    Guid,
    book::{Book, WeakBook},
    collection::Collection,
    instance::{Entity, EntityRef, Instance, downcast_ref},
};

pub mod errors;

pub use errors::ObjectError;

/// Builds a concrete entity around prepared instance state.
///
/// The hook must not attach the entity to the book; the registry does that.
pub type CreateFn = Rc<dyn Fn(&Book, Instance) -> Option<EntityRef>>;
pub type BookHook = Rc<dyn Fn(&Book)>;
pub type DirtyFn = Rc<dyn Fn(&Collection) -> bool>;
pub type CleanFn = Rc<dyn Fn(&Collection)>;
pub type ForeachFn = Rc<dyn Fn(&Collection, &mut dyn FnMut(&EntityRef))>;
pub type PrintableFn = Rc<dyn Fn(&dyn Entity) -> Option<String>>;
pub type VersionCmpFn = Rc<dyn Fn(&dyn Entity, &dyn Entity) -> Ordering>;

/// Lifecycle hooks for one entity type.
#[derive(Clone)]
pub struct ObjectDescriptor {
    e_type: String,
    type_label: Option<String>,
    create: Option<CreateFn>,
    book_begin: Option<BookHook>,
    book_end: Option<BookHook>,
    is_dirty: Option<DirtyFn>,
    mark_clean: Option<CleanFn>,
    foreach: Option<ForeachFn>,
    printable: Option<PrintableFn>,
    version_cmp: Option<VersionCmpFn>,
}

impl fmt::Debug for ObjectDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectDescriptor")
            .field("e_type", &self.e_type)
            .field("type_label", &self.type_label)
            .field("create", &self.create.is_some())
            .field("foreach", &self.foreach.is_some())
            .finish_non_exhaustive()
    }
}

impl ObjectDescriptor {
    pub fn new(e_type: impl Into<String>) -> Self {
        Self {
            e_type: e_type.into(),
            type_label: None,
            create: None,
            book_begin: None,
            book_end: None,
            is_dirty: None,
            mark_clean: None,
            foreach: None,
            printable: None,
            version_cmp: None,
        }
    }

    pub fn with_type_label(mut self, label: impl Into<String>) -> Self {
        self.type_label = Some(label.into());
        self
    }

    pub fn with_create(
        mut self,
        create: impl Fn(&Book, Instance) -> Option<EntityRef> + 'static,
    ) -> Self {
        self.create = Some(Rc::new(create));
        self
    }

    pub fn with_book_begin(mut self, hook: impl Fn(&Book) + 'static) -> Self {
        self.book_begin = Some(Rc::new(hook));
        self
    }

    pub fn with_book_end(mut self, hook: impl Fn(&Book) + 'static) -> Self {
        self.book_end = Some(Rc::new(hook));
        self
    }

    pub fn with_is_dirty(mut self, hook: impl Fn(&Collection) -> bool + 'static) -> Self {
        self.is_dirty = Some(Rc::new(hook));
        self
    }

    pub fn with_mark_clean(mut self, hook: impl Fn(&Collection) + 'static) -> Self {
        self.mark_clean = Some(Rc::new(hook));
        self
    }

    pub fn with_foreach(
        mut self,
        hook: impl Fn(&Collection, &mut dyn FnMut(&EntityRef)) + 'static,
    ) -> Self {
        self.foreach = Some(Rc::new(hook));
        self
    }

    /// Display hook written against the concrete type.
    pub fn with_printable<T: Entity + Any>(mut self, hook: impl Fn(&T) -> String + 'static) -> Self {
        self.printable = Some(Rc::new(move |entity: &dyn Entity| {
            downcast_ref::<T>(entity).map(&hook)
        }));
        self
    }

    pub fn with_version_cmp(
        mut self,
        hook: impl Fn(&dyn Entity, &dyn Entity) -> Ordering + 'static,
    ) -> Self {
        self.version_cmp = Some(Rc::new(hook));
        self
    }

    /// Installs the standard dirty, clean and foreach hooks that work on the
    /// collection directly.
    pub fn with_collection_hooks(self) -> Self {
        self.with_is_dirty(Collection::is_dirty)
            .with_mark_clean(Collection::mark_clean)
            .with_foreach(|collection, f| collection.foreach(f))
    }

    pub fn e_type(&self) -> &str {
        &self.e_type
    }

    pub fn type_label(&self) -> Option<&str> {
        self.type_label.as_deref()
    }

    pub fn has_create(&self) -> bool {
        self.create.is_some()
    }

    pub fn has_foreach(&self) -> bool {
        self.foreach.is_some()
    }
}

/// Registry of object descriptors and open books.
#[derive(Default)]
pub struct ObjectRegistry {
    descriptors: RefCell<Vec<Rc<ObjectDescriptor>>>,
    books: RefCell<Vec<WeakBook>>,
    backend_data: RefCell<HashMap<(String, String), Rc<dyn Any>>>,
}

impl fmt::Debug for ObjectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRegistry")
            .field("types", &self.registered_types())
            .field("books", &self.books.borrow().len())
            .finish()
    }
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> Vec<Rc<ObjectDescriptor>> {
        self.descriptors.borrow().clone()
    }

    /// Registers a descriptor.
    ///
    /// A second descriptor for the same type is refused and the first one
    /// stays. On success the new type's `book_begin` runs for every open book.
    pub fn register(&self, descriptor: ObjectDescriptor) -> Result<(), ObjectError> {
        if descriptor.e_type.is_empty() {
            return Err(ObjectError::EmptyTypeName);
        }
        if self.lookup(&descriptor.e_type).is_some() {
            warn!(e_type = %descriptor.e_type, "object type already registered");
            return Err(ObjectError::DuplicateType {
                e_type: descriptor.e_type,
            });
        }
        let descriptor = Rc::new(descriptor);
        self.descriptors.borrow_mut().push(Rc::clone(&descriptor));
        info!(e_type = %descriptor.e_type, "registered object type");

        if let Some(hook) = &descriptor.book_begin {
            for book in self.open_books() {
                hook(&book);
            }
        }
        Ok(())
    }

    pub fn lookup(&self, e_type: &str) -> Option<Rc<ObjectDescriptor>> {
        self.descriptors
            .borrow()
            .iter()
            .find(|d| d.e_type == e_type)
            .cloned()
    }

    /// Registered type tags in registration order.
    pub fn registered_types(&self) -> Vec<String> {
        self.descriptors
            .borrow()
            .iter()
            .map(|d| d.e_type.clone())
            .collect()
    }

    pub fn type_label(&self, e_type: &str) -> Option<String> {
        self.lookup(e_type)?.type_label.clone()
    }

    /// Books currently open under this registry.
    pub fn open_books(&self) -> Vec<Book> {
        let mut books = self.books.borrow_mut();
        books.retain(|weak| weak.upgrade().is_some());
        books.iter().filter_map(WeakBook::upgrade).collect()
    }

    /// Records a new book and runs every `book_begin` hook on it.
    pub(crate) fn book_begin(&self, book: &Book) {
        self.books.borrow_mut().push(book.downgrade());
        for descriptor in self.snapshot() {
            if let Some(hook) = &descriptor.book_begin {
                hook(book);
            }
        }
    }

    /// Runs every `book_end` hook on `book` and forgets it.
    pub(crate) fn book_end(&self, book: &Book) {
        for descriptor in self.snapshot() {
            if let Some(hook) = &descriptor.book_end {
                hook(book);
            }
        }
        self.books
            .borrow_mut()
            .retain(|weak| weak.upgrade().is_some_and(|b| !b.ptr_eq(book)));
    }

    /// True as soon as one type reports its collection in `book` dirty.
    pub fn is_dirty(&self, book: &Book) -> bool {
        for descriptor in self.snapshot() {
            let (Some(hook), Some(collection)) =
                (&descriptor.is_dirty, book.collection(&descriptor.e_type))
            else {
                continue;
            };
            if hook(&collection) {
                debug!(e_type = %descriptor.e_type, "collection reports unsaved changes");
                return true;
            }
        }
        false
    }

    /// Runs every type's `mark_clean` hook on its collection in `book`.
    pub fn mark_clean(&self, book: &Book) {
        for descriptor in self.snapshot() {
            if let (Some(hook), Some(collection)) =
                (&descriptor.mark_clean, book.collection(&descriptor.e_type))
            {
                hook(&collection);
            }
        }
    }

    /// Creates and attaches a new entity of `e_type` in `book`.
    pub fn new_instance(&self, e_type: &str, book: &Book) -> Result<EntityRef, ObjectError> {
        self.new_instance_with_guid(e_type, book, Guid::new())
    }

    /// Like [`new_instance`](Self::new_instance) with a caller-chosen
    /// identifier, for restoring stored entities.
    pub fn new_instance_with_guid(
        &self,
        e_type: &str,
        book: &Book,
        guid: Guid,
    ) -> Result<EntityRef, ObjectError> {
        let descriptor = self.lookup(e_type).ok_or_else(|| ObjectError::UnknownType {
            e_type: e_type.to_string(),
        })?;
        let create = descriptor
            .create
            .clone()
            .ok_or_else(|| ObjectError::NoCreateHook {
                e_type: e_type.to_string(),
            })?;
        let entity = create(book, Instance::with_guid(guid)).ok_or_else(|| {
            ObjectError::CreateFailed {
                e_type: e_type.to_string(),
            }
        })?;
        Instance::init_data(&entity, e_type, book)?;
        Ok(entity)
    }

    /// Display string for `entity` from its type's printable hook.
    pub fn printable(&self, entity: &EntityRef) -> Option<String> {
        let guard = entity.try_borrow().ok()?;
        let descriptor = self.lookup(guard.instance().e_type())?;
        let hook = descriptor.printable.as_ref()?;
        hook(&*guard)
    }

    /// Compares two entities' versions through the type hook, falling back to
    /// last update time.
    pub fn version_cmp(&self, a: &EntityRef, b: &EntityRef) -> Ordering {
        let (Ok(a), Ok(b)) = (a.try_borrow(), b.try_borrow()) else {
            return Ordering::Equal;
        };
        let hook = self
            .lookup(a.instance().e_type())
            .and_then(|d| d.version_cmp.clone());
        match hook {
            Some(hook) => hook(&*a, &*b),
            None => Instance::version_cmp(Some(a.instance()), Some(b.instance())),
        }
    }

    /// Visits every live entity of `e_type` in `book` through the type's
    /// foreach hook.
    pub fn foreach(
        &self,
        e_type: &str,
        book: &Book,
        mut f: impl FnMut(&EntityRef),
    ) -> Result<(), ObjectError> {
        let descriptor = self.lookup(e_type).ok_or_else(|| ObjectError::UnknownType {
            e_type: e_type.to_string(),
        })?;
        let hook = descriptor
            .foreach
            .as_ref()
            .ok_or_else(|| ObjectError::NoForeachHook {
                e_type: e_type.to_string(),
            })?;
        if let Some(collection) = book.collection(e_type) {
            hook(&collection, &mut f);
        }
        Ok(())
    }

    pub fn foreach_type(&self, mut f: impl FnMut(&ObjectDescriptor)) {
        for descriptor in self.snapshot() {
            f(&descriptor);
        }
    }

    /// Whether `e_type` supports generic creation and enumeration.
    pub fn compliance(&self, e_type: &str) -> bool {
        let Some(descriptor) = self.lookup(e_type) else {
            warn!(e_type, "object type not registered");
            return false;
        };
        if descriptor.create.is_none() || descriptor.foreach.is_none() {
            warn!(e_type, "object type lacks create or foreach");
            return false;
        }
        true
    }

    pub fn register_backend_data(
        &self,
        e_type: &str,
        backend_name: &str,
        data: Rc<dyn Any>,
    ) -> Result<(), ObjectError> {
        if e_type.is_empty() {
            return Err(ObjectError::EmptyTypeName);
        }
        if backend_name.is_empty() {
            return Err(ObjectError::EmptyBackendName);
        }
        self.backend_data
            .borrow_mut()
            .insert((e_type.to_string(), backend_name.to_string()), data);
        Ok(())
    }

    pub fn lookup_backend_data(&self, e_type: &str, backend_name: &str) -> Option<Rc<dyn Any>> {
        if e_type.is_empty() || backend_name.is_empty() {
            return None;
        }
        self.backend_data
            .borrow()
            .get(&(e_type.to_string(), backend_name.to_string()))
            .cloned()
    }
}
