//!
//! Books: the unit of storage.
//!
//! A [`Book`] owns one [`Collection`] per entity type (created on first use),
//! named counters for human-readable ids, string options, and the session
//! dirty state with its change time and callback. Backends attach to a book
//! weakly; the session owns them.
//!
//! `Book` is a cheap-to-clone handle over shared state. Entities refer back to
//! their book through a [`WeakBook`], so dropping the last `Book` handle
//! closes the book even while entities still exist: it is destroyed as if by
//! [`Book::destroy`], book-end hooks included.

use std::{
    any::Any,
    cell::{Cell, RefCell},
    collections::HashMap,
    fmt,
    rc::{Rc, Weak},
};

use tracing::{debug, warn};

use crate::{
    Frame, Guid, KvpValue, Timespec,
    backend::{Backend, BackendRef},
    collection::Collection,
    constants::{COUNTER_FORMATS, COUNTERS, DEFAULT_COUNTER_FORMAT, OPTIONS},
    instance::EntityRef,
    runtime::Runtime,
};

mod counter;
pub mod errors;
mod twin;

pub use counter::{CounterFormat, validate_counter_format};
pub use errors::BookError;
pub use twin::EntityReference;

use twin::TwinTable;


/// Called with `true` when a clean book becomes dirty and with `false` when
/// a dirty book is marked saved.
pub type DirtyCallback = Rc<dyn Fn(&Book, bool)>;

pub(crate) struct BookInternal {
    guid: Guid,
    runtime: Runtime,
    collections: RefCell<HashMap<String, Collection>>,
    kvp: RefCell<Frame>,
    dirty: Cell<bool>,
    dirty_time: Cell<Timespec>,
    dirty_cb: RefCell<Option<DirtyCallback>>,
    readonly: Cell<bool>,
    partial: Cell<bool>,
    open: Cell<bool>,
    backend: RefCell<Option<Weak<RefCell<dyn Backend>>>>,
    data: RefCell<HashMap<String, Rc<dyn Any>>>,
    twins: RefCell<TwinTable>,
    references: RefCell<Vec<EntityReference>>,
}

/// Handle to a book.
#[derive(Clone)]
pub struct Book {
    inner: Rc<BookInternal>,
}

/// Non-owning reference to a [`Book`].
#[derive(Clone)]
pub struct WeakBook(Weak<BookInternal>);

impl WeakBook {
    pub fn upgrade(&self) -> Option<Book> {
        self.0.upgrade().map(|inner| Book { inner })
    }
}

impl fmt::Debug for WeakBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(book) => write!(f, "WeakBook({})", book.guid()),
            None => f.write_str("WeakBook(<dropped>)"),
        }
    }
}

impl fmt::Debug for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Book")
            .field("guid", &self.inner.guid)
            .field("open", &self.inner.open.get())
            .field("dirty", &self.inner.dirty.get())
            .field("readonly", &self.inner.readonly.get())
            .field("partial", &self.inner.partial.get())
            .finish_non_exhaustive()
    }
}

impl Drop for Book {
    fn drop(&mut self) {
        // Handles upgraded during teardown see the book closed already.
        if Rc::strong_count(&self.inner) == 1 && self.inner.open.get() {
            self.destroy();
        }
    }
}

impl PartialEq for Book {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Book {}

impl Book {
    /// Opens a new, empty book and announces it to every registered type.
    pub fn new(runtime: &Runtime) -> Self {
        let book = Self {
            inner: Rc::new(BookInternal {
                guid: Guid::new(),
                runtime: runtime.clone(),
                collections: RefCell::new(HashMap::new()),
                kvp: RefCell::new(Frame::new()),
                dirty: Cell::new(false),
                dirty_time: Cell::new(Timespec::ZERO),
                dirty_cb: RefCell::new(None),
                readonly: Cell::new(false),
                partial: Cell::new(false),
                open: Cell::new(true),
                backend: RefCell::new(None),
                data: RefCell::new(HashMap::new()),
                twins: RefCell::new(TwinTable::default()),
                references: RefCell::new(Vec::new()),
            }),
        };
        runtime.objects().book_begin(&book);
        debug!(guid = %book.guid(), "book opened");
        book
    }

    pub fn guid(&self) -> Guid {
        self.inner.guid
    }

    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    pub fn downgrade(&self) -> WeakBook {
        WeakBook(Rc::downgrade(&self.inner))
    }

    pub fn ptr_eq(&self, other: &Book) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// False once [`destroy`](Self::destroy) has started.
    pub fn is_open(&self) -> bool {
        self.inner.open.get()
    }

    /// The collection for `e_type`, created empty on first access.
    pub fn get_collection(&self, e_type: &str) -> Collection {
        self.inner
            .collections
            .borrow_mut()
            .entry(e_type.to_string())
            .or_insert_with(|| Collection::new(e_type))
            .clone()
    }

    /// The collection for `e_type` if it has been created.
    pub fn collection(&self, e_type: &str) -> Option<Collection> {
        self.inner.collections.borrow().get(e_type).cloned()
    }

    pub fn collection_count(&self) -> usize {
        self.inner.collections.borrow().len()
    }

    /// Visits every collection in type order.
    pub fn foreach_collection(&self, mut f: impl FnMut(&Collection)) {
        let mut collections: Vec<Collection> =
            self.inner.collections.borrow().values().cloned().collect();
        collections.sort_by(|a, b| a.e_type().cmp(b.e_type()));
        for collection in &collections {
            f(collection);
        }
    }

    pub fn lookup_entity(&self, guid: &Guid, e_type: &str) -> Option<EntityRef> {
        self.collection(e_type)?.lookup(guid)
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// When the book last went from clean to dirty; zero while clean.
    pub fn dirty_time(&self) -> Timespec {
        self.inner.dirty_time.get()
    }

    /// Marks the book as having unsaved changes.
    ///
    /// Only the clean-to-dirty edge stamps the dirty time and calls the
    /// callback; repeated calls while dirty do nothing.
    pub fn mark_dirty(&self) {
        if self.inner.dirty.get() {
            return;
        }
        self.inner.dirty.set(true);
        self.inner.dirty_time.set(self.runtime().now());
        let callback = self.inner.dirty_cb.borrow().clone();
        if let Some(callback) = callback {
            callback(self, true);
        }
    }

    /// Marks the book saved and cleans every type's collection.
    pub fn mark_saved(&self) {
        let was_dirty = self.inner.dirty.replace(false);
        self.inner.dirty_time.set(Timespec::ZERO);
        self.runtime().objects().mark_clean(self);
        if was_dirty {
            let callback = self.inner.dirty_cb.borrow().clone();
            if let Some(callback) = callback {
                callback(self, false);
            }
        }
    }

    /// Whether anything in the book has changed since the last save.
    pub fn session_not_saved(&self) -> bool {
        self.is_dirty() || self.runtime().objects().is_dirty(self)
    }

    pub fn set_dirty_cb(&self, callback: impl Fn(&Book, bool) + 'static) {
        *self.inner.dirty_cb.borrow_mut() = Some(Rc::new(callback));
    }

    pub fn clear_dirty_cb(&self) {
        *self.inner.dirty_cb.borrow_mut() = None;
    }

    pub fn mark_readonly(&self) {
        self.inner.readonly.set(true);
    }

    pub fn is_readonly(&self) -> bool {
        self.inner.readonly.get()
    }

    /// Flags the book as holding only part of its data, as after a copy.
    pub fn set_partial(&self, partial: bool) {
        self.inner.partial.set(partial);
    }

    pub fn is_partial(&self) -> bool {
        self.inner.partial.get()
    }

    pub fn set_backend(&self, backend: Option<&BackendRef>) {
        *self.inner.backend.borrow_mut() = backend.map(Rc::downgrade);
    }

    pub fn backend(&self) -> Option<BackendRef> {
        self.inner.backend.borrow().as_ref()?.upgrade()
    }

    /// Stores arbitrary per-book data under `key`.
    pub fn set_data(&self, key: &str, data: Rc<dyn Any>) {
        self.inner.data.borrow_mut().insert(key.to_string(), data);
    }

    pub fn get_data(&self, key: &str) -> Option<Rc<dyn Any>> {
        self.inner.data.borrow().get(key).cloned()
    }

    /// A copy of the book's own frame (counters, formats, options).
    pub fn kvp(&self) -> Frame {
        self.inner.kvp.borrow().clone()
    }

    /// Replaces the book's frame, as backends do when loading.
    pub fn set_kvp(&self, frame: Frame) {
        *self.inner.kvp.borrow_mut() = frame;
    }

    /// Sets or, with `None`, removes the option at `path` and marks the book
    /// dirty.
    pub fn set_option(&self, path: &str, value: Option<KvpValue>) {
        let full = format!("{OPTIONS}/{path}");
        {
            let mut kvp = self.inner.kvp.borrow_mut();
            match value {
                Some(value) => {
                    kvp.set(&full, value);
                }
                None => {
                    kvp.remove(&full);
                }
            }
        }
        self.mark_dirty();
    }

    pub fn get_option(&self, path: &str) -> Option<KvpValue> {
        self.inner
            .kvp
            .borrow()
            .get(&format!("{OPTIONS}/{path}"))
            .cloned()
    }

    pub fn set_string_option(&self, name: &str, value: Option<&str>) {
        self.set_option(name, value.map(KvpValue::from));
    }

    pub fn get_string_option(&self, name: &str) -> Option<String> {
        self.get_option(name)?.as_str().map(str::to_string)
    }

    fn check_counter_name(name: &str) -> Result<(), BookError> {
        if name.is_empty() {
            warn!("empty counter name");
            return Err(BookError::EmptyCounterName);
        }
        Ok(())
    }

    /// Current value of the named counter; zero if never incremented.
    pub fn get_counter(&self, name: &str) -> Result<i64, BookError> {
        Self::check_counter_name(name)?;
        Ok(self
            .inner
            .kvp
            .borrow()
            .get(&format!("{COUNTERS}/{name}"))
            .and_then(KvpValue::as_int64)
            .unwrap_or(0))
    }

    /// Increments the named counter and returns the new value rendered with
    /// the counter's format. Marks the book dirty.
    pub fn increment_and_format_counter(&self, name: &str) -> Result<String, BookError> {
        let next = self
            .get_counter(name)?
            .checked_add(1)
            .ok_or_else(|| BookError::CounterOverflow {
                name: name.to_string(),
            })?;
        self.inner
            .kvp
            .borrow_mut()
            .set(&format!("{COUNTERS}/{name}"), next);
        self.mark_dirty();

        let format = self.get_counter_format(name)?;
        Ok(CounterFormat::parse(&format)?.format(next))
    }

    /// The format for the named counter.
    ///
    /// An invalid stored format is logged and replaced by the default.
    pub fn get_counter_format(&self, name: &str) -> Result<String, BookError> {
        Self::check_counter_name(name)?;
        let stored = self
            .inner
            .kvp
            .borrow()
            .get(&format!("{COUNTER_FORMATS}/{name}"))
            .and_then(KvpValue::as_str)
            .map(str::to_string);
        if let Some(format) = stored {
            match validate_counter_format(&format) {
                Ok(()) => return Ok(format),
                Err(err) => warn!(counter = name, error = %err, "ignoring invalid counter format"),
            }
        }
        Ok(self.default_counter_format())
    }

    /// Stores a format for the named counter, or clears it with `None`.
    pub fn set_counter_format(&self, name: &str, format: Option<&str>) -> Result<(), BookError> {
        Self::check_counter_name(name)?;
        let path = format!("{COUNTER_FORMATS}/{name}");
        match format {
            Some(format) => {
                validate_counter_format(format)?;
                self.inner.kvp.borrow_mut().set(&path, format);
            }
            None => {
                self.inner.kvp.borrow_mut().remove(&path);
            }
        }
        self.mark_dirty();
        Ok(())
    }

    fn default_counter_format(&self) -> String {
        let configured = self.runtime().default_counter_format();
        match validate_counter_format(&configured) {
            Ok(()) => configured,
            Err(_) => DEFAULT_COUNTER_FORMAT.to_string(),
        }
    }

    /// Closes the book.
    ///
    /// Every registered type's `book_end` hook runs first, then all
    /// collections are released. Calling it again does nothing.
    pub fn destroy(&self) {
        if !self.inner.open.replace(false) {
            return;
        }
        self.runtime().objects().book_end(self);

        let collections: Vec<Collection> = self
            .inner
            .collections
            .borrow_mut()
            .drain()
            .map(|(_, c)| c)
            .collect();
        for collection in &collections {
            collection.clear();
        }
        self.inner.twins.borrow_mut().clear();
        self.inner.references.borrow_mut().clear();
        self.inner.data.borrow_mut().clear();
        *self.inner.backend.borrow_mut() = None;
        debug!(guid = %self.guid(), "book destroyed");
    }
}
