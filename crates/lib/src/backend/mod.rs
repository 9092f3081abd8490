//! Storage backends.
//!
//! A [`Backend`] moves a [`Book`] to and from some store. The core never
//! interprets the store itself: it opens a session, asks for a load, reports
//! edit brackets on individual entities and asks for a sync.
//!
//! Backends are created by a [`BackendProvider`] registered on the
//! [`Runtime`](crate::Runtime). The session picks the provider whose access
//! method matches the scheme of the book id (`memory://name` has access method
//! `memory`) and which accepts the concrete id.

use std::{cell::RefCell, rc::Rc};

use crate::{book::Book, instance::EntityRef};

pub mod errors;
mod in_memory;

pub use errors::{BackendError, ErrorCode};
pub use in_memory::{MEMORY_ACCESS_METHOD, MemoryBackend, MemoryProvider, MemoryStore};

/// Progress callback: an optional status message and a percentage.
pub type PercentageFn = Rc<dyn Fn(Option<&str>, f64)>;

/// Shared handle to a backend instance.
pub type BackendRef = Rc<RefCell<dyn Backend>>;

/// How much of the stored book a load should bring in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadType {
    /// Whatever the backend considers the working set
    #[default]
    InitialLoad,
    /// Everything, as needed before a save to another store
    LoadAll,
}

/// Storage backend contract.
///
/// Every method reports failure through its return value. Hooks a backend has
/// no use for may keep the default no-op implementation.
pub trait Backend {
    /// Opens the store named by `book_id`.
    fn session_begin(
        &mut self,
        book_id: &str,
        ignore_lock: bool,
        create: bool,
        force: bool,
    ) -> Result<(), BackendError>;

    /// Closes the store and releases any lock.
    fn session_end(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    /// Populates `book` from the store.
    fn load(&mut self, book: &Book, load_type: LoadType) -> Result<(), BackendError>;

    /// Called when an entity's outermost edit begins.
    fn begin(&mut self, _entity: &EntityRef) -> Result<(), BackendError> {
        Ok(())
    }

    /// Called when an entity's outermost edit is committed.
    fn commit(&mut self, _entity: &EntityRef) -> Result<(), BackendError> {
        Ok(())
    }

    /// Writes the whole book to the store.
    fn sync(&mut self, book: &Book) -> Result<(), BackendError>;

    /// Writes the whole book, refusing if the store changed underneath.
    fn safe_sync(&mut self, book: &Book) -> Result<(), BackendError> {
        self.sync(book)
    }

    /// Installs or clears the progress callback used by load and sync.
    fn set_percentage(&mut self, _percentage: Option<PercentageFn>) {}
}

/// Factory for backends of one access method.
pub trait BackendProvider {
    /// Human-readable provider name, for logs.
    fn provider_name(&self) -> &str;

    /// Scheme this provider serves, such as `"file"` or `"memory"`.
    fn access_method(&self) -> &str;

    /// Whether backends from this provider can save a partial book.
    fn partial_book_supported(&self) -> bool {
        false
    }

    /// Whether this provider can open `book_id`.
    fn check_data_type(&self, _book_id: &str) -> bool {
        true
    }

    /// Creates a fresh backend, or `None` if the provider cannot.
    fn backend_new(&self) -> Option<BackendRef>;
}
