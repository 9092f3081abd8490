//! Sessions: a book bound to a backend.
//!
//! A [`Session`] always has exactly one current [`Book`]. [`begin`] picks a
//! backend provider from the access method of the book id and opens the
//! store; [`load`] fills a fresh book and swaps it in only if the backend
//! succeeded; [`save`] writes the current book back.
//!
//! Every failure is returned as a [`BackendError`] and also kept as the
//! session's last error until the next operation or [`clear_error`].
//!
//! [`begin`]: Session::begin
//! [`load`]: Session::load
//! [`save`]: Session::save
//! [`clear_error`]: Session::clear_error

use std::{fmt, rc::Rc};

use tracing::{debug, info, warn};

use crate::{
    backend::{BackendError, BackendProvider, BackendRef, ErrorCode, LoadType, PercentageFn},
    book::Book,
    constants::ACCESS_METHOD_SEPARATOR,
    runtime::Runtime,
};


/// A book and the backend it is stored through.
pub struct Session {
    runtime: Runtime,
    book: Book,
    book_id: Option<String>,
    backend: Option<BackendRef>,
    provider: Option<Rc<dyn BackendProvider>>,
    last_error: Option<BackendError>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("book", &self.book.guid())
            .field("book_id", &self.book_id)
            .field("backend", &self.backend.is_some())
            .field(
                "provider",
                &self.provider.as_ref().map(|p| p.provider_name().to_string()),
            )
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl Session {
    /// Creates a session holding a new empty book and no backend.
    pub fn new(runtime: &Runtime) -> Self {
        Self {
            runtime: runtime.clone(),
            book: Book::new(runtime),
            book_id: None,
            backend: None,
            provider: None,
            last_error: None,
        }
    }

    /// The current book.
    pub fn book(&self) -> Book {
        self.book.clone()
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// The book id of the open store, if a session has begun.
    pub fn get_url(&self) -> Option<&str> {
        self.book_id.as_deref()
    }

    pub fn backend(&self) -> Option<BackendRef> {
        self.backend.clone()
    }

    /// The provider that created the current backend.
    pub fn provider(&self) -> Option<Rc<dyn BackendProvider>> {
        self.provider.clone()
    }

    /// Code of the last failure, or [`ErrorCode::NoErr`].
    pub fn get_error(&self) -> ErrorCode {
        self.last_error
            .as_ref()
            .map_or(ErrorCode::NoErr, BackendError::code)
    }

    /// Message of the last failure, or an empty string.
    pub fn get_error_message(&self) -> &str {
        self.last_error.as_ref().map_or("", BackendError::message)
    }

    /// Returns the last error code and clears it.
    pub fn pop_error(&mut self) -> ErrorCode {
        let code = self.get_error();
        self.last_error = None;
        code
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    fn push_error(&mut self, err: BackendError) -> BackendError {
        warn!(code = %err.code(), message = err.message(), "session error");
        self.last_error = Some(err.clone());
        err
    }

    fn attach(&mut self, backend: BackendRef, provider: Option<Rc<dyn BackendProvider>>) {
        self.book.set_backend(Some(&backend));
        self.backend = Some(backend);
        self.provider = provider;
    }

    fn detach(&mut self) {
        if let Some(backend) = self.backend.take() {
            match backend.try_borrow_mut() {
                Ok(mut be) => {
                    if let Err(err) = be.session_end() {
                        warn!(error = %err, "backend failed to end session");
                    }
                }
                Err(_) => warn!("backend busy while detaching"),
            }
        }
        self.provider = None;
        self.book.set_backend(None);
    }

    /// Attaches a backend supplied by hand instead of through a provider.
    pub fn set_backend(&mut self, backend: BackendRef) {
        self.detach();
        self.attach(backend, None);
    }

    /// Finds a provider for `access_method` that accepts `book_id` and
    /// attaches a fresh backend from it.
    fn load_backend(
        &mut self,
        access_method: &str,
        book_id: &str,
    ) -> Result<BackendRef, BackendError> {
        for provider in self.runtime.providers() {
            if provider.access_method() != access_method {
                continue;
            }
            if !provider.check_data_type(book_id) {
                debug!(
                    provider = provider.provider_name(),
                    book_id, "provider rejected the data type"
                );
                continue;
            }
            let Some(backend) = provider.backend_new() else {
                debug!(provider = provider.provider_name(), "provider produced no backend");
                continue;
            };
            info!(provider = provider.provider_name(), access_method, "backend attached");
            self.attach(Rc::clone(&backend), Some(provider));
            return Ok(backend);
        }
        Err(self.push_error(BackendError::new(
            ErrorCode::NoHandler,
            format!("failed to load '{access_method}' using access_method"),
        )))
    }

    /// Opens the store named by `book_id`.
    ///
    /// The text before `://` selects the backend provider; an id without it
    /// uses the runtime's default access method. Fails with
    /// [`ErrorCode::Locked`] if this session has already begun, and with
    /// [`ErrorCode::BadUrl`] for an empty id. If the backend refuses to open
    /// the store it stays attached but the session has no book id.
    pub fn begin(
        &mut self,
        book_id: &str,
        ignore_lock: bool,
        create: bool,
        force: bool,
    ) -> Result<(), BackendError> {
        self.clear_error();
        if let Some(current) = &self.book_id {
            let msg = format!("session already begun on '{current}'");
            return Err(self.push_error(BackendError::new(ErrorCode::Locked, msg)));
        }
        if book_id.is_empty() {
            return Err(self.push_error(BackendError::new(
                ErrorCode::BadUrl,
                "no book id given",
            )));
        }

        self.detach();
        let access_method = match book_id.split_once(ACCESS_METHOD_SEPARATOR) {
            Some((method, _)) => method.to_string(),
            None => self.runtime.default_access_method(),
        };
        let backend = self.load_backend(&access_method, book_id)?;
        let begun = backend
            .borrow_mut()
            .session_begin(book_id, ignore_lock, create, force);
        if let Err(err) = begun {
            return Err(self.push_error(err));
        }
        self.book_id = Some(book_id.to_string());
        info!(book_id, "session begun");
        Ok(())
    }

    /// Ends the backend session. The backend stays attached.
    pub fn end(&mut self) {
        if let Some(backend) = &self.backend {
            let ended = match backend.try_borrow_mut() {
                Ok(mut be) => be.session_end(),
                Err(_) => Err(BackendError::new(ErrorCode::Misc, "backend busy")),
            };
            if let Err(err) = ended {
                self.push_error(err);
            }
        }
        if let Some(book_id) = self.book_id.take() {
            info!(book_id = %book_id, "session ended");
        }
    }

    /// Loads the store into a brand-new book.
    ///
    /// On success the new book becomes current and the old one is destroyed.
    /// On failure the new book is destroyed and the current book is untouched.
    pub fn load(&mut self, percentage: Option<PercentageFn>) -> Result<(), BackendError> {
        self.clear_error();
        let Some(backend) = self.backend.clone() else {
            return Err(self.push_error(BackendError::new(
                ErrorCode::NoBackend,
                "no backend to load from",
            )));
        };

        let candidate = Book::new(&self.runtime);
        candidate.set_backend(Some(&backend));
        let loaded = {
            let mut be = backend.borrow_mut();
            be.set_percentage(percentage);
            be.load(&candidate, LoadType::InitialLoad)
        };

        match loaded {
            Ok(()) => {
                let old = std::mem::replace(&mut self.book, candidate);
                old.destroy();
                debug!(book = %self.book.guid(), "loaded book swapped in");
                Ok(())
            }
            Err(err) => {
                candidate.destroy();
                self.book.set_backend(Some(&backend));
                Err(self.push_error(err))
            }
        }
    }

    /// Asks the backend to bring in everything it has not loaded yet.
    pub fn ensure_all_data_loaded(&mut self) -> Result<(), BackendError> {
        self.clear_error();
        let Some(backend) = self.backend.clone() else {
            return Ok(());
        };
        let loaded = backend.borrow_mut().load(&self.book, LoadType::LoadAll);
        loaded.map_err(|err| self.push_error(err))
    }

    /// Replaces a backend that cannot store partial books with one from a
    /// provider that can, reopening the same book id.
    ///
    /// The reopen takes the lock normally: a book held by another session
    /// fails with `Locked` instead of being written over.
    fn switch_to_partial_backend(&mut self) -> Result<(), BackendError> {
        let Some(book_id) = self.book_id.clone() else {
            return Err(self.push_error(BackendError::new(
                ErrorCode::BadUrl,
                "no book id to reopen for a partial book",
            )));
        };
        let candidate = self
            .runtime
            .providers()
            .into_iter()
            .filter(|p| p.partial_book_supported())
            .find_map(|p| p.backend_new().map(|be| (p, be)));
        let Some((provider, backend)) = candidate else {
            return Err(self.push_error(BackendError::new(
                ErrorCode::NoHandler,
                "no backend can save a partial book",
            )));
        };

        info!(provider = provider.provider_name(), "switching backend for partial book");
        self.detach();
        self.attach(Rc::clone(&backend), Some(provider));
        let begun = backend.borrow_mut().session_begin(&book_id, false, true, false);
        begun.map_err(|err| self.push_error(err))
    }

    fn needs_partial_switch(&self) -> bool {
        self.book.is_partial()
            && self.backend.is_some()
            && !self
                .provider
                .as_ref()
                .is_some_and(|p| p.partial_book_supported())
    }

    /// Writes the current book through the backend.
    ///
    /// A partial book whose backend cannot store partial books first moves to
    /// a provider that can.
    pub fn save(&mut self, percentage: Option<PercentageFn>) -> Result<(), BackendError> {
        self.clear_error();
        if self.needs_partial_switch() {
            self.switch_to_partial_backend()?;
        }
        let Some(backend) = self.backend.clone() else {
            return Err(self.push_error(BackendError::new(
                ErrorCode::NoHandler,
                "failed to load backend",
            )));
        };
        self.book.set_backend(Some(&backend));

        let synced = {
            let mut be = backend.borrow_mut();
            be.set_percentage(percentage);
            be.sync(&self.book)
        };
        synced.map_err(|err| self.push_error(err))?;
        debug!(book = %self.book.guid(), "book saved");
        Ok(())
    }

    /// Like [`save`](Self::save) but refuses to overwrite a store that
    /// changed underneath. On failure the book id is cleared so the caller
    /// must choose where to save again.
    pub fn safe_save(&mut self, percentage: Option<PercentageFn>) -> Result<(), BackendError> {
        self.clear_error();
        let Some(backend) = self.backend.clone() else {
            self.book_id = None;
            return Err(self.push_error(BackendError::new(
                ErrorCode::NoHandler,
                "failed to load backend",
            )));
        };
        let synced = {
            let mut be = backend.borrow_mut();
            be.set_percentage(percentage);
            be.safe_sync(&self.book)
        };
        if let Err(err) = synced {
            self.book_id = None;
            return Err(self.push_error(err));
        }
        Ok(())
    }

    /// Exchanges books with `other`; each session's backend follows its new
    /// book.
    pub fn swap_data(&mut self, other: &mut Session) {
        std::mem::swap(&mut self.book, &mut other.book);
        self.book.set_backend(self.backend.as_ref());
        other.book.set_backend(other.backend.as_ref());
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.detach();
        self.book_id = None;
        self.book.destroy();
    }
}
