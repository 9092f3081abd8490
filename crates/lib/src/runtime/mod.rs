//! The runtime context.
//!
//! A [`Runtime`] owns everything that would otherwise be process-global: the
//! parameter and object registries, the event bus, the registered backend
//! providers, the clock and the configuration. Books hold their runtime, and
//! separate runtimes never see each other's types or books.
//!
//! ```
//! use qof::{Book, Runtime};
//!
//! let runtime = Runtime::new();
//! let book = Book::new(&runtime);
//! assert_eq!(runtime.open_books().len(), 1);
//! book.destroy();
//! assert!(runtime.open_books().is_empty());
//! ```

use std::{cell::RefCell, fmt, rc::Rc};

use tracing::info;

use crate::{
    Timespec,
    backend::BackendProvider,
    book::Book,
    class::ClassRegistry,
    clock::{Clock, SystemClock},
    event::EventBus,
    object::ObjectRegistry,
};

mod config;

pub use config::RuntimeConfig;

struct RuntimeInternal {
    config: RefCell<RuntimeConfig>,
    classes: ClassRegistry,
    objects: ObjectRegistry,
    events: EventBus,
    providers: RefCell<Vec<Rc<dyn BackendProvider>>>,
    clock: Rc<dyn Clock>,
}

/// Shared handle to a runtime context. Cloning is cheap.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInternal>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &*self.inner.config.borrow())
            .field("classes", &self.inner.classes)
            .field("objects", &self.inner.objects)
            .field("providers", &self.inner.providers.borrow().len())
            .field("clock", &self.inner.clock)
            .finish()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::with_clock(config, Rc::new(SystemClock))
    }

    /// Creates a runtime reading time from `clock`.
    pub fn with_clock(config: RuntimeConfig, clock: Rc<dyn Clock>) -> Self {
        info!(
            alternate_dirty_mode = config.alternate_dirty_mode,
            access_method = %config.default_access_method,
            "runtime initialised"
        );
        Self {
            inner: Rc::new(RuntimeInternal {
                config: RefCell::new(config),
                classes: ClassRegistry::new(),
                objects: ObjectRegistry::new(),
                events: EventBus::new(),
                providers: RefCell::new(Vec::new()),
                clock,
            }),
        }
    }

    pub fn classes(&self) -> &ClassRegistry {
        &self.inner.classes
    }

    pub fn objects(&self) -> &ObjectRegistry {
        &self.inner.objects
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// A copy of the current configuration.
    pub fn config(&self) -> RuntimeConfig {
        self.inner.config.borrow().clone()
    }

    pub fn alternate_dirty_mode(&self) -> bool {
        self.inner.config.borrow().alternate_dirty_mode
    }

    pub fn set_alternate_dirty_mode(&self, enabled: bool) {
        self.inner.config.borrow_mut().alternate_dirty_mode = enabled;
    }

    pub fn default_access_method(&self) -> String {
        self.inner.config.borrow().default_access_method.clone()
    }

    pub fn default_counter_format(&self) -> String {
        self.inner.config.borrow().default_counter_format.clone()
    }

    /// Adds a backend provider. Later registrations are consulted first.
    pub fn register_provider(&self, provider: Rc<dyn BackendProvider>) {
        info!(
            provider = provider.provider_name(),
            access_method = provider.access_method(),
            "registered backend provider"
        );
        self.inner.providers.borrow_mut().insert(0, provider);
    }

    /// Registered providers, most recent first.
    pub fn providers(&self) -> Vec<Rc<dyn BackendProvider>> {
        self.inner.providers.borrow().clone()
    }

    pub fn clear_providers(&self) {
        self.inner.providers.borrow_mut().clear();
    }

    pub fn open_books(&self) -> Vec<Book> {
        self.inner.objects.open_books()
    }

    pub fn clock(&self) -> Rc<dyn Clock> {
        Rc::clone(&self.inner.clock)
    }

    pub fn now(&self) -> Timespec {
        self.inner.clock.now()
    }

    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}
