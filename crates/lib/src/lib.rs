//!
//! QOF: a reflective object runtime for book-scoped entities.
//!
//! Code built on this crate registers its entity types at start-up and from
//! then on the generic machinery works on any of them without knowing their
//! layout.
//!
//! ## Core Concepts
//!
//! * **Runtime (`runtime::Runtime`)**: The context every book belongs to. It owns the registries, the event bus, the configuration and the clock.
//! * **Instances (`instance::Instance`)**: The base state every entity embeds: identifier, owning book and collection, extension frame, and the edit/dirty lifecycle.
//! * **Parameters (`class::ClassRegistry`)**: Per-type tables of named, typed getters and setters, used for generic access without compile-time knowledge of the entity.
//! * **Objects (`object::ObjectRegistry`)**: Per-type descriptors with the create, foreach, dirty and book lifecycle hooks.
//! * **Books (`book::Book`)**: A self-contained data set holding one collection per entity type, plus counters, options and dirty tracking.
//! * **Copy (`copy::CopyContext`)**: Generic deep copy of entity graphs between books, linking each copy to its source through a twin table.
//! * **Sessions (`session::Session`)**: A book bound to a storage backend, with load that never loses the current book and save that handles partial books.

pub mod backend;
pub mod book;
pub mod class;
pub mod clock;
pub mod collection;
pub mod constants;
pub mod copy;
pub mod event;
pub mod guid;
pub mod instance;
pub mod kvp;
pub mod numeric;
pub mod object;
pub mod runtime;
pub mod session;
pub mod timespec;
pub mod value;

pub use backend::{Backend, BackendError, BackendProvider, BackendRef, ErrorCode, LoadType};
pub use book::{Book, EntityReference};
pub use class::{ClassRegistry, Param, ParamType};
#[cfg(any(test, feature = "testing"))]
pub use clock::FixedClock;
pub use clock::{Clock, SystemClock};
pub use collection::Collection;
pub use copy::{CopyContext, CopyMode, CopyOutcome};
pub use event::{Event, EventKind, HandlerId};
pub use guid::{Guid, GuidParseError};
pub use instance::{Entity, EntityRef, Instance};
pub use kvp::{Frame, KvpValue};
pub use numeric::Numeric;
pub use object::{ObjectDescriptor, ObjectRegistry};
pub use runtime::{Runtime, RuntimeConfig};
pub use session::Session;
pub use timespec::Timespec;
pub use value::{Value, ValueKind};

/// Result type used throughout the QOF library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the QOF library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Malformed identifier text
    #[error(transparent)]
    GuidParse(#[from] GuidParseError),

    /// Value conversion and comparison errors from the value module
    #[error(transparent)]
    Value(value::ValueError),

    /// Parameter registry errors from the class module
    #[error(transparent)]
    Class(class::ClassError),

    /// Object registry errors from the object module
    #[error(transparent)]
    Object(object::ObjectError),

    /// Lifecycle errors from the instance module
    #[error(transparent)]
    Instance(instance::InstanceError),

    /// Counter and option errors from the book module
    #[error(transparent)]
    Book(book::BookError),

    /// Storage errors from backends and sessions
    #[error(transparent)]
    Backend(backend::BackendError),

    /// Copy engine errors
    #[error(transparent)]
    Copy(copy::CopyError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::Serialize(_) => "serialize",
            Error::GuidParse(_) => "guid",
            Error::Value(_) => "value",
            Error::Class(_) => "class",
            Error::Object(_) => "object",
            Error::Instance(_) => "instance",
            Error::Book(_) => "book",
            Error::Backend(_) => "backend",
            Error::Copy(_) => "copy",
        }
    }

    /// Check if this error indicates a type, parameter or store was not found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Class(err) => err.is_not_found(),
            Error::Object(err) => err.is_not_found(),
            Error::Backend(err) => err.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error comes from registering a type.
    pub fn is_registration_error(&self) -> bool {
        match self {
            Error::Class(err) => err.is_registration_error(),
            Error::Object(err) => err.is_registration_error(),
            _ => false,
        }
    }

    /// Check if this error is a value of the wrong kind.
    pub fn is_type_error(&self) -> bool {
        match self {
            Error::Value(err) => err.is_kind_mismatch(),
            Error::Class(err) => err.is_type_error(),
            _ => false,
        }
    }

    /// Check if this error is a lifecycle misuse, such as an over-commit.
    pub fn is_usage_error(&self) -> bool {
        match self {
            Error::Instance(err) => err.is_usage_error(),
            Error::Copy(err) => err.is_usage_error(),
            _ => false,
        }
    }

    /// Check if this error indicates a conflict (locked or modified store).
    pub fn is_conflict(&self) -> bool {
        match self {
            Error::Backend(err) => err.is_conflict(),
            _ => false,
        }
    }

    /// Check if this error is storage-related.
    pub fn is_backend_error(&self) -> bool {
        match self {
            Error::Backend(_) => true,
            Error::Instance(err) => err.is_backend_error(),
            _ => false,
        }
    }

    /// Check if this error is I/O related.
    pub fn is_io_error(&self) -> bool {
        matches!(self, Error::Io(_))
    }

    /// Check if this error is a (de)serialization failure.
    pub fn is_serialization_error(&self) -> bool {
        matches!(self, Error::Serialize(_))
    }

    /// Check if this error is a counter or format problem.
    pub fn is_counter_error(&self) -> bool {
        match self {
            Error::Book(err) => err.is_counter_error() || err.is_format_error(),
            _ => false,
        }
    }

    /// Check if this error comes from the copy engine.
    pub fn is_copy_error(&self) -> bool {
        matches!(self, Error::Copy(_))
    }
}
