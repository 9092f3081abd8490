//! Backend error types.
//!
//! Backend and session failures carry a numeric-style [`ErrorCode`] plus a
//! human-readable message. Sessions keep the most recent one so callers can
//! inspect it after the fact.

use std::fmt;

use thiserror::Error;

/// Classification of backend and session failures.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// No error
    #[default]
    NoErr,
    /// No provider handles the requested access method or path
    NoHandler,
    /// The session has no backend attached
    NoBackend,
    /// The book id could not be parsed
    BadUrl,
    /// The named book does not exist
    NoSuchDb,
    /// Could not connect to the store
    CantConnect,
    /// Connection lost during an operation
    ConnLost,
    /// The book is locked by another session
    Locked,
    /// The store refuses writes
    ReadOnly,
    /// The stored data was written by a newer version
    TooNew,
    /// The stored data is damaged
    DataCorrupt,
    /// Unspecified server-side failure
    ServerErr,
    /// Out of memory
    Alloc,
    /// Permission denied
    Perm,
    /// The stored data changed since it was loaded
    Modified,
    /// An object was modified and destroyed in the same save
    ModDestroy,
    /// Anything else
    Misc,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::NoErr => "no error",
            ErrorCode::NoHandler => "no handler",
            ErrorCode::NoBackend => "no backend",
            ErrorCode::BadUrl => "bad url",
            ErrorCode::NoSuchDb => "no such database",
            ErrorCode::CantConnect => "cannot connect",
            ErrorCode::ConnLost => "connection lost",
            ErrorCode::Locked => "locked",
            ErrorCode::ReadOnly => "read only",
            ErrorCode::TooNew => "too new",
            ErrorCode::DataCorrupt => "data corrupt",
            ErrorCode::ServerErr => "server error",
            ErrorCode::Alloc => "allocation failure",
            ErrorCode::Perm => "permission denied",
            ErrorCode::Modified => "modified",
            ErrorCode::ModDestroy => "modified and destroyed",
            ErrorCode::Misc => "miscellaneous error",
        };
        f.write_str(name)
    }
}

/// A backend failure: an error code and a message.
///
/// # Stability
///
/// - New [`ErrorCode`] variants may be added in minor versions
/// - Helper methods like `is_*()` provide stable APIs
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct BackendError {
    code: ErrorCode,
    message: String,
}

impl BackendError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Check if no provider or backend could service the request.
    pub fn is_no_handler(&self) -> bool {
        matches!(self.code, ErrorCode::NoHandler | ErrorCode::NoBackend)
    }

    /// Check if the book is held by another session.
    pub fn is_locked(&self) -> bool {
        self.code == ErrorCode::Locked
    }

    /// Check if the failure concerns locating the book.
    pub fn is_not_found(&self) -> bool {
        matches!(self.code, ErrorCode::BadUrl | ErrorCode::NoSuchDb)
    }

    /// Check if another session holds the book or changed it underneath.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::Locked | ErrorCode::Modified | ErrorCode::ModDestroy
        )
    }

    /// Check if retrying later might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::CantConnect | ErrorCode::ConnLost | ErrorCode::Locked
        )
    }
}

impl From<BackendError> for crate::Error {
    fn from(err: BackendError) -> Self {
        crate::Error::Backend(err)
    }
}
