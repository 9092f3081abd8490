//! Instance lifecycle error types.
//!
//! These cover misuse of the edit bracket, identity and membership conflicts,
//! and backend refusals observed at commit time.

use thiserror::Error;

use crate::{Guid, backend::BackendError};

/// Errors that can occur while creating, editing or destroying an instance.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Existing variants will not be removed in minor versions
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstanceError {
    /// The instance has already been destroyed and freed.
    #[error("Instance {guid} has been freed")]
    Freed {
        /// Identifier of the freed instance
        guid: Guid,
    },

    /// `commit_edit` was called without a matching `begin_edit`.
    #[error("Commit without matching begin on instance {guid}")]
    OverCommit {
        /// Identifier of the instance
        guid: Guid,
    },

    /// The instance is already attached to a different book.
    #[error("Instance {guid} already belongs to another book")]
    BookAlreadySet {
        /// Identifier of the instance
        guid: Guid,
    },

    /// The instance has no book, so it cannot join a collection.
    #[error("Instance {guid} is not attached to a book")]
    NoBook {
        /// Identifier of the instance
        guid: Guid,
    },

    /// Another entity with the same identifier is already in the collection.
    #[error("Identifier {guid} already present in {e_type} collection")]
    GuidCollision {
        /// The colliding identifier
        guid: Guid,
        /// Type of the collection
        e_type: String,
    },

    /// The null identifier cannot be stored in a collection.
    #[error("Null identifier cannot be stored in a {e_type} collection")]
    NullGuid {
        /// Type of the collection
        e_type: String,
    },

    /// The entity type does not match the collection type.
    #[error("Type mismatch: collection holds {expected}, entity is {actual}")]
    TypeMismatch {
        /// Type of the collection
        expected: String,
        /// Type of the entity
        actual: String,
    },

    /// The entity is currently borrowed elsewhere.
    #[error("Entity {guid} is busy")]
    Busy {
        /// Identifier of the entity, when it could be read
        guid: Guid,
    },

    /// The attached backend refused the commit.
    #[error("Backend refused commit of instance {guid}: {source}")]
    CommitFailed {
        /// Identifier of the instance
        guid: Guid,
        /// The backend's error
        source: BackendError,
    },
}

impl InstanceError {
    /// Check if this error is a misuse of the edit bracket or a freed instance.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            InstanceError::Freed { .. } | InstanceError::OverCommit { .. }
        )
    }

    /// Check if this error is a collection membership conflict.
    pub fn is_membership_error(&self) -> bool {
        matches!(
            self,
            InstanceError::GuidCollision { .. }
                | InstanceError::NullGuid { .. }
                | InstanceError::TypeMismatch { .. }
                | InstanceError::NoBook { .. }
        )
    }

    /// Check if this error came from the backend.
    pub fn is_backend_error(&self) -> bool {
        matches!(self, InstanceError::CommitFailed { .. })
    }

    /// Get the identifier this error is about, if any.
    pub fn guid(&self) -> Option<Guid> {
        match self {
            InstanceError::Freed { guid }
            | InstanceError::OverCommit { guid }
            | InstanceError::BookAlreadySet { guid }
            | InstanceError::NoBook { guid }
            | InstanceError::GuidCollision { guid, .. }
            | InstanceError::Busy { guid }
            | InstanceError::CommitFailed { guid, .. } => Some(*guid),
            _ => None,
        }
    }
}

impl From<InstanceError> for crate::Error {
    fn from(err: InstanceError) -> Self {
        crate::Error::Instance(err)
    }
}
