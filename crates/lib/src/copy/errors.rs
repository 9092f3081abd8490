//! Copy engine error types.

use thiserror::Error;

use crate::{Guid, class::ClassError, object::ObjectError};

/// Problems met while copying entities between books.
///
/// The copy engine records these on its context and keeps going; the whole
/// copy only reports failure through [`CopyContext::error`].
///
/// [`CopyContext::error`]: super::CopyContext::error
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CopyError {
    /// The source entity already lives in the destination book.
    #[error("Entity {guid} is already in the destination book")]
    SameBook {
        /// The source entity
        guid: Guid,
    },

    /// The source entity belongs to no book.
    #[error("Entity {guid} is not attached to a book")]
    Detached {
        /// The source entity
        guid: Guid,
    },

    /// The type lacks the create or foreach hook generic copy needs.
    #[error("Type '{e_type}' cannot be copied generically")]
    NotCompliant {
        /// The offending type
        e_type: String,
    },

    /// The destination entity could not be created.
    #[error("Failed to create '{e_type}' in the destination book")]
    Create {
        /// The type being created
        e_type: String,
        /// Why creation failed
        #[source]
        source: ObjectError,
    },

    /// Reading, writing or inserting a parameter failed.
    #[error("Failed to copy parameter '{param}'")]
    Param {
        /// The parameter being copied
        param: String,
        /// The registry error
        #[source]
        source: ClassError,
    },

    /// An entity was borrowed elsewhere while the copy needed it.
    #[error("Entity {guid} was busy during copy")]
    Busy {
        /// The busy entity
        guid: Guid,
    },
}

impl CopyError {
    /// Check if the copy was asked to do something it cannot.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, CopyError::SameBook { .. } | CopyError::Detached { .. })
    }

    /// Check if the error comes from a type missing hooks or inserters.
    pub fn is_structural(&self) -> bool {
        match self {
            CopyError::NotCompliant { .. } => true,
            CopyError::Param { source, .. } => {
                matches!(source, ClassError::NoInserter { .. } | ClassError::ReadOnly { .. })
            }
            _ => false,
        }
    }

    /// Get the parameter name if this error is about one parameter.
    pub fn param(&self) -> Option<&str> {
        match self {
            CopyError::Param { param, .. } => Some(param),
            _ => None,
        }
    }
}

impl From<CopyError> for crate::Error {
    fn from(err: CopyError) -> Self {
        crate::Error::Copy(err)
    }
}
