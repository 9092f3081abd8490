//! Object registry error types.

use thiserror::Error;

use crate::instance::InstanceError;

/// Errors raised by the object registry.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Existing variants will not be removed in minor versions
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObjectError {
    /// A descriptor was registered under the empty tag.
    #[error("Object type tag must not be empty")]
    EmptyTypeName,

    /// A descriptor for the type already exists; the existing one is kept.
    #[error("Object type '{e_type}' is already registered")]
    DuplicateType {
        /// The type tag
        e_type: String,
    },

    /// No descriptor is registered for the type.
    #[error("Object type '{e_type}' is not registered")]
    UnknownType {
        /// The type tag
        e_type: String,
    },

    /// The descriptor has no create hook.
    #[error("Object type '{e_type}' has no create hook")]
    NoCreateHook {
        /// The type tag
        e_type: String,
    },

    /// The create hook declined to build an entity.
    #[error("Create hook for '{e_type}' returned nothing")]
    CreateFailed {
        /// The type tag
        e_type: String,
    },

    /// The descriptor has no foreach hook.
    #[error("Object type '{e_type}' has no foreach hook")]
    NoForeachHook {
        /// The type tag
        e_type: String,
    },

    /// Backend data was registered or looked up under an empty name.
    #[error("Backend name must not be empty")]
    EmptyBackendName,

    /// Attaching the new entity to its book failed.
    #[error(transparent)]
    Instance(#[from] InstanceError),
}

impl ObjectError {
    /// Check if this error indicates an unregistered type.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ObjectError::UnknownType { .. })
    }

    /// Check if this error is a registration conflict or bad argument.
    pub fn is_registration_error(&self) -> bool {
        matches!(
            self,
            ObjectError::EmptyTypeName
                | ObjectError::DuplicateType { .. }
                | ObjectError::EmptyBackendName
        )
    }

    /// Check if this error is a missing hook on an otherwise known type.
    pub fn is_missing_hook(&self) -> bool {
        matches!(
            self,
            ObjectError::NoCreateHook { .. } | ObjectError::NoForeachHook { .. }
        )
    }
}

impl From<ObjectError> for crate::Error {
    fn from(err: ObjectError) -> Self {
        crate::Error::Object(err)
    }
}
