//! Parameter registry error types.

use thiserror::Error;

use crate::value::ValueError;

/// Errors raised by type registration and generic parameter access.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Existing variants will not be removed in minor versions
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassError {
    /// A type was registered under the empty tag.
    #[error("Type tag must not be empty")]
    EmptyTypeName,

    /// The type is already registered with a different parameter table.
    #[error("Type '{e_type}' is already registered with a different parameter table")]
    ConflictingRegistration {
        /// The type tag
        e_type: String,
    },

    /// Two parameters in one table share a name.
    #[error("Duplicate parameter '{param}' in type '{e_type}'")]
    DuplicateParam {
        /// The type tag
        e_type: String,
        /// The repeated parameter name
        param: String,
    },

    /// No parameter table is registered for the type.
    #[error("Type '{e_type}' is not registered")]
    UnknownType {
        /// The type tag
        e_type: String,
    },

    /// The type has no parameter of that name.
    #[error("Type '{e_type}' has no parameter '{param}'")]
    UnknownParam {
        /// The type tag
        e_type: String,
        /// The missing parameter name
        param: String,
    },

    /// The parameter has no setter.
    #[error("Parameter '{param}' is read-only")]
    ReadOnly {
        /// The parameter name
        param: String,
    },

    /// An accessor was applied to an entity of another concrete type.
    #[error("Parameter '{param}' expects an entity of type {expected}")]
    WrongEntityType {
        /// The parameter name
        param: String,
        /// Rust type the accessor was registered for
        expected: String,
    },

    /// A collection parameter has no insertion function for a member type.
    #[error("Parameter '{param}' cannot insert members of type '{member_type}'")]
    NoInserter {
        /// The parameter name
        param: String,
        /// Type tag of the member
        member_type: String,
    },

    /// The entity is borrowed elsewhere.
    #[error("Entity is busy while accessing parameter '{param}'")]
    Busy {
        /// The parameter name
        param: String,
    },

    /// The type has no choice table.
    #[error("Type '{e_type}' has no choice table")]
    NotAChoice {
        /// The type tag
        e_type: String,
    },

    /// A setter received a value of the wrong kind.
    #[error(transparent)]
    Value(#[from] ValueError),
}

impl ClassError {
    /// Check if this error indicates a missing type or parameter.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ClassError::UnknownType { .. } | ClassError::UnknownParam { .. }
        )
    }

    /// Check if this error came from registration.
    pub fn is_registration_error(&self) -> bool {
        matches!(
            self,
            ClassError::EmptyTypeName
                | ClassError::ConflictingRegistration { .. }
                | ClassError::DuplicateParam { .. }
        )
    }

    /// Check if this error is a type or kind mismatch.
    pub fn is_type_error(&self) -> bool {
        matches!(
            self,
            ClassError::WrongEntityType { .. } | ClassError::Value(_)
        )
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, ClassError::ReadOnly { .. })
    }
}

impl From<ClassError> for crate::Error {
    fn from(err: ClassError) -> Self {
        crate::Error::Class(err)
    }
}
