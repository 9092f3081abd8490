//! Value error types.

use thiserror::Error;

use super::ValueKind;

/// Errors raised when a [`Value`](super::Value) is used as the wrong kind.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// The value was not of the kind the caller asked for.
    #[error("Value kind mismatch: expected {expected}, got {actual}")]
    KindMismatch {
        /// The kind the caller required
        expected: ValueKind,
        /// The kind actually present
        actual: ValueKind,
    },

    /// Two values of different kinds were compared.
    #[error("Cannot compare {left} with {right}")]
    Incomparable {
        /// Kind of the left operand
        left: ValueKind,
        /// Kind of the right operand
        right: ValueKind,
    },
}

impl ValueError {
    /// Check if this error is a kind mismatch on access.
    pub fn is_kind_mismatch(&self) -> bool {
        matches!(self, ValueError::KindMismatch { .. })
    }

    /// Check if this error came from a mixed-kind comparison.
    pub fn is_incomparable(&self) -> bool {
        matches!(self, ValueError::Incomparable { .. })
    }
}

impl From<ValueError> for crate::Error {
    fn from(err: ValueError) -> Self {
        crate::Error::Value(err)
    }
}
