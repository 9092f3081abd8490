//! Book error types.

use thiserror::Error;

/// Errors raised by book counters and options.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Existing variants will not be removed in minor versions
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookError {
    /// Counter names must be non-empty.
    #[error("Counter name must not be empty")]
    EmptyCounterName,

    /// A counter format string failed validation.
    #[error("Invalid counter format '{format}': {reason}")]
    InvalidCounterFormat {
        /// The rejected format
        format: String,
        /// Why it was rejected
        reason: String,
    },

    /// Incrementing the counter would overflow.
    #[error("Counter '{name}' overflowed")]
    CounterOverflow {
        /// The counter name
        name: String,
    },
}

impl BookError {
    pub(crate) fn invalid_format(format: &str, reason: impl Into<String>) -> Self {
        BookError::InvalidCounterFormat {
            format: format.to_string(),
            reason: reason.into(),
        }
    }

    /// Check if this error concerns a counter.
    pub fn is_counter_error(&self) -> bool {
        matches!(
            self,
            BookError::EmptyCounterName | BookError::CounterOverflow { .. }
        )
    }

    /// Check if this error is a rejected format string.
    pub fn is_format_error(&self) -> bool {
        matches!(self, BookError::InvalidCounterFormat { .. })
    }
}

impl From<BookError> for crate::Error {
    fn from(err: BookError) -> Self {
        crate::Error::Book(err)
    }
}
