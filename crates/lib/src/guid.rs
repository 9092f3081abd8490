//! Globally unique identifiers for books and entities.
//!
//! A [`Guid`] is an opaque 128-bit value. The canonical text form is 32
//! lowercase hex digits with no separators.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

/// Length of the canonical string encoding.
pub const GUID_ENCODING_LENGTH: usize = 32;

/// A 128-bit identifier. The all-zero value is the null sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Guid(Uuid);

/// Error returned when parsing a malformed identifier string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid GUID encoding: '{input}'")]
pub struct GuidParseError {
    /// The rejected input
    pub input: String,
}

impl Guid {
    /// Generates a fresh random identifier. Never returns the null value.
    pub fn new() -> Self {
        loop {
            let id = Uuid::new_v4();
            if !id.is_nil() {
                return Self(id);
            }
        }
    }

    /// The distinguished all-zero identifier.
    pub const fn null() -> Self {
        Self(Uuid::nil())
    }

    pub fn is_null(&self) -> bool {
        self.0.is_nil()
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for Guid {
    type Err = GuidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || GuidParseError {
            input: s.to_string(),
        };
        if s.len() != GUID_ENCODING_LENGTH || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(err());
        }
        Uuid::try_parse(s).map(Self).map_err(|_| err())
    }
}

impl Serialize for Guid {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_string().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Guid {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
