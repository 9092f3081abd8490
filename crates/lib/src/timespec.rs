//! Second/nanosecond timestamps.
//!
//! `Timespec` is the date value carried by parameters, the last-update stamp on
//! every instance and the dirty time of a book. The all-zero value doubles as
//! the "never" sentinel.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// A point in time as seconds plus nanoseconds since the Unix epoch.
///
/// Ordering is lexicographic on `(secs, nsecs)`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timespec {
    secs: i64,
    nsecs: i64,
}

impl Timespec {
    /// The zero sentinel.
    pub const ZERO: Timespec = Timespec { secs: 0, nsecs: 0 };

    /// Creates a timestamp, carrying whole seconds out of `nsecs`.
    pub fn new(secs: i64, nsecs: i64) -> Self {
        Self {
            secs: secs + nsecs.div_euclid(NANOS_PER_SEC),
            nsecs: nsecs.rem_euclid(NANOS_PER_SEC),
        }
    }

    pub fn from_secs(secs: i64) -> Self {
        Self { secs, nsecs: 0 }
    }

    pub fn from_millis(millis: u64) -> Self {
        let millis = millis as i64;
        Self::new(millis / 1000, (millis % 1000) * 1_000_000)
    }

    pub fn secs(&self) -> i64 {
        self.secs
    }

    pub fn nsecs(&self) -> i64 {
        self.nsecs
    }

    /// Returns true for the zero sentinel.
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Converts to a UTC datetime, if representable.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.secs, self.nsecs as u32).single()
    }
}

impl From<DateTime<Utc>> for Timespec {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::new(dt.timestamp(), i64::from(dt.timestamp_subsec_nanos()))
    }
}

impl fmt::Display for Timespec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{}.{:09}", self.secs, self.nsecs),
        }
    }
}
