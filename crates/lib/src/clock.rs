//! Where the runtime gets the time.
//!
//! Instance update stamps and book dirty times are read from the [`Clock`]
//! installed on the [`Runtime`](crate::Runtime). Production code uses
//! [`SystemClock`]; tests install a [`FixedClock`] so stamps are predictable.
//!
//! ```
//! use qof::{Clock, SystemClock};
//!
//! assert!(SystemClock.now().secs() > 0);
//! ```

use std::fmt::Debug;

#[cfg(any(test, feature = "testing"))]
use std::cell::Cell;

use chrono::Utc;

use crate::Timespec;

/// Source of the current time.
pub trait Clock: Debug {
    fn now(&self) -> Timespec;

    /// Milliseconds since the Unix epoch, clamped at zero.
    fn now_millis(&self) -> u64 {
        let now = self.now();
        let millis = now.secs().saturating_mul(1000) + now.nsecs() / 1_000_000;
        u64::try_from(millis).unwrap_or(0)
    }
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timespec {
        Utc::now().into()
    }
}

/// Deterministic clock for tests.
///
/// Each reading moves the clock one millisecond forward, so two stamps taken
/// in a row always differ. [`hold`](Self::hold) stops that while the
/// returned guard lives.
///
/// ```
/// use qof::{Clock, FixedClock, Timespec};
///
/// let clock = FixedClock::new(2_000);
/// assert_eq!(clock.now(), Timespec::from_secs(2));
/// assert!(clock.now() > Timespec::from_secs(2));
///
/// let _frozen = clock.hold();
/// assert_eq!(clock.now(), clock.now());
/// ```
#[cfg(any(test, feature = "testing"))]
#[derive(Debug)]
pub struct FixedClock {
    millis: Cell<u64>,
    frozen: Cell<bool>,
}

/// Keeps a [`FixedClock`] from ticking until dropped.
#[cfg(any(test, feature = "testing"))]
pub struct ClockHold<'a>(&'a FixedClock);

#[cfg(any(test, feature = "testing"))]
impl Drop for ClockHold<'_> {
    fn drop(&mut self) {
        self.0.frozen.set(false);
    }
}

#[cfg(any(test, feature = "testing"))]
impl FixedClock {
    /// A clock reading `millis` milliseconds after the epoch.
    pub fn new(millis: u64) -> Self {
        Self {
            millis: Cell::new(millis),
            frozen: Cell::new(false),
        }
    }

    pub fn hold(&self) -> ClockHold<'_> {
        self.frozen.set(true);
        ClockHold(self)
    }

    pub fn advance(&self, ms: u64) {
        self.millis.set(self.millis.get() + ms);
    }

    pub fn set(&self, ms: u64) {
        self.millis.set(ms);
    }

    /// Current reading, without ticking.
    pub fn get(&self) -> u64 {
        self.millis.get()
    }
}

#[cfg(any(test, feature = "testing"))]
impl Clock for FixedClock {
    fn now(&self) -> Timespec {
        let millis = self.millis.get();
        if !self.frozen.get() {
            self.millis.set(millis + 1);
        }
        Timespec::from_millis(millis)
    }
}

#[cfg(any(test, feature = "testing"))]
impl Default for FixedClock {
    /// 2024-01-01 00:00:00 UTC
    fn default() -> Self {
        Self::new(1_704_067_200_000)
    }
}
