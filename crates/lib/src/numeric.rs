//! Exact rational numbers.
//!
//! [`Numeric`] stores a numerator and denominator and never rounds. Two
//! notions of equality exist: [`Numeric::eq`] (the derived `PartialEq`) asks
//! for the same representation, while [`Numeric::equal`] asks for the same
//! value, so `1/2` and `2/4` are `equal` but not `==`.

use std::{cmp::Ordering, fmt};

use serde::{Deserialize, Serialize};

/// An exact rational value `num / denom`.
///
/// A zero denominator marks an error value; such values compare equal only to
/// other error values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Numeric {
    num: i64,
    denom: i64,
}

impl Default for Numeric {
    fn default() -> Self {
        Self::zero()
    }
}

impl Numeric {
    pub const fn new(num: i64, denom: i64) -> Self {
        Self { num, denom }
    }

    pub const fn zero() -> Self {
        Self { num: 0, denom: 1 }
    }

    pub fn num(&self) -> i64 {
        self.num
    }

    pub fn denom(&self) -> i64 {
        self.denom
    }

    pub fn is_error(&self) -> bool {
        self.denom == 0
    }

    pub fn is_zero(&self) -> bool {
        !self.is_error() && self.num == 0
    }

    /// Value equality: `a/b == c/d` iff `a*d == c*b`.
    pub fn equal(&self, other: &Numeric) -> bool {
        self.compare(other) == Ordering::Equal
    }

    /// Orders by value. Error values sort before every valid value.
    pub fn compare(&self, other: &Numeric) -> Ordering {
        match (self.is_error(), other.is_error()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            (false, false) => {}
        }
        let (ln, ld) = self.normalized_sign();
        let (rn, rd) = other.normalized_sign();
        (ln * rd).cmp(&(rn * ld))
    }

    /// Returns the same value with the smallest denominator.
    pub fn reduce(&self) -> Numeric {
        if self.is_error() {
            return *self;
        }
        let (num, denom) = self.normalized_sign();
        let g = gcd(num.unsigned_abs(), denom.unsigned_abs()).max(1) as i128;
        match (i64::try_from(num / g), i64::try_from(denom / g)) {
            (Ok(num), Ok(denom)) => Numeric { num, denom },
            _ => *self,
        }
    }

    /// Lossy conversion for display and reporting.
    pub fn to_f64(&self) -> f64 {
        self.num as f64 / self.denom as f64
    }

    fn normalized_sign(&self) -> (i128, i128) {
        let (num, denom) = (i128::from(self.num), i128::from(self.denom));
        if denom < 0 { (-num, -denom) } else { (num, denom) }
    }
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

impl fmt::Display for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.denom)
    }
}
