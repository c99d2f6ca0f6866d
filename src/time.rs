use std::cmp::Ordering;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use derive_more::{Add, AddAssign, Deref, DerefMut, Display, From, Sub, SubAssign};
use serde::{Deserialize, Serialize};

/// A point in simulated time, in seconds since trajectory start.
///
/// Backed by `f64` but ordered with `total_cmp` so `Time` can sit in a
/// `BinaryHeap` key without the partial-order foot guns of bare floats.
#[derive(Debug, Clone, Copy, Default, From, Display, Deref, DerefMut, Serialize, Deserialize)]
pub struct Time(pub f64);

impl PartialEq for Time {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0).is_eq()
    }
}

impl Eq for Time {}

impl PartialOrd for Time {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.0.total_cmp(&other.0))
    }
}

impl Ord for Time {
    fn cmp(&self, other: &Self) -> Ordering {
        self.partial_cmp(other).unwrap()
    }
}

impl Time {
    pub fn infinite() -> Self {
        Time(f64::INFINITY)
    }

    pub fn is_finite(&self) -> bool {
        self.0.is_finite()
    }
}

/// A span of simulated time, in seconds.
#[derive(Debug, Clone, Copy, Default, From, Display, Deref, DerefMut, Add, Sub, AddAssign, SubAssign, Serialize, Deserialize)]
pub struct Duration(pub f64);

impl PartialEq for Duration {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0).is_eq()
    }
}

impl Eq for Duration {}

impl PartialOrd for Duration {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.0.total_cmp(&other.0))
    }
}

impl Ord for Duration {
    fn cmp(&self, other: &Self) -> Ordering {
        self.partial_cmp(other).unwrap()
    }
}

impl Duration {
    pub fn infinite() -> Self {
        Duration(f64::INFINITY)
    }

    pub fn is_finite(&self) -> bool {
        self.0.is_finite()
    }

    pub fn min(self, other: Self) -> Self {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }
}

impl Add<Duration> for Time {
    type Output = Time;

    fn add(self, rhs: Duration) -> Self::Output {
        Time(self.0 + rhs.0)
    }
}

impl AddAssign<Duration> for Time {
    fn add_assign(&mut self, rhs: Duration) {
        self.0 += rhs.0;
    }
}

impl Sub<Duration> for Time {
    type Output = Time;

    fn sub(self, rhs: Duration) -> Self::Output {
        Time(self.0 - rhs.0)
    }
}

impl SubAssign<Duration> for Time {
    fn sub_assign(&mut self, rhs: Duration) {
        self.0 -= rhs.0;
    }
}

impl Sub for Time {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Self::Output {
        Duration(self.0 - rhs.0)
    }
}

/// Rounds a speedup value to 9 decimals, matching the reference simulator's
/// rounding rule. Preserved exactly because it affects backfill comparisons.
pub fn round9(x: f64) -> f64 {
    (x * 1e9).round() / 1e9
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_ordering_tolerates_nan_free_inf() {
        assert!(Time(1.0) < Time::infinite());
        assert_eq!(Time(1.0) + Duration(2.0), Time(3.0));
        assert_eq!(Time(3.0) - Time(1.0), Duration(2.0));
    }

    #[test]
    fn round9_matches_reference_precision() {
        assert_eq!(round9(0.123456789123), 0.123456789);
    }
}
