use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

pub trait Coord: Copy + Ord + Default + fmt::Debug + Add<Output = Self> + Sub<Output = Self> {
    const MIN: Self;
    const MAX: Self;
}

impl Coord for i32 {
    const MIN: i32 = i32::MIN;
    const MAX: i32 = i32::MAX;
}

impl Coord for i64 {
    const MIN: i64 = i64::MIN;
    const MAX: i64 = i64::MAX;
}

/// Closed interval `[low, high]`. Invalid (empty) when `low > high`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Interval<T> {
    pub low: T,
    pub high: T,
}

impl<T: Coord> Interval<T> {
    #[inline(always)]
    pub fn new(low: T, high: T) -> Self {
        Self { low, high }
    }

    #[inline(always)]
    pub fn point(v: T) -> Self {
        Self { low: v, high: v }
    }

    /// Identity for `union`: every extension replaces both bounds.
    pub fn empty() -> Self {
        Self {
            low: T::MAX,
            high: T::MIN,
        }
    }

    #[inline(always)]
    pub fn is_valid(&self) -> bool {
        self.low <= self.high
    }

    #[inline(always)]
    pub fn range(&self) -> T {
        self.high - self.low
    }

    #[inline(always)]
    pub fn contains(&self, v: T) -> bool {
        self.low <= v && v <= self.high
    }

    pub fn contains_interval(&self, other: &Self) -> bool {
        self.low <= other.low && other.high <= self.high
    }

    pub fn intersect(&self, other: &Self) -> Self {
        Self::new(self.low.max(other.low), self.high.min(other.high))
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        self.intersect(other).is_valid()
    }

    pub fn union(&self, other: &Self) -> Self {
        Self::new(self.low.min(other.low), self.high.max(other.high))
    }

    pub fn extend(&mut self, v: T) {
        self.low = self.low.min(v);
        self.high = self.high.max(v);
    }

    /// Distance between the two intervals, zero when they touch or overlap.
    pub fn gap(&self, other: &Self) -> T {
        if other.low > self.high {
            other.low - self.high
        } else if self.low > other.high {
            self.low - other.high
        } else {
            T::default()
        }
    }

    pub fn shift(&self, d: T) -> Self {
        Self::new(self.low + d, self.high + d)
    }

    pub fn expand(&self, margin: T) -> Self {
        Self::new(self.low - margin, self.high + margin)
    }
}

impl<T: fmt::Debug> fmt::Debug for Interval<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}, {:?}]", self.low, self.high)
    }
}
