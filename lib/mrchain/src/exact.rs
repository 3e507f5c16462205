//! Exact floating-point summation.
//!
//! [`ExactSum`] keeps the running total as a list of non-overlapping partials
//! (Shewchuk's algorithm, as in Python's `math.fsum`), so no precision is lost
//! while adding and the final [`ExactSum::value`] is correctly rounded. Merging
//! two sums is exact too, which makes the result independent of how values are
//! grouped into partitions or pre-combined.

use std::iter::Sum;
use std::ops::{Add, AddAssign};

#[derive(Debug, Clone, Default)]
pub struct ExactSum {
    /// Non-overlapping, increasing in magnitude.
    partials: Vec<f64>,
    /// Running sum of infinities and NaNs, which the partials cannot hold.
    special: f64,
}

impl ExactSum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: f64) {
        if !value.is_finite() {
            self.special += value;
            return;
        }
        let mut x = value;
        let mut kept = 0;
        for j in 0..self.partials.len() {
            let mut y = self.partials[j];
            if x.abs() < y.abs() {
                std::mem::swap(&mut x, &mut y);
            }
            let hi = x + y;
            let lo = y - (hi - x);
            if lo != 0.0 {
                self.partials[kept] = lo;
                kept += 1;
            }
            x = hi;
        }
        self.partials.truncate(kept);
        self.partials.push(x);
    }

    /// Folds every partial of `other` in; no rounding happens.
    pub fn merge(&mut self, other: &ExactSum) {
        for &p in &other.partials {
            self.push(p);
        }
        self.special += other.special;
    }

    /// The total, rounded once to the nearest `f64` (ties to even).
    pub fn value(&self) -> f64 {
        if self.special != 0.0 || self.special.is_nan() {
            return self.special;
        }
        let p = &self.partials;
        let Some(&top) = p.last() else { return 0.0 };
        let mut n = p.len() - 1;
        let mut hi = top;
        let mut lo = 0.0;
        while n > 0 {
            let x = hi;
            n -= 1;
            let y = p[n];
            hi = x + y;
            lo = y - (hi - x);
            if lo != 0.0 {
                break;
            }
        }
        // Half-way case: the rest of the partials decide the rounding direction.
        if n > 0 && ((lo < 0.0 && p[n - 1] < 0.0) || (lo > 0.0 && p[n - 1] > 0.0)) {
            let y = lo * 2.0;
            let x = hi + y;
            if y == x - hi {
                hi = x;
            }
        }
        hi
    }
}

impl From<f64> for ExactSum {
    fn from(value: f64) -> Self {
        let mut s = ExactSum::new();
        s.push(value);
        s
    }
}

impl AddAssign<f64> for ExactSum {
    fn add_assign(&mut self, value: f64) {
        self.push(value);
    }
}

impl Add for ExactSum {
    type Output = ExactSum;

    fn add(mut self, other: ExactSum) -> ExactSum {
        self.merge(&other);
        self
    }
}

impl Sum for ExactSum {
    fn sum<I: Iterator<Item = ExactSum>>(iter: I) -> ExactSum {
        iter.fold(ExactSum::new(), |acc, s| acc + s)
    }
}

impl Sum<f64> for ExactSum {
    fn sum<I: Iterator<Item = f64>>(iter: I) -> ExactSum {
        let mut s = ExactSum::new();
        iter.for_each(|x| s.push(x));
        s
    }
}
