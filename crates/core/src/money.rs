use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

/// An amount in Korean won. The won has no minor unit, so amounts are whole integers.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Won(i64);

impl Won {
    pub fn new(amount: i64) -> Self {
        Won(amount)
    }

    pub fn amount(self) -> i64 {
        self.0
    }

    pub fn zero() -> Self {
        Won(0)
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Floor division into `parts` equal shares. Returns `(share, remainder)`.
    pub fn split(self, parts: usize) -> (Won, Won) {
        if parts == 0 {
            return (Won::zero(), self);
        }
        let parts = parts as i64;
        let share = self.0.div_euclid(parts);
        (Won(share), Won(self.0 - share * parts))
    }
}

impl fmt::Display for Won {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{sign}₩{grouped}")
    }
}

impl From<i64> for Won {
    fn from(amount: i64) -> Self {
        Won(amount)
    }
}

impl Add for Won {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Won(self.0 + rhs.0)
    }
}

impl AddAssign for Won {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Won {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Won(self.0 - rhs.0)
    }
}

impl Sum for Won {
    fn sum<I: Iterator<Item = Won>>(iter: I) -> Self {
        iter.fold(Won::zero(), |a, b| a + b)
    }
}
