//! Rational numbers and validated time bases.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A rational number represented as a numerator and denominator.
///
/// Values compare by magnitude, so `1/2 == 2/4`. A zero denominator is
/// allowed and stands for an infinite (or, as `0/0`, undefined) value.
#[derive(Clone, Copy, Serialize, Deserialize)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    #[inline]
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    #[inline]
    pub fn to_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// `1 / q`
    #[inline]
    pub const fn invert(self) -> Self {
        Self {
            num: self.den,
            den: self.num,
        }
    }

    /// Reduces `num / den` to lowest terms with both parts bounded by `max`.
    ///
    /// Returns the closest approximation when the exact value does not fit,
    /// together with whether the result is exact.
    pub fn reduce(num: i64, den: i64, max: i64) -> (Self, bool) {
        let (q, exact) = reduce_wide(num as i128, den as i128, max as i128);
        (q, exact)
    }

    fn cmp_value(self, other: Self) -> Option<Ordering> {
        if self.den == 0 || other.den == 0 {
            return self.to_f64().partial_cmp(&other.to_f64());
        }
        let lhs = self.num as i128 * other.den as i128;
        let rhs = other.num as i128 * self.den as i128;
        let ord = lhs.cmp(&rhs);
        // Cross-multiplying by a negative denominator flips the comparison.
        if (self.den < 0) != (other.den < 0) {
            Some(ord.reverse())
        } else {
            Some(ord)
        }
    }
}

fn gcd(mut a: i128, mut b: i128) -> i128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

fn reduce_wide(num: i128, den: i128, max: i128) -> (Rational, bool) {
    let negative = (num < 0) != (den < 0);
    let mut num = num.abs();
    let mut den = den.abs();
    let g = gcd(num, den);
    if g != 0 {
        num /= g;
        den /= g;
    }

    let mut a0 = (0i128, 1i128);
    let mut a1 = (1i128, 0i128);
    if num <= max && den <= max {
        a1 = (num, den);
        den = 0;
    }

    // Continued-fraction expansion until a convergent exceeds `max`.
    while den != 0 {
        let x = num / den;
        let next_den = num - den * x;
        let a2 = (x * a1.0 + a0.0, x * a1.1 + a0.1);
        if a2.0 > max || a2.1 > max {
            let mut x = x;
            if a1.0 != 0 {
                x = (max - a0.0) / a1.0;
            }
            if a1.1 != 0 {
                x = x.min((max - a0.1) / a1.1);
            }
            if den * (2 * x * a1.1 + a0.1) > num * a1.1 {
                a1 = (x * a1.0 + a0.0, x * a1.1 + a0.1);
            }
            break;
        }
        a0 = a1;
        a1 = a2;
        num = den;
        den = next_den;
    }

    let num = if negative { -a1.0 } else { a1.0 };
    (Rational::new(num as i32, a1.1 as i32), den == 0)
}

fn reduce_pair(num: i128, den: i128) -> Rational {
    reduce_wide(num, den, i32::MAX as i128).0
}

impl PartialEq for Rational {
    fn eq(&self, other: &Self) -> bool {
        self.cmp_value(*other) == Some(Ordering::Equal)
    }
}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.cmp_value(*other)
    }
}

impl Add for Rational {
    type Output = Rational;

    fn add(self, rhs: Rational) -> Rational {
        reduce_pair(
            self.num as i128 * rhs.den as i128 + rhs.num as i128 * self.den as i128,
            self.den as i128 * rhs.den as i128,
        )
    }
}

impl Sub for Rational {
    type Output = Rational;

    fn sub(self, rhs: Rational) -> Rational {
        self + (-rhs)
    }
}

impl Mul for Rational {
    type Output = Rational;

    fn mul(self, rhs: Rational) -> Rational {
        reduce_pair(
            self.num as i128 * rhs.num as i128,
            self.den as i128 * rhs.den as i128,
        )
    }
}

impl Div for Rational {
    type Output = Rational;

    fn div(self, rhs: Rational) -> Rational {
        self * rhs.invert()
    }
}

impl Neg for Rational {
    type Output = Rational;

    fn neg(self) -> Rational {
        Rational::new(self.num.wrapping_neg(), self.den)
    }
}

impl fmt::Debug for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl From<(i32, i32)> for Rational {
    fn from((num, den): (i32, i32)) -> Self {
        Self::new(num, den)
    }
}

impl From<i32> for Rational {
    fn from(num: i32) -> Self {
        Self::new(num, 1)
    }
}

/// Unit of a stream's timestamps, in seconds per tick.
///
/// Both parts are strictly positive, which is what makes rescaling between two
/// time bases well defined.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Rational", into = "Rational")]
pub struct TimeBase {
    num: i32,
    den: i32,
}

impl TimeBase {
    /// Microseconds, the library's internal time base.
    pub const MICROSECONDS: TimeBase = TimeBase {
        num: 1,
        den: 1_000_000,
    };
    pub const MILLISECONDS: TimeBase = TimeBase { num: 1, den: 1000 };
    /// MPEG-TS 90kHz clock.
    pub const MPEG: TimeBase = TimeBase { num: 1, den: 90000 };

    pub fn new(num: i32, den: i32) -> Result<Self> {
        if num <= 0 || den <= 0 {
            return Err(Error::invalid_argument(format!(
                "time base must be strictly positive, got {num}/{den}"
            )));
        }
        Ok(Self { num, den })
    }

    #[inline]
    pub const fn num(self) -> i32 {
        self.num
    }

    #[inline]
    pub const fn den(self) -> i32 {
        self.den
    }

    #[inline]
    pub const fn as_rational(self) -> Rational {
        Rational::new(self.num, self.den)
    }

    /// Seconds represented by `ticks` in this time base.
    pub fn seconds(self, ticks: i64) -> f64 {
        ticks as f64 * self.as_rational().to_f64()
    }
}

impl TryFrom<Rational> for TimeBase {
    type Error = Error;

    fn try_from(q: Rational) -> Result<Self> {
        Self::new(q.num, q.den)
    }
}

impl From<TimeBase> for Rational {
    fn from(tb: TimeBase) -> Self {
        tb.as_rational()
    }
}

impl FromStr for TimeBase {
    type Err = Error;

    /// Parses `num/den`, or a bare `den` meaning `1/den`.
    fn from_str(s: &str) -> Result<Self> {
        let parse = |part: &str| {
            part.trim()
                .parse::<i32>()
                .map_err(|e| Error::invalid_argument(format!("bad time base {s:?}: {e}")))
        };
        match s.split_once('/') {
            Some((num, den)) => Self::new(parse(num)?, parse(den)?),
            None => Self::new(1, parse(s)?),
        }
    }
}

impl fmt::Debug for TimeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl fmt::Display for TimeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}
