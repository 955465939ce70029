//! Overflow-free timestamp rescaling between time bases.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::rational::TimeBase;

/// Undefined timestamp value, reported by demuxers for containers that do not
/// carry pts or dts. Also the value returned when a rescale is out of range.
pub const NOPTS_VALUE: i64 = i64::MIN;

/// Rounding methods.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rounding {
    /// Round toward zero.
    Zero,
    /// Round away from zero.
    Inf,
    /// Round toward -infinity.
    Down,
    /// Round toward +infinity.
    Up,
    /// Round to nearest and halfway cases away from zero.
    #[default]
    NearInf,
}

impl Rounding {
    /// Rounding that gives the mirrored result for the absolute value of a
    /// negative operand.
    fn mirrored(self) -> Self {
        match self {
            Rounding::Down => Rounding::Up,
            Rounding::Up => Rounding::Down,
            other => other,
        }
    }
}

impl FromStr for Rounding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "zero" => Ok(Rounding::Zero),
            "inf" => Ok(Rounding::Inf),
            "down" => Ok(Rounding::Down),
            "up" => Ok(Rounding::Up),
            "near-inf" | "near_inf" | "nearest" => Ok(Rounding::NearInf),
            other => Err(Error::invalid_argument(format!(
                "unknown rounding {other:?}"
            ))),
        }
    }
}

impl fmt::Display for Rounding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Rounding::Zero => "zero",
            Rounding::Inf => "inf",
            Rounding::Down => "down",
            Rounding::Up => "up",
            Rounding::NearInf => "near-inf",
        };
        f.write_str(name)
    }
}

/// A rounding method plus the pass-min-max policy bit.
///
/// With `pass_min_max` set, `i64::MIN` and `i64::MAX` are returned unchanged,
/// so the unknown-timestamp sentinel survives a rescale.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rnd {
    pub rounding: Rounding,
    #[serde(default)]
    pub pass_min_max: bool,
}

impl Rnd {
    /// Policy used when copying timestamps between streams.
    pub const NEAR_INF_PASS_MINMAX: Rnd = Rnd {
        rounding: Rounding::NearInf,
        pass_min_max: true,
    };

    pub const fn new(rounding: Rounding) -> Self {
        Self {
            rounding,
            pass_min_max: false,
        }
    }

    pub const fn pass_min_max(self) -> Self {
        Self {
            rounding: self.rounding,
            pass_min_max: true,
        }
    }
}

impl From<Rounding> for Rnd {
    fn from(rounding: Rounding) -> Self {
        Rnd::new(rounding)
    }
}

/// Computes `a * b / c` with the given rounding.
///
/// The intermediate product is exact. Returns [`NOPTS_VALUE`] for `c <= 0`,
/// `b < 0`, or a result outside the `i64` range.
pub fn rescale_rnd(a: i64, b: i64, c: i64, rnd: impl Into<Rnd>) -> i64 {
    let rnd = rnd.into();
    if c <= 0 || b < 0 {
        return NOPTS_VALUE;
    }
    if rnd.pass_min_max && (a == i64::MIN || a == i64::MAX) {
        return a;
    }

    if a < 0 {
        // Work on the magnitude and mirror the directional roundings.
        let magnitude = rescale_rnd(
            (a as i128).max(-(i64::MAX as i128)).unsigned_abs() as i64,
            b,
            c,
            Rnd::new(rnd.rounding.mirrored()),
        );
        return magnitude.wrapping_neg();
    }

    let (a, b, c) = (a as i128, b as i128, c as i128);
    let r = match rnd.rounding {
        Rounding::NearInf => c / 2,
        Rounding::Inf | Rounding::Up => c - 1,
        Rounding::Zero | Rounding::Down => 0,
    };
    let value = (a * b + r) / c;
    i64::try_from(value).unwrap_or(NOPTS_VALUE)
}

/// Computes `a * b / c` rounding to nearest.
pub fn rescale(a: i64, b: i64, c: i64) -> i64 {
    rescale_rnd(a, b, c, Rounding::NearInf)
}

/// Rescales `value` from time base `from` to time base `to`.
pub fn rescale_q_rnd(value: i64, from: TimeBase, to: TimeBase, rnd: impl Into<Rnd>) -> i64 {
    let b = from.num() as i64 * to.den() as i64;
    let c = to.num() as i64 * from.den() as i64;
    rescale_rnd(value, b, c, rnd)
}

/// Rescales `value` from `from` to `to`, rounding to nearest.
pub fn rescale_q(value: i64, from: TimeBase, to: TimeBase) -> i64 {
    rescale_q_rnd(value, from, to, Rounding::NearInf)
}

/// Compares two timestamps, each in its own time base.
pub fn compare_ts(ts_a: i64, tb_a: TimeBase, ts_b: i64, tb_b: TimeBase) -> Ordering {
    let lhs = ts_a as i128 * tb_a.num() as i128 * tb_b.den() as i128;
    let rhs = ts_b as i128 * tb_b.num() as i128 * tb_a.den() as i128;
    lhs.cmp(&rhs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tb(num: i32, den: i32) -> TimeBase {
        TimeBase::new(num, den).unwrap()
    }

    const ALL: [Rounding; 5] = [
        Rounding::Zero,
        Rounding::Inf,
        Rounding::Down,
        Rounding::Up,
        Rounding::NearInf,
    ];

    #[test]
    fn doubles_when_denominator_doubles() {
        assert_eq!(rescale_q_rnd(3, tb(1, 1), tb(1, 2), Rounding::NearInf), 6);
    }

    #[test]
    fn ticks_to_seconds_rounding_down() {
        assert_eq!(rescale_q_rnd(100, tb(1, 25), tb(1, 1), Rounding::Down), 4);
    }

    #[test]
    fn mpeg_clock_to_milliseconds() {
        let pts = rescale_q_rnd(1000, TimeBase::MPEG, TimeBase::MILLISECONDS, Rnd::NEAR_INF_PASS_MINMAX);
        assert_eq!(pts, 11);
    }

    #[test]
    fn identity_for_every_rounding() {
        let bases = [tb(1, 1), tb(1, 90000), tb(1001, 30000), tb(7, 3)];
        let values = [0, 1, -1, 42, -12345, 1 << 40, -(1 << 40), i64::MAX - 1, i64::MIN + 1];
        for base in bases {
            for rounding in ALL {
                for v in values {
                    assert_eq!(rescale_q_rnd(v, base, base, rounding), v, "{v} {base} {rounding}");
                }
            }
        }
    }

    #[test]
    fn sentinels_pass_through() {
        for rounding in ALL {
            let rnd = Rnd::new(rounding).pass_min_max();
            assert_eq!(rescale_q_rnd(NOPTS_VALUE, tb(1, 90000), tb(1, 1000), rnd), NOPTS_VALUE);
            assert_eq!(rescale_q_rnd(i64::MAX, tb(1, 25), tb(1, 48000), rnd), i64::MAX);
        }
    }

    #[test]
    fn sentinel_is_corrupted_without_pass_through() {
        let v = rescale_q_rnd(NOPTS_VALUE, tb(1, 90000), tb(1, 1000), Rounding::NearInf);
        assert_ne!(v, NOPTS_VALUE);
    }

    #[test]
    fn rounding_modes() {
        // 7 / 2 = 3.5
        assert_eq!(rescale_rnd(7, 1, 2, Rounding::Zero), 3);
        assert_eq!(rescale_rnd(7, 1, 2, Rounding::Inf), 4);
        assert_eq!(rescale_rnd(7, 1, 2, Rounding::Down), 3);
        assert_eq!(rescale_rnd(7, 1, 2, Rounding::Up), 4);
        assert_eq!(rescale_rnd(7, 1, 2, Rounding::NearInf), 4);
        // -7 / 2 = -3.5
        assert_eq!(rescale_rnd(-7, 1, 2, Rounding::Zero), -3);
        assert_eq!(rescale_rnd(-7, 1, 2, Rounding::Inf), -4);
        assert_eq!(rescale_rnd(-7, 1, 2, Rounding::Down), -4);
        assert_eq!(rescale_rnd(-7, 1, 2, Rounding::Up), -3);
        assert_eq!(rescale_rnd(-7, 1, 2, Rounding::NearInf), -4);
        // 10 / 3 = 3.33
        assert_eq!(rescale_rnd(10, 1, 3, Rounding::NearInf), 3);
        assert_eq!(rescale_rnd(-10, 1, 3, Rounding::NearInf), -3);
    }

    #[test]
    fn no_intermediate_overflow() {
        // a * b overflows i64 but the result fits.
        assert_eq!(rescale_rnd(i64::MAX / 2, 4, 8, Rounding::Zero), i64::MAX / 4);
        assert_eq!(
            rescale_q(1 << 62, TimeBase::MPEG, TimeBase::MPEG),
            1 << 62
        );
    }

    #[test]
    fn out_of_range_is_nopts() {
        assert_eq!(rescale_rnd(i64::MAX - 1, 2, 1, Rounding::Zero), NOPTS_VALUE);
        assert_eq!(rescale_rnd(1, 1, 0, Rounding::Zero), NOPTS_VALUE);
        assert_eq!(rescale_rnd(1, -1, 1, Rounding::Zero), NOPTS_VALUE);
    }

    #[test]
    fn compare_across_time_bases() {
        assert_eq!(compare_ts(90000, TimeBase::MPEG, 1000, TimeBase::MILLISECONDS), Ordering::Equal);
        assert_eq!(compare_ts(1, tb(1, 2), 1, tb(1, 3)), Ordering::Greater);
        assert_eq!(compare_ts(-5, tb(1, 1), 0, tb(1, 1000)), Ordering::Less);
    }

    #[test]
    fn rounding_from_str() {
        assert_eq!("near-inf".parse::<Rounding>().unwrap(), Rounding::NearInf);
        assert_eq!("down".parse::<Rounding>().unwrap(), Rounding::Down);
        assert!("sideways".parse::<Rounding>().is_err());
        assert_eq!(Rounding::Up.to_string(), "up");
    }
}
