// SPDX-License-Identifier: Apache-2.0

//! Scalar probe values and the numeric-domain hooks the search strategies
//! dispatch on (bound comparison, interval splitting, verification-target
//! generation).

use std::cmp::Ordering;
use std::fmt;

use rand::Rng;

use crate::rand_utils::{unique_random_integers, unique_random_reals};

/// Digits kept when reporting real-valued bounds.
pub const REAL_ACCURACY: i32 = 2;
/// Relative/absolute tolerance for real-valued bound convergence.
pub const REAL_TOLERANCE: f64 = 1e-2;
/// Random samples drawn when seeding an all-values prior.
pub const ALL_PRIOR_SAMPLES: usize = 30;
/// Random samples drawn when verifying a discovered bound or interval.
pub const BIN_VERIFY_SAMPLES: usize = 30;
/// Cap on broadcast probe targets drawn from the observed values.
pub const MAX_BROADCAST_SAMPLES: isize = 5;

/// Inclusive limits of a signed integer type of the given bit width.
pub fn int_limits(bits: u32) -> (i64, i64) {
    assert!(bits >= 1 && bits <= 64, "unsupported integer bit width {}", bits);
    if bits == 64 {
        (i64::MIN, i64::MAX)
    } else {
        (-(1i64 << (bits - 1)), (1i64 << (bits - 1)) - 1)
    }
}

/// Smallest/largest positive magnitudes of a real type of the given bit
/// width.
pub fn real_limits(bits: u32) -> (f64, f64) {
    match bits {
        32 => (1.17549e-38, 3.40282e38),
        64 => (2.22507e-308, 1.79769e308),
        _ => panic!("unsupported real bit width {}", bits),
    }
}

/// `math.isclose` semantics: true when the values are within `rel_tol` of
/// the larger magnitude or within `abs_tol` absolutely. Infinities only
/// compare close to themselves; NaN is never close to anything.
pub fn isclose_tol(a: f64, b: f64, rel_tol: f64, abs_tol: f64) -> bool {
    if a == b {
        return true;
    }
    if !a.is_finite() || !b.is_finite() {
        return false;
    }
    (a - b).abs() <= f64::max(rel_tol * f64::max(a.abs(), b.abs()), abs_tol)
}

/// `isclose_tol` with the default tolerances (1e-9 relative, 0 absolute).
pub fn isclose(a: f64, b: f64) -> bool {
    isclose_tol(a, b, 1e-9, 0.0)
}

/// Round a real to `REAL_ACCURACY` digits for reporting. Values too large to
/// scale are returned unchanged.
pub fn round_for_report(x: f64) -> f64 {
    if !x.is_finite() {
        return x;
    }
    let scale = 10f64.powi(REAL_ACCURACY);
    let scaled = x * scale;
    if scaled.is_infinite() {
        x
    } else {
        scaled.round() / scale
    }
}

/// A probe value: either an integer or a real, tagged by domain.
///
/// Ordering and equality are total (reals order by `total_cmp`) so scalars
/// can key the `BTreeMap` histories the searches keep. Integers sort before
/// reals, though the two never mix within one path.
#[derive(Clone, Copy, Debug)]
pub enum Scalar {
    Int(i64),
    Real(f64),
}

impl Scalar {
    pub fn as_f64(self) -> f64 {
        match self {
            Scalar::Int(v) => v as f64,
            Scalar::Real(v) => v,
        }
    }

    pub fn as_int(self) -> i64 {
        match self {
            Scalar::Int(v) => v,
            Scalar::Real(_) => panic!("expected integer scalar"),
        }
    }

    pub fn as_real(self) -> f64 {
        match self {
            Scalar::Real(v) => v,
            Scalar::Int(_) => panic!("expected real scalar"),
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            Scalar::Int(v) => v == 0,
            Scalar::Real(v) => v == 0.0,
        }
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scalar {}

impl Ord for Scalar {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Scalar::Int(a), Scalar::Int(b)) => a.cmp(b),
            (Scalar::Real(a), Scalar::Real(b)) => a.total_cmp(b),
            (Scalar::Int(_), Scalar::Real(_)) => Ordering::Less,
            (Scalar::Real(_), Scalar::Int(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Scalar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{}", v),
            Scalar::Real(v) => write!(f, "{}", v),
        }
    }
}

/// The numeric domain a search operates in. Collapses the per-domain
/// strategy subclasses of the original design into enum dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NumericDomain {
    Integer,
    Real,
}

impl NumericDomain {
    pub fn of(s: Scalar) -> NumericDomain {
        match s {
            Scalar::Int(_) => NumericDomain::Integer,
            Scalar::Real(_) => NumericDomain::Real,
        }
    }

    /// Two bounds are "the same" when a bisection between them can stop:
    /// exact equality for integers, `REAL_TOLERANCE` closeness for reals.
    pub fn compare_bounds(self, a: Scalar, b: Scalar) -> bool {
        match self {
            NumericDomain::Integer => a.as_int() == b.as_int(),
            NumericDomain::Real => {
                isclose_tol(a.as_real(), b.as_real(), REAL_TOLERANCE, REAL_TOLERANCE)
            }
        }
    }

    /// Midpoint of `[left, right]`, biased toward `left` for integers.
    /// Requires `left <= right`; widens through i128 so the difference of
    /// i64 extremes cannot overflow.
    pub fn split_interval(self, left: Scalar, right: Scalar) -> Scalar {
        match self {
            NumericDomain::Integer => {
                let (l, r) = (left.as_int(), right.as_int());
                let half = ((r as i128 - l as i128) / 2) as i64;
                Scalar::Int(l + half)
            }
            NumericDomain::Real => {
                let (l, r) = (left.as_real(), right.as_real());
                Scalar::Real(l + (r - l) / 2.0)
            }
        }
    }

    /// Random targets strictly inside `(lower, upper)` used to verify a
    /// discovered interval. `None` when the interval has no interior worth
    /// sampling.
    pub fn range_verification_targets<R: Rng>(
        self,
        lower: Scalar,
        upper: Scalar,
        rng: &mut R,
    ) -> Option<Vec<Scalar>> {
        match self {
            NumericDomain::Integer => {
                let (l, u) = (lower.as_int(), upper.as_int());
                let interior = u as i128 - l as i128 - 1;
                if interior < 1 {
                    return None;
                }
                let num = interior.min(BIN_VERIFY_SAMPLES as i128) as usize;
                let vals = unique_random_integers(l, u, num, true, rng);
                Some(vals.into_iter().map(Scalar::Int).collect())
            }
            NumericDomain::Real => {
                let (l, u) = (lower.as_real(), upper.as_real());
                if !l.is_finite() || !u.is_finite() {
                    log::warn!("cannot verify non-finite interval [{},{}]", l, u);
                    return None;
                }
                if self.compare_bounds(lower, upper) {
                    return None;
                }
                let vals = if (u - l).is_infinite() {
                    unique_random_reals(u - f64::MAX, u, BIN_VERIFY_SAMPLES, rng)
                } else {
                    unique_random_reals(l, u, BIN_VERIFY_SAMPLES, rng)
                };
                Some(vals.into_iter().map(Scalar::Real).collect())
            }
        }
    }

    /// Random targets in `(0, final_bound)` used to verify a discovered
    /// one-sided bound.
    pub fn bound_verification_targets<R: Rng>(
        self,
        final_bound: Scalar,
        rng: &mut R,
    ) -> Option<Vec<Scalar>> {
        match self {
            NumericDomain::Integer => {
                let fb = final_bound.as_int();
                if fb < 2 {
                    return None;
                }
                let num = ((fb as i128 - 1).min(BIN_VERIFY_SAMPLES as i128)) as usize;
                let vals = unique_random_integers(0, fb, num, true, rng);
                Some(vals.into_iter().map(Scalar::Int).collect())
            }
            NumericDomain::Real => {
                let fb = final_bound.as_real();
                if !fb.is_finite() {
                    log::warn!("cannot verify non-finite bound {}", fb);
                    return None;
                }
                if self.compare_bounds(Scalar::Real(0.0), final_bound) {
                    return None;
                }
                let vals = unique_random_reals(0.0, fb, BIN_VERIFY_SAMPLES, rng);
                Some(vals.into_iter().map(Scalar::Real).collect())
            }
        }
    }

    pub fn zero(self) -> Scalar {
        match self {
            NumericDomain::Integer => Scalar::Int(0),
            NumericDomain::Real => Scalar::Real(0.0),
        }
    }

    pub fn one(self) -> Scalar {
        match self {
            NumericDomain::Integer => Scalar::Int(1),
            NumericDomain::Real => Scalar::Real(1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand_pcg::Pcg64Mcg;
    use test_case::test_case;

    #[test_case(1, -1, 0)]
    #[test_case(8, -128, 127)]
    #[test_case(16, -32768, 32767)]
    #[test_case(32, -2147483648, 2147483647)]
    #[test_case(64, i64::MIN, i64::MAX)]
    fn int_limits_cover_width(bits: u32, lo: i64, hi: i64) {
        assert_eq!(int_limits(bits), (lo, hi));
    }

    #[test]
    fn isclose_handles_edges() {
        assert!(isclose(1.0, 1.0));
        assert!(isclose(f64::INFINITY, f64::INFINITY));
        assert!(!isclose(f64::INFINITY, 1e308));
        assert!(!isclose(f64::NAN, f64::NAN));
        assert!(isclose_tol(100.0, 100.5, REAL_TOLERANCE, REAL_TOLERANCE));
        assert!(!isclose_tol(0.0, 0.5, REAL_TOLERANCE, REAL_TOLERANCE));
    }

    #[test]
    fn split_interval_int_is_floor_biased() {
        let d = NumericDomain::Integer;
        assert_eq!(d.split_interval(Scalar::Int(0), Scalar::Int(1)), Scalar::Int(0));
        assert_eq!(d.split_interval(Scalar::Int(4), Scalar::Int(9)), Scalar::Int(6));
        assert_eq!(
            d.split_interval(Scalar::Int(i64::MIN), Scalar::Int(i64::MAX)),
            Scalar::Int(-1)
        );
    }

    #[test]
    fn scalar_orders_reals_totally() {
        let mut vals = vec![Scalar::Real(3.5), Scalar::Real(-1.0), Scalar::Real(0.0)];
        vals.sort();
        assert_eq!(vals, vec![Scalar::Real(-1.0), Scalar::Real(0.0), Scalar::Real(3.5)]);
    }

    #[test]
    fn bound_targets_int_small_bound_is_none() {
        let mut rng = Pcg64Mcg::seed_from_u64(7);
        let d = NumericDomain::Integer;
        assert!(d.bound_verification_targets(Scalar::Int(1), &mut rng).is_none());
        let targets = d
            .bound_verification_targets(Scalar::Int(10), &mut rng)
            .unwrap();
        assert_eq!(targets.len(), 9);
        for t in targets {
            assert!(t > Scalar::Int(0) && t < Scalar::Int(10));
        }
    }

    #[test]
    fn range_targets_real_guard_infinite_span() {
        let mut rng = Pcg64Mcg::seed_from_u64(7);
        let d = NumericDomain::Real;
        let (_, max_pos) = real_limits(64);
        let targets = d
            .range_verification_targets(Scalar::Real(-max_pos), Scalar::Real(max_pos), &mut rng)
            .unwrap();
        assert_eq!(targets.len(), BIN_VERIFY_SAMPLES);
        for t in &targets {
            assert!(t.as_real().is_finite());
        }
    }

    #[test]
    fn round_for_report_keeps_extremes() {
        assert_eq!(round_for_report(1.2345), 1.23);
        assert_eq!(round_for_report(-2.678), -2.68);
        let (_, max_pos) = real_limits(64);
        assert_eq!(round_for_report(max_pos), max_pos);
    }
}
