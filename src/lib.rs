//! # Chokepoint
//!
//! Chokepoint builds bounded symbolic models of congestion control algorithms
//! sharing a bottleneck link, and hands them to an SMT solver. Instead of
//! simulating one packet trace at a time, it encodes *every* admissible trace
//! of a fixed horizon as a formula and asks Z3 whether a trace with a given
//! property exists. A satisfiable answer comes back as a concrete step-by-step
//! counterexample; an unsatisfiable answer is a proof that no such trace
//! exists within the horizon.
//!
//! The model follows the network-calculus formulation: cumulative arrivals,
//! service, losses and wasted capacity are real-valued symbolic sequences
//! constrained by link conservation laws, and each flow runs a congestion
//! control algorithm expressed as a recurrence over what its sender can
//! actually observe (acknowledgements delayed by the propagation time, loss
//! signals, timeouts).
//!
//! # Example
//!
//! ```
//! use chokepoint::{CcaKind, ModelConfig};
//!
//! // One AIMD flow over ten timesteps on a unit-capacity link.
//! let config = ModelConfig::builder().with_cca(CcaKind::Aimd).build()?;
//!
//! let (mut constraints, mut vars) = chokepoint::model::build(&config)?;
//! constraints.extend(chokepoint::cca::encode(&config, &mut vars)?);
//! assert!(!constraints.is_empty());
//! # Ok::<(), chokepoint::ChokepointError>(())
//! ```
//!
//! The usual entry points are the canned scenarios in [`queries`], which
//! assemble a configuration, a model and a property in one call and return a
//! ready-to-run [`Query`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub use config::{CcaKind, Composition, ModelConfig, ModelConfigBuilder};
pub use error::{ChokepointError, ChokepointResult};
pub use query::Query;
pub use solver::{QueryOutcome, SolveReport, Z3Adapter};
pub use term::{ConstraintSet, Term};
pub use trace::{SolvedTrace, Value};
pub use vars::TraceVars;

pub mod cca;
pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod periodic;
pub mod prelude;
pub mod queries;
pub mod query;
pub mod solver;
pub mod term;
pub mod trace;
pub mod vars;

// #############
// # RATIONALS #
// #############

/// An exact rational number with 64-bit numerator and denominator.
///
/// All quantities in the model (link capacity, buffer sizes, trace values
/// recovered from the solver) are exact rationals. Floating point never enters
/// the encoding, so a counterexample prints with the same numbers the solver
/// reasoned about.
///
/// # Representation
///
/// Every `Rat` is kept normalized: the denominator is strictly positive and
/// shares no common factor with the numerator. Because the representation is
/// canonical, the derived equality and hashing agree with numeric equality,
/// so `Rat::new(2, 4) == Rat::new(1, 2)` holds and both hash identically.
///
/// Arithmetic runs through 128-bit intermediates and reduces before storing,
/// so intermediate products cannot overflow. A result whose reduced form does
/// not fit 64 bits panics rather than silently wrapping.
///
/// # Examples
///
/// ```
/// use chokepoint::Rat;
///
/// let half = Rat::new(1, 2);
/// let third = Rat::new(1, 3);
///
/// assert_eq!(half + third, Rat::new(5, 6));
/// assert_eq!(half * third, Rat::new(1, 6));
/// assert!(third < half);
///
/// // Normalization is automatic, including the sign of the denominator.
/// assert_eq!(Rat::new(2, -4), Rat::new(-1, 2));
/// assert_eq!(Rat::from_int(3).to_string(), "3");
/// assert_eq!(half.to_string(), "1/2");
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, serde::Serialize)]
pub struct Rat {
    num: i64,
    den: i64,
}

impl Rat {
    /// The rational zero.
    pub const ZERO: Rat = Rat { num: 0, den: 1 };

    /// The rational one.
    pub const ONE: Rat = Rat { num: 1, den: 1 };

    /// Creates a rational from a numerator and denominator, normalizing the
    /// result.
    ///
    /// # Panics
    ///
    /// Panics if `den` is zero.
    #[must_use]
    pub fn new(num: i64, den: i64) -> Self {
        assert!(den != 0, "rational denominator must be non-zero");
        Self::reduced(i128::from(num), i128::from(den))
    }

    /// Creates a rational from an integer.
    #[inline]
    #[must_use]
    pub const fn from_int(value: i64) -> Self {
        Rat { num: value, den: 1 }
    }

    /// Returns the normalized numerator. Negative values carry the sign here.
    #[inline]
    #[must_use]
    pub const fn numer(self) -> i64 {
        self.num
    }

    /// Returns the normalized denominator. Always strictly positive.
    #[inline]
    #[must_use]
    pub const fn denom(self) -> i64 {
        self.den
    }

    /// Returns `true` if this rational is exactly zero.
    #[inline]
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.num == 0
    }

    /// Returns `true` if this rational is strictly negative.
    #[inline]
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.num < 0
    }

    /// Returns `true` if this rational is strictly positive.
    #[inline]
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.num > 0
    }

    /// Approximates this rational as an `f64`. Display formatting only; the
    /// model itself never touches floats.
    #[inline]
    #[must_use]
    pub fn to_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Normalizes a 128-bit numerator/denominator pair down to a stored `Rat`.
    ///
    /// Callers guarantee `den != 0`.
    fn reduced(mut num: i128, mut den: i128) -> Self {
        if den < 0 {
            num = -num;
            den = -den;
        }
        let g = gcd(num, den);
        if g > 1 {
            num /= g;
            den /= g;
        }
        assert!(
            num >= i128::from(i64::MIN)
                && num <= i128::from(i64::MAX)
                && den <= i128::from(i64::MAX),
            "rational arithmetic overflowed 64 bits"
        );
        Rat {
            num: num as i64,
            den: den as i64,
        }
    }
}

/// Greatest common divisor on 128-bit magnitudes. `gcd(0, b) == |b|`.
const fn gcd(mut a: i128, mut b: i128) -> i128 {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    if a < 0 {
        -a
    } else {
        a
    }
}

impl std::fmt::Display for Rat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

// Arithmetic operations

impl std::ops::Add for Rat {
    type Output = Rat;

    #[inline]
    fn add(self, rhs: Rat) -> Self::Output {
        let num =
            i128::from(self.num) * i128::from(rhs.den) + i128::from(rhs.num) * i128::from(self.den);
        let den = i128::from(self.den) * i128::from(rhs.den);
        Rat::reduced(num, den)
    }
}

impl std::ops::Sub for Rat {
    type Output = Rat;

    #[inline]
    fn sub(self, rhs: Rat) -> Self::Output {
        self + (-rhs)
    }
}

impl std::ops::Mul for Rat {
    type Output = Rat;

    #[inline]
    fn mul(self, rhs: Rat) -> Self::Output {
        let num = i128::from(self.num) * i128::from(rhs.num);
        let den = i128::from(self.den) * i128::from(rhs.den);
        Rat::reduced(num, den)
    }
}

impl std::ops::Neg for Rat {
    type Output = Rat;

    #[inline]
    fn neg(self) -> Self::Output {
        Rat {
            num: -self.num,
            den: self.den,
        }
    }
}

impl std::ops::AddAssign for Rat {
    #[inline]
    fn add_assign(&mut self, rhs: Rat) {
        *self = *self + rhs;
    }
}

// Ordering compares cross-products in 128 bits, which cannot overflow for
// 64-bit operands.

impl Ord for Rat {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        let lhs = i128::from(self.num) * i128::from(other.den);
        let rhs = i128::from(other.num) * i128::from(self.den);
        lhs.cmp(&rhs)
    }
}

impl PartialOrd for Rat {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

// Conversion traits

impl From<i64> for Rat {
    #[inline]
    fn from(value: i64) -> Self {
        Rat::from_int(value)
    }
}

impl From<i32> for Rat {
    #[inline]
    fn from(value: i32) -> Self {
        Rat::from_int(i64::from(value))
    }
}

impl From<usize> for Rat {
    #[inline]
    fn from(value: usize) -> Self {
        Rat::from_int(value as i64)
    }
}

// Deserialization re-normalizes, so hand-edited scenario files with
// un-reduced fractions still produce canonical values.
impl<'de> serde::Deserialize<'de> for Rat {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        struct Raw {
            num: i64,
            den: i64,
        }
        let raw = Raw::deserialize(deserializer)?;
        if raw.den == 0 {
            return Err(serde::de::Error::custom(
                "rational denominator must be non-zero",
            ));
        }
        Ok(Rat::new(raw.num, raw.den))
    }
}

// ###################
// # UNIT TESTS      #
// ###################

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    // ==========================================
    // Construction and Normalization
    // ==========================================

    #[test]
    fn new_reduces_to_lowest_terms() {
        assert_eq!(Rat::new(2, 4), Rat::new(1, 2));
        assert_eq!(Rat::new(6, 3), Rat::from_int(2));
        assert_eq!(Rat::new(0, 7), Rat::ZERO);
    }

    #[test]
    fn new_moves_sign_to_numerator() {
        let r = Rat::new(1, -2);
        assert_eq!(r.numer(), -1);
        assert_eq!(r.denom(), 2);
        assert_eq!(Rat::new(-3, -6), Rat::new(1, 2));
    }

    #[test]
    #[should_panic(expected = "denominator must be non-zero")]
    fn new_rejects_zero_denominator() {
        let _ = Rat::new(1, 0);
    }

    #[test]
    fn constants_are_canonical() {
        assert_eq!(Rat::ZERO, Rat::new(0, 5));
        assert_eq!(Rat::ONE, Rat::new(3, 3));
        assert!(Rat::ZERO.is_zero());
        assert!(Rat::ONE.is_positive());
    }

    #[test]
    fn from_conversions() {
        assert_eq!(Rat::from(7i64), Rat::from_int(7));
        assert_eq!(Rat::from(7i32), Rat::from_int(7));
        assert_eq!(Rat::from(7usize), Rat::from_int(7));
    }

    // ==========================================
    // Arithmetic
    // ==========================================

    #[test]
    fn addition_and_subtraction() {
        let a = Rat::new(1, 2);
        let b = Rat::new(1, 3);
        assert_eq!(a + b, Rat::new(5, 6));
        assert_eq!(a - b, Rat::new(1, 6));
        assert_eq!(b - a, Rat::new(-1, 6));
    }

    #[test]
    fn multiplication_reduces() {
        assert_eq!(Rat::new(2, 3) * Rat::new(3, 4), Rat::new(1, 2));
        assert_eq!(Rat::new(-1, 2) * Rat::new(1, 2), Rat::new(-1, 4));
        assert_eq!(Rat::from_int(5) * Rat::ZERO, Rat::ZERO);
    }

    #[test]
    fn negation() {
        assert_eq!(-Rat::new(1, 2), Rat::new(-1, 2));
        assert_eq!(-Rat::ZERO, Rat::ZERO);
        assert!((-Rat::ONE).is_negative());
    }

    #[test]
    fn add_assign_matches_add() {
        let mut a = Rat::new(1, 4);
        a += Rat::new(1, 4);
        assert_eq!(a, Rat::new(1, 2));
    }

    #[test]
    fn large_intermediates_reduce_back_down() {
        // Each operand is near the 32-bit range; the cross products exceed
        // 64 bits before reduction.
        let a = Rat::new(1, 3_000_000_000);
        let b = Rat::new(1, 3_000_000_000);
        assert_eq!(a * b, Rat::new(1, 9_000_000_000_000_000_000));
        assert_eq!(a - b, Rat::ZERO);
    }

    // ==========================================
    // Ordering
    // ==========================================

    #[test]
    fn ordering_across_denominators() {
        assert!(Rat::new(1, 3) < Rat::new(1, 2));
        assert!(Rat::new(2, 3) > Rat::new(1, 2));
        assert!(Rat::new(-1, 2) < Rat::new(1, 3));
        assert_eq!(
            Rat::new(2, 4).cmp(&Rat::new(1, 2)),
            std::cmp::Ordering::Equal
        );
    }

    #[test]
    fn hash_agrees_with_equality() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(Rat::new(1, 2));
        set.insert(Rat::new(2, 4));
        set.insert(Rat::new(3, 6));
        assert_eq!(set.len(), 1);
    }

    // ==========================================
    // Display
    // ==========================================

    #[test]
    fn display_integers_without_denominator() {
        assert_eq!(Rat::from_int(42).to_string(), "42");
        assert_eq!(Rat::new(-8, 2).to_string(), "-4");
        assert_eq!(Rat::new(7, 2).to_string(), "7/2");
        assert_eq!(Rat::new(-1, 3).to_string(), "-1/3");
    }

    #[test]
    fn to_f64_approximates() {
        assert!((Rat::new(1, 2).to_f64() - 0.5).abs() < f64::EPSILON);
        assert!((Rat::new(-1, 4).to_f64() + 0.25).abs() < f64::EPSILON);
    }

    // ==========================================
    // Serde
    // ==========================================

    #[test]
    fn serde_roundtrip() {
        let original = Rat::new(-7, 3);
        let json = serde_json::to_string(&original).unwrap();
        let back: Rat = serde_json::from_str(&json).unwrap();
        assert_eq!(original, back);
    }

    #[test]
    fn deserialize_normalizes() {
        let parsed: Rat = serde_json::from_str(r#"{"num":2,"den":-4}"#).unwrap();
        assert_eq!(parsed, Rat::new(-1, 2));
    }

    #[test]
    fn deserialize_rejects_zero_denominator() {
        let result: Result<Rat, _> = serde_json::from_str(r#"{"num":1,"den":0}"#);
        assert!(result.is_err());
    }
}
