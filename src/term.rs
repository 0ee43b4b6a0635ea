//! Symbolic constraint terms and labeled constraint collections.
//!
//! Every constraint the model emits is first built as a [`Term`]: an
//! explicit expression tree over linear real arithmetic and boolean
//! connectives, referencing variables by their [`VarId`]. Terms stay
//! solver-independent; the adapter in [`solver`](crate::solver) lowers them,
//! and [`export`](crate::export) renders them, from the same tree.
//!
//! Arithmetic uses the ordinary operators, comparisons and connectives use
//! builder methods, so a conservation law reads close to its math:
//!
//! ```
//! use chokepoint::{Rat, Term};
//! use chokepoint::vars::{VarPool, VarSort};
//!
//! let mut pool = VarPool::new();
//! let arrival = Term::from(pool.fresh("arrival", VarSort::Real));
//! let lost = Term::from(pool.fresh("lost", VarSort::Real));
//! let service = Term::from(pool.fresh("service", VarSort::Real));
//!
//! // Served data never exceeds what arrived and survived.
//! let conservation = service.le(arrival - lost);
//! ```
//!
//! Multiplication is deliberately restricted to scaling by a rational
//! constant, which keeps every expressible formula inside linear real
//! arithmetic where the solver is complete.
//!
//! `Term` intentionally does not implement `PartialEq`; `lhs.eq(rhs)` builds
//! the symbolic equality constraint instead of comparing trees. Compare
//! shapes in tests with `matches!`.

use crate::vars::VarId;
use crate::Rat;

/// One node of a symbolic constraint expression.
///
/// Terms are untyped trees; each node is either arithmetic (evaluating to a
/// real) or boolean. Sorts are checked when the tree is lowered for the
/// solver, so a malformed mix fails with a
/// [`SortMismatch`](crate::ChokepointError::SortMismatch) naming the
/// offending constraint rather than panicking mid-encode.
#[derive(Debug, Clone)]
pub enum Term {
    /// A rational constant.
    Const(Rat),
    /// A reference to a pool variable, real- or bool-sorted.
    Var(VarId),
    /// Sum of two arithmetic terms.
    Add(Box<Term>, Box<Term>),
    /// Difference of two arithmetic terms.
    Sub(Box<Term>, Box<Term>),
    /// An arithmetic term scaled by a rational constant.
    Scale(Rat, Box<Term>),
    /// `if cond { a } else { b }` over two arithmetic arms.
    Ite(Box<Term>, Box<Term>, Box<Term>),
    /// The boolean constant true.
    True,
    /// The boolean constant false.
    False,
    /// Boolean negation.
    Not(Box<Term>),
    /// N-ary conjunction.
    And(Vec<Term>),
    /// N-ary disjunction.
    Or(Vec<Term>),
    /// Boolean implication.
    Implies(Box<Term>, Box<Term>),
    /// Non-strict comparison of two arithmetic terms.
    Le(Box<Term>, Box<Term>),
    /// Strict comparison of two arithmetic terms.
    Lt(Box<Term>, Box<Term>),
    /// Equality of two arithmetic terms. Boolean equivalence is spelled
    /// [`iff`](Term::iff).
    Eq(Box<Term>, Box<Term>),
}

impl Term {
    /// Builds `self <= rhs`.
    #[must_use]
    pub fn le(self, rhs: impl Into<Term>) -> Term {
        Term::Le(Box::new(self), Box::new(rhs.into()))
    }

    /// Builds `self < rhs`.
    #[must_use]
    pub fn lt(self, rhs: impl Into<Term>) -> Term {
        Term::Lt(Box::new(self), Box::new(rhs.into()))
    }

    /// Builds `self >= rhs`.
    #[must_use]
    pub fn ge(self, rhs: impl Into<Term>) -> Term {
        Term::Le(Box::new(rhs.into()), Box::new(self))
    }

    /// Builds `self > rhs`.
    #[must_use]
    pub fn gt(self, rhs: impl Into<Term>) -> Term {
        Term::Lt(Box::new(rhs.into()), Box::new(self))
    }

    /// Builds the symbolic equality `self == rhs`.
    ///
    /// This shadows nothing: `Term` has no `PartialEq`, so `eq` always means
    /// the constraint constructor.
    #[must_use]
    pub fn eq(self, rhs: impl Into<Term>) -> Term {
        Term::Eq(Box::new(self), Box::new(rhs.into()))
    }

    /// Builds `self => rhs`.
    #[must_use]
    pub fn implies(self, rhs: impl Into<Term>) -> Term {
        Term::Implies(Box::new(self), Box::new(rhs.into()))
    }

    /// Builds the biconditional `self <=> rhs` as a pair of implications,
    /// keeping [`Term::Eq`] arithmetic-only.
    #[must_use]
    pub fn iff(self, rhs: impl Into<Term>) -> Term {
        let rhs = rhs.into();
        Term::And(vec![self.clone().implies(rhs.clone()), rhs.implies(self)])
    }

    /// Builds boolean negation.
    #[must_use]
    pub fn not(self) -> Term {
        Term::Not(Box::new(self))
    }

    /// Builds `if self { then_term } else { else_term }` with `self` as the
    /// boolean condition.
    #[must_use]
    pub fn ite(self, then_term: impl Into<Term>, else_term: impl Into<Term>) -> Term {
        Term::Ite(
            Box::new(self),
            Box::new(then_term.into()),
            Box::new(else_term.into()),
        )
    }

    /// Conjunction of every term. The empty conjunction is `True`; a single
    /// term passes through unchanged.
    #[must_use]
    pub fn and_all(mut terms: Vec<Term>) -> Term {
        match terms.len() {
            0 => Term::True,
            1 => terms.remove(0),
            _ => Term::And(terms),
        }
    }

    /// Disjunction of every term. The empty disjunction is `False`; a single
    /// term passes through unchanged.
    #[must_use]
    pub fn or_any(mut terms: Vec<Term>) -> Term {
        match terms.len() {
            0 => Term::False,
            1 => terms.remove(0),
            _ => Term::Or(terms),
        }
    }

    /// Sum of every term. The empty sum is the constant zero.
    #[must_use]
    pub fn sum(terms: Vec<Term>) -> Term {
        let mut iter = terms.into_iter();
        match iter.next() {
            None => Term::Const(Rat::ZERO),
            Some(first) => iter.fold(first, |acc, t| acc + t),
        }
    }
}

impl From<Rat> for Term {
    fn from(value: Rat) -> Self {
        Term::Const(value)
    }
}

impl From<i64> for Term {
    fn from(value: i64) -> Self {
        Term::Const(Rat::from_int(value))
    }
}

impl From<VarId> for Term {
    fn from(id: VarId) -> Self {
        Term::Var(id)
    }
}

impl<T: Into<Term>> std::ops::Add<T> for Term {
    type Output = Term;

    fn add(self, rhs: T) -> Term {
        Term::Add(Box::new(self), Box::new(rhs.into()))
    }
}

impl<T: Into<Term>> std::ops::Sub<T> for Term {
    type Output = Term;

    fn sub(self, rhs: T) -> Term {
        Term::Sub(Box::new(self), Box::new(rhs.into()))
    }
}

impl std::ops::Neg for Term {
    type Output = Term;

    fn neg(self) -> Term {
        Term::Scale(-Rat::ONE, Box::new(self))
    }
}

impl std::ops::Mul<Rat> for Term {
    type Output = Term;

    fn mul(self, rhs: Rat) -> Term {
        Term::Scale(rhs, Box::new(self))
    }
}

// Rational-on-the-left forms, so formulas can read `C*t - wasted` the way
// the math is written.

impl std::ops::Add<Term> for Rat {
    type Output = Term;

    fn add(self, rhs: Term) -> Term {
        Term::Add(Box::new(Term::Const(self)), Box::new(rhs))
    }
}

impl std::ops::Sub<Term> for Rat {
    type Output = Term;

    fn sub(self, rhs: Term) -> Term {
        Term::Sub(Box::new(Term::Const(self)), Box::new(rhs))
    }
}

impl std::ops::Mul<Term> for Rat {
    type Output = Term;

    fn mul(self, rhs: Term) -> Term {
        Term::Scale(self, Box::new(rhs))
    }
}

/// An ordered collection of labeled constraints.
///
/// Labels name the constraint group and instance (`"waste[3]"`,
/// `"cwnd_recurrence[0][5]"`). They surface in three places: unsat cores,
/// sort-mismatch errors, and the SMT-LIB dump. Order is preserved so dumps
/// and solver runs are reproducible.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    items: Vec<(String, Term)>,
}

impl ConstraintSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        ConstraintSet { items: Vec::new() }
    }

    /// Appends one labeled constraint.
    pub fn push(&mut self, label: impl Into<String>, term: Term) {
        self.items.push((label.into(), term));
    }

    /// Moves every constraint of `other` to the end of `self`.
    pub fn extend(&mut self, other: ConstraintSet) {
        self.items.extend(other.items);
    }

    /// Number of constraints in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the set holds no constraints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates constraints in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &(String, Term)> {
        self.items.iter()
    }
}

impl IntoIterator for ConstraintSet {
    type Item = (String, Term);
    type IntoIter = std::vec::IntoIter<(String, Term)>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a ConstraintSet {
    type Item = &'a (String, Term);
    type IntoIter = std::slice::Iter<'a, (String, Term)>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
