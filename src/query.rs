//! Assembly of a solver query from base constraints, scenario pins, and the
//! property under search.
//!
//! The three layers are kept apart so diagnostics can tell them apart: an
//! unsat core naming a base constraint points at the model, one naming an
//! assumption points at the scenario. At solve time all three are asserted
//! unconditionally; assembly can narrow the search space but never widen it
//! past what the base model allows.

use crate::term::{ConstraintSet, Term};

/// A complete satisfiability question for [`Z3Adapter`](crate::Z3Adapter).
///
/// Built from the base model (plus CCA and periodicity constraints), then
/// extended with scenario assumptions and the target property:
///
/// ```
/// use chokepoint::{ModelConfig, Query};
///
/// # fn main() -> chokepoint::ChokepointResult<()> {
/// let config = ModelConfig::default();
/// let (mut constraints, mut vars) = chokepoint::model::build(&config)?;
/// constraints.extend(chokepoint::cca::encode(&config, &mut vars)?);
///
/// let query = Query::new(constraints)
///     .assume("no_initial_loss", vars.total_lost(0).eq(0i64))
///     .target("link_underused", vars.total_service(10).lt(5i64));
/// assert_eq!(query.len(), query.base().len() + 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Query {
    base: ConstraintSet,
    assumptions: ConstraintSet,
    targets: ConstraintSet,
}

impl Query {
    /// Wraps the base constraints of a fully built model.
    #[must_use]
    pub fn new(base: ConstraintSet) -> Self {
        Self {
            base,
            assumptions: ConstraintSet::new(),
            targets: ConstraintSet::new(),
        }
    }

    /// Adds a scenario pin: initial conditions, parameter caps, excluded
    /// behaviors.
    #[must_use]
    pub fn assume(mut self, label: impl Into<String>, term: Term) -> Self {
        self.assumptions.push(label, term);
        self
    }

    /// Adds the property being searched for, phrased so that sat means the
    /// behavior is reachable.
    #[must_use]
    pub fn target(mut self, label: impl Into<String>, term: Term) -> Self {
        self.targets.push(label, term);
        self
    }

    /// The base model constraints.
    #[must_use]
    pub fn base(&self) -> &ConstraintSet {
        &self.base
    }

    /// The scenario assumptions added so far.
    #[must_use]
    pub fn assumptions(&self) -> &ConstraintSet {
        &self.assumptions
    }

    /// The target properties added so far.
    #[must_use]
    pub fn targets(&self) -> &ConstraintSet {
        &self.targets
    }

    /// Every labelled constraint in assertion order: base, then assumptions,
    /// then targets.
    pub fn iter(&self) -> impl Iterator<Item = &(String, Term)> {
        self.base
            .iter()
            .chain(self.assumptions.iter())
            .chain(self.targets.iter())
    }

    /// Total number of constraints across all three layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.base.len() + self.assumptions.len() + self.targets.len()
    }

    /// Returns `true` when no constraints have been collected at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
