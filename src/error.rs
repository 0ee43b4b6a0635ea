//! Error types for configuration, assembly, and extraction failures.

use std::error::Error;
use std::fmt;
use std::fmt::Display;

use crate::config::CcaKind;
use crate::Rat;

/// This enum contains all error conditions this library can return. Most API functions
/// will generally return a [`ChokepointResult`].
///
/// Solver verdicts are deliberately *not* errors: satisfiable, unsatisfiable and
/// unknown all travel as [`QueryOutcome`](crate::solver::QueryOutcome) data the
/// caller branches on. Errors are reserved for conditions that prevent a
/// well-formed query from existing at all: inconsistent configurations,
/// ill-sorted property terms, and assignments the extractor cannot represent
/// exactly.
#[derive(Debug, Clone, PartialEq, Hash)]
pub enum ChokepointError {
    /// A rational configuration parameter that must be strictly positive was not.
    NonPositiveParameter {
        /// Name of the offending configuration field.
        field: &'static str,
        /// The rejected value.
        value: Rat,
    },
    /// An integer configuration parameter that must be at least one was zero.
    ZeroParameter {
        /// Name of the offending configuration field.
        field: &'static str,
    },
    /// The trace horizon is too short to express any property.
    HorizonTooShort {
        /// The requested horizon.
        horizon: usize,
        /// The smallest accepted horizon.
        minimum: usize,
    },
    /// The configured buffer range is empty.
    BufferBoundsInverted {
        /// Configured minimum buffer size.
        buf_min: Rat,
        /// Configured maximum buffer size.
        buf_max: Rat,
    },
    /// The selected CCA consumes queueing-delay signals, but the signal grid was not enabled.
    QdelRequired {
        /// The CCA that was selected without `calculate_qdel`.
        cca: CcaKind,
    },
    /// A periodicity reduction was requested with a period outside `1..=T`.
    PeriodOutOfRange {
        /// The requested period.
        period: usize,
        /// The trace horizon the period must fit inside.
        horizon: usize,
    },
    /// A term used a boolean where arithmetic was required, or vice versa.
    SortMismatch {
        /// The sort the surrounding operation needed.
        expected: &'static str,
        /// The sort the term actually had.
        found: &'static str,
        /// Which constraint the mismatch was found in.
        context: String,
    },
    /// A rational constant does not fit the solver's literal constructor.
    ConstantOverflow {
        /// The constant that could not be lowered.
        value: Rat,
    },
    /// The solver's model did not bind a declared variable.
    ModelValueUnavailable {
        /// Name of the unbound variable.
        name: String,
    },
    /// A model value could not be recovered as a 64-bit rational.
    NonRationalValue {
        /// Name of the variable whose value was unrepresentable.
        name: String,
    },
}

impl Display for ChokepointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChokepointError::NonPositiveParameter { field, value } => {
                write!(
                    f,
                    "Configuration field `{}` must be strictly positive, got {}",
                    field, value
                )
            }
            ChokepointError::ZeroParameter { field } => {
                write!(f, "Configuration field `{}` must be at least 1, got 0", field)
            }
            ChokepointError::HorizonTooShort { horizon, minimum } => {
                write!(
                    f,
                    "Horizon must span at least {} steps to express a property, got {}",
                    minimum, horizon
                )
            }
            ChokepointError::BufferBoundsInverted { buf_min, buf_max } => {
                write!(
                    f,
                    "Buffer bounds are inverted: buf_min {} exceeds buf_max {}",
                    buf_min, buf_max
                )
            }
            ChokepointError::QdelRequired { cca } => {
                write!(
                    f,
                    "CCA {:?} consumes queueing-delay signals; enable calculate_qdel",
                    cca
                )
            }
            ChokepointError::PeriodOutOfRange { period, horizon } => {
                write!(
                    f,
                    "Periodicity period must lie in 1..={}, got {}",
                    horizon, period
                )
            }
            ChokepointError::SortMismatch {
                expected,
                found,
                context,
            } => {
                write!(
                    f,
                    "Sort mismatch in {}: expected a {} term, found a {} term",
                    context, expected, found
                )
            }
            ChokepointError::ConstantOverflow { value } => {
                write!(
                    f,
                    "Rational constant {} does not fit the solver's 32-bit literal range",
                    value
                )
            }
            ChokepointError::ModelValueUnavailable { name } => {
                write!(f, "Solver model did not bind variable `{}`", name)
            }
            ChokepointError::NonRationalValue { name } => {
                write!(
                    f,
                    "Value of `{}` is not representable as a 64-bit rational",
                    name
                )
            }
        }
    }
}

impl Error for ChokepointError {}

/// Shorthand for results produced by this crate.
pub type ChokepointResult<T> = Result<T, ChokepointError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn display_mentions_field_names() {
        let err = ChokepointError::NonPositiveParameter {
            field: "capacity",
            value: Rat::from_int(0),
        };
        let msg = err.to_string();
        assert!(msg.contains("capacity"), "message was: {msg}");
        assert!(msg.contains('0'), "message was: {msg}");
    }

    #[test]
    fn display_period_out_of_range() {
        let err = ChokepointError::PeriodOutOfRange {
            period: 12,
            horizon: 10,
        };
        let msg = err.to_string();
        assert!(msg.contains("1..=10"), "message was: {msg}");
        assert!(msg.contains("12"), "message was: {msg}");
    }

    #[test]
    fn display_sort_mismatch_names_both_sorts() {
        let err = ChokepointError::SortMismatch {
            expected: "boolean",
            found: "arithmetic",
            context: "constraint `waste[3]`".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("boolean"), "message was: {msg}");
        assert!(msg.contains("arithmetic"), "message was: {msg}");
        assert!(msg.contains("waste[3]"), "message was: {msg}");
    }

    #[test]
    fn error_trait_object_is_usable() {
        let err: Box<dyn Error> = Box::new(ChokepointError::HorizonTooShort {
            horizon: 1,
            minimum: 2,
        });
        assert!(err.to_string().contains("Horizon"));
    }
}
