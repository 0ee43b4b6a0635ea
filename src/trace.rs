//! Concrete counterexample traces extracted from a satisfying model.
//!
//! A [`SolvedTrace`] is the presentation surface of the whole pipeline: one
//! row per timestep with the aggregate curves and every flow's sender state,
//! the solver's choice for the symbolic constants, and the raw name-to-value
//! assignment for anything not covered by the table (queueing-delay bits,
//! CCA helper series). The raw map is a `BTreeMap` so exports render in a
//! stable order.

use std::collections::BTreeMap;
use std::fmt;

use smallvec::SmallVec;

use crate::error::{ChokepointError, ChokepointResult};
use crate::vars::{TraceVars, VarSort};
use crate::Rat;

/// A concrete solver-assigned value for one trace variable.
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize)]
pub enum Value {
    /// A real variable's value as an exact rational.
    Rational(Rat),
    /// A boolean variable's value.
    Boolean(bool),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Rational(r) => write!(f, "{}", r),
            Value::Boolean(b) => write!(f, "{}", b),
        }
    }
}

/// One flow's sender state at a single timestep.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FlowRow {
    /// Cumulative data admitted by this flow.
    pub arrival: Rat,
    /// Cumulative data the link has served for this flow.
    pub service: Rat,
    /// Cumulative data dropped from this flow.
    pub lost: Rat,
    /// Losses the sender has detected so far.
    pub loss_detected: Rat,
    /// Congestion window.
    pub cwnd: Rat,
    /// Pacing rate.
    pub rate: Rat,
    /// Whether the retransmission timeout fired at this step.
    pub timeout: bool,
}

/// Aggregate link state at a single timestep, plus every flow's row.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TraceRow {
    /// The timestep this row describes.
    pub step: usize,
    /// Cumulative wasted capacity, signed.
    pub wasted: Rat,
    /// Cumulative service across all flows.
    pub total_service: Rat,
    /// Cumulative arrivals across all flows.
    pub total_arrival: Rat,
    /// Cumulative losses across all flows.
    pub total_lost: Rat,
    /// Per-flow sender state, indexed by flow.
    pub flows: SmallVec<[FlowRow; 2]>,
}

/// A full satisfying assignment, shaped for reading.
///
/// Obtained from [`QueryOutcome::Sat`](crate::QueryOutcome::Sat). The
/// `Display` impl renders the fixed-width table; everything else is exposed
/// through accessors so downstream tooling does not have to re-parse the
/// rendering.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SolvedTrace {
    rows: Vec<TraceRow>,
    alpha: Rat,
    dupacks: Rat,
    buffer: Option<Rat>,
    assignment: BTreeMap<String, Value>,
}

impl SolvedTrace {
    /// Shapes a raw assignment into rows, following the variable naming
    /// scheme of the pool in `vars`.
    pub(crate) fn materialize(
        vars: &TraceVars,
        assignment: BTreeMap<String, Value>,
    ) -> ChokepointResult<Self> {
        let rational = |name: String| -> ChokepointResult<Rat> {
            match assignment.get(&name) {
                Some(Value::Rational(r)) => Ok(*r),
                Some(Value::Boolean(_)) => Err(ChokepointError::SortMismatch {
                    expected: VarSort::Real.as_str(),
                    found: VarSort::Bool.as_str(),
                    context: name,
                }),
                None => Err(ChokepointError::ModelValueUnavailable { name }),
            }
        };
        let boolean = |name: String| -> ChokepointResult<bool> {
            match assignment.get(&name) {
                Some(Value::Boolean(b)) => Ok(*b),
                Some(Value::Rational(_)) => Err(ChokepointError::SortMismatch {
                    expected: VarSort::Bool.as_str(),
                    found: VarSort::Real.as_str(),
                    context: name,
                }),
                None => Err(ChokepointError::ModelValueUnavailable { name }),
            }
        };

        let mut rows = Vec::with_capacity(vars.steps());
        for t in 0..vars.steps() {
            let mut flows = SmallVec::with_capacity(vars.num_flows());
            for f in 0..vars.num_flows() {
                flows.push(FlowRow {
                    arrival: rational(format!("arrival_{f},{t}"))?,
                    service: rational(format!("service_{f},{t}"))?,
                    lost: rational(format!("losts_{f},{t}"))?,
                    loss_detected: rational(format!("loss_detected_{f},{t}"))?,
                    cwnd: rational(format!("cwnd_{f},{t}"))?,
                    rate: rational(format!("rate_{f},{t}"))?,
                    timeout: boolean(format!("timeout_{f},{t}"))?,
                });
            }
            rows.push(TraceRow {
                step: t,
                wasted: rational(format!("wasted_{t}"))?,
                total_service: rational(format!("tot_service_{t}"))?,
                total_arrival: rational(format!("tot_arrival_{t}"))?,
                total_lost: rational(format!("tot_lost_{t}"))?,
                flows,
            });
        }

        let alpha = rational("alpha".into())?;
        let dupacks = rational("dupacks".into())?;
        let buffer = match vars.buffer() {
            Some(_) => Some(rational("buffer".into())?),
            None => None,
        };

        Ok(Self {
            rows,
            alpha,
            dupacks,
            buffer,
            assignment,
        })
    }

    /// The per-timestep table, one row per step in order.
    #[must_use]
    pub fn rows(&self) -> &[TraceRow] {
        &self.rows
    }

    /// Number of timesteps in the trace.
    #[must_use]
    pub fn steps(&self) -> usize {
        self.rows.len()
    }

    /// Number of flows per row.
    #[must_use]
    pub fn num_flows(&self) -> usize {
        self.rows.first().map_or(0, |row| row.flows.len())
    }

    /// The solver's choice for the additive increment.
    #[must_use]
    pub fn alpha(&self) -> Rat {
        self.alpha
    }

    /// The solver's choice for the duplicate-ack threshold.
    #[must_use]
    pub fn dupacks(&self) -> Rat {
        self.dupacks
    }

    /// The chosen buffer size, when the buffer was finite.
    #[must_use]
    pub fn buffer(&self) -> Option<Rat> {
        self.buffer
    }

    /// The raw name-to-value assignment for every pool variable.
    #[must_use]
    pub fn assignment(&self) -> &BTreeMap<String, Value> {
        &self.assignment
    }

    /// Looks up one variable by its pool name.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.assignment.get(name)
    }
}

#[cfg(feature = "json")]
impl SolvedTrace {
    /// Serializes the trace to a compact JSON string.
    ///
    /// # Errors
    ///
    /// Returns the underlying serializer error.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Serializes the trace to an indented JSON string.
    ///
    /// # Errors
    ///
    /// Returns the underlying serializer error.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for SolvedTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>4} {:>9} {:>9} {:>9} {:>9}", "t", "W", "S", "A", "L")?;
        for flow in 0..self.num_flows() {
            write!(
                f,
                " {:>9} {:>9} {:>9} {:>5}",
                format!("Ld_{flow}"),
                format!("c_{flow}"),
                format!("r_{flow}"),
                format!("to_{flow}"),
            )?;
        }
        writeln!(f)?;

        for row in &self.rows {
            write!(
                f,
                "{:>4} {:>9} {:>9} {:>9} {:>9}",
                row.step,
                row.wasted.to_string(),
                row.total_service.to_string(),
                row.total_arrival.to_string(),
                row.total_lost.to_string(),
            )?;
            for flow in &row.flows {
                write!(
                    f,
                    " {:>9} {:>9} {:>9} {:>5}",
                    flow.loss_detected.to_string(),
                    flow.cwnd.to_string(),
                    flow.rate.to_string(),
                    if flow.timeout { "*" } else { "-" },
                )?;
            }
            writeln!(f)?;
        }

        write!(f, "alpha = {}, dupacks = {}", self.alpha, self.dupacks)?;
        if let Some(buffer) = self.buffer {
            write!(f, ", buffer = {}", buffer)?;
        }
        writeln!(f)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
