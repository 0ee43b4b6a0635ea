//! The Z3 boundary: lowering, solving, and verdict mapping.
//!
//! [`Z3Adapter::run`] is the only place the `z3` crate is touched. Terms are
//! lowered sort-checked, every labeled constraint is asserted, and the
//! solver's answer comes back as [`QueryOutcome`] data. Sat, unsat, and
//! unknown are all ordinary outcomes; an `Err` from `run` means the query
//! itself was malformed (a non-boolean constraint, a constant outside Z3's
//! literal range) or a satisfying model could not be read back.
//!
//! Each thread gets its own Z3 context from the `z3` crate, so adapters may
//! be used from multiple threads as long as every `run` call stays on one.

use std::collections::BTreeMap;

use tracing::{debug, warn};
use web_time::{Duration, Instant};
use z3::ast::{Ast, Bool, Real};
use z3::{Params, SatResult, Solver};

use crate::config::ModelConfig;
use crate::error::{ChokepointError, ChokepointResult};
use crate::query::Query;
use crate::term::Term;
use crate::trace::{SolvedTrace, Value};
use crate::vars::{TraceVars, VarSort};
use crate::Rat;

/// The solver's answer to a query, as data.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// The constraints are satisfiable; the extracted witness trace.
    Sat(SolvedTrace),
    /// The constraints are unsatisfiable. When core tracking was enabled,
    /// `core` names a subset of constraint labels that already conflict.
    Unsat {
        /// Labels of a conflicting constraint subset, if tracked.
        core: Option<Vec<String>>,
    },
    /// The solver gave up, usually on timeout. Never conflated with unsat.
    Unknown {
        /// The solver's stated reason.
        reason: String,
    },
}

impl QueryOutcome {
    /// Returns `true` for a satisfiable verdict.
    #[must_use]
    pub fn is_sat(&self) -> bool {
        matches!(self, QueryOutcome::Sat(_))
    }

    /// Returns `true` for an unsatisfiable verdict.
    #[must_use]
    pub fn is_unsat(&self) -> bool {
        matches!(self, QueryOutcome::Unsat { .. })
    }

    /// The witness trace, when the verdict was sat.
    #[must_use]
    pub fn trace(&self) -> Option<&SolvedTrace> {
        match self {
            QueryOutcome::Sat(trace) => Some(trace),
            QueryOutcome::Unsat { .. } | QueryOutcome::Unknown { .. } => None,
        }
    }

    /// Short verdict name for logs.
    #[must_use]
    pub fn verdict(&self) -> &'static str {
        match self {
            QueryOutcome::Sat(_) => "sat",
            QueryOutcome::Unsat { .. } => "unsat",
            QueryOutcome::Unknown { .. } => "unknown",
        }
    }
}

/// Outcome of one solver run plus its cost.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveReport {
    /// The verdict and any attached witness or core.
    pub outcome: QueryOutcome,
    /// Wall-clock time spent in `run`, including extraction.
    pub elapsed: Duration,
    /// Number of Z3 constants declared for the trace pool.
    pub vars_declared: usize,
    /// Number of labeled constraints asserted.
    pub constraints_asserted: usize,
}

/// Drives Z3 over an assembled [`Query`].
///
/// Carries only the two solve-time switches from [`ModelConfig`]; the model
/// itself always arrives through the query.
#[derive(Debug, Clone)]
pub struct Z3Adapter {
    simplify: bool,
    unsat_core: bool,
}

impl Z3Adapter {
    /// Captures the solve-time switches from a configuration.
    #[must_use]
    pub fn from_config(config: &ModelConfig) -> Self {
        if config.simplify {
            warn!("Simplification enabled: asserted terms will not match the authored constraints in dumps and cores");
        }
        Self {
            simplify: config.simplify,
            unsat_core: config.unsat_core,
        }
    }

    /// Solves one query against a fresh solver.
    ///
    /// Declares one Z3 constant per pool variable in `vars`, asserts every
    /// constraint in `query`, and checks under the given wall-clock budget.
    /// Timeouts surface as [`QueryOutcome::Unknown`].
    ///
    /// # Errors
    ///
    /// Returns an error when a constraint lowers to a non-boolean term, a
    /// rational constant does not fit Z3's literal constructor, or a
    /// satisfying model cannot be evaluated back into rationals.
    pub fn run(
        &self,
        query: &Query,
        vars: &TraceVars,
        timeout: Duration,
    ) -> ChokepointResult<SolveReport> {
        let started = Instant::now();
        let solver = Solver::new();

        let ms = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX);
        let mut params = Params::new();
        params.set_u32("timeout", ms);
        params.set_u32("solver2_timeout", ms);
        solver.set_params(&params);

        let consts: Vec<Lowered> = vars
            .pool()
            .iter()
            .map(|(_, name, sort)| match sort {
                VarSort::Real => Lowered::Real(Real::new_const(name)),
                VarSort::Bool => Lowered::Bool(Bool::new_const(name)),
            })
            .collect();

        debug!(
            "Running solver: {} constraints, {} variables, {} ms budget",
            query.len(),
            consts.len(),
            ms
        );

        let mut trackers: Vec<(String, Bool)> = Vec::new();
        for (i, (label, term)) in query.iter().enumerate() {
            let lowered = lower(term, &consts, label)?.into_bool(label)?;
            let lowered = if self.simplify {
                lowered.simplify()
            } else {
                lowered
            };
            if self.unsat_core {
                let marker = Bool::new_const(format!("track!{i}"));
                solver.assert(&marker.implies(&lowered));
                trackers.push((label.clone(), marker));
            } else {
                solver.assert(&lowered);
            }
        }

        let verdict = if self.unsat_core {
            let assumptions: Vec<Bool> =
                trackers.iter().map(|(_, marker)| marker.clone()).collect();
            solver.check_assumptions(&assumptions)
        } else {
            solver.check()
        };

        let outcome = match verdict {
            SatResult::Sat => QueryOutcome::Sat(extract(&solver, vars, &consts)?),
            SatResult::Unsat => {
                let core = self.unsat_core.then(|| {
                    let mut labels = Vec::new();
                    for core_lit in solver.get_unsat_core() {
                        if let Some((label, _)) =
                            trackers.iter().find(|(_, marker)| *marker == core_lit)
                        {
                            labels.push(label.clone());
                        }
                    }
                    labels
                });
                QueryOutcome::Unsat { core }
            }
            SatResult::Unknown => QueryOutcome::Unknown {
                reason: format!("solver returned unknown within the {} ms budget", ms),
            },
        };

        let elapsed = started.elapsed();
        debug!("Solver verdict: {} in {} ms", outcome.verdict(), elapsed.as_millis());

        Ok(SolveReport {
            outcome,
            elapsed,
            vars_declared: consts.len(),
            constraints_asserted: query.len(),
        })
    }
}

/// A term lowered to one of Z3's two sorts.
#[derive(Clone)]
enum Lowered {
    Real(Real),
    Bool(Bool),
}

impl Lowered {
    fn into_real(self, context: &str) -> ChokepointResult<Real> {
        match self {
            Lowered::Real(ast) => Ok(ast),
            Lowered::Bool(_) => Err(ChokepointError::SortMismatch {
                expected: VarSort::Real.as_str(),
                found: VarSort::Bool.as_str(),
                context: context.to_owned(),
            }),
        }
    }

    fn into_bool(self, context: &str) -> ChokepointResult<Bool> {
        match self {
            Lowered::Bool(ast) => Ok(ast),
            Lowered::Real(_) => Err(ChokepointError::SortMismatch {
                expected: VarSort::Bool.as_str(),
                found: VarSort::Real.as_str(),
                context: context.to_owned(),
            }),
        }
    }
}

/// Z3's rational literal constructor takes `i32` parts; reduced `Rat` values
/// in model formulas stay far below that in practice.
fn lower_rat(value: Rat) -> ChokepointResult<Real> {
    let num = i32::try_from(value.numer())
        .map_err(|_| ChokepointError::ConstantOverflow { value })?;
    let den = i32::try_from(value.denom())
        .map_err(|_| ChokepointError::ConstantOverflow { value })?;
    Ok(Real::from_real(num, den))
}

fn lower(term: &Term, consts: &[Lowered], label: &str) -> ChokepointResult<Lowered> {
    match term {
        Term::Const(value) => Ok(Lowered::Real(lower_rat(*value)?)),
        Term::Var(id) => Ok(consts[id.index()].clone()),
        Term::Add(lhs, rhs) => {
            let l = lower(lhs, consts, label)?.into_real(label)?;
            let r = lower(rhs, consts, label)?.into_real(label)?;
            Ok(Lowered::Real(&l + &r))
        }
        Term::Sub(lhs, rhs) => {
            let l = lower(lhs, consts, label)?.into_real(label)?;
            let r = lower(rhs, consts, label)?.into_real(label)?;
            Ok(Lowered::Real(&l - &r))
        }
        Term::Scale(k, inner) => {
            let k = lower_rat(*k)?;
            let v = lower(inner, consts, label)?.into_real(label)?;
            Ok(Lowered::Real(&k * &v))
        }
        Term::Ite(cond, then_term, else_term) => {
            let cond = lower(cond, consts, label)?.into_bool(label)?;
            let then_term = lower(then_term, consts, label)?;
            let else_term = lower(else_term, consts, label)?;
            match (then_term, else_term) {
                (Lowered::Real(t), Lowered::Real(e)) => Ok(Lowered::Real(cond.ite(&t, &e))),
                (Lowered::Bool(t), Lowered::Bool(e)) => Ok(Lowered::Bool(cond.ite(&t, &e))),
                (Lowered::Real(_), Lowered::Bool(_)) | (Lowered::Bool(_), Lowered::Real(_)) => {
                    Err(ChokepointError::SortMismatch {
                        expected: "matching branch sorts",
                        found: "mixed Real/Bool",
                        context: label.to_owned(),
                    })
                }
            }
        }
        Term::True => Ok(Lowered::Bool(Bool::from_bool(true))),
        Term::False => Ok(Lowered::Bool(Bool::from_bool(false))),
        Term::Not(inner) => {
            let inner = lower(inner, consts, label)?.into_bool(label)?;
            Ok(Lowered::Bool(inner.not()))
        }
        Term::And(terms) => {
            let bools: ChokepointResult<Vec<Bool>> = terms
                .iter()
                .map(|t| lower(t, consts, label).and_then(|z| z.into_bool(label)))
                .collect();
            Ok(Lowered::Bool(Bool::and(&bools?)))
        }
        Term::Or(terms) => {
            let bools: ChokepointResult<Vec<Bool>> = terms
                .iter()
                .map(|t| lower(t, consts, label).and_then(|z| z.into_bool(label)))
                .collect();
            Ok(Lowered::Bool(Bool::or(&bools?)))
        }
        Term::Implies(lhs, rhs) => {
            let l = lower(lhs, consts, label)?.into_bool(label)?;
            let r = lower(rhs, consts, label)?.into_bool(label)?;
            Ok(Lowered::Bool(l.implies(&r)))
        }
        Term::Le(lhs, rhs) => {
            let l = lower(lhs, consts, label)?.into_real(label)?;
            let r = lower(rhs, consts, label)?.into_real(label)?;
            Ok(Lowered::Bool(l.le(&r)))
        }
        Term::Lt(lhs, rhs) => {
            let l = lower(lhs, consts, label)?.into_real(label)?;
            let r = lower(rhs, consts, label)?.into_real(label)?;
            Ok(Lowered::Bool(l.lt(&r)))
        }
        Term::Eq(lhs, rhs) => {
            let l = lower(lhs, consts, label)?.into_real(label)?;
            let r = lower(rhs, consts, label)?.into_real(label)?;
            Ok(Lowered::Bool(l.eq(&r)))
        }
    }
}

/// Reads every pool variable out of a satisfying model, with completion so
/// don't-care variables still get concrete values.
fn extract(
    solver: &Solver,
    vars: &TraceVars,
    consts: &[Lowered],
) -> ChokepointResult<SolvedTrace> {
    let model = solver
        .get_model()
        .ok_or_else(|| ChokepointError::ModelValueUnavailable {
            name: "(model)".to_owned(),
        })?;

    let mut assignment = BTreeMap::new();
    for (id, name, sort) in vars.pool().iter() {
        let value = match (&consts[id.index()], sort) {
            (Lowered::Real(ast), VarSort::Real) => {
                let evaluated = model.eval::<Real>(ast, true).ok_or_else(|| {
                    ChokepointError::ModelValueUnavailable {
                        name: name.to_owned(),
                    }
                })?;
                let (num, den) = evaluated.as_real().ok_or_else(|| {
                    ChokepointError::NonRationalValue {
                        name: name.to_owned(),
                    }
                })?;
                Value::Rational(Rat::new(num, den))
            }
            (Lowered::Bool(ast), VarSort::Bool) => {
                let evaluated = model.eval::<Bool>(ast, true).ok_or_else(|| {
                    ChokepointError::ModelValueUnavailable {
                        name: name.to_owned(),
                    }
                })?;
                let value = evaluated.as_bool().ok_or_else(|| {
                    ChokepointError::ModelValueUnavailable {
                        name: name.to_owned(),
                    }
                })?;
                Value::Boolean(value)
            }
            (Lowered::Real(_), VarSort::Bool) => {
                return Err(ChokepointError::SortMismatch {
                    expected: VarSort::Bool.as_str(),
                    found: VarSort::Real.as_str(),
                    context: name.to_owned(),
                })
            }
            (Lowered::Bool(_), VarSort::Real) => {
                return Err(ChokepointError::SortMismatch {
                    expected: VarSort::Real.as_str(),
                    found: VarSort::Bool.as_str(),
                    context: name.to_owned(),
                })
            }
        };
        assignment.insert(name.to_owned(), value);
    }

    SolvedTrace::materialize(vars, assignment)
}

// =============================================================================
// Unit Tests
// =============================================================================
