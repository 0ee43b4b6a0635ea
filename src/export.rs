//! Diagnostic dumps, decoupled from the solve path.
//!
//! [`write_constraints`] renders a query as an SMT-LIB2 script built from
//! the crate's own term representation, so the dump is identical whether or
//! not a solver run ever happens and can be replayed against any SMT-LIB
//! front end. [`write_assignment`] renders a solved trace's raw assignment
//! as plain `name = value` lines.

use std::io::{self, Write};

use crate::query::Query;
use crate::term::Term;
use crate::trace::SolvedTrace;
use crate::vars::{TraceVars, VarPool};
use crate::Rat;

/// Renders `query` as an SMT-LIB2 script: one `declare-const` per pool
/// variable, a `; label` comment plus `(assert ...)` per constraint, and a
/// closing `(check-sat)`.
///
/// # Errors
///
/// Forwards errors from the underlying writer.
pub fn write_constraints<W: Write>(
    out: &mut W,
    vars: &TraceVars,
    query: &Query,
) -> io::Result<()> {
    writeln!(out, "(set-logic QF_LRA)")?;
    for (_, name, sort) in vars.pool().iter() {
        writeln!(out, "(declare-const {} {})", symbol(name), sort.as_str())?;
    }

    for (section, constraints) in [
        ("base", query.base()),
        ("assumptions", query.assumptions()),
        ("targets", query.targets()),
    ] {
        if constraints.is_empty() {
            continue;
        }
        writeln!(out, "; --- {} ---", section)?;
        for (label, term) in constraints.iter() {
            writeln!(out, "; {}", label)?;
            writeln!(out, "(assert {})", sexpr(term, vars.pool()))?;
        }
    }

    writeln!(out, "(check-sat)")
}

/// Renders a solved trace's full assignment, one `name = value` line per
/// variable in name order.
///
/// # Errors
///
/// Forwards errors from the underlying writer.
pub fn write_assignment<W: Write>(out: &mut W, trace: &SolvedTrace) -> io::Result<()> {
    for (name, value) in trace.assignment() {
        writeln!(out, "{} = {}", name, value)?;
    }
    Ok(())
}

/// Pool names may contain characters outside the SMT-LIB simple-symbol
/// alphabet (the flow/step comma); those are emitted as quoted symbols.
fn symbol(name: &str) -> String {
    if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        name.to_owned()
    } else {
        format!("|{name}|")
    }
}

fn literal(value: Rat) -> String {
    let magnitude = if value.denom() == 1 {
        format!("{}", value.numer().unsigned_abs())
    } else {
        format!("(/ {} {})", value.numer().unsigned_abs(), value.denom())
    };
    if value.is_negative() {
        format!("(- {magnitude})")
    } else {
        magnitude
    }
}

fn sexpr(term: &Term, pool: &VarPool) -> String {
    match term {
        Term::Const(value) => literal(*value),
        Term::Var(id) => symbol(pool.name(*id)),
        Term::Add(lhs, rhs) => format!("(+ {} {})", sexpr(lhs, pool), sexpr(rhs, pool)),
        Term::Sub(lhs, rhs) => format!("(- {} {})", sexpr(lhs, pool), sexpr(rhs, pool)),
        Term::Scale(k, inner) => format!("(* {} {})", literal(*k), sexpr(inner, pool)),
        Term::Ite(cond, then_term, else_term) => format!(
            "(ite {} {} {})",
            sexpr(cond, pool),
            sexpr(then_term, pool),
            sexpr(else_term, pool)
        ),
        Term::True => "true".to_owned(),
        Term::False => "false".to_owned(),
        Term::Not(inner) => format!("(not {})", sexpr(inner, pool)),
        Term::And(terms) => nary("and", terms, pool, "true"),
        Term::Or(terms) => nary("or", terms, pool, "false"),
        Term::Implies(lhs, rhs) => {
            format!("(=> {} {})", sexpr(lhs, pool), sexpr(rhs, pool))
        }
        Term::Le(lhs, rhs) => format!("(<= {} {})", sexpr(lhs, pool), sexpr(rhs, pool)),
        Term::Lt(lhs, rhs) => format!("(< {} {})", sexpr(lhs, pool), sexpr(rhs, pool)),
        Term::Eq(lhs, rhs) => format!("(= {} {})", sexpr(lhs, pool), sexpr(rhs, pool)),
    }
}

fn nary(op: &str, terms: &[Term], pool: &VarPool, empty: &str) -> String {
    match terms {
        [] => empty.to_owned(),
        [only] => sexpr(only, pool),
        _ => {
            let rendered: Vec<String> = terms.iter().map(|t| sexpr(t, pool)).collect();
            format!("({} {})", op, rendered.join(" "))
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
