//! Boundary constraints that make a finite trace stand for an infinite one.
//!
//! A counterexample over a few steps is only convincing if the behavior can
//! repeat. [`make_periodic`] ties the end of the horizon to the state one
//! period earlier, so any satisfying trace can be unrolled forever by
//! splicing its last period onto itself.
//!
//! Cumulative curves drift upward even in steady state, so raw equality
//! between two timesteps would force an idle link. Equality is asserted on
//! derived residues instead: queue contents, per-flow in-flight data,
//! undetected losses, and the control state (`cwnd`, `rate`, `timeout`).

use crate::config::ModelConfig;
use crate::error::{ChokepointError, ChokepointResult};
use crate::term::ConstraintSet;
use crate::vars::TraceVars;
use crate::Rat;

/// Constrains the trace to repeat with the given period.
///
/// The period counts steps, not RTTs; a full control-loop cycle (`2R`, or
/// `R + D`) is the usual choice. Both compared states must lie inside the
/// horizon.
///
/// # Errors
///
/// Returns [`ChokepointError::PeriodOutOfRange`] unless
/// `1 <= period <= horizon`, and a configuration error when `config` is
/// invalid.
pub fn make_periodic(
    config: &ModelConfig,
    vars: &TraceVars,
    period: usize,
) -> ChokepointResult<ConstraintSet> {
    config.validate()?;
    let horizon = config.horizon;
    if period == 0 || period > horizon {
        return Err(ChokepointError::PeriodOutOfRange { period, horizon });
    }

    let end = horizon;
    let start = horizon - period;
    let mut set = ConstraintSet::new();

    // Link-level queue contents: arrivals not yet lost, minus the tokens the
    // link has had available to serve them.
    let queue = |t: usize| {
        vars.total_arrival(t)
            - vars.total_lost(t)
            - (config.capacity * Rat::from(t) - vars.wasted(t))
    };
    set.push("periodic[queue]", queue(end).eq(queue(start)));

    for f in 0..config.num_flows {
        let backlog = |t: usize| vars.arrival(f, t) - vars.lost(f, t) - vars.service(f, t);
        set.push(
            format!("periodic[backlog][{f}]"),
            backlog(end).eq(backlog(start)),
        );

        let undetected = |t: usize| vars.lost(f, t) - vars.loss_detected(f, t);
        set.push(
            format!("periodic[undetected][{f}]"),
            undetected(end).eq(undetected(start)),
        );

        set.push(
            format!("periodic[cwnd][{f}]"),
            vars.cwnd(f, end).eq(vars.cwnd(f, start)),
        );
        set.push(
            format!("periodic[rate][{f}]"),
            vars.rate(f, end).eq(vars.rate(f, start)),
        );
        set.push(
            format!("periodic[timeout][{f}]"),
            vars.timeout(f, end).iff(vars.timeout(f, start)),
        );
    }

    if vars.has_qdel() {
        for dt in 0..vars.steps() {
            set.push(
                format!("periodic[qdel][{dt}]"),
                vars.qdel(end, dt).iff(vars.qdel(start, dt)),
            );
        }
    }

    Ok(set)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::model;
    use crate::term::Term;

    fn built(config: &ModelConfig) -> TraceVars {
        let (_, vars) = model::build(config).unwrap();
        vars
    }

    #[test]
    fn rejects_zero_period() {
        let config = ModelConfig::default();
        let vars = built(&config);
        let err = make_periodic(&config, &vars, 0).unwrap_err();
        assert_eq!(
            err,
            ChokepointError::PeriodOutOfRange {
                period: 0,
                horizon: 10,
            }
        );
    }

    #[test]
    fn rejects_period_beyond_horizon() {
        let config = ModelConfig::default();
        let vars = built(&config);
        let err = make_periodic(&config, &vars, 11).unwrap_err();
        assert_eq!(
            err,
            ChokepointError::PeriodOutOfRange {
                period: 11,
                horizon: 10,
            }
        );
    }

    #[test]
    fn full_horizon_period_ties_back_to_step_zero() {
        let config = ModelConfig::default();
        let vars = built(&config);
        let set = make_periodic(&config, &vars, 10).unwrap();
        assert!(!set.is_empty());
    }

    #[test]
    fn one_residue_per_tracked_quantity() {
        let config = ModelConfig::default();
        let vars = built(&config);
        let set = make_periodic(&config, &vars, 2).unwrap();
        // queue residue plus five per-flow residues for the single flow.
        assert_eq!(set.len(), 6);
        for label in [
            "periodic[queue]",
            "periodic[backlog][0]",
            "periodic[undetected][0]",
            "periodic[cwnd][0]",
            "periodic[rate][0]",
            "periodic[timeout][0]",
        ] {
            assert!(set.iter().any(|(have, _)| have == label), "missing {label}");
        }
    }

    #[test]
    fn per_flow_residues_scale_with_flows() {
        let config = ModelConfig::builder().with_num_flows(3).build().unwrap();
        let vars = built(&config);
        let set = make_periodic(&config, &vars, 2).unwrap();
        assert_eq!(set.len(), 1 + 5 * 3);
    }

    #[test]
    fn qdel_rows_are_tied_when_grid_exists() {
        let config = ModelConfig::builder()
            .with_horizon(4)
            .with_calculate_qdel(true)
            .build()
            .unwrap();
        let vars = built(&config);
        let set = make_periodic(&config, &vars, 2).unwrap();
        // 6 residues plus one row equivalence per delay column (5 steps).
        assert_eq!(set.len(), 6 + 5);
        assert!(set.iter().any(|(label, _)| label == "periodic[qdel][4]"));
    }

    #[test]
    fn boolean_residues_use_biconditionals() {
        let config = ModelConfig::default();
        let vars = built(&config);
        let set = make_periodic(&config, &vars, 2).unwrap();
        let (_, term) = set
            .iter()
            .find(|(label, _)| label == "periodic[timeout][0]")
            .expect("timeout residue present");
        let Term::And(arms) = term else {
            panic!("biconditional desugars to a conjunction")
        };
        assert_eq!(arms.len(), 2);
        assert!(arms.iter().all(|arm| matches!(arm, Term::Implies(_, _))));
    }
}
