//! A catalog of ready-made adversarial scenarios.
//!
//! Each function assembles a complete [`Scenario`]: a validated
//! configuration, the fully encoded constraint set wrapped in a [`Query`]
//! with the scenario's pins and target, and the trace variables needed to
//! run it or inspect the result. They double as worked examples for writing
//! new queries against the model.

use crate::config::{CcaKind, Composition, ModelConfig};
use crate::error::ChokepointResult;
use crate::query::Query;
use crate::term::Term;
use crate::vars::TraceVars;
use crate::{cca, model, periodic, Rat};

/// A runnable query together with the configuration and variables that
/// produced it.
#[derive(Debug)]
pub struct Scenario {
    /// The configuration the model was built from.
    pub config: ModelConfig,
    /// Base model, CCA recurrence, periodicity, pins, and target.
    pub query: Query,
    /// The trace variables, for running the query and reading the result.
    pub vars: TraceVars,
}

/// Can AIMD halve its window even though the queue never threatened its
/// share?
///
/// Searches a two-BDP buffer for a step where a window of at most two is cut
/// anyway: an ack burst and a loss-detection burst arrive together while
/// total arrivals jump and fresh losses appear. Satisfiable, which is the
/// known blind spot of loss-based control under adversarial jitter.
///
/// # Errors
///
/// Configuration or assembly errors only; solver verdicts come from running
/// the returned query.
pub fn aimd_premature_loss() -> ChokepointResult<Scenario> {
    let base = ModelConfig::default();
    let bdp = base.capacity * Rat::from(base.rtt);
    let config = ModelConfig::builder()
        .with_cca(CcaKind::Aimd)
        .with_horizon(9)
        .with_finite_buffer(bdp * Rat::from_int(2))
        .build()?;
    let (mut constraints, mut vars) = model::build(&config)?;
    constraints.extend(cca::encode(&config, &mut vars)?);
    constraints.extend(periodic::make_periodic(&config, &vars, 2 * config.rtt)?);
    let mut query = Query::new(constraints)
        .assume("no_initial_loss", vars.total_lost(0).eq(0i64))
        .assume("small_alpha", vars.alpha().le(bdp * Rat::new(1, 10)));
    for t in 0..config.steps() {
        query = query.assume(
            format!("exclude_timeout[{t}]"),
            vars.timeout(0, t).not(),
        );
    }

    let r = config.rtt;
    let mut windows = Vec::new();
    for t in 2..config.horizon {
        windows.push(Term::and_all(vec![
            vars.cwnd(0, t).le(Rat::from_int(2)),
            (vars.loss_detected(0, t + 1) - vars.loss_detected(0, t)).ge(Rat::ONE),
            (vars.total_service(t + 1 - r) - vars.total_service(t - r))
                .ge(config.capacity + Rat::ONE),
            vars.total_arrival(t + 1)
                .ge(vars.total_arrival(t) + Rat::from_int(2)),
            vars.total_lost(t + 1).gt(vars.total_lost(t)),
        ]));
    }
    let query = query.target("premature_loss", Term::or_any(windows));

    Ok(Scenario {
        config,
        query,
        vars,
    })
}

/// Can rate probing leave the link close to idle for a whole horizon?
///
/// Infinite buffer, composing waste, and a utilization target under ten
/// percent of capacity. Satisfiable: the adversarial scheduler can starve
/// the estimator so the probe rate keeps chasing a collapsed estimate.
///
/// # Errors
///
/// Configuration or assembly errors only.
pub fn probing_low_util() -> ChokepointResult<Scenario> {
    let config = ModelConfig::builder().with_cca(CcaKind::Probing).build()?;
    let (mut constraints, mut vars) = model::build(&config)?;
    constraints.extend(cca::encode(&config, &mut vars)?);
    constraints.extend(periodic::make_periodic(&config, &vars, 2 * config.rtt)?);

    let query = Query::new(constraints)
        .assume("no_initial_loss", vars.total_lost(0).eq(0i64))
        .target("low_utilization", utilization_below_tenth(&config, &vars));

    Ok(Scenario {
        config,
        query,
        vars,
    })
}

/// Does delay-based control keep a utilization floor, and under which waste
/// discipline?
///
/// Same sub-ten-percent utilization target as [`probing_low_util`], with the
/// delay-gated window rule. Under [`Composition::Decoupled`] the target is
/// unsatisfiable: whenever the link idles, queues drain, delay drops, and
/// the window grows until the link is busy again. Under
/// [`Composition::Composing`] the weaker waste rule readmits the starvation
/// traces.
///
/// # Errors
///
/// Configuration or assembly errors only.
pub fn delay_util_floor(composition: Composition) -> ChokepointResult<Scenario> {
    let config = ModelConfig::builder()
        .with_cca(CcaKind::DelayBased)
        .with_calculate_qdel(true)
        .with_composition(composition)
        .build()?;
    let (mut constraints, mut vars) = model::build(&config)?;
    constraints.extend(cca::encode(&config, &mut vars)?);
    let period = config.rtt + config.max_queue_delay;
    constraints.extend(periodic::make_periodic(&config, &vars, period)?);

    let query = Query::new(constraints)
        .assume("no_initial_loss", vars.total_lost(0).eq(0i64))
        .target("low_utilization", utilization_below_tenth(&config, &vars));

    Ok(Scenario {
        config,
        query,
        vars,
    })
}

/// Service over the whole horizon below one tenth of what the link could
/// carry.
fn utilization_below_tenth(config: &ModelConfig, vars: &TraceVars) -> Term {
    let ceiling = config.capacity * Rat::from(config.horizon) * Rat::new(1, 10);
    (vars.total_service(config.horizon) - vars.total_service(0)).lt(ceiling)
}

// =============================================================================
// Unit Tests
// =============================================================================
