//! Rate probing in the style of BBR's bandwidth phase.
//!
//! Each step the sender estimates the delivery rate over the most recently
//! acknowledged RTT and transmits at twice that estimate, floored at
//! `alpha`. Overshooting by a factor of two keeps the pipe probed for spare
//! capacity while the window cap of one estimated RTT of data bounds the
//! standing queue.

use crate::config::ModelConfig;
use crate::term::ConstraintSet;
use crate::vars::TraceVars;
use crate::Rat;

pub(super) fn encode(config: &ModelConfig, vars: &TraceVars, set: &mut ConstraintSet) {
    let steps = config.steps();
    let r = config.rtt;

    for f in 0..config.num_flows {
        // The estimate needs two RTT-spaced acknowledgment samples, so the
        // first 2R steps are left to the solver.
        for t in (2 * r)..steps {
            let doubled = (vars.service(f, t - r) - vars.service(f, t - 2 * r))
                * Rat::new(2, r as i64);
            let floored = vars
                .alpha()
                .ge(doubled.clone())
                .ite(vars.alpha(), doubled);
            set.push(format!("probe_rate[{f}][{t}]"), vars.rate(f, t).eq(floored));
            set.push(
                format!("probe_cwnd[{f}][{t}]"),
                vars.cwnd(f, t).eq(vars.rate(f, t) * Rat::from(r)),
            );
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
