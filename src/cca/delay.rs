//! Delay-gated window adjustment over the queueing-delay grid.
//!
//! The sender classifies each acknowledged step as low-delay when the data
//! served then spent at most `D` steps queued, which reads directly off the
//! `qdel` grid. Low delay grows the window by `alpha`, anything slower
//! shrinks it by `alpha` down to a floor of `alpha`. Admission is paced at
//! exactly one window per RTT, so this is the only variant whose `rate` is
//! derived rather than parked out of the way.

use crate::config::ModelConfig;
use crate::term::{ConstraintSet, Term};
use crate::vars::TraceVars;
use crate::Rat;

pub(super) fn encode(config: &ModelConfig, vars: &TraceVars, set: &mut ConstraintSet) {
    let steps = config.steps();
    let r = config.rtt;
    let d = config.max_queue_delay;

    for f in 0..config.num_flows {
        // The acknowledgment observed at t describes service at t - R, and
        // that service needs t - R >= D for its delay to be classifiable.
        for t in (r + d)..steps {
            let low_delay = Term::or_any(
                (0..=d).map(|dt| vars.qdel(t - r, dt)).collect(),
            );
            let grown = vars.cwnd(f, t - 1) + vars.alpha();
            let shrunk = vars.cwnd(f, t - 1) - vars.alpha();
            let floored = vars
                .alpha()
                .ge(shrunk.clone())
                .ite(vars.alpha(), shrunk);
            set.push(
                format!("delay_cwnd[{f}][{t}]"),
                vars.cwnd(f, t).eq(low_delay.ite(grown, floored)),
            );
        }

        for t in 0..steps {
            set.push(
                format!("delay_rate[{f}][{t}]"),
                vars.rate(f, t).eq(vars.cwnd(f, t) * Rat::new(1, r as i64)),
            );
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
