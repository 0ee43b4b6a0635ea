//! Congestion control recurrences, one encoder per [`CcaKind`].
//!
//! [`encode`] closes the loop the base model leaves open: the base
//! constraints say what a link may do with whatever the senders inject, and
//! the encoder pins each flow's `cwnd` and `rate` sequences to a concrete
//! algorithm reacting to the flow's own observations.
//!
//! Observation constraints are shared by every algorithm and live here:
//! what a sender can know at step `t` is bounded by the acknowledgment
//! stream, which lags service by `R` steps. Loss detection, duplicate-ack
//! precision (enhanced mode) and retransmission timeouts are all phrased
//! over that lagged view, so no encoder can peek at link state its sender
//! could not have seen.

use crate::config::{CcaKind, ModelConfig};
use crate::error::ChokepointResult;
use crate::term::{ConstraintSet, Term};
use crate::vars::TraceVars;
use crate::Rat;

mod aimd;
mod delay;
mod probing;

/// Emits the sender-observation constraints and the recurrence for the
/// configured CCA.
///
/// Call after [`model::build`](crate::model::build) with the same
/// configuration; AIMD allocates its private helper series through `vars`.
///
/// # Errors
///
/// Returns a configuration error when `config` violates a documented field
/// invariant.
pub fn encode(config: &ModelConfig, vars: &mut TraceVars) -> ChokepointResult<ConstraintSet> {
    config.validate()?;

    let mut set = ConstraintSet::new();
    observation(config, vars, &mut set);
    match config.cca {
        CcaKind::ConstRate => const_rate(config, vars, &mut set),
        CcaKind::Aimd => aimd::encode(config, vars, &mut set),
        CcaKind::Probing => probing::encode(config, vars, &mut set),
        CcaKind::DelayBased => delay::encode(config, vars, &mut set),
    }
    Ok(set)
}

/// What the sender can know, and when.
///
/// Acknowledgments for service at `t` arrive at `t + R`. Detected loss is
/// sandwiched between "nothing newer than one RTT" and "everything older
/// than `R + D`": the lag bound holds at every step, the floor once the
/// trace is deep enough for `R + D` old losses to exist.
fn observation(config: &ModelConfig, vars: &TraceVars, set: &mut ConstraintSet) {
    let steps = config.steps();
    let r = config.rtt;
    let d = config.max_queue_delay;
    let rto = r + d + 1;

    for f in 0..config.num_flows {
        for t in 0..steps {
            set.push(
                format!("detect_lag[{f}][{t}]"),
                vars.loss_detected(f, t).le(vars.lost(f, t.saturating_sub(r))),
            );
            if t >= r + d {
                set.push(
                    format!("detect_floor[{f}][{t}]"),
                    vars.loss_detected(f, t).ge(vars.lost(f, t - r - d)),
                );
            }
        }

        if config.enhanced {
            dupack_precision(config, vars, set, f);
        }

        // A timeout fires exactly when a full rto passes with outstanding
        // data and no acknowledgment progress. The earliest the sender can
        // observe such a gap is t = r + rto.
        for t in 0..steps {
            if t < r + rto {
                set.push(format!("no_timeout[{f}][{t}]"), vars.timeout(f, t).not());
                continue;
            }
            let acked_now = vars.service(f, t - r);
            let acked_then = vars.service(f, t - r - rto);
            let outstanding_then =
                (vars.arrival(f, t - r - rto) - vars.lost(f, t - r - rto)).gt(vars.service(f, t - r));
            let stalled = Term::And(vec![acked_now.eq(acked_then), outstanding_then]);
            set.push(
                format!("timeout_def[{f}][{t}]"),
                vars.timeout(f, t).iff(stalled),
            );
            set.push(
                format!("timeout_detects[{f}][{t}]"),
                vars.timeout(f, t)
                    .implies(vars.loss_detected(f, t).eq(vars.lost(f, t - r))),
            );
        }
    }
}

/// Duplicate-ack precision, enhanced mode only.
///
/// For a reference step tau at least one RTT back: once the receiver has
/// acknowledged `dupacks` bytes beyond everything tau sent, every loss from
/// tau's window has announced itself, so detection catches up to `L_f[tau]`.
/// Until that threshold is crossed (and barring a timeout), detection cannot
/// exceed `L_f[tau]` either.
fn dupack_precision(config: &ModelConfig, vars: &TraceVars, set: &mut ConstraintSet, f: usize) {
    let r = config.rtt;
    for t in r..config.steps() {
        for tau in 0..=(t - r) {
            let threshold =
                vars.arrival(f, tau) - vars.lost(f, tau) + vars.dupacks();
            let crossed = vars.service(f, t - r).ge(threshold.clone());
            set.push(
                format!("dupack_detected[{f}][{t}][{tau}]"),
                crossed.implies(vars.loss_detected(f, t).ge(vars.lost(f, tau))),
            );

            let not_crossed = vars.service(f, t - r).lt(threshold);
            let quiet = Term::And(vec![not_crossed, vars.timeout(f, t).not()]);
            set.push(
                format!("dupack_upper[{f}][{t}][{tau}]"),
                quiet.implies(vars.loss_detected(f, t).le(vars.lost(f, tau))),
            );
        }
    }
}

/// A sender that transmits at one solver-chosen constant rate. The window is
/// parked far above any reachable in-flight volume so only the rate binds.
fn const_rate(config: &ModelConfig, vars: &TraceVars, set: &mut ConstraintSet) {
    let unbounded = config.capacity * Rat::from_int(100) * Rat::from(config.rtt);
    for f in 0..config.num_flows {
        for t in 1..config.steps() {
            set.push(
                format!("const_rate[{f}][{t}]"),
                vars.rate(f, t).eq(vars.rate(f, 0)),
            );
        }
        for t in 0..config.steps() {
            set.push(
                format!("unbounded_cwnd[{f}][{t}]"),
                vars.cwnd(f, t).eq(unbounded),
            );
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
