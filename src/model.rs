//! Base trace model: every constraint a legal link trace satisfies,
//! independent of the congestion control algorithm.
//!
//! [`build`] allocates the trace variables and emits the conservation laws
//! of a bottleneck link with capacity `C`, propagation RTT `R` and scheduler
//! slack `D`. The adversary picks everything the constraints leave open:
//! when arrivals burst, when the link dallies, which buffer size (within the
//! configured range) the queue has, and the values of `alpha` and `dupacks`
//! unless pinned.
//!
//! Constraint groups, by label prefix:
//!
//! | prefix | meaning |
//! |--------|---------|
//! | `initial` | trace-start normalization, `service_f,0 = 0` |
//! | `monotone`, `nonneg` | cumulative curves never decrease; windows and rates never negative |
//! | `flow_sum` | aggregates equal the sum over flows |
//! | `service_bound`, `detect_bound` | only arrived-and-surviving data is served; only lost data is detected |
//! | `token_bound`, `service_floor` | service tracks the token curve `C*t - W` within `D` steps |
//! | `waste` | tokens are wasted only when there is nothing to serve |
//! | `buffer`, `occupancy`, `loss_at_full`, `no_loss` | queue discipline |
//! | `window_limit`, `rate_limit` | in-flight data bounded by cwnd at ack lag `R`, arrivals by rate |
//! | `alpha`, `dupacks` | symbolic constant pins |
//! | `qdel` | the queueing-delay signal grid |
//!
//! The CCA recurrences that close the loop live in [`cca`](crate::cca).

use tracing::debug;

use crate::config::{Composition, ModelConfig};
use crate::error::ChokepointResult;
use crate::term::{ConstraintSet, Term};
use crate::vars::TraceVars;
use crate::Rat;

/// Allocates all trace variables and emits the base constraints.
///
/// # Errors
///
/// Returns a configuration error when `config` violates a documented field
/// invariant; no variable is allocated in that case.
pub fn build(config: &ModelConfig) -> ChokepointResult<(ConstraintSet, TraceVars)> {
    config.validate()?;

    let vars = TraceVars::allocate(config);
    let mut set = ConstraintSet::new();

    initial(config, &vars, &mut set);
    monotone(config, &vars, &mut set);
    flow_sums(config, &vars, &mut set);
    service_bounds(config, &vars, &mut set);
    token_curve(config, &vars, &mut set);
    waste_discipline(config, &vars, &mut set);
    buffer_discipline(config, &vars, &mut set);
    window_and_rate(config, &vars, &mut set);
    constants(config, &vars, &mut set);
    if config.calculate_qdel {
        qdel_grid(config, &vars, &mut set);
    }

    debug!(
        "Built base model: {} constraints over {} variables ({} flows, horizon {})",
        set.len(),
        vars.pool().len(),
        config.num_flows,
        config.horizon
    );
    Ok((set, vars))
}

/// Trace-start normalization. Per-flow service is measured from zero, which
/// together with the token bound at t = 0 forces `wasted_0 <= 0`. Arrivals
/// and losses may start anywhere non-negative, so the window into the trace
/// can begin mid-connection.
fn initial(config: &ModelConfig, vars: &TraceVars, set: &mut ConstraintSet) {
    for f in 0..config.num_flows {
        set.push(format!("initial_service[{f}]"), vars.service(f, 0).eq(0i64));
        set.push(format!("initial_arrival[{f}]"), vars.arrival(f, 0).ge(0i64));
        set.push(format!("initial_lost[{f}]"), vars.lost(f, 0).ge(0i64));
        set.push(
            format!("initial_detected[{f}]"),
            vars.loss_detected(f, 0).ge(0i64),
        );
    }
}

fn monotone(config: &ModelConfig, vars: &TraceVars, set: &mut ConstraintSet) {
    for t in 1..config.steps() {
        set.push(
            format!("monotone[tot_arrival][{t}]"),
            vars.total_arrival(t).ge(vars.total_arrival(t - 1)),
        );
        set.push(
            format!("monotone[tot_service][{t}]"),
            vars.total_service(t).ge(vars.total_service(t - 1)),
        );
        set.push(
            format!("monotone[tot_lost][{t}]"),
            vars.total_lost(t).ge(vars.total_lost(t - 1)),
        );
        set.push(
            format!("monotone[wasted][{t}]"),
            vars.wasted(t).ge(vars.wasted(t - 1)),
        );
        for f in 0..config.num_flows {
            set.push(
                format!("monotone[arrival][{f}][{t}]"),
                vars.arrival(f, t).ge(vars.arrival(f, t - 1)),
            );
            set.push(
                format!("monotone[service][{f}][{t}]"),
                vars.service(f, t).ge(vars.service(f, t - 1)),
            );
            set.push(
                format!("monotone[losts][{f}][{t}]"),
                vars.lost(f, t).ge(vars.lost(f, t - 1)),
            );
            set.push(
                format!("monotone[loss_detected][{f}][{t}]"),
                vars.loss_detected(f, t).ge(vars.loss_detected(f, t - 1)),
            );
        }
    }
    for t in 0..config.steps() {
        for f in 0..config.num_flows {
            set.push(format!("nonneg[cwnd][{f}][{t}]"), vars.cwnd(f, t).ge(0i64));
            set.push(format!("nonneg[rate][{f}][{t}]"), vars.rate(f, t).ge(0i64));
        }
    }
}

fn flow_sums(config: &ModelConfig, vars: &TraceVars, set: &mut ConstraintSet) {
    let flows = 0..config.num_flows;
    for t in 0..config.steps() {
        set.push(
            format!("flow_sum[arrival][{t}]"),
            vars.total_arrival(t)
                .eq(Term::sum(flows.clone().map(|f| vars.arrival(f, t)).collect())),
        );
        set.push(
            format!("flow_sum[service][{t}]"),
            vars.total_service(t)
                .eq(Term::sum(flows.clone().map(|f| vars.service(f, t)).collect())),
        );
        set.push(
            format!("flow_sum[losts][{t}]"),
            vars.total_lost(t)
                .eq(Term::sum(flows.clone().map(|f| vars.lost(f, t)).collect())),
        );
    }
}

fn service_bounds(config: &ModelConfig, vars: &TraceVars, set: &mut ConstraintSet) {
    for t in 0..config.steps() {
        set.push(
            format!("service_bound[tot][{t}]"),
            vars.total_service(t)
                .le(vars.total_arrival(t) - vars.total_lost(t)),
        );
        for f in 0..config.num_flows {
            set.push(
                format!("service_bound[{f}][{t}]"),
                vars.service(f, t).le(vars.arrival(f, t) - vars.lost(f, t)),
            );
            set.push(
                format!("detect_bound[{f}][{t}]"),
                vars.loss_detected(f, t).le(vars.lost(f, t)),
            );
        }
    }
}

/// The link earns `C` tokens per step and loses one per byte served or
/// wasted. Service can trail the token curve by at most `D` steps.
fn token_curve(config: &ModelConfig, vars: &TraceVars, set: &mut ConstraintSet) {
    let c = config.capacity;
    let d = config.max_queue_delay;
    for t in 0..config.steps() {
        let tokens = c * Rat::from(t);
        set.push(
            format!("token_bound[{t}]"),
            vars.total_service(t).le(tokens - vars.wasted(t)),
        );
        let lagged_tokens = c * Rat::from_int(t as i64 - d as i64);
        set.push(
            format!("service_floor[{t}]"),
            (lagged_tokens - vars.wasted(t.saturating_sub(d))).le(vars.total_service(t)),
        );
    }
}

fn waste_discipline(config: &ModelConfig, vars: &TraceVars, set: &mut ConstraintSet) {
    let c = config.capacity;
    for t in 1..config.steps() {
        let grew = vars.wasted(t).gt(vars.wasted(t - 1));
        let backlog = vars.total_arrival(t) - vars.total_lost(t);
        let idle = match config.composition {
            Composition::Composing => backlog.le(c * Rat::from(t) - vars.wasted(t)),
            Composition::Decoupled => backlog.le(vars.total_service(t)),
        };
        set.push(format!("waste[{t}]"), grew.implies(idle));
    }
}

/// Queue discipline. With a finite buffer the solver picks a size inside the
/// configured range, occupancy never exceeds it, and losses happen only at a
/// full buffer. With an infinite buffer losses are frozen at their initial
/// value.
fn buffer_discipline(config: &ModelConfig, vars: &TraceVars, set: &mut ConstraintSet) {
    let Some(buffer) = vars.buffer() else {
        for t in 1..config.steps() {
            set.push(
                format!("no_loss[{t}]"),
                vars.total_lost(t).eq(vars.total_lost(0)),
            );
        }
        return;
    };

    if let Some(lo) = config.buf_min {
        set.push("buffer_min", buffer.clone().ge(lo));
    }
    if let Some(hi) = config.buf_max {
        set.push("buffer_max", buffer.clone().le(hi));
    }
    for t in 0..config.steps() {
        let occupancy = vars.total_arrival(t) - vars.total_lost(t) - vars.total_service(t);
        set.push(
            format!("occupancy[{t}]"),
            occupancy.le(buffer.clone()),
        );
    }
    for t in 1..config.steps() {
        let dropped = vars.total_lost(t).gt(vars.total_lost(t - 1));
        let occupancy = vars.total_arrival(t) - vars.total_lost(t) - vars.total_service(t);
        set.push(
            format!("loss_at_full[{t}]"),
            dropped.implies(occupancy.ge(buffer.clone())),
        );
    }
}

/// Senders act on acknowledgment state that is `R` steps old. Before one
/// full RTT the only visible reference is trace-start service.
fn window_and_rate(config: &ModelConfig, vars: &TraceVars, set: &mut ConstraintSet) {
    let r = config.rtt;
    for f in 0..config.num_flows {
        for t in 0..config.steps() {
            let acked = vars.service(f, t.saturating_sub(r));
            set.push(
                format!("window_limit[{f}][{t}]"),
                (vars.arrival(f, t) - vars.lost(f, t)).le(acked + vars.cwnd(f, t)),
            );
        }
        for t in 1..config.steps() {
            set.push(
                format!("rate_limit[{f}][{t}]"),
                (vars.arrival(f, t) - vars.arrival(f, t - 1)).le(vars.rate(f, t)),
            );
        }
    }
}

fn constants(config: &ModelConfig, vars: &TraceVars, set: &mut ConstraintSet) {
    set.push("alpha_positive", vars.alpha().gt(0i64));
    if let Some(pin) = config.alpha {
        set.push("alpha_pinned", vars.alpha().eq(pin));
    }
    if let Some(pin) = config.dupacks {
        set.push("dupacks_pinned", vars.dupacks().eq(pin));
    } else {
        set.push(
            "dupacks_default",
            vars.dupacks().eq(vars.alpha() * Rat::from_int(3)),
        );
    }
}

/// The queueing-delay signal grid. `qdel[t][dt]` holds when the data served
/// at step `t` entered the queue more than `dt` steps earlier. On steps that
/// serve nothing the signal ages: the head-of-line packet is one step older
/// than it was. Row 0 is unconstrained; there is no service increment to
/// attribute at the first step.
fn qdel_grid(config: &ModelConfig, vars: &TraceVars, set: &mut ConstraintSet) {
    let steps = config.steps();
    for t in 1..steps {
        let served = vars.total_service(t).gt(vars.total_service(t - 1));
        for dt in 0..steps {
            if dt > t {
                set.push(format!("qdel_bound[{t}][{dt}]"), vars.qdel(t, dt).not());
                continue;
            }

            let in_window = if dt == t {
                vars.total_service(t)
                    .le(vars.total_arrival(0) - vars.total_lost(0))
            } else {
                // Arrived after step t-dt-1 cleared, no later than t-dt.
                let older = (vars.total_arrival(t - dt - 1) - vars.total_lost(t - dt - 1))
                    .lt(vars.total_service(t));
                let newer = vars
                    .total_service(t)
                    .le(vars.total_arrival(t - dt) - vars.total_lost(t - dt));
                Term::And(vec![older, newer])
            };
            set.push(
                format!("qdel_served[{t}][{dt}]"),
                served.clone().implies(vars.qdel(t, dt).iff(in_window)),
            );

            let aged = if dt == 0 {
                vars.qdel(t, 0).not()
            } else {
                vars.qdel(t, dt).iff(vars.qdel(t - 1, dt - 1))
            };
            set.push(
                format!("qdel_idle[{t}][{dt}]"),
                served.clone().not().implies(aged),
            );
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::CcaKind;

    fn labels(set: &ConstraintSet) -> Vec<String> {
        set.iter().map(|(label, _)| label.clone()).collect()
    }

    fn has_label(set: &ConstraintSet, wanted: &str) -> bool {
        set.iter().any(|(label, _)| label == wanted)
    }

    // ==========================================
    // Group Presence
    // ==========================================

    #[test]
    fn default_build_emits_every_base_group() {
        let config = ModelConfig::default();
        let (set, vars) = build(&config).unwrap();

        for wanted in [
            "initial_service[0]",
            "monotone[tot_arrival][1]",
            "monotone[wasted][10]",
            "nonneg[cwnd][0][0]",
            "flow_sum[arrival][10]",
            "service_bound[tot][5]",
            "detect_bound[0][5]",
            "token_bound[0]",
            "service_floor[10]",
            "waste[1]",
            "window_limit[0][0]",
            "rate_limit[0][1]",
            "alpha_positive",
            "dupacks_default",
        ] {
            assert!(has_label(&set, wanted), "missing {wanted}");
        }
        assert_eq!(vars.steps(), 11);
    }

    #[test]
    fn infinite_buffer_freezes_losses() {
        let config = ModelConfig::default();
        let (set, _) = build(&config).unwrap();
        assert!(has_label(&set, "no_loss[1]"));
        assert!(has_label(&set, "no_loss[10]"));
        assert!(!has_label(&set, "occupancy[1]"));
        assert!(!has_label(&set, "buffer_min"));
    }

    #[test]
    fn finite_buffer_emits_queue_discipline() {
        let config = ModelConfig::builder()
            .with_finite_buffer(crate::Rat::from_int(2))
            .build()
            .unwrap();
        let (set, vars) = build(&config).unwrap();
        assert!(vars.buffer().is_some());
        assert!(has_label(&set, "buffer_min"));
        assert!(has_label(&set, "buffer_max"));
        assert!(has_label(&set, "occupancy[0]"));
        assert!(has_label(&set, "loss_at_full[10]"));
        assert!(!has_label(&set, "no_loss[1]"));
    }

    #[test]
    fn one_sided_buffer_emits_only_present_bound() {
        let config = ModelConfig::builder()
            .with_buffer_range(Some(crate::Rat::ONE), None)
            .build()
            .unwrap();
        let (set, _) = build(&config).unwrap();
        assert!(has_label(&set, "buffer_min"));
        assert!(!has_label(&set, "buffer_max"));
        assert!(has_label(&set, "occupancy[3]"));
    }

    // ==========================================
    // Constant Pins
    // ==========================================

    #[test]
    fn pinned_constants_replace_defaults() {
        let config = ModelConfig::builder()
            .with_alpha(crate::Rat::new(1, 10))
            .with_dupacks(crate::Rat::new(3, 10))
            .build()
            .unwrap();
        let (set, _) = build(&config).unwrap();
        assert!(has_label(&set, "alpha_positive"));
        assert!(has_label(&set, "alpha_pinned"));
        assert!(has_label(&set, "dupacks_pinned"));
        assert!(!has_label(&set, "dupacks_default"));
    }

    // ==========================================
    // Qdel Grid
    // ==========================================

    #[test]
    fn qdel_rows_skip_step_zero() {
        let config = ModelConfig::builder()
            .with_horizon(4)
            .with_calculate_qdel(true)
            .build()
            .unwrap();
        let (set, _) = build(&config).unwrap();
        assert!(has_label(&set, "qdel_served[1][0]"));
        assert!(has_label(&set, "qdel_idle[4][4]"));
        assert!(has_label(&set, "qdel_bound[1][2]"));
        let row_zero = labels(&set)
            .iter()
            .filter(|l| l.starts_with("qdel_") && l.contains("[0]["))
            .count();
        assert_eq!(row_zero, 0, "row 0 must stay unconstrained");
    }

    #[test]
    fn qdel_absent_without_flag() {
        let config = ModelConfig::default();
        let (set, vars) = build(&config).unwrap();
        assert!(!vars.has_qdel());
        assert!(labels(&set).iter().all(|l| !l.starts_with("qdel")));
    }

    // ==========================================
    // Shape and Errors
    // ==========================================

    #[test]
    fn flow_sum_counts_scale_with_flows() {
        let config = ModelConfig::builder().with_num_flows(3).build().unwrap();
        let (set, vars) = build(&config).unwrap();
        assert_eq!(vars.num_flows(), 3);
        let window_limits = labels(&set)
            .iter()
            .filter(|l| l.starts_with("window_limit"))
            .count();
        // 3 flows, 11 steps each.
        assert_eq!(window_limits, 33);
    }

    #[test]
    fn invalid_config_fails_before_allocation() {
        let mut config = ModelConfig::default();
        config.capacity = crate::Rat::ZERO;
        let err = build(&config).unwrap_err();
        assert!(matches!(
            err,
            crate::ChokepointError::NonPositiveParameter {
                field: "capacity",
                ..
            }
        ));
    }

    #[test]
    fn delay_based_without_qdel_is_rejected() {
        let mut config = ModelConfig::default();
        config.cca = CcaKind::DelayBased;
        let err = build(&config).unwrap_err();
        assert!(matches!(
            err,
            crate::ChokepointError::QdelRequired { .. }
        ));
    }

    #[test]
    fn constraint_count_is_stable_for_default_config() {
        // A change here means the base encoding changed shape; update the
        // arithmetic deliberately. Per step: 4 aggregate monotone (t>=1),
        // 4 flow monotone (t>=1), 2 nonneg, 3 flow sums, 2 service bounds,
        // 1 detect bound, 2 token curve, 1 waste (t>=1), 1 no_loss (t>=1),
        // 1 window limit, 1 rate limit (t>=1). Plus 4 initial and 2
        // constant constraints.
        let config = ModelConfig::default();
        let (set, _) = build(&config).unwrap();
        let per_all_steps = (2 + 3 + 2 + 1 + 2 + 1) * 11;
        let per_later_steps = (4 + 4 + 1 + 1 + 1) * 10;
        assert_eq!(set.len(), per_all_steps + per_later_steps + 4 + 2);
    }
}
