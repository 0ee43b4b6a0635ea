//! Additive-increase multiplicative-decrease with one reduction per RTT.
//!
//! The sender keeps a `last_loss` marker: the arrival level at the moment of
//! the most recent window cut, padded by `dupacks`. A newly detected loss
//! only triggers another cut once the acknowledgment stream has moved past
//! that marker, so a burst of losses from a single overshoot costs one
//! halving instead of collapsing the window to nothing.

use crate::config::ModelConfig;
use crate::term::{ConstraintSet, Term};
use crate::vars::{TraceVars, VarSort};
use crate::Rat;

pub(super) fn encode(config: &ModelConfig, vars: &mut TraceVars, set: &mut ConstraintSet) {
    let steps = config.steps();
    let r = config.rtt;
    let half = Rat::new(1, 2);

    for f in 0..config.num_flows {
        let last_loss: Vec<Term> = (0..steps)
            .map(|t| vars.alloc(format!("last_loss_{f},{t}"), VarSort::Real))
            .collect();

        // Before any acknowledgment arrives there is nothing to cut on.
        set.push(
            format!("last_loss_init[{f}]"),
            last_loss[0].clone().eq(vars.service(f, 0)),
        );

        for t in 1..steps {
            let acked = vars.service(f, t.saturating_sub(r));
            let detected = vars
                .loss_detected(f, t)
                .gt(vars.loss_detected(f, t - 1));
            let past_marker = acked.clone().ge(last_loss[t - 1].clone());
            let event = Term::And(vec![detected, past_marker]);

            let marker = vars.arrival(f, t) + vars.dupacks();

            set.push(
                format!("aimd_timeout[{f}][{t}]"),
                vars.timeout(f, t).implies(Term::And(vec![
                    vars.cwnd(f, t).eq(vars.alpha()),
                    last_loss[t].clone().eq(marker.clone()),
                ])),
            );

            let halved = vars.cwnd(f, t - 1) * half;
            let cut_to = vars
                .alpha()
                .ge(halved.clone())
                .ite(vars.alpha(), halved);
            set.push(
                format!("aimd_cut[{f}][{t}]"),
                Term::And(vec![vars.timeout(f, t).not(), event.clone()]).implies(Term::And(vec![
                    vars.cwnd(f, t).eq(cut_to),
                    last_loss[t].clone().eq(marker),
                ])),
            );

            // Enhanced mode grows only on acknowledgment progress, which
            // stops a timed-out flow from inflating its window while the
            // link is silent.
            let growth = if config.enhanced {
                let progressed = vars
                    .service(f, t.saturating_sub(r))
                    .gt(vars.service(f, (t - 1).saturating_sub(r)));
                progressed.ite(vars.alpha(), Rat::ZERO)
            } else {
                vars.alpha()
            };
            set.push(
                format!("aimd_growth[{f}][{t}]"),
                Term::And(vec![vars.timeout(f, t).not(), event.not()]).implies(Term::And(vec![
                    vars.cwnd(f, t).eq(vars.cwnd(f, t - 1) + growth),
                    last_loss[t].clone().eq(last_loss[t - 1].clone()),
                ])),
            );
        }

        // Window limited: the rate cap sits far above anything the link can
        // carry so admission is governed by cwnd alone.
        let cap = config.capacity * Rat::from_int(100);
        for t in 0..steps {
            set.push(format!("aimd_rate[{f}][{t}]"), vars.rate(f, t).eq(cap));
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
    use crate::model;

    fn encoded(config: &ModelConfig) -> (ConstraintSet, TraceVars) {
        let (_, mut vars) = model::build(config).unwrap();
        let set = crate::cca::encode(config, &mut vars).unwrap();
        (set, vars)
    }

    fn aimd_config() -> ModelConfig {
        ModelConfig::builder().with_cca(CcaKind::Aimd).build().unwrap()
    }

    #[test]
    fn emits_all_three_branches_per_step() {
        let (set, _) = encoded(&aimd_config());
        for prefix in ["aimd_timeout[0]", "aimd_cut[0]", "aimd_growth[0]"] {
            let count = set
                .iter()
                .filter(|(label, _)| label.starts_with(prefix))
                .count();
            assert_eq!(count, 10, "{prefix} should cover steps 1..=10");
        }
    }

    #[test]
    fn marker_series_is_allocated_per_flow() {
        let config = ModelConfig::builder()
            .with_cca(CcaKind::Aimd)
            .with_num_flows(2)
            .build()
            .unwrap();
        let (_, vars) = encoded(&config);
        let names: Vec<&str> = vars
            .pool()
            .iter()
            .map(|(_, name, _)| name)
            .filter(|name| name.starts_with("last_loss"))
            .collect();
        assert_eq!(names.len(), 22);
        assert!(names.contains(&"last_loss_0,0"));
        assert!(names.contains(&"last_loss_1,10"));
    }

    #[test]
    fn marker_sorts_are_real() {
        let (_, vars) = encoded(&aimd_config());
        for (_, name, sort) in vars.pool().iter() {
            if name.starts_with("last_loss") {
                assert_eq!(sort, VarSort::Real);
            }
        }
    }

    #[test]
    fn rate_is_pinned_at_every_step() {
        let (set, _) = encoded(&aimd_config());
        let count = set
            .iter()
            .filter(|(label, _)| label.starts_with("aimd_rate[0]"))
            .count();
        assert_eq!(count, 11);
    }

    #[test]
    fn growth_branch_changes_shape_with_enhanced_mode() {
        let find = |config: &ModelConfig| -> Term {
            let (set, _) = encoded(config);
            let term = set
                .iter()
                .find(|(label, _)| label == "aimd_growth[0][5]")
                .map(|(_, term)| term.clone())
                .expect("growth branch present");
            term
        };

        let enhanced = find(&aimd_config());
        let coarse = find(
            &ModelConfig::builder()
                .with_cca(CcaKind::Aimd)
                .with_enhanced(false)
                .build()
                .unwrap(),
        );

        let has_ite = |term: &Term| {
            let rendered = format!("{term:?}");
            rendered.contains("Ite")
        };
        assert!(has_ite(&enhanced), "enhanced growth gates on ack progress");
        assert!(!has_ite(&coarse), "coarse growth adds alpha unconditionally");
    }
}
