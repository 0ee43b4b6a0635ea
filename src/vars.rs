//! Variable registry and the time/flow-indexed trace variable grids.
//!
//! Every symbolic variable lives in a [`VarPool`]: a flat registry mapping a
//! [`VarId`] to a unique name and a sort. [`TraceVars`] is the structured
//! view over one pool, allocated once per query by
//! [`model::build`](crate::model::build), with one entry per tracked
//! quantity and timestep.
//!
//! Variable naming follows a fixed scheme so dumps and counterexamples read
//! consistently:
//!
//! | name | meaning | sort |
//! |------|---------|------|
//! | `tot_arrival_t` | cumulative bytes arrived at the link by step `t` | Real |
//! | `tot_service_t` | cumulative bytes served by step `t` | Real |
//! | `tot_lost_t` | cumulative bytes dropped by step `t` | Real |
//! | `wasted_t` | cumulative wasted link tokens by step `t` (signed) | Real |
//! | `arrival_f,t` | per-flow cumulative arrivals | Real |
//! | `service_f,t` | per-flow cumulative service | Real |
//! | `losts_f,t` | per-flow cumulative losses | Real |
//! | `loss_detected_f,t` | losses the sender has noticed by `t` | Real |
//! | `cwnd_f,t` | congestion window | Real |
//! | `rate_f,t` | pacing rate | Real |
//! | `timeout_f,t` | retransmission timeout fired at `t` | Bool |
//! | `qdel_t,dt` | data served at `t` waited more than `dt` steps | Bool |
//! | `alpha`, `dupacks`, `buffer` | symbolic model constants | Real |
//!
//! Accessors return [`Term`] handles ready for the combinators in
//! [`term`](crate::term). Out-of-range indices panic with a message naming
//! the index and the allocated bound; the grids never grow on access.

use crate::config::ModelConfig;
use crate::term::Term;

/// The sort of a pool variable.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum VarSort {
    /// A real-valued variable.
    Real,
    /// A boolean variable.
    Bool,
}

impl VarSort {
    /// SMT-LIB sort name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            VarSort::Real => "Real",
            VarSort::Bool => "Bool",
        }
    }
}

/// A typed handle to one variable in a [`VarPool`].
///
/// Ids are dense indices in allocation order, so they double as stable
/// positions for the solver's declaration pass.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(u32);

impl VarId {
    /// Position of this variable in its pool.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

struct PoolEntry {
    name: String,
    sort: VarSort,
}

/// A flat registry of named, sorted variables.
///
/// The pool only hands out fresh ids; it never deduplicates names. All
/// allocation for one query goes through one pool, which makes the solver's
/// declaration pass a single iteration.
#[derive(Default)]
pub struct VarPool {
    entries: Vec<PoolEntry>,
}

impl std::fmt::Debug for VarPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VarPool")
            .field("len", &self.entries.len())
            .finish()
    }
}

impl VarPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        VarPool {
            entries: Vec::new(),
        }
    }

    /// Registers a new variable and returns its id.
    pub fn fresh(&mut self, name: impl Into<String>, sort: VarSort) -> VarId {
        let id = VarId(u32::try_from(self.entries.len()).unwrap_or(u32::MAX));
        self.entries.push(PoolEntry {
            name: name.into(),
            sort,
        });
        id
    }

    /// Number of registered variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no variable has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The name of a variable.
    #[must_use]
    pub fn name(&self, id: VarId) -> &str {
        &self.entries[id.index()].name
    }

    /// The sort of a variable.
    #[must_use]
    pub fn sort(&self, id: VarId) -> VarSort {
        self.entries[id.index()].sort
    }

    /// Iterates `(id, name, sort)` in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (VarId, &str, VarSort)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (VarId(i as u32), entry.name.as_str(), entry.sort))
    }
}

/// The full set of trace variables for one query.
///
/// Owns the [`VarPool`] the variables live in. Grids are indexed `[flow]`
/// then `[step]`; aggregate curves by `[step]` alone. Accessors panic on
/// out-of-range indices rather than extending the horizon.
#[derive(Debug)]
pub struct TraceVars {
    pool: VarPool,
    steps: usize,
    num_flows: usize,
    tot_arrival: Vec<VarId>,
    tot_service: Vec<VarId>,
    tot_lost: Vec<VarId>,
    wasted: Vec<VarId>,
    arrival: Vec<Vec<VarId>>,
    service: Vec<Vec<VarId>>,
    losts: Vec<Vec<VarId>>,
    loss_detected: Vec<Vec<VarId>>,
    cwnd: Vec<Vec<VarId>>,
    rate: Vec<Vec<VarId>>,
    timeout: Vec<Vec<VarId>>,
    qdel: Vec<Vec<VarId>>,
    alpha: VarId,
    dupacks: VarId,
    buffer: Option<VarId>,
}

fn aggregate_series(pool: &mut VarPool, base: &str, steps: usize) -> Vec<VarId> {
    (0..steps)
        .map(|t| pool.fresh(format!("{base}_{t}"), VarSort::Real))
        .collect()
}

fn flow_series(
    pool: &mut VarPool,
    base: &str,
    num_flows: usize,
    steps: usize,
    sort: VarSort,
) -> Vec<Vec<VarId>> {
    (0..num_flows)
        .map(|f| {
            (0..steps)
                .map(|t| pool.fresh(format!("{base}_{f},{t}"), sort))
                .collect()
        })
        .collect()
}

impl TraceVars {
    /// Allocates every variable the configuration calls for.
    pub(crate) fn allocate(config: &ModelConfig) -> TraceVars {
        let steps = config.steps();
        let num_flows = config.num_flows;
        let mut pool = VarPool::new();

        let tot_arrival = aggregate_series(&mut pool, "tot_arrival", steps);
        let tot_service = aggregate_series(&mut pool, "tot_service", steps);
        let tot_lost = aggregate_series(&mut pool, "tot_lost", steps);
        let wasted = aggregate_series(&mut pool, "wasted", steps);

        let arrival = flow_series(&mut pool, "arrival", num_flows, steps, VarSort::Real);
        let service = flow_series(&mut pool, "service", num_flows, steps, VarSort::Real);
        let losts = flow_series(&mut pool, "losts", num_flows, steps, VarSort::Real);
        let loss_detected =
            flow_series(&mut pool, "loss_detected", num_flows, steps, VarSort::Real);
        let cwnd = flow_series(&mut pool, "cwnd", num_flows, steps, VarSort::Real);
        let rate = flow_series(&mut pool, "rate", num_flows, steps, VarSort::Real);
        let timeout = flow_series(&mut pool, "timeout", num_flows, steps, VarSort::Bool);

        let alpha = pool.fresh("alpha", VarSort::Real);
        let dupacks = pool.fresh("dupacks", VarSort::Real);
        let buffer = config
            .finite_buffer()
            .then(|| pool.fresh("buffer", VarSort::Real));

        let qdel = if config.calculate_qdel {
            (0..steps)
                .map(|t| {
                    (0..steps)
                        .map(|dt| pool.fresh(format!("qdel_{t},{dt}"), VarSort::Bool))
                        .collect()
                })
                .collect()
        } else {
            Vec::new()
        };

        TraceVars {
            pool,
            steps,
            num_flows,
            tot_arrival,
            tot_service,
            tot_lost,
            wasted,
            arrival,
            service,
            losts,
            loss_detected,
            cwnd,
            rate,
            timeout,
            qdel,
            alpha,
            dupacks,
            buffer,
        }
    }

    /// Number of discrete steps, `horizon + 1`.
    #[inline]
    #[must_use]
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Number of flows.
    #[inline]
    #[must_use]
    pub fn num_flows(&self) -> usize {
        self.num_flows
    }

    /// The pool every variable of this trace lives in.
    #[must_use]
    pub fn pool(&self) -> &VarPool {
        &self.pool
    }

    /// Returns `true` if the queueing-delay grid was allocated.
    #[must_use]
    pub fn has_qdel(&self) -> bool {
        !self.qdel.is_empty()
    }

    /// Allocates an extra variable in this trace's pool.
    ///
    /// CCA encoders use this for their private helper series; custom
    /// properties may use it for scratch variables.
    pub fn alloc(&mut self, name: impl Into<String>, sort: VarSort) -> Term {
        Term::Var(self.pool.fresh(name, sort))
    }

    fn check_step(&self, t: usize) {
        assert!(
            t < self.steps,
            "timestep {} is outside the allocated trace (0..={})",
            t,
            self.steps - 1
        );
    }

    fn check_flow(&self, f: usize) {
        assert!(
            f < self.num_flows,
            "flow {} is outside the configured flows (0..{})",
            f,
            self.num_flows
        );
    }

    /// Cumulative bytes arrived at the link by step `t`, summed over flows.
    #[must_use]
    pub fn total_arrival(&self, t: usize) -> Term {
        self.check_step(t);
        Term::Var(self.tot_arrival[t])
    }

    /// Cumulative bytes served by step `t`, summed over flows.
    #[must_use]
    pub fn total_service(&self, t: usize) -> Term {
        self.check_step(t);
        Term::Var(self.tot_service[t])
    }

    /// Cumulative bytes dropped by step `t`, summed over flows.
    #[must_use]
    pub fn total_lost(&self, t: usize) -> Term {
        self.check_step(t);
        Term::Var(self.tot_lost[t])
    }

    /// Cumulative wasted tokens by step `t`. Signed: the initial service
    /// normalization can push it below zero.
    #[must_use]
    pub fn wasted(&self, t: usize) -> Term {
        self.check_step(t);
        Term::Var(self.wasted[t])
    }

    /// Cumulative arrivals of flow `f` by step `t`.
    #[must_use]
    pub fn arrival(&self, f: usize, t: usize) -> Term {
        self.check_flow(f);
        self.check_step(t);
        Term::Var(self.arrival[f][t])
    }

    /// Cumulative service of flow `f` by step `t`.
    #[must_use]
    pub fn service(&self, f: usize, t: usize) -> Term {
        self.check_flow(f);
        self.check_step(t);
        Term::Var(self.service[f][t])
    }

    /// Cumulative losses of flow `f` by step `t`.
    #[must_use]
    pub fn lost(&self, f: usize, t: usize) -> Term {
        self.check_flow(f);
        self.check_step(t);
        Term::Var(self.losts[f][t])
    }

    /// Losses of flow `f` its sender has detected by step `t`.
    #[must_use]
    pub fn loss_detected(&self, f: usize, t: usize) -> Term {
        self.check_flow(f);
        self.check_step(t);
        Term::Var(self.loss_detected[f][t])
    }

    /// Congestion window of flow `f` at step `t`.
    #[must_use]
    pub fn cwnd(&self, f: usize, t: usize) -> Term {
        self.check_flow(f);
        self.check_step(t);
        Term::Var(self.cwnd[f][t])
    }

    /// Pacing rate of flow `f` at step `t`.
    #[must_use]
    pub fn rate(&self, f: usize, t: usize) -> Term {
        self.check_flow(f);
        self.check_step(t);
        Term::Var(self.rate[f][t])
    }

    /// Whether flow `f`'s retransmission timeout fires at step `t`.
    #[must_use]
    pub fn timeout(&self, f: usize, t: usize) -> Term {
        self.check_flow(f);
        self.check_step(t);
        Term::Var(self.timeout[f][t])
    }

    /// Queueing-delay signal: data served at step `t` spent more than `dt`
    /// steps in the queue.
    ///
    /// # Panics
    ///
    /// Panics if the grid was not allocated (`calculate_qdel` off) or either
    /// index is out of range.
    #[must_use]
    pub fn qdel(&self, t: usize, dt: usize) -> Term {
        assert!(
            self.has_qdel(),
            "queueing-delay grid was not allocated; enable calculate_qdel"
        );
        self.check_step(t);
        self.check_step(dt);
        Term::Var(self.qdel[t][dt])
    }

    /// The per-step additive increment constant.
    #[must_use]
    pub fn alpha(&self) -> Term {
        Term::Var(self.alpha)
    }

    /// The duplicate-ack threshold constant.
    #[must_use]
    pub fn dupacks(&self) -> Term {
        Term::Var(self.dupacks)
    }

    /// The solver-chosen buffer size, present only for finite buffers.
    #[must_use]
    pub fn buffer(&self) -> Option<Term> {
        self.buffer.map(Term::Var)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::{CcaKind, ModelConfig};
    use crate::Rat;

    fn var_name(vars: &TraceVars, term: &Term) -> String {
        match term {
            Term::Var(id) => vars.pool().name(*id).to_owned(),
            other => panic!("expected a variable term, got {other:?}"),
        }
    }

    // ==========================================
    // Pool
    // ==========================================

    #[test]
    fn fresh_ids_are_dense_and_ordered() {
        let mut pool = VarPool::new();
        let a = pool.fresh("a", VarSort::Real);
        let b = pool.fresh("b", VarSort::Bool);
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.name(a), "a");
        assert_eq!(pool.sort(b), VarSort::Bool);
    }

    #[test]
    fn pool_iteration_matches_allocation_order() {
        let mut pool = VarPool::new();
        pool.fresh("x", VarSort::Real);
        pool.fresh("y", VarSort::Bool);
        let collected: Vec<(usize, String, VarSort)> = pool
            .iter()
            .map(|(id, name, sort)| (id.index(), name.to_owned(), sort))
            .collect();
        assert_eq!(
            collected,
            vec![
                (0, "x".to_owned(), VarSort::Real),
                (1, "y".to_owned(), VarSort::Bool),
            ]
        );
    }

    // ==========================================
    // Allocation
    // ==========================================

    #[test]
    fn default_config_allocates_expected_count() {
        // 11 steps: 4 aggregate curves, 6 real + 1 bool per-flow tables for
        // one flow, plus alpha and dupacks. No buffer, no qdel grid.
        let config = ModelConfig::default();
        let vars = TraceVars::allocate(&config);
        assert_eq!(vars.pool().len(), 4 * 11 + 7 * 11 + 2);
        assert_eq!(vars.steps(), 11);
        assert_eq!(vars.num_flows(), 1);
        assert!(vars.buffer().is_none());
        assert!(!vars.has_qdel());
    }

    #[test]
    fn finite_buffer_allocates_buffer_var() {
        let config = ModelConfig::builder()
            .with_finite_buffer(Rat::ONE)
            .build()
            .unwrap();
        let vars = TraceVars::allocate(&config);
        let buffer = vars.buffer().unwrap();
        assert_eq!(var_name(&vars, &buffer), "buffer");
    }

    #[test]
    fn qdel_grid_is_square_over_steps() {
        let config = ModelConfig::builder()
            .with_horizon(4)
            .with_calculate_qdel(true)
            .build()
            .unwrap();
        let vars = TraceVars::allocate(&config);
        assert!(vars.has_qdel());
        // 5 steps: 4*5 aggregates + 7*5 flow vars + 2 scalars + 25 qdel bools.
        assert_eq!(vars.pool().len(), 20 + 35 + 2 + 25);
        assert_eq!(var_name(&vars, &vars.qdel(4, 0)), "qdel_4,0");
    }

    #[test]
    fn multi_flow_names_carry_flow_index() {
        let config = ModelConfig::builder().with_num_flows(2).build().unwrap();
        let vars = TraceVars::allocate(&config);
        assert_eq!(var_name(&vars, &vars.arrival(0, 0)), "arrival_0,0");
        assert_eq!(var_name(&vars, &vars.cwnd(1, 3)), "cwnd_1,3");
        assert_eq!(var_name(&vars, &vars.lost(1, 10)), "losts_1,10");
        assert_eq!(
            var_name(&vars, &vars.loss_detected(0, 7)),
            "loss_detected_0,7"
        );
    }

    #[test]
    fn aggregate_names_carry_step_only() {
        let config = ModelConfig::default();
        let vars = TraceVars::allocate(&config);
        assert_eq!(var_name(&vars, &vars.total_arrival(0)), "tot_arrival_0");
        assert_eq!(var_name(&vars, &vars.total_service(10)), "tot_service_10");
        assert_eq!(var_name(&vars, &vars.wasted(5)), "wasted_5");
        assert_eq!(var_name(&vars, &vars.alpha()), "alpha");
        assert_eq!(var_name(&vars, &vars.dupacks()), "dupacks");
    }

    #[test]
    fn timeout_vars_are_boolean() {
        let config = ModelConfig::default();
        let vars = TraceVars::allocate(&config);
        let Term::Var(id) = vars.timeout(0, 2) else {
            panic!("expected Var");
        };
        assert_eq!(vars.pool().sort(id), VarSort::Bool);
        let Term::Var(id) = vars.cwnd(0, 2) else {
            panic!("expected Var");
        };
        assert_eq!(vars.pool().sort(id), VarSort::Real);
    }

    #[test]
    fn alloc_extends_the_pool() {
        let config = ModelConfig::default();
        let mut vars = TraceVars::allocate(&config);
        let before = vars.pool().len();
        let extra = vars.alloc("last_loss_0,0", VarSort::Real);
        assert_eq!(vars.pool().len(), before + 1);
        assert_eq!(var_name(&vars, &extra), "last_loss_0,0");
    }

    // ==========================================
    // Bounds
    // ==========================================

    #[test]
    #[should_panic(expected = "outside the allocated trace")]
    fn step_past_horizon_panics() {
        let config = ModelConfig::default();
        let vars = TraceVars::allocate(&config);
        let _ = vars.total_arrival(11);
    }

    #[test]
    #[should_panic(expected = "outside the configured flows")]
    fn flow_past_count_panics() {
        let config = ModelConfig::default();
        let vars = TraceVars::allocate(&config);
        let _ = vars.cwnd(1, 0);
    }

    #[test]
    #[should_panic(expected = "enable calculate_qdel")]
    fn qdel_without_grid_panics() {
        let config = ModelConfig::builder()
            .with_cca(CcaKind::Aimd)
            .build()
            .unwrap();
        let vars = TraceVars::allocate(&config);
        let _ = vars.qdel(0, 0);
    }
}
