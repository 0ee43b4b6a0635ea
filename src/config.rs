//! Model configuration: link parameters, trace horizon, CCA selection and
//! encoding toggles.
//!
//! A [`ModelConfig`] fully determines the shape of the symbolic trace: how
//! many flows share the link, how fast the link drains, how far the horizon
//! extends, which congestion control recurrence each sender runs, and which
//! optional signal grids get allocated. Configurations are built through
//! [`ModelConfigBuilder`] and validated before any variable is allocated, so
//! every downstream component can trust the invariants documented on the
//! fields.
//!
//! ```
//! use chokepoint::{CcaKind, Composition, ModelConfig, Rat};
//!
//! let config = ModelConfig::builder()
//!     .with_capacity(Rat::from_int(2))
//!     .with_horizon(8)
//!     .with_cca(CcaKind::Aimd)
//!     .with_composition(Composition::Decoupled)
//!     .with_finite_buffer(Rat::from_int(4))
//!     .build()?;
//!
//! assert_eq!(config.steps(), 9);
//! # Ok::<(), chokepoint::ChokepointError>(())
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ChokepointError, ChokepointResult};
use crate::Rat;

/// The congestion control algorithm every flow on the link runs.
///
/// All flows share one algorithm. The encoder for each variant lives in
/// [`cca`](crate::cca) and constrains the per-flow window `c_f` and pacing
/// rate `r_f` sequences in terms of the flow's own observations.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CcaKind {
    /// A fixed-rate sender: the pacing rate is one free constant shared by
    /// every step, and the window never binds.
    ConstRate,
    /// Additive-increase multiplicative-decrease over the congestion window,
    /// with loss detected through duplicate acknowledgements and timeouts.
    Aimd,
    /// A rate-based prober that sets its rate to twice the ack rate measured
    /// one RTT ago, never below `alpha`.
    Probing,
    /// An additive window algorithm steered by the queueing-delay signal
    /// grid. Requires `calculate_qdel`.
    DelayBased,
}

impl CcaKind {
    /// Every variant, in declaration order.
    pub const ALL: [CcaKind; 4] = [
        CcaKind::ConstRate,
        CcaKind::Aimd,
        CcaKind::Probing,
        CcaKind::DelayBased,
    ];

    /// Returns the snake_case name used in serialized configurations.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            CcaKind::ConstRate => "const_rate",
            CcaKind::Aimd => "aimd",
            CcaKind::Probing => "probing",
            CcaKind::DelayBased => "delay_based",
        }
    }

    /// Returns `true` if the encoder for this CCA reads the queueing-delay
    /// signal grid, which exists only when
    /// [`calculate_qdel`](ModelConfig::calculate_qdel) is set.
    #[must_use]
    pub const fn requires_qdel(self) -> bool {
        matches!(self, CcaKind::DelayBased)
    }
}

impl std::fmt::Display for CcaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the link model accounts for wasted capacity.
///
/// Both variants keep the same conservation laws; they differ in when the
/// adversarial link is allowed to waste tokens (grow `W`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Composition {
    /// Tokens may be wasted only when the senders have nothing left in
    /// flight to consume them: `A - L <= C*t - W` whenever `W` grows. This
    /// variant composes with an ideal downstream path.
    Composing,
    /// Tokens may be wasted only when everything sent has already been
    /// served: `A - L <= S` whenever `W` grows. A tighter single-queue
    /// reading of the same link.
    Decoupled,
}

impl Composition {
    /// Returns the snake_case name used in serialized configurations.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Composition::Composing => "composing",
            Composition::Decoupled => "decoupled",
        }
    }
}

impl std::fmt::Display for Composition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything that determines the shape and semantics of one symbolic trace.
///
/// Construct through [`ModelConfig::builder`]. Deserialized configurations
/// bypass the builder, so [`validate`](ModelConfig::validate) runs again at
/// the start of [`model::build`](crate::model::build).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Number of flows sharing the link. Every flow runs [`cca`](Self::cca).
    ///
    /// Default: 1
    pub num_flows: usize,

    /// Link capacity `C` in bytes per timestep. Strictly positive.
    ///
    /// Default: 1
    pub capacity: Rat,

    /// Propagation RTT `R` in timesteps. Acknowledgements for bytes served at
    /// step `t` become visible to the sender at step `t + R`. At least 1.
    ///
    /// Default: 1
    pub rtt: usize,

    /// Maximum extra queueing delay `D` in timesteps that the adversarial
    /// scheduler may impose beyond the propagation time. At least 1.
    ///
    /// Default: 1
    pub max_queue_delay: usize,

    /// Lower bound on the bottleneck buffer, if any. Strictly positive when
    /// present.
    ///
    /// When both `buf_min` and `buf_max` are `None`, the buffer is infinite
    /// and the model forces losses to zero.
    ///
    /// Default: None
    pub buf_min: Option<Rat>,

    /// Upper bound on the bottleneck buffer, if any. Strictly positive when
    /// present, and at least `buf_min` when both are given.
    ///
    /// Default: None
    pub buf_max: Option<Rat>,

    /// Trace horizon `T`. The trace spans `T + 1` discrete steps `0..=T`.
    /// At least 2.
    ///
    /// Default: 10
    pub horizon: usize,

    /// Congestion control algorithm run by every flow.
    ///
    /// Default: [`CcaKind::ConstRate`]
    pub cca: CcaKind,

    /// Waste accounting variant for the link.
    ///
    /// Default: [`Composition::Composing`]
    pub composition: Composition,

    /// Enhanced-fidelity encoding. Adds duplicate-ack precision to loss
    /// detection and ack-clocked window growth to AIMD. Turning it off keeps
    /// only the coarse detection bounds, which solve faster but admit more
    /// adversarial traces.
    ///
    /// Default: true
    pub enhanced: bool,

    /// Allocate and constrain the queueing-delay signal grid `qdel[t][dt]`.
    /// Required by [`CcaKind::DelayBased`] and by any query whose property
    /// mentions queueing delay.
    ///
    /// Default: false
    pub calculate_qdel: bool,

    /// Run the solver's simplifier over each constraint before asserting it.
    /// Slower to encode and rarely worth it; useful when inspecting dumped
    /// constraints by hand.
    ///
    /// Default: false
    pub simplify: bool,

    /// Track constraint labels through solving so an unsatisfiable query can
    /// report which labelled constraint groups conflict.
    ///
    /// Default: false
    pub unsat_core: bool,

    /// Pin the per-step additive increment `alpha` to a concrete value.
    /// `None` leaves it a free variable the solver may pick adversarially.
    /// Strictly positive when present.
    ///
    /// Default: None
    pub alpha: Option<Rat>,

    /// Pin the duplicate-ack threshold `dupacks` to a concrete value. `None`
    /// ties it to `3 * alpha`. Strictly positive when present.
    ///
    /// Default: None
    pub dupacks: Option<Rat>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            num_flows: 1,
            capacity: Rat::ONE,
            rtt: 1,
            max_queue_delay: 1,
            buf_min: None,
            buf_max: None,
            horizon: 10,
            cca: CcaKind::ConstRate,
            composition: Composition::Composing,
            enhanced: true,
            calculate_qdel: false,
            simplify: false,
            unsat_core: false,
            alpha: None,
            dupacks: None,
        }
    }
}

impl ModelConfig {
    /// Starts a builder seeded with the defaults.
    #[must_use]
    pub fn builder() -> ModelConfigBuilder {
        ModelConfigBuilder {
            config: ModelConfig::default(),
        }
    }

    /// Number of discrete steps in the trace, `horizon + 1`.
    #[inline]
    #[must_use]
    pub const fn steps(&self) -> usize {
        self.horizon + 1
    }

    /// Returns `true` if at least one buffer bound is configured, which makes
    /// loss possible and allocates the `buffer` variable.
    #[inline]
    #[must_use]
    pub const fn finite_buffer(&self) -> bool {
        self.buf_min.is_some() || self.buf_max.is_some()
    }

    /// Checks every documented field invariant.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant as a [`ChokepointError`].
    pub fn validate(&self) -> ChokepointResult<()> {
        if !self.capacity.is_positive() {
            return Err(ChokepointError::NonPositiveParameter {
                field: "capacity",
                value: self.capacity,
            });
        }
        if self.num_flows == 0 {
            return Err(ChokepointError::ZeroParameter { field: "num_flows" });
        }
        if self.rtt == 0 {
            return Err(ChokepointError::ZeroParameter { field: "rtt" });
        }
        if self.max_queue_delay == 0 {
            return Err(ChokepointError::ZeroParameter {
                field: "max_queue_delay",
            });
        }
        if self.horizon < 2 {
            return Err(ChokepointError::HorizonTooShort {
                horizon: self.horizon,
                minimum: 2,
            });
        }
        for (field, bound) in [("buf_min", self.buf_min), ("buf_max", self.buf_max)] {
            if let Some(value) = bound {
                if !value.is_positive() {
                    return Err(ChokepointError::NonPositiveParameter { field, value });
                }
            }
        }
        if let (Some(lo), Some(hi)) = (self.buf_min, self.buf_max) {
            if lo > hi {
                return Err(ChokepointError::BufferBoundsInverted {
                    buf_min: lo,
                    buf_max: hi,
                });
            }
        }
        for (field, pin) in [("alpha", self.alpha), ("dupacks", self.dupacks)] {
            if let Some(value) = pin {
                if !value.is_positive() {
                    return Err(ChokepointError::NonPositiveParameter { field, value });
                }
            }
        }
        if self.cca.requires_qdel() && !self.calculate_qdel {
            return Err(ChokepointError::QdelRequired { cca: self.cca });
        }
        Ok(())
    }
}

/// Builder for [`ModelConfig`]. Obtained from [`ModelConfig::builder`].
///
/// Setters may be chained in any order; [`build`](Self::build) validates the
/// final configuration.
#[derive(Debug, Clone)]
#[must_use = "builders do nothing until `build` is called"]
pub struct ModelConfigBuilder {
    config: ModelConfig,
}

impl ModelConfigBuilder {
    /// Sets the number of flows sharing the link.
    pub fn with_num_flows(mut self, num_flows: usize) -> Self {
        self.config.num_flows = num_flows;
        self
    }

    /// Sets the link capacity `C`.
    pub fn with_capacity(mut self, capacity: impl Into<Rat>) -> Self {
        self.config.capacity = capacity.into();
        self
    }

    /// Sets the propagation RTT `R` in timesteps.
    pub fn with_rtt(mut self, rtt: usize) -> Self {
        self.config.rtt = rtt;
        self
    }

    /// Sets the maximum extra queueing delay `D` in timesteps.
    pub fn with_max_queue_delay(mut self, max_queue_delay: usize) -> Self {
        self.config.max_queue_delay = max_queue_delay;
        self
    }

    /// Pins the buffer to an exact size: both bounds become `size`.
    pub fn with_finite_buffer(mut self, size: impl Into<Rat>) -> Self {
        let size = size.into();
        self.config.buf_min = Some(size);
        self.config.buf_max = Some(size);
        self
    }

    /// Sets the buffer bounds independently. `None` on both sides restores
    /// the infinite buffer.
    pub fn with_buffer_range(mut self, buf_min: Option<Rat>, buf_max: Option<Rat>) -> Self {
        self.config.buf_min = buf_min;
        self.config.buf_max = buf_max;
        self
    }

    /// Sets the trace horizon `T`.
    pub fn with_horizon(mut self, horizon: usize) -> Self {
        self.config.horizon = horizon;
        self
    }

    /// Selects the congestion control algorithm.
    pub fn with_cca(mut self, cca: CcaKind) -> Self {
        self.config.cca = cca;
        self
    }

    /// Selects the waste accounting variant.
    pub fn with_composition(mut self, composition: Composition) -> Self {
        self.config.composition = composition;
        self
    }

    /// Toggles the enhanced-fidelity encoding.
    pub fn with_enhanced(mut self, enhanced: bool) -> Self {
        self.config.enhanced = enhanced;
        self
    }

    /// Toggles allocation of the queueing-delay signal grid.
    pub fn with_calculate_qdel(mut self, calculate_qdel: bool) -> Self {
        self.config.calculate_qdel = calculate_qdel;
        self
    }

    /// Toggles the pre-assertion simplifier pass.
    pub fn with_simplify(mut self, simplify: bool) -> Self {
        self.config.simplify = simplify;
        self
    }

    /// Toggles unsat-core tracking.
    pub fn with_unsat_core(mut self, unsat_core: bool) -> Self {
        self.config.unsat_core = unsat_core;
        self
    }

    /// Pins `alpha` to a concrete value.
    pub fn with_alpha(mut self, alpha: impl Into<Rat>) -> Self {
        self.config.alpha = Some(alpha.into());
        self
    }

    /// Pins `dupacks` to a concrete value.
    pub fn with_dupacks(mut self, dupacks: impl Into<Rat>) -> Self {
        self.config.dupacks = Some(dupacks.into());
        self
    }

    /// Validates and returns the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant, see [`ModelConfig::validate`].
    pub fn build(self) -> ChokepointResult<ModelConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
