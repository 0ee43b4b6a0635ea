//! Convenient re-exports for common usage.
//!
//! This module provides a "prelude" that re-exports the most commonly used
//! types from Chokepoint, allowing you to import them all at once.
//!
//! # Usage
//!
//! ```rust
//! use chokepoint::prelude::*;
//! ```
//!
//! # What's Included
//!
//! The prelude includes:
//!
//! - **Configuration**: [`ModelConfig`], [`ModelConfigBuilder`], [`CcaKind`],
//!   [`Composition`]
//! - **Terms and variables**: [`Term`], [`ConstraintSet`], [`TraceVars`],
//!   [`Rat`]
//! - **Query assembly**: [`Query`], [`make_periodic`]
//! - **Solving**: [`Z3Adapter`], [`QueryOutcome`], [`SolveReport`]
//! - **Results**: [`SolvedTrace`], [`Value`]
//! - **Error handling**: [`ChokepointError`], [`ChokepointResult`]
//! - **Scenario catalog**: [`Scenario`], [`aimd_premature_loss`],
//!   [`probing_low_util`], [`delay_util_floor`]
//!
//! # Example
//!
//! ```rust
//! use chokepoint::prelude::*;
//!
//! fn assemble() -> ChokepointResult<Query> {
//!     let config = ModelConfig::builder()
//!         .with_cca(CcaKind::Aimd)
//!         .with_finite_buffer(Rat::from_int(2))
//!         .build()?;
//!     let (mut constraints, mut vars) = chokepoint::model::build(&config)?;
//!     constraints.extend(chokepoint::cca::encode(&config, &mut vars)?);
//!     constraints.extend(make_periodic(&config, &vars, 2 * config.rtt)?);
//!
//!     Ok(Query::new(constraints)
//!         .assume("no_initial_loss", vars.total_lost(0).eq(0i64))
//!         .target("idle_link", vars.total_service(10).lt(1i64)))
//! }
//! # assemble().unwrap();
//! ```

// Configuration
pub use crate::config::{CcaKind, Composition, ModelConfig, ModelConfigBuilder};

// Terms and trace variables
pub use crate::term::{ConstraintSet, Term};
pub use crate::vars::TraceVars;
pub use crate::Rat;

// Query assembly and periodicity
pub use crate::periodic::make_periodic;
pub use crate::query::Query;

// Solver boundary
pub use crate::solver::{QueryOutcome, SolveReport, Z3Adapter};

// Extracted results
pub use crate::trace::{SolvedTrace, Value};

// Error handling
pub use crate::error::{ChokepointError, ChokepointResult};

// Scenario catalog
pub use crate::queries::{
    aimd_premature_loss, delay_util_floor, probing_low_util, Scenario,
};
