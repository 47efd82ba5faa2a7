//! Kernel templates ("solvers") for convplan.
//!
//! A solver is a stateless strategy that turns a problem description, plus
//! optionally a tuning config, into a kernel build plan. The catalog fixes
//! the order solvers are considered in.

pub mod bwd_weights;
pub mod catalog;
pub mod context;
pub mod direct_fwd;
pub mod runtime;
pub mod search;
pub mod solution;
pub mod solver;
pub mod tuning;

pub use bwd_weights::*;
pub use catalog::*;
pub use context::*;
pub use direct_fwd::*;
pub use runtime::*;
pub use search::*;
pub use solution::*;
pub use solver::*;
pub use tuning::*;
