//! Solver traits and identifier derivation.
//!
//! Solvers are stateless: all per-problem data lives in the context, all
//! tuning data in the config. They are represented as zero-sized markers so
//! the catalog can hold them by value.

use crate::context::ProblemContext;
use crate::runtime::{MeasureArgs, RuntimeHandle, Timing};
use crate::search::exhaustive_search;
use crate::solution::ConvSolution;
use crate::tuning::TuningSpace;
use anyhow::Result;
use convplan_perfdb::TuningFields;
use std::fmt;

/// Derives the persisted identifier for a solver type: the last `::`
/// component of its type name. `std::any::type_name` is stable for a given
/// build, which is all the database needs.
pub fn db_id_of<S: 'static>() -> &'static str {
    let name = std::any::type_name::<S>();
    name.rsplit("::").next().unwrap_or(name)
}

/// Operations shared by every solver. Defaults make a solver applicable,
/// not knowingly slow, and unable to time itself.
pub trait SolverBase {
    /// Stable key in the performance database. Override only to pin the id
    /// of a renamed solver; existing databases keep working then.
    fn db_id(&self) -> &'static str
    where
        Self: Sized + 'static,
    {
        db_id_of::<Self>()
    }

    /// Whether this solver produces correct results for the problem.
    fn is_applicable(&self, _ctx: &ProblemContext) -> bool {
        true
    }

    /// Heuristic filter: false when the solver is known to lose against
    /// another applicable one. Introduces implicit ordering dependencies,
    /// so implementations stay conservative.
    fn is_fast(&self, _ctx: &ProblemContext) -> bool {
        true
    }

    /// Times `solution` on real buffers. Solvers without a measurement
    /// path report [`Timing::NotImplemented`].
    fn run_and_measure(
        &self,
        _handle: &mut dyn RuntimeHandle,
        _args: &MeasureArgs,
        _ctx: &ProblemContext,
        _solution: &ConvSolution,
    ) -> Timing {
        Timing::NotImplemented
    }
}

/// A solver without a tuning space.
pub trait FixedSolver: SolverBase {
    fn solution(&self, ctx: &ProblemContext) -> ConvSolution;
}

/// A solver whose kernels carry free parameters worth persisting.
pub trait SearchableSolver: SolverBase + Sized + 'static {
    type Tuning: TuningFields + TuningSpace + Clone + Default + PartialEq + fmt::Display;

    /// A valid starting config guessed from the problem shape in constant
    /// time; never runs kernels.
    fn default_tuning(&self, ctx: &ProblemContext) -> Self::Tuning;

    /// Re-validates a config against the problem, mainly for values loaded
    /// from the database.
    fn is_valid_tuning(&self, _ctx: &ProblemContext, _tuning: &Self::Tuning) -> bool {
        true
    }

    fn solution_with(&self, ctx: &ProblemContext, tuning: &Self::Tuning) -> ConvSolution;

    /// Exhaustively tunes this solver for `ctx`. May take long; reads no
    /// database state.
    fn search(&self, ctx: &ProblemContext, handle: &mut dyn RuntimeHandle) -> Result<Self::Tuning> {
        exhaustive_search(self, ctx, handle)
    }
}
