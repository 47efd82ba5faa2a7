//! The ordered solver catalog.
//!
//! Solvers are held by value in a tagged enum so the list is a static
//! array: no allocation, and the order is fixed at compile time. That
//! order is part of the contract: first-hit selection and the
//! non-timeable fallback both follow it.

use crate::bwd_weights::{
    BwdWeights1x1, BwdWeights3x3, BwdWeightsFused1x1, BwdWeightsLarge, BwdWeightsTiled,
};
use crate::context::ProblemContext;
use crate::direct_fwd::{DirectFwd3x3, DirectFwdGeneric, Winograd3x3};
use crate::runtime::{MeasureArgs, RuntimeHandle, Timing};
use crate::solution::ConvSolution;
use crate::solver::SolverBase;

#[derive(Debug, Clone, Copy)]
pub enum Solver {
    DirectFwd3x3(DirectFwd3x3),
    Winograd3x3(Winograd3x3),
    DirectFwdGeneric(DirectFwdGeneric),
    BwdWeights3x3(BwdWeights3x3),
    BwdWeights1x1(BwdWeights1x1),
    BwdWeightsFused1x1(BwdWeightsFused1x1),
    BwdWeightsLarge(BwdWeightsLarge),
    BwdWeightsTiled(BwdWeightsTiled),
}

/// Specialized solvers come before the catch-alls of their direction.
pub const CATALOG: [Solver; 8] = [
    Solver::DirectFwd3x3(DirectFwd3x3),
    Solver::Winograd3x3(Winograd3x3),
    Solver::DirectFwdGeneric(DirectFwdGeneric),
    Solver::BwdWeights3x3(BwdWeights3x3),
    Solver::BwdWeights1x1(BwdWeights1x1),
    Solver::BwdWeightsFused1x1(BwdWeightsFused1x1),
    Solver::BwdWeightsLarge(BwdWeightsLarge),
    Solver::BwdWeightsTiled(BwdWeightsTiled),
];

impl Solver {
    pub fn db_id(&self) -> &'static str {
        match self {
            Solver::DirectFwd3x3(s) => s.db_id(),
            Solver::Winograd3x3(s) => s.db_id(),
            Solver::DirectFwdGeneric(s) => s.db_id(),
            Solver::BwdWeights3x3(s) => s.db_id(),
            Solver::BwdWeights1x1(s) => s.db_id(),
            Solver::BwdWeightsFused1x1(s) => s.db_id(),
            Solver::BwdWeightsLarge(s) => s.db_id(),
            Solver::BwdWeightsTiled(s) => s.db_id(),
        }
    }

    pub fn is_applicable(&self, ctx: &ProblemContext) -> bool {
        match self {
            Solver::DirectFwd3x3(s) => s.is_applicable(ctx),
            Solver::Winograd3x3(s) => s.is_applicable(ctx),
            Solver::DirectFwdGeneric(s) => s.is_applicable(ctx),
            Solver::BwdWeights3x3(s) => s.is_applicable(ctx),
            Solver::BwdWeights1x1(s) => s.is_applicable(ctx),
            Solver::BwdWeightsFused1x1(s) => s.is_applicable(ctx),
            Solver::BwdWeightsLarge(s) => s.is_applicable(ctx),
            Solver::BwdWeightsTiled(s) => s.is_applicable(ctx),
        }
    }

    pub fn is_fast(&self, ctx: &ProblemContext) -> bool {
        match self {
            Solver::DirectFwd3x3(s) => s.is_fast(ctx),
            Solver::Winograd3x3(s) => s.is_fast(ctx),
            Solver::DirectFwdGeneric(s) => s.is_fast(ctx),
            Solver::BwdWeights3x3(s) => s.is_fast(ctx),
            Solver::BwdWeights1x1(s) => s.is_fast(ctx),
            Solver::BwdWeightsFused1x1(s) => s.is_fast(ctx),
            Solver::BwdWeightsLarge(s) => s.is_fast(ctx),
            Solver::BwdWeightsTiled(s) => s.is_fast(ctx),
        }
    }

    /// Whether the solver carries a persistable tuning space.
    pub fn is_searchable(&self) -> bool {
        matches!(
            self,
            Solver::DirectFwd3x3(_) | Solver::BwdWeights3x3(_) | Solver::BwdWeights1x1(_)
        )
    }

    pub fn run_and_measure(
        &self,
        handle: &mut dyn RuntimeHandle,
        args: &MeasureArgs,
        ctx: &ProblemContext,
        solution: &ConvSolution,
    ) -> Timing {
        match self {
            Solver::DirectFwd3x3(s) => s.run_and_measure(handle, args, ctx, solution),
            Solver::Winograd3x3(s) => s.run_and_measure(handle, args, ctx, solution),
            Solver::DirectFwdGeneric(s) => s.run_and_measure(handle, args, ctx, solution),
            Solver::BwdWeights3x3(s) => s.run_and_measure(handle, args, ctx, solution),
            Solver::BwdWeights1x1(s) => s.run_and_measure(handle, args, ctx, solution),
            Solver::BwdWeightsFused1x1(s) => s.run_and_measure(handle, args, ctx, solution),
            Solver::BwdWeightsLarge(s) => s.run_and_measure(handle, args, ctx, solution),
            Solver::BwdWeightsTiled(s) => s.run_and_measure(handle, args, ctx, solution),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Direction;

    #[test]
    fn db_ids_are_unique() {
        let mut ids: Vec<_> = CATALOG.iter().map(Solver::db_id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), CATALOG.len());
    }

    #[test]
    fn every_direction_has_a_catch_all() {
        let fwd = ProblemContext::new(Direction::Forward);
        assert!(CATALOG.iter().any(|s| s.is_applicable(&fwd)));

        let wrw = ProblemContext::new(Direction::BackwardWeights);
        assert!(CATALOG.iter().any(|s| s.is_applicable(&wrw)));
    }

    #[test]
    fn searchable_flags_match_the_tuning_spaces() {
        let searchable: Vec<_> = CATALOG
            .iter()
            .filter(|s| s.is_searchable())
            .map(Solver::db_id)
            .collect();
        assert_eq!(
            searchable,
            ["DirectFwd3x3", "BwdWeights3x3", "BwdWeights1x1"]
        );
    }
}
