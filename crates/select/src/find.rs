//! Per-solver solution resolution.
//!
//! For a searchable solver the pipeline tries, in order: the persisted
//! tuning, an exhaustive search (when requested), and the solver's default
//! config. It must always come back with some solution; a failed search is
//! logged and absorbed, only database I/O failures propagate.

use crate::enforce::FindEnforce;
use anyhow::Result;
use convplan_perfdb::PerfDb;
use convplan_solvers::{
    ConvSolution, FixedSolver, ProblemContext, RuntimeHandle, SearchableSolver, Solver, SolverBase,
};
use tracing::{debug, error, info, warn};

/// Resolves `solver`'s solution for `ctx` under the process-wide
/// enforcement state.
pub fn find_solution(
    solver: &Solver,
    ctx: &ProblemContext,
    db: &PerfDb,
    handle: &mut dyn RuntimeHandle,
) -> Result<ConvSolution> {
    find_solution_enforced(solver, ctx, db, handle, FindEnforce::from_env())
}

/// [`find_solution`] with an explicit enforcement state.
pub fn find_solution_enforced(
    solver: &Solver,
    ctx: &ProblemContext,
    db: &PerfDb,
    handle: &mut dyn RuntimeHandle,
    enforce: FindEnforce,
) -> Result<ConvSolution> {
    match solver {
        Solver::DirectFwd3x3(s) => find_searchable(s, ctx, db, handle, enforce),
        Solver::Winograd3x3(s) => find_fixed(s, ctx),
        Solver::DirectFwdGeneric(s) => find_fixed(s, ctx),
        Solver::BwdWeights3x3(s) => find_searchable(s, ctx, db, handle, enforce),
        Solver::BwdWeights1x1(s) => find_searchable(s, ctx, db, handle, enforce),
        Solver::BwdWeightsFused1x1(s) => find_fixed(s, ctx),
        Solver::BwdWeightsLarge(s) => find_fixed(s, ctx),
        Solver::BwdWeightsTiled(s) => find_fixed(s, ctx),
    }
}

fn find_fixed<S: FixedSolver + Sized + 'static>(
    solver: &S,
    ctx: &ProblemContext,
) -> Result<ConvSolution> {
    debug!(solver = solver.db_id(), "not searchable");
    Ok(solver.solution(ctx))
}

fn find_searchable<S: SearchableSolver>(
    solver: &S,
    ctx: &ProblemContext,
    db: &PerfDb,
    handle: &mut dyn RuntimeHandle,
    enforce: FindEnforce,
) -> Result<ConvSolution> {
    let id = solver.db_id();
    let key = ctx.key();
    debug!(solver = id, "resolving solution");

    if enforce == FindEnforce::Clean {
        if db.remove(&key, id)? {
            warn!(solver = id, %enforce, "perf db record removed");
        }
        return Ok(solver.solution_with(ctx, &solver.default_tuning(ctx)));
    }

    let searching = ctx.do_search || enforce == FindEnforce::Search;
    let skip_load =
        enforce == FindEnforce::SkipLoad || (searching && enforce == FindEnforce::Update);

    if skip_load {
        warn!(solver = id, %enforce, "perf db load skipped");
    } else {
        let mut tuning = S::Tuning::default();
        if db.load(&key, id, &mut tuning)? {
            debug!(solver = id, "perf db record loaded");
            if solver.is_valid_tuning(ctx, &tuning) {
                return Ok(solver.solution_with(ctx, &tuning));
            }
            error!(solver = id, %tuning, "invalid tuning loaded from perf db");
        }
    }

    if searching {
        info!(solver = id, %enforce, "starting exhaustive search");
        match solver.search(ctx, handle) {
            Ok(tuning) => {
                db.update(&key, id, &tuning)?;
                return Ok(solver.solution_with(ctx, &tuning));
            }
            Err(e) => error!(solver = id, error = %e, "search failed"),
        }
    }

    Ok(solver.solution_with(ctx, &solver.default_tuning(ctx)))
}
