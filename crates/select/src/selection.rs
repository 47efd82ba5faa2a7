//! Across-solver selection.

use crate::env;
use crate::find::find_solution;
use anyhow::{bail, Result};
use convplan_perfdb::PerfDb;
use convplan_solvers::{
    prepare_measure_buffers, ConvSolution, ProblemContext, ProfilingScope, RuntimeHandle, Solver,
    SolutionStatus, Timing,
};
use tracing::{debug, error, info, warn};

/// Picks one solution for `ctx` from `catalog`, in catalog order.
///
/// Backward-weights problems without subsampling are selected by timing
/// every candidate on the device; everything else takes the first
/// applicable solver that produces a succeeded solution. When nothing
/// succeeds the returned solution carries
/// [`SolutionStatus::UnknownError`].
pub fn search_for_solution(
    catalog: &[Solver],
    ctx: &ProblemContext,
    db: &PerfDb,
    handle: &mut dyn RuntimeHandle,
) -> Result<ConvSolution> {
    let no_perf_filtering = env::perf_filtering_disabled();

    // Subsampling strides keep the first-hit path.
    if ctx.direction.is_backward_weights() && ctx.kernel_stride0 <= 1 {
        select_timed(catalog, ctx, db, handle, no_perf_filtering)
    } else {
        select_first_hit(catalog, ctx, db, handle, no_perf_filtering)
    }
}

/// Collects every succeeded solution instead of picking one; no timing.
/// Catalog order is preserved in the result.
pub fn search_for_all_solutions(
    catalog: &[Solver],
    ctx: &ProblemContext,
    db: &PerfDb,
    handle: &mut dyn RuntimeHandle,
) -> Result<Vec<ConvSolution>> {
    let no_perf_filtering = env::perf_filtering_disabled();
    let mut solutions = Vec::new();
    for solver in catalog {
        if !passes_filters(solver, ctx, no_perf_filtering) {
            continue;
        }
        let solution = find_solution(solver, ctx, db, handle)?;
        if solution.succeeded() {
            ensure_constructible(solver, &solution)?;
            debug!(solver = solver.db_id(), "candidate collected");
            solutions.push(solution);
        }
    }
    Ok(solutions)
}

fn passes_filters(solver: &Solver, ctx: &ProblemContext, no_perf_filtering: bool) -> bool {
    if !solver.is_applicable(ctx) {
        debug!(solver = solver.db_id(), "not applicable");
        return false;
    }
    if !no_perf_filtering && !solver.is_fast(ctx) {
        debug!(solver = solver.db_id(), "filtered as slow");
        return false;
    }
    true
}

/// A solver claiming success without kernels is broken; surface it with
/// its id instead of handing the caller an unbuildable plan.
fn ensure_constructible(solver: &Solver, solution: &ConvSolution) -> Result<()> {
    if solution.construction_params.is_empty() {
        bail!("internal error in solver: {}", solver.db_id());
    }
    Ok(())
}

fn select_first_hit(
    catalog: &[Solver],
    ctx: &ProblemContext,
    db: &PerfDb,
    handle: &mut dyn RuntimeHandle,
    no_perf_filtering: bool,
) -> Result<ConvSolution> {
    for solver in catalog {
        if !passes_filters(solver, ctx, no_perf_filtering) {
            continue;
        }
        let solution = find_solution(solver, ctx, db, handle)?;
        if !solution.succeeded() {
            continue;
        }
        ensure_constructible(solver, &solution)?;
        info!(solver = solver.db_id(), "selected first applicable solver");
        return Ok(solution);
    }
    Ok(ConvSolution::with_status(SolutionStatus::UnknownError))
}

/// Times every applicable candidate and keeps the fastest.
///
/// Candidates that cannot time themselves never beat a timed one; among
/// them, only the first seen can win, and only when nothing was timed at
/// all. Among timed candidates the comparison is strict, so the first of
/// two equal times stays selected.
fn select_timed(
    catalog: &[Solver],
    ctx: &ProblemContext,
    db: &PerfDb,
    handle: &mut dyn RuntimeHandle,
    no_perf_filtering: bool,
) -> Result<ConvSolution> {
    let mut selected = ConvSolution::with_status(SolutionStatus::UnknownError);
    let mut best_time = f32::INFINITY;
    let mut untimed_seen = false;

    for solver in catalog {
        if !passes_filters(solver, ctx, no_perf_filtering) {
            continue;
        }
        let candidate = find_solution(solver, ctx, db, handle)?;
        if !candidate.succeeded() {
            continue;
        }
        ensure_constructible(solver, &candidate)?;

        let args = prepare_measure_buffers(handle, ctx)?;
        let mut scope = ProfilingScope::new(handle);
        let timing = solver.run_and_measure(scope.handle(), &args, ctx, &candidate);
        drop(scope);

        match timing {
            Timing::Measured(elapsed_ms) => {
                debug!(solver = solver.db_id(), elapsed_ms, "timing ok");
                if elapsed_ms < best_time {
                    info!(
                        solver = solver.db_id(),
                        elapsed_ms, best_ms = best_time, "new fastest candidate"
                    );
                    best_time = elapsed_ms;
                    selected = candidate;
                }
            }
            Timing::NotImplemented => {
                warn!(solver = solver.db_id(), "timing not implemented");
                // The first untimeable candidate stands in until any
                // timed one shows up.
                if !untimed_seen {
                    untimed_seen = true;
                    if best_time.is_infinite() {
                        selected = candidate;
                    }
                }
            }
            Timing::Failed(code) => {
                error!(solver = solver.db_id(), code, "timing failed");
            }
        }
    }
    Ok(selected)
}
