//! Exhaustive tuning search shared by all searchable solvers.

use crate::context::ProblemContext;
use crate::runtime::{prepare_measure_buffers, ProfilingScope, RuntimeHandle, Timing};
use crate::solver::SearchableSolver;
use crate::tuning::TuningSpace;
use anyhow::{bail, Result};
use tracing::{debug, info};

/// Sweeps the solver's whole tuning space on real buffers and returns the
/// fastest config. Fails when no candidate could be timed.
pub fn exhaustive_search<S: SearchableSolver>(
    solver: &S,
    ctx: &ProblemContext,
    handle: &mut dyn RuntimeHandle,
) -> Result<S::Tuning> {
    let args = prepare_measure_buffers(handle, ctx)?;
    let mut scope = ProfilingScope::new(handle);

    let mut best: Option<(S::Tuning, f32)> = None;
    let mut timed = 0usize;
    let mut skipped = 0usize;
    let mut candidate = S::Tuning::minimum();

    loop {
        if candidate.is_valid_value() && solver.is_valid_tuning(ctx, &candidate) {
            let solution = solver.solution_with(ctx, &candidate);
            if solution.succeeded() {
                match solver.run_and_measure(scope.handle(), &args, ctx, &solution) {
                    Timing::Measured(elapsed_ms) => {
                        timed += 1;
                        if best.as_ref().map_or(true, |(_, best_ms)| elapsed_ms < *best_ms) {
                            debug!(tuning = %candidate, elapsed_ms, "new best candidate");
                            best = Some((candidate.clone(), elapsed_ms));
                        }
                    }
                    Timing::NotImplemented => {
                        bail!("solver cannot time its own candidates")
                    }
                    Timing::Failed(code) => {
                        skipped += 1;
                        debug!(tuning = %candidate, code, "candidate failed to run");
                    }
                }
            }
        }
        if !candidate.advance() {
            break;
        }
    }

    match best {
        Some((tuning, elapsed_ms)) => {
            info!(%tuning, elapsed_ms, timed, skipped, "search finished");
            Ok(tuning)
        }
        None => bail!("search timed no candidate ({skipped} failed to run)"),
    }
}
