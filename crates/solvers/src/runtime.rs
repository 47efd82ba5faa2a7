//! Interface to the GPU runtime used for on-device timing.
//!
//! The selection core never compiles or launches kernels itself; it hands
//! build plans to a [`RuntimeHandle`] and reads back elapsed times.

use crate::context::ProblemContext;
use crate::solution::KernelInfo;
use anyhow::Result;

/// Opaque reference to a device buffer owned by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferHandle(pub u64);

/// Buffers bound to a measured kernel launch.
#[derive(Debug, Clone)]
pub struct MeasureArgs {
    pub bot: BufferHandle,
    pub top: BufferHandle,
    pub weights: BufferHandle,
    pub bias: Option<BufferHandle>,
}

/// Outcome of one on-device measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Timing {
    /// Elapsed wall time in milliseconds.
    Measured(f32),
    /// The solver has no measurement path.
    NotImplemented,
    /// The runtime reported a failure; the raw code is kept for logs.
    Failed(i32),
}

pub trait RuntimeHandle {
    /// Materializes `data` on the device.
    fn write_buffer(&mut self, data: &[f32]) -> Result<BufferHandle>;

    fn enable_profiling(&mut self, enabled: bool);

    /// Builds and launches `kernels` in order against `args`, returning the
    /// elapsed time in milliseconds.
    fn run_kernels(&mut self, kernels: &[KernelInfo], args: &MeasureArgs) -> Result<f32>;
}

/// Keeps profiling enabled for its lifetime and disables it on every exit
/// path, including panics.
pub struct ProfilingScope<'a> {
    handle: &'a mut dyn RuntimeHandle,
}

impl<'a> ProfilingScope<'a> {
    pub fn new(handle: &'a mut dyn RuntimeHandle) -> Self {
        handle.enable_profiling(true);
        Self { handle }
    }

    pub fn handle(&mut self) -> &mut dyn RuntimeHandle {
        self.handle
    }
}

impl Drop for ProfilingScope<'_> {
    fn drop(&mut self) {
        self.handle.enable_profiling(false);
    }
}

/// Uploads the four measurement buffers for `ctx`.
///
/// Buffers the current direction does not produce are randomized with
/// U(0,1); weights use (U(0,1) - 0.5) * 0.001 so accumulated products stay
/// small; the bias buffer is filled only when the problem carries a bias.
/// The RNG is private to the call.
pub fn prepare_measure_buffers(
    handle: &mut dyn RuntimeHandle,
    ctx: &ProblemContext,
) -> Result<MeasureArgs> {
    let mut rng = fastrand::Rng::new();
    let elem = std::mem::size_of::<f32>();

    let mut bot = vec![0.0f32; ctx.bot_sz / elem];
    if !ctx.direction.is_forward() {
        fill_unit(&mut rng, &mut bot);
    }
    let mut top = vec![0.0f32; ctx.top_sz / elem];
    if !ctx.direction.is_backward_data() {
        fill_unit(&mut rng, &mut top);
    }
    let mut weights = vec![0.0f32; ctx.weights_sz / elem];
    if !ctx.direction.is_backward_weights() {
        fill_offset_scaled(&mut rng, &mut weights, -0.5, 0.001);
    }
    let mut bias = vec![0.0f32; ctx.bias_sz / elem];
    if ctx.bias {
        fill_unit(&mut rng, &mut bias);
    }

    Ok(MeasureArgs {
        bot: handle.write_buffer(&bot)?,
        top: handle.write_buffer(&top)?,
        weights: handle.write_buffer(&weights)?,
        bias: if ctx.bias {
            Some(handle.write_buffer(&bias)?)
        } else {
            None
        },
    })
}

/// Runs a build plan through the handle and folds the result into the
/// measurement protocol.
pub fn measure_kernels(
    handle: &mut dyn RuntimeHandle,
    kernels: &[KernelInfo],
    args: &MeasureArgs,
) -> Timing {
    match handle.run_kernels(kernels, args) {
        Ok(elapsed_ms) => Timing::Measured(elapsed_ms),
        Err(e) => {
            tracing::debug!(error = %e, "kernel launch failed during timing");
            Timing::Failed(-1)
        }
    }
}

fn fill_unit(rng: &mut fastrand::Rng, buf: &mut [f32]) {
    for value in buf {
        *value = rng.f32();
    }
}

fn fill_offset_scaled(rng: &mut fastrand::Rng, buf: &mut [f32], offset: f64, factor: f64) {
    for value in buf {
        *value = ((f64::from(rng.f32()) + offset) * factor) as f32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Direction;
    use anyhow::anyhow;

    #[derive(Default)]
    struct RecordingRuntime {
        profiling: bool,
        uploads: Vec<Vec<f32>>,
    }

    impl RuntimeHandle for RecordingRuntime {
        fn write_buffer(&mut self, data: &[f32]) -> Result<BufferHandle> {
            self.uploads.push(data.to_vec());
            Ok(BufferHandle(self.uploads.len() as u64))
        }

        fn enable_profiling(&mut self, enabled: bool) {
            self.profiling = enabled;
        }

        fn run_kernels(&mut self, _kernels: &[KernelInfo], _args: &MeasureArgs) -> Result<f32> {
            Err(anyhow!("no device"))
        }
    }

    #[test]
    fn forward_problems_leave_bot_unrandomized() {
        let mut runtime = RecordingRuntime::default();
        let ctx = ProblemContext::new(Direction::Forward);
        let args = prepare_measure_buffers(&mut runtime, &ctx).unwrap();

        assert!(args.bias.is_none());
        assert_eq!(runtime.uploads.len(), 3);
        let bot = &runtime.uploads[0];
        let top = &runtime.uploads[1];
        let weights = &runtime.uploads[2];
        assert!(bot.iter().all(|&v| v == 0.0));
        assert!(top.iter().any(|&v| v != 0.0));
        assert!(weights.iter().all(|&v| v.abs() <= 0.0005 + f32::EPSILON));
        assert!(weights.iter().any(|&v| v != 0.0));
    }

    #[test]
    fn backward_weights_problems_leave_weights_unrandomized() {
        let mut runtime = RecordingRuntime::default();
        let mut ctx = ProblemContext::new(Direction::BackwardWeights);
        ctx.bias = true;
        let args = prepare_measure_buffers(&mut runtime, &ctx).unwrap();

        assert!(args.bias.is_some());
        assert_eq!(runtime.uploads.len(), 4);
        assert!(runtime.uploads[0].iter().any(|&v| v != 0.0), "bot");
        assert!(runtime.uploads[1].iter().any(|&v| v != 0.0), "top");
        assert!(runtime.uploads[2].iter().all(|&v| v == 0.0), "weights");
        assert!(runtime.uploads[3].iter().any(|&v| v != 0.0), "bias");
    }

    #[test]
    fn profiling_scope_disables_on_drop() {
        let mut runtime = RecordingRuntime::default();
        {
            let _scope = ProfilingScope::new(&mut runtime);
        }
        assert!(!runtime.profiling);
    }

    #[test]
    fn failed_launches_become_timing_failures() {
        let mut runtime = RecordingRuntime::default();
        let args = MeasureArgs {
            bot: BufferHandle(1),
            top: BufferHandle(2),
            weights: BufferHandle(3),
            bias: None,
        };
        let timing = measure_kernels(&mut runtime, &[], &args);
        assert!(matches!(timing, Timing::Failed(_)));
    }
}
