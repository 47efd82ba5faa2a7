//! Forward convolution solvers.

use crate::context::ProblemContext;
use crate::runtime::{measure_kernels, MeasureArgs, RuntimeHandle, Timing};
use crate::solution::{ConvSolution, KernelInfo};
use crate::solver::{FixedSolver, SearchableSolver, SolverBase};
use crate::tuning::{next_in_range, TuningSpace};
use convplan_perfdb::{serialize_values, FieldVisitor, TuningFields};
use serde::{Deserialize, Serialize};
use std::fmt;

fn div_ceil(n: i32, d: i32) -> i32 {
    (n + d - 1) / d
}

/// Tuning space of [`DirectFwd3x3`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fwd3x3Tuning {
    /// Wavefront cap hint for the scheduler; 0 means uncapped. [0..9]
    pub limit_wave_cnt: i32,
    /// Output channels produced per wavefront. [1..8]
    pub filters_per_wave: i32,
    /// Output rows produced per wavefront. [1..8]
    pub output_lines_per_wave: i32,
}

impl Default for Fwd3x3Tuning {
    fn default() -> Self {
        Self::minimum()
    }
}

impl TuningFields for Fwd3x3Tuning {
    fn visit(&mut self, visitor: &mut dyn FieldVisitor) {
        visitor.field(&mut self.limit_wave_cnt, "limit_wave_cnt");
        visitor.field(&mut self.filters_per_wave, "filters_per_wave");
        visitor.field(&mut self.output_lines_per_wave, "output_lines_per_wave");
    }
}

impl TuningSpace for Fwd3x3Tuning {
    fn minimum() -> Self {
        Self {
            limit_wave_cnt: 0,
            filters_per_wave: 1,
            output_lines_per_wave: 1,
        }
    }

    fn advance(&mut self) -> bool {
        next_in_range(&mut self.limit_wave_cnt, 0, 9)
            || next_in_range(&mut self.filters_per_wave, 1, 8)
            || next_in_range(&mut self.output_lines_per_wave, 1, 8)
    }

    fn is_valid_value(&self) -> bool {
        (0..=9).contains(&self.limit_wave_cnt)
            && (1..=8).contains(&self.filters_per_wave)
            && (1..=8).contains(&self.output_lines_per_wave)
    }
}

impl fmt::Display for Fwd3x3Tuning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&serialize_values(self))
    }
}

/// Assembly 3x3 stride-1 forward convolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectFwd3x3;

impl SolverBase for DirectFwd3x3 {
    fn is_applicable(&self, ctx: &ProblemContext) -> bool {
        ctx.direction.is_forward()
            && ctx.kernel_size0 == 3
            && ctx.kernel_size1 == 3
            && ctx.kernel_stride0 == 1
            && ctx.kernel_stride1 == 1
            && ctx.pad0 == 1
            && ctx.pad1 == 1
            && ctx.in_width >= 3
            && ctx.in_height >= 3
    }

    fn is_fast(&self, ctx: &ProblemContext) -> bool {
        // Loses to the generic kernel on very narrow images.
        ctx.in_width >= 8
    }

    fn run_and_measure(
        &self,
        handle: &mut dyn RuntimeHandle,
        args: &MeasureArgs,
        _ctx: &ProblemContext,
        solution: &ConvSolution,
    ) -> Timing {
        measure_kernels(handle, &solution.construction_params, args)
    }
}

impl SearchableSolver for DirectFwd3x3 {
    type Tuning = Fwd3x3Tuning;

    fn default_tuning(&self, ctx: &ProblemContext) -> Fwd3x3Tuning {
        let filters_per_wave = [8, 4, 2, 1]
            .into_iter()
            .find(|w| ctx.n_outputs % w == 0)
            .unwrap_or(1);
        Fwd3x3Tuning {
            limit_wave_cnt: 0,
            filters_per_wave,
            output_lines_per_wave: if ctx.in_height >= 32 { 2 } else { 1 },
        }
    }

    fn is_valid_tuning(&self, ctx: &ProblemContext, tuning: &Fwd3x3Tuning) -> bool {
        tuning.is_valid_value()
            && ctx.n_outputs % tuning.filters_per_wave == 0
            && tuning.output_lines_per_wave <= ctx.in_height
    }

    fn solution_with(&self, ctx: &ProblemContext, tuning: &Fwd3x3Tuning) -> ConvSolution {
        let mut solution = ConvSolution::new();
        let wave = 64usize;
        let line_groups = div_ceil(ctx.in_height, tuning.output_lines_per_wave);
        let filter_groups = div_ceil(ctx.n_outputs, tuning.filters_per_wave);
        solution.construction_params.push(KernelInfo {
            compile_options: format!(
                "-Wa,-defsym,img_w={} -Wa,-defsym,img_h={} -Wa,-defsym,batch={} \
                 -Wa,-defsym,limit_wave_cnt={} -Wa,-defsym,filters_per_wave={} \
                 -Wa,-defsym,output_lines_per_wave={}",
                ctx.in_width,
                ctx.in_height,
                ctx.batch,
                tuning.limit_wave_cnt,
                tuning.filters_per_wave,
                tuning.output_lines_per_wave
            ),
            local_work_size: vec![wave, 1, 1],
            global_work_size: vec![
                wave * line_groups as usize,
                filter_groups as usize,
                ctx.batch as usize,
            ],
            source_path: "kernels/direct_fwd_3x3.s".into(),
            entry_name: "direct_fwd_3x3".into(),
        });
        solution.grp_tile0 = wave as i32;
        solution.grp_tile1 = 1;
        solution.out_pix_tile0 = 1;
        solution.out_pix_tile1 = tuning.output_lines_per_wave;
        solution.n_out_pix_tiles = tuning.filters_per_wave;
        solution.n_in_data_tiles = 1;
        solution.n_stacks = 1;
        solution
    }
}

/// F(2x2, 3x3) Winograd forward convolution shipped as a binary kernel.
/// No tuning space: the binary fixes its own schedule.
#[derive(Debug, Clone, Copy, Default)]
pub struct Winograd3x3;

impl SolverBase for Winograd3x3 {
    fn is_applicable(&self, ctx: &ProblemContext) -> bool {
        ctx.direction.is_forward()
            && ctx.kernel_size0 == 3
            && ctx.kernel_size1 == 3
            && ctx.kernel_stride0 == 1
            && ctx.kernel_stride1 == 1
            && ctx.n_inputs >= 16
            && ctx.n_outputs >= 16
    }
}

impl FixedSolver for Winograd3x3 {
    fn solution(&self, ctx: &ProblemContext) -> ConvSolution {
        let mut solution = ConvSolution::new();
        let group = 256usize;
        let tiles = div_ceil(ctx.in_width, 2) * div_ceil(ctx.in_height, 2);
        solution.construction_params.push(KernelInfo {
            compile_options: String::new(),
            local_work_size: vec![group, 1, 1],
            global_work_size: vec![
                group * div_ceil(tiles * ctx.n_outputs, group as i32) as usize,
                ctx.batch as usize,
                1,
            ],
            source_path: "kernels/winograd_3x3_f2.bin".into(),
            entry_name: "winograd_3x3_f2".into(),
        });
        solution.grp_tile0 = group as i32;
        solution.grp_tile1 = 1;
        solution
    }
}

/// Source-generated direct convolution; the catch-all forward path.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectFwdGeneric;

impl SolverBase for DirectFwdGeneric {
    fn is_applicable(&self, ctx: &ProblemContext) -> bool {
        ctx.direction.is_forward()
            && ctx.kernel_size0 >= 1
            && ctx.kernel_size1 >= 1
            && ctx.kernel_stride0 >= 1
            && ctx.kernel_stride1 >= 1
    }
}

impl FixedSolver for DirectFwdGeneric {
    fn solution(&self, ctx: &ProblemContext) -> ConvSolution {
        let mut solution = ConvSolution::new();
        let tile = 16usize;
        solution.construction_params.push(KernelInfo {
            compile_options: format!(
                "-DKERNEL_SIZE0={} -DKERNEL_SIZE1={} -DSTRIDE0={} -DSTRIDE1={} -DPAD0={} -DPAD1={} -DBIAS={}",
                ctx.kernel_size0,
                ctx.kernel_size1,
                ctx.kernel_stride0,
                ctx.kernel_stride1,
                ctx.pad0,
                ctx.pad1,
                u8::from(ctx.bias)
            ),
            local_work_size: vec![tile, tile, 1],
            global_work_size: vec![
                tile * div_ceil(ctx.in_width, tile as i32) as usize,
                tile * div_ceil(ctx.in_height, tile as i32) as usize,
                (ctx.n_outputs * ctx.batch) as usize,
            ],
            source_path: "kernels/direct_fwd_generic.cl".into(),
            entry_name: "direct_fwd_generic".into(),
        });
        solution.grp_tile0 = tile as i32;
        solution.grp_tile1 = tile as i32;
        solution.in_tile0 = tile as i32;
        solution.in_tile1 = tile as i32;
        solution.out_pix_tile0 = 1;
        solution.out_pix_tile1 = 1;
        solution.n_out_pix_tiles = 1;
        solution.n_in_data_tiles = 1;
        solution.n_stacks = 1;
        solution
    }
}
