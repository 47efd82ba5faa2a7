//! Backward-weights (weight gradient) solvers.

use crate::context::ProblemContext;
use crate::runtime::{measure_kernels, MeasureArgs, RuntimeHandle, Timing};
use crate::solution::{ConvSolution, KernelInfo};
use crate::solver::{FixedSolver, SearchableSolver, SolverBase};
use crate::tuning::{next_choice, next_in_range, TuningSpace};
use convplan_perfdb::{serialize_values, FieldVisitor, TuningFields};
use serde::{Deserialize, Serialize};
use std::fmt;

fn div_ceil(n: i32, d: i32) -> i32 {
    (n + d - 1) / d
}

/// Tuning space of [`BwdWeights3x3`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wrw3x3Tuning {
    /// Wavefront cap hint; 0 means uncapped. [0..9]
    pub limit_wave_cnt: i32,
    /// Swap the roles of the input and output tensors. {0,1}
    pub reverse_inout: i32,
    /// Lanes cooperating on one channel. {8,16}; smaller values raise
    /// register pressure.
    pub chunk_size: i32,
    /// Output channels per wavefront. {1,2,4,8} and
    /// chunk_size * k_per_wave <= 64.
    pub k_per_wave: i32,
    /// Software pipeline depth in image lines. [1..16] and bounded by the
    /// image height.
    pub pipe_lines_depth: i32,
    /// Workgroups ganged per batch slice. [1..8] and bounded by the batch.
    pub n_per_group: i32,
}

impl Default for Wrw3x3Tuning {
    fn default() -> Self {
        Self::minimum()
    }
}

impl TuningFields for Wrw3x3Tuning {
    fn visit(&mut self, visitor: &mut dyn FieldVisitor) {
        visitor.field(&mut self.limit_wave_cnt, "limit_wave_cnt");
        visitor.field(&mut self.reverse_inout, "reverse_inout");
        visitor.field(&mut self.chunk_size, "chunk_size");
        visitor.field(&mut self.k_per_wave, "k_per_wave");
        visitor.field(&mut self.pipe_lines_depth, "pipe_lines_depth");
        visitor.field(&mut self.n_per_group, "n_per_group");
    }
}

impl TuningSpace for Wrw3x3Tuning {
    fn minimum() -> Self {
        Self {
            limit_wave_cnt: 0,
            reverse_inout: 0,
            chunk_size: 8,
            k_per_wave: 1,
            pipe_lines_depth: 1,
            n_per_group: 1,
        }
    }

    fn advance(&mut self) -> bool {
        next_in_range(&mut self.limit_wave_cnt, 0, 9)
            || next_choice(&mut self.reverse_inout, &[0, 1])
            || next_choice(&mut self.chunk_size, &[8, 16])
            || next_choice(&mut self.k_per_wave, &[1, 2, 4, 8])
            || next_in_range(&mut self.pipe_lines_depth, 1, 16)
            || next_in_range(&mut self.n_per_group, 1, 8)
    }

    fn is_valid_value(&self) -> bool {
        (0..=9).contains(&self.limit_wave_cnt)
            && (0..=1).contains(&self.reverse_inout)
            && [8, 16].contains(&self.chunk_size)
            && [1, 2, 4, 8].contains(&self.k_per_wave)
            && self.chunk_size * self.k_per_wave <= 64
            && (1..=16).contains(&self.pipe_lines_depth)
            && (1..=8).contains(&self.n_per_group)
    }
}

impl fmt::Display for Wrw3x3Tuning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&serialize_values(self))
    }
}

/// Assembly 3x3 stride-1 weight gradient.
#[derive(Debug, Clone, Copy, Default)]
pub struct BwdWeights3x3;

impl SolverBase for BwdWeights3x3 {
    fn is_applicable(&self, ctx: &ProblemContext) -> bool {
        ctx.direction.is_backward_weights()
            && ctx.kernel_size0 == 3
            && ctx.kernel_size1 == 3
            && ctx.kernel_stride0 == 1
            && ctx.kernel_stride1 == 1
            && ctx.pad0 <= 1
            && ctx.pad1 <= 1
            && ctx.in_height >= 1
    }

    fn is_fast(&self, ctx: &ProblemContext) -> bool {
        // Pipeline stalls dominate on narrow lines.
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

impl SearchableSolver for BwdWeights3x3 {
    type Tuning = Wrw3x3Tuning;

    fn default_tuning(&self, ctx: &ProblemContext) -> Wrw3x3Tuning {
        let k_per_wave = [8, 4, 2, 1]
            .into_iter()
            .find(|k| ctx.fwd_k() % k == 0)
            .unwrap_or(1);
        Wrw3x3Tuning {
            limit_wave_cnt: 0,
            reverse_inout: 0,
            chunk_size: 8,
            k_per_wave,
            pipe_lines_depth: ctx.in_height.min(2),
            n_per_group: 1,
        }
    }

    fn is_valid_tuning(&self, ctx: &ProblemContext, tuning: &Wrw3x3Tuning) -> bool {
        if !tuning.is_valid_value() {
            return false;
        }
        if tuning.reverse_inout == 1 && (ctx.kernel_stride0 != 1 || ctx.kernel_stride1 != 1) {
            return false;
        }
        let split_channels = if tuning.reverse_inout == 0 {
            ctx.fwd_k()
        } else {
            ctx.fwd_c()
        };
        split_channels % tuning.k_per_wave == 0
            && tuning.pipe_lines_depth <= ctx.in_height
            && tuning.n_per_group <= ctx.batch
    }

    fn solution_with(&self, ctx: &ProblemContext, tuning: &Wrw3x3Tuning) -> ConvSolution {
        let mut solution = ConvSolution::new();
        let group = 64 * tuning.n_per_group as usize;
        let channel_groups = div_ceil(ctx.fwd_k(), tuning.k_per_wave);
        solution.construction_params.push(KernelInfo {
            compile_options: format!(
                "-Wa,-defsym,img_w={} -Wa,-defsym,img_h={} -Wa,-defsym,batch={} \
                 -Wa,-defsym,limit_wave_cnt={} -Wa,-defsym,reverse_inout={} \
                 -Wa,-defsym,chunk_size={} -Wa,-defsym,k_per_wave={} \
                 -Wa,-defsym,pipe_lines_depth={} -Wa,-defsym,n_per_group={}",
                ctx.in_width,
                ctx.in_height,
                ctx.batch,
                tuning.limit_wave_cnt,
                tuning.reverse_inout,
                tuning.chunk_size,
                tuning.k_per_wave,
                tuning.pipe_lines_depth,
                tuning.n_per_group
            ),
            local_work_size: vec![group, 1, 1],
            global_work_size: vec![group * channel_groups as usize, 1, 1],
            source_path: "kernels/wrw_3x3.s".into(),
            entry_name: "wrw_3x3".into(),
        });
        solution.grp_tile0 = group as i32;
        solution.grp_tile1 = 1;
        solution.in_tile1 = tuning.pipe_lines_depth;
        solution.n_out_pix_tiles = tuning.k_per_wave;
        solution.n_stacks = tuning.n_per_group;
        solution
    }
}

/// Tuning space of [`BwdWeights1x1`].
///
/// Constraints beyond the per-field domains:
/// - `k_per_gpr <= c_per_gpr`;
/// - the register budget
///   `c_mult*k_mult*k_per_gpr + 9 + (c_mult+k_mult)*read_size*pipe_depth`
///   stays within 256 vgprs (pipe depth is 1 in this kernel);
/// - when either multiplier exceeds 1, the forward-orientation channel
///   counts must split evenly (checked against the problem).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wrw1x1Tuning {
    /// Input channels per register. {1,2,4,8,16}
    pub c_per_gpr: i32,
    /// Input channel blocks processed per lane. {1,2,4,8,16}
    pub c_mult: i32,
    /// Output channels per register. {1,2,4,8,16}
    pub k_per_gpr: i32,
    /// Output channel blocks processed per lane. {1,2,4,8,16}
    pub k_mult: i32,
    /// Dwords fetched per memory instruction. [1..4]
    pub read_size: i32,
    /// Batch images per register. {1,2,4}
    pub n_per_gpr: i32,
}

impl Wrw1x1Tuning {
    /// Lanes cooperating on one channel; the register file fixes
    /// chunk_size * c_per_gpr at 16.
    pub fn chunk_size(&self) -> i32 {
        16 / self.c_per_gpr
    }

    /// Image positions per register, complementary to `n_per_gpr`.
    pub fn hw_per_gpr(&self) -> i32 {
        4 / self.n_per_gpr
    }

    fn pipe_depth(&self) -> i32 {
        1
    }

    fn register_budget(&self) -> i32 {
        self.c_mult * self.k_mult * self.k_per_gpr
            + 9
            + (self.c_mult + self.k_mult) * self.read_size * self.pipe_depth()
    }
}

impl Default for Wrw1x1Tuning {
    fn default() -> Self {
        Self::minimum()
    }
}

impl TuningFields for Wrw1x1Tuning {
    fn visit(&mut self, visitor: &mut dyn FieldVisitor) {
        visitor.field(&mut self.c_per_gpr, "c_per_gpr");
        visitor.field(&mut self.c_mult, "c_mult");
        visitor.field(&mut self.k_per_gpr, "k_per_gpr");
        visitor.field(&mut self.k_mult, "k_mult");
        visitor.field(&mut self.read_size, "read_size");
        visitor.field(&mut self.n_per_gpr, "n_per_gpr");
    }
}

const POW2_TO_16: [i32; 5] = [1, 2, 4, 8, 16];

impl TuningSpace for Wrw1x1Tuning {
    fn minimum() -> Self {
        Self {
            c_per_gpr: 1,
            c_mult: 1,
            k_per_gpr: 1,
            k_mult: 1,
            read_size: 1,
            n_per_gpr: 1,
        }
    }

    fn advance(&mut self) -> bool {
        next_choice(&mut self.c_per_gpr, &POW2_TO_16)
            || next_choice(&mut self.c_mult, &POW2_TO_16)
            || next_choice(&mut self.k_per_gpr, &POW2_TO_16)
            || next_choice(&mut self.k_mult, &POW2_TO_16)
            || next_in_range(&mut self.read_size, 1, 4)
            || next_choice(&mut self.n_per_gpr, &[1, 2, 4])
    }

    fn is_valid_value(&self) -> bool {
        POW2_TO_16.contains(&self.c_per_gpr)
            && POW2_TO_16.contains(&self.c_mult)
            && POW2_TO_16.contains(&self.k_per_gpr)
            && POW2_TO_16.contains(&self.k_mult)
            && (1..=4).contains(&self.read_size)
            && [1, 2, 4].contains(&self.n_per_gpr)
            && self.k_per_gpr <= self.c_per_gpr
            && self.register_budget() <= 256
    }
}

impl fmt::Display for Wrw1x1Tuning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&serialize_values(self))
    }
}

/// Assembly 1x1 weight gradient.
#[derive(Debug, Clone, Copy, Default)]
pub struct BwdWeights1x1;

impl SolverBase for BwdWeights1x1 {
    fn is_applicable(&self, ctx: &ProblemContext) -> bool {
        ctx.direction.is_backward_weights()
            && ctx.kernel_size0 == 1
            && ctx.kernel_size1 == 1
            && ctx.kernel_stride0 == 1
            && ctx.kernel_stride1 == 1
            && ctx.pad0 == 0
            && ctx.pad1 == 0
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

impl SearchableSolver for BwdWeights1x1 {
    type Tuning = Wrw1x1Tuning;

    fn default_tuning(&self, ctx: &ProblemContext) -> Wrw1x1Tuning {
        Wrw1x1Tuning {
            read_size: if ctx.in_width % 4 == 0 { 4 } else { 1 },
            ..Wrw1x1Tuning::minimum()
        }
    }

    fn is_valid_tuning(&self, ctx: &ProblemContext, tuning: &Wrw1x1Tuning) -> bool {
        if !tuning.is_valid_value() {
            return false;
        }
        if tuning.c_mult > 1 || tuning.k_mult > 1 {
            ctx.fwd_c() % (tuning.c_per_gpr * tuning.c_mult) == 0
                && ctx.fwd_k() % (tuning.k_per_gpr * tuning.k_mult) == 0
        } else {
            true
        }
    }

    fn solution_with(&self, ctx: &ProblemContext, tuning: &Wrw1x1Tuning) -> ConvSolution {
        let mut solution = ConvSolution::new();
        let group = 256usize;
        let k_blocks = div_ceil(ctx.fwd_k(), tuning.k_per_gpr * tuning.k_mult);
        solution.construction_params.push(KernelInfo {
            compile_options: format!(
                "-Wa,-defsym,c_per_gpr={} -Wa,-defsym,c_mult={} -Wa,-defsym,k_per_gpr={} \
                 -Wa,-defsym,k_mult={} -Wa,-defsym,read_size={} -Wa,-defsym,n_per_gpr={} \
                 -Wa,-defsym,chunk_size={} -Wa,-defsym,batch={}",
                tuning.c_per_gpr,
                tuning.c_mult,
                tuning.k_per_gpr,
                tuning.k_mult,
                tuning.read_size,
                tuning.n_per_gpr,
                tuning.chunk_size(),
                ctx.batch
            ),
            local_work_size: vec![group, 1, 1],
            global_work_size: vec![group * k_blocks as usize, 1, 1],
            source_path: "kernels/wrw_1x1.s".into(),
            entry_name: "wrw_1x1".into(),
        });
        solution.grp_tile0 = group as i32;
        solution.grp_tile1 = 1;
        solution.n_out_pix_tiles = tuning.k_mult;
        solution.n_in_data_tiles = tuning.c_mult;
        solution.n_stacks = tuning.n_per_gpr;
        solution
    }
}

/// OpenCL 1x1 weight gradient with a fused reduction. Fixed schedule, but
/// it can time itself through the runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct BwdWeightsFused1x1;

impl SolverBase for BwdWeightsFused1x1 {
    // Pinned: existing databases carry records from before the rename.
    fn db_id(&self) -> &'static str {
        "BwdWeightsOcl1x1"
    }

    fn is_applicable(&self, ctx: &ProblemContext) -> bool {
        ctx.direction.is_backward_weights()
            && ctx.kernel_size0 == 1
            && ctx.kernel_size1 == 1
            && ctx.kernel_stride0 == 1
            && ctx.kernel_stride1 == 1
            && ctx.pad0 == 0
            && ctx.pad1 == 0
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

impl FixedSolver for BwdWeightsFused1x1 {
    fn solution(&self, ctx: &ProblemContext) -> ConvSolution {
        let mut solution = ConvSolution::new();
        let group = 256usize;
        let outputs = ctx.fwd_c() * ctx.fwd_k();
        solution.construction_params.push(KernelInfo {
            compile_options: format!(
                "-DN_BATCHS={} -DIMG_W={} -DIMG_H={}",
                ctx.batch, ctx.in_width, ctx.in_height
            ),
            local_work_size: vec![group, 1, 1],
            global_work_size: vec![group * div_ceil(outputs, group as i32) as usize, 1, 1],
            source_path: "kernels/wrw_fused_1x1.cl".into(),
            entry_name: "wrw_fused_1x1".into(),
        });
        solution.grp_tile0 = group as i32;
        solution.grp_tile1 = 1;
        solution
    }
}

/// OpenCL weight gradient for 3x3-and-larger kernels. Not timeable.
#[derive(Debug, Clone, Copy, Default)]
pub struct BwdWeightsLarge;

impl SolverBase for BwdWeightsLarge {
    fn is_applicable(&self, ctx: &ProblemContext) -> bool {
        ctx.direction.is_backward_weights() && ctx.kernel_size0 * ctx.kernel_size1 >= 9
    }
}

impl FixedSolver for BwdWeightsLarge {
    fn solution(&self, ctx: &ProblemContext) -> ConvSolution {
        let mut solution = ConvSolution::new();
        let tile = 8usize;
        solution.construction_params.push(KernelInfo {
            compile_options: format!(
                "-DKERNEL_SIZE0={} -DKERNEL_SIZE1={} -DPAD0={} -DPAD1={}",
                ctx.kernel_size0, ctx.kernel_size1, ctx.pad0, ctx.pad1
            ),
            local_work_size: vec![tile, tile, 1],
            global_work_size: vec![
                tile * div_ceil(ctx.kernel_size0 * ctx.n_inputs, tile as i32) as usize,
                tile * div_ceil(ctx.kernel_size1 * ctx.n_outputs, tile as i32) as usize,
                1,
            ],
            source_path: "kernels/wrw_large.cl".into(),
            entry_name: "wrw_large".into(),
        });
        solution.grp_tile0 = tile as i32;
        solution.grp_tile1 = tile as i32;
        solution.out_pix_tile0 = 1;
        solution.out_pix_tile1 = 1;
        solution
    }
}

/// Two-stage tiled weight gradient; the catch-all backward-weights path.
/// Accumulates per-tile partial sums in a workspace, then reduces them.
#[derive(Debug, Clone, Copy, Default)]
pub struct BwdWeightsTiled;

impl SolverBase for BwdWeightsTiled {
    fn is_applicable(&self, ctx: &ProblemContext) -> bool {
        ctx.direction.is_backward_weights()
    }
}

impl FixedSolver for BwdWeightsTiled {
    fn solution(&self, ctx: &ProblemContext) -> ConvSolution {
        let mut solution = ConvSolution::new();
        let tile = 16usize;
        let stacks = ctx.batch.min(2);
        let main = KernelInfo {
            compile_options: format!(
                "-DKERNEL_SIZE0={} -DKERNEL_SIZE1={} -DSTRIDE0={} -DSTRIDE1={} -DN_STACKS={}",
                ctx.kernel_size0, ctx.kernel_size1, ctx.kernel_stride0, ctx.kernel_stride1, stacks
            ),
            local_work_size: vec![tile, tile, 1],
            global_work_size: vec![
                tile * div_ceil(ctx.in_width, tile as i32) as usize,
                tile * div_ceil(ctx.in_height, tile as i32) as usize,
                stacks as usize,
            ],
            source_path: "kernels/wrw_tiled.cl".into(),
            entry_name: "wrw_tiled_main".into(),
        };
        let reduce = KernelInfo {
            compile_options: format!("-DN_PARTIALS={stacks}"),
            local_work_size: vec![256, 1, 1],
            global_work_size: vec![
                256 * div_ceil(ctx.fwd_c() * ctx.fwd_k(), 256) as usize,
                1,
                1,
            ],
            source_path: "kernels/wrw_tiled.cl".into(),
            entry_name: "wrw_tiled_reduce".into(),
        };
        solution.construction_params = vec![main, reduce];
        // Partial sums per stack, reduced by the second kernel.
        solution.workspace_sz = ctx.weights_sz * stacks as usize;
        solution.grp_tile0 = tile as i32;
        solution.grp_tile1 = tile as i32;
        solution.in_tile0 = tile as i32;
        solution.in_tile1 = tile as i32;
        solution.n_stacks = stacks;
        solution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Direction;
    use convplan_perfdb::deserialize_values;
    use std::collections::HashSet;

    fn wrw_ctx(kernel: i32) -> ProblemContext {
        let mut ctx = ProblemContext::new(Direction::BackwardWeights);
        ctx.kernel_size0 = kernel;
        ctx.kernel_size1 = kernel;
        if kernel == 1 {
            ctx.pad0 = 0;
            ctx.pad1 = 0;
        }
        ctx.infer_buffer_sizes();
        ctx
    }

    #[test]
    fn wrw_3x3_sweep_enumerates_the_declared_domains() {
        let mut tuning = Wrw3x3Tuning::minimum();
        let mut valid = HashSet::new();
        let mut total = 0usize;
        loop {
            total += 1;
            if tuning.is_valid_value() {
                valid.insert(serialize_values(&tuning));
            }
            if !tuning.advance() {
                break;
            }
        }
        assert_eq!(total, 10 * 2 * 2 * 4 * 16 * 8);
        // chunk_size 16 with k_per_wave 8 breaks the 64-lane budget.
        assert_eq!(valid.len(), 10 * 2 * 7 * 16 * 8);
    }

    #[test]
    fn wrw_1x1_register_budget_rejects_extremes() {
        let mut tuning = Wrw1x1Tuning {
            c_per_gpr: 16,
            c_mult: 16,
            k_per_gpr: 16,
            k_mult: 16,
            read_size: 4,
            n_per_gpr: 1,
        };
        assert!(!tuning.is_valid_value());

        tuning = Wrw1x1Tuning::minimum();
        assert!(tuning.is_valid_value());
        assert_eq!(tuning.chunk_size(), 16);
        assert_eq!(tuning.hw_per_gpr(), 4);

        // k_per_gpr above c_per_gpr is out of the shader's layout.
        tuning.k_per_gpr = 2;
        assert!(!tuning.is_valid_value());
    }

    #[test]
    fn wrw_1x1_divisibility_is_checked_against_the_problem() {
        let solver = BwdWeights1x1;
        let mut ctx = wrw_ctx(1);
        ctx.n_inputs = 48; // fwd_k for backward-weights
        ctx.n_outputs = 48; // fwd_c
        let tuning = Wrw1x1Tuning {
            c_per_gpr: 4,
            c_mult: 4,
            k_per_gpr: 4,
            k_mult: 4,
            read_size: 1,
            n_per_gpr: 1,
        };
        assert!(solver.is_valid_tuning(&ctx, &tuning)); // 48 % 16 == 0

        ctx.n_outputs = 40;
        assert!(!solver.is_valid_tuning(&ctx, &tuning)); // 40 % 16 != 0
    }

    #[test]
    fn wrw_tunings_roundtrip_through_the_codec() {
        let tuning = Wrw3x3Tuning {
            limit_wave_cnt: 1,
            reverse_inout: 0,
            chunk_size: 16,
            k_per_wave: 4,
            pipe_lines_depth: 3,
            n_per_group: 2,
        };
        let text = serialize_values(&tuning);
        assert_eq!(text, "1,0,16,4,3,2");
        let mut read = Wrw3x3Tuning::default();
        assert!(deserialize_values(&mut read, &text));
        assert_eq!(read, tuning);
    }

    #[test]
    fn default_tunings_are_valid_for_their_problems() {
        for batch in [1, 4] {
            for channels in [1, 8, 48] {
                let mut ctx = wrw_ctx(3);
                ctx.batch = batch;
                ctx.n_inputs = channels;
                ctx.n_outputs = channels;
                let tuning = BwdWeights3x3.default_tuning(&ctx);
                assert!(
                    BwdWeights3x3.is_valid_tuning(&ctx, &tuning),
                    "3x3 default invalid for batch={batch} channels={channels}: {tuning}"
                );

                let mut ctx = wrw_ctx(1);
                ctx.batch = batch;
                ctx.n_inputs = channels;
                ctx.n_outputs = channels;
                let tuning = BwdWeights1x1.default_tuning(&ctx);
                assert!(
                    BwdWeights1x1.is_valid_tuning(&ctx, &tuning),
                    "1x1 default invalid for batch={batch} channels={channels}: {tuning}"
                );
            }
        }
    }

    #[test]
    fn applicability_splits_by_kernel_size() {
        let three = wrw_ctx(3);
        assert!(BwdWeights3x3.is_applicable(&three));
        assert!(!BwdWeights1x1.is_applicable(&three));
        assert!(!BwdWeightsFused1x1.is_applicable(&three));
        assert!(BwdWeightsLarge.is_applicable(&three));
        assert!(BwdWeightsTiled.is_applicable(&three));

        let one = wrw_ctx(1);
        assert!(!BwdWeights3x3.is_applicable(&one));
        assert!(BwdWeights1x1.is_applicable(&one));
        assert!(BwdWeightsFused1x1.is_applicable(&one));
        assert!(!BwdWeightsLarge.is_applicable(&one));
        assert!(BwdWeightsTiled.is_applicable(&one));

        let five = wrw_ctx(5);
        assert!(!BwdWeights3x3.is_applicable(&five));
        assert!(!BwdWeights1x1.is_applicable(&five));
        assert!(BwdWeightsLarge.is_applicable(&five));
        assert!(BwdWeightsTiled.is_applicable(&five));
    }

    #[test]
    fn pinned_db_id_survives_the_type_name() {
        assert_eq!(BwdWeightsFused1x1.db_id(), "BwdWeightsOcl1x1");
        assert_eq!(BwdWeightsTiled.db_id(), "BwdWeightsTiled");
    }

    #[test]
    fn tiled_fallback_reserves_reduction_workspace() {
        let mut ctx = wrw_ctx(3);
        ctx.batch = 4;
        ctx.infer_buffer_sizes();
        let solution = BwdWeightsTiled.solution(&ctx);
        assert!(solution.succeeded());
        assert_eq!(solution.construction_params.len(), 2);
        assert_eq!(solution.workspace_sz, ctx.weights_sz * 2);
        assert_eq!(solution.n_stacks, 2);
    }
}
