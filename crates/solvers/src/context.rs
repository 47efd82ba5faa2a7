//! Convolution problem descriptions.

use convplan_perfdb::{FieldVisitor, TuningFields};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    BackwardData,
    BackwardWeights,
}

impl Direction {
    pub fn is_forward(self) -> bool {
        self == Direction::Forward
    }

    pub fn is_backward_data(self) -> bool {
        self == Direction::BackwardData
    }

    pub fn is_backward_weights(self) -> bool {
        self == Direction::BackwardWeights
    }

    fn as_wire(self) -> i32 {
        match self {
            Direction::Forward => 0,
            Direction::BackwardData => 1,
            Direction::BackwardWeights => 2,
        }
    }
}

/// One convolution problem plus the selection inputs that travel with it.
///
/// Tensor sizes are in elements of the NCHW layout; `*_sz` fields are the
/// measurement buffer sizes in bytes, as reported by the caller's tensor
/// descriptors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemContext {
    pub direction: Direction,
    pub batch: i32,
    pub n_inputs: i32,
    pub n_outputs: i32,
    pub in_height: i32,
    pub in_width: i32,
    /// Kernel extent; index 0 is width, 1 is height.
    pub kernel_size0: i32,
    pub kernel_size1: i32,
    pub kernel_stride0: i32,
    pub kernel_stride1: i32,
    pub pad0: i32,
    pub pad1: i32,
    pub bias: bool,
    /// Caller asked for exhaustive tuning.
    pub do_search: bool,
    pub bot_sz: usize,
    pub top_sz: usize,
    pub weights_sz: usize,
    pub bias_sz: usize,
}

impl ProblemContext {
    /// A small stride-1 3x3 problem; callers adjust fields from here.
    pub fn new(direction: Direction) -> Self {
        let mut ctx = Self {
            direction,
            batch: 1,
            n_inputs: 32,
            n_outputs: 32,
            in_height: 16,
            in_width: 16,
            kernel_size0: 3,
            kernel_size1: 3,
            kernel_stride0: 1,
            kernel_stride1: 1,
            pad0: 1,
            pad1: 1,
            bias: false,
            do_search: false,
            bot_sz: 0,
            top_sz: 0,
            weights_sz: 0,
            bias_sz: 0,
        };
        ctx.infer_buffer_sizes();
        ctx
    }

    /// Recomputes the measurement buffer sizes from the shape fields,
    /// assuming f32 data and same-size output.
    pub fn infer_buffer_sizes(&mut self) {
        let elem = std::mem::size_of::<f32>();
        let plane = (self.in_height * self.in_width) as usize;
        self.bot_sz = self.batch as usize * self.n_inputs as usize * plane * elem;
        self.top_sz = self.batch as usize * self.n_outputs as usize * plane * elem;
        self.weights_sz = self.n_inputs as usize
            * self.n_outputs as usize
            * (self.kernel_size0 * self.kernel_size1) as usize
            * elem;
        self.bias_sz = self.n_outputs as usize * elem;
    }

    /// Input channel count in the forward orientation. Backward-weights
    /// problems see the tensors swapped, so this is `n_outputs` there.
    pub fn fwd_c(&self) -> i32 {
        match self.direction {
            Direction::Forward => self.n_inputs,
            _ => self.n_outputs,
        }
    }

    /// Output channel count in the forward orientation.
    pub fn fwd_k(&self) -> i32 {
        match self.direction {
            Direction::Forward => self.n_outputs,
            _ => self.n_inputs,
        }
    }

    /// Canonical database key for this problem. Contexts with equal keys
    /// are interchangeable as far as persisted tunings are concerned.
    pub fn key(&self) -> ProblemKey {
        ProblemKey {
            direction: self.direction.as_wire(),
            batch: self.batch,
            n_inputs: self.n_inputs,
            n_outputs: self.n_outputs,
            in_height: self.in_height,
            in_width: self.in_width,
            kernel_size0: self.kernel_size0,
            kernel_size1: self.kernel_size1,
            kernel_stride0: self.kernel_stride0,
            kernel_stride1: self.kernel_stride1,
            pad0: self.pad0,
            pad1: self.pad1,
            bias: self.bias,
        }
    }
}

/// The serialized problem signature rows in the database are keyed by.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProblemKey {
    direction: i32,
    batch: i32,
    n_inputs: i32,
    n_outputs: i32,
    in_height: i32,
    in_width: i32,
    kernel_size0: i32,
    kernel_size1: i32,
    kernel_stride0: i32,
    kernel_stride1: i32,
    pad0: i32,
    pad1: i32,
    bias: bool,
}

impl TuningFields for ProblemKey {
    fn visit(&mut self, visitor: &mut dyn FieldVisitor) {
        visitor.field(&mut self.direction, "direction");
        visitor.field(&mut self.batch, "batch");
        visitor.field(&mut self.n_inputs, "n_inputs");
        visitor.field(&mut self.n_outputs, "n_outputs");
        visitor.field(&mut self.in_height, "in_height");
        visitor.field(&mut self.in_width, "in_width");
        visitor.field(&mut self.kernel_size0, "kernel_size0");
        visitor.field(&mut self.kernel_size1, "kernel_size1");
        visitor.field(&mut self.kernel_stride0, "kernel_stride0");
        visitor.field(&mut self.kernel_stride1, "kernel_stride1");
        visitor.field(&mut self.pad0, "pad0");
        visitor.field(&mut self.pad1, "pad1");
        visitor.field(&mut self.bias, "bias");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convplan_perfdb::serialize_values;

    #[test]
    fn equal_shapes_share_a_key() {
        let a = ProblemContext::new(Direction::BackwardWeights);
        let mut b = ProblemContext::new(Direction::BackwardWeights);
        b.do_search = true;
        b.bot_sz = 0;
        assert_eq!(a.key(), b.key());

        b.in_width = 17;
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn forward_channels_swap_for_backward_weights() {
        let mut ctx = ProblemContext::new(Direction::BackwardWeights);
        ctx.n_inputs = 8;
        ctx.n_outputs = 64;
        assert_eq!(ctx.fwd_c(), 64);
        assert_eq!(ctx.fwd_k(), 8);
    }

    #[test]
    fn key_encodes_without_structural_delimiters() {
        let key = ProblemContext::new(Direction::Forward).key();
        let text = serialize_values(&key);
        assert!(!text.contains([';', '=', ':']));
    }
}
