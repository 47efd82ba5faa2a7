//! Kernel build plans produced by solvers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Everything required to build and launch one kernel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KernelInfo {
    pub compile_options: String,
    pub local_work_size: Vec<usize>,
    pub global_work_size: Vec<usize>,
    pub source_path: String,
    pub entry_name: String,
}

impl fmt::Display for KernelInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} local={:?} global={:?} opts={:?}",
            self.source_path, self.entry_name, self.local_work_size, self.global_work_size,
            self.compile_options
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolutionStatus {
    Success,
    UnknownError,
    InternalError,
}

/// A fully parameterized plan for one problem.
///
/// `construction_params` is ordered; the first kernel is the entry point.
/// Tile fields default to -1, meaning unused. A succeeded solution always
/// carries at least one kernel; an empty list under `Success` is a bug in
/// the producing solver.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvSolution {
    pub construction_params: Vec<KernelInfo>,
    pub status: SolutionStatus,
    pub workspace_sz: usize,
    pub grp_tile1: i32,
    pub grp_tile0: i32,
    pub in_tile1: i32,
    pub in_tile0: i32,
    pub out_pix_tile1: i32,
    pub out_pix_tile0: i32,
    pub n_out_pix_tiles: i32,
    pub n_in_data_tiles: i32,
    pub n_stacks: i32,
}

impl ConvSolution {
    pub fn new() -> Self {
        Self::with_status(SolutionStatus::Success)
    }

    pub fn with_status(status: SolutionStatus) -> Self {
        Self {
            construction_params: Vec::new(),
            status,
            workspace_sz: 0,
            grp_tile1: -1,
            grp_tile0: -1,
            in_tile1: -1,
            in_tile0: -1,
            out_pix_tile1: -1,
            out_pix_tile0: -1,
            n_out_pix_tiles: -1,
            n_in_data_tiles: -1,
            n_stacks: -1,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == SolutionStatus::Success
    }
}

impl Default for ConvSolution {
    fn default() -> Self {
        Self::new()
    }
}
