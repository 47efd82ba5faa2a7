//! convplan: the kernel-selection core of a GPU convolution library.
//!
//! Given a problem description, the selection pipeline walks a fixed
//! catalog of kernel templates, resolves each searchable one's tuning from
//! the performance database (or by exhaustive on-device search), and
//! returns a fully parameterized build plan.

pub use convplan_perfdb as perfdb;
pub use convplan_select as select;
pub use convplan_solvers as solvers;
