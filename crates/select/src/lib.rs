//! Solver selection for convplan.
//!
//! [`find`] resolves one solver's solution, consulting the performance
//! database or running a search; [`selection`] picks across a catalog,
//! either first-hit or by timing every candidate on the device.

pub mod enforce;
pub mod env;
pub mod find;
pub mod selection;

pub use enforce::*;
pub use find::*;
pub use selection::*;
