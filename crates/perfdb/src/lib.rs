//! Flat-file performance database for convplan.
//!
//! Tuned kernel parameters are persisted as one record per problem key in a
//! plain text file shared by every process on the machine. The store keeps
//! itself consistent under concurrent writers with an advisory lock file
//! next to the database.

pub mod db;
pub mod lockfile;
pub mod record;
pub mod serialize;

pub use db::*;
pub use lockfile::*;
pub use record::*;
pub use serialize::*;
