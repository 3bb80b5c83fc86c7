//! One-way mirroring of a source tree onto a replica tree.
//!
//! A pass first creates every missing replica directory top-down, then walks
//! the tree pair again deleting extras and copying or updating files. Both
//! walks use an explicit work-list, so stack usage does not depend on the
//! depth of the tree.

mod directory_listing;
mod operations;
mod sync_error;
mod synchronizer;
mod tree_path_pair;

pub use sync_error::SyncError;
pub use synchronizer::{PassReport, Synchronizer};
