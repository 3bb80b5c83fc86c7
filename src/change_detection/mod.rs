//! Decides whether a replica file has to be overwritten from its source.
//!
//! A replica is stale when its content digest differs from the source's, or
//! when the source was modified strictly later than the replica.

mod change_detector;
mod file_digest;

pub use change_detector::is_stale;
pub use file_digest::FileAccessError;
