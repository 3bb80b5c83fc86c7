mod async_conversion;
mod best_effort_path_ext;
mod system_time_ext;

pub use async_conversion::{AsyncTryFrom, AsyncTryInto};
pub use best_effort_path_ext::BestEffortPathExt;
pub use system_time_ext::SystemTimeExt;
