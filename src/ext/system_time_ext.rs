use std::time::SystemTime;

use chrono::{DateTime, Utc};

/// Bridges filesystem timestamps into `chrono` so modification times can be
/// compared and displayed in UTC.
pub trait SystemTimeExt {
    fn to_utc(&self) -> DateTime<Utc>;
}

impl SystemTimeExt for SystemTime {
    fn to_utc(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from(*self)
    }
}
