mod id;
mod introspection;

pub use id::*;
pub use introspection::*;

use chrono::{DateTime, Utc};

/// The current wall-clock time. Song timestamps and labels only need wall-clock precision.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}
