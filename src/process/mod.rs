//! Background process tracking.

pub mod introspect;
pub mod record;
pub mod registry;

pub use introspect::{NullIntrospector, ProcessIntrospector, ProcessStats, SystemIntrospector};
pub use record::{generate_id, ProcessKind, ProcessRecord, ProcessView};
pub use registry::{ProcessRegistry, StopOutcome, StopSummary, StopTimeouts};
