//! Domain layer: pure knock-sequence logic with no I/O.
//!
//! Everything here is synchronous and testable without a runtime. The
//! only shared-state structure is the tracker's concurrent source table.

pub mod errors;
pub mod sequence;
pub mod tracker;
pub mod value_objects;

pub use errors::{ConfigError, GateError};
pub use sequence::SequenceSpec;
pub use tracker::KnockTracker;
pub use value_objects::{
    AuthorizationGrant, Decision, KnockEvent, SourceReport, Timestamp, TrackerStats,
};
