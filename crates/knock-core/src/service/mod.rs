//! Service layer: wires the tracker to the firewall and the expiry
//! scheduler behind the [`KnockGateApi`](crate::ports::KnockGateApi)
//! port.

pub mod core;
pub mod expiry;
pub mod maintenance;

pub use self::core::KnockGateService;
pub use expiry::{ExpiryScheduler, RevokeRetryPolicy, ShutdownPolicy};
