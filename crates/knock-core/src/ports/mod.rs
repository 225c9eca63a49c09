//! Ports (hexagonal architecture boundaries).
//!
//! - `inbound`: the API the outside world drives the gateway through.
//! - `outbound`: dependencies the gateway drives (firewall, clock,
//!   event sink).

pub mod inbound;
pub mod outbound;

pub use inbound::KnockGateApi;
pub use outbound::{
    EventSink, FirewallError, FirewallGate, GateEvent, MonotonicTimeSource, NoOpEventSink,
    TimeSource, TracingEventSink,
};
