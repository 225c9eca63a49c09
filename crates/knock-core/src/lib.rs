//! # Port-Knock Gateway Core
//!
//! Gates access to a concealed service behind a covert knock protocol:
//! only a source address that hits the configured decoy ports in order,
//! within the configured window, is granted a temporary firewall hole to
//! the protected port. The grant is revoked automatically when the open
//! duration elapses.
//!
//! ## Domain Invariants
//!
//! | ID | Invariant | Enforcement Location |
//! |----|-----------|---------------------|
//! | INVARIANT-1 | At most one active grant per address | `service/core.rs` - re-grant replaces the pending timer |
//! | INVARIANT-2 | Progress advances only on the expected port | `domain/tracker.rs` - `observe()` |
//! | INVARIANT-3 | Attempts restart once the window elapses | `domain/tracker.rs` - window check before advancing |
//! | INVARIANT-4 | Grant and bookkeeping commit together | `service/core.rs` - tracker committed only after `grant()` succeeds |
//! | INVARIANT-5 | Fired or cancelled timers are removed | `service/expiry.rs` - pending table cleanup |
//! | INVARIANT-6 | All window/expiry math uses monotonic time | `ports/outbound.rs` - `MonotonicTimeSource` |
//!
//! ## Control Flow
//!
//! ```text
//! listener ──KnockEvent──→ KnockTracker.observe()
//!                               │
//!                       Authorized decision
//!                               │
//!                    FirewallGate.grant(addr)
//!                               │ ok
//!                    ExpiryScheduler.schedule(addr, open_for)
//!                               │ timer fires
//!                    FirewallGate.revoke(addr)
//! ```
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      OUTER LAYER                                │
//! │  adapters/ - In-memory and iptables firewall implementations    │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      MIDDLE LAYER                               │
//! │  ports/inbound.rs  - KnockGateApi trait                         │
//! │  ports/outbound.rs - FirewallGate, TimeSource, EventSink        │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      INNER LAYER                                │
//! │  domain/sequence.rs      - SequenceSpec (validated config)      │
//! │  domain/tracker.rs       - KnockTracker per-source state table  │
//! │  domain/value_objects.rs - KnockEvent, Decision, SourceReport   │
//! │  domain/errors.rs        - GateError, ConfigError               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The knock source address is taken at face value; spoofed knocks can
//! authorize addresses the real client does not control. This is an
//! inherent limit of the mechanism: treat it as a deterrent layer, not
//! a sole access control.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;
pub mod testing;

pub use adapters::{InMemoryFirewall, IptablesFirewall, NoOpFirewall};
pub use domain::*;
pub use ports::{
    EventSink, FirewallError, FirewallGate, GateEvent, KnockGateApi, MonotonicTimeSource,
    TimeSource, TracingEventSink,
};
pub use service::{ExpiryScheduler, KnockGateService, RevokeRetryPolicy, ShutdownPolicy};
