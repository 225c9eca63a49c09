//! Outbound (driven) ports for the gateway core.
//!
//! These traits define the external systems the gateway drives: the
//! firewall rule table, the clock, and the observability event sink.

use std::net::IpAddr;
use std::time::Instant;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Decision, Timestamp};

/// Firewall rule application errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FirewallError {
    /// The underlying firewall command reported failure.
    #[error("firewall command failed: {0}")]
    CommandFailed(String),

    /// The underlying firewall command did not complete in time.
    #[error("firewall command timed out after {0} ms")]
    Timeout(u64),
}

/// Rule table keyed by source address, gating the protected port.
///
/// Both operations are idempotent: granting an already-granted address
/// or revoking an address with no active rule succeeds as a no-op. A
/// grant takes effect before the call returns, so a client connecting
/// immediately after authorization gets through.
#[async_trait]
pub trait FirewallGate: Send + Sync {
    /// Allow `source` to reach the protected port.
    async fn grant(&self, source: IpAddr) -> Result<(), FirewallError>;

    /// Remove the allow rule for `source`, if present.
    async fn revoke(&self, source: IpAddr) -> Result<(), FirewallError>;
}

/// Monotonic time source.
///
/// Abstracted so tests drive time deterministically, and so window and
/// expiry comparisons never touch adjustable wall-clock time.
pub trait TimeSource: Send + Sync {
    /// Milliseconds since an arbitrary fixed origin.
    fn now(&self) -> Timestamp;
}

/// Production time source anchored to a process-local [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicTimeSource {
    origin: Instant,
}

impl MonotonicTimeSource {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicTimeSource {
    fn now(&self) -> Timestamp {
        self.origin.elapsed().as_millis() as Timestamp
    }
}

/// Observability events emitted by the gateway.
///
/// A deception or audit layer consumes these; nothing flows back into
/// the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateEvent {
    /// A knock was observed and fed through the tracker.
    KnockObserved {
        source: IpAddr,
        port: u16,
        decision: Decision,
    },
    /// A firewall grant was applied.
    AccessGranted { source: IpAddr, until: Timestamp },
    /// A grant's firewall rule could not be applied.
    GrantFailed { source: IpAddr },
    /// A grant was revoked (expiry or shutdown).
    AccessRevoked { source: IpAddr },
    /// A revoke failed after exhausting its retry budget; the allow
    /// rule may still be in place.
    RevokeFailed { source: IpAddr, attempts: u32 },
}

/// Sink for [`GateEvent`]s.
pub trait EventSink: Send + Sync {
    fn observe(&self, event: GateEvent);
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn observe(&self, _event: GateEvent) {}
}

/// Sink that forwards events to `tracing` at severity matching the
/// operational weight of each event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn observe(&self, event: GateEvent) {
        match event {
            GateEvent::KnockObserved {
                source,
                port,
                decision,
            } => match decision {
                Decision::Progressing => {
                    tracing::debug!(%source, port, "knock ok");
                }
                Decision::Reset => {
                    tracing::debug!(%source, port, "knock out of order, source reset");
                }
                Decision::Authorized => {
                    tracing::info!(%source, port, "knock sequence complete");
                }
            },
            GateEvent::AccessGranted { source, until } => {
                tracing::info!(%source, until, "protected port opened");
            }
            GateEvent::GrantFailed { source } => {
                tracing::warn!(%source, "firewall grant failed, source left unauthorized");
            }
            GateEvent::AccessRevoked { source } => {
                tracing::info!(%source, "protected port closed");
            }
            GateEvent::RevokeFailed { source, attempts } => {
                tracing::error!(
                    %source,
                    attempts,
                    "firewall revoke failed after retries, allow rule may linger"
                );
            }
        }
    }
}
