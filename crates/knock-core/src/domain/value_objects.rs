//! Value objects shared across the gateway core.

use std::net::IpAddr;

/// Monotonic timestamp in milliseconds.
///
/// Produced by a [`TimeSource`](crate::ports::TimeSource); never derived
/// from wall-clock time, so window and expiry comparisons are immune to
/// clock adjustment.
pub type Timestamp = u64;

/// A single observed knock: one inbound packet or connection attempt on
/// one of the decoy ports.
///
/// Only the source address, the destination port, and the arrival time
/// participate in the protocol. Payload is never inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnockEvent {
    /// Address the knock came from (taken at face value).
    pub source: IpAddr,
    /// Decoy port the knock targeted.
    pub port: u16,
    /// Monotonic arrival time.
    pub observed_at: Timestamp,
}

/// Outcome of feeding one knock to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The knock matched the next expected port; the attempt continues.
    Progressing,
    /// The knock was out of order or stale; the source restarts at zero.
    Reset,
    /// The knock completed the full sequence within the window.
    Authorized,
}

/// A granted authorization: the source may reach the protected port
/// until `expires_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorizationGrant {
    pub source: IpAddr,
    pub granted_at: Timestamp,
    pub expires_at: Timestamp,
}

impl AuthorizationGrant {
    /// Whether the grant is still live at `now`.
    pub fn is_active(&self, now: Timestamp) -> bool {
        now < self.expires_at
    }
}

/// Read-only diagnostic view of one tracked source.
///
/// Consumed by external logging/monitoring only; never fed back into
/// the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceReport {
    pub source: IpAddr,
    /// How many knocks of the sequence have matched so far.
    pub progress: usize,
    /// Milliseconds left in the current attempt's window, if an attempt
    /// is underway.
    pub window_remaining_ms: Option<u64>,
    /// When the active grant expires, if the source is authorized.
    pub authorized_until: Option<Timestamp>,
}

/// Aggregate counters for monitoring the tracker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerStats {
    pub tracked_sources: usize,
    pub authorized_sources: usize,
}
