//! Inbound (driving) port for the gateway core.

use std::net::IpAddr;

use async_trait::async_trait;

use crate::domain::{Decision, GateError, SourceReport, TrackerStats};

/// Primary API of the knock gateway.
///
/// The listener drives this with one call per observed knock; operators
/// read diagnostics through it; the runtime shuts it down through it.
#[async_trait]
pub trait KnockGateApi: Send + Sync {
    /// Process one knock from `source` on decoy port `port`.
    ///
    /// Advances or resets the source's progress and, on a completed
    /// sequence, applies the firewall grant and arms the expiry timer
    /// before returning.
    ///
    /// # Errors
    ///
    /// [`GateError::GrantFailed`] if the sequence completed but the
    /// firewall rule could not be applied. The source is left
    /// unauthorized; re-knocking retries the grant.
    async fn handle_knock(&self, source: IpAddr, port: u16) -> Result<Decision, GateError>;

    /// Per-source diagnostic snapshot (read-only, for monitoring).
    fn diagnostics(&self) -> Vec<SourceReport>;

    /// Aggregate tracker counters.
    fn stats(&self) -> TrackerStats;

    /// Cancel all pending expiry timers and apply the configured
    /// shutdown policy to active grants.
    async fn shutdown(&self) -> Result<(), GateError>;
}
