//! Gateway error types.

use std::net::IpAddr;
use thiserror::Error;

/// Configuration validation errors. All of these are fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The knock sequence needs at least two ports to be a sequence.
    #[error("knock sequence too short: {len} ports (minimum 2)")]
    SequenceTooShort { len: usize },

    /// A port appears more than once in the sequence.
    #[error("duplicate knock port {port} in sequence")]
    DuplicateKnockPort { port: u16 },

    /// Port 0 is not addressable.
    #[error("knock port 0 is not a valid port")]
    InvalidKnockPort,

    /// The protected port cannot double as a decoy.
    #[error("protected port {port} appears in the knock sequence")]
    ProtectedPortInSequence { port: u16 },

    /// The sequence window must be positive.
    #[error("sequence window must be greater than zero")]
    ZeroWindow,

    /// The open duration must be positive.
    #[error("open duration must be greater than zero")]
    ZeroOpenDuration,
}

/// Errors surfaced by the gateway service.
///
/// Partial sequences and out-of-order knocks are state transitions, not
/// errors; they never appear here.
#[derive(Debug, Error)]
pub enum GateError {
    /// Startup configuration was invalid.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(#[from] ConfigError),

    /// A firewall rule could not be applied for a grant. The address was
    /// NOT marked authorized; the client can simply re-knock.
    #[error("firewall grant for {address} failed: {reason}")]
    GrantFailed { address: IpAddr, reason: String },

    /// A firewall rule could not be removed after the retry budget was
    /// exhausted. This leaves an open, unintended access window and is
    /// escalated rather than dropped.
    #[error("firewall revoke for {address} failed after {attempts} attempts: {reason}")]
    RevokeFailed {
        address: IpAddr,
        attempts: u32,
        reason: String,
    },
}
