//! Knock sequence specification.

use std::collections::HashSet;
use std::time::Duration;

use super::errors::ConfigError;

/// Immutable knock-protocol parameters, validated at construction and
/// fixed for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceSpec {
    ports: Vec<u16>,
    window: Duration,
    open_for: Duration,
}

impl SequenceSpec {
    /// Build a validated spec.
    ///
    /// # Errors
    ///
    /// - fewer than two knock ports, a zero port, or a duplicate port
    /// - zero window or zero open duration
    pub fn new(ports: Vec<u16>, window: Duration, open_for: Duration) -> Result<Self, ConfigError> {
        if ports.len() < 2 {
            return Err(ConfigError::SequenceTooShort { len: ports.len() });
        }
        let mut seen = HashSet::with_capacity(ports.len());
        for &port in &ports {
            if port == 0 {
                return Err(ConfigError::InvalidKnockPort);
            }
            if !seen.insert(port) {
                return Err(ConfigError::DuplicateKnockPort { port });
            }
        }
        if window.is_zero() {
            return Err(ConfigError::ZeroWindow);
        }
        if open_for.is_zero() {
            return Err(ConfigError::ZeroOpenDuration);
        }
        Ok(Self {
            ports,
            window,
            open_for,
        })
    }

    /// The ordered knock ports.
    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    /// Number of knocks in a full sequence.
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    /// Always false: construction rejects empty sequences.
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// The port expected at `index` (0-based).
    pub fn port_at(&self, index: usize) -> Option<u16> {
        self.ports.get(index).copied()
    }

    /// The first port of the sequence.
    pub fn first_port(&self) -> u16 {
        self.ports[0]
    }

    /// Whether `port` is one of the decoy ports.
    pub fn contains(&self, port: u16) -> bool {
        self.ports.contains(&port)
    }

    /// Maximum elapsed time between the first and last knock of one attempt.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// `window` in monotonic-timestamp units.
    pub fn window_ms(&self) -> u64 {
        self.window.as_millis() as u64
    }

    /// How long a successful source stays authorized.
    pub fn open_for(&self) -> Duration {
        self.open_for
    }

    /// `open_for` in monotonic-timestamp units.
    pub fn open_for_ms(&self) -> u64 {
        self.open_for.as_millis() as u64
    }
}
