//! # Daemon Configuration
//!
//! Layered: built-in defaults, then an optional TOML file, then
//! environment variable overrides. Validated once at startup; any
//! problem is fatal before a single port is bound.
//!
//! Defaults mirror the canonical deployment: knock sequence
//! 1234 → 5678 → 9012 guarding port 2222, a 10 second window, and a
//! 30 second open duration.

use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use knock_core::{ConfigError, SequenceSpec, ShutdownPolicy};

/// Environment variable names recognized as overrides.
const ENV_SEQUENCE: &str = "KNOCKD_SEQUENCE";
const ENV_PROTECTED_PORT: &str = "KNOCKD_PROTECTED_PORT";
const ENV_WINDOW_SECS: &str = "KNOCKD_WINDOW_SECS";
const ENV_OPEN_SECS: &str = "KNOCKD_OPEN_SECS";
const ENV_BIND: &str = "KNOCKD_BIND";
const ENV_TRANSPORT: &str = "KNOCKD_TRANSPORT";
const ENV_FIREWALL: &str = "KNOCKD_FIREWALL";
const ENV_SHUTDOWN_POLICY: &str = "KNOCKD_SHUTDOWN_POLICY";

/// Configuration loading errors. All fatal at startup.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

/// Transport the decoy ports listen on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    /// Accept-and-close TCP listeners; any completed connect is a knock.
    #[default]
    Tcp,
    /// UDP receivers; any datagram is a knock, payload ignored.
    Udp,
}

impl FromStr for Transport {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            _ => Err(()),
        }
    }
}

/// Which firewall adapter backs the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FirewallBackend {
    /// Real iptables rules (requires privileges).
    #[default]
    Iptables,
    /// In-memory rule table, for development and tests.
    Memory,
}

impl FromStr for FirewallBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s.to_ascii_lowercase().as_str() {
            "iptables" => Ok(Self::Iptables),
            "memory" => Ok(Self::Memory),
            _ => Err(()),
        }
    }
}

fn shutdown_policy_from_str(s: &str) -> Option<ShutdownPolicy> {
    match s.to_ascii_lowercase().as_str() {
        "revoke-all" => Some(ShutdownPolicy::RevokeAll),
        "leave-open" => Some(ShutdownPolicy::LeaveOpen),
        _ => None,
    }
}

/// Complete daemon configuration.
#[derive(Debug, Clone)]
pub struct KnockdConfig {
    /// Port of the concealed service.
    pub protected_port: u16,
    /// Ordered decoy ports.
    pub sequence: Vec<u16>,
    /// Seconds allowed between the first and last knock of one attempt.
    pub window_secs: u64,
    /// Seconds a successful source stays authorized.
    pub open_secs: u64,
    /// Address the decoy listeners bind to.
    pub bind_address: IpAddr,
    /// Knock transport.
    pub transport: Transport,
    /// Firewall adapter.
    pub firewall: FirewallBackend,
    /// Seconds of silence before idle source state is evicted.
    pub idle_grace_secs: u64,
    /// Seconds between garbage-collection passes.
    pub gc_interval_secs: u64,
    /// What to do with active grants at shutdown.
    pub shutdown_policy: ShutdownPolicy,
}

impl Default for KnockdConfig {
    fn default() -> Self {
        Self {
            protected_port: 2222,
            sequence: vec![1234, 5678, 9012],
            window_secs: 10,
            open_secs: 30,
            bind_address: IpAddr::from([0, 0, 0, 0]),
            transport: Transport::Tcp,
            firewall: FirewallBackend::Iptables,
            idle_grace_secs: 60,
            gc_interval_secs: 30,
            shutdown_policy: ShutdownPolicy::RevokeAll,
        }
    }
}

/// TOML file shape: every field optional, defaults fill the gaps.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    protected_port: Option<u16>,
    sequence: Option<Vec<u16>>,
    window_secs: Option<u64>,
    open_secs: Option<u64>,
    bind_address: Option<String>,
    transport: Option<String>,
    firewall: Option<String>,
    idle_grace_secs: Option<u64>,
    gc_interval_secs: Option<u64>,
    shutdown_policy: Option<String>,
}

impl KnockdConfig {
    /// Load configuration: defaults, then the TOML file (if given),
    /// then environment overrides, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self, LoadError> {
        let mut config = Self::default();
        if let Some(path) = path {
            config.apply_file(path)?;
        }
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, path: &Path) -> Result<(), LoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file: ConfigFile = toml::from_str(&text).map_err(|source| LoadError::Parse {
            path: path.display().to_string(),
            source,
        })?;

        if let Some(port) = file.protected_port {
            self.protected_port = port;
        }
        if let Some(sequence) = file.sequence {
            self.sequence = sequence;
        }
        if let Some(secs) = file.window_secs {
            self.window_secs = secs;
        }
        if let Some(secs) = file.open_secs {
            self.open_secs = secs;
        }
        if let Some(addr) = file.bind_address {
            self.bind_address = parse_value("bind_address", &addr)?;
        }
        if let Some(transport) = file.transport {
            self.transport = parse_enum("transport", &transport)?;
        }
        if let Some(firewall) = file.firewall {
            self.firewall = parse_enum("firewall", &firewall)?;
        }
        if let Some(secs) = file.idle_grace_secs {
            self.idle_grace_secs = secs;
        }
        if let Some(secs) = file.gc_interval_secs {
            self.gc_interval_secs = secs;
        }
        if let Some(policy) = file.shutdown_policy {
            self.shutdown_policy =
                shutdown_policy_from_str(&policy).ok_or_else(|| LoadError::InvalidValue {
                    key: "shutdown_policy".into(),
                    value: policy,
                })?;
        }
        Ok(())
    }

    fn apply_env(&mut self) -> Result<(), LoadError> {
        if let Ok(raw) = std::env::var(ENV_SEQUENCE) {
            self.sequence = raw
                .split(',')
                .map(|part| part.trim().parse::<u16>())
                .collect::<Result<_, _>>()
                .map_err(|_| LoadError::InvalidValue {
                    key: ENV_SEQUENCE.into(),
                    value: raw.clone(),
                })?;
        }
        if let Ok(raw) = std::env::var(ENV_PROTECTED_PORT) {
            self.protected_port = parse_value(ENV_PROTECTED_PORT, &raw)?;
        }
        if let Ok(raw) = std::env::var(ENV_WINDOW_SECS) {
            self.window_secs = parse_value(ENV_WINDOW_SECS, &raw)?;
        }
        if let Ok(raw) = std::env::var(ENV_OPEN_SECS) {
            self.open_secs = parse_value(ENV_OPEN_SECS, &raw)?;
        }
        if let Ok(raw) = std::env::var(ENV_BIND) {
            self.bind_address = parse_value(ENV_BIND, &raw)?;
        }
        if let Ok(raw) = std::env::var(ENV_TRANSPORT) {
            self.transport = parse_enum(ENV_TRANSPORT, &raw)?;
        }
        if let Ok(raw) = std::env::var(ENV_FIREWALL) {
            self.firewall = parse_enum(ENV_FIREWALL, &raw)?;
        }
        if let Ok(raw) = std::env::var(ENV_SHUTDOWN_POLICY) {
            self.shutdown_policy =
                shutdown_policy_from_str(&raw).ok_or_else(|| LoadError::InvalidValue {
                    key: ENV_SHUTDOWN_POLICY.into(),
                    value: raw,
                })?;
        }
        Ok(())
    }

    /// Validate and reject everything `SequenceSpec` rejects, plus a
    /// protected port doubling as a decoy.
    pub fn validate(&self) -> Result<(), LoadError> {
        let spec = self.sequence_spec()?;
        if spec.contains(self.protected_port) {
            return Err(ConfigError::ProtectedPortInSequence {
                port: self.protected_port,
            }
            .into());
        }
        Ok(())
    }

    /// The validated protocol parameters.
    pub fn sequence_spec(&self) -> Result<SequenceSpec, ConfigError> {
        SequenceSpec::new(
            self.sequence.clone(),
            Duration::from_secs(self.window_secs),
            Duration::from_secs(self.open_secs),
        )
    }

    pub fn idle_grace(&self) -> Duration {
        Duration::from_secs(self.idle_grace_secs)
    }

    pub fn gc_interval(&self) -> Duration {
        Duration::from_secs(self.gc_interval_secs)
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, LoadError> {
    raw.parse().map_err(|_| LoadError::InvalidValue {
        key: key.into(),
        value: raw.into(),
    })
}

fn parse_enum<T: FromStr<Err = ()>>(key: &str, raw: &str) -> Result<T, LoadError> {
    raw.parse().map_err(|()| LoadError::InvalidValue {
        key: key.into(),
        value: raw.into(),
    })
}
