//! Adapters implementing the outbound ports.

pub mod firewall;
pub mod iptables;

pub use firewall::{InMemoryFirewall, NoOpFirewall};
pub use iptables::IptablesFirewall;
