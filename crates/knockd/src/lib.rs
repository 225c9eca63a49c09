//! # Knockd
//!
//! Daemon wiring for the knockgate port-knocking gateway:
//!
//! - `config` - TOML file + environment configuration, validated at
//!   startup (fatal on error)
//! - `listener` - decoy-port TCP acceptors / UDP receivers feeding the
//!   core service
//! - `runtime` - dependency wiring, maintenance loop, shutdown handling
//!
//! The core protocol lives in `knock-core`; nothing in this crate makes
//! authorization decisions.

pub mod config;
pub mod listener;
pub mod runtime;

pub use config::{FirewallBackend, KnockdConfig, Transport};
pub use listener::KnockListener;
pub use runtime::KnockdRuntime;
