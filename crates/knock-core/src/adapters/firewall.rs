//! In-process firewall adapters.
//!
//! `InMemoryFirewall` substitutes for the real packet filter in tests
//! and development, so the core's logic is exercised without privileged
//! operations. `NoOpFirewall` is for wiring experiments where rule
//! state does not matter.

use std::collections::HashSet;
use std::net::IpAddr;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::ports::{FirewallError, FirewallGate};

/// Fake rule table: a set of allowed source addresses.
///
/// Idempotent like the real thing, and can be armed to fail on demand
/// so grant/revoke failure paths are testable.
#[derive(Debug, Default)]
pub struct InMemoryFirewall {
    allowed: Mutex<HashSet<IpAddr>>,
    fail_grants: Mutex<bool>,
    fail_revokes: Mutex<u32>,
}

impl InMemoryFirewall {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `source` currently has an allow rule.
    pub fn is_allowed(&self, source: IpAddr) -> bool {
        self.allowed.lock().contains(&source)
    }

    /// Number of active allow rules.
    pub fn rule_count(&self) -> usize {
        self.allowed.lock().len()
    }

    /// Make every subsequent grant fail until disarmed.
    pub fn fail_grants(&self, fail: bool) {
        *self.fail_grants.lock() = fail;
    }

    /// Make the next `count` revokes fail.
    pub fn fail_next_revokes(&self, count: u32) {
        *self.fail_revokes.lock() = count;
    }
}

#[async_trait]
impl FirewallGate for InMemoryFirewall {
    async fn grant(&self, source: IpAddr) -> Result<(), FirewallError> {
        if *self.fail_grants.lock() {
            return Err(FirewallError::CommandFailed("injected grant failure".into()));
        }
        // Insert on an existing member is the idempotent no-op.
        self.allowed.lock().insert(source);
        Ok(())
    }

    async fn revoke(&self, source: IpAddr) -> Result<(), FirewallError> {
        {
            let mut remaining = self.fail_revokes.lock();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(FirewallError::CommandFailed(
                    "injected revoke failure".into(),
                ));
            }
        }
        self.allowed.lock().remove(&source);
        Ok(())
    }
}

/// Firewall that accepts everything and records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpFirewall;

#[async_trait]
impl FirewallGate for NoOpFirewall {
    async fn grant(&self, _source: IpAddr) -> Result<(), FirewallError> {
        Ok(())
    }

    async fn revoke(&self, _source: IpAddr) -> Result<(), FirewallError> {
        Ok(())
    }
}
