//! iptables firewall adapter.
//!
//! Maps [`FirewallGate`] onto the host packet filter by shelling out to
//! `iptables`. Idempotency follows the check-before-insert pattern:
//!
//! - grant:  `iptables -C ... -j ACCEPT` then `-I INPUT 1 ...` only if
//!   the rule is absent
//! - revoke: `iptables -D ... -j ACCEPT`; a failed delete for a missing
//!   rule is treated as already-revoked
//!
//! Every command runs with a bounded timeout so a wedged firewall
//! backend cannot stall the dispatch path.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::ports::{FirewallError, FirewallGate};

/// Default per-command timeout.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

/// `FirewallGate` backed by iptables INPUT rules for one protected port.
#[derive(Debug, Clone)]
pub struct IptablesFirewall {
    protected_port: u16,
    command_timeout: Duration,
}

impl IptablesFirewall {
    /// Create an adapter managing allow rules for `protected_port`.
    pub fn new(protected_port: u16) -> Self {
        Self {
            protected_port,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Override the per-command timeout.
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// The port whose access this adapter gates.
    pub fn protected_port(&self) -> u16 {
        self.protected_port
    }

    /// Install the default DROP for the protected port if it is not
    /// already present. Without it the knock protocol gates nothing.
    pub async fn ensure_default_drop(&self) -> Result<(), FirewallError> {
        let drop_rule = [
            "INPUT",
            "-p",
            "tcp",
            "--dport",
            &self.protected_port.to_string(),
            "-j",
            "DROP",
        ];
        if self.check(&drop_rule).await? {
            return Ok(());
        }
        let mut insert = vec!["-I", "INPUT", "1"];
        insert.extend_from_slice(&drop_rule[1..]);
        self.run(&insert).await.map(|_| ())
    }

    fn accept_rule(&self, source: IpAddr) -> Vec<String> {
        vec![
            "INPUT".into(),
            "-p".into(),
            "tcp".into(),
            "-s".into(),
            source.to_string(),
            "--dport".into(),
            self.protected_port.to_string(),
            "-j".into(),
            "ACCEPT".into(),
        ]
    }

    /// `iptables -C`: true if the rule exists.
    async fn check<S: AsRef<str>>(&self, rule: &[S]) -> Result<bool, FirewallError> {
        let mut args: Vec<&str> = vec!["-C"];
        args.extend(rule.iter().map(AsRef::as_ref));
        self.run(&args).await
    }

    /// Run one iptables invocation under the command timeout.
    ///
    /// Returns `Ok(true)` on exit 0 and `Ok(false)` on a clean nonzero
    /// exit (how `-C` reports a missing rule); spawn failures and
    /// timeouts are errors.
    async fn run(&self, args: &[&str]) -> Result<bool, FirewallError> {
        let output = tokio::time::timeout(
            self.command_timeout,
            Command::new("iptables").args(args).output(),
        )
        .await
        .map_err(|_| FirewallError::Timeout(self.command_timeout.as_millis() as u64))?
        .map_err(|e| FirewallError::CommandFailed(format!("spawn iptables: {e}")))?;

        Ok(output.status.success())
    }
}

#[async_trait]
impl FirewallGate for IptablesFirewall {
    async fn grant(&self, source: IpAddr) -> Result<(), FirewallError> {
        let rule = self.accept_rule(source);
        if self.check(&rule).await? {
            // Already granted.
            return Ok(());
        }
        let mut args: Vec<&str> = vec!["-I", "INPUT", "1"];
        args.extend(rule.iter().skip(1).map(String::as_str));
        if self.run(&args).await? {
            Ok(())
        } else {
            Err(FirewallError::CommandFailed(format!(
                "iptables insert for {source} exited nonzero"
            )))
        }
    }

    async fn revoke(&self, source: IpAddr) -> Result<(), FirewallError> {
        let rule = self.accept_rule(source);
        // Revoking with no rule present is a no-op, not an error.
        if !self.check(&rule).await? {
            return Ok(());
        }
        let mut args: Vec<&str> = vec!["-D"];
        args.extend(rule.iter().map(String::as_str));
        if self.run(&args).await? {
            Ok(())
        } else {
            Err(FirewallError::CommandFailed(format!(
                "iptables delete for {source} exited nonzero"
            )))
        }
    }
}
