//! Daemon wiring and lifecycle.
//!
//! Builds the core service from configuration, installs the default
//! DROP for the protected port, spawns the listeners and the
//! maintenance loop, and tears everything down on the shutdown signal
//! honoring the configured shutdown policy.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{error, info};

use knock_core::{
    FirewallGate, InMemoryFirewall, IptablesFirewall, KnockGateApi, KnockGateService,
    MonotonicTimeSource, RevokeRetryPolicy, TracingEventSink,
};

use crate::config::{FirewallBackend, KnockdConfig};
use crate::listener::KnockListener;

/// The assembled daemon.
pub struct KnockdRuntime {
    config: KnockdConfig,
    service: Arc<KnockGateService>,
    /// Kept for the default-DROP installation; None for the in-memory
    /// backend.
    iptables: Option<IptablesFirewall>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl KnockdRuntime {
    /// Wire up the service from validated configuration.
    pub fn new(config: KnockdConfig) -> Result<Self> {
        let spec = config
            .sequence_spec()
            .context("configuration failed validation")?;

        let (firewall, iptables): (Arc<dyn FirewallGate>, Option<IptablesFirewall>) =
            match config.firewall {
                FirewallBackend::Iptables => {
                    let adapter = IptablesFirewall::new(config.protected_port);
                    (Arc::new(adapter.clone()), Some(adapter))
                }
                FirewallBackend::Memory => (Arc::new(InMemoryFirewall::new()), None),
            };

        let service = Arc::new(
            KnockGateService::with_policies(
                spec,
                firewall,
                Arc::new(MonotonicTimeSource::new()),
                Arc::new(TracingEventSink),
                RevokeRetryPolicy::default(),
                config.shutdown_policy,
            )
            .with_idle_grace_ms(config.idle_grace().as_millis() as u64),
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Ok(Self {
            config,
            service,
            iptables,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// The gateway service (for embedding and tests).
    pub fn service(&self) -> Arc<KnockGateService> {
        Arc::clone(&self.service)
    }

    /// Signal every spawned task to stop.
    pub fn trigger_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Run until ctrl-c, then tear down.
    pub async fn run(self) -> Result<()> {
        info!(
            protected_port = self.config.protected_port,
            knock_ports = ?self.config.sequence,
            window_secs = self.config.window_secs,
            open_secs = self.config.open_secs,
            transport = ?self.config.transport,
            "starting knock gateway"
        );

        // Without the default DROP the knock protocol gates nothing.
        if let Some(iptables) = &self.iptables {
            iptables
                .ensure_default_drop()
                .await
                .context("installing default DROP for the protected port")?;
        }

        let listener = KnockListener::new(
            self.service.clone() as Arc<dyn KnockGateApi>,
            self.config.bind_address,
            self.config.transport,
            self.config.sequence.clone(),
        );
        let listener_handles = listener
            .spawn(self.shutdown_rx.clone())
            .await
            .context("binding knock ports")?;

        let maintenance = tokio::spawn(
            self.service
                .clone()
                .run_maintenance(self.config.gc_interval(), self.shutdown_rx.clone()),
        );

        tokio::signal::ctrl_c()
            .await
            .context("waiting for shutdown signal")?;
        info!("shutdown signal received");

        let _ = self.shutdown_tx.send(true);
        if let Err(err) = self.service.shutdown().await {
            // Stale allow rules are a security exposure; make noise.
            error!(error = %err, "shutdown left firewall rules behind");
        }

        for handle in listener_handles {
            let _ = handle.await;
        }
        let _ = maintenance.await;

        info!("knock gateway stopped");
        Ok(())
    }
}
