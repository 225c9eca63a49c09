//! Gateway service implementing the driving port.
//!
//! Serializes knock handling per source address with a per-address
//! async lock so observe → grant → schedule is atomic for one address:
//! no observer ever sees an armed revoke timer without its grant, or a
//! committed grant without its timer. Different addresses never share a
//! lock and proceed concurrently.

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::domain::{
    AuthorizationGrant, Decision, GateError, KnockEvent, KnockTracker, SequenceSpec, SourceReport,
    TrackerStats,
};
use crate::ports::{EventSink, FirewallGate, GateEvent, KnockGateApi, TimeSource};

use super::expiry::{ExpiryScheduler, RevokeRetryPolicy, ShutdownPolicy};

/// Default idle grace before an unauthorized source's state is evicted.
pub const DEFAULT_IDLE_GRACE_MS: u64 = 60_000;

/// The knock gateway: tracker + firewall + expiry scheduler.
pub struct KnockGateService {
    tracker: Arc<KnockTracker>,
    firewall: Arc<dyn FirewallGate>,
    scheduler: ExpiryScheduler,
    time: Arc<dyn TimeSource>,
    events: Arc<dyn EventSink>,
    shutdown_policy: ShutdownPolicy,
    idle_grace_ms: u64,
    /// Per-address serialization of knock handling.
    locks: DashMap<IpAddr, Arc<Mutex<()>>>,
}

impl KnockGateService {
    /// Build a service with the default retry and shutdown policies.
    pub fn new(
        spec: SequenceSpec,
        firewall: Arc<dyn FirewallGate>,
        time: Arc<dyn TimeSource>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self::with_policies(
            spec,
            firewall,
            time,
            events,
            RevokeRetryPolicy::default(),
            ShutdownPolicy::default(),
        )
    }

    /// Build a service with explicit revoke-retry and shutdown policies.
    pub fn with_policies(
        spec: SequenceSpec,
        firewall: Arc<dyn FirewallGate>,
        time: Arc<dyn TimeSource>,
        events: Arc<dyn EventSink>,
        retry: RevokeRetryPolicy,
        shutdown_policy: ShutdownPolicy,
    ) -> Self {
        let tracker = Arc::new(KnockTracker::new(spec));
        let scheduler = ExpiryScheduler::new(
            Arc::clone(&firewall),
            Arc::clone(&tracker),
            Arc::clone(&events),
            retry,
        );
        Self {
            tracker,
            firewall,
            scheduler,
            time,
            events,
            shutdown_policy,
            idle_grace_ms: DEFAULT_IDLE_GRACE_MS,
            locks: DashMap::new(),
        }
    }

    /// Override the idle grace period for source-state eviction.
    #[must_use]
    pub fn with_idle_grace_ms(mut self, grace_ms: u64) -> Self {
        self.idle_grace_ms = grace_ms;
        self
    }

    /// The tracker (read access for diagnostics and tests).
    pub fn tracker(&self) -> &KnockTracker {
        &self.tracker
    }

    /// Number of armed revocation timers.
    pub fn pending_revocations(&self) -> usize {
        self.scheduler.pending_count()
    }

    pub(crate) fn idle_grace_ms(&self) -> u64 {
        self.idle_grace_ms
    }

    pub(crate) fn now(&self) -> u64 {
        self.time.now()
    }

    pub(crate) fn evict_idle_locks(&self) {
        self.locks
            .retain(|source, lock| Arc::strong_count(lock) > 1 || self.tracker.is_tracked(*source));
    }

    fn address_lock(&self, source: IpAddr) -> Arc<Mutex<()>> {
        self.locks
            .entry(source)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Apply the grant side effects for a completed sequence.
    ///
    /// The firewall rule goes in first; only then is the grant recorded
    /// and the expiry timer armed. On failure nothing is committed and
    /// the client can simply re-knock.
    async fn apply_grant(&self, source: IpAddr, now: u64) -> Result<(), GateError> {
        if let Err(err) = self.firewall.grant(source).await {
            self.events.observe(GateEvent::GrantFailed { source });
            return Err(GateError::GrantFailed {
                address: source,
                reason: err.to_string(),
            });
        }

        let grant = AuthorizationGrant {
            source,
            granted_at: now,
            expires_at: now + self.tracker.spec().open_for_ms(),
        };
        self.tracker.commit_grant(grant);
        // Replaces any pending timer: re-knocking extends the grant.
        self.scheduler
            .schedule(source, self.tracker.spec().open_for());
        self.events.observe(GateEvent::AccessGranted {
            source,
            until: grant.expires_at,
        });
        Ok(())
    }
}

#[async_trait]
impl KnockGateApi for KnockGateService {
    async fn handle_knock(&self, source: IpAddr, port: u16) -> Result<Decision, GateError> {
        let lock = self.address_lock(source);
        let _guard = lock.lock().await;

        let now = self.time.now();
        let event = KnockEvent {
            source,
            port,
            observed_at: now,
        };
        let decision = self.tracker.observe(&event);
        self.events.observe(GateEvent::KnockObserved {
            source,
            port,
            decision,
        });

        if decision == Decision::Authorized {
            self.apply_grant(source, now).await?;
        }
        Ok(decision)
    }

    fn diagnostics(&self) -> Vec<SourceReport> {
        self.tracker.report(self.time.now())
    }

    fn stats(&self) -> TrackerStats {
        self.tracker.stats(self.time.now())
    }

    async fn shutdown(&self) -> Result<(), GateError> {
        self.scheduler.cancel_all();

        match self.shutdown_policy {
            ShutdownPolicy::LeaveOpen => {
                let active = self.tracker.authorized_sources(self.time.now());
                if !active.is_empty() {
                    tracing::info!(
                        grants = active.len(),
                        "leaving active grants in place per shutdown policy"
                    );
                }
                Ok(())
            }
            ShutdownPolicy::RevokeAll => {
                // Same retry budget as a timer-driven revoke: a stale
                // allow rule outliving the daemon is an open access
                // window.
                let mut last_failure = None;
                for source in self.tracker.authorized_sources(self.time.now()) {
                    if let Err(err) = self.scheduler.revoke_with_retry(source).await {
                        last_failure = Some(err);
                    }
                }
                match last_failure {
                    Some(err) => Err(err),
                    None => Ok(()),
                }
            }
        }
    }
}
