//! Timer-driven grant revocation.
//!
//! One cancellable tokio task per granted address, keyed in a pending
//! table. Scheduling for an address that already has a pending expiry
//! replaces the previous timer (extend-on-reknock), never stacks two
//! revocations. Fired and cancelled timers are removed, so the table
//! stays bounded by the number of distinct recently-granted sources.

use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;

use crate::domain::{GateError, KnockTracker};
use crate::ports::{EventSink, FirewallGate, GateEvent};

/// Bounded backoff for failed revokes.
///
/// A stale allow rule is a security exposure, so revokes retry; after
/// `max_attempts` the failure is escalated through the event sink and
/// the error log instead of being dropped.
#[derive(Debug, Clone, Copy)]
pub struct RevokeRetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RevokeRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(250),
        }
    }
}

/// What to do with active grants when the process shuts down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownPolicy {
    /// Revoke every active grant before exiting.
    #[default]
    RevokeAll,
    /// Deliberately leave grants in place until their natural expiry.
    LeaveOpen,
}

/// One armed revocation timer. The generation distinguishes a live
/// timer from a superseded one that already woke up.
struct PendingExpiry {
    generation: u64,
    handle: JoinHandle<()>,
}

struct SchedulerInner {
    pending: DashMap<IpAddr, PendingExpiry>,
    next_generation: AtomicU64,
    firewall: Arc<dyn FirewallGate>,
    tracker: Arc<KnockTracker>,
    events: Arc<dyn EventSink>,
    retry: RevokeRetryPolicy,
}

impl SchedulerInner {
    /// Revoke with bounded exponential backoff; escalate on exhaustion.
    async fn revoke_with_retry(&self, source: IpAddr) -> Result<(), GateError> {
        let mut backoff = self.retry.initial_backoff;
        for attempt in 1..=self.retry.max_attempts {
            match self.firewall.revoke(source).await {
                Ok(()) => {
                    self.tracker.clear_grant(source);
                    self.events.observe(GateEvent::AccessRevoked { source });
                    return Ok(());
                }
                Err(err) if attempt < self.retry.max_attempts => {
                    tracing::warn!(
                        %source,
                        attempt,
                        error = %err,
                        "revoke failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
                Err(err) => {
                    tracing::error!(
                        %source,
                        attempts = self.retry.max_attempts,
                        error = %err,
                        "revoke failed after retries, allow rule may linger"
                    );
                    self.events.observe(GateEvent::RevokeFailed {
                        source,
                        attempts: self.retry.max_attempts,
                    });
                    return Err(GateError::RevokeFailed {
                        address: source,
                        attempts: self.retry.max_attempts,
                        reason: err.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Schedules automatic revocation of grants after the open duration.
pub struct ExpiryScheduler {
    inner: Arc<SchedulerInner>,
}

impl ExpiryScheduler {
    pub fn new(
        firewall: Arc<dyn FirewallGate>,
        tracker: Arc<KnockTracker>,
        events: Arc<dyn EventSink>,
        retry: RevokeRetryPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                pending: DashMap::new(),
                next_generation: AtomicU64::new(0),
                firewall,
                tracker,
                events,
                retry,
            }),
        }
    }

    /// Arm (or re-arm) the revocation timer for `source`.
    ///
    /// A previously pending timer for the same address is cancelled, so
    /// re-knocking extends the grant rather than stacking revocations.
    pub fn schedule(&self, source: IpAddr, after: Duration) {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            // Fired: leave the pending table before touching the
            // firewall. Only the current generation may remove the
            // entry and revoke; a timer superseded while it was waking
            // up finds a newer entry and stands down.
            let current = inner
                .pending
                .remove_if(&source, |_, p| p.generation == generation)
                .is_some();
            if current {
                let _ = inner.revoke_with_retry(source).await;
            }
        });
        let entry = PendingExpiry { generation, handle };
        if let Some(previous) = self.inner.pending.insert(source, entry) {
            previous.handle.abort();
        }
    }

    /// Revoke `source` right now with the configured retry policy,
    /// bypassing any timer. Used at shutdown.
    pub async fn revoke_with_retry(&self, source: IpAddr) -> Result<(), GateError> {
        self.inner.revoke_with_retry(source).await
    }

    /// Cancel the pending revocation for `source`, if any.
    pub fn cancel(&self, source: IpAddr) {
        if let Some((_, pending)) = self.inner.pending.remove(&source) {
            pending.handle.abort();
        }
    }

    /// Cancel every pending revocation (process shutdown).
    pub fn cancel_all(&self) {
        let sources: Vec<IpAddr> = self.inner.pending.iter().map(|e| *e.key()).collect();
        for source in sources {
            self.cancel(source);
        }
    }

    /// Number of armed timers (diagnostics and tests).
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }
}
