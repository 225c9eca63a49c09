//! Per-source knock tracking.
//!
//! The tracker owns a concurrent table of source states and advances or
//! resets each source against the [`SequenceSpec`] as knocks arrive.
//! All reads and writes for one address go through that address's table
//! entry, so concurrent knocks from the same source apply in arrival
//! order while different sources never wait on each other's progress.
//!
//! The tracker has no side effects: it only hands back a [`Decision`],
//! and the service layer reacts to `Authorized` by driving the firewall
//! and the expiry scheduler. Authorization bookkeeping is committed
//! separately via [`KnockTracker::commit_grant`] so a failed firewall
//! grant never leaves the tracker claiming an access that does not
//! exist.

use std::net::IpAddr;

use dashmap::DashMap;

use super::sequence::SequenceSpec;
use super::value_objects::{
    AuthorizationGrant, Decision, KnockEvent, SourceReport, Timestamp, TrackerStats,
};

/// Progress of one source address through the sequence.
#[derive(Debug, Clone, Copy)]
struct SourceState {
    /// Index into the sequence of the next expected knock (0..len).
    next_index: usize,
    /// Arrival time of the first knock of the current attempt.
    first_knock_at: Timestamp,
    /// Active grant, if the firewall hole is currently open.
    grant: Option<AuthorizationGrant>,
    /// Last knock seen from this source, for idle eviction.
    last_seen: Timestamp,
}

impl SourceState {
    fn fresh(now: Timestamp) -> Self {
        Self {
            next_index: 0,
            first_knock_at: now,
            grant: None,
            last_seen: now,
        }
    }
}

/// Concurrent per-source sequence tracker.
pub struct KnockTracker {
    spec: SequenceSpec,
    sources: DashMap<IpAddr, SourceState>,
}

impl KnockTracker {
    /// Create a tracker for the given sequence spec.
    pub fn new(spec: SequenceSpec) -> Self {
        Self {
            spec,
            sources: DashMap::new(),
        }
    }

    /// The spec this tracker enforces.
    pub fn spec(&self) -> &SequenceSpec {
        &self.spec
    }

    /// Feed one knock through the state machine.
    ///
    /// State is created lazily at index 0 for a never-seen address. A
    /// knock on the wrong port, or on the right port after the window
    /// has elapsed, restarts the source; the restarting knock itself
    /// counts as a fresh first knock when it hits the sequence's first
    /// port. Completing the sequence returns [`Decision::Authorized`]
    /// and resets the index to 0 so future passes start clean.
    pub fn observe(&self, event: &KnockEvent) -> Decision {
        let mut entry = self
            .sources
            .entry(event.source)
            .or_insert_with(|| SourceState::fresh(event.observed_at));
        let state = entry.value_mut();
        state.last_seen = event.observed_at;

        // next_index < len always holds: completion resets it to 0.
        let expected = self
            .spec
            .port_at(state.next_index)
            .unwrap_or_else(|| self.spec.first_port());

        let stale = state.next_index > 0
            && event.observed_at.saturating_sub(state.first_knock_at) > self.spec.window_ms();

        if event.port != expected || stale {
            return Self::restart(state, event, self.spec.first_port());
        }

        if state.next_index == 0 {
            state.first_knock_at = event.observed_at;
        }
        state.next_index += 1;

        if state.next_index == self.spec.len() {
            state.next_index = 0;
            Decision::Authorized
        } else {
            Decision::Progressing
        }
    }

    /// Restart a source after an out-of-order or stale knock.
    ///
    /// The offending knock counts as a fresh potential first knock: if
    /// it landed on the sequence's first port it opens a new attempt at
    /// index 1 instead of a bare reset.
    fn restart(state: &mut SourceState, event: &KnockEvent, first_port: u16) -> Decision {
        state.first_knock_at = event.observed_at;
        if event.port == first_port {
            state.next_index = 1;
            Decision::Progressing
        } else {
            state.next_index = 0;
            Decision::Reset
        }
    }

    /// Record a successfully applied grant.
    ///
    /// Called by the service only after the firewall rule is in place.
    pub fn commit_grant(&self, grant: AuthorizationGrant) {
        let mut entry = self
            .sources
            .entry(grant.source)
            .or_insert_with(|| SourceState::fresh(grant.granted_at));
        entry.value_mut().grant = Some(grant);
    }

    /// Clear the grant record after the firewall rule is gone.
    pub fn clear_grant(&self, source: IpAddr) {
        if let Some(mut state) = self.sources.get_mut(&source) {
            state.grant = None;
        }
    }

    /// Whether the tracker currently holds state for `source`.
    pub fn is_tracked(&self, source: IpAddr) -> bool {
        self.sources.contains_key(&source)
    }

    /// Whether `source` holds a live grant at `now`.
    pub fn is_authorized(&self, source: IpAddr, now: Timestamp) -> bool {
        self.sources
            .get(&source)
            .and_then(|s| s.grant)
            .is_some_and(|g| g.is_active(now))
    }

    /// Addresses with a live grant at `now`.
    pub fn authorized_sources(&self, now: Timestamp) -> Vec<IpAddr> {
        self.sources
            .iter()
            .filter(|e| e.grant.is_some_and(|g| g.is_active(now)))
            .map(|e| *e.key())
            .collect()
    }

    /// Evict sources that are idle past `grace_ms` and hold no live
    /// grant. Bounds memory under scanning or spoofing traffic.
    ///
    /// Returns the number of evicted sources.
    pub fn gc(&self, now: Timestamp, grace_ms: u64) -> usize {
        let before = self.sources.len();
        self.sources.retain(|_, state| {
            state.grant.is_some_and(|g| g.is_active(now))
                || now.saturating_sub(state.last_seen) <= grace_ms
        });
        before.saturating_sub(self.sources.len())
    }

    /// Read-only diagnostic snapshot of every tracked source.
    pub fn report(&self, now: Timestamp) -> Vec<SourceReport> {
        self.sources
            .iter()
            .map(|entry| {
                let state = entry.value();
                let window_remaining_ms = (state.next_index > 0).then(|| {
                    self.spec
                        .window_ms()
                        .saturating_sub(now.saturating_sub(state.first_knock_at))
                });
                SourceReport {
                    source: *entry.key(),
                    progress: state.next_index,
                    window_remaining_ms,
                    authorized_until: state.grant.filter(|g| g.is_active(now)).map(|g| g.expires_at),
                }
            })
            .collect()
    }

    /// Aggregate counters for monitoring.
    pub fn stats(&self, now: Timestamp) -> TrackerStats {
        TrackerStats {
            tracked_sources: self.sources.len(),
            authorized_sources: self
                .sources
                .iter()
                .filter(|e| e.grant.is_some_and(|g| g.is_active(now)))
                .count(),
        }
    }
}
