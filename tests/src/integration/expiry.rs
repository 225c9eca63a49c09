//! Timer-driven revocation under tokio's paused clock.
//!
//! The manual time source feeds the tracker's window math while the
//! paused tokio clock drives the real expiry timers; the two are
//! advanced in lockstep.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::integration::fixtures::{addr, gate, Gate, SEQUENCE};
    use knock_core::{GateEvent, KnockGateApi, TimeSource};

    async fn authorize(g: &Gate, client: std::net::IpAddr) {
        for port in SEQUENCE {
            g.service.handle_knock(client, port).await.unwrap();
        }
        assert!(g.firewall.is_allowed(client));
    }

    /// The protected port is reachable until the open duration elapses,
    /// then revoked within a small bounded delay.
    #[tokio::test(start_paused = true)]
    async fn test_grant_expires_on_schedule() {
        let g = gate();
        let client = addr("10.0.0.5");
        authorize(&g, client).await;

        // Just before expiry the rule still stands.
        tokio::time::sleep(Duration::from_secs(29)).await;
        g.time.advance(29_000);
        assert!(g.firewall.is_allowed(client));

        tokio::time::sleep(Duration::from_secs(2)).await;
        g.time.advance(2_000);
        assert!(!g.firewall.is_allowed(client));
        assert_eq!(g.service.pending_revocations(), 0);
        assert!(!g.service.tracker().is_authorized(client, g.time.now()));
    }

    /// A new completed sequence mid-grant replaces the pending timer:
    /// the rule survives the original deadline and dies at the new one.
    #[tokio::test(start_paused = true)]
    async fn test_extension_outlives_original_deadline() {
        let g = gate();
        let client = addr("10.0.0.5");
        authorize(&g, client).await;

        tokio::time::sleep(Duration::from_secs(20)).await;
        g.time.advance(20_000);
        authorize(&g, client).await;

        // t=35s: past the first deadline (30s), inside the second (50s).
        tokio::time::sleep(Duration::from_secs(15)).await;
        g.time.advance(15_000);
        assert!(g.firewall.is_allowed(client));

        tokio::time::sleep(Duration::from_secs(20)).await;
        g.time.advance(20_000);
        assert!(!g.firewall.is_allowed(client));
    }

    /// Revocations for different sources fire independently.
    #[tokio::test(start_paused = true)]
    async fn test_staggered_expiries() {
        let g = gate();
        let alice = addr("10.0.0.5");
        let bob = addr("10.0.0.6");

        authorize(&g, alice).await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        g.time.advance(10_000);
        authorize(&g, bob).await;

        // t=31s: alice's grant (until 30s) is gone, bob's (until 40s) lives.
        tokio::time::sleep(Duration::from_secs(21)).await;
        g.time.advance(21_000);
        assert!(!g.firewall.is_allowed(alice));
        assert!(g.firewall.is_allowed(bob));

        tokio::time::sleep(Duration::from_secs(10)).await;
        g.time.advance(10_000);
        assert!(!g.firewall.is_allowed(bob));
    }

    /// Transient revoke failures are retried until the rule comes out.
    #[tokio::test(start_paused = true)]
    async fn test_revoke_retries_through_transient_failure() {
        let g = gate();
        let client = addr("10.0.0.5");
        authorize(&g, client).await;
        g.firewall.fail_next_revokes(2);

        tokio::time::sleep(Duration::from_secs(35)).await;
        g.time.advance(35_000);

        assert!(!g.firewall.is_allowed(client));
        assert!(g
            .events
            .recorded()
            .iter()
            .any(|e| matches!(e, GateEvent::AccessRevoked { .. })));
    }

    /// A revoke that keeps failing is escalated, never silently dropped.
    #[tokio::test(start_paused = true)]
    async fn test_revoke_exhaustion_escalates() {
        let g = gate();
        let client = addr("10.0.0.5");
        authorize(&g, client).await;
        g.firewall.fail_next_revokes(100);

        tokio::time::sleep(Duration::from_secs(60)).await;
        g.time.advance(60_000);

        // The rule lingers and the failure is surfaced as an event.
        assert!(g.firewall.is_allowed(client));
        assert!(g
            .events
            .recorded()
            .iter()
            .any(|e| matches!(e, GateEvent::RevokeFailed { .. })));
    }
}
