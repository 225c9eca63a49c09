//! End-to-end knock flows: the worked examples from the protocol
//! description, driven through the full service with a fake firewall.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{addr, gate, SEQUENCE};
    use knock_core::{Decision, KnockGateApi};

    /// sequence = [1234, 5678, 9012], window = 10s, open = 30s.
    /// Knocks at t = 0s, 3s, 7s → authorized at t = 7s, open until 37s.
    #[tokio::test]
    async fn test_canonical_sequence_authorizes() {
        let g = gate();
        let client = addr("10.0.0.5");

        assert_eq!(
            g.service.handle_knock(client, 1234).await.unwrap(),
            Decision::Progressing
        );
        g.time.set(3_000);
        assert_eq!(
            g.service.handle_knock(client, 5678).await.unwrap(),
            Decision::Progressing
        );
        g.time.set(7_000);
        assert_eq!(
            g.service.handle_knock(client, 9012).await.unwrap(),
            Decision::Authorized
        );

        assert!(g.firewall.is_allowed(client));
        let report = g.service.diagnostics();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].authorized_until, Some(37_000));
    }

    /// Knocks at t = 0s, 3s, 15s: the last knock lands past the 10s
    /// window, so the attempt resets and nothing opens.
    #[tokio::test]
    async fn test_window_overrun_denies() {
        let g = gate();
        let client = addr("10.0.0.5");

        g.service.handle_knock(client, 1234).await.unwrap();
        g.time.set(3_000);
        g.service.handle_knock(client, 5678).await.unwrap();
        g.time.set(15_000);
        assert_eq!(
            g.service.handle_knock(client, 9012).await.unwrap(),
            Decision::Reset
        );

        assert!(!g.firewall.is_allowed(client));
        assert_eq!(g.service.pending_revocations(), 0);
    }

    /// A knock on the second port with no prior first knock never
    /// advances progress.
    #[tokio::test]
    async fn test_mid_sequence_start_never_progresses() {
        let g = gate();
        let client = addr("10.0.0.5");

        assert_eq!(
            g.service.handle_knock(client, 5678).await.unwrap(),
            Decision::Reset
        );
        assert_eq!(
            g.service.handle_knock(client, 9012).await.unwrap(),
            Decision::Reset
        );
        assert_eq!(g.service.diagnostics()[0].progress, 0);
        assert!(!g.firewall.is_allowed(client));
    }

    /// Correct sequences from two addresses interleaved in time both
    /// succeed independently.
    #[tokio::test]
    async fn test_interleaved_sources_are_isolated() {
        let g = gate();
        let alice = addr("10.0.0.5");
        let bob = addr("10.0.0.6");

        for port in SEQUENCE {
            g.service.handle_knock(alice, port).await.unwrap();
            g.time.advance(250);
            g.service.handle_knock(bob, port).await.unwrap();
            g.time.advance(250);
        }

        assert!(g.firewall.is_allowed(alice));
        assert!(g.firewall.is_allowed(bob));
        assert_eq!(g.service.stats().authorized_sources, 2);
    }

    /// One source failing mid-sequence does not disturb another
    /// source's in-flight attempt.
    #[tokio::test]
    async fn test_reset_does_not_leak_across_sources() {
        let g = gate();
        let alice = addr("10.0.0.5");
        let mallory = addr("198.51.100.9");

        g.service.handle_knock(alice, 1234).await.unwrap();
        g.service.handle_knock(mallory, 9012).await.unwrap();
        g.service.handle_knock(mallory, 9012).await.unwrap();
        g.service.handle_knock(alice, 5678).await.unwrap();
        assert_eq!(
            g.service.handle_knock(alice, 9012).await.unwrap(),
            Decision::Authorized
        );

        assert!(g.firewall.is_allowed(alice));
        assert!(!g.firewall.is_allowed(mallory));
    }

    /// A botched attempt whose stray knock hits the first port starts a
    /// fresh attempt from that knock.
    #[tokio::test]
    async fn test_restart_from_first_port_mid_attempt() {
        let g = gate();
        let client = addr("10.0.0.5");

        g.service.handle_knock(client, 1234).await.unwrap();
        g.time.set(2_000);
        // Wrong (expected 5678), but it is the first port: new attempt.
        assert_eq!(
            g.service.handle_knock(client, 1234).await.unwrap(),
            Decision::Progressing
        );
        g.time.set(4_000);
        g.service.handle_knock(client, 5678).await.unwrap();
        g.time.set(11_000);
        // 9s since the new anchor at t=2s: still inside the window.
        assert_eq!(
            g.service.handle_knock(client, 9012).await.unwrap(),
            Decision::Authorized
        );
    }

    /// Re-knocking while authorized extends the grant instead of
    /// stacking a second one.
    #[tokio::test]
    async fn test_reknock_extends_not_duplicates() {
        let g = gate();
        let client = addr("10.0.0.5");

        for port in SEQUENCE {
            g.service.handle_knock(client, port).await.unwrap();
        }
        let first_until = g.service.diagnostics()[0].authorized_until.unwrap();

        g.time.set(20_000);
        for port in SEQUENCE {
            g.service.handle_knock(client, port).await.unwrap();
        }
        let second_until = g.service.diagnostics()[0].authorized_until.unwrap();

        assert_eq!(first_until, 30_000);
        assert_eq!(second_until, 50_000);
        assert_eq!(g.firewall.rule_count(), 1);
        assert_eq!(g.service.pending_revocations(), 1);
    }

    /// Each completed pass authorizes exactly once: progress returns to
    /// zero immediately after authorization.
    #[tokio::test]
    async fn test_authorized_exactly_once_per_pass() {
        let g = gate();
        let client = addr("10.0.0.5");

        for port in SEQUENCE {
            g.service.handle_knock(client, port).await.unwrap();
        }
        assert_eq!(g.service.diagnostics()[0].progress, 0);

        // Repeating just the final port is a reset, not a re-grant.
        assert_eq!(
            g.service.handle_knock(client, 9012).await.unwrap(),
            Decision::Reset
        );
    }
}
