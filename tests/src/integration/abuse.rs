//! Hostile-traffic scenarios: port scanners, knock floods, and memory
//! bounds under spoofed sources.

#[cfg(test)]
mod tests {
    use std::net::IpAddr;

    use rand::prelude::*;

    use crate::integration::fixtures::{addr, gate, SEQUENCE};
    use knock_core::{Decision, KnockGateApi, TimeSource};

    /// A sequential scanner sweeping the decoy ports in ascending order
    /// happens to hit the exact sequence; that is the protocol working
    /// as designed. Sweeping in descending order must never authorize.
    #[tokio::test]
    async fn test_descending_scan_never_authorizes() {
        let g = gate();
        let scanner = addr("198.51.100.7");

        for port in SEQUENCE.iter().rev() {
            let decision = g.service.handle_knock(scanner, *port).await.unwrap();
            assert_ne!(decision, Decision::Authorized);
        }
        assert!(!g.firewall.is_allowed(scanner));
    }

    /// Random knock noise from one source: without the full ordered
    /// subsequence ending in a clean pass, no grant appears.
    #[tokio::test]
    async fn test_random_noise_rarely_authorizes_and_always_tracks() {
        let g = gate();
        let noisy = addr("198.51.100.8");
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..200 {
            let port = SEQUENCE[rng.gen_range(0..SEQUENCE.len())];
            g.service.handle_knock(noisy, port).await.unwrap();
            g.time.advance(100);
        }

        // Whatever happened, the invariants hold: at most one rule, and
        // tracker state agrees with the firewall.
        let allowed = g.firewall.is_allowed(noisy);
        assert_eq!(g.firewall.rule_count(), usize::from(allowed));
        assert_eq!(
            g.service.tracker().is_authorized(noisy, g.time.now()),
            allowed
        );
    }

    /// Spoofed knocks from many distinct addresses stay bounded: gc
    /// evicts everything idle once the grace period passes.
    #[tokio::test]
    async fn test_spoof_flood_is_garbage_collected() {
        let g = gate();

        for i in 0..500u32 {
            let source: IpAddr = format!("203.0.{}.{}", i / 250, i % 250 + 1).parse().unwrap();
            g.service.handle_knock(source, 1234).await.unwrap();
        }
        assert_eq!(g.service.stats().tracked_sources, 500);

        // Default grace is 60s; everything is idle at t=120s.
        g.time.set(120_000);
        let evicted = g.service.gc();
        assert_eq!(evicted, 500);
        assert_eq!(g.service.stats().tracked_sources, 0);
    }

    /// A flood cannot evict a live grant.
    #[tokio::test]
    async fn test_flood_leaves_active_grant_alone() {
        let g = crate::integration::fixtures::gate_with_grace_ms(5_000);
        let client = addr("10.0.0.5");
        for port in SEQUENCE {
            g.service.handle_knock(client, port).await.unwrap();
        }

        for i in 1..=100u32 {
            let source: IpAddr = format!("203.0.113.{}", i % 250 + 1).parse().unwrap();
            g.service.handle_knock(source, 9012).await.unwrap();
        }

        // t=25s: everyone is idle past the 5s grace, but the client's
        // grant (until 30s) is still live and must survive.
        g.time.set(25_000);
        let evicted = g.service.gc();
        assert_eq!(evicted, 100);
        assert!(g.firewall.is_allowed(client));
        assert!(g.service.tracker().is_authorized(client, g.time.now()));
    }

    /// Concurrent knockers on distinct addresses all complete; the
    /// per-address locks never cross.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sources_all_authorize() {
        let g = gate();

        let mut handles = Vec::new();
        for i in 1..=50u32 {
            let service = g.service.clone();
            handles.push(tokio::spawn(async move {
                let source: IpAddr = format!("10.1.{}.{}", i / 250, i % 250).parse().unwrap();
                let mut last = Decision::Reset;
                for port in SEQUENCE {
                    last = service.handle_knock(source, port).await.unwrap();
                }
                last
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Decision::Authorized);
        }
        assert_eq!(g.service.stats().authorized_sources, 50);
        assert_eq!(g.firewall.rule_count(), 50);
    }
}
