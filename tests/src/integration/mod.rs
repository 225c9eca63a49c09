//! End-to-end flows across the listener, tracker, firewall, and
//! expiry scheduler.

pub mod abuse;
pub mod expiry;
pub mod knock_flows;

#[cfg(test)]
pub(crate) mod fixtures {
    use std::net::IpAddr;
    use std::sync::Arc;
    use std::time::Duration;

    use knock_core::testing::{ManualTimeSource, RecordingEventSink};
    use knock_core::{InMemoryFirewall, KnockGateService, SequenceSpec};

    pub const SEQUENCE: [u16; 3] = [1234, 5678, 9012];
    pub const WINDOW: Duration = Duration::from_secs(10);
    pub const OPEN_FOR: Duration = Duration::from_secs(30);

    pub struct Gate {
        pub service: Arc<KnockGateService>,
        pub firewall: Arc<InMemoryFirewall>,
        pub time: Arc<ManualTimeSource>,
        pub events: Arc<RecordingEventSink>,
    }

    pub fn gate() -> Gate {
        gate_with_grace_ms(60_000)
    }

    pub fn gate_with_grace_ms(grace_ms: u64) -> Gate {
        let spec = SequenceSpec::new(SEQUENCE.to_vec(), WINDOW, OPEN_FOR).unwrap();
        let firewall = Arc::new(InMemoryFirewall::new());
        let time = ManualTimeSource::new(0);
        let events = Arc::new(RecordingEventSink::new());
        let service = Arc::new(
            KnockGateService::new(spec, firewall.clone(), time.clone(), events.clone())
                .with_idle_grace_ms(grace_ms),
        );
        Gate {
            service,
            firewall,
            time,
            events,
        }
    }

    pub fn addr(s: &str) -> IpAddr {
        s.parse().unwrap()
    }
}
