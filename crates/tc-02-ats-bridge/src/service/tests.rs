//! Tests for AtsBridge

use super::*;
use crate::adapters::{RecordingRouteSelection, RouteCall};
use crate::domain::AtsBridgeConfig;
use shared_types::{
    Address, AddressProperties, AddressRegistry, PeerId, SessionId, TimeSource, Timestamp,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Thread-safe TimeSource for tests requiring time advancement.
struct ControllableTimeSource {
    time: AtomicU64,
}

impl ControllableTimeSource {
    fn new(initial: u64) -> Self {
        Self {
            time: AtomicU64::new(initial),
        }
    }

    /// Advances the internal clock by the specified milliseconds.
    fn advance(&self, millis: u64) {
        self.time.fetch_add(millis, Ordering::SeqCst);
    }
}

impl TimeSource for ControllableTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.time.load(Ordering::SeqCst))
    }
}

fn make_peer(val: u8) -> PeerId {
    let mut bytes = [0u8; 32];
    bytes[0] = val;
    PeerId::new(bytes)
}

fn setup() -> (AtsBridge, Arc<RecordingRouteSelection>, Arc<ControllableTimeSource>) {
    let route = Arc::new(RecordingRouteSelection::new());
    let time = Arc::new(ControllableTimeSource::new(1_000));
    let bridge = AtsBridge::new(AtsBridgeConfig::default(), route.clone(), time.clone());
    (bridge, route, time)
}

// =============================================================================
// TEST GROUP 1: Registration
// =============================================================================

#[test]
fn test_outbound_address_gains_and_loses_session() {
    let (bridge, route, _) = setup();
    let address = Address::new(make_peer(1), "udp", b"a".to_vec());
    let session = SessionId::new(1);

    bridge.add_address(&address, AddressProperties::default());
    assert!(bridge.is_known(&address, None));
    assert!(!bridge.is_known(&address, Some(session)));

    bridge.new_session(&address, session);
    assert!(bridge.is_known(&address, Some(session)));

    // Outbound address survives its session
    assert!(!bridge.del_session(&address, session));
    assert!(bridge.is_known_no_session(&address));

    assert_eq!(
        route.take(),
        vec![
            RouteCall::Add(address.clone(), None),
            RouteCall::AddSession(address.clone(), session),
            RouteCall::DelSession(address.clone(), session),
        ]
    );
}

#[test]
fn test_inbound_address_dies_with_session() {
    let (bridge, route, _) = setup();
    let address = Address::inbound(make_peer(1), "tcp", b"b".to_vec());
    let session = SessionId::new(7);

    bridge.add_inbound(&address, session, AddressProperties::default());
    bridge.add_inbound(&address, session, AddressProperties::default());
    assert_eq!(bridge.len(), 1);

    assert!(bridge.del_session(&address, session));
    assert!(bridge.is_empty());
    assert_eq!(
        route.take(),
        vec![
            RouteCall::Add(address.clone(), Some(session)),
            RouteCall::Destroy(address),
        ]
    );
}

#[test]
fn test_metric_updates_forwarded() {
    let (bridge, route, _) = setup();
    let address = Address::new(make_peer(1), "udp", b"a".to_vec());
    bridge.add_address(&address, AddressProperties::default());
    route.take();

    bridge.update_delay(&address, Duration::from_millis(40));
    bridge.update_utilization(&address, 100, 200);

    let calls = route.take();
    assert_eq!(calls.len(), 2);
    match &calls[1] {
        RouteCall::Update(_, props) => {
            assert_eq!(props.delay, Duration::from_millis(40));
            assert_eq!((props.utilization_in, props.utilization_out), (100, 200));
        }
        other => panic!("unexpected call {other:?}"),
    }
}

#[test]
fn test_expire_removes_record() {
    let (bridge, route, _) = setup();
    let address = Address::new(make_peer(2), "udp", b"x".to_vec());
    bridge.add_address(&address, AddressProperties::default());
    route.take();

    bridge.expire_address(&address);
    assert!(!bridge.is_known_no_session(&address));
    assert_eq!(route.take(), vec![RouteCall::Destroy(address)]);
}

// =============================================================================
// TEST GROUP 2: Blocking
// =============================================================================

#[test]
fn test_block_doubles_back_off_and_unblocks() {
    let (bridge, route, time) = setup();
    let address = Address::new(make_peer(1), "udp", b"a".to_vec());
    bridge.add_address(&address, AddressProperties::default());

    bridge.block_address(&address, None);
    assert_eq!(bridge.records(&make_peer(1))[0].back_off, Duration::from_millis(1));
    assert_eq!(bridge.poll_unblock(), 0);

    time.advance(1);
    assert_eq!(bridge.poll_unblock(), 1);

    bridge.block_address(&address, None);
    assert_eq!(bridge.records(&make_peer(1))[0].back_off, Duration::from_millis(2));

    // Blocking an already blocked address is ignored
    bridge.block_address(&address, None);
    assert_eq!(bridge.records(&make_peer(1))[0].back_off, Duration::from_millis(2));

    let calls = route.take();
    assert_eq!(
        calls.iter().filter(|c| matches!(c, RouteCall::Destroy(_))).count(),
        2
    );
}

#[test]
fn test_reset_block_restarts_back_off() {
    let (bridge, _, time) = setup();
    let address = Address::new(make_peer(1), "udp", b"a".to_vec());
    bridge.add_address(&address, AddressProperties::default());

    for _ in 0..3 {
        bridge.block_address(&address, None);
        time.advance(10);
        bridge.poll_unblock();
    }
    assert_eq!(bridge.records(&make_peer(1))[0].back_off, Duration::from_millis(4));

    bridge.reset_block(&address, None);
    bridge.block_address(&address, None);
    assert_eq!(bridge.records(&make_peer(1))[0].back_off, Duration::from_millis(1));
}

#[test]
fn test_suggestions_forwarded() {
    let (bridge, route, _) = setup();
    bridge.request_suggestions(&make_peer(1));
    bridge.request_suggestions(&make_peer(2));
    bridge.cancel_suggestions(&make_peer(1));
    assert_eq!(route.suggested(), vec![make_peer(2)]);

    bridge.reset_backoff(&make_peer(2));
    assert!(route.take().contains(&RouteCall::ResetBackoff(make_peer(2))));
}
