//! Tests for AddressValidationService

use super::*;
use crate::domain::{PongRejectReason, ValidationConfig, ValidationError};
use crate::ports::{AddressValidationApi, ValidationMessageHandler, ValidationPorts};
use shared_crypto::{PeerKeyPair, PeerPublicKey, PeerSignature, SignaturePurpose};
use shared_types::testing::{
    AdmissionMode, ControllableTimeSource, RecordingNotifier, RecordingPeerInfo,
    RecordingRegistry, RecordingTransport, RegistryCall, ScriptedAdmission,
};
use shared_types::{
    Address, ClientEvent, HelloEntry, HelloMessage, NetworkType, PingMessage, PongMessage,
    SessionId, TimeSource, Timestamp, ValidationState, Verdict, WireMessage,
};
use std::sync::Arc;
use std::time::Duration;

const START_MS: u64 = 1_000_000;
const OWN_RAW: &[u8] = b"192.0.2.1:2086";

struct Harness {
    service: AddressValidationService,
    transport: Arc<RecordingTransport>,
    admission: Arc<ScriptedAdmission>,
    registry: Arc<RecordingRegistry>,
    notifier: Arc<RecordingNotifier>,
    peerinfo: Arc<RecordingPeerInfo>,
    time: Arc<ControllableTimeSource>,
}

fn setup_with(config: ValidationConfig, transport: RecordingTransport) -> Harness {
    let transport = Arc::new(transport);
    let admission = Arc::new(ScriptedAdmission::new(AdmissionMode::AllowAll));
    let registry = Arc::new(RecordingRegistry::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let peerinfo = Arc::new(RecordingPeerInfo::new());
    let time = Arc::new(ControllableTimeSource::new(START_MS));
    let ports = ValidationPorts {
        transport: transport.clone(),
        admission: admission.clone(),
        registry: registry.clone(),
        notifier: notifier.clone(),
        peerinfo: peerinfo.clone(),
        time: time.clone(),
    };
    let service = AddressValidationService::new(config, local_keys(), ports);
    Harness {
        service,
        transport,
        admission,
        registry,
        notifier,
        peerinfo,
        time,
    }
}

fn setup() -> Harness {
    setup_with(ValidationConfig::for_testing(), RecordingTransport::new())
}

fn local_keys() -> PeerKeyPair {
    PeerKeyPair::from_seed([1; 32])
}

fn remote_keys() -> PeerKeyPair {
    PeerKeyPair::from_seed([2; 32])
}

fn remote_address(keys: &PeerKeyPair, port: u16) -> Address {
    Address::new(keys.peer_id(), "udp", format!("192.0.2.2:{port}").into_bytes())
}

fn hello_for(addresses: &[Address], expiration: Timestamp) -> HelloMessage {
    HelloMessage {
        peer: addresses[0].peer,
        entries: addresses
            .iter()
            .map(|a| HelloEntry {
                transport: a.transport.clone(),
                raw: a.raw.clone(),
                expiration,
            })
            .collect(),
    }
}

fn make_pong(keys: &PeerKeyPair, challenge: u32, address: &Address, expiration: Timestamp) -> PongMessage {
    let body = PongMessage::build_signed_body(expiration, &address.transport, &address.raw);
    let (signature, size) = keys.sign_purpose(SignaturePurpose::PongOwn, &body);
    PongMessage {
        challenge,
        signature: *signature.as_bytes(),
        purpose_size: size,
        purpose: SignaturePurpose::PongOwn.code(),
        expiration,
        transport: address.transport.clone(),
        raw: address.raw.clone(),
    }
}

fn take_pings(transport: &RecordingTransport) -> Vec<(Address, PingMessage)> {
    transport
        .take_messages()
        .into_iter()
        .filter_map(|(address, _, message)| match message {
            WireMessage::Ping(ping) => Some((address, ping)),
            _ => None,
        })
        .collect()
}

fn take_pongs(transport: &RecordingTransport) -> Vec<(Address, SessionId, PongMessage)> {
    transport
        .take_messages()
        .into_iter()
        .filter_map(|(address, session, message)| match message {
            WireMessage::Pong(pong) => Some((address, session, pong)),
            _ => None,
        })
        .collect()
}

fn far_future(h: &Harness) -> Timestamp {
    h.time.now().saturating_add(Duration::from_secs(24 * 3600))
}

/// HELLO for one remote address; returns the address and the PING sent.
fn learn_one(h: &Harness) -> (Address, PingMessage) {
    let address = remote_address(&remote_keys(), 2086);
    assert_eq!(h.service.handle_hello(&hello_for(&[address.clone()], far_future(h))), 1);
    let mut pings = take_pings(&h.transport);
    assert_eq!(pings.len(), 1);
    let (to, ping) = pings.remove(0);
    assert_eq!(to, address);
    (address, ping)
}

/// Learn one address and answer its PING after 40 ms.
fn validate_one(h: &Harness) -> (Address, PongMessage) {
    let (address, ping) = learn_one(h);
    h.time.advance(Duration::from_millis(40));
    let pong = make_pong(&remote_keys(), ping.challenge, &address, far_future(h));
    h.service.handle_pong(&address.peer, &pong).unwrap();
    (address, pong)
}

// =============================================================================
// TEST GROUP 1: Learning addresses
// =============================================================================

#[test]
fn test_hello_creates_entry_and_pings() {
    let h = setup();
    let (address, ping) = learn_one(&h);

    assert_eq!(ping.target, address.peer);
    assert_eq!(
        ping.address,
        Some((address.transport.clone(), address.raw.clone()))
    );
    let entry = h.service.entry(&address).unwrap();
    assert!(entry.expecting_pong);
    assert_eq!(entry.valid_until, Timestamp::ZERO);
    assert_eq!(entry.state, ValidationState::New);
    assert_eq!(h.service.pings_in_flight(), 1);
    assert!(h.registry.calls().is_empty());
}

#[test]
fn test_ping_carries_our_hello() {
    let h = setup();
    h.service.add_own_address("udp", OWN_RAW);
    let address = remote_address(&remote_keys(), 2086);
    h.service
        .handle_hello(&hello_for(&[address], far_future(&h)));

    let messages = h.transport.take_messages();
    let WireMessage::Hello(hello) = &messages[0].2 else {
        panic!("expected HELLO first, got {:?}", messages[0].2);
    };
    assert_eq!(hello.peer, local_keys().peer_id());
    assert_eq!(hello.entries.len(), 1);
    assert!(matches!(messages[1].2, WireMessage::Ping(_)));
}

#[test]
fn test_hello_skips_own_peer_and_expired_entries() {
    let h = setup();
    let own = Address::new(local_keys().peer_id(), "udp", OWN_RAW.to_vec());
    assert_eq!(h.service.handle_hello(&hello_for(&[own], far_future(&h))), 0);

    let address = remote_address(&remote_keys(), 2086);
    let expired = hello_for(&[address], h.time.now());
    assert_eq!(h.service.handle_hello(&expired), 0);
    assert!(h.service.entries().is_empty());
    assert!(h.transport.take_sent().is_empty());
}

#[test]
fn test_repeated_hello_does_not_ping_twice() {
    let h = setup();
    let (address, _) = learn_one(&h);
    assert_eq!(
        h.service.handle_hello(&hello_for(&[address], far_future(&h))),
        1
    );
    assert!(take_pings(&h.transport).is_empty());
    assert_eq!(h.service.entries().len(), 1);
}

#[test]
fn test_handle_address_from_peerinfo() {
    let h = setup();
    let address = remote_address(&remote_keys(), 2086);
    assert!(!h.service.handle_address(&address, h.time.now()));
    assert!(h.service.handle_address(&address, far_future(&h)));
    assert_eq!(take_pings(&h.transport).len(), 1);

    let inbound = Address::inbound(address.peer, "udp", b"198.51.100.7:4000".to_vec());
    assert!(!h.service.handle_address(&inbound, far_future(&h)));
}

// =============================================================================
// TEST GROUP 2: PONG handling
// =============================================================================

#[test]
fn test_valid_pong_validates_address() {
    let h = setup();
    let start = h.time.now();
    let (address, _) = validate_one(&h);
    let now = h.time.now();

    let entry = h.service.entry(&address).unwrap();
    assert!(!entry.expecting_pong);
    assert_eq!(
        entry.valid_until,
        now.saturating_add(Duration::from_secs(12 * 3600))
    );
    assert_eq!(entry.latency, Some(Duration::from_millis(40)));
    assert_eq!(entry.last_validation, start);
    assert_eq!(entry.state, ValidationState::QualityCostUpdated);
    assert_eq!(h.service.pings_in_flight(), 0);
    assert_eq!(h.service.get_latency(&address), Some(Duration::from_millis(40)));

    assert_eq!(
        h.registry.take(),
        vec![RegistryCall::AddAddress(
            address.clone(),
            shared_types::AddressProperties {
                delay: Duration::from_millis(20),
                network: NetworkType::Lan,
                ..Default::default()
            }
        )]
    );
    assert_eq!(h.peerinfo.stored(), vec![(address, entry.valid_until)]);
}

#[test]
fn test_pong_without_ping_is_rejected() {
    let h = setup();
    let (address, pong) = validate_one(&h);

    // Same PONG again: nothing outstanding
    assert_eq!(
        h.service.handle_pong(&address.peer, &pong),
        Err(ValidationError::PongRejected(PongRejectReason::NotExpected))
    );

    let unknown = remote_address(&remote_keys(), 9999);
    let pong = make_pong(&remote_keys(), 1, &unknown, far_future(&h));
    assert_eq!(
        h.service.handle_pong(&unknown.peer, &pong),
        Err(ValidationError::PongRejected(PongRejectReason::UnknownAddress))
    );
}

#[test]
fn test_pong_with_wrong_challenge_is_rejected() {
    let h = setup();
    let (address, ping) = learn_one(&h);
    let pong = make_pong(
        &remote_keys(),
        ping.challenge.wrapping_add(1),
        &address,
        far_future(&h),
    );
    assert_eq!(
        h.service.handle_pong(&address.peer, &pong),
        Err(ValidationError::PongRejected(PongRejectReason::ChallengeMismatch))
    );
    assert!(h.service.entry(&address).unwrap().expecting_pong);
}

#[test]
fn test_pong_signed_by_someone_else_is_rejected() {
    let h = setup();
    let (address, ping) = learn_one(&h);
    let impostor = PeerKeyPair::from_seed([3; 32]);
    let pong = make_pong(&impostor, ping.challenge, &address, far_future(&h));
    assert_eq!(
        h.service.handle_pong(&address.peer, &pong),
        Err(ValidationError::PongRejected(PongRejectReason::BadSignature))
    );
    assert_eq!(h.service.entry(&address).unwrap().valid_until, Timestamp::ZERO);
}

#[test]
fn test_pong_with_wrong_purpose_is_rejected() {
    let h = setup();
    let (address, ping) = learn_one(&h);
    let expiration = far_future(&h);
    let body = PongMessage::build_signed_body(expiration, &address.transport, &address.raw);
    let (signature, size) = remote_keys().sign_purpose(SignaturePurpose::Disconnect, &body);
    let pong = PongMessage {
        challenge: ping.challenge,
        signature: *signature.as_bytes(),
        purpose_size: size,
        purpose: SignaturePurpose::Disconnect.code(),
        expiration,
        transport: address.transport.clone(),
        raw: address.raw.clone(),
    };
    assert_eq!(
        h.service.handle_pong(&address.peer, &pong),
        Err(ValidationError::PongRejected(PongRejectReason::BadSignature))
    );
}

#[test]
fn test_expired_pong_is_rejected() {
    let h = setup();
    let (address, ping) = learn_one(&h);
    let pong = make_pong(&remote_keys(), ping.challenge, &address, h.time.now());
    assert_eq!(
        h.service.handle_pong(&address.peer, &pong),
        Err(ValidationError::PongRejected(PongRejectReason::Expired))
    );
}

/// Run the next revalidation of a freshly validated entry and return its
/// PING. The first round ran in the unvalidated tier (30 min plus jitter).
fn next_ping(h: &Harness) -> PingMessage {
    h.time.advance(Duration::from_secs(61 * 60));
    h.service.poll();
    let mut pings = take_pings(&h.transport);
    assert_eq!(pings.len(), 1);
    pings.remove(0).1
}

#[test]
fn test_cached_signature_still_checks_expiration() {
    let h = setup();
    let (address, first) = validate_one(&h);
    let ping = next_ping(&h);

    // Byte-identical signature, but its expiration has passed by now
    let mut replay = first.clone();
    replay.challenge = ping.challenge;
    h.time.advance(Duration::from_secs(24 * 3600));
    assert_eq!(
        h.service.handle_pong(&address.peer, &replay),
        Err(ValidationError::PongRejected(PongRejectReason::Expired))
    );
}

#[test]
fn test_cached_signature_with_later_expiration_is_verified() {
    let h = setup();
    let (address, first) = validate_one(&h);
    let ping = next_ping(&h);

    // Same signature, expiration pushed a year past what was signed
    let mut forged = first.clone();
    forged.challenge = ping.challenge;
    forged.expiration = first
        .expiration
        .saturating_add(Duration::from_secs(365 * 24 * 3600));
    assert_eq!(
        h.service.handle_pong(&address.peer, &forged),
        Err(ValidationError::PongRejected(PongRejectReason::BadSignature))
    );

    // The honest replay still counts and leaves the signed expiration alone
    let mut replay = first.clone();
    replay.challenge = ping.challenge;
    h.service.handle_pong(&address.peer, &replay).unwrap();
    assert!(!h.service.entry(&address).unwrap().expecting_pong);
}

#[test]
fn test_validity_never_shrinks_on_revalidation() {
    let h = setup();
    let (address, first) = validate_one(&h);
    let before = h.service.entry(&address).unwrap().valid_until;

    let ping = next_ping(&h);
    let mut again = first.clone();
    again.challenge = ping.challenge;
    h.service.handle_pong(&address.peer, &again).unwrap();

    let after = h.service.entry(&address).unwrap();
    assert!(after.valid_until >= before);
    assert_eq!(
        h.registry
            .take()
            .into_iter()
            .filter(|c| matches!(c, RegistryCall::AddAddress(..)))
            .count(),
        1
    );
}

// =============================================================================
// TEST GROUP 3: Answering PINGs
// =============================================================================

fn ping_to_us(challenge: u32, address: Option<&[u8]>) -> PingMessage {
    PingMessage {
        challenge,
        target: local_keys().peer_id(),
        address: address.map(|raw| ("udp".to_string(), raw.to_vec())),
    }
}

fn own_setup() -> Harness {
    let h = setup();
    h.service.add_own_address("udp", OWN_RAW);
    h.transport.add_own_address("udp", OWN_RAW);
    h
}

#[test]
fn test_pong_signature_verifies_and_is_cached() {
    let h = own_setup();
    let sender = remote_address(&remote_keys(), 2086);
    let session = SessionId::new(7);

    h.service
        .handle_ping(&sender.peer, &ping_to_us(11, Some(OWN_RAW)), &sender, Some(session))
        .unwrap();
    let pongs = take_pongs(&h.transport);
    assert_eq!(pongs.len(), 1);
    let (to, sent_on, first) = &pongs[0];
    assert_eq!(*to, sender);
    assert_eq!(*sent_on, session);
    assert_eq!(first.challenge, 11);
    assert_eq!(first.raw, OWN_RAW);

    let key = PeerPublicKey::from_peer(&local_keys().peer_id()).unwrap();
    key.verify_purpose(
        SignaturePurpose::PongOwn,
        first.purpose_size,
        first.purpose,
        &first.signed_body(),
        &PeerSignature::from_bytes(first.signature),
    )
    .unwrap();

    h.time.advance(Duration::from_secs(60));
    h.service
        .handle_ping(&sender.peer, &ping_to_us(12, Some(OWN_RAW)), &sender, Some(session))
        .unwrap();
    let second = take_pongs(&h.transport).remove(0).2;
    assert_eq!(second.signature, first.signature);
    assert_eq!(second.expiration, first.expiration);
    assert_eq!(second.challenge, 12);
}

#[test]
fn test_ping_rejections() {
    let h = own_setup();
    let sender = remote_address(&remote_keys(), 2086);
    let session = Some(SessionId::new(7));

    let mut not_for_us = ping_to_us(1, Some(OWN_RAW));
    not_for_us.target = remote_keys().peer_id();
    assert_eq!(
        h.service.handle_ping(&sender.peer, &not_for_us, &sender, session),
        Err(ValidationError::NotForUs)
    );

    assert_eq!(
        h.service
            .handle_ping(&sender.peer, &ping_to_us(1, Some(b"203.0.113.9:1")), &sender, session),
        Err(ValidationError::AddressNotOwned("udp".into()))
    );

    assert_eq!(
        h.service
            .handle_ping(&sender.peer, &ping_to_us(1, None), &sender, None),
        Err(ValidationError::NoSession)
    );
    assert!(take_pongs(&h.transport).is_empty());
}

#[test]
fn test_plugin_must_confirm_own_address() {
    let h = setup();
    h.service.add_own_address("udp", OWN_RAW);
    let sender = remote_address(&remote_keys(), 2086);
    assert_eq!(
        h.service.handle_ping(
            &sender.peer,
            &ping_to_us(1, Some(OWN_RAW)),
            &sender,
            Some(SessionId::new(7))
        ),
        Err(ValidationError::AddressNotOwned("udp".into()))
    );
}

#[test]
fn test_session_ping_signs_using_purpose() {
    let h = setup();
    let sender = Address::inbound(remote_keys().peer_id(), "udp", b"198.51.100.7:4000".to_vec());
    h.service
        .handle_ping(&sender.peer, &ping_to_us(5, None), &sender, Some(SessionId::new(9)))
        .unwrap();
    let pong = take_pongs(&h.transport).remove(0).2;
    assert_eq!(pong.purpose, SignaturePurpose::PongUsing.code());
    assert_eq!(pong.raw, sender.raw);
    // Inbound senders are not validated back
    assert!(h.service.entries().is_empty());
}

#[test]
fn test_pong_falls_back_to_known_addresses() {
    let h = own_setup();
    let (known, _) = learn_one(&h);
    let arrival = SessionId::new(7);
    h.transport.fail_session(arrival);

    let inbound = Address::inbound(known.peer, "udp", b"198.51.100.7:4000".to_vec());
    h.service
        .handle_ping(&known.peer, &ping_to_us(3, Some(OWN_RAW)), &inbound, Some(arrival))
        .unwrap();
    let pongs = take_pongs(&h.transport);
    assert_eq!(pongs.len(), 1);
    assert_eq!(pongs[0].0, known);
}

#[test]
fn test_pong_undeliverable() {
    let h = setup_with(
        ValidationConfig::for_testing(),
        RecordingTransport::without_auto_sessions(),
    );
    h.service.add_own_address("udp", OWN_RAW);
    h.transport.add_own_address("udp", OWN_RAW);
    let sender = Address::inbound(remote_keys().peer_id(), "udp", b"198.51.100.7:4000".to_vec());
    let arrival = SessionId::new(7);
    h.transport.fail_session(arrival);

    assert_eq!(
        h.service
            .handle_ping(&sender.peer, &ping_to_us(3, Some(OWN_RAW)), &sender, Some(arrival)),
        Err(ValidationError::Undeliverable(
            shared_types::TransportError::SessionGone
        ))
    );
}

// =============================================================================
// TEST GROUP 4: Scheduling, pacing and admission
// =============================================================================

#[test]
fn test_pacing_above_fast_start_threshold() {
    // max_fds 4: three PINGs go out at once, the fourth waits 75 s
    let h = setup();
    let keys = remote_keys();
    let addresses: Vec<Address> = (1..=4).map(|p| remote_address(&keys, p)).collect();
    h.service
        .handle_hello(&hello_for(&addresses, far_future(&h)));
    assert_eq!(take_pings(&h.transport).len(), 3);
    assert_eq!(h.service.pings_in_flight(), 3);

    h.time.advance(Duration::from_secs(74));
    h.service.poll();
    assert!(take_pings(&h.transport).is_empty());

    h.time.advance(Duration::from_secs(1));
    h.service.poll();
    assert_eq!(take_pings(&h.transport).len(), 1);
}

#[test]
fn test_unanswered_ping_times_out() {
    let h = setup();
    let (address, ping) = learn_one(&h);
    h.time.advance(Duration::from_secs(30));
    h.service.poll();

    assert_eq!(h.service.pings_in_flight(), 0);
    assert!(!h.service.entry(&address).unwrap().expecting_pong);
    let late = make_pong(&remote_keys(), ping.challenge, &address, far_future(&h));
    assert_eq!(
        h.service.handle_pong(&address.peer, &late),
        Err(ValidationError::PongRejected(PongRejectReason::NotExpected))
    );
}

#[test]
fn test_revalidation_respects_block() {
    let h = setup();
    let (address, _) = validate_one(&h);

    // First round was unvalidated: blocked for 30 min
    h.time.advance(Duration::from_secs(14 * 60));
    h.service.poll();
    assert!(take_pings(&h.transport).is_empty());

    h.service.set_address_use(&address, true);
    assert!(h.service.entry(&address).unwrap().in_use);
    assert!(take_pings(&h.transport).is_empty());

    h.time.advance(Duration::from_secs(16 * 60));
    h.service.poll();
    assert_eq!(take_pings(&h.transport).len(), 1);
}

#[test]
fn test_set_address_use_unknown_is_ignored() {
    let h = setup();
    let address = remote_address(&remote_keys(), 2086);
    h.service.set_address_use(&address, true);
    assert!(h.service.entry(&address).is_none());
}

#[test]
fn test_pending_admission_then_allowed() {
    let h = setup();
    h.admission.set_mode(AdmissionMode::Pending);
    let address = remote_address(&remote_keys(), 2086);
    h.service
        .handle_hello(&hello_for(&[address.clone()], far_future(&h)));
    assert!(take_pings(&h.transport).is_empty());

    let (check, request) = h.admission.pending().remove(0);
    assert_eq!(request.address, Some(address.clone()));
    assert!(h.service.on_blacklist_verdict(check, Verdict::Allowed));
    assert_eq!(take_pings(&h.transport).len(), 1);
    assert!(!h.service.on_blacklist_verdict(check, Verdict::Allowed));
}

#[test]
fn test_denied_admission_sends_nothing() {
    let h = setup();
    h.admission.deny(remote_keys().peer_id(), Some("udp"));
    let address = remote_address(&remote_keys(), 2086);
    h.service
        .handle_hello(&hello_for(&[address.clone()], far_future(&h)));
    assert!(h.transport.take_sent().is_empty());
    assert!(!h.service.entry(&address).unwrap().expecting_pong);
}

// =============================================================================
// TEST GROUP 5: Garbage collection, stop and own addresses
// =============================================================================

#[test]
fn test_expired_entry_is_collected() {
    let h = setup();
    let (address, _) = validate_one(&h);
    h.registry.take();
    h.notifier.take();

    h.time.advance(Duration::from_secs(12 * 3600 + 1));
    h.service.poll();

    assert!(h.service.entry(&address).is_none());
    assert_eq!(h.registry.take(), vec![RegistryCall::Expire(address.clone())]);
    assert!(h
        .notifier
        .take()
        .contains(&ClientEvent::ValidationRemoved { address }));
}

#[test]
fn test_stop_drops_everything() {
    let h = setup();
    let (validated, _) = validate_one(&h);
    let other = remote_address(&remote_keys(), 3000);
    h.service
        .handle_hello(&hello_for(&[other], far_future(&h)));
    h.registry.take();

    assert_eq!(h.service.stop(), 2);
    assert!(h.service.entries().is_empty());
    assert_eq!(h.service.pings_in_flight(), 0);
    assert_eq!(h.registry.take(), vec![RegistryCall::Expire(validated)]);
}

#[test]
fn test_own_hello_lists_own_addresses() {
    let h = setup();
    assert!(h.service.add_own_address("udp", OWN_RAW));
    assert!(!h.service.add_own_address("udp", OWN_RAW));
    h.service.add_own_address("tcp", b"192.0.2.1:2087");

    let hello = h.service.own_hello();
    assert_eq!(hello.peer, local_keys().peer_id());
    assert_eq!(hello.entries.len(), 2);
    assert!(hello.entries.iter().all(|e| e.expiration
        == h.time.now().saturating_add(Duration::from_secs(12 * 3600))));

    assert!(h.service.remove_own_address("tcp", b"192.0.2.1:2087"));
    assert_eq!(h.service.own_hello().entries.len(), 1);
}
