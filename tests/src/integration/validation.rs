//! # Address Validation
//!
//! PING/PONG between two complete cores: the prober learns an address,
//! the owner signs a PONG for it, and the prober reports the validated
//! address to route selection and the peer-info store. Signatures are
//! cached by the owner and never extend validity when replayed.

#[cfg(test)]
mod tests {
    use crate::integration::network::{Network, TRANSPORT};
    use shared_crypto::{PeerPublicKey, PeerSignature, SignaturePurpose};
    use shared_types::{Address, ClientEvent, PingMessage, PongMessage, WireMessage};
    use std::time::Duration;
    use tc_03_address_validation::AddressValidationApi;

    fn pongs(messages: Vec<WireMessage>) -> Vec<PongMessage> {
        messages
            .into_iter()
            .filter_map(|m| match m {
                WireMessage::Pong(pong) => Some(pong),
                _ => None,
            })
            .collect()
    }

    /// Network where node 0 has validated node 1's address.
    fn validated() -> Network {
        let network = Network::new(2);
        let target = network.nodes[1].address();
        network.learn(0, &target);
        network
    }

    /// Deliver a hand-made PING from node 0 to node 1 on node 1's inbound
    /// session.
    fn ping_node_1(network: &Network, challenge: u32, raw: Vec<u8>) {
        let (a, b) = (&network.nodes[0], &network.nodes[1]);
        let inbound = Address::inbound(a.peer(), TRANSPORT, a.address().raw);
        let session = network.session_of(1, &inbound).unwrap();
        let ping = WireMessage::Ping(PingMessage {
            challenge,
            target: b.peer(),
            address: Some((TRANSPORT.to_string(), raw)),
        });
        b.core.on_receive(&inbound, session, &ping.encode().unwrap());
        network.run();
    }

    // =========================================================================
    // TEST GROUP 1: Validation across two cores
    // =========================================================================

    #[test]
    fn test_learned_address_becomes_valid() {
        let network = validated();
        let (a, b) = (&network.nodes[0], &network.nodes[1]);

        let entry = a.core.validation().entry(&b.address()).unwrap();
        assert!(entry.valid_until > network.now());
        assert!(!entry.expecting_pong);
        assert_eq!(entry.latency, Some(Duration::ZERO));

        assert!(a
            .peerinfo
            .stored()
            .iter()
            .any(|(address, until)| *address == b.address() && *until == entry.valid_until));
        assert!(a.events().iter().any(|e| matches!(
            e,
            ClientEvent::ValidationChanged { address, .. } if *address == b.address()
        )));
    }

    #[test]
    fn test_hello_makes_validation_mutual() {
        let network = validated();
        let (a, b) = (&network.nodes[0], &network.nodes[1]);

        // The HELLO riding on node 0's PING advertised its own address
        let entry = b.core.validation().entry(&a.address()).unwrap();
        assert!(entry.valid_until > network.now());
    }

    #[test]
    fn test_pong_signature_verifies_with_owner_key() {
        let network = validated();
        let b = &network.nodes[1];

        let pong = pongs(network.messages(1, 0)).remove(0);
        assert_eq!(pong.transport, TRANSPORT);
        assert_eq!(pong.raw, b.address().raw);

        let key = PeerPublicKey::from_peer(&b.peer()).unwrap();
        key.verify_purpose(
            SignaturePurpose::PongOwn,
            pong.purpose_size,
            pong.purpose,
            &pong.signed_body(),
            &PeerSignature::from_bytes(pong.signature),
        )
        .unwrap();
    }

    // =========================================================================
    // TEST GROUP 2: Signature reuse and replay
    // =========================================================================

    #[test]
    fn test_second_ping_reuses_cached_signature() {
        let network = validated();
        let raw = network.nodes[1].address().raw;
        let first = pongs(network.messages(1, 0)).remove(0);
        network.clear_traffic();

        ping_node_1(&network, 77, raw);

        let second = pongs(network.messages(1, 0)).remove(0);
        assert_eq!(second.challenge, 77);
        assert_eq!(second.signature, first.signature);
        assert_eq!(second.expiration, first.expiration);
    }

    #[test]
    fn test_ping_for_foreign_address_gets_no_pong() {
        let network = validated();
        network.clear_traffic();

        ping_node_1(&network, 78, b"192.0.2.200:2086".to_vec());
        assert!(pongs(network.messages(1, 0)).is_empty());
    }

    #[test]
    fn test_replayed_pong_does_not_extend_validity() {
        let network = validated();
        let (a, b) = (&network.nodes[0], &network.nodes[1]);
        let before = a.core.validation().entry(&b.address()).unwrap();
        let pong = pongs(network.messages(1, 0)).remove(0);

        network.time.advance(Duration::from_secs(60));
        let session = network.session_of(0, &b.address()).unwrap();
        let replay = WireMessage::Pong(pong).encode().unwrap();
        a.core.on_receive(&b.address(), session, &replay);
        network.run();

        let after = a.core.validation().entry(&b.address()).unwrap();
        assert_eq!(after.valid_until, before.valid_until);
        assert_eq!(after.latency, before.latency);
    }

    #[test]
    fn test_revalidation_never_shortens_validity() {
        let network = validated();
        let (a, b) = (&network.nodes[0], &network.nodes[1]);
        let before = a.core.validation().entry(&b.address()).unwrap();

        network.advance(Duration::from_secs(31 * 60));

        let after = a.core.validation().entry(&b.address()).unwrap();
        assert!(after.valid_until >= before.valid_until);
    }
}
