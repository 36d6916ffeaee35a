//! # Blacklist Gate
//!
//! The admission gate seen from the network: a static denylist entry
//! silences validation and keeps handshakes from completing over the
//! denied transport, and policy clients decide every check while they are
//! connected.

#[cfg(test)]
mod tests {
    use crate::integration::network::{Network, TRANSPORT};
    use shared_crypto::PeerKeyPair;
    use shared_types::{ClientEvent, ConnectionState, WireMessage};
    use tc_01_blacklist::{BlacklistApi, BlacklistConfig, ClientId};
    use tc_03_address_validation::AddressValidationApi;
    use tc_04_neighbours::NeighbourApi;
    use transport_runtime::CoreConfig;

    const POLICY: ClientId = ClientId(1);

    /// Node 1 denies node 0 over the fabric transport.
    fn denying_network() -> Network {
        // Node seeds start at 1
        let denied = PeerKeyPair::from_seed([1; 32]).peer_id();
        Network::with_configs(vec![
            CoreConfig::default(),
            CoreConfig {
                blacklist: BlacklistConfig {
                    entries: vec![(denied, Some(TRANSPORT.to_string()))],
                },
                ..CoreConfig::default()
            },
        ])
    }

    /// Answer every query `node`'s policy client receives until none are
    /// left. Returns how many were answered.
    fn answer_all(network: &Network, node: usize, allowed: bool) -> usize {
        let mut answered = 0;
        loop {
            let queries = network.nodes[node].policy.take();
            if queries.is_empty() {
                return answered;
            }
            for query in queries {
                network.nodes[node]
                    .core
                    .on_policy_reply(query.client, query.check, allowed)
                    .unwrap();
                answered += 1;
            }
            network.run();
        }
    }

    fn reached(events: &[ClientEvent], state: ConnectionState) -> bool {
        events
            .iter()
            .any(|e| matches!(e, ClientEvent::NeighbourChanged { state: s, .. } if *s == state))
    }

    // =========================================================================
    // TEST GROUP 1: Static denylist
    // =========================================================================

    #[test]
    fn test_denied_address_is_never_pinged() {
        let network = denying_network();
        let a = network.nodes[0].address();

        network.learn(1, &a);
        assert!(network
            .messages(1, 0)
            .iter()
            .all(|m| !matches!(m, WireMessage::Ping(_))));
        assert!(network.nodes[1].core.validation().entry(&a).is_some());
    }

    #[test]
    fn test_denied_suggestion_never_sends_syn() {
        let network = denying_network();
        let (a, b) = (&network.nodes[0], &network.nodes[1]);

        // The peer-wide question passes; only the tcp address is denied
        b.core.connect(&a.peer()).unwrap();
        network.run();
        assert_eq!(
            b.core.neighbours().state_of(&a.peer()),
            Some(ConnectionState::InitAts)
        );

        network.suggest(1, &a.address(), None);
        network.run();
        assert!(!reached(&b.events(), ConnectionState::SynSent));
        assert_eq!(
            b.core.neighbours().state_of(&a.peer()),
            Some(ConnectionState::InitAts)
        );
    }

    #[test]
    fn test_denied_peer_cannot_dial_in() {
        let network = denying_network();
        let (a, b) = (&network.nodes[0], &network.nodes[1]);

        network.connect_pair(0, 1);

        assert!(!b.core.neighbours().is_connected(&a.peer()));
        assert!(!a.core.neighbours().is_connected(&b.peer()));
        assert!(network
            .messages(1, 0)
            .iter()
            .all(|m| !matches!(m, WireMessage::SynAck(_))));
    }

    // =========================================================================
    // TEST GROUP 2: Policy clients
    // =========================================================================

    #[test]
    fn test_policy_client_allows_whole_handshake() {
        let network = Network::new(2);
        let (a, b) = (&network.nodes[0], &network.nodes[1]);
        a.core.add_policy_client(POLICY).unwrap();

        // Validation waits for the client
        network.learn(0, &b.address());
        assert!(network.messages(0, 1).is_empty());
        let mut answered = answer_all(&network, 0, true);

        a.core.connect(&b.peer()).unwrap();
        network.run();
        answered += answer_all(&network, 0, true);

        // Validation, the connect request and the suggested address
        assert!(answered >= 3);
        assert!(a.core.neighbours().is_connected(&b.peer()));
        assert!(b.core.neighbours().is_connected(&a.peer()));
        assert_eq!(a.core.blacklist().stats().clients, 1);
    }

    #[test]
    fn test_policy_client_denial_stops_connect() {
        let network = Network::new(2);
        let (a, b) = (&network.nodes[0], &network.nodes[1]);
        a.core.add_policy_client(POLICY).unwrap();

        network.learn(0, &b.address());
        answer_all(&network, 0, false);
        assert!(network
            .messages(0, 1)
            .iter()
            .all(|m| !matches!(m, WireMessage::Ping(_))));

        a.core.connect(&b.peer()).unwrap();
        network.run();
        answer_all(&network, 0, false);
        assert_eq!(a.core.neighbours().state_of(&b.peer()), None);
    }

    #[test]
    fn test_client_leaving_releases_waiting_checks() {
        let network = Network::new(2);
        let (a, b) = (&network.nodes[0], &network.nodes[1]);
        a.core.add_policy_client(POLICY).unwrap();

        a.core.connect(&b.peer()).unwrap();
        let queries = a.policy.take();
        assert_eq!(queries.len(), 1);
        assert_eq!(a.core.neighbours().state_of(&b.peer()), None);

        // No client left: the waiting check is allowed
        a.core.remove_policy_client(POLICY).unwrap();
        network.run();
        assert_eq!(
            a.core.neighbours().state_of(&b.peer()),
            Some(ConnectionState::InitAts)
        );
        assert!(a
            .core
            .on_policy_reply(POLICY, queries[0].check, false)
            .is_err());
    }
}
