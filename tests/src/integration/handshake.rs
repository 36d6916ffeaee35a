//! # Handshake
//!
//! Two complete cores agree on a connection: the dialler validates the
//! target, route selection suggests the address, SYN goes out, the target
//! asks its own route selection for the inbound address, answers with
//! SYN_ACK, and the final ACK brings both sides to `Connected`.

#[cfg(test)]
mod tests {
    use crate::integration::network::{Network, SUGGESTED_BANDWIDTH};
    use shared_types::{ClientEvent, ConnectionState, PeerId, SynMessage, Timestamp, WireMessage};
    use std::time::Duration;
    use tc_04_neighbours::NeighbourApi;

    fn syn_timestamps(messages: &[WireMessage], ack: bool) -> Vec<Timestamp> {
        messages
            .iter()
            .filter_map(|m| match (m, ack) {
                (WireMessage::Syn(syn), false) | (WireMessage::SynAck(syn), true) => {
                    Some(syn.timestamp)
                }
                _ => None,
            })
            .collect()
    }

    fn connected(events: &[ClientEvent], peer: PeerId) -> bool {
        events.iter().any(|e| {
            matches!(e, ClientEvent::Connected { peer: p, bandwidth_out }
                if *p == peer && *bandwidth_out == SUGGESTED_BANDWIDTH)
        })
    }

    // =========================================================================
    // TEST GROUP 1: Liveness
    // =========================================================================

    #[test]
    fn test_dialler_and_target_both_connect() {
        let network = Network::new(2);
        let (a, b) = (&network.nodes[0], &network.nodes[1]);

        network.connect_pair(0, 1);

        assert_eq!(
            a.core.neighbours().state_of(&b.peer()),
            Some(ConnectionState::Connected)
        );
        assert_eq!(
            b.core.neighbours().state_of(&a.peer()),
            Some(ConnectionState::Connected)
        );
        assert!(connected(&a.events(), b.peer()));
        assert!(connected(&b.events(), a.peer()));

        // Exactly one SYN, one SYN_ACK, one ACK
        let forward = network.messages(0, 1);
        let back = network.messages(1, 0);
        assert_eq!(syn_timestamps(&forward, false).len(), 1);
        assert_eq!(syn_timestamps(&back, true).len(), 1);
        assert_eq!(forward.iter().filter(|m| **m == WireMessage::Ack).count(), 1);
    }

    #[test]
    fn test_simultaneous_connect_settles() {
        let network = Network::new(2);
        let (a, b) = (&network.nodes[0], &network.nodes[1]);
        network.learn(0, &b.address());
        network.learn(1, &a.address());

        a.core.connect(&b.peer()).unwrap();
        b.core.connect(&a.peer()).unwrap();
        network.run();

        assert!(a.core.neighbours().is_connected(&b.peer()));
        assert!(b.core.neighbours().is_connected(&a.peer()));
        assert_eq!(a.core.neighbours().len(), 1);
        assert_eq!(b.core.neighbours().len(), 1);
    }

    #[test]
    fn test_connect_to_self_refused() {
        let network = Network::new(1);
        let node = &network.nodes[0];
        assert!(node.core.connect(&node.peer()).is_err());
        assert!(node.core.neighbours().is_empty());
    }

    // =========================================================================
    // TEST GROUP 2: Timestamps and addresses
    // =========================================================================

    #[test]
    fn test_syn_ack_echoes_syn_timestamp() {
        let network = Network::new(2);
        network.connect_pair(0, 1);

        let syn = syn_timestamps(&network.messages(0, 1), false);
        let syn_ack = syn_timestamps(&network.messages(1, 0), true);
        assert_eq!(syn, vec![network.now()]);
        assert_eq!(syn_ack, syn);
    }

    #[test]
    fn test_each_side_records_the_other_endpoint() {
        let network = Network::new(2);
        let (a, b) = (&network.nodes[0], &network.nodes[1]);
        network.connect_pair(0, 1);

        let a_view = a.core.neighbours().info(&b.peer()).unwrap();
        let b_view = b.core.neighbours().info(&a.peer()).unwrap();
        assert!(a_view.address.unwrap().same_endpoint(&b.address()));
        // Node 1 validated node 0 from its HELLO and answers on that address
        assert_eq!(b_view.address, Some(a.address()));
        assert_eq!(a_view.bandwidth_out, SUGGESTED_BANDWIDTH);
    }

    // =========================================================================
    // TEST GROUP 3: Stale and late messages
    // =========================================================================

    #[test]
    fn test_stale_syn_ack_leaves_connection_alone() {
        let network = Network::new(2);
        let (a, b) = (&network.nodes[0], &network.nodes[1]);
        network.connect_pair(0, 1);
        network.clear_traffic();

        let session = network.session_of(0, &b.address()).unwrap();
        let stale = WireMessage::SynAck(SynMessage::new(Timestamp::from_millis(1)))
            .encode()
            .unwrap();
        a.core.on_receive(&b.address(), session, &stale);
        network.run();

        assert_eq!(
            a.core.neighbours().state_of(&b.peer()),
            Some(ConnectionState::Connected)
        );
        assert!(network.messages(0, 1).is_empty());
    }

    #[test]
    fn test_setup_times_out_without_answer() {
        let network = Network::new(2);
        let (a, b) = (&network.nodes[0], &network.nodes[1]);

        // Nothing validated, so route selection never suggests anything
        a.core.connect(&b.peer()).unwrap();
        network.run();
        assert_eq!(
            a.core.neighbours().state_of(&b.peer()),
            Some(ConnectionState::InitAts)
        );

        network.advance(Duration::from_secs(6));
        assert_eq!(a.core.neighbours().state_of(&b.peer()), None);
        assert!(a.events().iter().all(|e| !matches!(e, ClientEvent::Connected { .. })));
    }
}
