//! # Address Switching
//!
//! A connected neighbour probes an alternative address with SYN while the
//! primary keeps carrying traffic. A probe that is never answered falls
//! back to the primary; losing the primary mid-probe promotes the
//! alternative in one step, and the neighbour stays connected throughout.

#[cfg(test)]
mod tests {
    use crate::integration::network::Network;
    use shared_types::{Address, ClientEvent, ConnectionState, WireMessage};
    use std::time::Duration;
    use tc_04_neighbours::NeighbourApi;

    /// Connected pair where node 0 has also validated a second address of
    /// node 1 and was just told to switch to it.
    fn probing() -> (Network, Address) {
        let network = Network::new(2);
        network.connect_pair(0, 1);
        let alternative = network.extra_endpoint(1, 0);
        network.learn(0, &alternative);
        network.nodes[0].events();
        network.clear_traffic();

        network.suggest(0, &alternative, None);
        network.run();
        (network, alternative)
    }

    fn disconnected(events: &[ClientEvent]) -> bool {
        events
            .iter()
            .any(|e| matches!(e, ClientEvent::Disconnected { .. }))
    }

    // =========================================================================
    // TEST GROUP 1: Probing
    // =========================================================================

    #[test]
    fn test_suggestion_while_connected_probes_alternative() {
        let (network, alternative) = probing();
        let (a, b) = (&network.nodes[0], &network.nodes[1]);

        assert_eq!(
            a.core.neighbours().state_of(&b.peer()),
            Some(ConnectionState::SwitchSynSent)
        );
        assert!(a.core.neighbours().is_connected(&b.peer()));
        let info = a.core.neighbours().info(&b.peer()).unwrap();
        assert_eq!(info.address, Some(b.address()));
        assert_ne!(info.address, Some(alternative));

        assert!(network
            .messages(0, 1)
            .iter()
            .any(|m| matches!(m, WireMessage::Syn(_))));
        assert!(!disconnected(&a.events()));
    }

    #[test]
    fn test_unanswered_probe_falls_back_to_primary() {
        let (network, _) = probing();
        let (a, b) = (&network.nodes[0], &network.nodes[1]);

        network.advance(Duration::from_secs(16));

        assert_eq!(
            a.core.neighbours().state_of(&b.peer()),
            Some(ConnectionState::Connected)
        );
        let info = a.core.neighbours().info(&b.peer()).unwrap();
        assert_eq!(info.address, Some(b.address()));
        assert!(!disconnected(&a.events()));
    }

    // =========================================================================
    // TEST GROUP 2: Link loss
    // =========================================================================

    #[test]
    fn test_primary_loss_promotes_alternative_atomically() {
        let (network, alternative) = probing();
        let (a, b) = (&network.nodes[0], &network.nodes[1]);

        let primary = network.session_of(0, &b.address()).unwrap();
        assert!(network.sever(0, primary));
        network.run();

        assert_eq!(
            a.core.neighbours().state_of(&b.peer()),
            Some(ConnectionState::ReconnectSent)
        );
        let info = a.core.neighbours().info(&b.peer()).unwrap();
        assert_eq!(info.address, Some(alternative));
        assert!(a.core.neighbours().is_connected(&b.peer()));
        assert!(!disconnected(&a.events()));
    }

    #[test]
    fn test_primary_loss_without_probe_waits_for_address() {
        let network = Network::new(2);
        let (a, b) = (&network.nodes[0], &network.nodes[1]);
        network.connect_pair(0, 1);
        a.events();

        let primary = network.session_of(0, &b.address()).unwrap();
        assert!(network.sever(0, primary));
        network.run();

        let state = a.core.neighbours().state_of(&b.peer());
        // Route selection has nothing new to offer yet
        assert_eq!(state, Some(ConnectionState::ReconnectAts));
        assert!(a.core.neighbours().is_connected(&b.peer()));
        assert!(!disconnected(&a.events()));
    }
}
