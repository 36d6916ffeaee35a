//! # Driven Cores
//!
//! A network core running behind the tokio driver: inputs submitted
//! through the handle reach the core in order, and shutting the driver
//! down disconnects every neighbour.

#[cfg(test)]
mod tests {
    use crate::integration::network::Network;
    use shared_types::ConnectionState;
    use std::time::Duration;
    use tc_04_neighbours::NeighbourApi;
    use transport_runtime::{CoreDriver, CoreInput};

    async fn wait_for_state(
        network: &Network,
        node: usize,
        peer: usize,
        state: ConnectionState,
    ) -> bool {
        let target = network.nodes[peer].peer();
        for _ in 0..100 {
            if network.nodes[node].core.neighbours().state_of(&target) == Some(state) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_connect_through_driver_then_shutdown() {
        let network = Network::new(2);
        let core = network.nodes[0].core.clone();
        let (handle, task) = CoreDriver::spawn(core.clone(), Duration::from_millis(10));

        assert!(
            handle
                .submit(CoreInput::Connect(network.nodes[1].peer()))
                .await
        );
        assert!(wait_for_state(&network, 0, 1, ConnectionState::InitAts).await);

        handle.shutdown();
        task.await.unwrap();
        assert!(core.neighbours().is_empty());

        // The driver is gone; nothing more is accepted
        assert!(!handle.submit(CoreInput::Connect(network.nodes[1].peer())).await);
    }

    #[tokio::test]
    async fn test_connected_pair_torn_down_by_driver() {
        let network = Network::new(2);
        network.connect_pair(0, 1);
        let core = network.nodes[0].core.clone();
        let (handle, task) = CoreDriver::spawn(core.clone(), Duration::from_millis(10));

        handle.shutdown();
        task.await.unwrap();
        network.run();

        assert!(core.neighbours().is_empty());
        let b = &network.nodes[1];
        assert!(!b
            .core
            .neighbours()
            .is_connected(&network.nodes[0].peer()));
    }
}
