//! Integration tests for networked multiplayer components
//!
//! These tests validate cross-component interactions and real network behavior.

use client::game::{ClientGameState, FrameOutcome};
use client::transport::{Transport, TransportConfig};
use server::game::GameState;
use server::network::{Server, ServerMessage};
use shared::input::{KEY_DOWN, KEY_S, KEY_UP, KEY_W};
use shared::{InputMessage, Packet, Ship, World, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout};
use tokio_test::{assert_err, assert_ok};

const START: u64 = 1_000_000;

/// PREDICTION AND RECONCILIATION TESTS
mod prediction_tests {
    use super::*;

    fn scripted_inputs() -> Vec<InputMessage> {
        vec![
            InputMessage::keystroke(KEY_W, true, START + 15, 1),
            InputMessage::bearing(60.0, START + 100, 2),
            InputMessage::bearing(75.0, START + 290, 3),
            InputMessage::keystroke(KEY_W, false, START + 400, 4),
            InputMessage::keystroke(KEY_S, true, START + 420, 5),
            InputMessage::bearing(300.0, START + 505, 6),
            InputMessage::keystroke(KEY_S, false, START + 800, 7),
            InputMessage::keystroke(KEY_UP, true, START + 830, 8),
        ]
    }

    fn assert_same_motion(predicted: &Ship, authoritative: &Ship) {
        assert_eq!(predicted.x.to_bits(), authoritative.x.to_bits(), "x");
        assert_eq!(predicted.y.to_bits(), authoritative.y.to_bits(), "y");
        assert_eq!(predicted.speed.to_bits(), authoritative.speed.to_bits(), "speed");
        assert_eq!(predicted.bearing.to_bits(), authoritative.bearing.to_bits(), "bearing");
        assert_eq!(predicted.bearing_goal, authoritative.bearing_goal);
        assert_eq!(predicted.accelerating_forward, authoritative.accelerating_forward);
        assert_eq!(predicted.accelerating_backward, authoritative.accelerating_backward);
    }

    /// Tests that the predicted local ship ends up exactly where the server puts it
    #[test]
    fn prediction_converges_to_server() {
        let mut server = GameState::new(START);
        let ship = server.add_player(1);
        let mut client = ClientGameState::new();
        client.enter_game(server.world.clone(), ship.id);

        let mut inputs = scripted_inputs().into_iter().peekable();
        for step in 1..=30u64 {
            let now = START + step * 45;

            while let Some(input) = inputs.next_if(|m| m.t <= now) {
                client.record_input(input.clone());
                let mut stamped = input;
                stamped.id = 1;
                server.queue_message(stamped);
            }

            for snapshot in server.catch_up(now) {
                client.push_snapshot(snapshot);
            }
            assert_eq!(client.frame(now), FrameOutcome::Ready);
        }

        let predicted_at = client.tick_time();
        server.catch_up(predicted_at + shared::SERVER_DELAY_MS);
        assert_eq!(server.world.t, predicted_at);

        let predicted = client.local_ship().unwrap();
        let authoritative = server.world.ship(1).unwrap();
        assert_same_motion(predicted, authoritative);
    }

    /// Tests that a snapshot acknowledging every input leaves nothing to replay
    #[test]
    fn acknowledged_inputs_are_dropped() {
        let mut server = GameState::new(START);
        server.add_player(1);
        let mut client = ClientGameState::new();
        client.enter_game(server.world.clone(), 1);

        for input in scripted_inputs() {
            client.record_input(input.clone());
            let mut stamped = input;
            stamped.id = 1;
            server.queue_message(stamped);
        }

        let now = START + 1500;
        for snapshot in server.catch_up(now) {
            client.push_snapshot(snapshot);
        }
        client.frame(now);

        assert!(client.pending_inputs().is_empty());
        assert_eq!(client.local_ship().unwrap().last_message, 8);
    }

    /// Tests that remote ships are shown where the server has them
    #[test]
    fn remote_ships_follow_the_server() {
        let mut server = GameState::new(START);
        server.add_player(1);
        server.add_player(2);
        let mut client = ClientGameState::new();
        client.enter_game(server.world.clone(), 1);

        server.queue_message(InputMessage {
            id: 2,
            ..InputMessage::keystroke(KEY_DOWN, true, START + 5, 1)
        });

        let mut last_snapshot = None;
        for step in 1..=20u64 {
            let now = START + step * 30;
            for snapshot in server.catch_up(now) {
                last_snapshot = Some(snapshot.clone());
                client.push_snapshot(snapshot);
            }
            client.frame(now);
        }

        let now = START + 600;
        let remote_time = now - shared::SERVER_DELAY_MS;
        assert_eq!(client.remote_tick_time(), remote_time);
        assert_eq!(server.world.t, remote_time);

        let seen = client.world().unwrap().ship(2).unwrap();
        let actual = server.world.ship(2).unwrap();
        assert_eq!(seen.x, actual.x);
        assert_eq!(seen.speed, actual.speed);
        assert!(last_snapshot.is_some());
    }
}

/// NETWORK PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    async fn start_server() -> (SocketAddr, tokio::sync::mpsc::UnboundedSender<ServerMessage>) {
        let mut server = Server::new("127.0.0.1:0", 4, Duration::from_secs(5))
            .await
            .expect("Failed to bind server");
        let addr = server.local_addr().unwrap();
        let shutdown = server.shutdown_handle();
        tokio::spawn(async move { server.run().await });
        (addr, shutdown)
    }

    async fn recv_packet(socket: &UdpSocket) -> Packet {
        let mut buf = vec![0u8; MAX_PACKET_SIZE];
        let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
            .await
            .expect("Timed out waiting for a packet")
            .unwrap();
        Packet::decode(&buf[..len]).unwrap()
    }

    async fn send_packet(socket: &UdpSocket, packet: &Packet, addr: SocketAddr) {
        socket.send_to(&packet.encode().unwrap(), addr).await.unwrap();
    }

    /// Tests joining, getting an input acknowledged, and leaving over real UDP
    #[tokio::test]
    async fn join_play_and_leave() {
        let (server_addr, shutdown) = start_server().await;
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        send_packet(
            &socket,
            &Packet::Connect {
                client_version: PROTOCOL_VERSION,
            },
            server_addr,
        )
        .await;

        let (world, ship) = match recv_packet(&socket).await {
            Packet::EnterGame { world, ship } => (world, ship),
            other => panic!("Expected EnterGame, got {:?}", other),
        };
        assert!(world.ship(ship.id).is_some());

        let message = InputMessage::keystroke(KEY_W, true, shared::timestamp_ms(), 1);
        send_packet(&socket, &Packet::PlayerMessage { message }, server_addr).await;

        let mut acknowledged: Option<World> = None;
        for _ in 0..30 {
            if let Packet::UpdateWorld { world: Some(world) } = recv_packet(&socket).await {
                if world.ship(ship.id).map_or(false, |s| s.last_message == 1) {
                    acknowledged = Some(world);
                    break;
                }
            }
        }
        let world = acknowledged.expect("Input was never acknowledged");
        assert!(world.ship(ship.id).unwrap().accelerating_forward);

        send_packet(&socket, &Packet::Disconnect, server_addr).await;
        loop {
            match recv_packet(&socket).await {
                Packet::UpdateWorld { world: None } => break,
                Packet::UpdateWorld { world: Some(_) } => continue,
                other => panic!("Unexpected packet: {:?}", other),
            }
        }

        shutdown.send(ServerMessage::Shutdown).unwrap();
    }

    /// Tests that connected clients are told to clear their world on shutdown
    #[tokio::test]
    async fn shutdown_notifies_clients() {
        let (server_addr, shutdown) = start_server().await;
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        send_packet(
            &socket,
            &Packet::Connect {
                client_version: PROTOCOL_VERSION,
            },
            server_addr,
        )
        .await;
        assert!(matches!(
            recv_packet(&socket).await,
            Packet::EnterGame { .. }
        ));

        shutdown.send(ServerMessage::Shutdown).unwrap();
        loop {
            match recv_packet(&socket).await {
                Packet::UpdateWorld { world: None } => break,
                Packet::UpdateWorld { world: Some(_) } => continue,
                other => panic!("Unexpected packet: {:?}", other),
            }
        }
    }

    /// Tests that a client speaking another protocol version is refused
    #[tokio::test]
    async fn version_mismatch_is_refused() {
        let (server_addr, shutdown) = start_server().await;
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        send_packet(
            &socket,
            &Packet::Connect {
                client_version: PROTOCOL_VERSION + 1,
            },
            server_addr,
        )
        .await;

        assert!(matches!(
            recv_packet(&socket).await,
            Packet::Disconnected { .. }
        ));
        shutdown.send(ServerMessage::Shutdown).unwrap();
    }

    /// Tests the client transport against a live server with simulated latency
    #[tokio::test]
    async fn transport_with_jitter_enters_game() {
        let (server_addr, shutdown) = start_server().await;

        let mut config = TransportConfig::new(server_addr);
        config.fake_ping_ms = 40;
        config.jitter_ms = 30;
        let mut transport = Transport::start(config).unwrap();
        assert!(transport.send(Packet::Connect {
            client_version: PROTOCOL_VERSION,
        }));

        let mut game = ClientGameState::new();
        let mut snapshots = 0;
        for _ in 0..200 {
            while let Some(packet) = transport.try_recv() {
                match packet {
                    Packet::EnterGame { world, ship } => game.enter_game(world, ship.id),
                    Packet::UpdateWorld { world: Some(world) } => {
                        if game.player_id().is_some() {
                            snapshots += 1;
                            game.push_snapshot(world);
                        }
                    }
                    other => panic!("Unexpected packet: {:?}", other),
                }
            }
            if snapshots >= 3 {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }

        assert!(game.player_id().is_some());
        assert!(snapshots >= 3);
        assert_eq!(game.frame(shared::timestamp_ms()), FrameOutcome::Ready);

        transport.shutdown();
        shutdown.send(ServerMessage::Shutdown).unwrap();
    }
}

/// MALFORMED INPUT TESTS
mod robustness_tests {
    use super::*;

    /// Tests malformed packet handling
    #[test]
    fn malformed_packet_handling() {
        let valid_data = assert_ok!(Packet::Connect { client_version: 1 }.encode());

        let truncated_data = &valid_data[..valid_data.len() / 2];
        assert_err!(Packet::decode(truncated_data), "truncated packet decoded");

        let mut corrupted_data = valid_data.clone();
        corrupted_data[0] = 0xFF;
        assert_err!(Packet::decode(&corrupted_data), "corrupted packet decoded");

        assert_err!(Packet::decode(&[]), "empty packet decoded");
    }

    /// Tests that a full world with many ships still fits in one datagram
    #[test]
    fn crowded_snapshot_fits_in_datagram() {
        let mut world = World::new(START);
        for id in 0..64 {
            world.players.push(Ship::at(id, 100.0 + id as f64 * 70.0, 300.0));
        }
        let data = Packet::UpdateWorld { world: Some(world) }.encode().unwrap();
        assert!(data.len() < MAX_PACKET_SIZE);
    }
}
