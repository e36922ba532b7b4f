//! Server network layer: UDP transport, connection handling and the tick scheduler

use crate::client_manager::ClientManager;
use crate::game::GameState;
use log::{debug, error, info, warn};
use shared::{timestamp_ms, Packet, FRAME_MS, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Messages sent from network tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    Shutdown,
}

/// Messages sent from the main loop to the sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
        recipients: Vec<SocketAddr>,
    },
}

/// Owns the world and the connection registry; the only writer of either.
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: ClientManager,
    game_state: GameState,
    client_timeout: Duration,
    wakeups: u64,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: Option<mpsc::UnboundedReceiver<GameMessage>>,
}

impl Server {
    pub async fn new(
        addr: &str,
        max_clients: usize,
        client_timeout: Duration,
    ) -> Result<Self, BoxError> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: ClientManager::new(max_clients),
            game_state: GameState::new(timestamp_ms()),
            client_timeout,
            wakeups: 0,
            server_tx,
            server_rx,
            game_tx,
            game_rx: Some(game_rx),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Sending `ServerMessage::Shutdown` through this handle stops `run`.
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns the task that decodes datagrams and forwards them to the main loop
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_PACKET_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match Packet::decode(&buffer[..len]) {
                        Ok(packet) => {
                            if server_tx
                                .send(ServerMessage::PacketReceived { packet, addr })
                                .is_err()
                            {
                                break;
                            }
                        }
                        Err(e) => warn!("Failed to decode packet from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns the task that writes outgoing datagrams
    ///
    /// Every recipient gets an independent send, so one unreachable client
    /// never holds up the others or the simulation.
    fn spawn_network_sender(&mut self) {
        let Some(mut game_rx) = self.game_rx.take() else {
            return;
        };
        let socket = Arc::clone(&self.socket);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                let (packet, recipients) = match message {
                    GameMessage::SendPacket { packet, addr } => (packet, vec![addr]),
                    GameMessage::BroadcastPacket { packet, recipients } => (packet, recipients),
                };

                let data = match packet.encode() {
                    Ok(data) => data,
                    Err(e) => {
                        error!("Failed to encode packet: {}", e);
                        continue;
                    }
                };

                for addr in recipients {
                    if let Err(e) = socket.send_to(&data, addr).await {
                        error!("Failed to send to {}: {}", addr, e);
                    }
                }
            }
        });
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_packet(&self, packet: Packet) {
        let recipients = self.clients.client_addrs();
        if recipients.is_empty() {
            return;
        }
        if let Err(e) = self
            .game_tx
            .send(GameMessage::BroadcastPacket { packet, recipients })
        {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    /// Routes one decoded packet. Input is only queued, never applied here.
    fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect { client_version } => self.handle_connect(client_version, addr),

            Packet::PlayerMessage { mut message } => match self.clients.touch(addr) {
                Some(client_id) => {
                    message.id = client_id;
                    self.game_state.queue_message(message);
                }
                None => debug!("Dropping input from unknown address {}", addr),
            },

            Packet::Heartbeat => {
                self.clients.touch(addr);
            }

            Packet::Disconnect => {
                if let Some(client_id) = self.clients.find_client_by_addr(addr) {
                    self.drop_client(client_id, addr);
                }
            }

            _ => warn!("Unexpected packet type from client at {}", addr),
        }
    }

    fn handle_connect(&mut self, client_version: u32, addr: SocketAddr) {
        info!("Client connecting from {} (version: {})", addr, client_version);

        if client_version != PROTOCOL_VERSION {
            self.send_packet(
                Packet::Disconnected {
                    reason: format!("Protocol version mismatch, expected {}", PROTOCOL_VERSION),
                },
                addr,
            );
            return;
        }

        if let Some(existing_id) = self.clients.find_client_by_addr(addr) {
            info!("Replacing existing client {} from {}", existing_id, addr);
            self.clients.remove_client(existing_id);
            self.game_state.remove_player(existing_id);
        }

        match self.clients.add_client(addr) {
            Some(client_id) => {
                let ship = self.game_state.add_player(client_id);
                let world = self.game_state.world.clone();
                self.send_packet(Packet::EnterGame { world, ship }, addr);
            }
            None => self.send_packet(
                Packet::Disconnected {
                    reason: "Server full".to_string(),
                },
                addr,
            ),
        }
    }

    /// Removes the client and its ship in the same tick and tells it to clear its state.
    fn drop_client(&mut self, client_id: u32, addr: SocketAddr) {
        self.clients.remove_client(client_id);
        self.game_state.remove_player(client_id);
        self.send_packet(Packet::UpdateWorld { world: None }, addr);
    }

    fn check_timeouts(&mut self) {
        for (client_id, addr) in self.clients.check_timeouts(self.client_timeout) {
            info!("Client {} timed out", client_id);
            self.game_state.remove_player(client_id);
            self.send_packet(Packet::UpdateWorld { world: None }, addr);
        }
    }

    /// Tells every connected client to clear its world before the server stops.
    ///
    /// Written straight to the socket because the sender task dies with the
    /// runtime as soon as `run` returns.
    async fn notify_shutdown(&self) {
        let data = match (Packet::UpdateWorld { world: None }).encode() {
            Ok(data) => data,
            Err(e) => {
                error!("Failed to encode shutdown notice: {}", e);
                return;
            }
        };

        for addr in self.clients.client_addrs() {
            if let Err(e) = self.socket.send_to(&data, addr).await {
                warn!("Failed to notify {} of shutdown: {}", addr, e);
            }
        }
    }

    /// Catches the simulation up to `now` and broadcasts the snapshots it produced.
    fn run_frames(&mut self, now: u64) {
        for world in self.game_state.catch_up(now) {
            self.broadcast_packet(Packet::UpdateWorld { world: Some(world) });
        }

        self.wakeups += 1;
        if self.wakeups % 60 == 0 && !self.clients.is_empty() {
            debug!(
                "t={} ({}ms behind wall clock): {} clients, {} queued inputs",
                self.game_state.world.t,
                now.saturating_sub(self.game_state.world.t),
                self.clients.len(),
                self.game_state.pending_len()
            );
        }
    }

    /// Main server loop
    ///
    /// Packets and timer wake-ups are handled one at a time on the calling
    /// task. Each frame-period wake-up runs the bounded catch-up loop and then
    /// yields back to the runtime.
    pub async fn run(&mut self) -> Result<(), BoxError> {
        self.spawn_network_receiver();
        self.spawn_network_sender();

        let mut tick_interval = interval(Duration::from_millis(FRAME_MS));
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut timeout_interval = interval(Duration::from_secs(1));

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr);
                        }
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            self.notify_shutdown().await;
                            break;
                        }
                    }
                }

                _ = tick_interval.tick() => {
                    self.run_frames(timestamp_ms());
                }

                _ = timeout_interval.tick() => {
                    self.check_timeouts();
                }
            }
        }

        Ok(())
    }
}
