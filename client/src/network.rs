//! Client session: joins the server, routes packets, and drives each frame

use crate::game::ClientGameState;
use crate::input::InputManager;
use crate::rendering::{RenderConfig, Renderer};
use crate::transport::{BoxError, Transport, TransportConfig};
use log::{debug, info, warn};
use macroquad::prelude::*;
use shared::{timestamp_ms, Packet, PROTOCOL_VERSION};

/// How often `Connect` is repeated until the server lets us in.
pub const CONNECT_RETRY_MS: u64 = 1000;

/// Snapshots arrive every 120ms while in a game. This much silence means the
/// server is gone and the session is treated as a forced disconnect.
pub const SERVER_SILENCE_MS: u64 = 3000;

pub struct Client {
    transport: Transport,
    game_state: ClientGameState,
    input_manager: InputManager,
    renderer: Renderer,

    fake_ping_ms: u64,
    jitter_ms: u64,
    last_connect_attempt: Option<u64>,
    last_server_packet: Option<u64>,
    status: String,
    debug: bool,
}

impl Client {
    pub fn new(server_addr: &str, fake_ping_ms: u64, jitter_ms: u64) -> Result<Self, BoxError> {
        let mut config = TransportConfig::new(server_addr.parse()?);
        config.fake_ping_ms = fake_ping_ms;
        config.jitter_ms = jitter_ms;

        Ok(Client {
            transport: Transport::start(config)?,
            game_state: ClientGameState::new(),
            input_manager: InputManager::new(),
            renderer: Renderer::new(),
            fake_ping_ms,
            jitter_ms,
            last_connect_attempt: None,
            last_server_packet: None,
            status: "Connecting...".to_string(),
            debug: false,
        })
    }

    pub fn game_state(&self) -> &ClientGameState {
        &self.game_state
    }

    pub fn in_game(&self) -> bool {
        self.game_state.player_id().is_some()
    }

    /// Sends `Connect` if we are not in a game and the last attempt is old enough.
    fn maybe_connect(&mut self, now: u64) {
        if self.in_game() {
            return;
        }
        if let Some(last) = self.last_connect_attempt {
            if now < last + CONNECT_RETRY_MS {
                return;
            }
        }
        self.last_connect_attempt = Some(now);
        debug!("Sending connect request");
        self.transport.send(Packet::Connect {
            client_version: PROTOCOL_VERSION,
        });
    }

    fn poll_network(&mut self, now: u64) {
        while let Some(packet) = self.transport.try_recv() {
            self.last_server_packet = Some(now);
            self.handle_packet(packet);
        }
    }

    /// Drops the session when the server has stopped talking to us.
    ///
    /// A lost `UpdateWorld { world: None }` or a server that died without
    /// saying goodbye would otherwise leave the client predicting forever.
    fn check_server_silence(&mut self, now: u64) {
        if !self.in_game() {
            return;
        }
        let Some(last) = self.last_server_packet else {
            self.last_server_packet = Some(now);
            return;
        };
        if now < last + SERVER_SILENCE_MS {
            return;
        }

        warn!("No packets from the server for {}ms, reconnecting", now - last);
        self.game_state.disconnect();
        self.status = "Server not responding, reconnecting...".to_string();
        self.last_connect_attempt = None;
        self.last_server_packet = None;
    }

    fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::EnterGame { world, ship } => {
                info!("Entered game as ship {}", ship.id);
                self.input_manager.reset();
                self.game_state.enter_game(world, ship.id);
                self.status.clear();
            }

            Packet::UpdateWorld { world: Some(world) } => {
                if self.in_game() {
                    self.game_state.push_snapshot(world);
                }
            }

            Packet::UpdateWorld { world: None } => {
                warn!("Server dropped us, waiting to reconnect");
                self.game_state.disconnect();
                self.status = "Disconnected, reconnecting...".to_string();
                self.last_connect_attempt = None;
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.game_state.disconnect();
                self.status = format!("Disconnected: {}", reason);
            }

            _ => {
                warn!("Unexpected packet type");
            }
        }
    }

    /// Sends each new input to the server and keeps it for replay.
    fn handle_input(&mut self) {
        let messages = self.input_manager.update();
        if !self.in_game() {
            return;
        }

        for message in messages {
            self.game_state.record_input(message.clone());
            self.transport.send(Packet::PlayerMessage { message });
        }
    }

    fn render(&mut self) {
        let config = RenderConfig {
            player_id: self.game_state.player_id(),
            fake_ping_ms: self.fake_ping_ms,
            jitter_ms: self.jitter_ms,
            buffered_snapshots: self.game_state.buffered_snapshots(),
            pending_inputs: self.game_state.pending_inputs().len(),
            debug: self.debug,
        };

        match self.game_state.view() {
            Some((world, ship)) => self.renderer.render(world, ship, &config),
            None => {
                let status = if self.status.is_empty() {
                    "Waiting for the world..."
                } else {
                    self.status.as_str()
                };
                self.renderer.draw_waiting(status);
            }
        }
    }

    /// Runs until the window asks to close or Escape is pressed.
    pub async fn run(&mut self) -> Result<(), BoxError> {
        info!("Starting client, transport on {}", self.transport.local_addr());

        loop {
            if is_key_pressed(KeyCode::Escape) {
                break;
            }
            if is_key_pressed(KeyCode::F3) {
                self.debug = !self.debug;
            }

            let now = timestamp_ms();
            self.maybe_connect(now);
            self.poll_network(now);
            self.check_server_silence(now);
            self.handle_input();

            self.game_state.frame(now);
            self.render();

            next_frame().await;
        }

        self.transport.shutdown();
        info!("Client stopped");
        Ok(())
    }
}
