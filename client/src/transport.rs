//! Client UDP transport
//!
//! The frame loop belongs to macroquad and must never block, so the socket
//! lives on its own thread running a single-threaded tokio runtime. The two
//! sides talk through unbounded channels that the frame loop drains with
//! `try_recv`.
//!
//! For exercising the server's reorder window the transport can hold every
//! datagram back by half the configured ping plus a random jitter. Each
//! datagram is delayed independently, so jitter reorders them.

use log::{debug, error, info, warn};
use rand::Rng;
use shared::{Packet, MAX_PACKET_SIZE};
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
pub struct TransportConfig {
    pub server_addr: SocketAddr,
    /// Simulated round trip, split evenly between sending and receiving.
    pub fake_ping_ms: u64,
    /// Upper bound of the random extra delay added to each datagram.
    pub jitter_ms: u64,
}

impl TransportConfig {
    pub fn new(server_addr: SocketAddr) -> Self {
        Self {
            server_addr,
            fake_ping_ms: 0,
            jitter_ms: 0,
        }
    }

    fn one_way_delay(&self) -> Duration {
        let jitter = if self.jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=self.jitter_ms)
        } else {
            0
        };
        Duration::from_millis(self.fake_ping_ms / 2 + jitter)
    }
}

enum Command {
    Send(Packet),
    Shutdown,
}

/// Handle to the transport thread
pub struct Transport {
    commands: mpsc::UnboundedSender<Command>,
    incoming: mpsc::UnboundedReceiver<Packet>,
    local_addr: SocketAddr,
    thread: Option<JoinHandle<()>>,
}

impl Transport {
    /// Binds a socket and starts the transport thread.
    pub fn start(config: TransportConfig) -> Result<Self, BoxError> {
        let bind_addr = if config.server_addr.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = std::net::UdpSocket::bind(bind_addr)?;
        socket.set_nonblocking(true)?;
        let local_addr = socket.local_addr()?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();

        let thread = std::thread::Builder::new()
            .name("transport".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    match UdpSocket::from_std(socket) {
                        Ok(socket) => run(socket, config, command_rx, incoming_tx).await,
                        Err(e) => error!("Failed to register socket: {}", e),
                    }
                });
            })?;

        info!("Transport bound to {}, talking to {}", local_addr, config.server_addr);

        Ok(Transport {
            commands: command_tx,
            incoming: incoming_rx,
            local_addr,
            thread: Some(thread),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Queues a packet for the server. Returns false once the thread is gone.
    pub fn send(&self, packet: Packet) -> bool {
        self.commands.send(Command::Send(packet)).is_ok()
    }

    /// Next packet received from the server, if one is waiting.
    pub fn try_recv(&mut self) -> Option<Packet> {
        self.incoming.try_recv().ok()
    }

    /// Says goodbye to the server and stops the thread.
    pub fn shutdown(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Transport thread panicked");
            }
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run(
    socket: UdpSocket,
    config: TransportConfig,
    mut commands: mpsc::UnboundedReceiver<Command>,
    incoming: mpsc::UnboundedSender<Packet>,
) {
    let socket = Arc::new(socket);
    let mut heartbeat = interval(HEARTBEAT_INTERVAL);
    let mut buffer = vec![0u8; MAX_PACKET_SIZE];

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Send(packet)) => send_delayed(&socket, &config, packet),
                Some(Command::Shutdown) | None => {
                    if let Err(e) = send_now(&socket, config.server_addr, &Packet::Disconnect).await {
                        debug!("Failed to send disconnect: {}", e);
                    }
                    break;
                }
            },

            result = socket.recv_from(&mut buffer) => match result {
                Ok((len, from)) => {
                    if from != config.server_addr {
                        warn!("Ignoring datagram from unknown sender {}", from);
                        continue;
                    }
                    match Packet::decode(&buffer[..len]) {
                        Ok(packet) => deliver_delayed(&incoming, &config, packet),
                        Err(e) => warn!("Failed to decode packet from server: {}", e),
                    }
                }
                Err(e) => {
                    error!("Error receiving packet: {}", e);
                    sleep(Duration::from_millis(10)).await;
                }
            },

            _ = heartbeat.tick() => send_delayed(&socket, &config, Packet::Heartbeat),
        }
    }
}

async fn send_now(socket: &UdpSocket, addr: SocketAddr, packet: &Packet) -> Result<(), BoxError> {
    let data = packet.encode()?;
    socket.send_to(&data, addr).await?;
    Ok(())
}

fn send_delayed(socket: &Arc<UdpSocket>, config: &TransportConfig, packet: Packet) {
    let socket = Arc::clone(socket);
    let addr = config.server_addr;
    let delay = config.one_way_delay();

    tokio::spawn(async move {
        if !delay.is_zero() {
            sleep(delay).await;
        }
        if let Err(e) = send_now(&socket, addr, &packet).await {
            error!("Failed to send to {}: {}", addr, e);
        }
    });
}

fn deliver_delayed(incoming: &mpsc::UnboundedSender<Packet>, config: &TransportConfig, packet: Packet) {
    let delay = config.one_way_delay();
    if delay.is_zero() {
        let _ = incoming.send(packet);
        return;
    }

    let incoming = incoming.clone();
    tokio::spawn(async move {
        sleep(delay).await;
        let _ = incoming.send(packet);
    });
}
