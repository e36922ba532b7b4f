//! Code shared by the server and the client: the world model, the
//! deterministic physics kernel, the port resolver, input dispatch and the
//! wire protocol.

pub mod input;
pub mod physics;
pub mod ports;
pub mod protocol;
pub mod world;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub use input::{apply_input, InputKind, InputMessage};
pub use protocol::{Packet, MAX_PACKET_SIZE, PROTOCOL_VERSION};
pub use world::{Bounds, Bullet, Neighbor, PortState, Ship, World};

/// One simulation frame in milliseconds (30 FPS).
pub const FRAME_MS: u64 = 30;
/// How far behind wall-clock time the server commits input, and the client renders remote ships.
pub const SERVER_DELAY_MS: u64 = 120;
/// Snapshots go out every fourth frame.
pub const SNAPSHOT_INTERVAL_MS: u64 = 120;
pub const FRICTION: f64 = 0.04;
pub const CONNECT_RADIUS: f64 = 100.0;
pub const WORLD_WIDTH: f64 = 5000.0;
pub const WORLD_HEIGHT: f64 = 5000.0;

/// Current wall-clock time in milliseconds.
pub fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}
