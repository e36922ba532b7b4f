//! Wire protocol between client and server, encoded with bincode.

use serde::{Deserialize, Serialize};

use crate::input::InputMessage;
use crate::world::{Ship, World};

pub const PROTOCOL_VERSION: u32 = 1;

/// Largest payload a single UDP datagram can carry.
pub const MAX_PACKET_SIZE: usize = 65_507;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Connect {
        client_version: u32,
    },
    PlayerMessage {
        message: InputMessage,
    },
    Heartbeat,
    Disconnect,

    EnterGame {
        world: World,
        ship: Ship,
    },
    /// `None` tells the client it has been dropped and must clear its state.
    UpdateWorld {
        world: Option<World>,
    },
    Disconnected {
        reason: String,
    },
}

impl Packet {
    pub fn encode(&self) -> bincode::Result<Vec<u8>> {
        bincode::serialize(self)
    }

    pub fn decode(bytes: &[u8]) -> bincode::Result<Self> {
        bincode::deserialize(bytes)
    }
}
