//! Player input messages and how they change a ship.
//!
//! The server and the predicting client both go through [`apply_input`], so a
//! replayed message has exactly the effect it will have on the server.

use serde::{Deserialize, Serialize};

use crate::world::{PortState, Ship};

/// Key codes understood by the simulation.
pub const KEY_W: u32 = 87;
pub const KEY_UP: u32 = 38;
pub const KEY_S: u32 = 83;
pub const KEY_DOWN: u32 = 40;
pub const KEY_SPACE: u32 = 32;
pub const KEY_E: u32 = 69;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum InputKind {
    Keystroke { key: u32, down: bool },
    Bearing { bearing: f64 },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct InputMessage {
    pub kind: InputKind,
    /// Sender identity, stamped by the server from the connection.
    pub id: u32,
    /// Sender wall-clock time in milliseconds.
    pub t: u64,
    /// Strictly increasing per client session, starting at 1.
    pub seq: u32,
}

impl InputMessage {
    pub fn keystroke(key: u32, down: bool, t: u64, seq: u32) -> Self {
        Self {
            kind: InputKind::Keystroke { key, down },
            id: 0,
            t,
            seq,
        }
    }

    pub fn bearing(bearing: f64, t: u64, seq: u32) -> Self {
        Self {
            kind: InputKind::Bearing { bearing },
            id: 0,
            t,
            seq,
        }
    }
}

/// Applies the effect of one input to a ship. Unknown keys are ignored.
pub fn apply_input(ship: &mut Ship, kind: &InputKind) {
    match *kind {
        InputKind::Keystroke { key, down } => apply_key(ship, key, down),
        InputKind::Bearing { bearing } => ship.bearing_goal = bearing,
    }
}

fn apply_key(ship: &mut Ship, key: u32, down: bool) {
    match key {
        KEY_W | KEY_UP => ship.accelerating_forward = down,
        KEY_S | KEY_DOWN => ship.accelerating_backward = down,
        KEY_SPACE => ship.firing = down,
        KEY_E => set_docking_intent(ship, down),
        _ => {}
    }
}

/// Opens closed ports while docking is requested and closes them again on release.
fn set_docking_intent(ship: &mut Ship, requested: bool) {
    for port in ship.ports.iter_mut() {
        *port = match (*port, requested) {
            (PortState::Attached, _) => PortState::Attached,
            (PortState::Closed, true) => PortState::Open,
            (state, true) => state,
            (_, false) => PortState::Closed,
        };
    }
}
