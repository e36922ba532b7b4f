//! World, ship and projectile state shared by server and client.
//!
//! A [`World`] is what the server simulates and what travels over the wire as a
//! snapshot. Clients keep received worlds immutable except the one they are
//! currently advancing.

use serde::{Deserialize, Serialize};

use crate::{WORLD_HEIGHT, WORLD_WIDTH};

/// Number of docking ports on every ship.
pub const PORT_COUNT: usize = 4;

/// Port indices, relative to the ship's bearing.
pub const BOW: usize = 0;
pub const STARBOARD: usize = 1;
pub const STERN: usize = 2;
pub const PORT_SIDE: usize = 3;

/// State of a single docking port.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum PortState {
    #[default]
    Closed,
    Open,
    Active,
    /// Set only by a manual docking action, never by the resolver.
    Attached,
}

impl PortState {
    /// Open and active ports both count as "live" for activation propagation.
    pub fn is_live(self) -> bool {
        matches!(self, PortState::Open | PortState::Active)
    }
}

/// "My port `port` is paired with ship `id`'s port `other`."
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    pub id: u32,
    pub port: usize,
    pub other: usize,
}

/// Width and height of the playable area, used to clamp positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub width: f64,
    pub height: f64,
}

/// A player's ship
///
/// Kinematics, tuning limits and port state travel together so that a
/// snapshot carries everything the client needs to keep simulating it.
/// `last_message` is the highest input sequence the server has applied.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Ship {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    /// Degrees, clockwise from the positive x axis, in `[0, 360)`.
    pub bearing: f64,
    pub bearing_goal: f64,
    pub speed: f64,
    pub accelerating_forward: bool,
    pub accelerating_backward: bool,
    pub max_forward_speed: f64,
    pub max_reverse_speed: f64,
    pub forward_acceleration: f64,
    pub reverse_acceleration: f64,
    /// Degrees per frame.
    pub max_turn: f64,
    pub length: f64,
    pub width: f64,
    /// Highest input sequence number the server has applied to this ship.
    pub last_message: u32,
    pub ports: [PortState; PORT_COUNT],
    pub neighbors: Vec<Neighbor>,
    pub firing: bool,
    /// Frames until the weapon can fire again.
    pub shoot_cooldown: u32,
}

impl Ship {
    /// Creates a ship in the fixed spawn pose.
    pub fn new(id: u32) -> Self {
        Self {
            id,
            x: 200.0,
            y: 200.0,
            bearing: 0.0,
            bearing_goal: 0.0,
            speed: 0.0,
            accelerating_forward: false,
            accelerating_backward: false,
            max_forward_speed: 20.0,
            max_reverse_speed: -4.0,
            forward_acceleration: 1.0,
            reverse_acceleration: 0.2,
            max_turn: 2.0,
            length: 60.0,
            width: 40.0,
            last_message: 0,
            ports: [PortState::Closed; PORT_COUNT],
            neighbors: Vec::new(),
            firing: false,
            shoot_cooldown: 0,
        }
    }

    /// Spawn pose moved to the given position, mostly useful for tests and tools.
    pub fn at(id: u32, x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            ..Self::new(id)
        }
    }

    pub fn is_neighbor(&self, other_id: u32) -> bool {
        self.neighbors.iter().any(|n| n.id == other_id)
    }
}

/// A projectile flying in a straight line until it leaves the world.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Bullet {
    pub x: f64,
    pub y: f64,
    pub bearing: f64,
    pub speed: f64,
    pub width: f64,
    pub length: f64,
}

/// Complete simulation state at time `t`
///
/// This is the snapshot type: the server sends it whole, and the client
/// keeps one as its active world. Ships are kept in join order, which is
/// also the order the port resolver visits them in.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct World {
    pub width: f64,
    pub height: f64,
    /// Simulation time in wall-clock milliseconds.
    pub t: u64,
    pub start_time: u64,
    pub players: Vec<Ship>,
    pub bullets: Vec<Bullet>,
}

impl World {
    pub fn new(start_time: u64) -> Self {
        Self::with_size(start_time, WORLD_WIDTH, WORLD_HEIGHT)
    }

    pub fn with_size(start_time: u64, width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            t: start_time,
            start_time,
            players: Vec::new(),
            bullets: Vec::new(),
        }
    }

    pub fn bounds(&self) -> Bounds {
        Bounds {
            width: self.width,
            height: self.height,
        }
    }

    pub fn ship(&self, id: u32) -> Option<&Ship> {
        self.players.iter().find(|s| s.id == id)
    }

    pub fn ship_mut(&mut self, id: u32) -> Option<&mut Ship> {
        self.players.iter_mut().find(|s| s.id == id)
    }

    /// Removes a ship and every neighbor entry that points at it.
    pub fn remove_ship(&mut self, id: u32) -> Option<Ship> {
        let index = self.players.iter().position(|s| s.id == id)?;
        let ship = self.players.remove(index);
        for other in &mut self.players {
            other.neighbors.retain(|n| n.id != id);
        }
        Some(ship)
    }
}
