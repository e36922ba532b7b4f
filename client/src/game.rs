//! Client-side prediction and reconciliation.
//!
//! The client keeps one active [`World`] that it advances locally. Remote
//! ships and bullets are simulated up to `now - SERVER_DELAY_MS`, the same lag
//! the server runs at, while the local ship is predicted all the way to `now`
//! by replaying the inputs the server has not acknowledged yet. Whenever a
//! newer snapshot becomes due, both cursors re-anchor to it.

use log::debug;
use shared::physics::{advance_bullet, advance_ship, bullet_out_of_bounds};
use shared::ports::resolve_ports;
use shared::{
    apply_input, InputMessage, Ship, World, FRAME_MS, SERVER_DELAY_MS, SNAPSHOT_INTERVAL_MS,
};
use std::collections::VecDeque;

/// What a call to [`ClientGameState::frame`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Called again within one frame period; nothing was simulated.
    Throttled,
    /// No usable world yet (or the connection was dropped).
    Waiting,
    /// The world was advanced and can be rendered.
    Ready,
}

/// Client-side game state
///
/// Holds the active world, the snapshots waiting to become due, and the log
/// of local inputs the server has not acknowledged. `frame` advances
/// remote ships and the predicted local ship on separate cursors.
#[derive(Debug, Default)]
pub struct ClientGameState {
    player_id: Option<u32>,
    /// Received snapshots newer than the active world, ordered by `t`.
    snapshots: VecDeque<World>,
    active: Option<World>,
    /// Local inputs not yet acknowledged by a snapshot, in `seq` order.
    inputs: Vec<InputMessage>,
    /// Local prediction cursor.
    tick_time: u64,
    /// Remote simulation cursor, trails wall-clock time by `SERVER_DELAY_MS`.
    remote_tick_time: u64,
    /// Inputs stamped before this have already been replayed since the last re-anchor.
    replayed_until: Option<u64>,
    last_frame: Option<u64>,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a session from the server's welcome world.
    pub fn enter_game(&mut self, world: World, player_id: u32) {
        debug!("Entering game as ship {} at t={}", player_id, world.t);
        self.player_id = Some(player_id);
        self.snapshots.clear();
        self.inputs.clear();
        self.last_frame = None;
        self.anchor(world);
    }

    /// Buffers a snapshot. Snapshots not newer than what is already active are dropped.
    pub fn push_snapshot(&mut self, world: World) {
        if self.active.as_ref().map_or(false, |active| world.t <= active.t) {
            return;
        }
        let index = self.snapshots.partition_point(|w| w.t < world.t);
        match self.snapshots.get(index) {
            Some(existing) if existing.t == world.t => {}
            _ => self.snapshots.insert(index, world),
        }
    }

    /// Forgets every world and input; frames report `Waiting` until the next `enter_game`.
    pub fn disconnect(&mut self) {
        self.player_id = None;
        self.snapshots.clear();
        self.active = None;
        self.inputs.clear();
        self.replayed_until = None;
        self.last_frame = None;
    }

    /// Remembers a local input so it can be replayed until the server acknowledges it.
    pub fn record_input(&mut self, message: InputMessage) {
        self.inputs.push(message);
    }

    pub fn player_id(&self) -> Option<u32> {
        self.player_id
    }

    pub fn pending_inputs(&self) -> &[InputMessage] {
        &self.inputs
    }

    pub fn buffered_snapshots(&self) -> usize {
        self.snapshots.len()
    }

    pub fn world(&self) -> Option<&World> {
        self.active.as_ref()
    }

    pub fn tick_time(&self) -> u64 {
        self.tick_time
    }

    pub fn remote_tick_time(&self) -> u64 {
        self.remote_tick_time
    }

    pub fn local_ship(&self) -> Option<&Ship> {
        self.active.as_ref()?.ship(self.player_id?)
    }

    /// The world and local ship to hand to the renderer.
    pub fn view(&self) -> Option<(&World, &Ship)> {
        let world = self.active.as_ref()?;
        let ship = world.ship(self.player_id?)?;
        Some((world, ship))
    }

    /// Runs one client frame at wall-clock time `now`.
    pub fn frame(&mut self, now: u64) -> FrameOutcome {
        if let Some(last) = self.last_frame {
            if now < last + FRAME_MS {
                return FrameOutcome::Throttled;
            }
        }
        if self.active.is_none() && self.snapshots.is_empty() {
            return FrameOutcome::Waiting;
        }
        self.last_frame = Some(now);

        let remote_time = now.saturating_sub(SERVER_DELAY_MS);
        self.accept_snapshot(remote_time);
        self.advance_remote(remote_time);
        self.advance_local(now);

        if self.view().is_some() {
            FrameOutcome::Ready
        } else {
            FrameOutcome::Waiting
        }
    }

    /// Switches to the newest buffered snapshot due at `remote_time`, if any.
    fn accept_snapshot(&mut self, remote_time: u64) {
        let Some(start) = self
            .active
            .as_ref()
            .or(self.snapshots.front())
            .map(|w| w.start_time)
        else {
            return;
        };
        let remote_world_time = start
            + remote_time.saturating_sub(start) / SNAPSHOT_INTERVAL_MS * SNAPSHOT_INTERVAL_MS;

        let index = match self.snapshots.iter().rposition(|w| w.t <= remote_world_time) {
            Some(index) => index,
            // Nothing due yet, but nothing to show either: take the oldest.
            None if self.active.is_none() => 0,
            None => return,
        };

        self.snapshots.drain(..index);
        if let Some(world) = self.snapshots.pop_front() {
            self.anchor(world);
        }
    }

    fn anchor(&mut self, world: World) {
        self.tick_time = world.t;
        self.remote_tick_time = world.t;
        self.replayed_until = None;

        if let Some(ship) = self.player_id.and_then(|id| world.ship(id)) {
            let acknowledged = ship.last_message;
            self.inputs.retain(|m| m.seq > acknowledged);
        }
        self.active = Some(world);
    }

    /// Extrapolates every ship except the local one, and all bullets, up to `remote_time`.
    fn advance_remote(&mut self, remote_time: u64) {
        let Some(world) = self.active.as_mut() else {
            return;
        };
        let player_id = self.player_id;
        let bounds = world.bounds();

        while self.remote_tick_time < remote_time {
            for ship in world.players.iter_mut().filter(|s| Some(s.id) != player_id) {
                advance_ship(ship, 1, bounds);
            }
            world.bullets.retain_mut(|bullet| {
                advance_bullet(bullet, 1, bounds);
                !bullet_out_of_bounds(bullet, bounds)
            });
            resolve_ports(world);
            self.remote_tick_time += FRAME_MS;
        }
    }

    /// Predicts the local ship up to `now`, replaying unacknowledged inputs.
    fn advance_local(&mut self, now: u64) {
        let Some(player_id) = self.player_id else {
            return;
        };
        let Some(world) = self.active.as_mut() else {
            return;
        };
        let bounds = world.bounds();
        let Some(ship) = world.ship_mut(player_id) else {
            return;
        };

        while self.tick_time < now {
            let step_start = self.tick_time;
            let from = self.replayed_until;
            for message in self
                .inputs
                .iter()
                .filter(|m| m.t < step_start && from.map_or(true, |from| m.t >= from))
            {
                apply_input(ship, &message.kind);
            }
            self.replayed_until = Some(step_start);

            advance_ship(ship, 1, bounds);
            self.tick_time += FRAME_MS;
        }
    }
}
