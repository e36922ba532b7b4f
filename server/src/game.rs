//! Authoritative simulation: the world, the pending input queue, and the
//! fixed-step catch-up loop that commits input `SERVER_DELAY_MS` behind
//! wall-clock time.

use log::{debug, info};
use shared::physics::{advance_bullet, advance_ship, bullet_out_of_bounds, fire};
use shared::ports::resolve_ports;
use shared::{apply_input, InputMessage, Ship, World, FRAME_MS, SERVER_DELAY_MS, SNAPSHOT_INTERVAL_MS};

/// Upper bound on frames simulated in one scheduler wake-up.
pub const MAX_CATCH_UP_FRAMES: usize = 100;

/// The authoritative game state
///
/// Owns the one true [`World`] plus the inputs that have arrived but are not
/// due yet. Inputs are committed in timestamp order as the simulation clock
/// passes them, and a snapshot is produced every `SNAPSHOT_INTERVAL_MS`.
#[derive(Debug, Clone)]
pub struct GameState {
    pub world: World,
    pending: Vec<InputMessage>,
}

impl GameState {
    pub fn new(start_time: u64) -> Self {
        Self::with_world(World::new(start_time))
    }

    pub fn with_world(world: World) -> Self {
        Self {
            world,
            pending: Vec::new(),
        }
    }

    /// Spawns a ship for a newly joined client and returns a copy of it.
    pub fn add_player(&mut self, client_id: u32) -> Ship {
        let ship = Ship::new(client_id);
        info!("Added ship {} at ({}, {})", client_id, ship.x, ship.y);
        self.world.players.push(ship.clone());
        ship
    }

    /// Removes the ship and every neighbor entry pointing at it.
    pub fn remove_player(&mut self, client_id: u32) -> bool {
        let removed = self.world.remove_ship(client_id).is_some();
        if removed {
            info!("Removed ship {}", client_id);
        }
        removed
    }

    /// Queues an input; nothing touches the world until the loop reaches it.
    pub fn queue_message(&mut self, message: InputMessage) {
        self.pending.push(message);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Applies every queued message stamped before the current simulation time.
    ///
    /// Returns the applied messages in application order.
    pub fn process_messages(&mut self) -> Vec<InputMessage> {
        // Stable, so equal timestamps keep arrival order.
        self.pending.sort_by_key(|m| m.t);

        let now = self.world.t;
        let due = self.pending.partition_point(|m| m.t < now);
        let applied: Vec<InputMessage> = self.pending.drain(..due).collect();

        for message in &applied {
            if message.t + FRAME_MS < now {
                debug!(
                    "Input {} from {} is {}ms behind the simulation, applying anyway",
                    message.seq,
                    message.id,
                    now - message.t
                );
            }
            let Some(ship) = self.world.ship_mut(message.id) else {
                continue;
            };
            ship.last_message = ship.last_message.max(message.seq);
            apply_input(ship, &message.kind);
        }

        applied
    }

    /// Simulates one frame and returns true when a snapshot is due.
    pub fn step(&mut self) -> bool {
        self.process_messages();

        let bounds = self.world.bounds();
        self.world.bullets.retain_mut(|bullet| {
            advance_bullet(bullet, 1, bounds);
            !bullet_out_of_bounds(bullet, bounds)
        });

        let mut fired = Vec::new();
        for ship in self.world.players.iter_mut() {
            advance_ship(ship, 1, bounds);
            fired.extend(fire(ship));
        }
        self.world.bullets.extend(fired);

        resolve_ports(&mut self.world);

        self.world.t += FRAME_MS;
        (self.world.t - self.world.start_time) % SNAPSHOT_INTERVAL_MS == 0
    }

    /// Advances the simulation toward `now - SERVER_DELAY_MS`.
    ///
    /// Runs at most [`MAX_CATCH_UP_FRAMES`] frames; the rest is picked up on
    /// the next call. Returns a snapshot for every frame that closed a
    /// snapshot interval.
    pub fn catch_up(&mut self, now: u64) -> Vec<World> {
        let target = now.saturating_sub(SERVER_DELAY_MS);
        let mut snapshots = Vec::new();
        let mut frames = 0;

        while self.world.t < target && frames < MAX_CATCH_UP_FRAMES {
            if self.step() {
                snapshots.push(self.world.clone());
            }
            frames += 1;
        }

        snapshots
    }
}
