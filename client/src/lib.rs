//! # Game Client Library
//!
//! The player's side of the game: captures input, sends it to the server,
//! predicts the local ship, and draws the world.
//!
//! ## Prediction and Reconciliation
//!
//! The server runs 120ms behind wall-clock time and broadcasts a snapshot of
//! the whole world every 120ms. The client holds one active world and moves
//! two cursors through it every 30ms frame:
//!
//! - remote ships and bullets are advanced to `now - 120ms`, so they are
//!   shown where the server will actually have them;
//! - the local ship is advanced to `now`, replaying every input the server has
//!   not acknowledged yet.
//!
//! When a newer snapshot becomes due the client re-anchors both cursors to
//! it and drops the inputs the snapshot acknowledges. Because the physics
//! kernel in `shared` is deterministic, the replayed local ship lands exactly
//! where the server will put it.
//!
//! ## Module Organization
//!
//! - [`game`]: snapshot buffer and the reconciliation loop
//! - [`input`]: keyboard and pointer capture, sequencing, bearing rate limit
//! - [`transport`]: UDP on its own thread, with optional simulated latency
//! - [`network`]: the session driver tying the other modules together
//! - [`rendering`]: macroquad drawing of ships, ports, bullets and the grid
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::game::{ClientGameState, FrameOutcome};
//! use shared::{timestamp_ms, World};
//!
//! let mut game = ClientGameState::new();
//! assert_eq!(game.frame(timestamp_ms()), FrameOutcome::Waiting);
//!
//! let mut world = World::new(timestamp_ms());
//! world.players.push(shared::Ship::new(1));
//! game.enter_game(world, 1);
//! ```

pub mod game;
pub mod input;
pub mod network;
pub mod rendering;
pub mod transport;
