//! # Game Server Library
//!
//! The authoritative side of the game. One process owns one shared world of
//! ships and bullets, simulates it on a fixed 30ms timestep, and streams a full
//! snapshot to every connected client every fourth frame.
//!
//! ## Delayed, ordered input
//!
//! Client input is not applied on arrival. Datagrams only append to a queue;
//! the simulation runs `SERVER_DELAY_MS` (120ms, four frames) behind wall-clock
//! time, and before each frame it stable-sorts the queue by the sender's
//! timestamp and applies everything stamped before the frame. Inputs that were
//! reordered by network jitter are therefore committed in the order they were
//! sent. Inputs that arrive even later are still applied; the server only logs
//! a diagnostic for them.
//!
//! ## Single writer
//!
//! The receiver task decodes datagrams and forwards them over a channel. The
//! main loop in [`network::Server::run`] is the only code that touches the
//! world or the client registry, so nothing is locked. Outgoing packets are
//! handed to a sender task and never block a frame.
//!
//! ## Module Organization
//!
//! - [`game`]: world ownership, the input queue and the catch-up loop
//! - [`client_manager`]: connected addresses, ids and heartbeat timeouts
//! - [`network`]: UDP transport, packet routing and the tick scheduler
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use std::time::Duration;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), server::network::BoxError> {
//!     let mut server = Server::new("127.0.0.1:8080", 32, Duration::from_secs(5)).await?;
//!     server.run().await
//! }
//! ```

pub mod client_manager;
pub mod game;
pub mod network;
