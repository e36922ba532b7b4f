//! Connection registry for the server
//!
//! Tracks which network addresses are playing, hands out the ids their ships
//! are known by, and notices clients that have gone silent. Input does not
//! live here: it goes straight into the simulation's time-ordered queue.

use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A connected client
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier, also the id of the client's ship
    pub id: u32,
    /// Network address for sending snapshots
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
}

impl Client {
    pub fn new(id: u32, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
        }
    }

    /// Returns true if nothing has been heard from the client within `timeout`.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients
///
/// Enforces the server's capacity limit and maps incoming datagrams back to
/// the ship they control. Client ids start at 1 and are never reused while
/// the server runs, so a late message from a departed client cannot land on
/// a newcomer's ship.
pub struct ClientManager {
    clients: HashMap<u32, Client>,
    next_client_id: u32,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Registers a new client, or returns None if the server is full.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, Client::new(client_id, addr));

        Some(client_id)
    }

    /// Removes a client. Returns false if it was already gone.
    pub fn remove_client(&mut self, client_id: u32) -> bool {
        if let Some(client) = self.clients.remove(&client_id) {
            info!("Client {} disconnected", client.id);
            true
        } else {
            false
        }
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .values()
            .find(|client| client.addr == addr)
            .map(|client| client.id)
    }

    /// Records activity from `addr` and returns the client id behind it.
    pub fn touch(&mut self, addr: SocketAddr) -> Option<u32> {
        let client = self.clients.values_mut().find(|client| client.addr == addr)?;
        client.last_seen = Instant::now();
        Some(client.id)
    }

    /// Removes clients silent for longer than `timeout` and returns them.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<(u32, SocketAddr)> {
        let timed_out: Vec<(u32, SocketAddr)> = self
            .clients
            .values()
            .filter(|client| client.is_timed_out(timeout))
            .map(|client| (client.id, client.addr))
            .collect();

        for (client_id, _) in &timed_out {
            self.remove_client(*client_id);
        }

        timed_out
    }

    /// Addresses of every connected client, for broadcasting snapshots.
    pub fn client_addrs(&self) -> Vec<SocketAddr> {
        self.clients.values().map(|client| client.addr).collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
