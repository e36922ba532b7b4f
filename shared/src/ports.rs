//! Port / docking resolver.
//!
//! Ships within [`CONNECT_RADIUS`] of each other may be paired through one of
//! their four ports. Pairings are recorded as symmetric [`Neighbor`] entries and
//! a port is `Active` while the port it is paired with is live. The resolver
//! only ever moves ports between `Open` and `Active`; `Closed` and `Attached`
//! are owned by the docking action.

use log::debug;

use crate::physics::{angle_to, bearing_diff, modulo};
use crate::world::{Neighbor, PortState, Ship, World, BOW, PORT_COUNT};
use crate::CONNECT_RADIUS;

/// Bearing difference under which two ships count as co-aligned.
const ALIGNED_DEGREES: f64 = 45.0;
/// Bearing difference above which two ships count as counter-aligned.
const OPPOSED_DEGREES: f64 = 135.0;

/// Axis-aligned pre-filter followed by the Euclidean check.
pub fn is_near(a: &Ship, b: &Ship, distance: f64) -> bool {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    dx.abs() <= distance && dy.abs() <= distance && (dx * dx + dy * dy).sqrt() <= distance
}

/// Ports `(a_port, b_port)` the geometry of the two ships allows, ignoring port states.
pub fn pairing(a: &Ship, b: &Ship) -> Option<(usize, usize)> {
    let center_angle = angle_to(b.x - a.x, b.y - a.y);
    let port_angle = modulo(center_angle - a.bearing, 360.0);
    let a_port = ((port_angle + 45.0) % 360.0 / 90.0).floor() as usize % PORT_COUNT;

    let alignment = bearing_diff(a.bearing, b.bearing).abs();
    if alignment < ALIGNED_DEGREES {
        // Nose to tail.
        Some((a_port, (a_port + 2) % PORT_COUNT))
    } else if alignment > OPPOSED_DEGREES && a_port != BOW {
        // Side by side; never bow to bow.
        Some((a_port, a_port))
    } else {
        None
    }
}

/// Pairing for a ship pair that is not yet linked. Attached ports are never reassigned.
pub fn candidate_ports(a: &Ship, b: &Ship) -> Option<(usize, usize)> {
    let (a_port, b_port) = pairing(a, b)?;
    if a.ports[a_port] == PortState::Attached || b.ports[b_port] == PortState::Attached {
        return None;
    }
    Some((a_port, b_port))
}

fn pairing_holds(a: &Ship, b: &Ship, port: usize, other: usize) -> bool {
    pairing(a, b) == Some((port, other)) || pairing(b, a) == Some((other, port))
}

/// Drops neighbor entries whose ship vanished, drifted away, or no longer lines up.
///
/// The keep/drop decision for a pair is the same from both sides, so symmetry
/// is preserved.
pub fn revalidate_neighbors(world: &mut World) {
    let kept: Vec<Vec<Neighbor>> = world
        .players
        .iter()
        .map(|ship| {
            ship.neighbors
                .iter()
                .filter(|n| match world.ship(n.id) {
                    Some(other) => {
                        is_near(ship, other, CONNECT_RADIUS)
                            && pairing_holds(ship, other, n.port, n.other)
                    }
                    None => false,
                })
                .copied()
                .collect()
        })
        .collect();

    for (ship, neighbors) in world.players.iter_mut().zip(kept) {
        ship.neighbors = neighbors;
    }
}

/// Links every near, unlinked pair of ships whose geometry allows it.
pub fn discover_neighbors(world: &mut World) {
    let count = world.players.len();
    for i in 0..count {
        for j in (i + 1)..count {
            let (head, tail) = world.players.split_at_mut(j);
            let a = &mut head[i];
            let b = &mut tail[0];

            if a.is_neighbor(b.id) || !is_near(a, b, CONNECT_RADIUS) {
                continue;
            }
            if let Some((a_port, b_port)) = candidate_ports(a, b) {
                debug!(
                    "Ship {} port {} paired with ship {} port {}",
                    a.id, a_port, b.id, b_port
                );
                a.neighbors.push(Neighbor {
                    id: b.id,
                    port: a_port,
                    other: b_port,
                });
                b.neighbors.push(Neighbor {
                    id: a.id,
                    port: b_port,
                    other: a_port,
                });
            }
        }
    }
}

/// Marks live ports `Active` when a paired port on a neighbor is live, `Open` otherwise.
pub fn update_activation(world: &mut World) {
    let next: Vec<[PortState; PORT_COUNT]> = world
        .players
        .iter()
        .map(|ship| {
            let mut ports = ship.ports;
            for (index, state) in ports.iter_mut().enumerate() {
                if !state.is_live() {
                    continue;
                }
                let powered = ship.neighbors.iter().any(|n| {
                    n.port == index
                        && world
                            .ship(n.id)
                            .map_or(false, |other| other.ports[n.other].is_live())
                });
                *state = if powered {
                    PortState::Active
                } else {
                    PortState::Open
                };
            }
            ports
        })
        .collect();

    for (ship, ports) in world.players.iter_mut().zip(next) {
        ship.ports = ports;
    }
}

/// One resolver frame: revalidate, discover, then propagate activation.
pub fn resolve_ports(world: &mut World) {
    revalidate_neighbors(world);
    discover_neighbors(world);
    update_activation(world);
}
