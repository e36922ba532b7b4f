//! Deterministic physics kernel.
//!
//! Every function here is pure apart from mutating the body it is given, and is
//! linked into both the server and the client. Prediction only converges if the
//! two sides produce bit-identical results, so all positions, speeds and
//! bearings go through [`truncate`] after each step.

use crate::world::{Bounds, Bullet, Ship};
use crate::FRICTION;

/// Frames between two shots of the same ship.
pub const SHOOT_COOLDOWN_FRAMES: u32 = 20;
/// Speed a bullet gets on top of the firing ship's speed.
pub const BULLET_SPEED_BONUS: f64 = 15.0;
pub const BULLET_WIDTH: f64 = 2.0;
pub const BULLET_LENGTH: f64 = 5.0;

/// A rectangular body that moves along its bearing.
pub trait Body {
    fn position(&self) -> (f64, f64);
    fn set_position(&mut self, x: f64, y: f64);
    fn bearing(&self) -> f64;
    fn speed(&self) -> f64;
    fn length(&self) -> f64;
}

impl Body for Ship {
    fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    fn set_position(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
    }

    fn bearing(&self) -> f64 {
        self.bearing
    }

    fn speed(&self) -> f64 {
        self.speed
    }

    fn length(&self) -> f64 {
        self.length
    }
}

impl Body for Bullet {
    fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    fn set_position(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
    }

    fn bearing(&self) -> f64 {
        self.bearing
    }

    fn speed(&self) -> f64 {
        self.speed
    }

    fn length(&self) -> f64 {
        self.length
    }
}

/// Truncates toward zero at `digits` decimal places: `floor(|v|·10^d)/10^d · sign(v)`.
pub fn truncate(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value.abs() * factor).floor() / factor * value.signum()
}

/// Remainder that is always in `[0, m)` for positive `m`.
pub fn modulo(n: f64, m: f64) -> f64 {
    ((n % m) + m) % m
}

/// Shortest signed angular distance from `b2` to `b1`, in `(-180, 180]`.
pub fn bearing_diff(b1: f64, b2: f64) -> f64 {
    let diff = modulo(b1 - b2, 360.0);
    if diff > 180.0 {
        diff - 360.0
    } else {
        diff
    }
}

/// Bearing in degrees of the vector `(dx, dy)`.
pub fn angle_to(dx: f64, dy: f64) -> f64 {
    (-dy).atan2(-dx).to_degrees() + 180.0
}

fn clamp_axis(value: f64, low: f64, high: f64) -> f64 {
    let clamped = value.max(low).min(high);
    // Truncation may step just outside an offset that has more than two decimals.
    truncate(clamped, 2).max(low).min(high)
}

/// Moves a body `frames` ticks along its bearing and clamps it inside `bounds`.
///
/// The clamp works on the body's center, shrunk on each axis by the half
/// length projected onto that axis, so the hull never crosses a wall.
pub fn advance_position<B: Body>(body: &mut B, frames: u32, bounds: Bounds) {
    let (x, y) = body.position();
    let rad = body.bearing().to_radians();
    let half_length = body.length() / 2.0;
    let distance = frames as f64 * body.speed();

    let cos = rad.cos();
    let off_x = (half_length * cos).abs();
    let new_x = clamp_axis(x + distance * cos, off_x, bounds.width - off_x);

    let sin = rad.sin();
    let off_y = (half_length * sin).abs();
    let new_y = clamp_axis(y + distance * sin, off_y, bounds.height - off_y);

    body.set_position(new_x, new_y);
}

/// Advances a ship: friction, thrust, speed clamp, movement, then turning.
pub fn advance_ship(ship: &mut Ship, frames: u32, bounds: Bounds) {
    let frames_f = frames as f64;

    ship.speed *= 1.0 - FRICTION * frames_f;
    if ship.accelerating_forward {
        ship.speed += frames_f * ship.forward_acceleration;
    }
    if ship.accelerating_backward {
        ship.speed -= frames_f * ship.reverse_acceleration;
    }
    ship.speed = truncate(ship.speed, 2)
        .max(ship.max_reverse_speed)
        .min(ship.max_forward_speed);

    advance_position(ship, frames, bounds);

    let diff = bearing_diff(ship.bearing_goal, ship.bearing);
    let turn = (frames_f * ship.max_turn).min(diff.abs());
    let turn = if diff < 0.0 { -turn } else { turn };
    ship.bearing = truncate(modulo(ship.bearing + turn, 360.0), 2);
}

pub fn advance_bullet(bullet: &mut Bullet, frames: u32, bounds: Bounds) {
    advance_position(bullet, frames, bounds);
}

/// True once any part of the bullet has reached a wall.
pub fn bullet_out_of_bounds(bullet: &Bullet, bounds: Bounds) -> bool {
    bullet.x - bullet.length < 0.0
        || bullet.x + bullet.length > bounds.width
        || bullet.y - bullet.length < 0.0
        || bullet.y + bullet.length > bounds.height
}

/// Runs one frame of the ship's weapon cadence and returns the spawned bullet, if any.
pub fn fire(ship: &mut Ship) -> Option<Bullet> {
    if ship.shoot_cooldown > 0 {
        ship.shoot_cooldown -= 1;
        return None;
    }
    if !ship.firing {
        return None;
    }
    ship.shoot_cooldown = SHOOT_COOLDOWN_FRAMES;

    let rad = ship.bearing.to_radians();
    Some(Bullet {
        x: ship.x + rad.cos() * ship.length / 2.0,
        y: ship.y + rad.sin() * ship.length / 2.0,
        bearing: ship.bearing,
        speed: ship.speed + BULLET_SPEED_BONUS,
        width: BULLET_WIDTH,
        length: BULLET_LENGTH,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{WORLD_HEIGHT, WORLD_WIDTH};
    use assert_approx_eq::assert_approx_eq;

    fn bounds() -> Bounds {
        Bounds {
            width: WORLD_WIDTH,
            height: WORLD_HEIGHT,
        }
    }

    fn projected_offsets(bearing: f64, length: f64) -> (f64, f64) {
        let rad = bearing.to_radians();
        ((length / 2.0 * rad.cos()).abs(), (length / 2.0 * rad.sin()).abs())
    }

    #[test]
    fn test_truncate_is_sign_preserving_floor() {
        assert_eq!(truncate(1.239, 2), 1.23);
        assert_eq!(truncate(-1.239, 2), -1.23);
        assert_eq!(truncate(0.999, 2), 0.99);
        assert_eq!(truncate(2.0, 2), 2.0);
        assert_eq!(truncate(0.0, 2), 0.0);
    }

    #[test]
    fn test_modulo_and_bearing_diff() {
        assert_eq!(modulo(-30.0, 360.0), 330.0);
        assert_eq!(modulo(370.0, 360.0), 10.0);
        assert_eq!(bearing_diff(10.0, 350.0), 20.0);
        assert_eq!(bearing_diff(350.0, 10.0), -20.0);
        assert_eq!(bearing_diff(180.0, 0.0), 180.0);
        assert_eq!(bearing_diff(0.0, 180.0), 180.0);
    }

    #[test]
    fn test_angle_to_cardinal_directions() {
        assert_approx_eq!(angle_to(10.0, 0.0), 0.0, 1e-9);
        assert_approx_eq!(angle_to(0.0, 10.0), 90.0, 1e-9);
        assert_approx_eq!(angle_to(-10.0, 0.0), 180.0, 1e-9);
        assert_approx_eq!(angle_to(0.0, -10.0), 270.0, 1e-9);
    }

    #[test]
    fn test_single_thrust_tick() {
        let mut ship = Ship::new(1);
        ship.accelerating_forward = true;

        advance_ship(&mut ship, 1, bounds());

        assert_eq!(ship.speed, 1.0);
        assert_eq!(ship.x, 201.0);
        assert_eq!(ship.y, 200.0);
        assert_eq!(ship.bearing, 0.0);
    }

    #[test]
    fn test_friction_decays_speed() {
        let mut ship = Ship::new(1);
        ship.speed = 10.0;

        advance_ship(&mut ship, 1, bounds());

        assert_eq!(ship.speed, 9.6);
        assert_eq!(ship.x, 209.6);
    }

    #[test]
    fn test_speed_stays_within_limits() {
        let mut ship = Ship::new(1);
        ship.accelerating_forward = true;
        for _ in 0..200 {
            advance_ship(&mut ship, 1, bounds());
            assert!(ship.speed <= ship.max_forward_speed);
            assert!(ship.speed >= ship.max_reverse_speed);
        }

        ship.accelerating_forward = false;
        ship.accelerating_backward = true;
        for frames in [1, 3, 10] {
            for _ in 0..100 {
                advance_ship(&mut ship, frames, bounds());
                assert!(ship.speed <= ship.max_forward_speed);
                assert!(ship.speed >= ship.max_reverse_speed);
            }
        }
        assert_eq!(ship.speed, ship.max_reverse_speed);
    }

    #[test]
    fn test_turn_is_capped_and_takes_shortest_path() {
        let cases = [
            (0.0, 90.0, 2.0),
            (0.0, 270.0, 358.0),
            (350.0, 10.0, 352.0),
            (10.0, 350.0, 8.0),
            (100.0, 101.5, 101.5),
        ];
        for (start, goal, expected) in cases {
            let mut ship = Ship::new(1);
            ship.bearing = start;
            ship.bearing_goal = goal;

            advance_ship(&mut ship, 1, bounds());

            assert_eq!(ship.bearing, expected, "start {} goal {}", start, goal);
            let turned = bearing_diff(ship.bearing, start);
            assert!(turned.abs() <= ship.max_turn + 1e-9);
            let wanted = bearing_diff(goal, start);
            assert_eq!(turned.signum(), wanted.signum());
        }
    }

    #[test]
    fn test_multi_frame_turn_cap() {
        let mut ship = Ship::new(1);
        ship.bearing_goal = 180.0 - 1.0;

        advance_ship(&mut ship, 5, bounds());

        assert_eq!(ship.bearing, 10.0);
    }

    #[test]
    fn test_position_clamped_against_walls() {
        for bearing in [0.0, 30.0, 45.0, 90.0, 135.0, 200.0, 300.0] {
            let mut ship = Ship::new(1);
            ship.bearing = bearing;
            ship.bearing_goal = bearing;
            ship.max_forward_speed = 10_000.0;
            ship.speed = 9_000.0;

            advance_ship(&mut ship, 1, bounds());

            let (off_x, off_y) = projected_offsets(ship.bearing, ship.length);
            assert!(ship.x >= off_x && ship.x <= WORLD_WIDTH - off_x, "x {}", ship.x);
            assert!(ship.y >= off_y && ship.y <= WORLD_HEIGHT - off_y, "y {}", ship.y);
        }
    }

    #[test]
    fn test_reverse_into_corner_is_clamped() {
        let mut ship = Ship::at(1, 31.0, 31.0);
        ship.bearing = 45.0;
        ship.bearing_goal = 45.0;
        ship.speed = -4.0;

        for _ in 0..20 {
            advance_ship(&mut ship, 1, bounds());
        }

        let (off_x, off_y) = projected_offsets(45.0, ship.length);
        assert!(ship.x >= off_x);
        assert!(ship.y >= off_y);
    }

    #[test]
    fn test_replay_is_bit_identical() {
        let run = || {
            let mut ship = Ship::new(1);
            ship.accelerating_forward = true;
            ship.bearing_goal = 123.0;
            for frame in 0..300 {
                if frame == 90 {
                    ship.bearing_goal = 271.0;
                }
                if frame == 150 {
                    ship.accelerating_forward = false;
                    ship.accelerating_backward = true;
                }
                advance_ship(&mut ship, 1, bounds());
            }
            ship
        };

        let a = run();
        let b = run();
        assert_eq!(a.x.to_bits(), b.x.to_bits());
        assert_eq!(a.y.to_bits(), b.y.to_bits());
        assert_eq!(a.speed.to_bits(), b.speed.to_bits());
        assert_eq!(a.bearing.to_bits(), b.bearing.to_bits());
    }

    #[test]
    fn test_bullet_leaves_world() {
        let mut bullet = Bullet {
            x: WORLD_WIDTH - 20.0,
            y: 100.0,
            bearing: 0.0,
            speed: 15.0,
            width: BULLET_WIDTH,
            length: BULLET_LENGTH,
        };
        assert!(!bullet_out_of_bounds(&bullet, bounds()));

        advance_bullet(&mut bullet, 1, bounds());
        assert_eq!(bullet.x, WORLD_WIDTH - 5.0);
        assert!(!bullet_out_of_bounds(&bullet, bounds()));

        advance_bullet(&mut bullet, 1, bounds());
        assert_eq!(bullet.x, WORLD_WIDTH - BULLET_LENGTH / 2.0);
        assert!(bullet_out_of_bounds(&bullet, bounds()));
    }

    #[test]
    fn test_fire_cadence() {
        let mut ship = Ship::new(1);
        ship.speed = 3.0;
        assert!(fire(&mut ship).is_none());

        ship.firing = true;
        let bullet = fire(&mut ship).expect("first shot");
        assert_approx_eq!(bullet.x, 230.0, 1e-9);
        assert_approx_eq!(bullet.y, 200.0, 1e-9);
        assert_eq!(bullet.speed, 18.0);
        assert_eq!(ship.shoot_cooldown, SHOOT_COOLDOWN_FRAMES);

        for _ in 0..SHOOT_COOLDOWN_FRAMES {
            assert!(fire(&mut ship).is_none());
        }
        assert!(fire(&mut ship).is_some());
    }
}
