//! Rendering with macroquad
//!
//! The camera follows the local ship. Ships are drawn as triangles with one
//! dot per port colored by its state, bullets as short red lines.

use macroquad::prelude::*;
use shared::world::{BOW, PORT_SIDE, STARBOARD, STERN};
use shared::{Bullet, PortState, Ship, World};

const GRID_SIZE: f64 = 100.0;
const PORT_RADIUS: f32 = 3.0;

#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub player_id: Option<u32>,
    pub fake_ping_ms: u64,
    pub jitter_ms: u64,
    pub buffered_snapshots: usize,
    pub pending_inputs: usize,
    pub debug: bool,
}

/// Draws the world from the point of view of the local ship, which stays at
/// the center of the screen. Nothing here mutates game state.
///
/// The viewport follows the window, so its size is read from macroquad at
/// the start of every draw call.
pub struct Renderer {
    width: f32,
    height: f32,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            width: 0.0,
            height: 0.0,
        }
    }

    fn fit_to_screen(&mut self) {
        self.width = screen_width();
        self.height = screen_height();
    }

    /// Draws one frame of the game
    ///
    /// `local` is the predicted local ship; the copy of it inside `world` is
    /// skipped so the player is always drawn from the prediction, on top of
    /// every other ship. Only ships and bullets overlapping the viewport are
    /// drawn.
    pub fn render(&mut self, world: &World, local: &Ship, config: &RenderConfig) {
        self.fit_to_screen();
        clear_background(Color::from_rgba(238, 238, 238, 255));

        self.draw_grid(world, local);

        for ship in &world.players {
            if ship.id != local.id && self.in_view(local, ship.x, ship.y, ship.length) {
                self.draw_ship(local, ship, GRAY);
            }
        }
        // Always draw the player on top.
        self.draw_ship(local, local, DARKGRAY);

        for bullet in &world.bullets {
            if self.in_view(local, bullet.x, bullet.y, bullet.length) {
                self.draw_bullet(local, bullet);
            }
        }

        self.draw_ui(world, local, config);
    }

    /// Shown before the first world arrives and after a forced disconnect.
    pub fn draw_waiting(&mut self, status: &str) {
        self.fit_to_screen();
        clear_background(Color::from_rgba(26, 26, 26, 255));

        let size = 24.0;
        let dimensions = measure_text(status, None, size as u16, 1.0);
        draw_text(
            status,
            (self.width - dimensions.width) / 2.0,
            self.height / 2.0,
            size,
            WHITE,
        );
    }

    fn to_screen(&self, local: &Ship, x: f64, y: f64) -> Vec2 {
        screen_offset(self.width, self.height, local, x, y)
    }

    fn in_view(&self, local: &Ship, x: f64, y: f64, length: f64) -> bool {
        let half_width = self.width as f64 / 2.0;
        let half_height = self.height as f64 / 2.0;
        x + length > local.x - half_width
            && x - length < local.x + half_width
            && y + length > local.y - half_height
            && y - length < local.y + half_height
    }

    fn draw_grid(&self, world: &World, local: &Ship) {
        let color = Color::from_rgba(200, 200, 200, 255);
        let half_width = self.width as f64 / 2.0;
        let half_height = self.height as f64 / 2.0;

        let top = self.to_screen(local, 0.0, (local.y - half_height).max(0.0)).y;
        let bottom = self
            .to_screen(local, 0.0, (local.y + half_height).min(world.height))
            .y;
        let first = ((local.x - half_width) / GRID_SIZE).floor().max(0.0) as i64;
        let last = ((local.x + half_width).min(world.width) / GRID_SIZE).floor() as i64;
        for i in first..=last {
            let x = self.to_screen(local, i as f64 * GRID_SIZE, 0.0).x;
            draw_line(x, top, x, bottom, 1.0, color);
        }

        let left = self.to_screen(local, (local.x - half_width).max(0.0), 0.0).x;
        let right = self
            .to_screen(local, (local.x + half_width).min(world.width), 0.0)
            .x;
        let first = ((local.y - half_height) / GRID_SIZE).floor().max(0.0) as i64;
        let last = ((local.y + half_height).min(world.height) / GRID_SIZE).floor() as i64;
        for i in first..=last {
            let y = self.to_screen(local, 0.0, i as f64 * GRID_SIZE).y;
            draw_line(left, y, right, y, 1.0, color);
        }
    }

    fn draw_ship(&self, local: &Ship, ship: &Ship, color: Color) {
        let center = self.to_screen(local, ship.x, ship.y);
        let [a, b, c] = hull_points(ship);
        draw_triangle(center + a, center + b, center + c, color);

        for (index, offset) in port_offsets(ship).iter().enumerate() {
            let position = center + *offset;
            draw_circle(position.x, position.y, PORT_RADIUS, port_color(ship.ports[index]));
        }
    }

    fn draw_bullet(&self, local: &Ship, bullet: &Bullet) {
        let center = self.to_screen(local, bullet.x, bullet.y);
        let half = rotate(vec2(bullet.length as f32 / 2.0, 0.0), bullet.bearing);
        let tail = center - half;
        let head = center + half;
        draw_line(tail.x, tail.y, head.x, head.y, bullet.width as f32, RED);
    }

    fn draw_ui(&self, world: &World, local: &Ship, config: &RenderConfig) {
        let connection_color = if config.player_id.is_some() { GREEN } else { RED };
        draw_rectangle(10.0, 10.0, 8.0, 8.0, connection_color);
        draw_text(
            &format!("ship {}  {} players", local.id, world.players.len()),
            24.0,
            18.0,
            16.0,
            BLACK,
        );

        if config.fake_ping_ms > 0 || config.jitter_ms > 0 {
            draw_text(
                &format!("fake ping {}ms  jitter {}ms", config.fake_ping_ms, config.jitter_ms),
                10.0,
                36.0,
                16.0,
                BLACK,
            );
        }

        if config.debug {
            let text = format!(
                "({}, {}, {}) {}  snapshots {}  unacked {}",
                local.x,
                local.y,
                local.bearing,
                local.speed,
                config.buffered_snapshots,
                config.pending_inputs
            );
            let dimensions = measure_text(&text, None, 15, 1.0);
            draw_text(
                &text,
                self.width * 0.95 - dimensions.width,
                self.height * 0.95,
                15.0,
                BLACK,
            );
        }
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

fn port_color(state: PortState) -> Color {
    match state {
        PortState::Closed => Color::from_rgba(204, 204, 204, 255),
        PortState::Open => Color::from_rgba(0, 255, 0, 255),
        PortState::Active => RED,
        PortState::Attached => Color::from_rgba(0, 102, 255, 255),
    }
}

/// Rotates a ship-local offset by `bearing` degrees into screen orientation.
fn rotate(point: Vec2, bearing: f64) -> Vec2 {
    let rad = bearing.to_radians() as f32;
    let (sin, cos) = rad.sin_cos();
    vec2(point.x * cos - point.y * sin, point.x * sin + point.y * cos)
}

fn screen_offset(width: f32, height: f32, local: &Ship, x: f64, y: f64) -> Vec2 {
    vec2(
        width / 2.0 + (x - local.x) as f32,
        height / 2.0 + (y - local.y) as f32,
    )
}

/// Triangle vertices relative to the ship center: two at the stern corners,
/// one at the bow.
fn hull_points(ship: &Ship) -> [Vec2; 3] {
    let half_length = ship.length as f32 / 2.0;
    let half_width = ship.width as f32 / 2.0;
    [
        rotate(vec2(-half_length, -half_width), ship.bearing),
        rotate(vec2(-half_length, half_width), ship.bearing),
        rotate(vec2(half_length, 0.0), ship.bearing),
    ]
}

fn port_offsets(ship: &Ship) -> [Vec2; 4] {
    let half_length = ship.length as f32 / 2.0;
    let quarter_width = ship.width as f32 / 4.0;
    let mut offsets = [Vec2::ZERO; 4];
    offsets[BOW] = rotate(vec2(half_length, 0.0), ship.bearing);
    offsets[STARBOARD] = rotate(vec2(0.0, quarter_width), ship.bearing);
    offsets[STERN] = rotate(vec2(-half_length, 0.0), ship.bearing);
    offsets[PORT_SIDE] = rotate(vec2(0.0, -quarter_width), ship.bearing);
    offsets
}
