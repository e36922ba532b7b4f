//! Client input capture with sequencing and change detection

use macroquad::prelude::*;
use shared::input::{KEY_DOWN, KEY_E, KEY_S, KEY_SPACE, KEY_UP, KEY_W};
use shared::physics::angle_to;
use shared::{timestamp_ms, InputMessage};

/// Minimum time between two pointer samples that may change the bearing goal.
pub const BEARING_COOLDOWN_MS: u64 = 60;

const WATCHED_KEYS: [(KeyCode, u32); 6] = [
    (KeyCode::W, KEY_W),
    (KeyCode::Up, KEY_UP),
    (KeyCode::S, KEY_S),
    (KeyCode::Down, KEY_DOWN),
    (KeyCode::Space, KEY_SPACE),
    (KeyCode::E, KEY_E),
];

/// Turns raw keyboard and pointer activity into sequenced [`InputMessage`]s.
pub struct InputManager {
    next_sequence: u32,
    last_bearing_sample: Option<u64>,
    last_bearing: Option<f64>,

    // Previous frame states for edge detection
    key_states: [bool; WATCHED_KEYS.len()],
    mouse_down: bool,
    mouse_position: (f32, f32),
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            next_sequence: 1,
            last_bearing_sample: None,
            last_bearing: None,
            key_states: [false; WATCHED_KEYS.len()],
            mouse_down: false,
            mouse_position: (0.0, 0.0),
        }
    }

    /// A key went down or up.
    pub fn key_event(&mut self, key: u32, down: bool, now: u64) -> InputMessage {
        let seq = self.take_sequence();
        InputMessage::keystroke(key, down, now, seq)
    }

    /// The pointer moved to `(dx, dy)` relative to the local ship, which is
    /// always drawn at the screen center.
    ///
    /// Samples inside the cooldown are ignored, and a bearing goal is only
    /// emitted when its rounded value differs from the last one sent.
    pub fn pointer_moved(&mut self, dx: f64, dy: f64, now: u64) -> Option<InputMessage> {
        if let Some(last) = self.last_bearing_sample {
            if now < last + BEARING_COOLDOWN_MS {
                return None;
            }
        }
        self.last_bearing_sample = Some(now);

        let bearing = angle_to(dx, dy).round() % 360.0;
        if self.last_bearing == Some(bearing) {
            return None;
        }
        self.last_bearing = Some(bearing);

        let seq = self.take_sequence();
        Some(InputMessage::bearing(bearing, now, seq))
    }

    /// Polls macroquad for this frame's input edges.
    pub fn update(&mut self) -> Vec<InputMessage> {
        let now = timestamp_ms();
        let mut messages = Vec::new();

        for (index, (code, key)) in WATCHED_KEYS.iter().enumerate() {
            let down = is_key_down(*code);
            if down != self.key_states[index] {
                self.key_states[index] = down;
                messages.push(self.key_event(*key, down, now));
            }
        }

        // The left button doubles as the fire key.
        let mouse_down = is_mouse_button_down(MouseButton::Left);
        if mouse_down != self.mouse_down {
            self.mouse_down = mouse_down;
            messages.push(self.key_event(KEY_SPACE, mouse_down, now));
        }

        let position = mouse_position();
        if position != self.mouse_position {
            self.mouse_position = position;
            let dx = (position.0 - screen_width() / 2.0) as f64;
            let dy = (position.1 - screen_height() / 2.0) as f64;
            messages.extend(self.pointer_moved(dx, dy, now));
        }

        messages
    }

    /// Forgets per-session state after a disconnect.
    ///
    /// A fresh ship starts with every flag off, so keys and the pointer are
    /// treated as released. Anything still held is sent again on the next
    /// `update`.
    pub fn reset(&mut self) {
        self.next_sequence = 1;
        self.last_bearing_sample = None;
        self.last_bearing = None;
        self.key_states = [false; WATCHED_KEYS.len()];
        self.mouse_down = false;
        self.mouse_position = (0.0, 0.0);
    }

    fn take_sequence(&mut self) -> u32 {
        let seq = self.next_sequence;
        self.next_sequence += 1;
        seq
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}
