//! Keyboard sampling for movement and session controls

use macroquad::prelude::*;

/// Movement keys held during the current frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeldKeys {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl HeldKeys {
    /// Per-tick displacement; opposite keys cancel out.
    pub fn displacement(&self, speed: f32) -> (f32, f32) {
        let mut dx = 0.0;
        let mut dy = 0.0;

        if self.up {
            dy -= speed;
        }
        if self.down {
            dy += speed;
        }
        if self.left {
            dx -= speed;
        }
        if self.right {
            dx += speed;
        }

        (dx, dy)
    }
}

/// One-shot key presses detected this frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Controls {
    pub leave: bool,
    pub retry: bool,
}

/// Samples the keyboard once per frame.
pub struct InputManager {
    // Previous frame key states for edge detection
    prev_escape: bool,
    prev_r: bool,
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            prev_escape: false,
            prev_r: false,
        }
    }

    /// Reads W/A/S/D (or arrow keys) and the session control keys.
    pub fn update(&mut self) -> (HeldKeys, Controls) {
        let held = HeldKeys {
            up: is_key_down(KeyCode::W) || is_key_down(KeyCode::Up),
            down: is_key_down(KeyCode::S) || is_key_down(KeyCode::Down),
            left: is_key_down(KeyCode::A) || is_key_down(KeyCode::Left),
            right: is_key_down(KeyCode::D) || is_key_down(KeyCode::Right),
        };

        let escape = is_key_down(KeyCode::Escape);
        let r = is_key_down(KeyCode::R);

        let controls = Controls {
            leave: escape && !self.prev_escape,
            retry: r && !self.prev_r,
        };

        self.prev_escape = escape;
        self.prev_r = r;

        (held, controls)
    }

}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_manager_creation() {
        let input_manager = InputManager::new();
        assert!(!input_manager.prev_escape);
        assert!(!input_manager.prev_r);
    }

    #[test]
    fn test_displacement_per_key() {
        let up = HeldKeys {
            up: true,
            ..Default::default()
        };
        assert_eq!(up.displacement(5.0), (0.0, -5.0));

        let down_right = HeldKeys {
            down: true,
            right: true,
            ..Default::default()
        };
        assert_eq!(down_right.displacement(5.0), (5.0, 5.0));
    }

    #[test]
    fn test_opposite_keys_cancel() {
        let keys = HeldKeys {
            up: true,
            down: true,
            left: true,
            right: false,
        };
        assert_eq!(keys.displacement(5.0), (-5.0, 0.0));
    }
}
