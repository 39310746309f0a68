use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const FIELD_WIDTH: f32 = 800.0;
pub const FIELD_HEIGHT: f32 = 600.0;
pub const PLAYER_SIZE: f32 = 4.0;
pub const MOVEMENT_SPEED: f32 = 5.0;
pub const CENTER_X: f32 = 400.0;
pub const CENTER_Y: f32 = 300.0;

pub const NAME_MIN_LEN: usize = 2;
pub const NAME_MAX_LEN: usize = 20;

pub const TICK_INTERVAL_MS: u64 = 16;
pub const WRITE_INTERVAL_MS: u64 = 50;

pub const PLAYERS_TABLE: &str = "players";

/// Colors handed out to joining players.
pub const PALETTE: [&str; 15] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4", "#FFEAA7", "#DDA0DD", "#98D8C8", "#F7DC6F",
    "#BB8FCE", "#85C1E9", "#F8C471", "#82E0AA", "#F1948A", "#85C1E9", "#D7BDE2",
];

/// One player's persisted state in the shared table.
///
/// `created_at` is assigned by the database and is never written by clients.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerRow {
    pub id: Uuid,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl PlayerRow {
    /// Builds the row for a freshly joined player, placed at the field center.
    pub fn join(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            x: CENTER_X,
            y: CENTER_Y,
            color: color.into(),
            created_at: None,
        }
    }

    pub fn position(&self) -> Position {
        Position {
            x: self.x,
            y: self.y,
        }
    }

    pub fn set_position(&mut self, position: Position) {
        self.x = position.x;
        self.y = position.y;
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + PLAYER_SIZE / 2.0, self.y + PLAYER_SIZE / 2.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

pub fn clamp_to_field(x: f32, y: f32) -> (f32, f32) {
    (
        x.clamp(0.0, FIELD_WIDTH - PLAYER_SIZE),
        y.clamp(0.0, FIELD_HEIGHT - PLAYER_SIZE),
    )
}

/// Applies one tick of displacement and keeps the square fully inside the field.
pub fn step_position(position: Position, dx: f32, dy: f32) -> Position {
    let (x, y) = clamp_to_field(position.x + dx, position.y + dy);
    Position { x, y }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NameError {
    #[error("Please enter your name")]
    Empty,
    #[error("Name must be at least 2 characters long")]
    TooShort,
    #[error("Name must be at most 20 characters long")]
    TooLong,
}

/// Trims the entered name and checks its length in characters.
pub fn validate_name(raw: &str) -> Result<String, NameError> {
    let name = raw.trim();
    let len = name.chars().count();

    if len == 0 {
        return Err(NameError::Empty);
    }
    if len < NAME_MIN_LEN {
        return Err(NameError::TooShort);
    }
    if len > NAME_MAX_LEN {
        return Err(NameError::TooLong);
    }

    Ok(name.to_string())
}

pub fn random_color() -> String {
    PALETTE
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(PALETTE[0])
        .to_string()
}

/// Parses `#RRGGBB` into its three channels.
pub fn parse_hex_color(color: &str) -> Option<[u8; 3]> {
    let hex = color.strip_prefix('#')?;
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(hex.get(range)?, 16).ok();
    Some([channel(0..2)?, channel(2..4)?, channel(4..6)?])
}
