//! Common types shared by the relay, the engine and every client.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a player.
///
/// A connection starts with an ephemeral `temp-<uuid>` id and may replace it
/// with a persistent client-chosen id via a `clientId` message.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Creates a PlayerId from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates a fresh ephemeral id for a connection that has not yet
    /// announced its persistent identity.
    pub fn ephemeral() -> Self {
        Self(format!("temp-{}", Uuid::new_v4()))
    }

    /// Returns true if this id was minted by [`PlayerId::ephemeral`].
    pub fn is_ephemeral(&self) -> bool {
        self.0.starts_with("temp-")
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A discrete movement direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// All four directions in arm/scan order.
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Unit step in grid coordinates (y grows downwards).
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

/// Directional flags for multi-directional movement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Movement {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl Movement {
    /// Net axis intent as (-1|0|1, -1|0|1). Opposite flags cancel out.
    pub fn axes(&self) -> (i32, i32) {
        let dx = i32::from(self.right) - i32::from(self.left);
        let dy = i32::from(self.down) - i32::from(self.up);
        (dx, dy)
    }

    /// Flags equivalent to a single discrete direction.
    pub fn from_direction(direction: Direction) -> Self {
        let mut movement = Self::default();
        match direction {
            Direction::Up => movement.up = true,
            Direction::Down => movement.down = true,
            Direction::Left => movement.left = true,
            Direction::Right => movement.right = true,
        }
        movement
    }
}

/// A single player's intent for one tick.
///
/// Clients may send either a discrete `direction` or `movement` flags; when
/// both are present the flags win.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInput {
    pub player_id: PlayerId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movement: Option<Movement>,

    #[serde(default, alias = "placeBlob")]
    pub place_bomb: bool,
}

impl PlayerInput {
    /// An input that does nothing, used to announce a player.
    pub fn idle(player_id: PlayerId) -> Self {
        Self {
            player_id,
            direction: None,
            movement: None,
            place_bomb: false,
        }
    }

    /// Normalized axis intent (dx, dy), each in -1..=1.
    pub fn axes(&self) -> (i32, i32) {
        match (self.movement, self.direction) {
            (Some(movement), _) => movement.axes(),
            (None, Some(direction)) => direction.delta(),
            (None, None) => (0, 0),
        }
    }
}

/// All inputs collected by the relay for one tick, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickRecord {
    pub tick: u64,
    pub inputs: Vec<PlayerInput>,
}

impl TickRecord {
    /// Creates a tick record.
    pub fn new(tick: u64, inputs: Vec<PlayerInput>) -> Self {
        Self { tick, inputs }
    }

    /// A tick with no inputs.
    pub fn empty(tick: u64) -> Self {
        Self {
            tick,
            inputs: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ephemeral_ids_are_unique() {
        let a = PlayerId::ephemeral();
        let b = PlayerId::ephemeral();
        assert_ne!(a, b);
        assert!(a.is_ephemeral());
        assert!(!PlayerId::new("alice").is_ephemeral());
    }

    #[test]
    fn test_movement_axes_cancel() {
        let movement = Movement {
            up: true,
            down: true,
            left: false,
            right: true,
        };
        assert_eq!(movement.axes(), (1, 0));
    }

    #[test]
    fn test_input_flags_take_precedence() {
        let input = PlayerInput {
            player_id: "p".into(),
            direction: Some(Direction::Left),
            movement: Some(Movement::from_direction(Direction::Down)),
            place_bomb: false,
        };
        assert_eq!(input.axes(), (0, 1));
    }

    #[test]
    fn test_input_accepts_legacy_place_blob() {
        let input: PlayerInput =
            serde_json::from_str(r#"{"playerId":"p1","direction":"up","placeBlob":true}"#)
                .unwrap();
        assert!(input.place_bomb);
        assert_eq!(input.direction, Some(Direction::Up));
        assert_eq!(input.axes(), (0, -1));
    }
}
