use serde::Serialize;
use std::collections::{HashMap, VecDeque};

/// A grid cell. Serialized as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "[i32; 2]")]
pub struct Cell {
  pub x: i32,
  pub y: i32,
}

impl Cell {
  pub const fn new(x: i32, y: i32) -> Self {
    Self { x, y }
  }
}

impl From<Cell> for [i32; 2] {
  fn from(cell: Cell) -> Self {
    [cell.x, cell.y]
  }
}

/// One of the eight non-zero unit steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Direction {
  dx: i32,
  dy: i32,
}

impl Direction {
  /// Heading of every freshly spawned snake.
  pub const RIGHT: Direction = Direction { dx: 1, dy: 0 };

  pub fn new(dx: i32, dy: i32) -> Option<Self> {
    let in_range = (-1..=1).contains(&dx) && (-1..=1).contains(&dy);
    if !in_range || (dx == 0 && dy == 0) {
      return None;
    }
    Some(Self { dx, dy })
  }

  pub fn dx(self) -> i32 {
    self.dx
  }

  pub fn dy(self) -> i32 {
    self.dy
  }

  pub fn opposite(self) -> Self {
    Self {
      dx: -self.dx,
      dy: -self.dy,
    }
  }

  pub fn is_opposite(self, other: Direction) -> bool {
    self.opposite() == other
  }
}

#[cfg(test)]
impl Direction {
  pub const LEFT: Direction = Direction { dx: -1, dy: 0 };
  pub const UP: Direction = Direction { dx: 0, dy: -1 };
  pub const DOWN: Direction = Direction { dx: 0, dy: 1 };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeathCause {
  #[serde(rename = "head_collision")]
  HeadCollision,
  #[serde(rename = "self")]
  SelfCollision,
  #[serde(rename = "other")]
  Other,
}

impl DeathCause {
  pub fn as_str(self) -> &'static str {
    match self {
      DeathCause::HeadCollision => "head_collision",
      DeathCause::SelfCollision => "self",
      DeathCause::Other => "other",
    }
  }
}

#[derive(Debug, Clone)]
pub struct Player {
  pub id: String,
  pub name: String,
  pub color: String,
  /// Head first.
  pub body: VecDeque<Cell>,
  pub direction: Direction,
  pub pending_direction: Direction,
  pub alive: bool,
  pub score: u32,
  pub food_collected: u32,
  pub spawn_tick: u64,
  pub last_input_at: i64,
}

impl Player {
  pub fn head(&self) -> Option<Cell> {
    self.body.front().copied()
  }

  pub fn tail(&self) -> Option<Cell> {
    self.body.back().copied()
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerSnapshot {
  pub id: String,
  pub body: Vec<Cell>,
  pub alive: bool,
  pub color: String,
  pub score: u32,
  pub name: String,
  pub food_collected: u32,
  pub snake_length: usize,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub death_cause: Option<DeathCause>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GameSnapshot {
  pub tick: u64,
  pub width: i32,
  pub height: i32,
  pub food: Vec<Cell>,
  pub players: HashMap<String, PlayerSnapshot>,
}
