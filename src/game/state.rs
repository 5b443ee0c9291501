use super::constants::{MAX_SPAWN_ATTEMPTS, SPAWN_EDGE_MARGIN};
use super::grid::Grid;
use super::types::{Cell, DeathCause, Direction, GameSnapshot, Player, PlayerSnapshot};
use crate::app::config::GameConfig;
use crate::app::time::now_millis;
use crate::shared::names::sanitize_player_name;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet, VecDeque};
use std::ops::RangeInclusive;

mod tick;


/// The single shared aggregate. Only the tick loop holds it mutably.
#[derive(Debug, Clone)]
pub struct GameState {
  grid: Grid,
  start_length: usize,
  food_target: usize,
  players: HashMap<String, Player>,
  food: Vec<Cell>,
  /// Alive bodies plus food. Always recomputable from `players` and `food`.
  occupied: HashSet<Cell>,
  tick: u64,
  death_causes: HashMap<String, DeathCause>,
  rng: StdRng,
}

impl GameState {
  pub fn new(config: &GameConfig) -> Self {
    Self::with_rng(config, StdRng::from_entropy())
  }

  pub fn with_rng(config: &GameConfig, rng: StdRng) -> Self {
    let mut state = Self {
      grid: Grid::new(config.width, config.height),
      start_length: config.start_length.max(1),
      food_target: config.food_count,
      players: HashMap::new(),
      food: Vec::new(),
      occupied: HashSet::new(),
      tick: 0,
      death_causes: HashMap::new(),
      rng,
    };
    state.spawn_food();
    tracing::info!(
      width = config.width,
      height = config.height,
      "game initialized"
    );
    state
  }

  pub fn tick(&self) -> u64 {
    self.tick
  }

  pub fn grid(&self) -> Grid {
    self.grid
  }

  pub fn player_count(&self) -> usize {
    self.players.len()
  }

  pub fn alive_count(&self) -> usize {
    self.players.values().filter(|player| player.alive).count()
  }

  /// Spawns a fresh incarnation, replacing any existing player with this id.
  pub fn add_player(&mut self, player_id: &str, name: &str) {
    if self.players.contains_key(player_id) {
      self.remove_player(player_id);
    }

    let body = match self.find_spawn_body() {
      Some(body) => body,
      None => {
        tracing::warn!(player_id, "no free spawn area, spawning unchecked");
        let anchor = self.grid.random_cell(&mut self.rng);
        self.body_from_anchor(anchor)
      }
    };
    self.occupied.extend(body.iter().copied());

    let hue = self.rng.gen_range(0..=360);
    let player = Player {
      id: player_id.to_string(),
      name: name.to_string(),
      color: format!("hsl({hue}, 100%, 50%)"),
      body,
      direction: Direction::RIGHT,
      pending_direction: Direction::RIGHT,
      alive: true,
      score: 0,
      food_collected: 0,
      spawn_tick: self.tick,
      last_input_at: now_millis(),
    };
    if let Some(head) = player.head() {
      tracing::info!(player_id, x = head.x, y = head.y, tick = self.tick, "player spawned");
    }
    self.players.insert(player_id.to_string(), player);
  }

  /// Deletes the player and its recorded death cause. Unknown ids are a no-op.
  pub fn remove_player(&mut self, player_id: &str) -> bool {
    let Some(player) = self.players.remove(player_id) else { return false };
    self.death_causes.remove(player_id);
    if player.alive {
      self.rebuild_occupancy();
    }
    tracing::info!(player_id, "player removed");
    true
  }

  pub fn set_pending_direction(&mut self, player_id: &str, direction: Direction, at: i64) -> bool {
    let Some(player) = self.players.get_mut(player_id) else { return false };
    if !player.alive {
      return false;
    }
    player.pending_direction = direction;
    player.last_input_at = at;
    true
  }

  /// Remove-then-add under the same id and display name. Only dead players
  /// may respawn.
  pub fn respawn_player(&mut self, player_id: &str) -> bool {
    let name = match self.players.get(player_id) {
      Some(player) if !player.alive => player.name.clone(),
      _ => return false,
    };
    self.remove_player(player_id);
    self.add_player(player_id, &name);
    tracing::debug!(player_id, tick = self.tick, "player respawned");
    true
  }

  pub fn rename_player(&mut self, player_id: &str, name: &str) -> Option<String> {
    let player = self.players.get_mut(player_id)?;
    let name = sanitize_player_name(name)?;
    player.name = name.clone();
    Some(name)
  }

  /// Tops food up to the target count. Stops early when the board is full.
  pub fn spawn_food(&mut self) {
    while self.food.len() < self.food_target {
      if self.occupied.len() >= self.grid.cell_count() {
        tracing::debug!(food = self.food.len(), "board full, food not replenished");
        break;
      }
      let cell = self.grid.find_empty_cell(&mut self.rng, &self.occupied);
      if self.occupied.contains(&cell) {
        tracing::debug!(food = self.food.len(), "no free cell for food");
        break;
      }
      self.food.push(cell);
      self.occupied.insert(cell);
    }
  }

  pub fn snapshot(&self) -> GameSnapshot {
    let players = self
      .players
      .values()
      .map(|player| {
        let id = &player.id;
        let snapshot = PlayerSnapshot {
          id: id.clone(),
          body: player.body.iter().copied().collect(),
          alive: player.alive,
          color: player.color.clone(),
          score: player.score,
          name: player.name.clone(),
          food_collected: player.food_collected,
          snake_length: player.body.len(),
          death_cause: self.death_causes.get(id).copied(),
        };
        (id.clone(), snapshot)
      })
      .collect();

    GameSnapshot {
      tick: self.tick,
      width: self.grid.width,
      height: self.grid.height,
      food: self.food.clone(),
      players,
    }
  }

  fn rebuild_occupancy(&mut self) {
    self.occupied.clear();
    self.occupied.extend(self.food.iter().copied());
    for player in self.players.values().filter(|player| player.alive) {
      self.occupied.extend(player.body.iter().copied());
    }
  }

  fn find_spawn_body(&mut self) -> Option<VecDeque<Cell>> {
    let length = self.start_length as i32;
    let xs = spawn_range(
      length + SPAWN_EDGE_MARGIN,
      self.grid.width - length - SPAWN_EDGE_MARGIN - 1,
      self.grid.width,
    );
    let ys = spawn_range(
      SPAWN_EDGE_MARGIN,
      self.grid.height - SPAWN_EDGE_MARGIN - 1,
      self.grid.height,
    );

    for _ in 0..MAX_SPAWN_ATTEMPTS {
      let anchor = Cell::new(
        self.rng.gen_range(xs.clone()),
        self.rng.gen_range(ys.clone()),
      );
      let body = self.body_from_anchor(anchor);
      if body.iter().all(|cell| !self.occupied.contains(cell)) {
        return Some(body);
      }
    }
    None
  }

  /// Horizontal body extending leftward from the anchor, wrapping.
  fn body_from_anchor(&self, anchor: Cell) -> VecDeque<Cell> {
    (0..self.start_length as i32)
      .map(|offset| self.grid.wrap(anchor.x - offset, anchor.y))
      .collect()
  }
}

#[cfg(test)]
impl GameState {
  pub(crate) fn player(&self, player_id: &str) -> Option<&Player> {
    self.players.get(player_id)
  }

  pub(crate) fn death_cause(&self, player_id: &str) -> Option<DeathCause> {
    self.death_causes.get(player_id).copied()
  }

  pub(crate) fn food(&self) -> &[Cell] {
    &self.food
  }

  pub(crate) fn occupied(&self) -> &HashSet<Cell> {
    &self.occupied
  }

  pub(crate) fn insert_player(&mut self, player: Player) {
    self.players.insert(player.id.clone(), player);
    self.rebuild_occupancy();
  }

  pub(crate) fn kill_player(&mut self, player_id: &str, cause: DeathCause) {
    if let Some(player) = self.players.get_mut(player_id) {
      player.alive = false;
      self.death_causes.insert(player_id.to_string(), cause);
      self.rebuild_occupancy();
    }
  }
}

fn spawn_range(low: i32, high: i32, extent: i32) -> RangeInclusive<i32> {
  if low <= high {
    low..=high
  } else {
    0..=extent - 1
  }
}
