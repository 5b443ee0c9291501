use super::*;
use crate::game::constants::STATS_LOG_INTERVAL_TICKS;

/// Verdict for one alive player, decided before any collection is mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct PlannedMove {
  pub(super) head: Cell,
  pub(super) grows: bool,
  pub(super) death: Option<DeathCause>,
}

/// What existed at the start of the tick.
#[derive(Debug, Default)]
pub(super) struct TickOccupancy {
  bodies: HashSet<Cell>,
  food: HashSet<Cell>,
}

impl TickOccupancy {
  fn contains(&self, cell: &Cell) -> bool {
    self.bodies.contains(cell) || self.food.contains(cell)
  }
}

impl GameState {
  /// Advances the game by exactly one tick.
  pub fn step(&mut self) {
    let heads = self.commit_directions();
    let occupancy = self.tick_occupancy();
    let moves = self.resolve_moves(&heads, occupancy);
    self.apply_moves(&moves);
    self.spawn_food();
    self.tick += 1;

    if self.tick % STATS_LOG_INTERVAL_TICKS == 0 {
      tracing::info!(
        tick = self.tick,
        alive = self.alive_count(),
        food = self.food.len(),
        "tick summary"
      );
    }
  }

  /// Commits pending directions (never a 180 degree turn) and projects every
  /// alive player's next head.
  pub(super) fn commit_directions(&mut self) -> HashMap<String, Cell> {
    let grid = self.grid;
    let mut heads = HashMap::with_capacity(self.players.len());
    for (id, player) in self.players.iter_mut() {
      if !player.alive {
        continue;
      }
      if !player.pending_direction.is_opposite(player.direction) {
        player.direction = player.pending_direction;
      }
      let Some(head) = player.head() else { continue };
      heads.insert(id.clone(), grid.step(head, player.direction));
    }
    heads
  }

  pub(super) fn tick_occupancy(&self) -> TickOccupancy {
    let bodies = self
      .players
      .values()
      .filter(|player| player.alive)
      .flat_map(|player| player.body.iter().copied())
      .collect();
    TickOccupancy {
      bodies,
      food: self.food.iter().copied().collect(),
    }
  }

  /// Consumption and collision verdicts. Only `food` is mutated here; bodies
  /// and occupancy are left for `apply_moves`.
  pub(super) fn resolve_moves(
    &mut self,
    heads: &HashMap<String, Cell>,
    mut occupancy: TickOccupancy,
  ) -> HashMap<String, PlannedMove> {
    let mut head_counts: HashMap<Cell, usize> = HashMap::with_capacity(heads.len());
    for head in heads.values() {
      *head_counts.entry(*head).or_default() += 1;
    }

    let mut moves = HashMap::with_capacity(heads.len());
    for (id, &head) in heads {
      let Some(player) = self.players.get(id) else { continue };

      let grows = match self.food.iter().position(|food| *food == head) {
        Some(index) => {
          self.food.remove(index);
          occupancy.food.remove(&head);
          true
        }
        None => false,
      };

      let death = if head_counts.get(&head).copied().unwrap_or(0) > 1 {
        Some(DeathCause::HeadCollision)
      } else if occupancy.contains(&head) {
        let tail_drops = !grows && player.body.len() >= self.start_length;
        let tail_vacates = tail_drops && player.tail() == Some(head);
        if tail_vacates {
          None
        } else if player.body.contains(&head) {
          Some(DeathCause::SelfCollision)
        } else {
          Some(DeathCause::Other)
        }
      } else {
        None
      };

      moves.insert(id.clone(), PlannedMove { head, grows, death });
    }
    moves
  }

  /// Applies the batch of verdicts and rebuilds occupancy from scratch.
  pub(super) fn apply_moves(&mut self, moves: &HashMap<String, PlannedMove>) {
    let tick = self.tick;
    self.occupied.clear();
    self.occupied.extend(self.food.iter().copied());

    for (id, player) in self.players.iter_mut() {
      if !player.alive {
        continue;
      }
      let Some(planned) = moves.get(id) else {
        self.occupied.extend(player.body.iter().copied());
        continue;
      };

      if let Some(cause) = planned.death {
        player.alive = false;
        self.death_causes.insert(id.clone(), cause);
        tracing::info!(
          player_id = %id,
          cause = cause.as_str(),
          tick,
          survived_ticks = tick.saturating_sub(player.spawn_tick),
          last_input_at = player.last_input_at,
          "player died"
        );
        continue;
      }

      player.body.push_front(planned.head);
      if planned.grows {
        player.score += 1;
        player.food_collected += 1;
        tracing::debug!(player_id = %id, score = player.score, "player grew");
      } else if player.body.len() > self.start_length {
        player.body.pop_back();
      }
      self.occupied.extend(player.body.iter().copied());
    }
  }
}
