use super::constants::BROADCAST_LOG_INTERVAL;
use super::state::GameState;
use super::types::Direction;
use crate::app::config::GameConfig;
use crate::app::time::now_millis;
use crate::protocol::{
  self, BoardSize, ClientMessage, InitPayload, NotificationPayload, ServerMessage,
};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub mod session;

#[cfg(test)]
mod tests;

pub use session::{ConnectionId, Outbound, SessionRegistry};

/// Mutations queued by connection handlers and applied at the start of a tick.
#[derive(Debug)]
pub enum RoomCommand {
  Join {
    player_id: String,
    name: String,
  },
  Leave {
    player_id: String,
    connection_id: ConnectionId,
  },
  Input {
    player_id: String,
    direction: Direction,
    received_at: i64,
  },
  Respawn {
    player_id: String,
  },
  Rename {
    player_id: String,
    name: String,
  },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoomStats {
  pub tick: u64,
  pub players: usize,
  pub alive_players: usize,
}

impl RoomStats {
  fn of(state: &GameState) -> Self {
    Self {
      tick: state.tick(),
      players: state.player_count(),
      alive_players: state.alive_count(),
    }
  }
}

/// Handle shared by every connection. Never touches `GameState` directly.
#[derive(Debug)]
pub struct Room {
  config: GameConfig,
  commands: mpsc::UnboundedSender<RoomCommand>,
  sessions: Arc<SessionRegistry>,
  stats: watch::Receiver<RoomStats>,
}

impl Room {
  pub fn new(config: GameConfig) -> (Arc<Room>, TickLoop) {
    let state = GameState::new(&config);
    Self::with_state(config, state)
  }

  pub fn with_state(config: GameConfig, state: GameState) -> (Arc<Room>, TickLoop) {
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (stats_tx, stats_rx) = watch::channel(RoomStats::of(&state));
    let sessions = Arc::new(SessionRegistry::new());

    let room = Arc::new(Room {
      config: config.clone(),
      commands: commands_tx,
      sessions: Arc::clone(&sessions),
      stats: stats_rx,
    });
    let tick_loop = TickLoop {
      state,
      commands: commands_rx,
      sessions,
      stats: stats_tx,
      period: config.tick_period(),
      broadcasts: 0,
    };
    (room, tick_loop)
  }

  pub fn config(&self) -> &GameConfig {
    &self.config
  }

  pub fn stats(&self) -> RoomStats {
    *self.stats.borrow()
  }

  pub fn connection_count(&self) -> usize {
    self.sessions.len()
  }

  /// Registers the outbound channel now; the player spawns on the next tick.
  pub fn connect(&self, player_id: &str, outbound: Outbound) -> ConnectionId {
    let connection_id = self.sessions.register(player_id, outbound);
    self.submit(RoomCommand::Join {
      player_id: player_id.to_string(),
      name: player_id.to_string(),
    });
    connection_id
  }

  pub fn disconnect(&self, player_id: &str, connection_id: ConnectionId) {
    self.sessions.unregister_connection(player_id, connection_id);
    self.submit(RoomCommand::Leave {
      player_id: player_id.to_string(),
      connection_id,
    });
  }

  pub fn handle_text_message(&self, player_id: &str, text: &str) {
    let Some(message) = protocol::decode_client_message(text) else { return };
    let player_id = player_id.to_string();
    let command = match message {
      ClientMessage::Input { direction } => RoomCommand::Input {
        player_id,
        direction,
        received_at: now_millis(),
      },
      ClientMessage::Respawn => RoomCommand::Respawn { player_id },
      ClientMessage::Rename { name } => RoomCommand::Rename { player_id, name },
    };
    self.submit(command);
  }

  fn submit(&self, command: RoomCommand) {
    if self.commands.send(command).is_err() {
      tracing::debug!("tick loop stopped, dropping command");
    }
  }
}

/// Sole owner of the game state.
#[derive(Debug)]
pub struct TickLoop {
  state: GameState,
  commands: mpsc::UnboundedReceiver<RoomCommand>,
  sessions: Arc<SessionRegistry>,
  stats: watch::Sender<RoomStats>,
  period: Duration,
  broadcasts: u64,
}

impl TickLoop {
  pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(self.run(shutdown))
  }

  /// Ticks until the shutdown flag turns true. A tick in progress always
  /// completes first.
  pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
    tracing::info!(period_ms = self.period.as_millis() as u64, "tick loop started");
    let mut interval = tokio::time::interval(self.period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
      if *shutdown.borrow() {
        break;
      }
      tokio::select! {
        _ = interval.tick() => self.run_tick(),
        changed = shutdown.changed() => {
          if changed.is_err() {
            break;
          }
        }
      }
    }

    tracing::info!(tick = self.state.tick(), "tick loop stopped");
  }

  pub fn run_tick(&mut self) {
    while let Ok(command) = self.commands.try_recv() {
      self.apply_command(command);
    }

    // Stepped on a copy so a panicking transition leaves the last good state.
    let mut next = self.state.clone();
    if panic::catch_unwind(AssertUnwindSafe(|| next.step())).is_err() {
      tracing::error!(tick = self.state.tick(), "tick transition panicked, skipping tick");
      return;
    }
    self.state = next;
    self.stats.send_replace(RoomStats::of(&self.state));

    if self.sessions.is_empty() {
      return;
    }
    let snapshot = self.state.snapshot();
    match ServerMessage::State(&snapshot).encode() {
      Ok(payload) => {
        let delivered = self.sessions.broadcast(&payload);
        self.broadcasts += 1;
        if self.broadcasts % BROADCAST_LOG_INTERVAL == 0 {
          tracing::info!(tick = snapshot.tick, delivered, "broadcast state");
        }
      }
      Err(error) => tracing::error!(?error, "failed to encode state snapshot"),
    }
  }

  fn apply_command(&mut self, command: RoomCommand) {
    match command {
      RoomCommand::Join { player_id, name } => {
        self.state.add_player(&player_id, &name);
        self.send_welcome(&player_id, &name);
      }
      RoomCommand::Leave {
        player_id,
        connection_id,
      } => {
        let superseded = self
          .sessions
          .connection_of(&player_id)
          .is_some_and(|current| current != connection_id);
        if superseded {
          tracing::debug!(player_id = %player_id, "stale disconnect ignored");
          return;
        }
        self.state.remove_player(&player_id);
      }
      RoomCommand::Input {
        player_id,
        direction,
        received_at,
      } => {
        self
          .state
          .set_pending_direction(&player_id, direction, received_at);
      }
      RoomCommand::Respawn { player_id } => {
        self.state.respawn_player(&player_id);
      }
      RoomCommand::Rename { player_id, name } => {
        let Some(name) = self.state.rename_player(&player_id, &name) else { return };
        tracing::info!(player_id = %player_id, name = %name, "player renamed");
        self.send(
          &player_id,
          &ServerMessage::Notification(NotificationPayload {
            message: format!("Name changed to {name}"),
          }),
        );
      }
    }
  }

  fn send_welcome(&self, player_id: &str, name: &str) {
    let grid = self.state.grid();
    self.send(
      player_id,
      &ServerMessage::Init(InitPayload {
        player_id: player_id.to_string(),
        display_name: name.to_string(),
        game_config: BoardSize {
          width: grid.width,
          height: grid.height,
        },
      }),
    );
    let snapshot = self.state.snapshot();
    self.send(player_id, &ServerMessage::State(&snapshot));
  }

  fn send(&self, player_id: &str, message: &ServerMessage<'_>) {
    match message.encode() {
      Ok(payload) => {
        self.sessions.send_to(player_id, payload);
      }
      Err(error) => tracing::error!(?error, player_id, "failed to encode message"),
    }
  }
}
