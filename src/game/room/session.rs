use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

pub type ConnectionId = Uuid;

/// Bounded queue of serialized frames drained by one connection's writer.
pub type Outbound = mpsc::Sender<String>;

#[derive(Debug)]
struct SessionEntry {
    connection_id: ConnectionId,
    sender: Outbound,
}

/// Player id to outbound channel. Register, unregister and broadcast sweeps
/// all run under the same lock, and delivery never awaits.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, SessionEntry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces any previous channel for this player.
    pub fn register(&self, player_id: &str, sender: Outbound) -> ConnectionId {
        let connection_id = Uuid::new_v4();
        let previous = self.sessions().insert(
            player_id.to_string(),
            SessionEntry {
                connection_id,
                sender,
            },
        );
        if previous.is_some() {
            tracing::debug!(player_id, "session replaced by new connection");
        }
        connection_id
    }

    /// Removes the entry only while it still belongs to `connection_id`.
    pub fn unregister_connection(&self, player_id: &str, connection_id: ConnectionId) -> bool {
        let mut sessions = self.sessions();
        match sessions.get(player_id) {
            Some(entry) if entry.connection_id == connection_id => {
                sessions.remove(player_id);
                true
            }
            _ => false,
        }
    }

    pub fn connection_of(&self, player_id: &str) -> Option<ConnectionId> {
        self.sessions()
            .get(player_id)
            .map(|entry| entry.connection_id)
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions().is_empty()
    }

    /// Best effort. A failed delivery unregisters the session.
    pub fn send_to(&self, player_id: &str, payload: String) -> bool {
        let mut sessions = self.sessions();
        let Some(entry) = sessions.get(player_id) else { return false };
        match entry.sender.try_send(payload) {
            Ok(()) => true,
            Err(error) => {
                sessions.remove(player_id);
                log_pruned(player_id, &error);
                false
            }
        }
    }

    /// Delivers to every session; failures are pruned after the sweep.
    /// Returns how many sessions accepted the frame.
    pub fn broadcast(&self, payload: &str) -> usize {
        let mut sessions = self.sessions();
        let mut stale = Vec::new();
        let mut delivered = 0;
        for (player_id, entry) in sessions.iter() {
            match entry.sender.try_send(payload.to_string()) {
                Ok(()) => delivered += 1,
                Err(error) => {
                    log_pruned(player_id, &error);
                    stale.push(player_id.clone());
                }
            }
        }
        for player_id in stale {
            sessions.remove(&player_id);
        }
        delivered
    }
}

fn log_pruned(player_id: &str, error: &TrySendError<String>) {
    let reason = match error {
        TrySendError::Full(_) => "outbound queue full",
        TrySendError::Closed(_) => "outbound channel closed",
    };
    tracing::debug!(player_id, reason, "session pruned");
}
