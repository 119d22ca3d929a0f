//! Connection registry: the single piece of shared mutable state on the
//! server.
//!
//! Maps each player name to its live connection handle and running score.
//! The handle is the sending side of the connection task's outbound queue,
//! so "owning the connection" means owning that sender: dropping it closes
//! the queue, which makes the connection task drop the socket. All reads and
//! writes go through one internal lock, and the lock is never held across
//! socket I/O — callers iterate over [`Registry::snapshot`] copies instead.

use log::info;
use shared::ServerMessage;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::RwLock;

/// Sending side of a connection task's outbound message queue.
pub type Outbound = UnboundedSender<ServerMessage>;

/// What happens to an existing score when a player rejoins under a name
/// that is still registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScorePolicy {
    /// The superseding connection inherits the previous score.
    Preserve,
    /// The superseding connection starts over at zero.
    Reset,
}

#[derive(Debug)]
struct PlayerEntry {
    sender: Outbound,
    score: u32,
    generation: u64,
}

/// Point-in-time copy of one registry entry, safe to use for I/O without
/// holding the registry lock.
#[derive(Debug, Clone)]
pub struct PlayerSnapshot {
    pub name: String,
    pub sender: Outbound,
    pub score: u32,
    pub generation: u64,
}

/// Thread-safe player registry. See the module docs for the locking
/// discipline.
#[derive(Debug)]
pub struct Registry {
    players: RwLock<HashMap<String, PlayerEntry>>,
    next_generation: AtomicU64,
    score_policy: ScorePolicy,
}

impl Registry {
    pub fn new(score_policy: ScorePolicy) -> Self {
        Self {
            players: RwLock::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
            score_policy,
        }
    }

    /// Registers a player, superseding any existing entry with the same
    /// name. The superseded entry's sender is dropped, which closes the old
    /// connection. Returns the generation assigned to this connection; the
    /// caller passes it back to [`Registry::remove_if_current`] so a stale
    /// connection can never evict its successor.
    pub async fn register(&self, name: &str, sender: Outbound) -> u64 {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let mut players = self.players.write().await;

        let score = match players.remove(name) {
            Some(previous) if self.score_policy == ScorePolicy::Preserve => {
                info!("Superseding existing connection for {}", name);
                previous.score
            }
            Some(_) => {
                info!("Superseding existing connection for {} (score reset)", name);
                0
            }
            None => 0,
        };

        players.insert(
            name.to_string(),
            PlayerEntry {
                sender,
                score,
                generation,
            },
        );
        generation
    }

    /// Removes a player unconditionally. Idempotent: removing an absent name
    /// is a no-op. Returns whether an entry was removed.
    pub async fn remove(&self, name: &str) -> bool {
        let removed = self.players.write().await.remove(name).is_some();
        if removed {
            info!("Removed player {}", name);
        }
        removed
    }

    /// Removes a player only if the entry still belongs to the given
    /// connection generation. Used by connection tasks and the broadcaster,
    /// which may race with a same-name rejoin.
    pub async fn remove_if_current(&self, name: &str, generation: u64) -> bool {
        let mut players = self.players.write().await;
        match players.get(name) {
            Some(entry) if entry.generation == generation => {
                players.remove(name);
                info!("Removed player {}", name);
                true
            }
            _ => false,
        }
    }

    /// Whether the given (name, generation) pair identifies the currently
    /// registered connection for that name.
    pub async fn is_current(&self, name: &str, generation: u64) -> bool {
        self.players
            .read()
            .await
            .get(name)
            .is_some_and(|entry| entry.generation == generation)
    }

    /// Returns a consistent point-in-time copy of all entries, taken under a
    /// single lock acquisition. Callers iterate over this copy for I/O.
    pub async fn snapshot(&self) -> Vec<PlayerSnapshot> {
        self.players
            .read()
            .await
            .iter()
            .map(|(name, entry)| PlayerSnapshot {
                name: name.clone(),
                sender: entry.sender.clone(),
                score: entry.score,
                generation: entry.generation,
            })
            .collect()
    }

    /// Adds points to a player's score. A no-op when the name is absent;
    /// the player may have disconnected between answering and scoring.
    pub async fn adjust_score(&self, name: &str, delta: u32) {
        if let Some(entry) = self.players.write().await.get_mut(name) {
            entry.score += delta;
        }
    }

    /// Names of all connected players, in registry iteration order.
    pub async fn player_names(&self) -> Vec<String> {
        self.players.read().await.keys().cloned().collect()
    }

    /// (name, score) pairs for all connected players, in registry iteration
    /// order.
    pub async fn scores(&self) -> Vec<(String, u32)> {
        self.players
            .read()
            .await
            .iter()
            .map(|(name, entry)| (name.clone(), entry.score))
            .collect()
    }

    /// Number of connected players.
    pub async fn len(&self) -> usize {
        self.players.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.players.read().await.is_empty()
    }
}
