//! Best-effort fan-out of one protocol line to every registered player.

use crate::registry::Registry;
use log::{debug, info};
use shared::ServerMessage;
use std::sync::Arc;

/// Sends a message to every connection in a registry snapshot and evicts
/// entries whose connection task is gone.
///
/// The fan-out never blocks: it queues onto each connection's outbound
/// channel, and the connection task performs the actual socket write. A send
/// failure means that task has already exited, so the player is removed —
/// after the send pass, never during it, and only if the entry has not been
/// superseded in the meantime.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: Arc<Registry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub async fn broadcast(&self, message: ServerMessage) {
        let snapshot = self.registry.snapshot().await;
        debug!(
            "Broadcasting to {} player(s): {}",
            snapshot.len(),
            message.encode()
        );

        let mut dead = Vec::new();
        for player in &snapshot {
            if player.sender.send(message.clone()).is_err() {
                dead.push((player.name.clone(), player.generation));
            }
        }

        for (name, generation) in dead {
            if self.registry.remove_if_current(&name, generation).await {
                info!("Dropped {} during broadcast: connection gone", name);
            }
        }
    }
}
