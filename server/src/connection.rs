//! Accept loop and per-connection handling.
//!
//! Each accepted socket gets its own task. The task first runs the join
//! handshake (exactly one line, bounded wait), then settles into a single
//! `select!` loop that both drains the player's outbound queue onto the
//! socket and forwards inbound `answer:` lines to the quiz loop. The task
//! owns the socket outright; when the registry drops the player's sender —
//! supersede or eviction — the queue reports closed and the task drops the
//! socket, which closes both directions.

use crate::quiz::{AnswerEvent, AnswerSink};
use crate::registry::Registry;
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{ClientCommand, LineCodec, ServerMessage, FIELD_SEPARATOR, JOIN_TIMEOUT_SECS};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_util::codec::Framed;

type Wire = Framed<TcpStream, LineCodec>;

/// Accepts connections for the lifetime of the process, one task per
/// socket. Runs concurrently with any quiz session; accept errors are
/// logged and retried, never fatal.
pub async fn run_accept_loop(
    listener: TcpListener,
    registry: Arc<Registry>,
    sink: Arc<AnswerSink>,
) {
    loop {
        match listener.accept().await {
            Ok((socket, addr)) => {
                let registry = Arc::clone(&registry);
                let sink = Arc::clone(&sink);
                tokio::spawn(async move {
                    handle_connection(socket, addr, registry, sink).await;
                });
            }
            Err(e) => {
                error!("Error accepting connection: {}", e);
                sleep(Duration::from_millis(500)).await;
            }
        }
    }
}

async fn handle_connection(
    socket: TcpStream,
    addr: SocketAddr,
    registry: Arc<Registry>,
    sink: Arc<AnswerSink>,
) {
    let mut wire = Framed::new(socket, LineCodec);

    let name = match join_handshake(&mut wire, addr).await {
        Some(name) => name,
        None => return,
    };

    let (sender, mut outbound) = mpsc::unbounded_channel();
    let generation = registry.register(&name, sender).await;
    info!("{} connected from {}", name, addr);

    let welcome = ServerMessage::Welcome(format!("Connected as {}", name));
    if wire.send(welcome.encode()).await.is_err() {
        registry.remove_if_current(&name, generation).await;
        return;
    }

    loop {
        tokio::select! {
            queued = outbound.recv() => {
                match queued {
                    Some(message) => {
                        if let Err(e) = wire.send(message.encode()).await {
                            warn!("Write to {} failed: {}", name, e);
                            registry.remove_if_current(&name, generation).await;
                            break;
                        }
                    }
                    // The registry dropped this entry (supersede or
                    // eviction); dropping the socket closes the peer out.
                    None => {
                        debug!("Connection for {} released by registry", name);
                        break;
                    }
                }
            }
            incoming = wire.next() => {
                match incoming {
                    Some(Ok(line)) => match ClientCommand::parse(&line) {
                        Some(ClientCommand::Answer(text)) => {
                            sink.submit(AnswerEvent {
                                name: name.clone(),
                                generation,
                                text,
                            });
                        }
                        Some(ClientCommand::Join(_)) => {
                            debug!("Ignoring repeat join from {}", name);
                        }
                        None => {
                            debug!("Discarding unrecognized line from {}: {:?}", name, line);
                        }
                    },
                    Some(Err(e)) => {
                        warn!("Read error from {}: {}", name, e);
                        registry.remove_if_current(&name, generation).await;
                        break;
                    }
                    None => {
                        info!("{} disconnected", name);
                        registry.remove_if_current(&name, generation).await;
                        break;
                    }
                }
            }
        }
    }
}

/// Reads exactly one line under a bounded wait and requires it to be a
/// well-formed join. Anything else — wrong tag, blank or unrepresentable
/// name, timeout, early close — gets one `error:` line (where a write is
/// still possible) and no registration.
async fn join_handshake(wire: &mut Wire, addr: SocketAddr) -> Option<String> {
    let first_line = timeout(Duration::from_secs(JOIN_TIMEOUT_SECS), wire.next()).await;

    let name = match first_line {
        Ok(Some(Ok(line))) => match ClientCommand::parse(&line) {
            Some(ClientCommand::Join(name)) => name,
            _ => {
                debug!("Rejecting {}: first line was not a join", addr);
                reject(wire, "expected join:<username>").await;
                return None;
            }
        },
        Ok(Some(Err(e))) => {
            warn!("Handshake read error from {}: {}", addr, e);
            return None;
        }
        Ok(None) => {
            debug!("{} closed before joining", addr);
            return None;
        }
        Err(_) => {
            debug!("Rejecting {}: join timed out", addr);
            reject(wire, "join timed out").await;
            return None;
        }
    };

    // The leaderboard line separates entries with '|'; a name containing it
    // would corrupt the framing for every client.
    if name.contains(FIELD_SEPARATOR) {
        debug!("Rejecting {}: name contains reserved separator", addr);
        reject(wire, "name must not contain '|'").await;
        return None;
    }

    Some(name)
}

async fn reject(wire: &mut Wire, reason: &str) {
    let _ = wire.send(ServerMessage::Error(reason.to_string()).encode()).await;
}
