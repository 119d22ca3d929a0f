//! Connection handling for the quiz client.
//!
//! [`QuizClient::connect`] performs the TCP connect and join handshake,
//! then hands the socket to a background task. The task mirrors the server
//! side: one `select!` loop that applies inbound server messages to the
//! shared [`ClientState`] (and forwards them on an event channel for the
//! UI) while draining the outgoing answer queue onto the socket.

use crate::state::ClientState;
use futures::{SinkExt, StreamExt};
use log::{info, warn};
use shared::{ClientCommand, LineCodec, ServerMessage};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::RwLock;
use tokio_util::codec::Framed;

type Wire = Framed<TcpStream, LineCodec>;

/// Handle to a joined connection. Cheap to use from a UI loop: `snapshot`
/// copies the current state, `send_answer` queues without blocking.
#[derive(Debug)]
pub struct QuizClient {
    state: Arc<RwLock<ClientState>>,
    outgoing: UnboundedSender<String>,
    events: Option<UnboundedReceiver<ServerMessage>>,
}

impl QuizClient {
    /// Connects, joins as `username`, and waits for the server's verdict.
    /// A rejected join (an `error:` line, or the server closing without a
    /// welcome) is a connect error.
    pub async fn connect(
        server: &str,
        username: &str,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = TcpStream::connect(server).await?;
        let mut wire = Framed::new(socket, LineCodec);

        wire.send(ClientCommand::Join(username.to_string()).encode())
            .await?;

        match wire.next().await {
            Some(Ok(line)) => match ServerMessage::parse(&line) {
                Some(ServerMessage::Welcome(text)) => info!("{}", text),
                Some(ServerMessage::Error(reason)) => {
                    return Err(format!("join rejected: {}", reason).into());
                }
                _ => return Err(format!("unexpected reply to join: {:?}", line).into()),
            },
            Some(Err(e)) => return Err(e.into()),
            None => return Err("server closed the connection during join".into()),
        }

        let state = Arc::new(RwLock::new(ClientState::new(username)));
        let (answer_sender, answer_receiver) = mpsc::unbounded_channel();
        let (event_sender, event_receiver) = mpsc::unbounded_channel();

        tokio::spawn(run_connection(
            wire,
            Arc::clone(&state),
            answer_receiver,
            event_sender,
        ));

        Ok(Self {
            state,
            outgoing: answer_sender,
            events: Some(event_receiver),
        })
    }

    /// Point-in-time copy of the client's view; safe to call from anywhere.
    pub async fn snapshot(&self) -> ClientState {
        self.state.read().await.clone()
    }

    /// Queues an answer for the currently open question. Returns `false`
    /// once the connection is gone.
    pub fn send_answer(&self, text: &str) -> bool {
        self.outgoing
            .send(ClientCommand::Answer(text.to_string()).encode())
            .is_ok()
    }

    /// Takes the inbound event stream. Yields each server message once, in
    /// arrival order; ends when the connection closes. Can only be taken
    /// once.
    pub fn take_events(&mut self) -> Option<UnboundedReceiver<ServerMessage>> {
        self.events.take()
    }
}

async fn run_connection(
    mut wire: Wire,
    state: Arc<RwLock<ClientState>>,
    mut answers: UnboundedReceiver<String>,
    events: UnboundedSender<ServerMessage>,
) {
    loop {
        tokio::select! {
            answer = answers.recv() => {
                match answer {
                    Some(line) => {
                        if let Err(e) = wire.send(line).await {
                            warn!("Send to server failed: {}", e);
                            break;
                        }
                    }
                    // The QuizClient handle was dropped.
                    None => break,
                }
            }
            incoming = wire.next() => {
                match incoming {
                    Some(Ok(line)) => {
                        match ServerMessage::parse(&line) {
                            Some(message) => {
                                state.write().await.apply(&message);
                                let _ = events.send(message);
                            }
                            None => warn!("Unrecognized server line: {:?}", line),
                        }
                    }
                    Some(Err(e)) => {
                        warn!("Read from server failed: {}", e);
                        break;
                    }
                    None => {
                        info!("Server closed the connection");
                        break;
                    }
                }
            }
        }
    }

    state.write().await.connected = false;
}
