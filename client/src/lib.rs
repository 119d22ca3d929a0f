//! # Quiz Client Library
//!
//! Thin client-side plumbing for the networked quiz: connect and join,
//! keep a pollable snapshot of the server's broadcasts, and queue outgoing
//! answers. Everything with coordination logic lives on the server; this
//! library is deliberately a per-connection shim a UI can sit on top of.
//!
//! ## Module Organization
//!
//! ### State Module (`state`)
//! The pollable view of the quiz as seen by this client:
//! - The currently open question, cleared again on feedback
//! - The latest leaderboard and this player's own score
//! - A bounded tail of human-readable messages
//! - Connection and quiz lifecycle flags
//!
//! ### Network Module (`network`)
//! The connection handle and its background task:
//! - TCP connect plus the one-line join handshake
//! - A `select!` loop applying inbound messages and draining the
//!   outgoing answer queue
//! - Disconnect detection that flips the state's `connected` flag
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::QuizClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = QuizClient::connect("127.0.0.1:8888", "alice").await?;
//!
//!     // React to broadcasts as they arrive...
//!     let mut events = client.take_events().expect("events taken once");
//!     if let Some(message) = events.recv().await {
//!         println!("server says: {:?}", message);
//!     }
//!
//!     // ...or poll the snapshot and answer.
//!     if client.snapshot().await.current_question.is_some() {
//!         client.send_answer("4");
//!     }
//!     Ok(())
//! }
//! ```

pub mod network;
pub mod state;

pub use network::QuizClient;
pub use state::{ClientState, CurrentQuestion};
