//! Operator console: local commands typed on the server's stdin.
//!
//! Never touches the wire; it only inspects shared state and starts quiz
//! sessions. Output goes to stdout directly since this is the operator's
//! interface, not a log stream.

use crate::quiz::QuizController;
use crate::registry::Registry;
use log::error;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Runs until stdin closes or the operator quits.
pub async fn run(controller: Arc<QuizController>, registry: Arc<Registry>) {
    println!("Commands: start, players, scores, quit");

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if !dispatch(&line, &controller, &registry).await {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                error!("Console input error: {}", e);
                break;
            }
        }
    }
}

/// Handles one command line. Returns `false` when the operator quits.
async fn dispatch(line: &str, controller: &Arc<QuizController>, registry: &Registry) -> bool {
    match line.trim().to_lowercase().as_str() {
        "start" => {
            if controller.try_start() {
                println!("Quiz started.");
            } else {
                println!("Quiz already running.");
            }
        }
        "players" => {
            let names = registry.player_names().await;
            if names.is_empty() {
                println!("No players connected.");
            } else {
                println!("Players: {}", names.join(", "));
            }
        }
        "scores" => {
            let scores = registry.scores().await;
            if scores.is_empty() {
                println!("No scores yet.");
            } else {
                for (name, score) in scores {
                    println!("{}: {}", name, score);
                }
            }
        }
        "quit" | "exit" => return false,
        "" => {}
        other => println!("Unknown command: {} (start/players/scores/quit)", other),
    }
    true
}
