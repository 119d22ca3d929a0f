use clap::Parser;
use client::network::QuizClient;
use log::info;
use shared::ServerMessage;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Interactive quiz client: prints server broadcasts and submits each
/// typed line as an answer.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8888")]
    server: String,

    /// Name to join as
    #[arg(short = 'u', long)]
    username: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();

    info!("Connecting to {}", args.server);
    let mut client = QuizClient::connect(&args.server, &args.username).await?;
    println!(
        "Connected as {}. Type an answer and press Enter to submit.",
        args.username
    );

    let mut events = client
        .take_events()
        .ok_or("event stream already taken")?;

    let stdin = BufReader::new(tokio::io::stdin());
    let mut input = stdin.lines();

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(message) => render(&message),
                    None => {
                        println!("Disconnected from server.");
                        break;
                    }
                }
            }
            line = input.next_line() => {
                match line? {
                    Some(text) if text.is_empty() => {}
                    Some(text) => {
                        if !client.send_answer(&text) {
                            println!("Connection lost; answer not sent.");
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    Ok(())
}

fn render(message: &ServerMessage) {
    match message {
        ServerMessage::Welcome(text) => println!("{}", text),
        ServerMessage::StartQuiz => println!("--- Quiz started! ---"),
        ServerMessage::Question { prompt, options } => {
            println!();
            println!("Question: {}", prompt);
            for (index, option) in options.iter().enumerate() {
                println!("  {}. {}", index + 1, option);
            }
        }
        ServerMessage::Feedback(text) => println!("{}", text),
        ServerMessage::Leaderboard(entries) => {
            let formatted: Vec<String> = entries
                .iter()
                .map(|(name, score)| format!("{} {}", name, score))
                .collect();
            println!("Scores: {}", formatted.join(" | "));
        }
        ServerMessage::QuizOver(text) => println!("--- {} ---", text),
        ServerMessage::Error(text) => println!("Server error: {}", text),
    }
}
