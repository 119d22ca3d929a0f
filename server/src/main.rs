use clap::Parser;
use log::{error, info};
use server::broadcast::Broadcaster;
use server::connection;
use server::console;
use server::questions;
use server::quiz::{AnswerSink, QuizConfig, QuizController};
use server::registry::{Registry, ScorePolicy};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Quiz server: broadcasts questions over TCP, first correct answer wins.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = shared::DEFAULT_PORT)]
    port: u16,

    /// Path to a JSON question bank; built-in questions when omitted
    #[arg(short, long)]
    questions: Option<PathBuf>,

    /// Seconds players have to answer each question
    #[arg(long, default_value_t = shared::DEFAULT_QUESTION_TIME_SECS)]
    question_time: u64,

    /// Points awarded for the first correct answer
    #[arg(long, default_value_t = shared::DEFAULT_POINTS)]
    points: u32,

    /// Pause between questions, in seconds
    #[arg(long, default_value_t = shared::DEFAULT_INTER_QUESTION_DELAY_SECS)]
    inter_question_delay: u64,

    /// Reset a player's score when they rejoin under a name that is still
    /// connected (default keeps the old score)
    #[arg(long)]
    reset_score_on_rejoin: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let questions = match &args.questions {
        Some(path) => questions::load_from_file(path)?,
        None => questions::default_set(),
    };

    let address = format!("{}:{}", args.host, args.port);
    // Failing to bind is the only fatal error in the process.
    let listener = TcpListener::bind(&address).await?;
    info!("Server listening on {}", address);

    let score_policy = if args.reset_score_on_rejoin {
        ScorePolicy::Reset
    } else {
        ScorePolicy::Preserve
    };

    let registry = Arc::new(Registry::new(score_policy));
    let sink = Arc::new(AnswerSink::new());
    let controller = Arc::new(QuizController::new(
        Arc::clone(&registry),
        Broadcaster::new(Arc::clone(&registry)),
        Arc::clone(&sink),
        questions,
        QuizConfig {
            question_time: Duration::from_secs(args.question_time),
            points: args.points,
            inter_question_delay: Duration::from_secs(args.inter_question_delay),
        },
    ));

    let accept_handle = tokio::spawn(connection::run_accept_loop(
        listener,
        Arc::clone(&registry),
        sink,
    ));

    tokio::select! {
        _ = console::run(Arc::clone(&controller), Arc::clone(&registry)) => {
            info!("Console closed, shutting down");
        }
        result = accept_handle => {
            if let Err(e) = result {
                error!("Accept loop panicked: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
