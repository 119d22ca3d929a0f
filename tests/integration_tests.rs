//! Integration tests for the networked quiz components
//!
//! These tests validate cross-component interactions and real network
//! behavior: an in-process server on an ephemeral port, raw TCP clients
//! speaking the wire protocol, and question windows short enough to test
//! timeout paths.

use futures::{SinkExt, StreamExt};
use tokio_test::assert_ok;
use server::broadcast::Broadcaster;
use server::connection;
use server::quiz::{AnswerSink, QuizConfig, QuizController};
use server::registry::{Registry, ScorePolicy};
use shared::{LineCodec, Question, ServerMessage};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_util::codec::Framed;

type Wire = Framed<TcpStream, LineCodec>;

struct TestServer {
    addr: SocketAddr,
    registry: Arc<Registry>,
    controller: Arc<QuizController>,
}

async fn start_server(questions: Vec<Question>, config: QuizConfig) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test listener");
    let addr = listener.local_addr().unwrap();

    let registry = Arc::new(Registry::new(ScorePolicy::Preserve));
    let sink = Arc::new(AnswerSink::new());
    let controller = Arc::new(QuizController::new(
        Arc::clone(&registry),
        Broadcaster::new(Arc::clone(&registry)),
        Arc::clone(&sink),
        questions,
        config,
    ));

    tokio::spawn(connection::run_accept_loop(
        listener,
        Arc::clone(&registry),
        sink,
    ));

    TestServer {
        addr,
        registry,
        controller,
    }
}

fn fast_config(question_time_ms: u64) -> QuizConfig {
    QuizConfig {
        question_time: Duration::from_millis(question_time_ms),
        points: 10,
        inter_question_delay: Duration::from_millis(100),
    }
}

fn arithmetic_question() -> Question {
    Question::new(
        "2+2",
        vec!["2".into(), "3".into(), "4".into(), "5".into()],
        "4",
    )
}

fn capital_question() -> Question {
    Question::new(
        "Capital of France?",
        vec![
            "Paris".into(),
            "London".into(),
            "Berlin".into(),
            "Rome".into(),
        ],
        "Paris",
    )
}

/// Joins the server and consumes the welcome line.
async fn join(addr: SocketAddr, name: &str) -> Wire {
    let socket = TcpStream::connect(addr).await.expect("connect failed");
    let mut wire = Framed::new(socket, LineCodec);
    tokio_test::assert_ok!(wire.send(format!("join:{}", name)).await);

    match recv(&mut wire).await {
        ServerMessage::Welcome(_) => {}
        other => panic!("expected welcome for {}, got {:?}", name, other),
    }
    wire
}

/// Receives and parses the next server message, with a test-level timeout.
async fn recv(wire: &mut Wire) -> ServerMessage {
    let line = timeout(Duration::from_secs(3), wire.next())
        .await
        .expect("timed out waiting for a server message")
        .expect("connection closed unexpectedly")
        .expect("read error");
    ServerMessage::parse(&line).unwrap_or_else(|| panic!("unparseable line: {:?}", line))
}

/// Asserts the server has closed this connection.
async fn expect_eof(wire: &mut Wire) {
    let next = timeout(Duration::from_secs(3), wire.next())
        .await
        .expect("timed out waiting for the connection to close");
    assert!(next.is_none(), "expected EOF, got {:?}", next);
}

fn sorted(mut entries: Vec<(String, u32)>) -> Vec<(String, u32)> {
    entries.sort();
    entries
}

/// QUIZ SESSION TESTS
mod quiz_session_tests {
    use super::*;

    /// Three players; the first correct answer scores, later correct
    /// answers for the same question have no effect.
    #[tokio::test]
    async fn first_correct_answer_wins() {
        let server = start_server(vec![arithmetic_question()], fast_config(2_000)).await;

        let mut alice = join(server.addr, "alice").await;
        let mut bob = join(server.addr, "bob").await;
        let mut carol = join(server.addr, "carol").await;

        assert!(server.controller.try_start());

        for wire in [&mut alice, &mut bob, &mut carol] {
            assert_eq!(recv(wire).await, ServerMessage::StartQuiz);
            match recv(wire).await {
                ServerMessage::Question { prompt, options } => {
                    assert_eq!(prompt, "2+2");
                    assert_eq!(options, vec!["2", "3", "4", "5"]);
                }
                other => panic!("expected question, got {:?}", other),
            }
        }

        tokio_test::assert_ok!(bob.send("answer:4".to_string()).await);

        for wire in [&mut alice, &mut bob, &mut carol] {
            assert_eq!(
                recv(wire).await,
                ServerMessage::Feedback("bob answered first and got it right!".into())
            );
            match recv(wire).await {
                ServerMessage::Leaderboard(entries) => {
                    assert_eq!(
                        sorted(entries),
                        vec![
                            ("alice".to_string(), 0),
                            ("bob".to_string(), 10),
                            ("carol".to_string(), 0),
                        ]
                    );
                }
                other => panic!("expected leaderboard, got {:?}", other),
            }
        }

        // A correct-looking answer after the question resolved is accepted
        // off the wire but cannot score.
        tokio_test::assert_ok!(alice.send("answer:4".to_string()).await);

        for wire in [&mut alice, &mut bob, &mut carol] {
            assert_eq!(
                recv(wire).await,
                ServerMessage::QuizOver("Thanks for playing!".into())
            );
        }

        assert_eq!(
            sorted(server.registry.scores().await),
            vec![
                ("alice".to_string(), 0),
                ("bob".to_string(), 10),
                ("carol".to_string(), 0),
            ]
        );
    }

    /// Wrong answer, then the deadline expires: feedback reveals the
    /// correct option and no score changes.
    #[tokio::test]
    async fn timeout_reveals_correct_answer() {
        let server = start_server(vec![arithmetic_question()], fast_config(400)).await;

        let mut alice = join(server.addr, "alice").await;
        assert!(server.controller.try_start());

        assert_eq!(recv(&mut alice).await, ServerMessage::StartQuiz);
        match recv(&mut alice).await {
            ServerMessage::Question { .. } => {}
            other => panic!("expected question, got {:?}", other),
        }

        tokio_test::assert_ok!(alice.send("answer:wrong".to_string()).await);

        assert_eq!(
            recv(&mut alice).await,
            ServerMessage::Feedback("No correct answers. Correct was: 4".into())
        );
        assert_eq!(
            recv(&mut alice).await,
            ServerMessage::Leaderboard(vec![("alice".to_string(), 0)])
        );
        assert_eq!(
            recv(&mut alice).await,
            ServerMessage::QuizOver("Thanks for playing!".into())
        );
    }

    /// A player joining mid-quiz receives only subsequent questions.
    #[tokio::test]
    async fn late_joiner_sees_only_later_questions() {
        let config = QuizConfig {
            question_time: Duration::from_secs(5),
            points: 10,
            inter_question_delay: Duration::from_millis(500),
        };
        let server =
            start_server(vec![arithmetic_question(), capital_question()], config).await;

        let mut alice = join(server.addr, "alice").await;
        assert!(server.controller.try_start());

        assert_eq!(recv(&mut alice).await, ServerMessage::StartQuiz);
        match recv(&mut alice).await {
            ServerMessage::Question { prompt, .. } => assert_eq!(prompt, "2+2"),
            other => panic!("expected question, got {:?}", other),
        }
        tokio_test::assert_ok!(alice.send("answer:4".to_string()).await);
        match recv(&mut alice).await {
            ServerMessage::Feedback(_) => {}
            other => panic!("expected feedback, got {:?}", other),
        }
        match recv(&mut alice).await {
            ServerMessage::Leaderboard(_) => {}
            other => panic!("expected leaderboard, got {:?}", other),
        }

        // Question 1 has fully resolved; dave joins during the pause.
        let mut dave = join(server.addr, "dave").await;

        match recv(&mut dave).await {
            ServerMessage::Question { prompt, .. } => assert_eq!(prompt, "Capital of France?"),
            other => panic!("dave should first see question 2, got {:?}", other),
        }
    }

    /// Starting a quiz while one is running is rejected without disturbing
    /// the running session.
    #[tokio::test]
    async fn concurrent_start_is_rejected() {
        let server = start_server(vec![arithmetic_question()], fast_config(2_000)).await;

        let mut alice = join(server.addr, "alice").await;
        assert!(server.controller.try_start());
        assert!(!server.controller.try_start());

        assert_eq!(recv(&mut alice).await, ServerMessage::StartQuiz);
        match recv(&mut alice).await {
            ServerMessage::Question { .. } => {}
            other => panic!("expected question, got {:?}", other),
        }
    }
}

/// CONNECTION LIFECYCLE TESTS
mod connection_tests {
    use super::*;

    /// A later join with the same name supersedes the earlier connection:
    /// the old socket is closed and only the new one receives broadcasts.
    #[tokio::test]
    async fn rejoin_supersedes_previous_connection() {
        let server = start_server(vec![arithmetic_question()], fast_config(2_000)).await;

        let mut first = join(server.addr, "bob").await;
        let mut second = join(server.addr, "bob").await;

        expect_eof(&mut first).await;
        assert_eq!(server.registry.player_names().await, vec!["bob".to_string()]);

        assert!(server.controller.try_start());
        assert_eq!(recv(&mut second).await, ServerMessage::StartQuiz);
    }

    /// A player disconnecting mid-question does not stall resolution for
    /// the others.
    #[tokio::test]
    async fn disconnect_mid_question_does_not_stall_resolution() {
        // A long window: resolution must come from bob's answer, not the
        // deadline.
        let server = start_server(vec![arithmetic_question()], fast_config(10_000)).await;

        let alice = join(server.addr, "alice").await;
        let mut bob = join(server.addr, "bob").await;

        assert!(server.controller.try_start());
        assert_eq!(recv(&mut bob).await, ServerMessage::StartQuiz);
        match recv(&mut bob).await {
            ServerMessage::Question { .. } => {}
            other => panic!("expected question, got {:?}", other),
        }

        drop(alice);
        tokio_test::assert_ok!(bob.send("answer:4".to_string()).await);

        assert_eq!(
            recv(&mut bob).await,
            ServerMessage::Feedback("bob answered first and got it right!".into())
        );
        match recv(&mut bob).await {
            ServerMessage::Leaderboard(entries) => {
                assert!(entries.contains(&("bob".to_string(), 10)));
            }
            other => panic!("expected leaderboard, got {:?}", other),
        }

        // Alice's eviction is detected by her connection task.
        timeout(Duration::from_secs(3), async {
            while server.registry.len().await > 1 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("disconnected player was never removed");
        assert_eq!(
            server.registry.scores().await,
            vec![("bob".to_string(), 10)]
        );
    }

    /// A connection whose first line is not a join is rejected and closed
    /// without being registered.
    #[tokio::test]
    async fn malformed_join_is_rejected() {
        let server = start_server(vec![arithmetic_question()], fast_config(2_000)).await;

        let socket = TcpStream::connect(server.addr).await.unwrap();
        let mut wire = Framed::new(socket, LineCodec);
        tokio_test::assert_ok!(wire.send("answer:4".to_string()).await);

        assert_eq!(
            recv(&mut wire).await,
            ServerMessage::Error("expected join:<username>".into())
        );
        expect_eof(&mut wire).await;
        assert!(server.registry.is_empty().await);
    }
}

/// CLIENT LIBRARY TESTS
mod client_library_tests {
    use super::*;
    use client::network::QuizClient;

    /// The thin client tracks the full session: question, answer, score,
    /// quiz end.
    #[tokio::test]
    async fn client_tracks_a_full_session() {
        let server = start_server(vec![arithmetic_question()], fast_config(2_000)).await;

        let mut quiz_client = QuizClient::connect(&server.addr.to_string(), "alice")
            .await
            .expect("client failed to join");
        let mut events = quiz_client.take_events().expect("events taken once");

        assert!(server.controller.try_start());

        // Wait until the question broadcast arrives.
        loop {
            match timeout(Duration::from_secs(3), events.recv())
                .await
                .expect("timed out waiting for events")
                .expect("event stream ended early")
            {
                ServerMessage::Question { .. } => break,
                _ => continue,
            }
        }

        let state = quiz_client.snapshot().await;
        assert!(state.connected);
        assert!(state.quiz_active);
        let question = state.current_question.expect("question should be open");
        assert_eq!(question.prompt, "2+2");

        assert!(quiz_client.send_answer("4"));

        loop {
            match timeout(Duration::from_secs(3), events.recv())
                .await
                .expect("timed out waiting for events")
                .expect("event stream ended early")
            {
                ServerMessage::QuizOver(_) => break,
                _ => continue,
            }
        }

        let state = quiz_client.snapshot().await;
        assert_eq!(state.score, 10);
        assert!(state.quiz_over);
        assert!(state.current_question.is_none());
        assert!(state
            .messages
            .iter()
            .any(|m| m.contains("alice answered first")));
    }

    /// A join rejection surfaces as a connect error.
    #[tokio::test]
    async fn client_reports_rejected_join() {
        let server = start_server(vec![arithmetic_question()], fast_config(2_000)).await;

        let result = QuizClient::connect(&server.addr.to_string(), "al|ice").await;
        assert!(result.is_err());
        assert!(server.registry.is_empty().await);
    }
}
