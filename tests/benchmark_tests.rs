//! Performance benchmarks for critical protocol and registry paths

use bytes::BytesMut;
use server::registry::{Registry, ScorePolicy};
use shared::{LineCodec, ServerMessage};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::codec::{Decoder, Encoder};

/// Benchmarks line decoding throughput on a large accumulated buffer
#[test]
fn benchmark_line_decode() {
    let mut codec = LineCodec;
    let mut buf = BytesMut::new();

    let lines = 100_000;
    for i in 0..lines {
        codec
            .encode(format!("answer:option-{}", i), &mut buf)
            .unwrap();
    }

    let start = Instant::now();

    let mut decoded = 0;
    while codec.decode(&mut buf).unwrap().is_some() {
        decoded += 1;
    }

    let duration = start.elapsed();
    println!(
        "Line decode: {} lines in {:?} ({:.2} ns/line)",
        decoded,
        duration,
        duration.as_nanos() as f64 / decoded as f64
    );

    assert_eq!(decoded, lines);
    // Should complete well under a second for 100k lines
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks encoding of broadcast lines
#[test]
fn benchmark_line_encode() {
    let mut codec = LineCodec;
    let iterations = 100_000;

    let start = Instant::now();

    for i in 0..iterations {
        let mut buf = BytesMut::new();
        codec
            .encode(format!("feedback:player-{} got it right", i), &mut buf)
            .unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Line encode: {} lines in {:?} ({:.2} ns/line)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 1000);
}

/// Benchmarks protocol message encode/parse round-trips
#[test]
fn benchmark_message_roundtrip() {
    let message = ServerMessage::Leaderboard(vec![
        ("alice".to_string(), 10),
        ("bob".to_string(), 20),
        ("carol".to_string(), 0),
        ("dave".to_string(), 30),
    ]);

    let iterations = 100_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let line = message.encode();
        let parsed = ServerMessage::parse(&line).unwrap();
        assert_eq!(parsed, message);
    }

    let duration = start.elapsed();
    println!(
        "Message roundtrip: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 2000);
}

/// Benchmarks registry registration and snapshot under a large player set
#[tokio::test]
async fn benchmark_registry_operations() {
    let registry = Registry::new(ScorePolicy::Preserve);
    let players = 1_000;

    // Keep the receivers alive so no entry looks disconnected.
    let mut receivers = Vec::with_capacity(players);

    let start = Instant::now();
    for i in 0..players {
        let (sender, receiver) = mpsc::unbounded_channel();
        registry.register(&format!("player-{}", i), sender).await;
        receivers.push(receiver);
    }
    let register_duration = start.elapsed();

    let start = Instant::now();
    let snapshots = 100;
    for _ in 0..snapshots {
        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.len(), players);
    }
    let snapshot_duration = start.elapsed();

    let start = Instant::now();
    for i in 0..players {
        registry.adjust_score(&format!("player-{}", i), 10).await;
    }
    let score_duration = start.elapsed();

    println!(
        "Registry: {} registrations in {:?}, {} snapshots in {:?}, {} score updates in {:?}",
        players, register_duration, snapshots, snapshot_duration, players, score_duration
    );

    // Loose bounds; these paths sit on the quiz loop's critical path.
    assert!(register_duration.as_millis() < 1000);
    assert!(snapshot_duration.as_millis() < 2000);
    assert!(score_duration.as_millis() < 1000);
}

/// Benchmarks broadcast fan-out through connection queues
#[tokio::test]
async fn benchmark_broadcast_fanout() {
    use server::broadcast::Broadcaster;
    use std::sync::Arc;

    let registry = Arc::new(Registry::new(ScorePolicy::Preserve));
    let broadcaster = Broadcaster::new(Arc::clone(&registry));

    let players = 500;
    let mut receivers = Vec::with_capacity(players);
    for i in 0..players {
        let (sender, receiver) = mpsc::unbounded_channel();
        registry.register(&format!("player-{}", i), sender).await;
        receivers.push(receiver);
    }

    let rounds = 100;
    let start = Instant::now();
    for _ in 0..rounds {
        broadcaster.broadcast(ServerMessage::StartQuiz).await;
    }
    let duration = start.elapsed();

    println!(
        "Broadcast: {} rounds to {} players in {:?} ({:.2} µs/round)",
        rounds,
        players,
        duration,
        duration.as_micros() as f64 / rounds as f64
    );

    // Every queue saw every round.
    for receiver in &mut receivers {
        let mut seen = 0;
        while receiver.try_recv().is_ok() {
            seen += 1;
        }
        assert_eq!(seen, rounds);
    }

    assert!(duration.as_millis() < 2000);
}
