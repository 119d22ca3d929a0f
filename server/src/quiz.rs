//! The quiz session state machine.
//!
//! A session walks the question sequence once: broadcast the question, wait
//! for the first correct answer or the deadline, score, broadcast feedback
//! and the leaderboard, advance. Answers flow in from the per-connection
//! tasks through the [`AnswerSink`]; the wait itself is a `select!` between
//! the answer channel and an absolute-deadline timer, so one unresponsive
//! client can never stall resolution and a quiz with zero players just
//! idles until the deadline.

use crate::broadcast::Broadcaster;
use crate::registry::Registry;
use log::{debug, info, warn};
use shared::{Question, ServerMessage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{sleep, sleep_until, Instant};

/// Timing and scoring knobs for a session.
#[derive(Debug, Clone)]
pub struct QuizConfig {
    /// Time budget per question.
    pub question_time: Duration,
    /// Points awarded to the first correct answer.
    pub points: u32,
    /// Pause between questions, so clients can render feedback before the
    /// next prompt arrives.
    pub inter_question_delay: Duration,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            question_time: Duration::from_secs(shared::DEFAULT_QUESTION_TIME_SECS),
            points: shared::DEFAULT_POINTS,
            inter_question_delay: Duration::from_secs(shared::DEFAULT_INTER_QUESTION_DELAY_SECS),
        }
    }
}

/// One `answer:` line read off a connection, stamped with the identity of
/// the connection that produced it.
#[derive(Debug, Clone)]
pub struct AnswerEvent {
    pub name: String,
    pub generation: u64,
    pub text: String,
}

/// Hand-off point between connection tasks and the session task.
///
/// While a question is open the sink holds the sending side of that
/// question's answer channel; when no question is open, submissions are
/// dropped at the door. The channel is recreated per question, so a
/// straggling answer for question N can never surface during question N+1.
#[derive(Debug, Default)]
pub struct AnswerSink {
    slot: Mutex<Option<UnboundedSender<AnswerEvent>>>,
}

impl AnswerSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a fresh answer channel and returns its receiving side.
    pub fn open(&self) -> UnboundedReceiver<AnswerEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        *self.slot.lock().expect("answer sink lock poisoned") = Some(sender);
        receiver
    }

    /// Uninstalls the current channel. Submissions after this are discarded.
    pub fn close(&self) {
        self.slot.lock().expect("answer sink lock poisoned").take();
    }

    /// Forwards an answer to the open question, or drops it when none is.
    pub fn submit(&self, event: AnswerEvent) {
        let slot = self.slot.lock().expect("answer sink lock poisoned");
        if let Some(sender) = slot.as_ref() {
            // A send failure means the session task already dropped the
            // receiver; the answer is late either way.
            let _ = sender.send(event);
        }
    }
}

/// Owns the question sequence and runs at most one session at a time.
#[derive(Debug)]
pub struct QuizController {
    registry: Arc<Registry>,
    broadcaster: Broadcaster,
    sink: Arc<AnswerSink>,
    questions: Vec<Question>,
    config: QuizConfig,
    running: AtomicBool,
}

impl QuizController {
    pub fn new(
        registry: Arc<Registry>,
        broadcaster: Broadcaster,
        sink: Arc<AnswerSink>,
        questions: Vec<Question>,
        config: QuizConfig,
    ) -> Self {
        Self {
            registry,
            broadcaster,
            sink,
            questions,
            config,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Starts a session task unless one is already running. Returns whether
    /// a session was started; a rejection is reported to the operator, not
    /// an error.
    pub fn try_start(self: &Arc<Self>) -> bool {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        let controller = Arc::clone(self);
        tokio::spawn(async move {
            controller.run_session().await;
            controller.running.store(false, Ordering::SeqCst);
        });
        true
    }

    async fn run_session(&self) {
        info!("Quiz session starting: {} questions", self.questions.len());
        self.broadcaster.broadcast(ServerMessage::StartQuiz).await;

        for (index, question) in self.questions.iter().enumerate() {
            let winner = self.run_question(index, question).await;

            let feedback = match &winner {
                Some(name) => {
                    info!("Question {}: first correct answer from {}", index + 1, name);
                    format!("{} answered first and got it right!", name)
                }
                None => {
                    info!("Question {}: no correct answers", index + 1);
                    format!("No correct answers. Correct was: {}", question.answer)
                }
            };
            self.broadcaster
                .broadcast(ServerMessage::Feedback(feedback))
                .await;

            let standings = self.registry.scores().await;
            self.broadcaster
                .broadcast(ServerMessage::Leaderboard(standings))
                .await;

            sleep(self.config.inter_question_delay).await;
        }

        self.broadcaster
            .broadcast(ServerMessage::QuizOver("Thanks for playing!".to_string()))
            .await;
        info!("Quiz session finished");
    }

    /// Opens one question, waits for its resolution, and returns the winner
    /// if there is one. Exactly one score mutation can happen per question.
    async fn run_question(&self, index: usize, question: &Question) -> Option<String> {
        let mut answers = self.sink.open();

        self.broadcaster
            .broadcast(ServerMessage::Question {
                prompt: question.prompt.clone(),
                options: question.options.clone(),
            })
            .await;
        debug!("Question {} open: {}", index + 1, question.prompt);

        let deadline = Instant::now() + self.config.question_time;
        let mut winner = None;

        while winner.is_none() {
            tokio::select! {
                _ = sleep_until(deadline) => break,
                event = answers.recv() => {
                    let Some(event) = event else {
                        // The sink sender only drops when the sink itself is
                        // replaced; treat it as the question closing.
                        warn!("Answer channel closed while question {} open", index + 1);
                        break;
                    };
                    self.consider(&event, question, &mut winner).await;
                }
            }
        }

        // Stragglers are discarded at the connection tasks from here on.
        self.sink.close();
        winner
    }

    async fn consider(&self, event: &AnswerEvent, question: &Question, winner: &mut Option<String>) {
        // An answer from a superseded or already-removed connection must not
        // score under a name it no longer owns.
        if !self.registry.is_current(&event.name, event.generation).await {
            debug!("Discarding answer from stale connection for {}", event.name);
            return;
        }

        debug!("Answer from {}: {:?}", event.name, event.text);
        if event.text == question.answer {
            self.registry.adjust_score(&event.name, self.config.points).await;
            *winner = Some(event.name.clone());
        }
    }
}
