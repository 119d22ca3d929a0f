//! Client-side view of the quiz, built up from server broadcasts.
//!
//! The state is a plain snapshot a UI can poll and render: the currently
//! open question, the latest leaderboard, this player's score, and a short
//! tail of human-readable messages.

use shared::ServerMessage;

/// Cap on the retained message tail.
const MAX_MESSAGES: usize = 50;

/// The question currently open on the server, as presented to this client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentQuestion {
    pub prompt: String,
    pub options: Vec<String>,
}

/// Poll-friendly snapshot of everything the client knows.
#[derive(Debug, Clone, Default)]
pub struct ClientState {
    pub connected: bool,
    pub username: String,
    pub score: u32,
    pub current_question: Option<CurrentQuestion>,
    pub leaderboard: Vec<(String, u32)>,
    pub messages: Vec<String>,
    pub quiz_active: bool,
    pub quiz_over: bool,
}

impl ClientState {
    pub fn new(username: &str) -> Self {
        Self {
            connected: true,
            username: username.to_string(),
            ..Self::default()
        }
    }

    /// Applies one server message to the view.
    pub fn apply(&mut self, message: &ServerMessage) {
        match message {
            ServerMessage::Welcome(text) => self.push_message(text.clone()),
            ServerMessage::StartQuiz => {
                self.quiz_active = true;
                self.quiz_over = false;
                self.push_message("Quiz started!".to_string());
            }
            ServerMessage::Question { prompt, options } => {
                self.current_question = Some(CurrentQuestion {
                    prompt: prompt.clone(),
                    options: options.clone(),
                });
            }
            ServerMessage::Feedback(text) => {
                self.current_question = None;
                self.push_message(text.clone());
            }
            ServerMessage::Leaderboard(entries) => {
                if let Some((_, score)) = entries.iter().find(|(name, _)| *name == self.username) {
                    self.score = *score;
                }
                self.leaderboard = entries.clone();
            }
            ServerMessage::QuizOver(text) => {
                self.quiz_active = false;
                self.quiz_over = true;
                self.current_question = None;
                self.push_message(text.clone());
            }
            ServerMessage::Error(text) => self.push_message(format!("Server error: {}", text)),
        }
    }

    fn push_message(&mut self, message: String) {
        self.messages.push(message);
        if self.messages.len() > MAX_MESSAGES {
            let excess = self.messages.len() - MAX_MESSAGES;
            self.messages.drain(..excess);
        }
    }
}
