//! Types shared between the quiz server and its clients: the line-oriented
//! wire protocol, the newline framing codec, and the question model.

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use tokio_util::codec::{Decoder, Encoder};

/// Default port the server listens on.
pub const DEFAULT_PORT: u16 = 8888;
/// Default time budget per question, in seconds.
pub const DEFAULT_QUESTION_TIME_SECS: u64 = 20;
/// Default points awarded to the first correct answer.
pub const DEFAULT_POINTS: u32 = 10;
/// Default pause between questions, in seconds.
pub const DEFAULT_INTER_QUESTION_DELAY_SECS: u64 = 1;
/// How long a new connection has to send its `join:` line, in seconds.
pub const JOIN_TIMEOUT_SECS: u64 = 5;

/// Upper bound on a single protocol line. Anything longer is a framing error.
pub const MAX_LINE_LEN: usize = 8 * 1024;

/// Reserved separator inside `question:` and `leaderboard:` payloads.
/// Prompts, options, and player names must not contain it.
pub const FIELD_SEPARATOR: char = '|';

/// One quiz question. Option order is significant and echoed verbatim to
/// clients; `answer` is the exact text of the correct option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub prompt: String,
    pub options: Vec<String>,
    pub answer: String,
}

impl Question {
    pub fn new(
        prompt: impl Into<String>,
        options: Vec<String>,
        answer: impl Into<String>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            options,
            answer: answer.into(),
        }
    }

    /// Checks the wire constraints: at least one option, no pipe separator
    /// in the prompt or any option, and the answer present among the options.
    pub fn validate(&self) -> Result<(), InvalidQuestion> {
        if self.options.is_empty() {
            return Err(InvalidQuestion::new(&self.prompt, "has no options"));
        }
        if self.prompt.contains(FIELD_SEPARATOR) {
            return Err(InvalidQuestion::new(
                &self.prompt,
                "prompt contains the reserved '|' separator",
            ));
        }
        if self.options.iter().any(|o| o.contains(FIELD_SEPARATOR)) {
            return Err(InvalidQuestion::new(
                &self.prompt,
                "an option contains the reserved '|' separator",
            ));
        }
        if !self.options.contains(&self.answer) {
            return Err(InvalidQuestion::new(
                &self.prompt,
                "answer is not one of the options",
            ));
        }
        Ok(())
    }
}

/// Validation failure for a question pulled from a bank file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidQuestion {
    prompt: String,
    reason: &'static str,
}

impl InvalidQuestion {
    fn new(prompt: &str, reason: &'static str) -> Self {
        Self {
            prompt: prompt.to_string(),
            reason,
        }
    }
}

impl fmt::Display for InvalidQuestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid question {:?}: {}", self.prompt, self.reason)
    }
}

impl std::error::Error for InvalidQuestion {}

/// A command received from a client, one per line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// `join:<name>` — must be the first line on a new connection. The name
    /// is trimmed of surrounding whitespace and must be nonempty.
    Join(String),
    /// `answer:<text>` — an answer for the currently open question. The text
    /// is taken verbatim; matching against the correct option is exact.
    Answer(String),
}

impl ClientCommand {
    /// Parses one decoded line. Returns `None` for unknown tags or a blank
    /// join name; the server logs and discards those.
    pub fn parse(line: &str) -> Option<Self> {
        if let Some(name) = line.strip_prefix("join:") {
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            return Some(ClientCommand::Join(name.to_string()));
        }
        if let Some(text) = line.strip_prefix("answer:") {
            return Some(ClientCommand::Answer(text.to_string()));
        }
        None
    }

    /// Renders the command back to its wire line (without the delimiter).
    pub fn encode(&self) -> String {
        match self {
            ClientCommand::Join(name) => format!("join:{}", name),
            ClientCommand::Answer(text) => format!("answer:{}", text),
        }
    }
}

/// A message broadcast or sent from the server, one per line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// `welcome:<text>` — join acknowledged.
    Welcome(String),
    /// `start_quiz` — a quiz session has begun.
    StartQuiz,
    /// `question:<prompt>|<opt1>|<opt2>|...` — a new question is open.
    Question {
        prompt: String,
        options: Vec<String>,
    },
    /// `feedback:<text>` — result of the question that just closed.
    Feedback(String),
    /// `leaderboard:<name1>:<score1>|<name2>:<score2>|...` — full standings.
    Leaderboard(Vec<(String, u32)>),
    /// `quiz_over:<text>` — the session has finished.
    QuizOver(String),
    /// `error:<text>` — protocol violation; the connection closes after this.
    Error(String),
}

impl ServerMessage {
    /// Renders the message to its wire line (without the delimiter).
    pub fn encode(&self) -> String {
        match self {
            ServerMessage::Welcome(text) => format!("welcome:{}", text),
            ServerMessage::StartQuiz => "start_quiz".to_string(),
            ServerMessage::Question { prompt, options } => {
                format!("question:{}|{}", prompt, options.join("|"))
            }
            ServerMessage::Feedback(text) => format!("feedback:{}", text),
            ServerMessage::Leaderboard(entries) => {
                let body: Vec<String> = entries
                    .iter()
                    .map(|(name, score)| format!("{}:{}", name, score))
                    .collect();
                format!("leaderboard:{}", body.join("|"))
            }
            ServerMessage::QuizOver(text) => format!("quiz_over:{}", text),
            ServerMessage::Error(text) => format!("error:{}", text),
        }
    }

    /// Parses one decoded line. Returns `None` for lines that are not a
    /// recognized server message.
    pub fn parse(line: &str) -> Option<Self> {
        if line == "start_quiz" {
            return Some(ServerMessage::StartQuiz);
        }
        if let Some(text) = line.strip_prefix("welcome:") {
            return Some(ServerMessage::Welcome(text.to_string()));
        }
        if let Some(body) = line.strip_prefix("question:") {
            let mut fields = body.split(FIELD_SEPARATOR);
            let prompt = fields.next().unwrap_or_default().to_string();
            let options: Vec<String> = fields.map(str::to_string).collect();
            return Some(ServerMessage::Question { prompt, options });
        }
        if let Some(text) = line.strip_prefix("feedback:") {
            return Some(ServerMessage::Feedback(text.to_string()));
        }
        if let Some(body) = line.strip_prefix("leaderboard:") {
            let mut entries = Vec::new();
            if !body.is_empty() {
                for field in body.split(FIELD_SEPARATOR) {
                    let (name, score) = field.rsplit_once(':')?;
                    entries.push((name.to_string(), score.parse().ok()?));
                }
            }
            return Some(ServerMessage::Leaderboard(entries));
        }
        if let Some(text) = line.strip_prefix("quiz_over:") {
            return Some(ServerMessage::QuizOver(text.to_string()));
        }
        if let Some(text) = line.strip_prefix("error:") {
            return Some(ServerMessage::Error(text.to_string()));
        }
        None
    }
}

/// Newline framing for the protocol: decodes a byte stream into complete
/// lines and encodes outgoing lines with a trailing `\n`.
///
/// Partial trailing data is retained in the accumulation buffer across
/// reads; a read may therefore surface zero, one, or many complete lines.
/// End-of-stream is distinct from "no data yet": `decode` returns `None`
/// while more bytes may arrive, `decode_eof` drains any final unterminated
/// line and then ends the stream.
#[derive(Debug, Default)]
pub struct LineCodec;

fn into_line(mut raw: BytesMut) -> Result<String, io::Error> {
    if raw.last() == Some(&b'\r') {
        raw.truncate(raw.len() - 1);
    }
    String::from_utf8(raw.to_vec())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "line is not valid UTF-8"))
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, io::Error> {
        if let Some(pos) = src.iter().position(|&b| b == b'\n') {
            let mut line = src.split_to(pos + 1);
            line.truncate(pos);
            return into_line(line).map(Some);
        }
        if src.len() > MAX_LINE_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "line exceeds maximum length",
            ));
        }
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, io::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        if src.is_empty() {
            return Ok(None);
        }
        // The peer closed mid-line; surface the remainder as a final line.
        let rest = src.split_to(src.len());
        into_line(rest).map(Some)
    }
}

impl Encoder<String> for LineCodec {
    type Error = io::Error;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), io::Error> {
        dst.reserve(item.len() + 1);
        dst.extend_from_slice(item.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}
