//! Question bank loading.

use log::info;
use shared::Question;
use std::error::Error;
use std::fs;
use std::path::Path;

/// The built-in bank used when no file is given.
pub fn default_set() -> Vec<Question> {
    vec![
        Question::new(
            "What is 2 + 2?",
            vec!["2".into(), "3".into(), "4".into(), "5".into()],
            "4",
        ),
        Question::new(
            "Capital of France?",
            vec![
                "Paris".into(),
                "London".into(),
                "Berlin".into(),
                "Rome".into(),
            ],
            "Paris",
        ),
        Question::new(
            "How many continents are there?",
            vec!["5".into(), "6".into(), "7".into(), "8".into()],
            "7",
        ),
    ]
}

/// Loads a JSON array of questions and validates each against the wire
/// constraints. An empty bank is an error: a quiz with no questions would
/// start and immediately end.
pub fn load_from_file(path: &Path) -> Result<Vec<Question>, Box<dyn Error>> {
    let data = fs::read_to_string(path)?;
    let questions: Vec<Question> = serde_json::from_str(&data)?;

    if questions.is_empty() {
        return Err(format!("question file {} contains no questions", path.display()).into());
    }
    for question in &questions {
        question.validate()?;
    }

    info!(
        "Loaded {} question(s) from {}",
        questions.len(),
        path.display()
    );
    Ok(questions)
}
