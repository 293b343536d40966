//! 答案归一化与判分

use serde::Serialize;
use unicode_normalization::UnicodeNormalization;

/// Canonical comparison form: NFKC (folds full-width and compatibility
/// forms), trimmed, whitespace runs collapsed to one space, lowercased.
/// A byte-order mark counts as whitespace.
pub fn normalize(text: &str) -> String {
    let folded: String = text.nfkc().collect();
    folded
        .split(is_blank)
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn is_blank(c: char) -> bool {
    c.is_whitespace() || c == '\u{feff}'
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResult {
    pub correct: bool,
    /// First accepted answer, for display.
    pub expected: String,
    /// Raw input as typed.
    pub actual: String,
}

/// Correct iff the normalized input equals any normalized accepted answer.
pub fn score_answer(input: Option<&str>, accepted: &[String]) -> AnswerResult {
    let actual = input.unwrap_or_default();
    let wanted = normalize(actual);
    let correct = accepted.iter().any(|a| normalize(a) == wanted);

    AnswerResult {
        correct,
        expected: accepted.first().cloned().unwrap_or_default(),
        actual: actual.to_string(),
    }
}
