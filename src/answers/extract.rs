//! Yes/No answer extraction.
//!
//! Finds the first case-insensitive occurrence of the question in a message
//! body and looks for a whole-word `yes` or `no` in the characters that
//! follow it. When both appear, the earlier one wins.

use std::sync::LazyLock;

use regex::Regex;

use crate::answers::types::Answer;

/// Characters scanned after the question when no window is configured.
pub const DEFAULT_WINDOW_CHARS: usize = 100;

/// Whole-word `yes`. A `no` glued directly onto it ("yesno") still reads as
/// `yes`; the glued `no` is never a token of its own.
static YES_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\byes(?:no)?\b").expect("valid yes pattern"));

static NO_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bno\b").expect("valid no pattern"));

/// Extract the answer using the default 100-character window.
pub fn extract(text: &str, question: &str) -> Option<Answer> {
    extract_with_window(text, question, DEFAULT_WINDOW_CHARS)
}

/// Extract the answer following `question` within `window_chars` characters.
///
/// Returns `None` when either input is empty, the question does not occur,
/// or neither token appears in the window.
pub fn extract_with_window(text: &str, question: &str, window_chars: usize) -> Option<Answer> {
    if text.is_empty() || question.is_empty() {
        return None;
    }

    let text_lower = text.to_lowercase();
    let question_lower = question.to_lowercase();

    let start = text_lower.find(&question_lower)? + question_lower.len();
    let after = &text_lower[start..];
    let end = after
        .char_indices()
        .nth(window_chars)
        .map_or(after.len(), |(idx, _)| idx);
    let window = &after[..end];

    let yes = YES_TOKEN.find(window).map(|m| m.start());
    let no = NO_TOKEN.find(window).map(|m| m.start());

    match (yes, no) {
        (Some(y), Some(n)) if y < n => Some(Answer::Yes),
        (Some(_), Some(_)) => Some(Answer::No),
        (Some(_), None) => Some(Answer::Yes),
        (None, Some(_)) => Some(Answer::No),
        (None, None) => None,
    }
}
