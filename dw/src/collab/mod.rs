//! Collaboration Controller and its policy and presentation layers

mod controller;
mod policy;
mod presenter;

pub use controller::{AutopilotTurn, Controller, Reply, StepError};
pub use policy::{InterviewPolicy, Locale, ProbeJudge, ProbeLimit, ShortAnswerPolicy};
pub use presenter::{Chinese, English, Presenter, VALID_CONTENT_TYPES, is_valid_content_type, presenter_for};

/// Inputs that end a conversation
pub const QUIT_WORDS: &[&str] = &["quit", "exit"];

pub fn is_quit(input: &str) -> bool {
    let input = input.trim().to_lowercase();
    QUIT_WORDS.contains(&input.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_quit() {
        assert!(is_quit("quit"));
        assert!(is_quit(" Exit "));
        assert!(!is_quit("quit now"));
    }
}
