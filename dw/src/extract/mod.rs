//! Response extraction
//!
//! Best-effort parsers that pull structured data out of free model text.
//! Every extractor tolerates prose around the payload, and every fallible
//! one has a total counterpart that substitutes a deterministic default.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::session::{InterviewQuestion, Outline};

mod defaults;

pub use defaults::default_outline;

/// Markers of the topic-analysis reply
pub const TOPIC_MARKERS: &[&str] = &["CONTENT_TYPE:", "TOPIC:", "FEEDBACK:"];

/// Markers of the interview-question reply
pub const QUESTION_MARKERS: &[&str] = &["QUESTION:", "RATIONALE:", "EXAMPLE ANSWER:"];

/// Why a structured payload could not be extracted
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no JSON object found")]
    NoJsonObject,

    #[error("invalid outline: {0}")]
    InvalidOutline(#[from] serde_json::Error),

    #[error("missing field '{0}'")]
    MissingField(&'static str),
}

/// Result of a total extraction: the parsed value or the substituted default
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction<T> {
    Parsed(T),
    Fallback(T),
}

impl<T> Extraction<T> {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Extraction::Fallback(_))
    }

    pub fn value(&self) -> &T {
        match self {
            Extraction::Parsed(v) | Extraction::Fallback(v) => v,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Extraction::Parsed(v) | Extraction::Fallback(v) => v,
        }
    }
}

/// Substring from the first `{` to the last `}`, if both exist in that order
pub fn json_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parse an outline object out of surrounding prose
pub fn parse_outline(text: &str) -> Result<Outline, ExtractError> {
    let span = json_object_span(text).ok_or(ExtractError::NoJsonObject)?;
    Ok(serde_json::from_str(span)?)
}

/// Parse an outline, substituting `fallback()` on any failure
pub fn extract_outline(text: &str, fallback: impl FnOnce() -> Outline) -> Extraction<Outline> {
    debug!(text_len = text.len(), "extract_outline: called");
    match parse_outline(text) {
        Ok(outline) => Extraction::Parsed(outline),
        Err(e) => {
            warn!(error = %e, "extract_outline: using fallback outline");
            Extraction::Fallback(fallback())
        }
    }
}

/// Parse an outline, falling back to the default for `content_type`
pub fn outline_or_default(text: &str, content_type: &str) -> Extraction<Outline> {
    extract_outline(text, || default_outline(content_type))
}

/// Byte offset just past `marker` when it opens a line
///
/// Matching ignores ASCII case and leading list/emphasis decoration
/// (`*`, `#`, `-`, whitespace), so `**Question:**` still matches.
fn marker_end(text: &str, marker: &str) -> Option<(usize, usize)> {
    let mut line_start = 0;
    for line in text.split_inclusive('\n') {
        let decoration = line.len() - line.trim_start_matches(['*', '#', '-', ' ', '\t']).len();
        let body = &line[decoration..];
        if body.len() >= marker.len() && body.as_bytes()[..marker.len()].eq_ignore_ascii_case(marker.as_bytes()) {
            return Some((line_start, line_start + decoration + marker.len()));
        }
        line_start += line.len();
    }
    None
}

/// Value of a labeled field, up to the next line that opens another marker
///
/// Empty values count as missing.
pub fn labeled_field(text: &str, marker: &str, markers: &[&str]) -> Option<String> {
    let (_, value_start) = marker_end(text, marker)?;
    let rest = &text[value_start..];
    let value_end = markers
        .iter()
        .filter(|m| !m.eq_ignore_ascii_case(marker))
        .filter_map(|m| marker_end(rest, m).map(|(line, _)| line))
        .min()
        .unwrap_or(rest.len());

    let value = rest[..value_end].trim_matches(|c: char| c == '*' || c.is_whitespace());
    (!value.is_empty()).then(|| value.to_string())
}

/// First line of a labeled field
pub fn labeled_line(text: &str, marker: &str, markers: &[&str]) -> Option<String> {
    labeled_field(text, marker, markers)
        .and_then(|v| v.lines().next().map(|l| l.trim().trim_matches('*').trim().to_string()))
        .filter(|v| !v.is_empty())
}

/// Topic analysis parsed from a CONTENT_TYPE/TOPIC/FEEDBACK reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSuggestion {
    pub content_type: String,
    pub topic: String,
    pub feedback: Option<String>,
}

/// Parse a topic analysis; CONTENT_TYPE and TOPIC are required
pub fn parse_topic_suggestion(text: &str) -> Result<TopicSuggestion, ExtractError> {
    let content_type =
        labeled_line(text, "CONTENT_TYPE:", TOPIC_MARKERS).ok_or(ExtractError::MissingField("CONTENT_TYPE"))?;
    let topic = labeled_line(text, "TOPIC:", TOPIC_MARKERS).ok_or(ExtractError::MissingField("TOPIC"))?;
    let feedback = labeled_field(text, "FEEDBACK:", TOPIC_MARKERS);
    Ok(TopicSuggestion {
        content_type: content_type.trim_matches(['[', ']']).to_string(),
        topic: topic.trim_matches(['[', ']', '"', '\'']).to_string(),
        feedback,
    })
}

/// The question asked when the model's reply has no usable question
pub fn generic_question() -> InterviewQuestion {
    InterviewQuestion {
        question: "Could you tell me more about this topic?".to_string(),
        rationale: Some("Basic exploration of the topic".to_string()),
        example_answer: None,
    }
}

/// Parse a QUESTION/RATIONALE/EXAMPLE ANSWER reply
pub fn parse_question(text: &str) -> Result<InterviewQuestion, ExtractError> {
    let question = labeled_field(text, "QUESTION:", QUESTION_MARKERS).ok_or(ExtractError::MissingField("QUESTION"))?;
    Ok(InterviewQuestion {
        question,
        rationale: labeled_field(text, "RATIONALE:", QUESTION_MARKERS),
        example_answer: labeled_field(text, "EXAMPLE ANSWER:", QUESTION_MARKERS),
    })
}

/// Parse a question, substituting `fallback()` when QUESTION is missing
pub fn extract_question(text: &str, fallback: impl FnOnce() -> InterviewQuestion) -> Extraction<InterviewQuestion> {
    debug!(text_len = text.len(), "extract_question: called");
    match parse_question(text) {
        Ok(q) => Extraction::Parsed(q),
        Err(e) => {
            warn!(error = %e, "extract_question: using fallback question");
            Extraction::Fallback(fallback())
        }
    }
}

/// Strict yes/no: true only for exactly "yes" after trimming and lowercasing
pub fn extract_decision(text: &str) -> bool {
    text.trim().to_lowercase() == "yes"
}

/// Yes/no from a generation outcome; any failure is "no"
pub fn decision_from<E: std::fmt::Display>(result: Result<String, E>) -> bool {
    match result {
        Ok(text) => extract_decision(&text),
        Err(e) => {
            debug!(error = %e, "decision_from: generation failed, treating as no");
            false
        }
    }
}

fn number_re() -> Option<&'static Regex> {
    static NUMBER_RE: OnceLock<Option<Regex>> = OnceLock::new();
    NUMBER_RE.get_or_init(|| Regex::new(r"[0-9]+").ok()).as_ref()
}

/// First unsigned integer appearing in the text
pub fn extract_first_number(text: &str) -> Option<u64> {
    number_re()?.find(text).and_then(|m| m.as_str().parse().ok())
}

/// Probe limit from a model reply: first number clamped to 1..=5, else `fallback`
pub fn extract_probe_limit(text: &str, fallback: usize) -> usize {
    match extract_first_number(text) {
        Some(n) => n.clamp(1, 5) as usize,
        None => fallback,
    }
}

/// Whitespace-separated word count
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_json_object_span() {
        assert_eq!(json_object_span("Here: {\"a\": []} done"), Some("{\"a\": []}"));
        assert_eq!(json_object_span("no braces"), None);
        assert_eq!(json_object_span("} backwards {"), None);
        assert_eq!(json_object_span(""), None);
    }

    #[test]
    fn test_parse_outline_with_prose() {
        let text = "Sure! Here is the outline:\n```json\n{\"Intro\": [\"Hook\"], \"Body\": [\"Point\"]}\n```\nEnjoy.";
        let outline = parse_outline(text).unwrap();
        let names: Vec<_> = outline.section_names().collect();
        assert_eq!(names, vec!["Intro", "Body"]);
    }

    #[test]
    fn test_parse_outline_failures() {
        assert!(matches!(parse_outline("nothing"), Err(ExtractError::NoJsonObject)));
        assert!(matches!(parse_outline("{}"), Err(ExtractError::InvalidOutline(_))));
        assert!(matches!(parse_outline("{\"A\": 1}"), Err(ExtractError::InvalidOutline(_))));
        assert!(matches!(parse_outline("{\"A\": [1, 2]}"), Err(ExtractError::InvalidOutline(_))));
        assert!(matches!(parse_outline("{\"A\": [\"x\"],}"), Err(ExtractError::InvalidOutline(_))));
    }

    #[test]
    fn test_outline_or_default_falls_back_by_type() {
        let result = outline_or_default("I cannot do that", "memo");
        assert!(result.is_fallback());
        assert_eq!(result.value().first_section(), Some("Purpose"));

        let result = outline_or_default("{\"Only\": []}", "memo");
        assert!(!result.is_fallback());
        assert_eq!(result.into_inner().len(), 1);
    }

    #[test]
    fn test_extract_outline_uses_caller_default() {
        let previous = Outline::from_static(&[("Kept", &["As Is"])]);
        let result = extract_outline("garbled {", || previous.clone());
        assert_eq!(result, Extraction::Fallback(previous));
    }

    #[test]
    fn test_parse_question_full() {
        let text = "QUESTION: What got you started?\nRATIONALE: Sets the scene.\nEXAMPLE ANSWER: I read a book.";
        let q = parse_question(text).unwrap();
        assert_eq!(q.question, "What got you started?");
        assert_eq!(q.rationale.as_deref(), Some("Sets the scene."));
        assert_eq!(q.example_answer.as_deref(), Some("I read a book."));
    }

    #[test]
    fn test_parse_question_decorated_and_multiline() {
        let text = "Here you go:\n\n**QUESTION:** What changed\nin the last decade?\n**Rationale:** Trends matter.\n";
        let q = parse_question(text).unwrap();
        assert_eq!(q.question, "What changed\nin the last decade?");
        assert_eq!(q.rationale.as_deref(), Some("Trends matter."));
        assert!(q.example_answer.is_none());
    }

    #[test]
    fn test_marker_inside_prose_is_ignored() {
        let text = "QUESTION: Why does the question: of cost matter?\nRATIONALE: cost";
        let q = parse_question(text).unwrap();
        assert_eq!(q.question, "Why does the question: of cost matter?");
    }

    #[test]
    fn test_extract_question_fallback() {
        let result = extract_question("Tell me about solar panels.", generic_question);
        assert!(result.is_fallback());
        assert_eq!(result.value().question, "Could you tell me more about this topic?");
        assert_eq!(result.value().rationale.as_deref(), Some("Basic exploration of the topic"));
    }

    #[test]
    fn test_parse_topic_suggestion() {
        let text = "CONTENT_TYPE: Blog Post\nTOPIC: [Rooftop Solar for Renters]\nFEEDBACK: Narrow the audience.\nConsider costs.";
        let s = parse_topic_suggestion(text).unwrap();
        assert_eq!(s.content_type, "Blog Post");
        assert_eq!(s.topic, "Rooftop Solar for Renters");
        assert_eq!(s.feedback.as_deref(), Some("Narrow the audience.\nConsider costs."));
    }

    #[test]
    fn test_parse_topic_suggestion_missing_topic() {
        let err = parse_topic_suggestion("CONTENT_TYPE: article\nFEEDBACK: fine").unwrap_err();
        assert!(matches!(err, ExtractError::MissingField("TOPIC")));
    }

    #[test]
    fn test_extract_decision() {
        assert!(extract_decision("yes"));
        assert!(extract_decision("  YES \n"));
        assert!(extract_decision("Yes"));
        assert!(!extract_decision("yes."));
        assert!(!extract_decision("yes, definitely"));
        assert!(!extract_decision("no"));
        assert!(!extract_decision(""));
    }

    #[test]
    fn test_decision_from_failure_is_no() {
        assert!(!decision_from::<String>(Err("timeout".to_string())));
        assert!(decision_from::<String>(Ok(" yes ".to_string())));
    }

    #[test]
    fn test_extract_first_number() {
        assert_eq!(extract_first_number("I'd say 4 follow-ups, maybe 6"), Some(4));
        assert_eq!(extract_first_number("no digits here"), None);
        assert_eq!(extract_first_number(""), None);
    }

    #[test]
    fn test_extract_probe_limit() {
        assert_eq!(extract_probe_limit("I suggest 2 questions", 3), 2);
        assert_eq!(extract_probe_limit("10", 3), 5);
        assert_eq!(extract_probe_limit("0", 3), 1);
        assert_eq!(extract_probe_limit("a few", 3), 3);
    }

    #[test]
    fn test_word_count() {
        assert_eq!(word_count("  one two\tthree\nfour  "), 4);
        assert_eq!(word_count(""), 0);
    }

    proptest! {
        #[test]
        fn prop_outline_extraction_is_total(text in ".*", kind in "[a-z ]{0,12}") {
            let result = outline_or_default(&text, &kind);
            prop_assert!(!result.value().is_empty());
            if result.is_fallback() {
                prop_assert_eq!(result.value(), &default_outline(&kind));
            }
        }

        #[test]
        fn prop_well_formed_outline_roundtrips_through_prose(
            names in proptest::collection::hash_set("[A-Za-z][A-Za-z ]{0,10}", 1..6),
            prefix in "[^{}]{0,20}",
            suffix in "[^{}]{0,20}",
        ) {
            let sections: Vec<_> = names
                .into_iter()
                .map(|n| crate::session::Section::new(n, vec!["Point".to_string()]))
                .collect();
            let outline = Outline::new(sections).unwrap();
            let text = format!("{prefix}{}{suffix}", serde_json::to_string(&outline).unwrap());
            prop_assert_eq!(parse_outline(&text).unwrap(), outline);
        }

        #[test]
        fn prop_padded_yes_in_any_casing_is_true(word in "[yY][eE][sS]", pad_l in "[ \t\n]{0,3}", pad_r in "[ \t\n]{0,3}") {
            let text = format!("{pad_l}{word}{pad_r}");
            prop_assert!(extract_decision(&text));
        }

        #[test]
        fn prop_anything_else_is_false(text in ".*") {
            prop_assume!(text.trim().to_lowercase() != "yes");
            prop_assert!(!extract_decision(&text));
        }
    }
}
