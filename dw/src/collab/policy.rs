//! Interview policy knobs
//!
//! The open choices of the conversation (probe bound, probe judgment,
//! short answers) are data here; the controller only consults them.

use serde::{Deserialize, Serialize};

use crate::config::CollabConfig;
use crate::extract::word_count;

/// Presentation language
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Zh,
}

/// Where the per-section probe bound comes from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeLimit {
    /// The configured `max-probes`
    #[default]
    Fixed,
    /// Asked of the model at Interview entry, configured value as fallback
    Model,
}

/// Who decides whether an answer deserves a follow-up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeJudge {
    /// Answer longer than `probe-min-words`
    Heuristic,
    /// The model says "yes"
    Model,
    /// Both: the length gate first, then the model
    #[default]
    Combined,
}

/// What a short answer means
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShortAnswerPolicy {
    /// Record it, then move to the next section
    #[default]
    Skip,
    /// Treat it like any other answer
    Accept,
}

/// Interview and review policy for one controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterviewPolicy {
    pub max_probes: usize,
    pub probe_limit: ProbeLimit,
    pub probe_judge: ProbeJudge,
    pub probe_min_words: usize,
    pub short_answer_words: usize,
    pub short_answer: ShortAnswerPolicy,
    pub analyze_feedback: bool,
    pub revision_history: usize,
}

impl Default for InterviewPolicy {
    fn default() -> Self {
        Self::from(&CollabConfig::default())
    }
}

impl From<&CollabConfig> for InterviewPolicy {
    fn from(config: &CollabConfig) -> Self {
        Self {
            max_probes: config.max_probes.max(1),
            probe_limit: config.probe_limit,
            probe_judge: config.probe_judge,
            probe_min_words: config.probe_min_words,
            short_answer_words: config.short_answer_words,
            short_answer: config.short_answer,
            analyze_feedback: config.analyze_feedback,
            revision_history: config.revision_history,
        }
    }
}

impl InterviewPolicy {
    /// True when the answer counts as an implicit skip
    pub fn is_implicit_skip(&self, answer: &str) -> bool {
        self.short_answer == ShortAnswerPolicy::Skip && word_count(answer) < self.short_answer_words
    }

    /// Length half of the probe judgment
    pub fn passes_length_gate(&self, answer: &str) -> bool {
        word_count(answer) > self.probe_min_words
    }

    /// Whether the judgment needs a model call after the length gate
    pub fn asks_model(&self) -> bool {
        matches!(self.probe_judge, ProbeJudge::Model | ProbeJudge::Combined)
    }

    /// Whether the length gate applies at all
    pub fn uses_length_gate(&self) -> bool {
        matches!(self.probe_judge, ProbeJudge::Heuristic | ProbeJudge::Combined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_config() {
        let policy = InterviewPolicy::default();
        assert_eq!(policy.max_probes, 3);
        assert_eq!(policy.probe_judge, ProbeJudge::Combined);
        assert_eq!(policy.short_answer, ShortAnswerPolicy::Skip);
        assert!(policy.asks_model());
        assert!(policy.uses_length_gate());
    }

    #[test]
    fn test_short_answer_threshold() {
        let policy = InterviewPolicy::default();
        assert!(policy.is_implicit_skip("not much to say"));
        assert!(!policy.is_implicit_skip("this answer has five words"));

        let accepting = InterviewPolicy {
            short_answer: ShortAnswerPolicy::Accept,
            ..InterviewPolicy::default()
        };
        assert!(!accepting.is_implicit_skip("no"));
    }

    #[test]
    fn test_length_gate_is_strict() {
        let policy = InterviewPolicy {
            probe_min_words: 3,
            ..InterviewPolicy::default()
        };
        assert!(!policy.passes_length_gate("one two three"));
        assert!(policy.passes_length_gate("one two three four"));
    }

    #[test]
    fn test_zero_max_probes_is_raised() {
        let config = CollabConfig {
            max_probes: 0,
            ..CollabConfig::default()
        };
        assert_eq!(InterviewPolicy::from(&config).max_probes, 1);
    }

    #[test]
    fn test_policy_names_deserialize() {
        let judge: ProbeJudge = serde_yaml::from_str("heuristic").unwrap();
        assert_eq!(judge, ProbeJudge::Heuristic);
        let locale: Locale = serde_yaml::from_str("zh").unwrap();
        assert_eq!(locale, Locale::Zh);
    }
}
