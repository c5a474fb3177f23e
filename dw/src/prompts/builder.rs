//! Prompt Builder
//!
//! One function per controller action. Each reads the session, never
//! writes it, and renders the action's template pair. Structured fields
//! (outline, interview log, settings) are embedded as JSON text.

use eyre::Result;
use serde::Serialize;
use tracing::debug;

use super::{Prompt, PromptKind, PromptLoader};
use crate::session::SessionState;

/// Word count assumed when a session has none yet
pub const DEFAULT_TARGET_LENGTH: u32 = 1000;

/// Values a template can reference
///
/// Session-derived fields are always filled; the action-specific ones are
/// empty unless the action sets them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PromptContext {
    pub topic: String,
    pub content_type: String,
    pub target_length: u32,
    pub outline_json: String,
    pub interview_json: String,
    pub settings_json: String,
    pub has_settings: bool,
    pub section: String,
    pub subsections: String,
    pub draft: String,

    pub topic_input: String,
    pub feedback: String,
    pub analysis: Option<String>,
    pub response: String,
    pub question: String,
    pub rationale: String,
    pub follow_up: bool,
    pub context_json: String,
}

impl PromptContext {
    /// Context carrying everything the session currently knows
    pub fn from_session(state: &SessionState) -> Self {
        debug!(session = %state.id, phase = ?state.phase(), "PromptContext::from_session: called");
        let section = state.current_section.clone().unwrap_or_default();
        let subsections = state
            .outline
            .as_ref()
            .and_then(|o| o.section(&section))
            .map(|s| s.subsections.join(", "))
            .unwrap_or_default();

        Self {
            topic: state.topic_or_default().to_string(),
            content_type: state.content_type_or_default().to_string(),
            target_length: state.target_length.unwrap_or(DEFAULT_TARGET_LENGTH),
            outline_json: state.outline.as_ref().map(|o| o.to_json_pretty()).unwrap_or_else(|| "{}".to_string()),
            interview_json: to_json(&state.interview_log),
            settings_json: to_json(&state.settings),
            has_settings: !state.settings.is_empty(),
            section,
            subsections,
            draft: state.draft.clone().unwrap_or_default(),
            ..Default::default()
        }
    }

    fn original_context(state: &SessionState) -> String {
        to_json(&serde_json::json!({
            "topic": state.topic_or_default(),
            "content_type": state.content_type_or_default(),
            "target_length": state.target_length.unwrap_or(DEFAULT_TARGET_LENGTH),
            "outline": state.outline,
            "interview_responses": state.interview_log,
            "settings": state.settings,
        }))
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Renders the prompt for each controller action
pub struct PromptBuilder {
    loader: PromptLoader,
}

impl PromptBuilder {
    pub fn new(loader: PromptLoader) -> Self {
        Self { loader }
    }

    /// Builder over the embedded templates only
    pub fn embedded() -> Self {
        Self::new(PromptLoader::embedded_only())
    }

    /// Analyze a raw topic: suggest a content type and a refined title
    pub fn topic_analysis(&self, state: &SessionState, topic_input: &str) -> Result<Prompt> {
        debug!(session = %state.id, "topic_analysis: called");
        let ctx = PromptContext {
            topic_input: topic_input.to_string(),
            ..PromptContext::from_session(state)
        };
        self.loader.render_pair(PromptKind::TopicAnalysis, &ctx)
    }

    /// Re-refine the proposed topic against user feedback
    pub fn topic_refine(&self, state: &SessionState, feedback: &str) -> Result<Prompt> {
        debug!(session = %state.id, "topic_refine: called");
        let ctx = PromptContext {
            feedback: feedback.to_string(),
            ..PromptContext::from_session(state)
        };
        self.loader.render_pair(PromptKind::TopicRefine, &ctx)
    }

    pub fn outline(&self, state: &SessionState) -> Result<Prompt> {
        debug!(session = %state.id, "outline: called");
        self.loader.render_pair(PromptKind::Outline, &PromptContext::from_session(state))
    }

    /// Modify the current outline per user feedback
    pub fn outline_modify(&self, state: &SessionState, feedback: &str) -> Result<Prompt> {
        debug!(session = %state.id, "outline_modify: called");
        let base = PromptContext::from_session(state);
        let context_json = to_json(&serde_json::json!({
            "topic": base.topic,
            "content_type": base.content_type,
            "target_length": base.target_length,
            "previous_outline": state.outline,
        }));
        let ctx = PromptContext {
            feedback: feedback.to_string(),
            context_json,
            ..base
        };
        self.loader.render_pair(PromptKind::OutlineModify, &ctx)
    }

    /// Question for the current section; `follow_up` asks for a probe
    pub fn interview_question(&self, state: &SessionState, follow_up: bool) -> Result<Prompt> {
        debug!(session = %state.id, section = ?state.current_section, %follow_up, "interview_question: called");
        let ctx = PromptContext {
            follow_up,
            ..PromptContext::from_session(state)
        };
        self.loader.render_pair(PromptKind::InterviewQuestion, &ctx)
    }

    /// Yes/no: does `response` deserve a follow-up
    pub fn probe_decision(&self, state: &SessionState, response: &str) -> Result<Prompt> {
        debug!(session = %state.id, "probe_decision: called");
        let ctx = PromptContext {
            response: response.to_string(),
            ..PromptContext::from_session(state)
        };
        self.loader.render_pair(PromptKind::ProbeDecision, &ctx)
    }

    /// How many follow-ups each section should get
    pub fn max_probes(&self, state: &SessionState) -> Result<Prompt> {
        debug!(session = %state.id, "max_probes: called");
        self.loader.render_pair(PromptKind::MaxProbes, &PromptContext::from_session(state))
    }

    /// Answer the pending question as the interviewee would
    pub fn autopilot_answer(&self, state: &SessionState) -> Result<Prompt> {
        debug!(session = %state.id, "autopilot_answer: called");
        let (question, rationale) = match state.pending_question.as_ref() {
            Some(q) => (q.question.clone(), q.rationale.clone().unwrap_or_default()),
            None => (String::new(), String::new()),
        };
        let ctx = PromptContext {
            question,
            rationale,
            ..PromptContext::from_session(state)
        };
        self.loader.render_pair(PromptKind::AutopilotAnswer, &ctx)
    }

    pub fn feedback_analysis(&self, state: &SessionState, feedback: &str) -> Result<Prompt> {
        debug!(session = %state.id, "feedback_analysis: called");
        let ctx = PromptContext {
            feedback: feedback.to_string(),
            ..PromptContext::from_session(state)
        };
        self.loader.render_pair(PromptKind::FeedbackAnalysis, &ctx)
    }

    /// Synthesize the draft from outline and interview log
    pub fn draft(&self, state: &SessionState) -> Result<Prompt> {
        debug!(session = %state.id, entries = state.interview_log.len(), "draft: called");
        self.loader.render_pair(PromptKind::Draft, &PromptContext::from_session(state))
    }

    /// Revise the current draft per feedback and optional analysis
    pub fn revise(&self, state: &SessionState, feedback: &str, analysis: Option<&str>) -> Result<Prompt> {
        debug!(session = %state.id, has_analysis = analysis.is_some(), "revise: called");
        let ctx = PromptContext {
            feedback: feedback.to_string(),
            analysis: analysis.map(str::to_string),
            context_json: PromptContext::original_context(state),
            ..PromptContext::from_session(state)
        };
        self.loader.render_pair(PromptKind::Revision, &ctx)
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::embedded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{InterviewQuestion, Outline, Phase};

    fn session() -> SessionState {
        let mut state = SessionState::new("p1");
        state.topic = Some("Renewable energy".to_string());
        state.content_type = Some("article".to_string());
        state.target_length = Some(800);
        state.outline = Some(Outline::from_static(&[
            ("Introduction", &["Context", "Main Points"]),
            ("Conclusion", &[]),
        ]));
        state
    }

    #[test]
    fn test_outline_prompt_embeds_session_fields() {
        let prompt = PromptBuilder::embedded().outline(&session()).unwrap();
        assert!(prompt.system.contains("800-word article"));
        assert!(prompt.user.contains("about: Renewable energy"));
        assert!(!prompt.user.contains("additional requirements"));
    }

    #[test]
    fn test_settings_rendered_when_present() {
        let mut state = session();
        state.settings.insert("tone".to_string(), serde_json::json!("playful"));
        let prompt = PromptBuilder::embedded().outline(&state).unwrap();
        assert!(prompt.user.contains("\"tone\": \"playful\""));
    }

    #[test]
    fn test_interview_prompt_serializes_log_as_json() {
        let mut state = session();
        state.begin_interview();
        state.pending_question = Some(InterviewQuestion {
            question: "Why now?".to_string(),
            rationale: None,
            example_answer: None,
        });
        state.record_answer("Costs fell a lot");

        let prompt = PromptBuilder::embedded().interview_question(&state, true).unwrap();
        assert!(prompt.user.contains("Current section: Introduction"));
        assert!(prompt.user.contains("Subsections to cover: Context, Main Points"));
        assert!(prompt.user.contains("\"response\": \"Costs fell a lot\""));
        assert!(prompt.user.contains("follow-up question"));
        assert!(prompt.system.contains("experienced interviewer"));
    }

    #[test]
    fn test_builders_are_pure_and_deterministic() {
        let state = session();
        let builder = PromptBuilder::embedded();
        let before = serde_json::to_value(&state).unwrap();

        let a = builder.revise(&state, "shorter", Some("{\"Length\": \"cut\"}")).unwrap();
        let b = builder.revise(&state, "shorter", Some("{\"Length\": \"cut\"}")).unwrap();
        assert_eq!(a, b);
        assert_eq!(serde_json::to_value(&state).unwrap(), before);
        assert_eq!(state.phase(), Phase::TopicSelection);
        assert!(a.user.contains("Feedback analysis:"));
    }

    #[test]
    fn test_revise_without_analysis() {
        let mut state = session();
        state.draft = Some("# Draft".to_string());
        let prompt = PromptBuilder::embedded().revise(&state, "add examples", None).unwrap();
        assert!(prompt.user.starts_with("Current draft:\n# Draft"));
        assert!(prompt.user.contains("\"interview_responses\""));
        assert!(!prompt.user.contains("Feedback analysis:"));
    }

    #[test]
    fn test_outline_modify_carries_previous_outline() {
        let prompt = PromptBuilder::embedded().outline_modify(&session(), "add a history section").unwrap();
        assert!(prompt.user.contains("\"previous_outline\""));
        assert!(prompt.user.contains("User feedback: add a history section"));
    }

    #[test]
    fn test_autopilot_answer_uses_pending_question() {
        let mut state = session();
        state.pending_question = Some(InterviewQuestion {
            question: "What changed?".to_string(),
            rationale: Some("sets the scene".to_string()),
            example_answer: None,
        });
        let prompt = PromptBuilder::embedded().autopilot_answer(&state).unwrap();
        assert!(prompt.user.contains("Question: What changed?"));
        assert!(prompt.user.contains("Rationale: sets the scene"));
        assert!(prompt.system.contains("expert being interviewed"));
    }

    #[test]
    fn test_missing_length_uses_default() {
        let mut state = session();
        state.target_length = None;
        let prompt = PromptBuilder::embedded().max_probes(&state).unwrap();
        assert!(prompt.user.contains("Word Count: 1000"));
    }
}
