//! Collaboration Controller
//!
//! Dispatches one user input on the session's phase, calls the model as
//! needed and mutates the session. Every failure ends as a user-facing
//! message; nothing here returns an error to the caller of `handle`.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::{InterviewPolicy, Presenter, ProbeLimit, is_quit, is_valid_content_type, presenter_for};
use crate::config::Config;
use crate::extract::{
    Extraction, decision_from, default_outline, extract_outline, extract_probe_limit, extract_question,
    generic_question, outline_or_default, parse_outline, parse_topic_suggestion,
};
use crate::llm::{Generator, LlmError, Message, Role};
use crate::prompts::{Prompt, PromptBuilder, PromptLoader};
use crate::session::{Outline, Phase, Revision, SelectionStage, SessionState};

/// Why a model-backed step produced no text
#[derive(Debug, Error)]
pub enum StepError {
    #[error("prompt rendering failed: {0}")]
    Prompt(String),

    #[error(transparent)]
    Generation(#[from] LlmError),
}

/// Outcome of one handled input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub message: String,
    pub phase: Phase,
    /// The conversation is over and the surface should close
    pub terminate: bool,
}

/// One autopilot exchange: the model's answer and the reply to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutopilotTurn {
    pub answer: String,
    pub reply: Reply,
}

pub struct Controller {
    generator: Generator,
    prompts: PromptBuilder,
    policy: InterviewPolicy,
    presenter: Arc<dyn Presenter>,
}

impl Controller {
    pub fn new(
        generator: Generator,
        prompts: PromptBuilder,
        policy: InterviewPolicy,
        presenter: Arc<dyn Presenter>,
    ) -> Self {
        debug!(?policy, locale = ?presenter.locale(), "Controller::new: called");
        Self {
            generator,
            prompts,
            policy,
            presenter,
        }
    }

    /// Controller wired from configuration around an existing generator
    pub fn from_config(config: &Config, generator: Generator) -> Self {
        Self::new(
            generator,
            PromptBuilder::new(PromptLoader::new(&config.prompts.override_dir)),
            InterviewPolicy::from(&config.collab),
            presenter_for(config.collab.locale),
        )
    }

    pub fn presenter(&self) -> &dyn Presenter {
        self.presenter.as_ref()
    }

    pub fn policy(&self) -> &InterviewPolicy {
        &self.policy
    }

    /// Welcome a fresh session without waiting for its first input
    ///
    /// Returns None once the session is past the greeting.
    pub fn greet(&self, state: &mut SessionState) -> Option<Reply> {
        if state.phase() != Phase::TopicSelection || state.selection_stage != SelectionStage::Greeting {
            return None;
        }
        state.selection_stage = SelectionStage::ContentType;
        let message = self.presenter.welcome();
        state.record_turn(Role::Assistant, &message);
        Some(self.reply(state, message, false))
    }

    /// Handle one user input
    pub async fn handle(&self, state: &mut SessionState, input: &str) -> Reply {
        debug!(session = %state.id, phase = ?state.phase(), input_len = input.len(), "handle: called");
        state.record_turn(Role::User, input);

        let mut terminate = false;
        let message = match state.phase() {
            Phase::TopicSelection => self.topic_selection(state, input).await,
            Phase::OutlineReview => self.outline_review(state, input).await,
            Phase::Interview => self.interview(state, input).await,
            Phase::DraftGeneration => self.generate_draft(state).await,
            Phase::DraftReview => self.draft_review(state, input).await,
            Phase::Complete => {
                if is_quit(input) {
                    terminate = true;
                    self.presenter.goodbye()
                } else {
                    self.presenter.already_complete()
                }
            }
        };

        state.record_turn(Role::Assistant, &message);
        state.touch();
        self.reply(state, message, terminate)
    }

    /// Let the model answer the pending interview question
    ///
    /// Ok(None) outside the Interview phase or with no pending question.
    pub async fn autopilot_step(&self, state: &mut SessionState) -> Result<Option<AutopilotTurn>, StepError> {
        debug!(session = %state.id, phase = ?state.phase(), "autopilot_step: called");
        if state.phase() != Phase::Interview || state.pending_question.is_none() {
            return Ok(None);
        }

        let answer = self.call(self.prompts.autopilot_answer(state), &[]).await?;
        info!(session = %state.id, section = ?state.current_section, "autopilot_step: answering");
        let reply = self.handle(state, &answer).await;
        Ok(Some(AutopilotTurn { answer, reply }))
    }

    /// Start a session over from explicit parameters and propose its outline
    ///
    /// Work from an earlier run of the session (interview log, draft,
    /// revisions) is discarded once the new outline is ready; the transcript
    /// is kept. If the outline call fails the session is left as it was.
    pub async fn initialize(
        &self,
        state: &mut SessionState,
        topic: &str,
        content_type: &str,
        target_length: u32,
        settings: serde_json::Map<String, serde_json::Value>,
    ) -> Reply {
        info!(session = %state.id, phase = ?state.phase(), %topic, %content_type, %target_length, "initialize: called");
        let mut fresh = SessionState::new(state.id.clone()).with_max_probes(state.max_probes);
        fresh.created_at = state.created_at;
        fresh.topic = Some(topic.trim().to_string());
        fresh.content_type = Some(content_type.trim().to_string());
        fresh.settings = settings;
        fresh.selection_stage = SelectionStage::Length;

        let message = self.propose_outline(&mut fresh, target_length).await;
        if fresh.phase() == Phase::OutlineReview {
            fresh.transcript = std::mem::take(&mut state.transcript);
            *state = fresh;
        }
        state.record_turn(Role::Assistant, &message);
        self.reply(state, message, false)
    }

    /// Outline for explicit parameters, independent of any session
    pub async fn generate_outline(
        &self,
        topic: &str,
        content_type: &str,
        target_length: u32,
        settings: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Extraction<Outline>, StepError> {
        debug!(%topic, %content_type, %target_length, "generate_outline: called");
        let mut scratch = SessionState::new("outline");
        scratch.topic = Some(topic.to_string());
        scratch.content_type = Some(content_type.to_string());
        scratch.target_length = Some(target_length);
        scratch.settings = settings;
        self.request_outline(&scratch).await
    }

    fn reply(&self, state: &SessionState, message: String, terminate: bool) -> Reply {
        Reply {
            message,
            phase: state.phase(),
            terminate,
        }
    }

    async fn call(&self, prompt: eyre::Result<Prompt>, history: &[Message]) -> Result<String, StepError> {
        let prompt = prompt.map_err(|e| StepError::Prompt(format!("{e:#}")))?;
        let text = self.generator.generate(&prompt.user, Some(&prompt.system), history).await?;
        Ok(text)
    }

    async fn topic_selection(&self, state: &mut SessionState, input: &str) -> String {
        debug!(stage = ?state.selection_stage, "topic_selection: called");
        match state.selection_stage {
            SelectionStage::Greeting => {
                state.selection_stage = SelectionStage::ContentType;
                self.presenter.welcome()
            }
            SelectionStage::ContentType => {
                if !is_valid_content_type(input) {
                    return self.presenter.invalid_content_type();
                }
                let content_type = input.trim().to_string();
                let message = self.presenter.ask_topic(&content_type);
                state.content_type = Some(content_type);
                state.selection_stage = SelectionStage::Topic;
                message
            }
            SelectionStage::Topic => self.analyze_topic(state, input).await,
            SelectionStage::TopicConfirmation => {
                if self.presenter.is_affirmative(input) {
                    if let Some(suggested) = state.suggested_content_type.take() {
                        debug!(%suggested, "topic_selection: applying suggested content type");
                        state.content_type = Some(suggested);
                    }
                    state.selection_stage = SelectionStage::Length;
                    return self.presenter.ask_length();
                }
                self.refine_topic(state, input).await
            }
            SelectionStage::Length => match input.trim().parse::<u32>() {
                Ok(length) if length > 0 => self.propose_outline(state, length).await,
                _ => self.presenter.invalid_length(),
            },
        }
    }

    async fn analyze_topic(&self, state: &mut SessionState, input: &str) -> String {
        let result = self.call(self.prompts.topic_analysis(state, input), &[]).await;
        let suggestion = match result {
            Ok(text) => parse_topic_suggestion(&text).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match suggestion {
            Ok(suggestion) => {
                info!(topic = %suggestion.topic, content_type = %suggestion.content_type, "analyze_topic: suggestion");
                let message = self.presenter.topic_suggestion(
                    &suggestion.content_type,
                    &suggestion.topic,
                    suggestion.feedback.as_deref(),
                );
                state.topic = Some(suggestion.topic);
                state.suggested_content_type = Some(suggestion.content_type);
                state.selection_stage = SelectionStage::TopicConfirmation;
                message
            }
            Err(e) => {
                warn!(error = %e, "analyze_topic: keeping the topic as given");
                state.topic = Some(input.trim().to_string());
                state.selection_stage = SelectionStage::Length;
                self.presenter.topic_fallback()
            }
        }
    }

    async fn refine_topic(&self, state: &mut SessionState, feedback: &str) -> String {
        match self.call(self.prompts.topic_refine(state, feedback), &[]).await {
            Ok(text) => {
                let refined = text
                    .lines()
                    .map(|l| l.trim().trim_matches(['"', '\'', '*']).trim())
                    .find(|l| !l.is_empty())
                    .unwrap_or(text.as_str())
                    .to_string();
                debug!(%refined, "refine_topic: refined");
                let message = self.presenter.refined_topic(&refined);
                state.topic = Some(refined);
                message
            }
            Err(e) => {
                warn!(error = %e, "refine_topic: generation failed");
                self.presenter.topic_refine_failed()
            }
        }
    }

    async fn request_outline(&self, state: &SessionState) -> Result<Extraction<Outline>, StepError> {
        let text = self.call(self.prompts.outline(state), &[]).await?;
        Ok(outline_or_default(&text, state.content_type_or_default()))
    }

    /// Generate the first outline and move to OutlineReview
    ///
    /// On failure the target length is restored and the phase is unchanged.
    async fn propose_outline(&self, state: &mut SessionState, length: u32) -> String {
        let previous = state.target_length.replace(length);
        match self.request_outline(state).await {
            Ok(extraction) => {
                let fallback = extraction.is_fallback();
                let outline = extraction.into_inner();
                info!(sections = outline.len(), fallback, "propose_outline: outline ready");
                let message = self.presenter.outline_proposal(state.content_type_or_default(), &outline);
                state.outline = Some(outline);
                state.advance_to(Phase::OutlineReview);
                message
            }
            Err(e) => {
                warn!(error = %e, "propose_outline: generation failed");
                state.target_length = previous;
                self.presenter.outline_generation_failed()
            }
        }
    }

    async fn outline_review(&self, state: &mut SessionState, input: &str) -> String {
        if self.presenter.is_affirmative(input) {
            return self.enter_interview(state).await;
        }

        if input.trim_start().starts_with('{') {
            if let Ok(outline) = parse_outline(input) {
                info!(sections = outline.len(), "outline_review: accepted pasted outline");
                return self.outline_updated(state, outline);
            }
        }

        let current = state
            .outline
            .clone()
            .unwrap_or_else(|| default_outline(state.content_type_or_default()));
        match self.call(self.prompts.outline_modify(state, input), &[]).await {
            Ok(text) => match extract_outline(&text, || current) {
                Extraction::Parsed(outline) => self.outline_updated(state, outline),
                Extraction::Fallback(_) => self.presenter.outline_not_modified(state.content_type_or_default()),
            },
            Err(e) => {
                warn!(error = %e, "outline_review: modification failed");
                self.presenter.outline_modify_failed()
            }
        }
    }

    fn outline_updated(&self, state: &mut SessionState, outline: Outline) -> String {
        let message = self.presenter.outline_updated(
            state.content_type_or_default(),
            state.topic_or_default(),
            state.target_length.unwrap_or(crate::prompts::DEFAULT_TARGET_LENGTH),
            &outline,
        );
        state.outline = Some(outline);
        message
    }

    async fn enter_interview(&self, state: &mut SessionState) -> String {
        if state.outline.is_none() {
            state.outline = Some(default_outline(state.content_type_or_default()));
        }

        let max_probes = match self.policy.probe_limit {
            ProbeLimit::Fixed => self.policy.max_probes,
            ProbeLimit::Model => match self.call(self.prompts.max_probes(state), &[]).await {
                Ok(text) => extract_probe_limit(&text, self.policy.max_probes),
                Err(e) => {
                    warn!(error = %e, "enter_interview: probe limit call failed, using configured value");
                    self.policy.max_probes
                }
            },
        };
        state.max_probes = max_probes;
        info!(session = %state.id, %max_probes, "enter_interview: starting interview");

        state.begin_interview();
        self.ask_question(state, false).await
    }

    /// Generate and remember the next question for the current section
    async fn ask_question(&self, state: &mut SessionState, follow_up: bool) -> String {
        let question = match self.call(self.prompts.interview_question(state, follow_up), &[]).await {
            Ok(text) => extract_question(&text, generic_question).into_inner(),
            Err(e) => {
                warn!(error = %e, "ask_question: generation failed, asking the generic question");
                generic_question()
            }
        };
        let message = self.presenter.question(&question);
        state.pending_question = Some(question);
        message
    }

    async fn interview(&self, state: &mut SessionState, input: &str) -> String {
        if self.presenter.is_skip(input) {
            debug!(section = ?state.current_section, "interview: explicit skip");
            return self.next_section(state).await;
        }

        if self.policy.is_implicit_skip(input) {
            debug!(section = ?state.current_section, "interview: short answer, skipping");
            state.record_answer(input);
            return self.next_section(state).await;
        }

        let count = state.record_answer(input);
        if count < state.max_probes && self.should_probe(state, input).await {
            debug!(count, max_probes = state.max_probes, "interview: probing");
            return self.ask_question(state, true).await;
        }
        self.next_section(state).await
    }

    async fn should_probe(&self, state: &SessionState, answer: &str) -> bool {
        if self.policy.uses_length_gate() && !self.policy.passes_length_gate(answer) {
            return false;
        }
        if !self.policy.asks_model() {
            return true;
        }
        decision_from(self.call(self.prompts.probe_decision(state, answer), &[]).await)
    }

    async fn next_section(&self, state: &mut SessionState) -> String {
        match state.advance_section().map(str::to_string) {
            Some(section) => {
                let question = self.ask_question(state, false).await;
                self.presenter.moving_on(&section, &question)
            }
            None => {
                state.advance_to(Phase::DraftGeneration);
                self.generate_draft(state).await
            }
        }
    }

    /// Synthesize the draft; the phase stays DraftGeneration on failure
    async fn generate_draft(&self, state: &mut SessionState) -> String {
        info!(session = %state.id, entries = state.interview_log.len(), "generate_draft: called");
        match self.call(self.prompts.draft(state), &[]).await {
            Ok(draft) => {
                let message = self.presenter.draft_ready(&draft);
                state.draft = Some(draft);
                state.advance_to(Phase::DraftReview);
                message
            }
            Err(e) => {
                warn!(error = %e, "generate_draft: generation failed");
                self.presenter.draft_failed()
            }
        }
    }

    async fn draft_review(&self, state: &mut SessionState, input: &str) -> String {
        if self.presenter.is_affirmative(input) {
            state.advance_to(Phase::Complete);
            return self.presenter.complete(state.draft.as_deref().unwrap_or_default());
        }

        let analysis = if self.policy.analyze_feedback {
            match self.call(self.prompts.feedback_analysis(state, input), &[]).await {
                Ok(text) => Some(text),
                Err(e) => {
                    warn!(error = %e, "draft_review: feedback analysis failed, revising without it");
                    None
                }
            }
        } else {
            None
        };

        let history = state.revision_history(self.policy.revision_history);
        match self
            .call(self.prompts.revise(state, input, analysis.as_deref()), &history)
            .await
        {
            Ok(draft) => {
                info!(session = %state.id, revision = state.revisions.len() + 1, "draft_review: revised");
                let message = self.presenter.draft_revised(&draft);
                state.revisions.push(Revision {
                    feedback: input.to_string(),
                    draft: draft.clone(),
                });
                state.draft = Some(draft);
                message
            }
            Err(e) => {
                warn!(error = %e, "draft_review: revision failed");
                self.presenter.revision_failed()
            }
        }
    }
}
