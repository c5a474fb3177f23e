//! Mutable record of one authoring session

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use super::Outline;
use crate::llm::{Message, Role};

/// Default per-section interview entry bound
pub const DEFAULT_MAX_PROBES: usize = 3;

/// Authoring phase
///
/// Declaration order is the forward order; a session never moves to an
/// earlier phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    TopicSelection,
    OutlineReview,
    Interview,
    DraftGeneration,
    DraftReview,
    Complete,
}

impl Phase {
    /// Upper-snake name used on the command surface
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::TopicSelection => "TOPIC_SELECTION",
            Phase::OutlineReview => "OUTLINE_REVIEW",
            Phase::Interview => "INTERVIEW",
            Phase::DraftGeneration => "DRAFT_GENERATION",
            Phase::DraftReview => "DRAFT_REVIEW",
            Phase::Complete => "COMPLETE",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Phase::TopicSelection => "topic selection",
            Phase::OutlineReview => "outline review",
            Phase::Interview => "interview",
            Phase::DraftGeneration => "draft generation",
            Phase::DraftReview => "draft review",
            Phase::Complete => "complete",
        };
        f.write_str(label)
    }
}

/// Sub-state of TopicSelection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SelectionStage {
    /// Nothing said yet; the next input gets the welcome
    Greeting,
    ContentType,
    Topic,
    TopicConfirmation,
    Length,
}

/// A question put to the user during the interview
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewQuestion {
    pub question: String,
    pub rationale: Option<String>,
    pub example_answer: Option<String>,
}

/// One recorded interview answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewEntry {
    pub section: String,
    pub question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    pub response: String,
    #[serde(skip)]
    pub answered_at: DateTime<Utc>,
}

/// One revision round in DraftReview
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Revision {
    pub feedback: String,
    pub draft: String,
}

/// One line of the conversation as the user saw it
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptEntry {
    pub role: Role,
    pub content: String,
    pub at: DateTime<Utc>,
}

/// Session state, owned by one conversation at a time
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub id: String,
    phase: Phase,
    pub selection_stage: SelectionStage,
    pub content_type: Option<String>,
    /// Model's content type suggestion, applied once the topic is confirmed
    pub suggested_content_type: Option<String>,
    pub topic: Option<String>,
    pub target_length: Option<u32>,
    pub outline: Option<Outline>,
    pub interview_log: Vec<InterviewEntry>,
    pub current_section: Option<String>,
    pub pending_question: Option<InterviewQuestion>,
    pub max_probes: usize,
    pub draft: Option<String>,
    pub revisions: Vec<Revision>,
    pub settings: serde_json::Map<String, serde_json::Value>,
    #[serde(skip)]
    pub transcript: Vec<TranscriptEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        debug!(%id, "SessionState::new: called");
        let now = Utc::now();
        Self {
            id,
            phase: Phase::TopicSelection,
            selection_stage: SelectionStage::Greeting,
            content_type: None,
            suggested_content_type: None,
            topic: None,
            target_length: None,
            outline: None,
            interview_log: Vec::new(),
            current_section: None,
            pending_question: None,
            max_probes: DEFAULT_MAX_PROBES,
            draft: None,
            revisions: Vec::new(),
            settings: serde_json::Map::new(),
            transcript: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_max_probes(mut self, max_probes: usize) -> Self {
        self.max_probes = max_probes.max(1);
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Move forward to `next`; moving backwards is refused
    pub fn advance_to(&mut self, next: Phase) -> bool {
        if next < self.phase {
            warn!(from = ?self.phase, to = ?next, "advance_to: refusing backward transition");
            return false;
        }
        debug!(from = ?self.phase, to = ?next, "advance_to: transition");
        self.phase = next;
        self.touch();
        true
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn content_type_or_default(&self) -> &str {
        self.content_type.as_deref().unwrap_or("article")
    }

    pub fn topic_or_default(&self) -> &str {
        self.topic.as_deref().unwrap_or_default()
    }

    /// Interview entries recorded for `section`
    pub fn section_entries<'a>(&'a self, section: &'a str) -> impl Iterator<Item = &'a InterviewEntry> + 'a {
        self.interview_log.iter().filter(move |e| e.section == section)
    }

    pub fn current_section_entry_count(&self) -> usize {
        self.current_section
            .as_deref()
            .map(|s| self.section_entries(s).count())
            .unwrap_or(0)
    }

    /// Record an answer for the current section against the pending question
    ///
    /// Returns the number of entries the section now holds.
    pub fn record_answer(&mut self, response: &str) -> usize {
        let Some(section) = self.current_section.clone() else {
            warn!("record_answer: no current section");
            return 0;
        };
        let (question, rationale) = match self.pending_question.as_ref() {
            Some(q) => (q.question.clone(), q.rationale.clone()),
            None => (String::new(), None),
        };
        self.interview_log.push(InterviewEntry {
            section: section.clone(),
            question,
            rationale,
            response: response.to_string(),
            answered_at: Utc::now(),
        });
        self.touch();
        let count = self.section_entries(&section).count();
        debug!(%section, count, "record_answer: recorded");
        count
    }

    /// Point at the first outline section and enter the interview
    pub fn begin_interview(&mut self) -> Option<&str> {
        let first = self.outline.as_ref()?.first_section()?.to_string();
        self.current_section = Some(first);
        self.pending_question = None;
        self.advance_to(Phase::Interview);
        self.current_section.as_deref()
    }

    /// Move to the next section in outline order
    ///
    /// Returns the new section, or None once the last section is done (the
    /// pointer is cleared).
    pub fn advance_section(&mut self) -> Option<&str> {
        let next = match (&self.outline, &self.current_section) {
            (Some(outline), Some(current)) => outline.next_section(current).map(str::to_string),
            _ => None,
        };
        debug!(from = ?self.current_section, to = ?next, "advance_section: called");
        self.current_section = next;
        self.pending_question = None;
        self.touch();
        self.current_section.as_deref()
    }

    /// Last `limit` revision messages as conversation history
    pub fn revision_history(&self, limit: usize) -> Vec<Message> {
        let messages: Vec<Message> = self
            .revisions
            .iter()
            .flat_map(|r| [Message::user(r.feedback.clone()), Message::assistant(r.draft.clone())])
            .collect();
        let skip = messages.len().saturating_sub(limit);
        messages.into_iter().skip(skip).collect()
    }

    pub fn record_turn(&mut self, role: Role, content: impl Into<String>) {
        self.transcript.push(TranscriptEntry {
            role,
            content: content.into(),
            at: Utc::now(),
        });
    }

    /// Snapshot of the fields a hosting process shows next to each reply
    pub fn context(&self) -> serde_json::Value {
        serde_json::json!({
            "sessionId": self.id,
            "phase": self.phase.as_str(),
            "topic": self.topic,
            "contentType": self.content_type,
            "targetLength": self.target_length,
            "outline": self.outline,
            "currentSection": self.current_section,
            "settings": self.settings,
            "interviewCount": self.interview_log.len(),
            "hasDraft": self.draft.is_some(),
        })
    }
}
