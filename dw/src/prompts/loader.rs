//! Prompt Loader
//!
//! Loads prompt templates from the override directory or falls back to the
//! embedded defaults.

use std::path::{Path, PathBuf};

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use super::embedded;

/// One model action and the system/user template pair that drives it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    TopicAnalysis,
    TopicRefine,
    Outline,
    OutlineModify,
    InterviewQuestion,
    ProbeDecision,
    MaxProbes,
    AutopilotAnswer,
    FeedbackAnalysis,
    Draft,
    Revision,
}

impl PromptKind {
    pub const ALL: [PromptKind; 11] = [
        PromptKind::TopicAnalysis,
        PromptKind::TopicRefine,
        PromptKind::Outline,
        PromptKind::OutlineModify,
        PromptKind::InterviewQuestion,
        PromptKind::ProbeDecision,
        PromptKind::MaxProbes,
        PromptKind::AutopilotAnswer,
        PromptKind::FeedbackAnalysis,
        PromptKind::Draft,
        PromptKind::Revision,
    ];

    /// Template for the system instruction
    pub fn system_template(&self) -> &'static str {
        match self {
            Self::TopicAnalysis => "system-topic",
            Self::TopicRefine => "system-topic-refine",
            Self::Outline => "system-outline",
            Self::OutlineModify => "system-outline-modify",
            Self::InterviewQuestion => "system-interview",
            Self::ProbeDecision | Self::FeedbackAnalysis => "system-analysis",
            Self::MaxProbes => "system-strategist",
            Self::AutopilotAnswer => "system-expert",
            Self::Draft => "system-draft",
            Self::Revision => "system-revision",
        }
    }

    /// Template for the user prompt
    pub fn user_template(&self) -> &'static str {
        match self {
            Self::TopicAnalysis => "topic-analysis",
            Self::TopicRefine => "topic-refine",
            Self::Outline => "outline-generate",
            Self::OutlineModify => "outline-modify",
            Self::InterviewQuestion => "interview-question",
            Self::ProbeDecision => "probe-decision",
            Self::MaxProbes => "max-probes",
            Self::AutopilotAnswer => "autopilot-answer",
            Self::FeedbackAnalysis => "feedback-analysis",
            Self::Draft => "draft-generate",
            Self::Revision => "draft-revise",
        }
    }
}

impl std::fmt::Display for PromptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.user_template())
    }
}

/// A rendered system instruction plus user prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    /// Handlebars template engine
    hbs: Handlebars<'static>,
    /// Override directory (e.g., `.draftwise/prompts/`)
    user_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a loader that checks `override_dir` before the embedded prompts
    pub fn new(override_dir: impl AsRef<Path>) -> Self {
        let override_dir = override_dir.as_ref();
        let exists = override_dir.is_dir();
        debug!(?override_dir, %exists, "PromptLoader::new: called");
        Self {
            hbs: Self::engine(),
            user_dir: exists.then(|| override_dir.to_path_buf()),
        }
    }

    /// Create a loader that only uses embedded prompts (for testing)
    pub fn embedded_only() -> Self {
        debug!("PromptLoader::embedded_only: called");
        Self {
            hbs: Self::engine(),
            user_dir: None,
        }
    }

    fn engine() -> Handlebars<'static> {
        let mut hbs = Handlebars::new();
        // Plain text, not HTML
        hbs.register_escape_fn(handlebars::no_escape);
        hbs
    }

    /// Load a template by name
    ///
    /// Checks in order:
    /// 1. Override: `{override_dir}/{name}.pmt`
    /// 2. Embedded fallback
    fn load_template(&self, name: &str) -> Result<String> {
        debug!(%name, "PromptLoader::load_template: called");
        if let Some(ref user_dir) = self.user_dir {
            let path = user_dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(?path, "PromptLoader::load_template: found in override directory");
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read prompt {}: {}", path.display(), e));
            }
        }

        if let Some(content) = embedded::get_embedded(name) {
            return Ok(content.to_string());
        }

        debug!(%name, "PromptLoader::load_template: not found anywhere");
        Err(eyre!("Prompt template not found: {}", name))
    }

    /// Render a template with the given context
    pub fn render<C: Serialize>(&self, template_name: &str, context: &C) -> Result<String> {
        debug!(%template_name, "PromptLoader::render: called");
        let template = self.load_template(template_name)?;
        let rendered = self
            .hbs
            .render_template(&template, context)
            .map_err(|e| eyre!("Failed to render template {}: {}", template_name, e))?;
        Ok(rendered.trim().to_string())
    }

    /// Render both templates of `kind` against one context
    pub fn render_pair<C: Serialize>(&self, kind: PromptKind, context: &C) -> Result<Prompt> {
        debug!(%kind, "PromptLoader::render_pair: called");
        Ok(Prompt {
            system: self.render(kind.system_template(), context)?,
            user: self.render(kind.user_template(), context)?,
        })
    }
}
