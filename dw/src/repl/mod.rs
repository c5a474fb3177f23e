//! Interactive console for an authoring session
//!
//! A line-oriented loop over one in-process session, with slash commands
//! for inspecting and saving what has been produced so far.

mod session;

pub use session::ChatSession;

use std::sync::Arc;

use eyre::{Context, Result};
use tracing::debug;

use crate::collab::{Controller, Locale, is_quit};
use crate::config::Config;
use crate::llm::Generator;
use crate::session::Phase;

/// Printed when the console closes
pub const FAREWELL: &str = "Thank you for using the Content Collaboration System. Goodbye!";

/// Printed for blank input
pub const EMPTY_INPUT: &str = "Please provide some input.";

/// What the console does with one line of input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineAction<'a> {
    Empty,
    Slash(&'a str, Option<&'a str>),
    Quit,
    Forward(&'a str),
}

/// Classify a raw line for the current phase
///
/// `quit`/`exit` close the console outside Complete; in Complete they are
/// forwarded so the controller can say goodbye.
pub fn classify(line: &str, phase: Phase) -> LineAction<'_> {
    let input = line.trim();
    if input.is_empty() {
        return LineAction::Empty;
    }
    if let Some(rest) = input.strip_prefix('/') {
        let mut parts = rest.splitn(2, char::is_whitespace);
        let cmd = parts.next().unwrap_or_default();
        let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());
        return LineAction::Slash(cmd, arg);
    }
    if is_quit(input) && phase != Phase::Complete {
        return LineAction::Quit;
    }
    LineAction::Forward(input)
}

/// Run the console; entry point for `dw chat`
pub async fn run_interactive(config: &Config, locale: Option<Locale>, autopilot: bool) -> Result<()> {
    debug!(?locale, autopilot, "run_interactive: called");
    config.validate()?;

    let mut config = config.clone();
    if let Some(locale) = locale {
        config.collab.locale = locale;
    }

    let generator = Generator::from_config(&config.llm).context("Failed to create LLM client")?;
    let controller = Arc::new(Controller::from_config(&config, generator));

    let mut session = ChatSession::new(controller, autopilot || config.collab.autopilot);
    session.run().await
}
