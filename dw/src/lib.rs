//! Draftwise: interview-driven content authoring
//!
//! A session moves a user from a topic to a finished draft: choose a topic,
//! agree an outline, answer interview questions section by section, then
//! review and revise the generated draft.

pub mod cli;
pub mod collab;
pub mod config;
pub mod extract;
pub mod llm;
pub mod prompts;
pub mod repl;
pub mod server;
pub mod session;

pub use collab::{Controller, Reply};
pub use config::Config;
pub use llm::{Generator, LlmClient};
pub use session::{Phase, SessionState};
