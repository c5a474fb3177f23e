//! Prompt Template System
//!
//! Loads and renders `.pmt` (prompt template) files for each controller
//! action.
//!
//! Template loading chain:
//! 1. `{prompts.override-dir}/{name}.pmt` (user override)
//! 2. Embedded fallback in code
//!
//! Templates use Handlebars syntax for variable substitution.

mod builder;
pub mod embedded;
mod loader;

pub use builder::{DEFAULT_TARGET_LENGTH, PromptBuilder, PromptContext};
pub use loader::{Prompt, PromptKind, PromptLoader};
