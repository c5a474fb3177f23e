//! Session state and the registry that owns it in the server variant

mod outline;
mod registry;
mod state;

pub use outline::{Outline, OutlineError, Section};
pub use registry::{RegistryError, SessionGuard, SessionRegistry, SharedSession};
pub use state::{
    DEFAULT_MAX_PROBES, InterviewEntry, InterviewQuestion, Phase, Revision, SelectionStage, SessionState,
    TranscriptEntry,
};
