//! Discussion orchestration: the phase/turn state machine, speaker
//! selection, prompt construction, and the orchestrator that ties them to
//! the completion client and storage.
//!
//! # Discussion flow
//!
//! ```text
//! start(topic) → OPENING ──limit──▶ DEBATE ──limit──▶ SYNTHESIS (terminal)
//!                 round robin        expertise         round robin
//!                                    scoring
//! each advance(): select speaker → build prompt → complete → append message
//! ```

pub mod orchestrator;
pub mod prompt;
pub mod selection;
pub mod state;

pub use orchestrator::{DiscussionOrchestrator, OrchestratorError, TurnOutput};
pub use selection::{select_debate_speaker, KeywordFamily, KEYWORD_FAMILIES};
pub use state::{Discussion, DiscussionPhase, Message, PhaseLimits};
