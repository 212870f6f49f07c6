//! Boardroom: a phased multi-advisor discussion engine.
//!
//! Independently-modeled advisor personas take turns answering a language
//! model completion service, progressing through three fixed phases
//! (opening, debate, synthesis), while tolerating the unreliability of the
//! remote service.
//!
//! # Components
//!
//! - [`persona`]: the fixed advisor registry.
//! - [`completion`]: the resilient completion client (rate limiting, retry
//!   with backoff, model fallback).
//! - [`discussion`]: the phase/turn state machine, speaker selection, and
//!   the orchestrator.
//! - [`storage`]: the persistence gateway contract; the orchestrator runs
//!   memory-only when storage is absent or failing.
//!
//! # Example
//!
//! ```rust,ignore
//! use boardroom::{CompletionClient, DiscussionOrchestrator, PersonaRegistry};
//! use std::sync::Arc;
//!
//! let client = Arc::new(CompletionClient::from_env()?);
//! let mut orchestrator =
//!     DiscussionOrchestrator::new(client, PersonaRegistry::with_defaults());
//!
//! let id = orchestrator.start("Should we hire more developers?", None).await?;
//! let turn = orchestrator.advance(&id).await?;
//! println!("{} ({}): {}", turn.persona, turn.role, turn.content);
//! ```

pub mod completion;
pub mod discussion;
pub mod persona;
pub mod storage;

pub use completion::{
    ChatMessage, ChatRole, ClientConfig, Completion, CompletionBackend, CompletionClient,
    CompletionError, CompletionRequest, ModelInfo, RetryPolicy,
};
pub use discussion::{
    Discussion, DiscussionOrchestrator, DiscussionPhase, Message, OrchestratorError, PhaseLimits,
    TurnOutput,
};
pub use persona::{Persona, PersonaRegistry};
pub use storage::{
    DiscussionSummary, JsonFileGateway, MemoryGateway, PersistenceGateway, StorageError,
};
