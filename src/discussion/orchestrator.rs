//! Discussion orchestrator: owns the live discussions and drives one turn
//! per `advance` call.
//!
//! Completion failures leave the discussion untouched so the caller can
//! retry the same turn; persistence failures are logged and swallowed, the
//! in-memory view stays authoritative.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::completion::{CompletionBackend, CompletionError, CompletionRequest};
use crate::persona::{Persona, PersonaRegistry};
use crate::storage::{DiscussionSummary, PersistenceGateway};

use super::prompt;
use super::selection;
use super::state::{Discussion, DiscussionPhase, Message, PhaseLimits};

/// Response length cap per turn.
const TURN_MAX_TOKENS: u32 = 500;
/// Sampling temperature for boardroom utterances.
const TURN_TEMPERATURE: f32 = 0.7;

/// Error from orchestrator operations.
#[derive(Debug)]
pub enum OrchestratorError {
    /// Unknown discussion id after failed rehydration.
    NotFound(String),
    /// Malformed topic or persona selection; nothing was created.
    Validation(String),
    /// The completion service failed for the selected persona. Discussion
    /// state is unchanged, so retrying `advance` re-attempts the same
    /// speaker and phase position.
    Completion {
        persona: String,
        role: String,
        source: CompletionError,
    },
}

impl std::fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "discussion {} not found", id),
            Self::Validation(reason) => write!(f, "validation failed: {}", reason),
            Self::Completion {
                persona,
                role,
                source,
            } => write!(f, "failed to get response from {} ({}): {}", persona, role, source),
        }
    }
}

impl std::error::Error for OrchestratorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Completion { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// One successful `advance` result.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutput {
    pub persona: String,
    pub role: String,
    pub content: String,
    /// 1-based turn number of the produced message.
    pub turn: u32,
    /// Phase the message was produced in.
    pub phase: DiscussionPhase,
}

/// Drives phased multi-advisor discussions.
///
/// Callers must serialize `advance` calls per discussion id; the
/// orchestrator assumes at most one outstanding call per discussion.
pub struct DiscussionOrchestrator {
    backend: Arc<dyn CompletionBackend>,
    registry: PersonaRegistry,
    gateway: Option<Arc<dyn PersistenceGateway>>,
    phase_limits: PhaseLimits,
    discussions: HashMap<String, Discussion>,
}

impl DiscussionOrchestrator {
    /// Create an orchestrator with the default registry and phase limits,
    /// memory-only.
    pub fn new(backend: Arc<dyn CompletionBackend>, registry: PersonaRegistry) -> Self {
        Self {
            backend,
            registry,
            gateway: None,
            phase_limits: PhaseLimits::default(),
            discussions: HashMap::new(),
        }
    }

    /// Attach a persistence gateway. All writes stay best-effort.
    pub fn with_gateway(mut self, gateway: Arc<dyn PersistenceGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Override the per-phase turn limits for new discussions.
    pub fn with_phase_limits(mut self, phase_limits: PhaseLimits) -> Self {
        self.phase_limits = phase_limits;
        self
    }

    /// Start a new discussion and return its id.
    ///
    /// The topic is assumed pre-validated by the caller's validator; only
    /// structural checks happen here. Persistence failure does not fail the
    /// call, it only costs durability.
    pub async fn start(
        &mut self,
        topic: &str,
        personas: Option<Vec<Persona>>,
    ) -> Result<String, OrchestratorError> {
        if topic.trim().is_empty() {
            return Err(OrchestratorError::Validation(
                "topic must not be empty".to_string(),
            ));
        }
        if !self.phase_limits.is_valid() {
            return Err(OrchestratorError::Validation(
                "phase turn limits must be positive".to_string(),
            ));
        }

        let personas = personas.unwrap_or_else(|| self.registry.all());
        if personas.is_empty() {
            return Err(OrchestratorError::Validation(
                "at least one persona is required".to_string(),
            ));
        }
        let mut roles = HashSet::new();
        for persona in &personas {
            if !roles.insert(persona.role.clone()) {
                return Err(OrchestratorError::Validation(format!(
                    "duplicate persona role: {}",
                    persona.role
                )));
            }
        }

        let id = Uuid::new_v4().to_string();
        let discussion = Discussion::new(&id, topic, personas, self.phase_limits.clone());

        if let Some(gateway) = &self.gateway {
            if let Err(e) = gateway.save_discussion(&discussion).await {
                tracing::error!(
                    discussion_id = %id,
                    error = %e,
                    "failed to persist new discussion; continuing in memory"
                );
            }
        }

        tracing::info!(
            discussion_id = %id,
            topic,
            personas = discussion.personas.len(),
            "discussion started"
        );
        self.discussions.insert(id.clone(), discussion);
        Ok(id)
    }

    /// Produce the next turn: select the speaker, call the completion
    /// backend, append the message, and advance the state machine.
    pub async fn advance(&mut self, discussion_id: &str) -> Result<TurnOutput, OrchestratorError> {
        self.ensure_resident(discussion_id).await?;

        let (speaker, request) = {
            let discussion = self.resident(discussion_id)?;
            let speaker = selection::select_speaker(discussion)
                .ok_or_else(|| {
                    OrchestratorError::Validation("discussion has no personas".to_string())
                })?
                .clone();
            let context = prompt::build_context(discussion, &speaker);
            let request = CompletionRequest::new(&speaker.model_id, context)
                .with_max_tokens(TURN_MAX_TOKENS)
                .with_temperature(TURN_TEMPERATURE);
            (speaker, request)
        };

        tracing::debug!(
            discussion_id,
            persona = %speaker.name,
            model = %speaker.model_id,
            "requesting next utterance"
        );

        let completion =
            self.backend
                .complete(request)
                .await
                .map_err(|source| OrchestratorError::Completion {
                    persona: speaker.name.clone(),
                    role: speaker.role.clone(),
                    source,
                })?;

        let discussion = self
            .discussions
            .get_mut(discussion_id)
            .ok_or_else(|| OrchestratorError::NotFound(discussion_id.to_string()))?;

        let message = Message {
            persona_name: speaker.name.clone(),
            role: speaker.role.clone(),
            content: completion.content,
            phase: discussion.current_phase,
            turn_number: discussion.current_turn + 1,
            created_at: Utc::now(),
        };
        discussion.record_turn(message.clone());

        let output = TurnOutput {
            persona: speaker.name,
            role: speaker.role,
            content: message.content.clone(),
            turn: message.turn_number,
            phase: message.phase,
        };
        tracing::info!(
            discussion_id,
            turn = output.turn,
            phase = %output.phase,
            persona = %output.persona,
            "turn recorded"
        );

        let snapshot = discussion.clone();
        self.persist_turn(&snapshot, &message).await;

        Ok(output)
    }

    /// Full message history, rehydrating from storage when needed.
    pub async fn get_messages(
        &mut self,
        discussion_id: &str,
    ) -> Result<Vec<Message>, OrchestratorError> {
        self.ensure_resident(discussion_id).await?;
        Ok(self.resident(discussion_id)?.messages.clone())
    }

    /// Discussions known to the gateway, newest first; memory-only when no
    /// gateway is attached or the gateway fails.
    pub async fn list_discussions(&self, limit: usize) -> Vec<DiscussionSummary> {
        if let Some(gateway) = &self.gateway {
            match gateway.list_discussions(limit).await {
                Ok(listed) => return listed,
                Err(e) => tracing::error!(
                    error = %e,
                    "failed to list persisted discussions; falling back to memory"
                ),
            }
        }

        let mut summaries: Vec<DiscussionSummary> = self
            .discussions
            .values()
            .map(DiscussionSummary::from)
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries.truncate(limit);
        summaries
    }

    /// Remove a discussion from memory and storage. Returns whether any
    /// copy was deleted.
    pub async fn delete_discussion(&mut self, discussion_id: &str) -> bool {
        let removed_memory = self.discussions.remove(discussion_id).is_some();

        let mut removed_persisted = false;
        if let Some(gateway) = &self.gateway {
            match gateway.delete_discussion(discussion_id).await {
                Ok(removed) => removed_persisted = removed,
                Err(e) => tracing::error!(
                    discussion_id,
                    error = %e,
                    "failed to delete persisted discussion"
                ),
            }
        }

        removed_memory || removed_persisted
    }

    /// Inspect a memory-resident discussion.
    pub fn discussion(&self, discussion_id: &str) -> Option<&Discussion> {
        self.discussions.get(discussion_id)
    }

    fn resident(&self, discussion_id: &str) -> Result<&Discussion, OrchestratorError> {
        self.discussions
            .get(discussion_id)
            .ok_or_else(|| OrchestratorError::NotFound(discussion_id.to_string()))
    }

    /// Load the discussion into memory, rehydrating from the gateway when
    /// it is not already resident.
    async fn ensure_resident(&mut self, discussion_id: &str) -> Result<(), OrchestratorError> {
        if self.discussions.contains_key(discussion_id) {
            return Ok(());
        }

        if let Some(gateway) = &self.gateway {
            match gateway.load_discussion(discussion_id).await {
                Ok(Some(discussion)) => {
                    tracing::info!(discussion_id, "rehydrated discussion from storage");
                    self.discussions
                        .insert(discussion_id.to_string(), discussion);
                    return Ok(());
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(discussion_id, error = %e, "failed to load discussion")
                }
            }
        }

        Err(OrchestratorError::NotFound(discussion_id.to_string()))
    }

    async fn persist_turn(&self, discussion: &Discussion, message: &Message) {
        let Some(gateway) = &self.gateway else {
            return;
        };
        if let Err(e) = gateway.save_message(&discussion.id, message).await {
            tracing::error!(
                discussion_id = %discussion.id,
                error = %e,
                "failed to persist message; continuing in memory"
            );
        }
        if let Err(e) = gateway.save_discussion(discussion).await {
            tracing::error!(
                discussion_id = %discussion.id,
                error = %e,
                "failed to persist discussion state; continuing in memory"
            );
        }
    }
}
