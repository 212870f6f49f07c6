//! Discussion state machine: phases, turn limits, messages, and the
//! discussion aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::persona::Persona;

/// Phase of a boardroom discussion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscussionPhase {
    /// Advisors state their initial positions.
    Opening,
    /// Advisors challenge and defend positions.
    Debate,
    /// Advisors converge on recommendations. Terminal.
    Synthesis,
}

impl DiscussionPhase {
    /// The phase that follows this one, if any.
    pub fn next(self) -> Option<DiscussionPhase> {
        match self {
            Self::Opening => Some(Self::Debate),
            Self::Debate => Some(Self::Synthesis),
            Self::Synthesis => None,
        }
    }

    /// Whether this is the terminal phase.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Synthesis)
    }

    /// Phase-specific instructions injected into the system prompt.
    pub fn instructions(self) -> &'static str {
        match self {
            Self::Opening => {
                "This is the OPENING phase. Present your initial position and \
                 key concerns. Be concise and establish your perspective."
            }
            Self::Debate => {
                "This is the DEBATE phase. Engage with others' points, \
                 challenge assumptions, and defend your position with specific \
                 examples and reasoning."
            }
            Self::Synthesis => {
                "This is the SYNTHESIS phase. Work toward consensus, summarize \
                 key insights, and propose concrete next steps or \
                 recommendations."
            }
        }
    }
}

impl std::fmt::Display for DiscussionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Opening => write!(f, "opening"),
            Self::Debate => write!(f, "debate"),
            Self::Synthesis => write!(f, "synthesis"),
        }
    }
}

/// How many turns each phase runs before the discussion moves on.
///
/// Serializes as a tag-to-integer map (`{"opening": 2, ...}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PhaseLimits {
    pub opening: u32,
    pub debate: u32,
    pub synthesis: u32,
}

impl PhaseLimits {
    pub fn new(opening: u32, debate: u32, synthesis: u32) -> Self {
        Self {
            opening,
            debate,
            synthesis,
        }
    }

    /// Turn limit for a given phase.
    pub fn limit_for(&self, phase: DiscussionPhase) -> u32 {
        match phase {
            DiscussionPhase::Opening => self.opening,
            DiscussionPhase::Debate => self.debate,
            DiscussionPhase::Synthesis => self.synthesis,
        }
    }

    /// All limits must be positive.
    pub fn is_valid(&self) -> bool {
        self.opening > 0 && self.debate > 0 && self.synthesis > 0
    }

    /// Total turns across all phases.
    pub fn total_turns(&self) -> u32 {
        self.opening + self.debate + self.synthesis
    }
}

impl Default for PhaseLimits {
    fn default() -> Self {
        Self::new(2, 4, 2)
    }
}

/// One advisor utterance. Immutable once created; history order is by
/// `turn_number`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Name of the persona that spoke.
    pub persona_name: String,
    /// Role tag of the persona at the time of speaking.
    pub role: String,
    /// The utterance itself.
    pub content: String,
    /// Phase the discussion was in when the message was produced.
    pub phase: DiscussionPhase,
    /// 1-based turn number.
    pub turn_number: u32,
    /// When the message was produced.
    pub created_at: DateTime<Utc>,
}

/// A discussion aggregate: topic, participants, state-machine position, and
/// the append-only message history. Doubles as the persistence snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discussion {
    /// Unique discussion identifier.
    pub id: String,
    /// The question under discussion.
    pub topic: String,
    /// Participating personas, role-unique, in registry order.
    pub personas: Vec<Persona>,
    /// Role sequence for round-robin phases, fixed at creation.
    pub turn_order: Vec<String>,
    /// Total messages produced so far.
    pub current_turn: u32,
    /// Current phase.
    pub current_phase: DiscussionPhase,
    /// Turns taken within the current phase.
    pub phase_turn_count: u32,
    /// Per-phase turn limits.
    pub phase_limits: PhaseLimits,
    /// Message history, ordered by turn number.
    pub messages: Vec<Message>,
    /// When the discussion was created.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl Discussion {
    /// Create a fresh discussion at `Opening`, turn 0.
    pub fn new(id: &str, topic: &str, personas: Vec<Persona>, phase_limits: PhaseLimits) -> Self {
        let turn_order = personas.iter().map(|p| p.role.clone()).collect();
        let now = Utc::now();
        Self {
            id: id.to_string(),
            topic: topic.to_string(),
            personas,
            turn_order,
            current_turn: 0,
            current_phase: DiscussionPhase::Opening,
            phase_turn_count: 0,
            phase_limits,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a message and advance the turn/phase counters.
    ///
    /// The phase transitions once its turn limit is reached; the counter is
    /// reset only when an actual transition occurs, so the terminal phase
    /// keeps counting.
    pub fn record_turn(&mut self, message: Message) {
        self.messages.push(message);
        self.current_turn += 1;
        self.phase_turn_count += 1;

        if self.phase_turn_count >= self.phase_limits.limit_for(self.current_phase) {
            if let Some(next) = self.current_phase.next() {
                self.current_phase = next;
                self.phase_turn_count = 0;
            }
        }

        self.updated_at = Utc::now();
    }

    /// Whether every phase has used up its turn budget.
    pub fn is_complete(&self) -> bool {
        self.current_phase.is_terminal()
            && self.phase_turn_count >= self.phase_limits.limit_for(self.current_phase)
    }

    /// The most recent message, if any.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Compact status line.
    pub fn status_line(&self) -> String {
        format!(
            "[{}] turn {} ({}/{}) | {} messages | topic={}",
            self.current_phase,
            self.current_turn,
            self.phase_turn_count,
            self.phase_limits.limit_for(self.current_phase),
            self.messages.len(),
            self.topic
        )
    }
}
