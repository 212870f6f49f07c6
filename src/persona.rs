//! Advisor personas and the registry that holds them.
//!
//! A persona binds a boardroom identity (name, role, personality, expertise)
//! to the completion model that speaks for it. The registry is a fixed set
//! built at construction; consumers get snapshot copies and never mutate the
//! registry's internal list.

use serde::{Deserialize, Serialize};

/// An advisor profile bound to a specific completion model and role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    /// Display name, e.g. "Alexandra Stone".
    pub name: String,
    /// Model identifier passed to the completion service.
    pub model_id: String,
    /// Short role tag, e.g. "CEO". Unique within a registry.
    pub role: String,
    /// Free text injected into the system prompt.
    pub personality: String,
    /// Free text used both in prompts and for topical scoring.
    pub expertise: String,
}

impl Persona {
    pub fn new(
        name: impl Into<String>,
        model_id: impl Into<String>,
        role: impl Into<String>,
        personality: impl Into<String>,
        expertise: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            model_id: model_id.into(),
            role: role.into(),
            personality: personality.into(),
            expertise: expertise.into(),
        }
    }
}

impl std::fmt::Display for Persona {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.role)
    }
}

/// Fixed set of advisor definitions. Pure data provider.
#[derive(Debug, Clone)]
pub struct PersonaRegistry {
    personas: Vec<Persona>,
}

impl PersonaRegistry {
    /// Create a registry from an explicit persona list.
    pub fn new(personas: Vec<Persona>) -> Self {
        Self { personas }
    }

    /// Create a registry pre-populated with the default boardroom trio.
    pub fn with_defaults() -> Self {
        Self::new(vec![
            Persona::new(
                "Alexandra Stone",
                "openai/gpt-4",
                "CEO",
                "Strategic visionary with strong leadership skills. Focuses on \
                 big-picture thinking, company vision, and stakeholder value. \
                 Decisive but collaborative in decision-making.",
                "Business strategy, leadership, market analysis, financial \
                 oversight, stakeholder management",
            ),
            Persona::new(
                "Marcus Chen",
                "anthropic/claude-3-sonnet",
                "CTO",
                "Technical innovator with a pragmatic approach. Balances \
                 cutting-edge technology with practical implementation. \
                 Detail-oriented and risk-aware.",
                "Software architecture, technology trends, system scalability, \
                 cybersecurity, technical team management",
            ),
            Persona::new(
                "Sofia Rodriguez",
                "google/gemini-pro",
                "CMO",
                "Creative strategist with deep market insights. Data-driven yet \
                 intuitive about customer behavior. Enthusiastic about brand \
                 building and customer engagement.",
                "Marketing strategy, brand management, customer acquisition, \
                 digital marketing, market research",
            ),
        ])
    }

    /// Snapshot copy of the full set.
    pub fn all(&self) -> Vec<Persona> {
        self.personas.clone()
    }

    /// Look up a persona by role tag, case-insensitive.
    pub fn by_role(&self, role: &str) -> Option<&Persona> {
        self.personas
            .iter()
            .find(|p| p.role.eq_ignore_ascii_case(role))
    }

    /// Register an additional persona.
    pub fn add(&mut self, persona: Persona) {
        self.personas.push(persona);
    }

    /// Number of registered personas.
    pub fn len(&self) -> usize {
        self.personas.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}

impl Default for PersonaRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
