//! Speaker selection: round robin in the opening and synthesis phases,
//! content-driven expertise scoring during debate.
//!
//! Debate selection is a pure function of the persona set and the message
//! history, so the same history always yields the same speaker.

use crate::persona::Persona;

use super::state::{Discussion, DiscussionPhase, Message};

/// Penalty applied to a persona that authored either of the last two
/// messages.
const RECENT_SPEAKER_PENALTY: i32 = -10;

/// Bonus per keyword family present in the last message whose expertise
/// markers intersect the persona's expertise text.
const FAMILY_MATCH_BONUS: i32 = 5;

/// A topical keyword family: terms that flag the family as present in a
/// message, and expertise markers that tie personas to it.
pub struct KeywordFamily {
    pub tag: &'static str,
    pub message_keywords: &'static [&'static str],
    pub expertise_markers: &'static [&'static str],
}

/// The three fixed families used for debate scoring.
pub const KEYWORD_FAMILIES: &[KeywordFamily] = &[
    KeywordFamily {
        tag: "technology",
        message_keywords: &[
            "tech",
            "development",
            "developers",
            "software",
            "system",
            "architecture",
            "code",
            "programming",
            "infrastructure",
            "security",
            "scalability",
            "technical",
        ],
        expertise_markers: &["software", "technology", "technical", "system", "architecture"],
    },
    KeywordFamily {
        tag: "business",
        message_keywords: &[
            "strategy",
            "revenue",
            "profit",
            "market",
            "competition",
            "growth",
            "financial",
            "budget",
            "investment",
            "roi",
            "business",
            "vision",
        ],
        expertise_markers: &["strategy", "business", "financial", "leadership", "market"],
    },
    KeywordFamily {
        tag: "marketing",
        message_keywords: &[
            "customer",
            "brand",
            "marketing",
            "sales",
            "acquisition",
            "retention",
            "campaign",
            "audience",
            "engagement",
            "market research",
            "advertising",
        ],
        expertise_markers: &["marketing", "brand", "customer", "acquisition"],
    },
];

/// Families present in a message: any keyword appears as a case-insensitive
/// substring of the content.
pub fn present_families(content: &str) -> Vec<&'static KeywordFamily> {
    let content_lower = content.to_lowercase();
    KEYWORD_FAMILIES
        .iter()
        .filter(|family| {
            family
                .message_keywords
                .iter()
                .any(|kw| content_lower.contains(kw))
        })
        .collect()
}

/// Score a debate candidate against the families found in the last message.
pub fn score_persona(
    persona: &Persona,
    families: &[&'static KeywordFamily],
    recent: &[&Message],
) -> i32 {
    let mut score = 0;

    if recent.iter().any(|m| m.persona_name == persona.name) {
        score += RECENT_SPEAKER_PENALTY;
    }

    let expertise_lower = persona.expertise.to_lowercase();
    for family in families {
        if family
            .expertise_markers
            .iter()
            .any(|marker| expertise_lower.contains(marker))
        {
            score += FAMILY_MATCH_BONUS;
        }
    }

    score
}

/// Pick the debate speaker: CEO (or first persona) when history is empty,
/// otherwise the first strictly-highest-scoring candidate in registry order.
///
/// Returns `None` only for an empty persona set.
pub fn select_debate_speaker<'a>(
    personas: &'a [Persona],
    messages: &[Message],
) -> Option<&'a Persona> {
    if messages.is_empty() {
        return personas
            .iter()
            .find(|p| p.role == "CEO")
            .or_else(|| personas.first());
    }

    let last = messages.last()?;
    let families = present_families(&last.content);
    let recent: Vec<&Message> = messages.iter().rev().take(2).collect();

    let mut best: Option<(&Persona, i32)> = None;
    for persona in personas {
        let score = score_persona(persona, &families, &recent);
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((persona, score)),
        }
    }
    best.map(|(persona, _)| persona)
}

/// Pick the round-robin speaker for the current turn.
///
/// Indexes `turn_order` by `current_turn % len` and resolves the role back
/// to a persona, falling back to the first persona for an unknown role.
pub fn select_round_robin(discussion: &Discussion) -> Option<&Persona> {
    if discussion.turn_order.is_empty() {
        return None;
    }
    let index = discussion.current_turn as usize % discussion.turn_order.len();
    let role = &discussion.turn_order[index];
    discussion
        .personas
        .iter()
        .find(|p| &p.role == role)
        .or_else(|| discussion.personas.first())
}

/// Select the speaker for the next turn of a discussion.
pub fn select_speaker(discussion: &Discussion) -> Option<&Persona> {
    match discussion.current_phase {
        DiscussionPhase::Debate => {
            select_debate_speaker(&discussion.personas, &discussion.messages)
        }
        DiscussionPhase::Opening | DiscussionPhase::Synthesis => select_round_robin(discussion),
    }
}
