//! Chat context construction for a speaking persona.
//!
//! The completion service models a two-party conversation, so the history
//! is re-labeled from the speaker's point of view: the speaker's own past
//! messages become `user` turns and everyone else's become `assistant`
//! turns. Each history entry is prefixed with its author and phase so the
//! model can follow who said what.

use crate::completion::ChatMessage;
use crate::persona::Persona;

use super::state::Discussion;

/// Build the full prompt context for the next utterance by `speaker`.
pub fn build_context(discussion: &Discussion, speaker: &Persona) -> Vec<ChatMessage> {
    let mut context = Vec::with_capacity(discussion.messages.len() + 2);
    context.push(ChatMessage::system(system_prompt(discussion, speaker)));

    for message in &discussion.messages {
        let content = format!(
            "[{} - {}] ({}): {}",
            message.persona_name, message.role, message.phase, message.content
        );
        if message.persona_name == speaker.name {
            context.push(ChatMessage::user(content));
        } else {
            context.push(ChatMessage::assistant(content));
        }
    }

    if discussion.messages.is_empty() {
        context.push(ChatMessage::user(format!(
            "Please provide your initial thoughts on this topic: {}",
            discussion.topic
        )));
    } else {
        context.push(ChatMessage::user(
            "Please provide your response to the ongoing discussion.",
        ));
    }

    context
}

fn system_prompt(discussion: &Discussion, speaker: &Persona) -> String {
    format!(
        "You are {name}, the {role} in a boardroom discussion.\n\
         \n\
         Your personality: {personality}\n\
         Your expertise: {expertise}\n\
         \n\
         You are participating in a structured boardroom debate about: \"{topic}\"\n\
         \n\
         {phase_instructions}\n\
         \n\
         Guidelines:\n\
         - Stay in character as {name}\n\
         - Provide thoughtful insights from your role's perspective\n\
         - Keep responses concise (2-3 paragraphs max)\n\
         - Be professional but show your personality\n\
         - Build on or respectfully challenge previous points when relevant\n\
         - Focus on actionable insights and business implications",
        name = speaker.name,
        role = speaker.role,
        personality = speaker.personality,
        expertise = speaker.expertise,
        topic = discussion.topic,
        phase_instructions = discussion.current_phase.instructions(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::ChatRole;
    use crate::discussion::state::{DiscussionPhase, Message, PhaseLimits};
    use crate::persona::PersonaRegistry;
    use chrono::Utc;

    fn discussion_with(messages: Vec<Message>) -> Discussion {
        let mut d = Discussion::new(
            "d-1",
            "Should we hire more developers?",
            PersonaRegistry::with_defaults().all(),
            PhaseLimits::default(),
        );
        d.current_turn = messages.len() as u32;
        d.messages = messages;
        d
    }

    fn message(name: &str, role: &str, content: &str, turn: u32) -> Message {
        Message {
            persona_name: name.to_string(),
            role: role.to_string(),
            content: content.to_string(),
            phase: DiscussionPhase::Opening,
            turn_number: turn,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_history_prompts_for_initial_thoughts() {
        let d = discussion_with(vec![]);
        let speaker = d.personas[0].clone();
        let context = build_context(&d, &speaker);

        assert_eq!(context.len(), 2);
        assert_eq!(context[0].role, ChatRole::System);
        assert_eq!(context[1].role, ChatRole::User);
        assert!(context[1]
            .content
            .contains("initial thoughts on this topic: Should we hire more developers?"));
    }

    #[test]
    fn test_system_prompt_embeds_identity_and_phase() {
        let d = discussion_with(vec![]);
        let cto = d.personas[1].clone();
        let context = build_context(&d, &cto);
        let system = &context[0].content;

        assert!(system.contains("You are Marcus Chen, the CTO"));
        assert!(system.contains("Your personality: Technical innovator"));
        assert!(system.contains("Your expertise: Software architecture"));
        assert!(system.contains("\"Should we hire more developers?\""));
        assert!(system.contains("OPENING phase"));
    }

    #[test]
    fn test_history_roles_relabeled_for_speaker() {
        let d = discussion_with(vec![
            message("Alexandra Stone", "CEO", "We should weigh the budget.", 1),
            message("Marcus Chen", "CTO", "Our systems are at capacity.", 2),
        ]);
        let cto = d.personas[1].clone();
        let context = build_context(&d, &cto);

        assert_eq!(context.len(), 4);
        // CEO's message reads as the counterpart.
        assert_eq!(context[1].role, ChatRole::Assistant);
        // The speaker's own past message reads as a user turn.
        assert_eq!(context[2].role, ChatRole::User);
        // Trailing prompt asks for a response to the discussion.
        assert_eq!(context[3].role, ChatRole::User);
        assert!(context[3].content.contains("ongoing discussion"));
    }

    #[test]
    fn test_history_entries_carry_author_and_phase() {
        let d = discussion_with(vec![message(
            "Alexandra Stone",
            "CEO",
            "We should weigh the budget.",
            1,
        )]);
        let cmo = d.personas[2].clone();
        let context = build_context(&d, &cmo);

        assert_eq!(
            context[1].content,
            "[Alexandra Stone - CEO] (opening): We should weigh the budget."
        );
    }

    #[test]
    fn test_phase_instructions_follow_current_phase() {
        let mut d = discussion_with(vec![message("Alexandra Stone", "CEO", "x", 1)]);
        d.current_phase = DiscussionPhase::Synthesis;
        let speaker = d.personas[0].clone();
        let context = build_context(&d, &speaker);
        assert!(context[0].content.contains("SYNTHESIS phase"));
    }
}
