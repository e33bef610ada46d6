//! Prompt composition for a conversation turn
//!
//! The request sent upstream always has this shape:
//! 1. **System**: the resolved directive (exactly one entry)
//! 2. **History**: every stored user/assistant message, oldest first
//! 3. **Current**: the new user turn
//!
//! Stored system messages are never forwarded. Whatever directive was
//! persisted at setup is superseded by the one resolved for this turn, so a
//! persona bound later takes effect immediately.

use crate::providers::{ChatTurn, Role};
use crate::session::{Message, Persona, Session};

const CLOSING_INSTRUCTION: &str = " Please answer the user's questions concisely and accurately.";

/// Directive for a session bound to a persona
pub fn persona_directive(persona: &Persona) -> String {
    let mut directive = format!("You are an AI assistant named {}.", persona.name);
    if !persona.identity.is_empty() {
        directive.push_str(&format!(" Your identity: {}.", persona.identity));
    }
    if !persona.appearance.is_empty() {
        directive.push_str(&format!(" Your appearance: {}.", persona.appearance));
    }
    if !persona.personality.is_empty() {
        directive.push_str(&format!(" Your personality: {}.", persona.personality));
    }
    directive.push_str(CLOSING_INSTRUCTION);
    directive
}

/// Directive for a session without a persona
pub fn default_directive(model: &str, personality: &str) -> String {
    let mut directive = format!("You are an AI assistant named {}.", model);
    if !personality.is_empty() {
        directive.push_str(&format!(" Your personality: {}", personality));
    }
    directive.push_str(CLOSING_INSTRUCTION);
    directive
}

/// Picks the directive for a turn: the live persona if one is bound and
/// still exists, otherwise the session's own fields
pub fn resolve_directive(session: &Session, persona: Option<&Persona>) -> String {
    match persona {
        Some(persona) => persona_directive(persona),
        None => default_directive(&session.model, &session.personality),
    }
}

/// Builds the ordered turns for a completion call
pub fn compose(history: &[Message], directive: &str, new_turn: &str) -> Vec<ChatTurn> {
    let mut turns = Vec::with_capacity(history.len() + 2);
    turns.push(ChatTurn::system(directive));
    turns.extend(
        history
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| ChatTurn::new(m.role, m.content.clone())),
    );
    turns.push(ChatTurn::user(new_turn));
    turns
}
