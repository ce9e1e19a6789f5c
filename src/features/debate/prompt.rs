//! # Turn Prompt
//!
//! Template a participant answers each turn.

use crate::core::{Participant, Session};

/// Build the prompt a participant answers for one turn
pub fn render_turn_prompt(
    participant: &Participant,
    session: &Session,
    round: u32,
    context: &str,
) -> String {
    format!(
        r#"You are {name}, participating in a debate with the {stance} stance on the topic: "{topic}".

Your personality: {personality}

Additional instructions: {instructions}

This is round {round} of the debate. You have a maximum of {max_words} words for your response.

{context}

Please provide your argument for this round:"#,
        name = participant.name,
        stance = participant.stance,
        topic = session.topic,
        personality = participant.personality,
        instructions = participant.instructions,
        round = round,
        max_words = session.max_words_per_turn,
        context = context,
    )
}
