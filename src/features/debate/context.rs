//! # Debate Context
//!
//! Debate history rendering for participant prompts.

use anyhow::Result;
use std::collections::HashMap;

use crate::core::{Participant, TurnMessage};
use crate::database::DebateStore;

/// Render prior turns as the history block a participant sees.
///
/// `messages` must already be ordered by (round, turn).
pub fn render_context(topic: &str, messages: &[TurnMessage], participants: &[Participant]) -> String {
    if messages.is_empty() {
        return format!("This is the beginning of a debate on the topic: \"{}\"", topic);
    }

    let by_id: HashMap<&str, &Participant> =
        participants.iter().map(|p| (p.id.as_str(), p)).collect();

    let mut context = format!("Previous discussion on topic: \"{}\"\n\n", topic);
    for message in messages {
        let (name, stance) = match by_id.get(message.participant_id.as_str()) {
            Some(p) => (p.name.as_str(), p.stance.as_str()),
            None => (message.participant_id.as_str(), "unknown"),
        };
        context.push_str(&format!(
            "Round {}, {} ({}): {}\n\n",
            message.round, name, stance, message.content
        ));
    }
    context
}

/// Load every turn before `current_round` and render it
pub async fn build_context(
    store: &dyn DebateStore,
    session_id: &str,
    topic: &str,
    current_round: u32,
    participants: &[Participant],
) -> Result<String> {
    let messages = store.load_messages(session_id, Some(current_round)).await?;
    Ok(render_context(topic, &messages, participants))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Stance;
    use crate::database::tests::{message, participant, seeded};

    #[test]
    fn test_empty_history() {
        assert_eq!(
            render_context("Tabs or spaces", &[], &[]),
            "This is the beginning of a debate on the topic: \"Tabs or spaces\""
        );
    }

    #[test]
    fn test_renders_in_given_order() {
        let people = vec![participant("p1", Stance::Pro), participant("p2", Stance::Con)];
        let mut first = message("s", "p1", 1, 1);
        first.content = "Cars pollute.".into();
        let mut second = message("s", "p2", 1, 2);
        second.content = "Cars enable commerce.".into();

        let context = render_context("Ban cars", &[first, second], &people);
        assert_eq!(
            context,
            "Previous discussion on topic: \"Ban cars\"\n\n\
             Round 1, Debater p1 (pro): Cars pollute.\n\n\
             Round 1, Debater p2 (con): Cars enable commerce.\n\n"
        );
    }

    #[test]
    fn test_unknown_participant_falls_back_to_id() {
        let context = render_context("T", &[message("s", "ghost", 1, 1)], &[]);
        assert!(context.contains("Round 1, ghost (unknown): "));
    }

    #[tokio::test]
    async fn test_build_context_excludes_current_round() {
        let (db, session) = seeded().await;
        db.append_message(&message(&session.id, "p1", 1, 1)).await.unwrap();
        db.append_message(&message(&session.id, "p2", 1, 2)).await.unwrap();
        db.append_message(&message(&session.id, "p1", 2, 1)).await.unwrap();
        let people = db.load_participants(&session.id).await.unwrap();

        let round_one = build_context(&db, &session.id, &session.topic, 1, &people).await.unwrap();
        assert!(round_one.starts_with("This is the beginning"));

        let round_two = build_context(&db, &session.id, &session.topic, 2, &people).await.unwrap();
        assert_eq!(round_two.matches("Round 1,").count(), 2);
        assert!(!round_two.contains("Round 2,"));
        let pro = round_two.find("(pro)").unwrap();
        let con = round_two.find("(con)").unwrap();
        assert!(pro < con);
    }
}
