//! # Export
//!
//! Markdown debate reports: session header, roster, round-grouped
//! transcript and the judging breakdown.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.5.0
//! - **Toggleable**: false

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::core::{Judge, JudgeScore, Participant, Session, TurnMessage};
use crate::features::judging::compute_result;

fn timestamp(t: &DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Render a full report. Output depends only on the inputs.
pub fn render_markdown(
    session: &Session,
    participants: &[Participant],
    judges: &[Judge],
    messages: &[TurnMessage],
    scores: &[JudgeScore],
) -> String {
    let people: HashMap<&str, &Participant> =
        participants.iter().map(|p| (p.id.as_str(), p)).collect();
    let judge_names: HashMap<&str, &str> =
        judges.iter().map(|j| (j.id.as_str(), j.name.as_str())).collect();
    let label = |participant_id: &str| -> String {
        match people.get(participant_id) {
            Some(p) => format!("{} ({})", p.name, p.stance.as_str().to_uppercase()),
            None => participant_id.to_string(),
        }
    };

    let mut md = format!("# Debate Report: {}\n\n", session.topic);

    md.push_str("## Session Information\n\n");
    md.push_str(&format!("- **Topic**: {}\n", session.topic));
    if let Some(description) = &session.description {
        md.push_str(&format!("- **Description**: {}\n", description));
    }
    md.push_str(&format!("- **Status**: {}\n", session.status));
    md.push_str(&format!(
        "- **Rounds**: {}/{}\n",
        session.current_round, session.max_rounds
    ));
    md.push_str(&format!(
        "- **Max Words per Turn**: {}\n",
        session.max_words_per_turn
    ));
    md.push_str(&format!("- **Created**: {}\n", timestamp(&session.created_at)));
    if let Some(completed_at) = &session.completed_at {
        md.push_str(&format!("- **Completed**: {}\n", timestamp(completed_at)));
    }
    md.push('\n');

    md.push_str("## Participants\n\n");
    for p in participants {
        md.push_str(&format!("### {}\n\n", label(&p.id)));
        md.push_str(&format!("- **Stance**: {}\n", p.stance));
        md.push_str(&format!("- **Personality**: {}\n", p.personality));
        md.push_str(&format!("- **Instructions**: {}\n\n", p.instructions));
    }

    md.push_str("## Judges\n\n");
    for j in judges {
        md.push_str(&format!("### {}\n\n", j.name));
        md.push_str(&format!("- **Criteria**: {}\n", j.criteria.join(", ")));
        md.push_str(&format!("- **Instructions**: {}\n\n", j.instructions));
    }

    if !messages.is_empty() {
        md.push_str("## Debate Transcript\n\n");
        let mut round = 0;
        for m in messages {
            if m.round != round {
                round = m.round;
                md.push_str(&format!("### Round {}\n\n", round));
            }
            md.push_str(&format!("**{}:**\n\n", label(&m.participant_id)));
            md.push_str(&format!("{}\n\n", m.content));
            md.push_str(&format!(
                "*Word count: {} | {}*\n\n",
                m.word_count,
                timestamp(&m.timestamp)
            ));
            md.push_str("---\n\n");
        }
    }

    if !scores.is_empty() {
        let result = compute_result(&session.id, scores.to_vec(), participants);

        md.push_str("## Judge Scores\n\n");
        md.push_str("### Final Results\n\n");
        md.push_str(&format!("- **PRO Total Score**: {}\n", result.totals.pro));
        md.push_str(&format!("- **CON Total Score**: {}\n", result.totals.con));
        md.push_str(&format!(
            "- **Winner**: {}\n\n",
            result.winner.as_str().to_uppercase()
        ));

        md.push_str("### Detailed Scores\n\n");
        for s in scores {
            let judge = judge_names.get(s.judge_id.as_str()).copied().unwrap_or(s.judge_id.as_str());
            md.push_str(&format!("**{}** → **{}**\n\n", judge, label(&s.participant_id)));
            md.push_str(&format!("- **Score**: {}/{}\n", s.score, s.max_score));
            md.push_str(&format!("- **Criteria**: {}\n", s.criteria));
            md.push_str(&format!("- **Comments**: {}\n\n", s.comments));
            md.push_str("---\n\n");
        }
    }

    md
}
