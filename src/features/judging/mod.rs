//! # Judging
//!
//! Post-debate scoring: every active judge scores every active participant,
//! each verdict is stored as soon as it arrives, and the final result is
//! derived from whatever scores exist.
//!
//! - **Version**: 1.0.1
//! - **Since**: 0.3.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.0.1: Out-of-range and oversized scores clamp instead of defaulting
//! - 1.0.0: Judging phase and verdict parsing

use log::{debug, error, info, warn};
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use chrono::Utc;

use crate::core::{
    DebateError, DebateResult, Judge, JudgeScore, Participant, Session, Stance, StanceTotals,
    TurnMessage, Winner, MAX_SCORE, MIN_SCORE,
};
use crate::database::DebateStore;
use crate::features::providers::AgentProvider;

/// Score recorded when a judge's answer carries no usable `SCORE:` line
pub const DEFAULT_SCORE: u32 = 5;

fn score_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)SCORE:\s*(\d+)").ok())
        .as_ref()
}

fn comments_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?is)COMMENTS:\s*(.*)").ok())
        .as_ref()
}

/// Clamp any parsed value into the legal score range
pub fn clamp_score(value: u64) -> u32 {
    value.clamp(u64::from(MIN_SCORE), u64::from(MAX_SCORE)) as u32
}

/// Extract `(score, comments)` from a judge's free-form answer.
///
/// Never fails: a missing score becomes [`DEFAULT_SCORE`] and missing
/// comments become the whole raw answer.
pub fn parse_verdict(raw: &str) -> (u32, String) {
    let score = score_pattern()
        .and_then(|re| re.captures(raw))
        .and_then(|caps| caps.get(1))
        // Digits that overflow u64 are still "too large"
        .map(|m| m.as_str().parse::<u64>().unwrap_or(u64::MAX))
        .map(clamp_score)
        .unwrap_or(DEFAULT_SCORE);

    let comments = comments_pattern()
        .and_then(|re| re.captures(raw))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| raw.to_string());

    (score, comments)
}

/// Build the scoring prompt for one judge/participant pairing
pub fn render_scoring_prompt(
    judge: &Judge,
    participant: &Participant,
    topic: &str,
    messages: &[TurnMessage],
) -> String {
    let arguments = messages
        .iter()
        .map(|m| format!("Round {}: {}", m.round, m.content))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r#"You are {judge}, a judge evaluating a debate on "{topic}".

Your judging criteria: {criteria}
Your instructions: {instructions}

Please evaluate the following participant's performance:
Participant: {participant} ({stance} stance)

Their arguments:
{arguments}

Please provide a score from 1-10 and detailed comments explaining your evaluation. Respond in this format:
SCORE: [number from 1-10]
COMMENTS: [detailed explanation]"#,
        judge = judge.name,
        topic = topic,
        criteria = judge.criteria.join(", "),
        instructions = judge.instructions,
        participant = participant.name,
        stance = participant.stance,
        arguments = arguments,
    )
}

/// Derive the verdict from a score set.
///
/// Scores for participants not in `participants` count toward neither side.
pub fn compute_result(
    session_id: &str,
    scores: Vec<JudgeScore>,
    participants: &[Participant],
) -> DebateResult {
    let stances: HashMap<&str, Stance> = participants
        .iter()
        .map(|p| (p.id.as_str(), p.stance))
        .collect();

    let mut totals = StanceTotals::default();
    for score in &scores {
        match stances.get(score.participant_id.as_str()) {
            Some(Stance::Pro) => totals.pro += score.score,
            Some(Stance::Con) => totals.con += score.score,
            None => {}
        }
    }

    let winner = if totals.pro > totals.con {
        Winner::Pro
    } else if totals.con > totals.pro {
        Winner::Con
    } else {
        Winner::Tie
    };

    let summary = match winner {
        Winner::Pro => format!(
            "Final result: PRO wins with a total score of {} vs {}",
            totals.pro, totals.con
        ),
        Winner::Con => format!(
            "Final result: CON wins with a total score of {} vs {}",
            totals.con, totals.pro
        ),
        Winner::Tie => format!("Final result: TIE with both sides scoring {}", totals.pro),
    };

    DebateResult {
        session_id: session_id.to_string(),
        winner,
        totals,
        summary,
        scores,
    }
}

/// Runs the judge × participant cross product for one session
pub struct JudgingCoordinator<'a> {
    store: &'a dyn DebateStore,
    providers: &'a HashMap<String, Arc<dyn AgentProvider>>,
}

impl<'a> JudgingCoordinator<'a> {
    /// `providers` is keyed by api config id
    pub fn new(
        store: &'a dyn DebateStore,
        providers: &'a HashMap<String, Arc<dyn AgentProvider>>,
    ) -> Self {
        Self { store, providers }
    }

    /// Score every active participant with every active judge, judges first.
    ///
    /// A failing pairing is logged and skipped; the phase itself cannot fail.
    pub async fn run(
        &self,
        session: &Session,
        judges: &[Judge],
        participants: &[Participant],
    ) -> DebateResult {
        let judges: Vec<&Judge> = judges.iter().filter(|j| j.is_active).collect();
        let active: Vec<&Participant> = participants.iter().filter(|p| p.is_active).collect();
        info!(
            "Judging session {}: {} judges x {} participants",
            session.id,
            judges.len(),
            active.len()
        );

        let mut scores = Vec::new();
        for judge in &judges {
            for participant in &active {
                match self.score_pairing(session, judge, participant).await {
                    Ok(score) => scores.push(score),
                    Err(e) if e.is_recoverable() => {
                        warn!("Skipping {} -> {}: {}", judge.name, participant.name, e)
                    }
                    Err(e) => error!(
                        "Error generating judge score for {} on {}: {}",
                        judge.name, participant.name, e
                    ),
                }
            }
        }

        let result = compute_result(&session.id, scores, participants);
        info!("Session {}: {}", session.id, result.summary);
        result
    }

    async fn score_pairing(
        &self,
        session: &Session,
        judge: &Judge,
        participant: &Participant,
    ) -> Result<JudgeScore, DebateError> {
        let provider = self.providers.get(&judge.api_config_id).ok_or_else(|| {
            DebateError::Configuration(format!(
                "API config not found for judge {}",
                judge.name
            ))
        })?;

        let messages: Vec<TurnMessage> = self
            .store
            .load_messages(&session.id, None)
            .await?
            .into_iter()
            .filter(|m| m.participant_id == participant.id)
            .collect();

        let prompt = render_scoring_prompt(judge, participant, &session.topic, &messages);
        let response = provider.generate(&prompt, None).await?;
        let (score, comments) = parse_verdict(&response.content);

        let score = JudgeScore {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session.id.clone(),
            judge_id: judge.id.clone(),
            participant_id: participant.id.clone(),
            criteria: judge.criteria.join(", "),
            score,
            max_score: MAX_SCORE,
            comments,
            timestamp: Utc::now(),
        };
        self.store.append_score(&score).await?;
        debug!(
            "{} scored {} {}/{}",
            judge.name, participant.name, score.score, score.max_score
        );
        Ok(score)
    }
}
