//! # Domain Types
//!
//! Sessions, participants, judges, transcript messages and scores.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Explicit status transition table shared by the engine and the controller
//! - 1.0.0: Initial types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum score a judge may award
pub const MAX_SCORE: u32 = 10;

/// Minimum score a judge may award
pub const MIN_SCORE: u32 = 1;

/// The side a participant argues for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stance {
    Pro,
    Con,
}

impl Stance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stance::Pro => "pro",
            Stance::Con => "con",
        }
    }
}

impl fmt::Display for Stance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stance {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pro" => Ok(Stance::Pro),
            "con" => Ok(Stance::Con),
            other => Err(anyhow::anyhow!("Unknown stance: {}", other)),
        }
    }
}

/// Lifecycle state of a debate session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Created,
    Running,
    Paused,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Created => "created",
            SessionStatus::Running => "running",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    /// Completed and cancelled sessions accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Cancelled)
    }

    /// Whether `self -> next` is a legal transition.
    ///
    /// ```text
    /// created -> running
    /// running -> paused | completed | cancelled
    /// paused  -> running | completed | cancelled
    /// ```
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Created, Running)
                | (Running, Paused)
                | (Running, Completed)
                | (Running, Cancelled)
                | (Paused, Running)
                | (Paused, Completed)
                | (Paused, Cancelled)
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(SessionStatus::Created),
            "running" => Ok(SessionStatus::Running),
            "paused" => Ok(SessionStatus::Paused),
            "completed" => Ok(SessionStatus::Completed),
            "cancelled" => Ok(SessionStatus::Cancelled),
            other => Err(anyhow::anyhow!("Unknown session status: {}", other)),
        }
    }
}

/// A debate session as persisted in the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub topic: String,
    pub description: Option<String>,
    /// Participant ids in speaking order
    pub participant_ids: Vec<String>,
    pub judge_ids: Vec<String>,
    pub max_rounds: u32,
    pub max_words_per_turn: usize,
    pub status: SessionStatus,
    pub current_round: u32,
    pub current_turn: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Create a fresh session in the `created` state with zeroed counters
    pub fn new(
        topic: impl Into<String>,
        description: Option<String>,
        participant_ids: Vec<String>,
        judge_ids: Vec<String>,
        max_rounds: u32,
        max_words_per_turn: usize,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            topic: topic.into(),
            description,
            participant_ids,
            judge_ids,
            max_rounds,
            max_words_per_turn,
            status: SessionStatus::Created,
            current_round: 0,
            current_turn: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}

/// A debating agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub name: String,
    pub api_config_id: String,
    pub stance: Stance,
    pub personality: String,
    pub instructions: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// A scoring agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judge {
    pub id: String,
    pub name: String,
    pub api_config_id: String,
    pub criteria: Vec<String>,
    pub instructions: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// One participant's contribution to a round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnMessage {
    pub id: String,
    pub session_id: String,
    pub participant_id: String,
    pub round: u32,
    pub turn: u32,
    pub content: String,
    pub word_count: usize,
    pub timestamp: DateTime<Utc>,
}

/// A judge's verdict on one participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeScore {
    pub id: String,
    pub session_id: String,
    pub judge_id: String,
    pub participant_id: String,
    /// Comma-joined criteria the judge scored against
    pub criteria: String,
    pub score: u32,
    pub max_score: u32,
    pub comments: String,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of the judging phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Pro,
    Con,
    Tie,
}

impl Winner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Winner::Pro => "pro",
            Winner::Con => "con",
            Winner::Tie => "tie",
        }
    }
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score totals per stance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StanceTotals {
    pub pro: u32,
    pub con: u32,
}

/// Derived verdict, recomputed from the score set whenever needed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateResult {
    pub session_id: String,
    pub winner: Winner,
    pub totals: StanceTotals,
    pub summary: String,
    pub scores: Vec<JudgeScore>,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [SessionStatus; 5] = [
        SessionStatus::Created,
        SessionStatus::Running,
        SessionStatus::Paused,
        SessionStatus::Completed,
        SessionStatus::Cancelled,
    ];

    #[test]
    fn test_created_only_starts() {
        for next in ALL {
            assert_eq!(
                SessionStatus::Created.can_transition_to(next),
                next == SessionStatus::Running,
                "created -> {next}"
            );
        }
    }

    #[test]
    fn test_running_transitions() {
        let running = SessionStatus::Running;
        assert!(running.can_transition_to(SessionStatus::Paused));
        assert!(running.can_transition_to(SessionStatus::Completed));
        assert!(running.can_transition_to(SessionStatus::Cancelled));
        assert!(!running.can_transition_to(SessionStatus::Running));
        assert!(!running.can_transition_to(SessionStatus::Created));
    }

    #[test]
    fn test_paused_transitions() {
        let paused = SessionStatus::Paused;
        assert!(paused.can_transition_to(SessionStatus::Running));
        assert!(paused.can_transition_to(SessionStatus::Completed));
        assert!(!paused.can_transition_to(SessionStatus::Paused));
        assert!(!paused.can_transition_to(SessionStatus::Created));
    }

    #[test]
    fn test_terminal_states_are_final() {
        for terminal in [SessionStatus::Completed, SessionStatus::Cancelled] {
            assert!(terminal.is_terminal());
            for next in ALL {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in ALL {
            assert_eq!(status.as_str().parse::<SessionStatus>().unwrap(), status);
        }
        assert!("finished".parse::<SessionStatus>().is_err());
    }

    #[test]
    fn test_stance_parsing() {
        assert_eq!("PRO".parse::<Stance>().unwrap(), Stance::Pro);
        assert_eq!(" con ".parse::<Stance>().unwrap(), Stance::Con);
        assert!("neutral".parse::<Stance>().is_err());
    }

    #[test]
    fn test_new_session_defaults() {
        let session = Session::new("Cats vs dogs", None, vec!["a".into()], vec![], 3, 150);
        assert_eq!(session.status, SessionStatus::Created);
        assert_eq!(session.current_round, 0);
        assert_eq!(session.current_turn, 0);
        assert!(session.completed_at.is_none());
    }
}
