//! # Roster
//!
//! YAML file listing credentials, debaters, judges and optional predefined
//! sessions. Loaded once at startup and upserted into the store.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.3.0
//! - **Toggleable**: false

use anyhow::{anyhow, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::core::{Judge, Participant, Session};
use crate::database::{Database, DebateStore};
use crate::features::providers::{ApiConfig, ProviderKind};

/// Root of the roster file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RosterConfig {
    #[serde(default)]
    pub api_configs: Vec<ApiConfig>,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub judges: Vec<Judge>,
    #[serde(default)]
    pub sessions: Vec<SessionSeed>,
}

/// A session to create on first start. The id keeps seeding idempotent.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionSeed {
    pub id: String,
    pub topic: String,
    #[serde(default)]
    pub description: Option<String>,
    pub participants: Vec<String>,
    #[serde(default)]
    pub judges: Vec<String>,
    #[serde(default = "default_rounds")]
    pub max_rounds: u32,
    #[serde(default = "default_words")]
    pub max_words_per_turn: usize,
}

fn default_rounds() -> u32 {
    3
}

fn default_words() -> usize {
    300
}

impl RosterConfig {
    /// Load and validate a roster file
    pub fn load(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// An absent file is an empty roster
    pub fn load_optional(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            info!("No roster at {}, starting with the stored one", path);
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn parse(yaml: &str) -> Result<Self> {
        let roster: RosterConfig = serde_yaml::from_str(yaml)?;
        roster.validate()?;
        Ok(roster)
    }

    pub fn validate(&self) -> Result<()> {
        let config_ids = unique_ids("api config", self.api_configs.iter().map(|c| c.id.as_str()))?;
        let participant_ids =
            unique_ids("participant", self.participants.iter().map(|p| p.id.as_str()))?;
        let judge_ids = unique_ids("judge", self.judges.iter().map(|j| j.id.as_str()))?;
        unique_ids("session", self.sessions.iter().map(|s| s.id.as_str()))?;

        for config in &self.api_configs {
            if config.provider == ProviderKind::Custom && config.base_url.is_none() {
                return Err(anyhow!("Custom api config {} needs a base_url", config.id));
            }
        }

        for participant in &self.participants {
            if !config_ids.contains(participant.api_config_id.as_str()) {
                return Err(anyhow!(
                    "Participant {} references unknown api config {}",
                    participant.id,
                    participant.api_config_id
                ));
            }
        }

        for judge in &self.judges {
            if !config_ids.contains(judge.api_config_id.as_str()) {
                return Err(anyhow!(
                    "Judge {} references unknown api config {}",
                    judge.id,
                    judge.api_config_id
                ));
            }
            if judge.criteria.is_empty() {
                return Err(anyhow!("Judge {} has no criteria", judge.id));
            }
        }

        for session in &self.sessions {
            if session.topic.trim().is_empty() {
                return Err(anyhow!("Session {} has an empty topic", session.id));
            }
            if session.participants.is_empty() {
                return Err(anyhow!("Session {} has no participants", session.id));
            }
            if session.max_rounds == 0 {
                return Err(anyhow!("Session {}: max_rounds must be at least 1", session.id));
            }
            if session.max_words_per_turn == 0 {
                return Err(anyhow!(
                    "Session {}: max_words_per_turn must be at least 1",
                    session.id
                ));
            }
            if let Some(missing) = session
                .participants
                .iter()
                .find(|id| !participant_ids.contains(id.as_str()))
            {
                return Err(anyhow!("Session {} references unknown participant {}", session.id, missing));
            }
            if let Some(missing) = session.judges.iter().find(|id| !judge_ids.contains(id.as_str())) {
                return Err(anyhow!("Session {} references unknown judge {}", session.id, missing));
            }
        }
        Ok(())
    }

    /// Upsert everything into the store; returns how many sessions were created
    pub async fn seed(&self, db: &Database) -> Result<usize> {
        for config in &self.api_configs {
            db.upsert_api_config(config).await?;
        }
        for participant in &self.participants {
            db.upsert_participant(participant).await?;
        }
        for judge in &self.judges {
            db.upsert_judge(judge).await?;
        }

        let mut created = 0;
        for seed in &self.sessions {
            if db.load_session(&seed.id).await?.is_some() {
                continue;
            }
            let mut session = Session::new(
                seed.topic.trim(),
                seed.description.clone(),
                seed.participants.clone(),
                seed.judges.clone(),
                seed.max_rounds,
                seed.max_words_per_turn,
            );
            session.id = seed.id.clone();
            db.create_session(&session).await?;
            created += 1;
        }

        if self.api_configs.iter().all(|c| !c.is_active) && !self.api_configs.is_empty() {
            warn!("Every api config in the roster is inactive");
        }
        info!(
            "Roster seeded: {} api configs, {} participants, {} judges, {} new sessions",
            self.api_configs.len(),
            self.participants.len(),
            self.judges.len(),
            created
        );
        Ok(created)
    }
}

fn unique_ids<'a>(kind: &str, ids: impl Iterator<Item = &'a str>) -> Result<HashSet<&'a str>> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(anyhow!("Duplicate {} id: {}", kind, id));
        }
    }
    Ok(seen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{SessionStatus, Stance};

    const ROSTER: &str = r#"
api_configs:
  - id: gpt
    name: GPT
    provider: openai
    api_key: sk-test
    model: gpt-4o-mini
    parameters:
      temperature: 0.4
  - id: local
    name: Local
    provider: custom
    api_key: none
    base_url: http://localhost:8080/generate
    model: llama
participants:
  - id: alice
    name: Alice
    api_config_id: gpt
    stance: pro
    personality: Optimistic economist
    instructions: Use data
  - id: bob
    name: Bob
    api_config_id: local
    stance: con
    personality: Skeptical planner
    instructions: Challenge assumptions
judges:
  - id: judy
    name: Judy
    api_config_id: gpt
    criteria: [logic, evidence]
    instructions: Be strict
sessions:
  - id: opening
    topic: Should remote work be the default?
    participants: [alice, bob]
    judges: [judy]
    max_rounds: 2
"#;

    #[test]
    fn test_parse_roster() {
        let roster = RosterConfig::parse(ROSTER).unwrap();
        assert_eq!(roster.api_configs.len(), 2);
        assert_eq!(roster.api_configs[0].parameters.temperature, Some(0.4));
        assert!(roster.participants[0].is_active);
        assert_eq!(roster.participants[1].stance, Stance::Con);
        assert_eq!(roster.judges[0].criteria, vec!["logic", "evidence"]);
        assert_eq!(roster.sessions[0].max_words_per_turn, 300);
    }

    #[test]
    fn test_validation_errors() {
        let custom_without_url = ROSTER.replace("    base_url: http://localhost:8080/generate\n", "");
        assert!(RosterConfig::parse(&custom_without_url).is_err());

        let unknown_config = ROSTER.replace("api_config_id: local", "api_config_id: nowhere");
        assert!(RosterConfig::parse(&unknown_config).is_err());

        let duplicate = ROSTER.replace("- id: bob", "- id: alice");
        let err = RosterConfig::parse(&duplicate).unwrap_err();
        assert!(err.to_string().contains("Duplicate participant id"));

        let no_criteria = ROSTER.replace("criteria: [logic, evidence]", "criteria: []");
        assert!(RosterConfig::parse(&no_criteria).is_err());

        let zero_rounds = ROSTER.replace("max_rounds: 2", "max_rounds: 0");
        assert!(RosterConfig::parse(&zero_rounds).is_err());

        let unknown_judge = ROSTER.replace("judges: [judy]", "judges: [judy, jim]");
        assert!(RosterConfig::parse(&unknown_judge).is_err());
    }

    #[test]
    fn test_missing_file_is_empty() {
        let roster = RosterConfig::load_optional("/nonexistent/roster.yaml").unwrap();
        assert!(roster.participants.is_empty());
        assert!(RosterConfig::load("/nonexistent/roster.yaml").is_err());
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let db = Database::new(":memory:").await.unwrap();
        let roster = RosterConfig::parse(ROSTER).unwrap();

        assert_eq!(roster.seed(&db).await.unwrap(), 1);
        assert_eq!(roster.seed(&db).await.unwrap(), 0);

        let session = db.load_session("opening").await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Created);
        assert_eq!(session.participant_ids, vec!["alice", "bob"]);

        let participants = db.load_participants("opening").await.unwrap();
        assert_eq!(participants[0].name, "Alice");
        let judges = db.load_judges("opening").await.unwrap();
        assert_eq!(judges[0].criteria, vec!["logic", "evidence"]);
        let credential = db.load_credential("local").await.unwrap().unwrap();
        assert_eq!(credential.provider, ProviderKind::Custom);
    }
}
