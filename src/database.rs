//! # Database
//!
//! Durable store for sessions, transcripts and scores, plus the seeded
//! credential/participant/judge configuration the engine reads.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Participant order is stored explicitly per session
//! - 1.0.0: SQLite schema for sessions, messages and judge scores

use anyhow::{anyhow, Context as _, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use sqlite::{Connection, State, Statement};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::{
    Judge, JudgeScore, Participant, Session, SessionStatus, TurnMessage,
};
use crate::features::providers::{ApiConfig, ProviderParameters};

/// The persistence operations the debate engine depends on.
///
/// Writes are awaited but carry no transaction context; each call stands alone.
#[async_trait]
pub trait DebateStore: Send + Sync {
    async fn create_session(&self, session: &Session) -> Result<()>;

    async fn load_session(&self, session_id: &str) -> Result<Option<Session>>;

    async fn save_session_status(
        &self,
        session_id: &str,
        status: SessionStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()>;

    async fn save_counters(&self, session_id: &str, round: u32, turn: u32) -> Result<()>;

    async fn append_message(&self, message: &TurnMessage) -> Result<()>;

    /// Messages ordered by (round, turn), optionally limited to rounds before `before_round`
    async fn load_messages(
        &self,
        session_id: &str,
        before_round: Option<u32>,
    ) -> Result<Vec<TurnMessage>>;

    async fn append_score(&self, score: &JudgeScore) -> Result<()>;

    /// Scores in the order they were recorded
    async fn load_scores(&self, session_id: &str) -> Result<Vec<JudgeScore>>;

    /// Participants linked to a session, in speaking order
    async fn load_participants(&self, session_id: &str) -> Result<Vec<Participant>>;

    async fn load_judges(&self, session_id: &str) -> Result<Vec<Judge>>;

    async fn load_credential(&self, config_id: &str) -> Result<Option<ApiConfig>>;
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS api_configs (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    provider TEXT NOT NULL,
    api_key TEXT NOT NULL,
    base_url TEXT,
    model TEXT NOT NULL,
    parameters TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS ai_participants (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    api_config_id TEXT NOT NULL,
    stance TEXT NOT NULL CHECK (stance IN ('pro', 'con')),
    personality TEXT NOT NULL,
    instructions TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    FOREIGN KEY (api_config_id) REFERENCES api_configs (id)
);

CREATE TABLE IF NOT EXISTS judges (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    api_config_id TEXT NOT NULL,
    criteria TEXT NOT NULL,
    instructions TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    FOREIGN KEY (api_config_id) REFERENCES api_configs (id)
);

CREATE TABLE IF NOT EXISTS debate_sessions (
    id TEXT PRIMARY KEY,
    topic TEXT NOT NULL,
    description TEXT,
    max_rounds INTEGER NOT NULL,
    max_words_per_turn INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'created'
        CHECK (status IN ('created', 'running', 'paused', 'completed', 'cancelled')),
    current_round INTEGER NOT NULL DEFAULT 0,
    current_turn INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    completed_at TEXT
);

CREATE TABLE IF NOT EXISTS session_participants (
    session_id TEXT NOT NULL,
    participant_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (session_id, participant_id),
    FOREIGN KEY (session_id) REFERENCES debate_sessions (id),
    FOREIGN KEY (participant_id) REFERENCES ai_participants (id)
);

CREATE TABLE IF NOT EXISTS session_judges (
    session_id TEXT NOT NULL,
    judge_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (session_id, judge_id),
    FOREIGN KEY (session_id) REFERENCES debate_sessions (id),
    FOREIGN KEY (judge_id) REFERENCES judges (id)
);

CREATE TABLE IF NOT EXISTS debate_messages (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    participant_id TEXT NOT NULL,
    round INTEGER NOT NULL,
    turn INTEGER NOT NULL,
    content TEXT NOT NULL,
    word_count INTEGER NOT NULL,
    timestamp TEXT NOT NULL,
    UNIQUE (session_id, round, turn),
    FOREIGN KEY (session_id) REFERENCES debate_sessions (id),
    FOREIGN KEY (participant_id) REFERENCES ai_participants (id)
);

CREATE TABLE IF NOT EXISTS judge_scores (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    judge_id TEXT NOT NULL,
    participant_id TEXT NOT NULL,
    criteria TEXT NOT NULL,
    score INTEGER NOT NULL,
    max_score INTEGER NOT NULL,
    comments TEXT,
    timestamp TEXT NOT NULL,
    seq INTEGER NOT NULL,
    FOREIGN KEY (session_id) REFERENCES debate_sessions (id),
    FOREIGN KEY (judge_id) REFERENCES judges (id),
    FOREIGN KEY (participant_id) REFERENCES ai_participants (id)
);

CREATE INDEX IF NOT EXISTS idx_debate_messages_session ON debate_messages(session_id);
CREATE INDEX IF NOT EXISTS idx_judge_scores_session ON judge_scores(session_id);
CREATE INDEX IF NOT EXISTS idx_sessions_status ON debate_sessions(status);
"#;

/// SQLite-backed store. Cheap to clone; clones share one connection.
#[derive(Clone)]
pub struct Database {
    connection: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database at `path` and apply the schema.
    ///
    /// `":memory:"` gives a private in-memory database.
    pub async fn new(path: &str) -> Result<Self> {
        let connection =
            sqlite::open(path).with_context(|| format!("Failed to open database at {}", path))?;
        connection.execute(SCHEMA)?;
        info!("Database ready at {}", path);

        Ok(Database {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.connection
            .lock()
            .map_err(|_| anyhow!("Database connection lock poisoned"))
    }

    /// Insert or replace a credential/model configuration
    pub async fn upsert_api_config(&self, config: &ApiConfig) -> Result<()> {
        let conn = self.lock()?;
        let parameters = serde_json::to_string(&config.parameters)?;
        let mut stmt = conn.prepare(
            "INSERT OR REPLACE INTO api_configs
                (id, name, provider, api_key, base_url, model, parameters, is_active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )?;
        stmt.bind((1, config.id.as_str()))?;
        stmt.bind((2, config.name.as_str()))?;
        stmt.bind((3, config.provider.as_str()))?;
        stmt.bind((4, config.api_key.as_str()))?;
        stmt.bind((5, config.base_url.as_deref()))?;
        stmt.bind((6, config.model.as_str()))?;
        stmt.bind((7, parameters.as_str()))?;
        stmt.bind((8, config.is_active as i64))?;
        stmt.bind((9, config.created_at.to_rfc3339().as_str()))?;
        stmt.bind((10, config.updated_at.to_rfc3339().as_str()))?;
        run(&mut stmt)
    }

    /// Insert or replace a participant definition
    pub async fn upsert_participant(&self, participant: &Participant) -> Result<()> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "INSERT OR REPLACE INTO ai_participants
                (id, name, api_config_id, stance, personality, instructions, is_active)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )?;
        stmt.bind((1, participant.id.as_str()))?;
        stmt.bind((2, participant.name.as_str()))?;
        stmt.bind((3, participant.api_config_id.as_str()))?;
        stmt.bind((4, participant.stance.as_str()))?;
        stmt.bind((5, participant.personality.as_str()))?;
        stmt.bind((6, participant.instructions.as_str()))?;
        stmt.bind((7, participant.is_active as i64))?;
        run(&mut stmt)
    }

    /// Insert or replace a judge definition
    pub async fn upsert_judge(&self, judge: &Judge) -> Result<()> {
        let conn = self.lock()?;
        let criteria = serde_json::to_string(&judge.criteria)?;
        let mut stmt = conn.prepare(
            "INSERT OR REPLACE INTO judges
                (id, name, api_config_id, criteria, instructions, is_active)
             VALUES (?, ?, ?, ?, ?, ?)",
        )?;
        stmt.bind((1, judge.id.as_str()))?;
        stmt.bind((2, judge.name.as_str()))?;
        stmt.bind((3, judge.api_config_id.as_str()))?;
        stmt.bind((4, criteria.as_str()))?;
        stmt.bind((5, judge.instructions.as_str()))?;
        stmt.bind((6, judge.is_active as i64))?;
        run(&mut stmt)
    }

    fn linked_ids(conn: &Connection, table: &str, column: &str, session_id: &str) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT {column} FROM {table} WHERE session_id = ? ORDER BY position",
            column = column,
            table = table
        );
        let mut stmt = conn.prepare(sql)?;
        stmt.bind((1, session_id))?;
        let mut ids = Vec::new();
        while let State::Row = stmt.next()? {
            ids.push(stmt.read::<String, _>(column)?);
        }
        Ok(ids)
    }
}

/// Step a write statement to completion
fn run(stmt: &mut Statement<'_>) -> Result<()> {
    while let State::Row = stmt.next()? {}
    Ok(())
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Invalid timestamp '{}'", raw))?
        .with_timezone(&Utc))
}

fn read_u32(stmt: &Statement<'_>, column: &str) -> Result<u32> {
    let value = stmt.read::<i64, _>(column)?;
    u32::try_from(value).map_err(|_| anyhow!("Column {} out of range: {}", column, value))
}

fn read_message(stmt: &Statement<'_>) -> Result<TurnMessage> {
    Ok(TurnMessage {
        id: stmt.read::<String, _>("id")?,
        session_id: stmt.read::<String, _>("session_id")?,
        participant_id: stmt.read::<String, _>("participant_id")?,
        round: read_u32(stmt, "round")?,
        turn: read_u32(stmt, "turn")?,
        content: stmt.read::<String, _>("content")?,
        word_count: stmt.read::<i64, _>("word_count")? as usize,
        timestamp: parse_time(&stmt.read::<String, _>("timestamp")?)?,
    })
}

fn read_score(stmt: &Statement<'_>) -> Result<JudgeScore> {
    Ok(JudgeScore {
        id: stmt.read::<String, _>("id")?,
        session_id: stmt.read::<String, _>("session_id")?,
        judge_id: stmt.read::<String, _>("judge_id")?,
        participant_id: stmt.read::<String, _>("participant_id")?,
        criteria: stmt.read::<String, _>("criteria")?,
        score: read_u32(stmt, "score")?,
        max_score: read_u32(stmt, "max_score")?,
        comments: stmt.read::<Option<String>, _>("comments")?.unwrap_or_default(),
        timestamp: parse_time(&stmt.read::<String, _>("timestamp")?)?,
    })
}

fn read_participant(stmt: &Statement<'_>) -> Result<Participant> {
    Ok(Participant {
        id: stmt.read::<String, _>("id")?,
        name: stmt.read::<String, _>("name")?,
        api_config_id: stmt.read::<String, _>("api_config_id")?,
        stance: stmt.read::<String, _>("stance")?.parse()?,
        personality: stmt.read::<String, _>("personality")?,
        instructions: stmt.read::<String, _>("instructions")?,
        is_active: stmt.read::<i64, _>("is_active")? != 0,
    })
}

fn read_judge(stmt: &Statement<'_>) -> Result<Judge> {
    let criteria = stmt.read::<String, _>("criteria")?;
    Ok(Judge {
        id: stmt.read::<String, _>("id")?,
        name: stmt.read::<String, _>("name")?,
        api_config_id: stmt.read::<String, _>("api_config_id")?,
        criteria: serde_json::from_str(&criteria)
            .with_context(|| format!("Invalid criteria list '{}'", criteria))?,
        instructions: stmt.read::<String, _>("instructions")?,
        is_active: stmt.read::<i64, _>("is_active")? != 0,
    })
}

#[async_trait]
impl DebateStore for Database {
    async fn create_session(&self, session: &Session) -> Result<()> {
        let conn = self.lock()?;
        {
            let mut stmt = conn.prepare(
                "INSERT INTO debate_sessions
                    (id, topic, description, max_rounds, max_words_per_turn, status,
                     current_round, current_turn, created_at, updated_at, completed_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            stmt.bind((1, session.id.as_str()))?;
            stmt.bind((2, session.topic.as_str()))?;
            stmt.bind((3, session.description.as_deref()))?;
            stmt.bind((4, session.max_rounds as i64))?;
            stmt.bind((5, session.max_words_per_turn as i64))?;
            stmt.bind((6, session.status.as_str()))?;
            stmt.bind((7, session.current_round as i64))?;
            stmt.bind((8, session.current_turn as i64))?;
            stmt.bind((9, session.created_at.to_rfc3339().as_str()))?;
            stmt.bind((10, session.updated_at.to_rfc3339().as_str()))?;
            let completed_at = session.completed_at.map(|t| t.to_rfc3339());
            stmt.bind((11, completed_at.as_deref()))?;
            run(&mut stmt)?;
        }

        for (position, participant_id) in session.participant_ids.iter().enumerate() {
            let mut stmt = conn.prepare(
                "INSERT INTO session_participants (session_id, participant_id, position) VALUES (?, ?, ?)",
            )?;
            stmt.bind((1, session.id.as_str()))?;
            stmt.bind((2, participant_id.as_str()))?;
            stmt.bind((3, position as i64))?;
            run(&mut stmt)?;
        }

        for (position, judge_id) in session.judge_ids.iter().enumerate() {
            let mut stmt = conn.prepare(
                "INSERT INTO session_judges (session_id, judge_id, position) VALUES (?, ?, ?)",
            )?;
            stmt.bind((1, session.id.as_str()))?;
            stmt.bind((2, judge_id.as_str()))?;
            stmt.bind((3, position as i64))?;
            run(&mut stmt)?;
        }

        debug!("Created session {} on '{}'", session.id, session.topic);
        Ok(())
    }

    async fn load_session(&self, session_id: &str) -> Result<Option<Session>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT * FROM debate_sessions WHERE id = ?")?;
        stmt.bind((1, session_id))?;
        if stmt.next()? != State::Row {
            return Ok(None);
        }

        let completed_at = match stmt.read::<Option<String>, _>("completed_at")? {
            Some(raw) => Some(parse_time(&raw)?),
            None => None,
        };

        Ok(Some(Session {
            id: stmt.read::<String, _>("id")?,
            topic: stmt.read::<String, _>("topic")?,
            description: stmt.read::<Option<String>, _>("description")?,
            participant_ids: Self::linked_ids(&conn, "session_participants", "participant_id", session_id)?,
            judge_ids: Self::linked_ids(&conn, "session_judges", "judge_id", session_id)?,
            max_rounds: read_u32(&stmt, "max_rounds")?,
            max_words_per_turn: stmt.read::<i64, _>("max_words_per_turn")? as usize,
            status: stmt.read::<String, _>("status")?.parse()?,
            current_round: read_u32(&stmt, "current_round")?,
            current_turn: read_u32(&stmt, "current_turn")?,
            created_at: parse_time(&stmt.read::<String, _>("created_at")?)?,
            updated_at: parse_time(&stmt.read::<String, _>("updated_at")?)?,
            completed_at,
        }))
    }

    async fn save_session_status(
        &self,
        session_id: &str,
        status: SessionStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();
        let mut stmt = conn.prepare(
            "UPDATE debate_sessions
             SET status = ?, completed_at = COALESCE(?, completed_at), updated_at = ?
             WHERE id = ?",
        )?;
        let completed_at = completed_at.map(|t| t.to_rfc3339());
        stmt.bind((1, status.as_str()))?;
        stmt.bind((2, completed_at.as_deref()))?;
        stmt.bind((3, now.as_str()))?;
        stmt.bind((4, session_id))?;
        run(&mut stmt)
    }

    async fn save_counters(&self, session_id: &str, round: u32, turn: u32) -> Result<()> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();
        let mut stmt = conn.prepare(
            "UPDATE debate_sessions SET current_round = ?, current_turn = ?, updated_at = ? WHERE id = ?",
        )?;
        stmt.bind((1, round as i64))?;
        stmt.bind((2, turn as i64))?;
        stmt.bind((3, now.as_str()))?;
        stmt.bind((4, session_id))?;
        run(&mut stmt)
    }

    async fn append_message(&self, message: &TurnMessage) -> Result<()> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "INSERT INTO debate_messages
                (id, session_id, participant_id, round, turn, content, word_count, timestamp)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )?;
        stmt.bind((1, message.id.as_str()))?;
        stmt.bind((2, message.session_id.as_str()))?;
        stmt.bind((3, message.participant_id.as_str()))?;
        stmt.bind((4, message.round as i64))?;
        stmt.bind((5, message.turn as i64))?;
        stmt.bind((6, message.content.as_str()))?;
        stmt.bind((7, message.word_count as i64))?;
        stmt.bind((8, message.timestamp.to_rfc3339().as_str()))?;
        run(&mut stmt)
    }

    async fn load_messages(
        &self,
        session_id: &str,
        before_round: Option<u32>,
    ) -> Result<Vec<TurnMessage>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM debate_messages
             WHERE session_id = ? AND round < ?
             ORDER BY round, turn",
        )?;
        stmt.bind((1, session_id))?;
        stmt.bind((2, before_round.map(i64::from).unwrap_or(i64::MAX)))?;

        let mut messages = Vec::new();
        while let State::Row = stmt.next()? {
            messages.push(read_message(&stmt)?);
        }
        Ok(messages)
    }

    async fn append_score(&self, score: &JudgeScore) -> Result<()> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "INSERT INTO judge_scores
                (id, session_id, judge_id, participant_id, criteria, score, max_score, comments, timestamp, seq)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?,
                     (SELECT COALESCE(MAX(seq), 0) + 1 FROM judge_scores WHERE session_id = ?))",
        )?;
        stmt.bind((1, score.id.as_str()))?;
        stmt.bind((2, score.session_id.as_str()))?;
        stmt.bind((3, score.judge_id.as_str()))?;
        stmt.bind((4, score.participant_id.as_str()))?;
        stmt.bind((5, score.criteria.as_str()))?;
        stmt.bind((6, score.score as i64))?;
        stmt.bind((7, score.max_score as i64))?;
        stmt.bind((8, score.comments.as_str()))?;
        stmt.bind((9, score.timestamp.to_rfc3339().as_str()))?;
        stmt.bind((10, score.session_id.as_str()))?;
        run(&mut stmt)
    }

    async fn load_scores(&self, session_id: &str) -> Result<Vec<JudgeScore>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT * FROM judge_scores WHERE session_id = ? ORDER BY seq")?;
        stmt.bind((1, session_id))?;

        let mut scores = Vec::new();
        while let State::Row = stmt.next()? {
            scores.push(read_score(&stmt)?);
        }
        Ok(scores)
    }

    async fn load_participants(&self, session_id: &str) -> Result<Vec<Participant>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT p.* FROM ai_participants p
             JOIN session_participants sp ON p.id = sp.participant_id
             WHERE sp.session_id = ?
             ORDER BY sp.position",
        )?;
        stmt.bind((1, session_id))?;

        let mut participants = Vec::new();
        while let State::Row = stmt.next()? {
            participants.push(read_participant(&stmt)?);
        }
        Ok(participants)
    }

    async fn load_judges(&self, session_id: &str) -> Result<Vec<Judge>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT j.* FROM judges j
             JOIN session_judges sj ON j.id = sj.judge_id
             WHERE sj.session_id = ?
             ORDER BY sj.position",
        )?;
        stmt.bind((1, session_id))?;

        let mut judges = Vec::new();
        while let State::Row = stmt.next()? {
            judges.push(read_judge(&stmt)?);
        }
        Ok(judges)
    }

    async fn load_credential(&self, config_id: &str) -> Result<Option<ApiConfig>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT * FROM api_configs WHERE id = ?")?;
        stmt.bind((1, config_id))?;
        if stmt.next()? != State::Row {
            return Ok(None);
        }

        let parameters = stmt.read::<String, _>("parameters")?;
        let parameters: ProviderParameters = serde_json::from_str(&parameters)
            .with_context(|| format!("Invalid parameters for api config {}", config_id))?;

        Ok(Some(ApiConfig {
            id: stmt.read::<String, _>("id")?,
            name: stmt.read::<String, _>("name")?,
            provider: stmt
                .read::<String, _>("provider")?
                .parse()
                .map_err(|e| anyhow!("{}", e))?,
            api_key: stmt.read::<String, _>("api_key")?,
            base_url: stmt.read::<Option<String>, _>("base_url")?,
            model: stmt.read::<String, _>("model")?,
            parameters,
            is_active: stmt.read::<i64, _>("is_active")? != 0,
            created_at: parse_time(&stmt.read::<String, _>("created_at")?)?,
            updated_at: parse_time(&stmt.read::<String, _>("updated_at")?)?,
        }))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::Stance;
    use crate::features::providers::{test_config, ProviderKind};

    pub(crate) fn participant(id: &str, stance: Stance) -> Participant {
        Participant {
            id: id.to_string(),
            name: format!("Debater {}", id),
            api_config_id: "cfg".to_string(),
            stance,
            personality: "Calm and precise".to_string(),
            instructions: "Cite evidence".to_string(),
            is_active: true,
        }
    }

    pub(crate) fn judge(id: &str, criteria: &[&str]) -> Judge {
        Judge {
            id: id.to_string(),
            name: format!("Judge {}", id),
            api_config_id: "cfg".to_string(),
            criteria: criteria.iter().map(|c| c.to_string()).collect(),
            instructions: "Be fair".to_string(),
            is_active: true,
        }
    }

    pub(crate) fn message(session_id: &str, participant_id: &str, round: u32, turn: u32) -> TurnMessage {
        TurnMessage {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            participant_id: participant_id.to_string(),
            round,
            turn,
            content: format!("argument {}-{}", round, turn),
            word_count: 2,
            timestamp: Utc::now(),
        }
    }

    /// In-memory store seeded with one config, a pro/con pair and one judge
    pub(crate) async fn seeded() -> (Database, Session) {
        let db = Database::new(":memory:").await.unwrap();
        db.upsert_api_config(&test_config("cfg", ProviderKind::OpenAi)).await.unwrap();
        db.upsert_participant(&participant("p1", Stance::Pro)).await.unwrap();
        db.upsert_participant(&participant("p2", Stance::Con)).await.unwrap();
        db.upsert_judge(&judge("j1", &["clarity"])).await.unwrap();

        let session = Session::new(
            "Should cities ban cars?",
            Some("Urban policy".to_string()),
            vec!["p1".to_string(), "p2".to_string()],
            vec!["j1".to_string()],
            2,
            100,
        );
        db.create_session(&session).await.unwrap();
        (db, session)
    }

    /// Store whose message writes always fail; everything else hits the real database
    pub(crate) struct FailingAppend(pub(crate) Database);

    #[async_trait]
    impl DebateStore for FailingAppend {
        async fn create_session(&self, session: &Session) -> Result<()> {
            self.0.create_session(session).await
        }

        async fn load_session(&self, session_id: &str) -> Result<Option<Session>> {
            self.0.load_session(session_id).await
        }

        async fn save_session_status(
            &self,
            session_id: &str,
            status: SessionStatus,
            completed_at: Option<DateTime<Utc>>,
        ) -> Result<()> {
            self.0.save_session_status(session_id, status, completed_at).await
        }

        async fn save_counters(&self, session_id: &str, round: u32, turn: u32) -> Result<()> {
            self.0.save_counters(session_id, round, turn).await
        }

        async fn append_message(&self, _message: &TurnMessage) -> Result<()> {
            Err(anyhow!("disk full"))
        }

        async fn load_messages(
            &self,
            session_id: &str,
            before_round: Option<u32>,
        ) -> Result<Vec<TurnMessage>> {
            self.0.load_messages(session_id, before_round).await
        }

        async fn append_score(&self, score: &JudgeScore) -> Result<()> {
            self.0.append_score(score).await
        }

        async fn load_scores(&self, session_id: &str) -> Result<Vec<JudgeScore>> {
            self.0.load_scores(session_id).await
        }

        async fn load_participants(&self, session_id: &str) -> Result<Vec<Participant>> {
            self.0.load_participants(session_id).await
        }

        async fn load_judges(&self, session_id: &str) -> Result<Vec<Judge>> {
            self.0.load_judges(session_id).await
        }

        async fn load_credential(&self, config_id: &str) -> Result<Option<ApiConfig>> {
            self.0.load_credential(config_id).await
        }
    }

    #[tokio::test]
    async fn test_session_roundtrip() {
        let (db, session) = seeded().await;
        let loaded = db.load_session(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.topic, session.topic);
        assert_eq!(loaded.description, session.description);
        assert_eq!(loaded.participant_ids, vec!["p1", "p2"]);
        assert_eq!(loaded.judge_ids, vec!["j1"]);
        assert_eq!(loaded.status, SessionStatus::Created);
        assert!(db.load_session("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_status_and_counters() {
        let (db, session) = seeded().await;
        db.save_counters(&session.id, 2, 1).await.unwrap();
        let done = Utc::now();
        db.save_session_status(&session.id, SessionStatus::Completed, Some(done))
            .await
            .unwrap();

        let loaded = db.load_session(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.current_round, 2);
        assert_eq!(loaded.current_turn, 1);
        assert_eq!(loaded.status, SessionStatus::Completed);
        assert!(loaded.completed_at.is_some());

        // A later status write without a timestamp keeps the completion time
        db.save_session_status(&session.id, SessionStatus::Completed, None)
            .await
            .unwrap();
        let reloaded = db.load_session(&session.id).await.unwrap().unwrap();
        assert_eq!(reloaded.completed_at, loaded.completed_at);
    }

    #[tokio::test]
    async fn test_messages_ordered_and_filtered() {
        let (db, session) = seeded().await;
        for (round, turn, pid) in [(2, 1, "p1"), (1, 2, "p2"), (1, 1, "p1"), (2, 2, "p2")] {
            db.append_message(&message(&session.id, pid, round, turn)).await.unwrap();
        }

        let all = db.load_messages(&session.id, None).await.unwrap();
        let slots: Vec<(u32, u32)> = all.iter().map(|m| (m.round, m.turn)).collect();
        assert_eq!(slots, vec![(1, 1), (1, 2), (2, 1), (2, 2)]);

        let before_two = db.load_messages(&session.id, Some(2)).await.unwrap();
        assert_eq!(before_two.len(), 2);
        assert!(before_two.iter().all(|m| m.round == 1));
    }

    #[tokio::test]
    async fn test_duplicate_slot_rejected() {
        let (db, session) = seeded().await;
        db.append_message(&message(&session.id, "p1", 1, 1)).await.unwrap();
        assert!(db.append_message(&message(&session.id, "p2", 1, 1)).await.is_err());
    }

    #[tokio::test]
    async fn test_participants_keep_session_order() {
        let db = Database::new(":memory:").await.unwrap();
        for (id, stance) in [("a", Stance::Pro), ("b", Stance::Con), ("c", Stance::Pro)] {
            db.upsert_participant(&participant(id, stance)).await.unwrap();
        }
        let session = Session::new(
            "Order",
            None,
            vec!["c".into(), "a".into(), "b".into()],
            vec![],
            1,
            50,
        );
        db.create_session(&session).await.unwrap();

        let ids: Vec<String> = db
            .load_participants(&session.id)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_scores_in_insertion_order() {
        let (db, session) = seeded().await;
        for (pid, value) in [("p2", 7), ("p1", 9)] {
            db.append_score(&JudgeScore {
                id: uuid::Uuid::new_v4().to_string(),
                session_id: session.id.clone(),
                judge_id: "j1".into(),
                participant_id: pid.into(),
                criteria: "clarity".into(),
                score: value,
                max_score: 10,
                comments: "ok".into(),
                timestamp: Utc::now(),
            })
            .await
            .unwrap();
        }
        let scores = db.load_scores(&session.id).await.unwrap();
        let values: Vec<u32> = scores.iter().map(|s| s.score).collect();
        assert_eq!(values, vec![7, 9]);
    }

    #[tokio::test]
    async fn test_credential_and_judge_roundtrip() {
        let (db, session) = seeded().await;
        let config = db.load_credential("cfg").await.unwrap().unwrap();
        assert_eq!(config.provider, ProviderKind::OpenAi);
        assert_eq!(config.model, "test-model");
        assert!(db.load_credential("nope").await.unwrap().is_none());

        let judges = db.load_judges(&session.id).await.unwrap();
        assert_eq!(judges.len(), 1);
        assert_eq!(judges[0].criteria, vec!["clarity"]);
    }
}
