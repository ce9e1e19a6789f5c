//! # Debate Controller
//!
//! Session registry and the caller-facing API. Engine events are forwarded
//! to observers here.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.4.0

use dashmap::DashMap;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::engine::{DebateEngine, EngineEvent};
use crate::core::{DebateError, DebateResult, JudgeScore, Session, SessionStatus, TurnMessage};
use crate::database::DebateStore;
use crate::features::export::render_markdown;
use crate::features::judging::compute_result;
use crate::features::providers::ProviderFactory;
use crate::ipc::{Broadcaster, ObserverEvent};

/// Validated input for a new session
#[derive(Debug, Clone)]
pub struct NewSession {
    pub topic: String,
    pub description: Option<String>,
    pub participant_ids: Vec<String>,
    pub judge_ids: Vec<String>,
    pub max_rounds: u32,
    pub max_words_per_turn: usize,
}

/// Owns the session -> engine registry. At most one engine per session id
/// lives in it; terminal sessions are dropped from it.
#[derive(Clone)]
pub struct DebateController {
    store: Arc<dyn DebateStore>,
    factory: Arc<dyn ProviderFactory>,
    broadcaster: Arc<Broadcaster>,
    engines: Arc<DashMap<String, Arc<DebateEngine>>>,
    events: mpsc::UnboundedSender<EngineEvent>,
    turn_delay: Duration,
}

impl DebateController {
    /// Must be called inside a tokio runtime; spawns the event pump.
    pub fn new(
        store: Arc<dyn DebateStore>,
        factory: Arc<dyn ProviderFactory>,
        broadcaster: Arc<Broadcaster>,
        turn_delay: Duration,
    ) -> Self {
        let (events, rx) = mpsc::unbounded_channel();
        let engines = Arc::new(DashMap::new());
        tokio::spawn(pump_events(rx, broadcaster.clone(), engines.clone()));

        Self {
            store,
            factory,
            broadcaster,
            engines,
            events,
            turn_delay,
        }
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    pub fn active_sessions(&self) -> usize {
        self.engines.len()
    }

    pub async fn create_session(&self, request: NewSession) -> Result<Session, DebateError> {
        if request.topic.trim().is_empty() {
            return Err(DebateError::Configuration("topic must not be empty".into()));
        }
        if request.participant_ids.is_empty() {
            return Err(DebateError::Configuration(
                "a debate needs at least one participant".into(),
            ));
        }
        if request.max_rounds == 0 || request.max_words_per_turn == 0 {
            return Err(DebateError::Configuration(
                "max_rounds and max_words_per_turn must be at least 1".into(),
            ));
        }

        let session = Session::new(
            request.topic.trim(),
            request.description,
            request.participant_ids,
            request.judge_ids,
            request.max_rounds,
            request.max_words_per_turn,
        );
        self.store.create_session(&session).await?;
        info!("Created session {} on '{}'", session.id, session.topic);
        Ok(session)
    }

    /// Start a created session or resume a paused one
    pub async fn start(&self, session_id: &str) -> Result<Session, DebateError> {
        let engine = self.engine_for(session_id).await?;
        match engine.start().await {
            Ok(_) => Ok(engine.snapshot().await),
            Err(e) => {
                if engine.snapshot().await.status.is_terminal() {
                    self.engines
                        .remove_if(session_id, |_, current| Arc::ptr_eq(current, &engine));
                }
                Err(e)
            }
        }
    }

    pub async fn pause(&self, session_id: &str) -> Result<Session, DebateError> {
        let engine = match self.engines.get(session_id) {
            Some(engine) => engine.clone(),
            None => return Err(self.not_running(session_id, "pause").await),
        };
        engine.pause().await?;
        Ok(engine.snapshot().await)
    }

    /// Force completion; judges the debate before returning
    pub async fn stop(&self, session_id: &str) -> Result<DebateResult, DebateError> {
        let engine = self.engine_for(session_id).await?;
        let result = engine.stop().await;
        self.engines
            .remove_if(session_id, |_, current| Arc::ptr_eq(current, &engine));
        result
    }

    /// Live snapshot if an engine holds the session, otherwise the stored one
    pub async fn status(&self, session_id: &str) -> Result<Session, DebateError> {
        let engine = self.engines.get(session_id).map(|e| e.clone());
        match engine {
            Some(engine) => Ok(engine.snapshot().await),
            None => self.load_session(session_id).await,
        }
    }

    pub async fn messages(&self, session_id: &str) -> Result<Vec<TurnMessage>, DebateError> {
        self.load_session(session_id).await?;
        Ok(self.store.load_messages(session_id, None).await?)
    }

    pub async fn scores(&self, session_id: &str) -> Result<Vec<JudgeScore>, DebateError> {
        self.load_session(session_id).await?;
        Ok(self.store.load_scores(session_id).await?)
    }

    /// Recompute the verdict from stored scores
    pub async fn result(&self, session_id: &str) -> Result<DebateResult, DebateError> {
        self.load_session(session_id).await?;
        let scores = self.store.load_scores(session_id).await?;
        let participants = self.store.load_participants(session_id).await?;
        Ok(compute_result(session_id, scores, &participants))
    }

    pub async fn export(&self, session_id: &str) -> Result<String, DebateError> {
        let session = self.status(session_id).await?;
        let participants = self.store.load_participants(session_id).await?;
        let judges = self.store.load_judges(session_id).await?;
        let messages = self.store.load_messages(session_id, None).await?;
        let scores = self.store.load_scores(session_id).await?;
        Ok(render_markdown(&session, &participants, &judges, &messages, &scores))
    }

    /// Registered engine for the session, initializing and registering one if needed
    async fn engine_for(&self, session_id: &str) -> Result<Arc<DebateEngine>, DebateError> {
        if let Some(engine) = self.engines.get(session_id) {
            return Ok(engine.clone());
        }

        let engine = Arc::new(
            DebateEngine::initialize(
                session_id,
                self.store.clone(),
                self.factory.as_ref(),
                self.events.clone(),
                self.turn_delay,
            )
            .await?,
        );
        // A concurrent caller may have registered one first; theirs wins
        let registered = self
            .engines
            .entry(session_id.to_string())
            .or_insert(engine)
            .clone();
        Ok(registered)
    }

    async fn load_session(&self, session_id: &str) -> Result<Session, DebateError> {
        self.store
            .load_session(session_id)
            .await?
            .ok_or_else(|| DebateError::SessionNotFound(session_id.to_string()))
    }

    async fn not_running(&self, session_id: &str, operation: &'static str) -> DebateError {
        match self.load_session(session_id).await {
            Ok(session) => DebateError::EngineState {
                session_id: session.id,
                status: session.status,
                operation,
            },
            Err(e) => e,
        }
    }
}

/// Forward engine events to observers and retire finished engines
async fn pump_events(
    mut rx: mpsc::UnboundedReceiver<EngineEvent>,
    broadcaster: Arc<Broadcaster>,
    engines: Arc<DashMap<String, Arc<DebateEngine>>>,
) {
    while let Some(event) = rx.recv().await {
        let (session_id, retire) = match &event {
            EngineEvent::StatusChanged { session_id, status, .. } => {
                (session_id.clone(), *status == SessionStatus::Cancelled)
            }
            EngineEvent::TurnGenerated { session_id, .. } => (session_id.clone(), false),
            // Judging is done, nothing left for the engine to do
            EngineEvent::DebateCompleted { session_id, .. } => (session_id.clone(), true),
            EngineEvent::Error { session_id, error } => {
                warn!("Session {} reported error: {}", session_id, error);
                (session_id.clone(), false)
            }
        };

        for observed in observer_events(event) {
            broadcaster.publish(&session_id, &observed);
        }
        if retire {
            engines.remove(&session_id);
            debug!("Retired engine for session {}", session_id);
        }
    }
}

/// Wire events for one engine event, in publish order
fn observer_events(event: EngineEvent) -> Vec<ObserverEvent> {
    match event {
        EngineEvent::StatusChanged {
            session_id,
            status,
            current_round,
            current_turn,
        } => vec![
            ObserverEvent::SessionStatus {
                session_id: session_id.clone(),
                status,
            },
            ObserverEvent::DebateUpdate {
                session_id,
                status,
                current_round,
                current_turn,
                message: None,
            },
        ],
        EngineEvent::TurnGenerated {
            session_id,
            status,
            message,
        } => vec![
            ObserverEvent::NewMessage {
                session_id: session_id.clone(),
                round: message.round,
                turn: message.turn,
                message: message.clone(),
            },
            ObserverEvent::DebateUpdate {
                session_id,
                status,
                current_round: message.round,
                current_turn: message.turn,
                message: Some(message),
            },
        ],
        EngineEvent::DebateCompleted { session_id, result } => vec![ObserverEvent::DebateCompleted {
            session_id,
            winner: result.winner,
            totals: result.totals,
            summary: result.summary,
        }],
        EngineEvent::Error { session_id, error } => {
            vec![ObserverEvent::error(Some(&session_id), error)]
        }
    }
}
