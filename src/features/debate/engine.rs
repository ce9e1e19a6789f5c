//! # Debate Engine
//!
//! Per-session state machine around the turn scheduler: start, resume,
//! pause, stop, natural completion and cancellation on internal failure.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.2.0
//!
//! ## Changelog
//! - 1.1.0: Run epochs so superseded scheduler tasks drop late turns
//! - 1.0.0: Initial lifecycle with judge-once completion

use log::{debug, error, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::core::{
    DebateError, DebateResult, Judge, Participant, Session, SessionStatus, TurnMessage,
};
use crate::database::DebateStore;
use crate::features::judging::{compute_result, JudgingCoordinator};
use crate::features::providers::{AgentProvider, ProviderFactory};

/// Outbound notifications from a running engine
#[derive(Debug, Clone)]
pub enum EngineEvent {
    StatusChanged {
        session_id: String,
        status: SessionStatus,
        current_round: u32,
        current_turn: u32,
    },
    TurnGenerated {
        session_id: String,
        /// Status at the moment the turn was stored; a late turn may land while paused
        status: SessionStatus,
        message: TurnMessage,
    },
    DebateCompleted {
        session_id: String,
        result: DebateResult,
    },
    Error {
        session_id: String,
        error: String,
    },
}

/// Position of the next turn to generate, both 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub round: u32,
    pub turn: u32,
}

/// Owns one session's lifecycle.
///
/// Every status change and counter write happens under the `session` lock,
/// so control operations and the scheduler never interleave their writes.
/// Each `start` opens a new run epoch; a scheduler task whose epoch is no
/// longer current stops at its next check and drops any late result.
pub struct DebateEngine {
    pub(super) session: Mutex<Session>,
    pub(super) participants: Vec<Participant>,
    pub(super) judges: Vec<Judge>,
    /// Keyed by api config id
    pub(super) providers: HashMap<String, Arc<dyn AgentProvider>>,
    pub(super) store: Arc<dyn DebateStore>,
    pub(super) events: mpsc::UnboundedSender<EngineEvent>,
    pub(super) running: AtomicBool,
    pub(super) epoch: AtomicU64,
    judged: AtomicBool,
    pub(super) turn_delay: Duration,
}

impl DebateEngine {
    /// Load the session, its participants, judges and their credentials.
    ///
    /// A credential that is missing or cannot build a provider is logged and
    /// tolerated here; the affected turns or scores are skipped later.
    pub async fn initialize(
        session_id: &str,
        store: Arc<dyn DebateStore>,
        factory: &dyn ProviderFactory,
        events: mpsc::UnboundedSender<EngineEvent>,
        turn_delay: Duration,
    ) -> Result<Self, DebateError> {
        let session = store
            .load_session(session_id)
            .await?
            .ok_or_else(|| DebateError::SessionNotFound(session_id.to_string()))?;
        let participants = store.load_participants(session_id).await?;
        let judges = store.load_judges(session_id).await?;

        let config_ids: HashSet<&str> = participants
            .iter()
            .filter(|p| p.is_active)
            .map(|p| p.api_config_id.as_str())
            .chain(
                judges
                    .iter()
                    .filter(|j| j.is_active)
                    .map(|j| j.api_config_id.as_str()),
            )
            .collect();

        let mut providers = HashMap::new();
        for config_id in config_ids {
            match store.load_credential(config_id).await? {
                Some(config) => match factory.create(&config) {
                    Ok(provider) => {
                        providers.insert(config_id.to_string(), provider);
                    }
                    Err(e) => warn!("Session {}: provider {} unusable: {}", session_id, config_id, e),
                },
                None => warn!("Session {}: api config {} not found", session_id, config_id),
            }
        }

        info!(
            "Initialized engine for session {} ({} participants, {} judges, {} providers)",
            session_id,
            participants.len(),
            judges.len(),
            providers.len()
        );

        Ok(Self {
            judged: AtomicBool::new(session.status == SessionStatus::Completed),
            session: Mutex::new(session),
            participants,
            judges,
            providers,
            store,
            events,
            running: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            turn_delay,
        })
    }

    pub async fn snapshot(&self) -> Session {
        self.session.lock().await.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Participants that take turns, in configured order
    pub fn active_participants(&self) -> Vec<Participant> {
        self.participants.iter().filter(|p| p.is_active).cloned().collect()
    }

    /// Start or resume the debate and spawn its scheduler task
    pub async fn start(self: &Arc<Self>) -> Result<JoinHandle<()>, DebateError> {
        let mut session = self.session.lock().await;
        if !session.status.can_transition_to(SessionStatus::Running) {
            return Err(illegal(&session, "start"));
        }

        let from = self.resume_point(&session).await?;
        self.store
            .save_session_status(&session.id, SessionStatus::Running, None)
            .await?;
        session.status = SessionStatus::Running;
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.running.store(true, Ordering::SeqCst);
        self.emit_status(&session);

        info!(
            "Session {} running from round {} turn {}",
            session.id, from.round, from.turn
        );
        drop(session);

        let engine = Arc::clone(self);
        Ok(tokio::spawn(async move { engine.run(epoch, from).await }))
    }

    /// Stop scheduling new turns. An in-flight provider call may still land.
    pub async fn pause(&self) -> Result<(), DebateError> {
        let mut session = self.session.lock().await;
        if session.status != SessionStatus::Running {
            return Err(illegal(&session, "pause"));
        }

        self.store
            .save_session_status(&session.id, SessionStatus::Paused, None)
            .await?;
        self.running.store(false, Ordering::SeqCst);
        session.status = SessionStatus::Paused;
        self.emit_status(&session);
        info!("Session {} paused at round {}", session.id, session.current_round);
        Ok(())
    }

    /// Force completion and run the judging phase before returning
    pub async fn stop(&self) -> Result<DebateResult, DebateError> {
        {
            let mut session = self.session.lock().await;
            if !matches!(session.status, SessionStatus::Running | SessionStatus::Paused) {
                return Err(illegal(&session, "stop"));
            }
            self.mark_completed(&mut session).await?;
            info!("Session {} stopped", session.id);
        }
        self.run_judging().await
    }

    /// Natural end of a run: same end state as `stop`, if this run is still current
    pub(super) async fn complete(&self, epoch: u64) {
        {
            let mut session = self.session.lock().await;
            if !self.is_current(epoch) {
                return;
            }
            if let Err(e) = self.mark_completed(&mut session).await {
                error!("Session {}: failed to record completion: {}", session.id, e);
                drop(session);
                self.cancel(epoch, &e).await;
                return;
            }
            info!("Session {} completed all rounds", session.id);
        }
        if let Err(e) = self.run_judging().await {
            error!("Judging failed: {}", e);
        }
    }

    /// Terminate the run after an internal failure
    pub(super) async fn cancel(&self, epoch: u64, cause: &DebateError) {
        let mut session = self.session.lock().await;
        if self.epoch.load(Ordering::SeqCst) != epoch
            || !session.status.can_transition_to(SessionStatus::Cancelled)
        {
            return;
        }

        error!("Session {} cancelled: {}", session.id, cause);
        self.running.store(false, Ordering::SeqCst);
        self.epoch.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self
            .store
            .save_session_status(&session.id, SessionStatus::Cancelled, None)
            .await
        {
            error!("Session {}: failed to persist cancellation: {}", session.id, e);
        }
        session.status = SessionStatus::Cancelled;

        let _ = self.events.send(EngineEvent::Error {
            session_id: session.id.clone(),
            error: cause.to_string(),
        });
        self.emit_status(&session);
    }

    async fn mark_completed(&self, session: &mut Session) -> Result<(), DebateError> {
        let now = Utc::now();
        self.store
            .save_session_status(&session.id, SessionStatus::Completed, Some(now))
            .await?;
        self.running.store(false, Ordering::SeqCst);
        self.epoch.fetch_add(1, Ordering::SeqCst);
        session.status = SessionStatus::Completed;
        session.completed_at = Some(now);
        self.emit_status(session);
        Ok(())
    }

    /// Score the debate once; later calls recompute from stored scores
    async fn run_judging(&self) -> Result<DebateResult, DebateError> {
        let session = self.snapshot().await;
        if self
            .judged
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Session {} already judged", session.id);
            let scores = self.store.load_scores(&session.id).await?;
            return Ok(compute_result(&session.id, scores, &self.participants));
        }

        let result = JudgingCoordinator::new(self.store.as_ref(), &self.providers)
            .run(&session, &self.judges, &self.participants)
            .await;
        let _ = self.events.send(EngineEvent::DebateCompleted {
            session_id: session.id.clone(),
            result: result.clone(),
        });
        Ok(result)
    }

    /// Where a run picks up: the persisted slot, unless it already produced a message
    async fn resume_point(&self, session: &Session) -> Result<Slot, DebateError> {
        if session.current_round == 0 {
            return Ok(Slot { round: 1, turn: 1 });
        }

        let slot = Slot {
            round: session.current_round,
            turn: session.current_turn.max(1),
        };
        let done = self
            .store
            .load_messages(&session.id, Some(slot.round + 1))
            .await?
            .iter()
            .any(|m| m.round == slot.round && m.turn == slot.turn);
        if !done {
            return Ok(slot);
        }

        let turns = self.active_participants().len() as u32;
        Ok(if slot.turn >= turns {
            Slot { round: slot.round + 1, turn: 1 }
        } else {
            Slot { round: slot.round, turn: slot.turn + 1 }
        })
    }

    pub(super) fn is_current(&self, epoch: u64) -> bool {
        self.running.load(Ordering::SeqCst) && self.epoch.load(Ordering::SeqCst) == epoch
    }

    pub(super) fn emit_status(&self, session: &Session) {
        let _ = self.events.send(EngineEvent::StatusChanged {
            session_id: session.id.clone(),
            status: session.status,
            current_round: session.current_round,
            current_turn: session.current_turn,
        });
    }
}

fn illegal(session: &Session, operation: &'static str) -> DebateError {
    DebateError::EngineState {
        session_id: session.id.clone(),
        status: session.status,
        operation,
    }
}
