//! # Turn Scheduler
//!
//! Round-robin over active participants, round by round.

use log::{debug, error, warn};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::Utc;

use super::context::build_context;
use super::engine::{DebateEngine, EngineEvent, Slot};
use super::prompt::render_turn_prompt;
use crate::core::{count_words, enforce_word_limit, DebateError, Participant, Session, TurnMessage};

impl DebateEngine {
    /// Body of the spawned scheduler task for one run epoch
    pub(super) async fn run(self: Arc<Self>, epoch: u64, from: Slot) {
        let session = self.snapshot().await;
        let active = self.active_participants();

        match self.drive(epoch, &session, &active, from).await {
            Ok(true) => self.complete(epoch).await,
            Ok(false) => debug!("Session {}: run {} halted", session.id, epoch),
            Err(e) => self.cancel(epoch, &e).await,
        }
    }

    /// Returns whether the loop ran out of rounds while this run was still current
    async fn drive(
        &self,
        epoch: u64,
        session: &Session,
        active: &[Participant],
        from: Slot,
    ) -> Result<bool, DebateError> {
        for round in from.round..=session.max_rounds {
            if !self.is_current(epoch) {
                return Ok(false);
            }
            let first = if round == from.round { from.turn } else { 1 };

            for (index, participant) in active.iter().enumerate() {
                let turn = index as u32 + 1;
                if turn < first {
                    continue;
                }
                if !self.record_position(epoch, round, turn).await? {
                    return Ok(false);
                }

                let produced = self.take_turn(epoch, session, participant, round, turn).await?;
                if produced && !self.turn_delay.is_zero() {
                    tokio::time::sleep(self.turn_delay).await;
                }
            }
        }
        Ok(self.is_current(epoch))
    }

    /// Persist the counters for the slot about to run; false if this run was superseded
    async fn record_position(&self, epoch: u64, round: u32, turn: u32) -> Result<bool, DebateError> {
        let mut session = self.session.lock().await;
        if !self.is_current(epoch) {
            return Ok(false);
        }
        self.store.save_counters(&session.id, round, turn).await?;
        session.current_round = round;
        session.current_turn = turn;
        Ok(true)
    }

    /// Generate, trim and store one participant's turn.
    ///
    /// Provider and credential failures skip the slot and return `Ok(false)`.
    /// Store failures are internal errors and end the run.
    async fn take_turn(
        &self,
        epoch: u64,
        session: &Session,
        participant: &Participant,
        round: u32,
        turn: u32,
    ) -> Result<bool, DebateError> {
        let Some(provider) = self.providers.get(&participant.api_config_id) else {
            warn!(
                "Session {}: no provider for {} (config {}), skipping round {} turn {}",
                session.id, participant.name, participant.api_config_id, round, turn
            );
            return Ok(false);
        };

        let context =
            build_context(self.store.as_ref(), &session.id, &session.topic, round, &self.participants)
                .await?;
        let prompt = render_turn_prompt(participant, session, round, &context);

        let response = match provider.generate(&prompt, None).await {
            Ok(response) => response,
            Err(e) => {
                error!(
                    "Session {}: {} failed on round {} turn {}: {}",
                    session.id, participant.name, round, turn, e
                );
                return Ok(false);
            }
        };

        let content = enforce_word_limit(&response.content, session.max_words_per_turn);
        let message = TurnMessage {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session.id.clone(),
            participant_id: participant.id.clone(),
            round,
            turn,
            word_count: count_words(&content),
            content,
            timestamp: Utc::now(),
        };

        let status = {
            let current = self.session.lock().await;
            if self.epoch.load(Ordering::SeqCst) != epoch {
                debug!(
                    "Session {}: dropping late turn {}/{} from a superseded run",
                    session.id, round, turn
                );
                return Ok(false);
            }
            self.store.append_message(&message).await?;
            current.status
        };

        debug!(
            "Session {}: {} spoke in round {} turn {} ({} words)",
            session.id, participant.name, round, turn, message.word_count
        );
        let _ = self.events.send(EngineEvent::TurnGenerated {
            session_id: session.id.clone(),
            status,
            message,
        });
        Ok(true)
    }
}
