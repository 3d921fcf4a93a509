//! Chat session runtime executor

use super::traits::{Renderer, ScheduleStore};

use crate::render::{BotMessage, Fragment};
use crate::state_machine::{transition, ChatState, Effect, Event, Session, SessionContext, TransitionError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Single writer for one session's state
///
/// Frames from the client and fired timers both arrive on `event_rx`, so a
/// step always runs to completion before the next event is looked at.
pub struct SessionRuntime<S, R>
where
    S: ScheduleStore + ?Sized + 'static,
    R: Renderer + ?Sized + 'static,
{
    context: SessionContext,
    session: Session,
    store: Arc<S>,
    renderer: Arc<R>,
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    outbound_tx: mpsc::Sender<String>,
    /// Cancelled when the connection closes; stops timers and the loop
    cancel: CancellationToken,
}

impl<S, R> SessionRuntime<S, R>
where
    S: ScheduleStore + ?Sized + 'static,
    R: Renderer + ?Sized + 'static,
{
    pub fn new(
        context: SessionContext,
        store: Arc<S>,
        renderer: Arc<R>,
        event_rx: mpsc::Receiver<Event>,
        event_tx: mpsc::Sender<Event>,
        outbound_tx: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            context,
            session: Session::new(),
            store,
            renderer,
            event_rx,
            event_tx,
            outbound_tx,
            cancel,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(session_id = %self.context.session_id, "Starting chat session");

        self.process_event(Event::Connected).await;

        // Process events in a loop - no recursion
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                event = self.event_rx.recv() => match event {
                    Some(event) => self.process_event(event).await,
                    None => break,
                },
            }
        }

        // Pending timers must not outlive the session
        self.cancel.cancel();
        tracing::info!(
            session_id = %self.context.session_id,
            state = %self.session.state,
            "Chat session stopped"
        );
    }

    /// Apply one external event and every event its effects produce, then
    /// flush the collected output in order.
    async fn process_event(&mut self, event: Event) {
        let mut outbox = Vec::new();

        // We need to process events in a loop to handle chained effects
        let mut events_to_process = vec![event];

        while let Some(current_event) = events_to_process.pop() {
            let kind = current_event.kind();
            let store_outcome = current_event.is_store_outcome();

            let result = match transition(&self.session, &self.context, current_event) {
                Ok(r) => r,
                Err(e) => {
                    self.log_rejection(kind, &e);
                    if store_outcome {
                        self.recover(&mut outbox);
                    }
                    continue;
                }
            };

            let old_state = std::mem::replace(&mut self.session, result.session);
            if old_state.state != self.session.state {
                tracing::debug!(
                    session_id = %self.context.session_id,
                    from = %old_state.state,
                    to = %self.session.state,
                    event = kind,
                    "State change"
                );
            }

            for effect in result.effects {
                if let Some(generated_event) = self.execute_effect(effect, &mut outbox).await {
                    events_to_process.push(generated_event);
                }
            }
        }

        self.flush(outbox).await;
    }

    fn log_rejection(&self, kind: &str, error: &TransitionError) {
        match error {
            TransitionError::StaleAdvance { .. } => {
                tracing::debug!(session_id = %self.context.session_id, error = %error, "Dropping stale advance");
            }
            TransitionError::DisplayInProgress => {
                tracing::debug!(
                    session_id = %self.context.session_id,
                    state = %self.session.state,
                    "Ignoring input while a result is on screen"
                );
            }
            TransitionError::InvalidTransition(_) => {
                tracing::warn!(
                    session_id = %self.context.session_id,
                    event = kind,
                    error = %error,
                    "Rejected event"
                );
            }
        }
    }

    /// A store outcome the current state cannot take leaves the dialogue
    /// stuck waiting; put the user back at the menu.
    fn recover(&mut self, outbox: &mut Vec<String>) {
        tracing::warn!(
            session_id = %self.context.session_id,
            state = %self.session.state,
            "Resetting session to menu"
        );
        self.session.state = ChatState::Menu;
        for message in [BotMessage::Recovered, BotMessage::MenuPrompt] {
            outbox.push(self.renderer.render(&Fragment::Message(message)));
        }
    }

    /// Execute an effect and optionally return a generated event
    async fn execute_effect(&mut self, effect: Effect, outbox: &mut Vec<String>) -> Option<Event> {
        match effect {
            Effect::Send(fragment) => {
                tracing::trace!(kind = fragment.kind(), "Rendering fragment");
                outbox.push(self.renderer.render(&fragment));
                None
            }

            Effect::FindCandidates { query } => {
                let event = match self.store.find_subject_candidates(&query).await {
                    Ok(candidates) => {
                        tracing::debug!(query = %query, count = candidates.len(), "Subject candidates");
                        Event::CandidatesFound { query, candidates }
                    }
                    Err(e) => self.query_failed("find_subject_candidates", &e),
                };
                Some(event)
            }

            Effect::LoadFullSchedule { subject } => {
                let event = match self.store.full_schedule(&subject).await {
                    Ok(rows) => Event::ScheduleLoaded { subject, rows },
                    Err(e) => self.query_failed("full_schedule", &e),
                };
                Some(event)
            }

            Effect::LoadTurnRow { subject, turn } => {
                let event = match self.store.schedule_for_turn(&subject, turn.as_str()).await {
                    Ok(row) => Event::TurnRowLoaded { subject, turn, row },
                    Err(e) => self.query_failed("schedule_for_turn", &e),
                };
                Some(event)
            }

            Effect::LoadUpcomingPeriods => {
                let event = match self.store.upcoming_periods().await {
                    Ok(periods) => Event::PeriodsLoaded { periods },
                    Err(e) => self.query_failed("upcoming_periods", &e),
                };
                Some(event)
            }

            Effect::ScheduleAdvance { delay, epoch } => {
                self.schedule_advance(delay, epoch);
                None
            }
        }
    }

    fn query_failed(&self, operation: &str, error: &super::QueryError) -> Event {
        tracing::error!(
            session_id = %self.context.session_id,
            operation,
            error = %error,
            "Schedule lookup failed"
        );
        Event::QueryFailed {
            message: error.to_string(),
        }
    }

    /// The timer only posts an event; whether it still applies is decided
    /// when the session processes it.
    fn schedule_advance(&self, delay: Duration, epoch: u64) {
        let event_tx = self.event_tx.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    let _ = event_tx.send(Event::AdvanceTimeout { epoch }).await;
                }
            }
        });
    }

    async fn flush(&mut self, outbox: Vec<String>) {
        for markup in outbox {
            if self.outbound_tx.send(markup).await.is_err() {
                tracing::debug!(session_id = %self.context.session_id, "Client gone, stopping session");
                self.cancel.cancel();
                return;
            }
        }
    }
}
