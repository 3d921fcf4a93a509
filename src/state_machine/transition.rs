//! Pure state transition function
//!
//! Given the same session and event this always produces the same next
//! session and effects. Store lookups are requested as effects and their
//! outcomes come back as events, so subject resolution spans several
//! transitions that the runtime applies back to back.

use super::state::{ChatState, QueryMode, ResultHandle, Session, SessionContext, TurnLabel};
use super::{Effect, Event};
use crate::db::{ExamRow, TurnPeriod};
use crate::normalize::{loose_eq, normalize_command};
use crate::render::{BotMessage, Fragment};
use thiserror::Error;

const MENU_COMMANDS: &[&str] = &["menu", "menú", "volver", "inicio"];
const HELP_COMMANDS: &[&str] = &["ayuda", "help", "?"];
const GREETINGS: &[&str] = &["hola", "buenas", "buen dia", "buen día"];
const ALL_DATES_OPTIONS: &[&str] = &["1", "a", "todas"];
const TURN_OPTIONS: &[&str] = &["2", "b", "turno"];
const PERIODS_OPTIONS: &[&str] = &["3", "c", "disponible", "turnos"];
const AFFIRMATIVE: &[&str] = &["si", "sí", "s", "yes"];

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub session: Session,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("A result is still on screen, input ignored")]
    DisplayInProgress,
    #[error("Delayed advance {fired} superseded (current {current})")]
    StaleAdvance { fired: u64, current: u64 },
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GlobalCommand {
    Menu,
    Help,
}

fn global_command(text: &str) -> Option<GlobalCommand> {
    let key = normalize_command(text);
    if MENU_COMMANDS.contains(&key.as_str()) {
        Some(GlobalCommand::Menu)
    } else if HELP_COMMANDS.contains(&key.as_str()) {
        Some(GlobalCommand::Help)
    } else {
        None
    }
}

/// Pure transition function
#[allow(clippy::too_many_lines)]
pub fn transition(
    session: &Session,
    context: &SessionContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    // Global commands win over the per-state table
    if let Event::UserInput { text } = &event {
        match global_command(text) {
            Some(GlobalCommand::Menu) => {
                return Ok(enter_menu(session, Some(text.as_str()), vec![]));
            }
            Some(GlobalCommand::Help) if session.state.is_display() => {
                return Err(TransitionError::DisplayInProgress);
            }
            Some(GlobalCommand::Help) => {
                return Ok(enter_menu(
                    session,
                    Some(text.as_str()),
                    vec![Effect::message(BotMessage::Help)],
                ));
            }
            None => {}
        }
    }

    match (&session.state, event) {
        // ============================================================
        // Session start
        // ============================================================
        (ChatState::Idle, Event::Connected) => Ok(enter_menu(session, None, vec![])),

        // A first message without a connect event is a greeting
        (ChatState::Idle, Event::UserInput { text }) => Ok(enter_menu(session, Some(text.as_str()), vec![])),

        // ============================================================
        // Menu
        // ============================================================
        (ChatState::Menu, Event::UserInput { text }) => Ok(menu_choice(session, &text)),

        // ============================================================
        // Turn collection
        // ============================================================
        (ChatState::AwaitingTurn, Event::UserInput { text }) => {
            let next = remember_input(session, &text);
            match TurnLabel::parse_input(&text) {
                Some(turn) => Ok(TransitionResult::new(Session {
                    state: ChatState::AwaitingMateriaTurn { turn: turn.clone() },
                    ..next
                })
                .with_effect(Effect::message(BotMessage::TurnAccepted { turn }))),
                None => Ok(TransitionResult::new(next)
                    .with_effect(Effect::message(BotMessage::InvalidTurn))),
            }
        }

        // ============================================================
        // Subject collection and disambiguation
        // ============================================================
        (
            ChatState::AwaitingMateriaAll
            | ChatState::AwaitingMateriaTurn { .. }
            | ChatState::Disambiguating { .. },
            Event::UserInput { text },
        ) => {
            let query = text.trim().to_string();
            if query.is_empty() {
                return Ok(reprompt_subject(session));
            }
            Ok(TransitionResult::new(remember_input(session, &query))
                .with_effect(Effect::FindCandidates { query }))
        }

        (
            state @ (ChatState::AwaitingMateriaAll
            | ChatState::AwaitingMateriaTurn { .. }
            | ChatState::Disambiguating { .. }),
            Event::CandidatesFound { query, candidates },
        ) => {
            let mode = state
                .query_mode()
                .ok_or_else(|| TransitionError::InvalidTransition(format!("no query mode in {state}")))?;
            Ok(resolve_subject(session, mode, &query, candidates))
        }

        (
            ChatState::AwaitingMateriaAll | ChatState::Disambiguating { mode: QueryMode::AllDates, .. },
            Event::ScheduleLoaded { subject, rows },
        ) => Ok(show_full_schedule(session, context, subject, rows)),

        (
            ChatState::AwaitingMateriaTurn { turn: pending }
            | ChatState::Disambiguating {
                mode: QueryMode::Turn { turn: pending },
                ..
            },
            Event::TurnRowLoaded { subject, turn, row },
        ) if *pending == turn => Ok(show_turn_row(session, context, subject, turn, row)),

        // ============================================================
        // Upcoming periods
        // ============================================================
        (ChatState::ShowingTurns { handle: None }, Event::PeriodsLoaded { periods }) => {
            Ok(show_periods(session, context, periods))
        }

        // ============================================================
        // Store failures
        // ============================================================
        (
            ChatState::AwaitingMateriaAll
            | ChatState::AwaitingMateriaTurn { .. }
            | ChatState::Disambiguating { .. }
            | ChatState::ShowingTurns { handle: None },
            Event::QueryFailed { .. },
        ) => Ok(enter_menu(
            session,
            None,
            vec![Effect::message(BotMessage::QueryError)],
        )),

        // ============================================================
        // Delayed advance out of the display states
        // ============================================================
        (
            ChatState::ShowingResults { handle }
            | ChatState::ShowingTurns {
                handle: Some(handle),
            },
            Event::AdvanceTimeout { epoch },
        ) if epoch == session.advance_epoch => Ok(TransitionResult::new(Session {
            state: ChatState::AwaitingDownload {
                handle: handle.clone(),
            },
            ..session.clone()
        })
        .with_effect(Effect::message(BotMessage::DownloadPrompt))),

        (_, Event::AdvanceTimeout { epoch }) => Err(TransitionError::StaleAdvance {
            fired: epoch,
            current: session.advance_epoch,
        }),

        (ChatState::ShowingResults { .. } | ChatState::ShowingTurns { .. }, Event::UserInput { .. }) => {
            Err(TransitionError::DisplayInProgress)
        }

        // ============================================================
        // Export offer
        // ============================================================
        (ChatState::AwaitingDownload { handle }, Event::UserInput { text }) => {
            let answer = normalize_command(&text);
            let effects = if AFFIRMATIVE.contains(&answer.as_str()) {
                vec![
                    Effect::Send(Fragment::ExportTrigger {
                        handle: handle.clone(),
                    }),
                    Effect::message(BotMessage::Downloading),
                ]
            } else {
                vec![Effect::message(BotMessage::DownloadDeclined)]
            };
            Ok(enter_menu(session, Some(text.as_str()), effects))
        }

        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "{} in {state}",
            event.kind()
        ))),
    }
}

fn remember_input(session: &Session, text: &str) -> Session {
    Session {
        last_input: Some(text.trim().to_string()),
        ..session.clone()
    }
}

/// Entering the menu drops every piece of pending dialogue data and shows
/// the menu after `effects`.
fn enter_menu(session: &Session, input: Option<&str>, effects: Vec<Effect>) -> TransitionResult {
    let mut next = match input {
        Some(text) => remember_input(session, text),
        None => session.clone(),
    };
    next.state = ChatState::Menu;
    TransitionResult::new(next)
        .with_effects(effects)
        .with_effect(Effect::message(BotMessage::MenuPrompt))
}

fn menu_choice(session: &Session, text: &str) -> TransitionResult {
    let key = normalize_command(text);
    let next = remember_input(session, text);

    if key.is_empty() || GREETINGS.contains(&key.as_str()) {
        return TransitionResult::new(next).with_effect(Effect::message(BotMessage::MenuPrompt));
    }

    if ALL_DATES_OPTIONS.contains(&key.as_str()) {
        TransitionResult::new(Session {
            state: ChatState::AwaitingMateriaAll,
            ..next
        })
        .with_effect(Effect::message(BotMessage::AskSubject))
    } else if TURN_OPTIONS.contains(&key.as_str()) {
        TransitionResult::new(Session {
            state: ChatState::AwaitingTurn,
            ..next
        })
        .with_effect(Effect::message(BotMessage::AskTurn))
    } else if PERIODS_OPTIONS.contains(&key.as_str()) {
        TransitionResult::new(Session {
            state: ChatState::ShowingTurns { handle: None },
            ..next
        })
        .with_effect(Effect::LoadUpcomingPeriods)
    } else {
        // Direct subject text: skip the prompt and search with what was typed
        let query = next.last_input.clone().unwrap_or_default();
        TransitionResult::new(Session {
            state: ChatState::AwaitingMateriaAll,
            ..next
        })
        .with_effect(Effect::FindCandidates { query })
    }
}

fn reprompt_subject(session: &Session) -> TransitionResult {
    let effect = match &session.state {
        ChatState::Disambiguating { candidates, .. } => Effect::Send(Fragment::Disambiguation {
            candidates: candidates.clone(),
        }),
        _ => Effect::message(BotMessage::AskSubject),
    };
    TransitionResult::new(session.clone()).with_effect(effect)
}

/// Subject resolution: zero candidates is "not found", one candidate or an
/// exact normalized hit resolves to the store's spelling, anything else asks
/// the user to pick.
fn resolve_subject(
    session: &Session,
    mode: QueryMode,
    query: &str,
    candidates: Vec<String>,
) -> TransitionResult {
    let resolved = match candidates.as_slice() {
        [] => {
            return enter_menu(
                session,
                None,
                vec![Effect::message(BotMessage::SubjectNotFound {
                    query: query.to_string(),
                })],
            );
        }
        [only] => Some(only.clone()),
        many => many.iter().find(|name| loose_eq(name, query)).cloned(),
    };

    match resolved {
        Some(subject) => {
            let effect = match &mode {
                QueryMode::AllDates => Effect::LoadFullSchedule { subject },
                QueryMode::Turn { turn } => Effect::LoadTurnRow {
                    subject,
                    turn: turn.clone(),
                },
            };
            TransitionResult::new(session.clone()).with_effect(effect)
        }
        None => TransitionResult::new(Session {
            state: ChatState::Disambiguating {
                mode,
                candidates: candidates.clone(),
            },
            ..session.clone()
        })
        .with_effect(Effect::Send(Fragment::Disambiguation { candidates })),
    }
}

fn show_full_schedule(
    session: &Session,
    context: &SessionContext,
    subject: String,
    rows: Vec<ExamRow>,
) -> TransitionResult {
    if rows.is_empty() {
        return enter_menu(
            session,
            None,
            vec![Effect::message(BotMessage::NoSchedule { subject })],
        );
    }
    let (next, handle) = with_new_result(session);
    let shown = Effect::Send(Fragment::FullSchedule {
        handle: handle.clone(),
        subject,
        rows,
    });
    enter_showing_results(next, context, handle, shown)
}

fn show_turn_row(
    session: &Session,
    context: &SessionContext,
    subject: String,
    turn: TurnLabel,
    row: Option<ExamRow>,
) -> TransitionResult {
    // A row tagged with another turn counts as no row at all
    let Some(row) = row.filter(|row| turn.matches(&row.turn)) else {
        return enter_menu(
            session,
            None,
            vec![Effect::message(BotMessage::NotInTurn { subject, turn })],
        );
    };
    let (next, handle) = with_new_result(session);
    let shown = Effect::Send(Fragment::SingleTurn {
        handle: handle.clone(),
        row,
    });
    enter_showing_results(next, context, handle, shown)
}

fn show_periods(session: &Session, context: &SessionContext, periods: Vec<TurnPeriod>) -> TransitionResult {
    if periods.is_empty() {
        return enter_menu(
            session,
            None,
            vec![Effect::message(BotMessage::NoUpcomingPeriods)],
        );
    }
    let (mut next, handle) = with_new_result(session);
    next.advance_epoch += 1;
    let epoch = next.advance_epoch;
    next.state = ChatState::ShowingTurns {
        handle: Some(handle.clone()),
    };
    TransitionResult::new(next)
        .with_effect(Effect::Send(Fragment::UpcomingPeriods { handle, periods }))
        .with_effect(Effect::ScheduleAdvance {
            delay: context.advance_delay,
            epoch,
        })
}

fn with_new_result(session: &Session) -> (Session, ResultHandle) {
    let mut next = session.clone();
    next.rendered_results += 1;
    let handle = ResultHandle::new(next.rendered_results);
    (next, handle)
}

/// The card has already been produced by the resolving step; entering the
/// display state only schedules the advance to the export offer.
fn enter_showing_results(
    mut next: Session,
    context: &SessionContext,
    handle: ResultHandle,
    shown: Effect,
) -> TransitionResult {
    next.advance_epoch += 1;
    let epoch = next.advance_epoch;
    next.state = ChatState::ShowingResults { handle };
    TransitionResult::new(next)
        .with_effect(shown)
        .with_effect(Effect::ScheduleAdvance {
            delay: context.advance_delay,
            epoch,
        })
}
