//! Chat session state types

use std::fmt;
use std::time::Duration;

/// Lowest and highest turn number a user may ask for
pub const TURN_RANGE: std::ops::RangeInclusive<u8> = 1..=10;

/// Exam period label as stored in the schedule, e.g. "3° Turno"
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TurnLabel(String);

impl TurnLabel {
    /// Label for turn `number`, or `None` outside [`TURN_RANGE`]
    pub fn from_number(number: u8) -> Option<Self> {
        TURN_RANGE
            .contains(&number)
            .then(|| Self(format!("{number}° Turno")))
    }

    /// Parse user input such as "3" or " 10 "
    pub fn parse_input(text: &str) -> Option<Self> {
        text.trim().parse::<u8>().ok().and_then(Self::from_number)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when a store row's turn column names this turn
    pub fn matches(&self, stored: &str) -> bool {
        self.0 == stored.trim()
    }
}

impl fmt::Display for TurnLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque reference to a rendered result card, used by the export step
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResultHandle(String);

impl ResultHandle {
    pub fn new(sequence: u64) -> Self {
        Self(format!("card-{sequence}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResultHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which lookup a subject search feeds into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryMode {
    /// Every sitting of the subject
    AllDates,
    /// The sitting of the subject in one turn
    Turn { turn: TurnLabel },
}

/// Dialogue state. Data collected along the way lives in the variants that
/// need it, so leaving a state drops it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ChatState {
    /// Fresh connection, advanced to `Menu` right away
    #[default]
    Idle,

    Menu,

    /// Waiting for (or resolving) a subject, all-dates mode
    AwaitingMateriaAll,

    /// Waiting for a turn number
    AwaitingTurn,

    /// Waiting for (or resolving) a subject, turn-scoped mode
    AwaitingMateriaTurn { turn: TurnLabel },

    /// Several subjects matched; waiting for the user to pick one
    Disambiguating {
        mode: QueryMode,
        candidates: Vec<String>,
    },

    /// A result card is on screen; advances after the visibility delay
    ShowingResults { handle: ResultHandle },

    /// Upcoming periods requested. `handle` is set once a non-empty list
    /// has been rendered.
    ShowingTurns { handle: Option<ResultHandle> },

    /// Asked whether to export the card referenced by `handle`
    AwaitingDownload { handle: ResultHandle },
}

impl ChatState {
    pub fn name(&self) -> &'static str {
        match self {
            ChatState::Idle => "idle",
            ChatState::Menu => "menu",
            ChatState::AwaitingMateriaAll => "awaiting_materia_all",
            ChatState::AwaitingTurn => "awaiting_turn",
            ChatState::AwaitingMateriaTurn { .. } => "awaiting_materia_turn",
            ChatState::Disambiguating { .. } => "disambiguating",
            ChatState::ShowingResults { .. } => "showing_results",
            ChatState::ShowingTurns { .. } => "showing_turns",
            ChatState::AwaitingDownload { .. } => "awaiting_download",
        }
    }

    /// Result display states that advance on their own
    pub fn is_display(&self) -> bool {
        matches!(
            self,
            ChatState::ShowingResults { .. } | ChatState::ShowingTurns { .. }
        )
    }

    /// Query mode of a subject search in progress
    pub fn query_mode(&self) -> Option<QueryMode> {
        match self {
            ChatState::AwaitingMateriaAll => Some(QueryMode::AllDates),
            ChatState::AwaitingMateriaTurn { turn } => Some(QueryMode::Turn { turn: turn.clone() }),
            ChatState::Disambiguating { mode, .. } => Some(mode.clone()),
            _ => None,
        }
    }
}

impl fmt::Display for ChatState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Mutable per-connection data, owned by the session's runtime task
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    pub state: ChatState,
    /// Most recent user input, trimmed but in the user's own spelling.
    /// Subject searches use it as typed; command matching lower-cases it separately.
    pub last_input: Option<String>,
    /// Stamp of the most recently scheduled delayed advance
    pub advance_epoch: u64,
    /// Result cards rendered so far; mints [`ResultHandle`]s
    pub rendered_results: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)] // API completeness
    pub fn pending_option(&self) -> Option<QueryMode> {
        self.state.query_mode()
    }

    #[allow(dead_code)] // Used in tests
    pub fn pending_turn(&self) -> Option<&TurnLabel> {
        match &self.state {
            ChatState::AwaitingMateriaTurn { turn }
            | ChatState::Disambiguating {
                mode: QueryMode::Turn { turn },
                ..
            } => Some(turn),
            _ => None,
        }
    }

    #[allow(dead_code)] // Used in tests
    pub fn pending_result_handle(&self) -> Option<&ResultHandle> {
        match &self.state {
            ChatState::ShowingResults { handle }
            | ChatState::ShowingTurns {
                handle: Some(handle),
            }
            | ChatState::AwaitingDownload { handle } => Some(handle),
            _ => None,
        }
    }
}

/// Immutable per-session settings
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,
    /// How long a result stays on screen before the export prompt
    pub advance_delay: Duration,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>, advance_delay: Duration) -> Self {
        Self {
            session_id: session_id.into(),
            advance_delay,
        }
    }
}
