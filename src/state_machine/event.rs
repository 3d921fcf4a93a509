//! Events that drive a chat session

use crate::db::{ExamRow, TurnPeriod};
use crate::state_machine::state::TurnLabel;

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Connection established
    Connected,

    /// One text frame from the user
    UserInput { text: String },

    // Schedule store outcomes
    CandidatesFound {
        query: String,
        candidates: Vec<String>,
    },
    ScheduleLoaded {
        subject: String,
        rows: Vec<ExamRow>,
    },
    TurnRowLoaded {
        subject: String,
        turn: TurnLabel,
        row: Option<ExamRow>,
    },
    PeriodsLoaded {
        periods: Vec<TurnPeriod>,
    },
    QueryFailed {
        message: String,
    },

    /// Visibility delay elapsed for the advance stamped `epoch`
    AdvanceTimeout { epoch: u64 },
}

impl Event {
    pub fn user_input(text: impl Into<String>) -> Self {
        Event::UserInput { text: text.into() }
    }

    /// Events produced by a store call the session itself requested
    pub fn is_store_outcome(&self) -> bool {
        matches!(
            self,
            Event::CandidatesFound { .. }
                | Event::ScheduleLoaded { .. }
                | Event::TurnRowLoaded { .. }
                | Event::PeriodsLoaded { .. }
                | Event::QueryFailed { .. }
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Event::Connected => "connected",
            Event::UserInput { .. } => "user_input",
            Event::CandidatesFound { .. } => "candidates_found",
            Event::ScheduleLoaded { .. } => "schedule_loaded",
            Event::TurnRowLoaded { .. } => "turn_row_loaded",
            Event::PeriodsLoaded { .. } => "periods_loaded",
            Event::QueryFailed { .. } => "query_failed",
            Event::AdvanceTimeout { .. } => "advance_timeout",
        }
    }
}
