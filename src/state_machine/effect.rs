//! Effects produced by state transitions

use crate::render::{BotMessage, Fragment};
use crate::state_machine::state::TurnLabel;
use std::time::Duration;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Render and send a fragment to the user
    Send(Fragment),

    /// Look up subject names containing `query`
    FindCandidates { query: String },

    /// Load every sitting of a resolved subject
    LoadFullSchedule { subject: String },

    /// Load the sitting of a resolved subject in one turn
    LoadTurnRow { subject: String, turn: TurnLabel },

    /// Load exam periods that have not started yet
    LoadUpcomingPeriods,

    /// Fire `AdvanceTimeout { epoch }` after `delay`
    ScheduleAdvance { delay: Duration, epoch: u64 },
}

impl Effect {
    pub fn message(message: BotMessage) -> Self {
        Effect::Send(Fragment::Message(message))
    }

    #[allow(dead_code)] // Used in tests
    pub fn is_query(&self) -> bool {
        matches!(
            self,
            Effect::FindCandidates { .. }
                | Effect::LoadFullSchedule { .. }
                | Effect::LoadTurnRow { .. }
                | Effect::LoadUpcomingPeriods
        )
    }
}
