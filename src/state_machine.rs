//! Chat dialogue state machine
//!
//! Elm-style: a pure transition function maps (session, event) to a new
//! session plus effects. The runtime executes the effects and feeds their
//! outcomes back in as events.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;


pub use effect::Effect;
pub use event::Event;
pub use state::{ChatState, Session, SessionContext};
#[allow(unused_imports)] // Used by runtime tests
pub use state::{ResultHandle, TurnLabel};
pub use transition::{transition, TransitionError};
