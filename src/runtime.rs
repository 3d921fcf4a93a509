//! Runtime for live chat sessions
//!
//! Every connection gets its own [`SessionRuntime`] task. The manager only
//! routes frames to it and tears it down when the connection goes away.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::SessionRuntime;
pub use traits::*;

use crate::state_machine::{Event, SessionContext};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

/// Type alias for the production runtime
pub type ProductionRuntime = SessionRuntime<dyn ScheduleStore, dyn Renderer>;

const EVENT_BUFFER: usize = 32;
const OUTBOUND_BUFFER: usize = 64;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),
    #[error("Session {0} is shutting down")]
    Closed(String),
}

/// Handle to interact with a running session
struct SessionHandle {
    event_tx: mpsc::Sender<Event>,
    cancel: CancellationToken,
}

/// A freshly opened session: its id and the markup it produces
pub struct SessionConnection {
    pub id: String,
    pub outbound_rx: mpsc::Receiver<String>,
}

/// Manager for all chat sessions
pub struct SessionManager {
    store: Arc<dyn ScheduleStore>,
    renderer: Arc<dyn Renderer>,
    advance_delay: Duration,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn ScheduleStore>, renderer: Arc<dyn Renderer>, advance_delay: Duration) -> Self {
        Self {
            store,
            renderer,
            advance_delay,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Start a session. The menu is the first thing on `outbound_rx`.
    pub async fn open_session(&self) -> SessionConnection {
        let id = uuid::Uuid::new_v4().to_string();
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
        let cancel = CancellationToken::new();

        let runtime: ProductionRuntime = SessionRuntime::new(
            SessionContext::new(&id, self.advance_delay),
            self.store.clone(),
            self.renderer.clone(),
            event_rx,
            event_tx.clone(),
            outbound_tx,
            cancel.clone(),
        );

        // Start runtime in background
        let session_id = id.clone();
        tokio::spawn(async move {
            runtime.run().await;
            tracing::debug!(session_id = %session_id, "Session task finished");
        });

        self.sessions
            .write()
            .await
            .insert(id.clone(), SessionHandle { event_tx, cancel });

        SessionConnection { id, outbound_rx }
    }

    /// Queue one user frame for a session
    pub async fn submit(&self, session_id: &str, text: impl Into<String>) -> Result<(), SessionError> {
        let event_tx = {
            let sessions = self.sessions.read().await;
            let handle = sessions
                .get(session_id)
                .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
            handle.event_tx.clone()
        };
        event_tx
            .send(Event::user_input(text))
            .await
            .map_err(|_| SessionError::Closed(session_id.to_string()))
    }

    /// Stop a session and its pending timers. Unknown ids are ignored.
    pub async fn close_session(&self, session_id: &str) {
        if let Some(handle) = self.sessions.write().await.remove(session_id) {
            handle.cancel.cancel();
            tracing::info!(session_id = %session_id, "Session closed");
        }
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }
}
