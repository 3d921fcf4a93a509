//! Mock implementations for testing
//!
//! These mocks drive a real [`SessionRuntime`] without a database or socket.

use super::traits::*;
use super::SessionRuntime;
use crate::db::{ExamRow, TurnPeriod};
use crate::normalize::loose_contains;
use crate::render::Fragment;
use crate::state_machine::{Event, SessionContext};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Mock Schedule Store
// ============================================================================

/// In-memory schedule with a switch to make every lookup fail
#[derive(Default)]
pub struct MockScheduleStore {
    rows: Vec<ExamRow>,
    periods: Vec<TurnPeriod>,
    failing: AtomicBool,
    /// Number of lookups served, failed ones included
    pub calls: AtomicUsize,
}

impl MockScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A small schedule: "Física I" in turns 3, 6 and 8, "Álgebra I" in
    /// turns 1 and 2, "Álgebra II" in turn 2, and two upcoming periods.
    pub fn seeded() -> Self {
        Self::new()
            .with_row(exam_row("Física I", "3° Turno", "25/03/2026"))
            .with_row(exam_row("Álgebra I", "1° Turno", "17/02/2026"))
            .with_row(exam_row("Álgebra II", "2° Turno", "10/03/2026"))
            .with_row(exam_row("Física I", "6° Turno", "28/07/2026"))
            .with_row(exam_row("Álgebra I", "2° Turno", "10/03/2026"))
            .with_row(exam_row("Física I", "8° Turno", "06/10/2026"))
            .with_period(period("9° Turno", (11, 24), (12, 1), true))
            .with_period(period("10° Turno", (12, 15), (12, 19), true))
    }

    pub fn with_row(mut self, row: ExamRow) -> Self {
        self.rows.push(row);
        self
    }

    pub fn with_period(mut self, period: TurnPeriod) -> Self {
        self.periods.push(period);
        self
    }

    pub fn without_periods(mut self) -> Self {
        self.periods.clear();
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), QueryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            Err(QueryError::Unavailable("mock store offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ScheduleStore for MockScheduleStore {
    async fn find_subject_candidates(&self, query: &str) -> Result<Vec<String>, QueryError> {
        self.check()?;
        let mut names: Vec<String> = Vec::new();
        for row in &self.rows {
            if !names.contains(&row.subject) && loose_contains(&row.subject, query) {
                names.push(row.subject.clone());
            }
        }
        Ok(names)
    }

    async fn full_schedule(&self, subject: &str) -> Result<Vec<ExamRow>, QueryError> {
        self.check()?;
        Ok(self.rows.iter().filter(|r| r.subject == subject).cloned().collect())
    }

    async fn schedule_for_turn(&self, subject: &str, turn: &str) -> Result<Option<ExamRow>, QueryError> {
        self.check()?;
        Ok(self
            .rows
            .iter()
            .find(|r| r.subject == subject && r.turn == turn)
            .cloned())
    }

    async fn upcoming_periods(&self) -> Result<Vec<TurnPeriod>, QueryError> {
        self.check()?;
        Ok(self.periods.clone())
    }
}

pub fn exam_row(subject: &str, turn: &str, date: &str) -> ExamRow {
    ExamRow {
        subject: subject.to_string(),
        turn: turn.to_string(),
        date: date.to_string(),
        time: "09:00".to_string(),
        room: "Laboratorio 1".to_string(),
        campus: "Campus Corrientes".to_string(),
        degree: "Profesorado en Física".to_string(),
        edited_at: String::new(),
    }
}

pub fn period(name: &str, start: (u32, u32), end: (u32, u32), recess: bool) -> TurnPeriod {
    let date = |(month, day)| NaiveDate::from_ymd_opt(2026, month, day).expect("valid test date");
    TurnPeriod {
        name: name.to_string(),
        starts_on: date(start),
        ends_on: date(end),
        recess,
    }
}

// ============================================================================
// Recording Renderer
// ============================================================================

/// Renderer that keeps every fragment and renders it as its `Debug` form
#[derive(Default)]
pub struct RecordingRenderer {
    fragments: Mutex<Vec<Fragment>>,
}

impl RecordingRenderer {
    pub fn fragments(&self) -> Vec<Fragment> {
        self.fragments.lock().unwrap().clone()
    }
}

impl Renderer for RecordingRenderer {
    fn render(&self, fragment: &Fragment) -> String {
        self.fragments.lock().unwrap().push(fragment.clone());
        format!("{fragment:?}")
    }
}

// ============================================================================
// Test Runtime
// ============================================================================

/// A running session wired to mocks
pub struct TestRuntime {
    pub store: Arc<MockScheduleStore>,
    pub renderer: Arc<RecordingRenderer>,
    pub event_tx: mpsc::Sender<Event>,
    pub outbound_rx: mpsc::Receiver<String>,
    pub cancel: CancellationToken,
    _runtime_handle: tokio::task::JoinHandle<()>,
}

impl TestRuntime {
    /// Create a builder with the seeded mock store
    pub fn builder() -> TestRuntimeBuilder {
        TestRuntimeBuilder::new()
    }
}

pub struct TestRuntimeBuilder {
    session_id: String,
    store: Option<MockScheduleStore>,
    advance_delay: Duration,
}

impl TestRuntimeBuilder {
    pub fn new() -> Self {
        Self {
            session_id: "test-session".to_string(),
            store: None,
            advance_delay: Duration::from_millis(20),
        }
    }

    pub fn store(mut self, store: MockScheduleStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn advance_delay(mut self, delay: Duration) -> Self {
        self.advance_delay = delay;
        self
    }

    pub fn build(self) -> TestRuntime {
        let store = Arc::new(self.store.unwrap_or_else(MockScheduleStore::seeded));
        let renderer = Arc::new(RecordingRenderer::default());
        let (event_tx, event_rx) = mpsc::channel(32);
        let (outbound_tx, outbound_rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();

        let runtime = SessionRuntime::new(
            SessionContext::new(self.session_id, self.advance_delay),
            store.clone(),
            renderer.clone(),
            event_rx,
            event_tx.clone(),
            outbound_tx,
            cancel.clone(),
        );

        let handle = tokio::spawn(async move {
            runtime.run().await;
        });

        TestRuntime {
            store,
            renderer,
            event_tx,
            outbound_rx,
            cancel,
            _runtime_handle: handle,
        }
    }
}

impl Default for TestRuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRuntime {
    /// Send one user frame
    pub async fn send(&self, text: &str) {
        self.event_tx
            .send(Event::user_input(text))
            .await
            .expect("Failed to send input");
    }

    /// Wait until `count` frames have been delivered, returning the
    /// fragments rendered so far
    pub async fn wait_for_frames(&mut self, count: usize, timeout: Duration) -> Vec<Fragment> {
        let deadline = tokio::time::Instant::now() + timeout;
        for _ in 0..count {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let frame = tokio::time::timeout(remaining, self.outbound_rx.recv()).await;
            if !matches!(frame, Ok(Some(_))) {
                break;
            }
        }
        self.renderer.fragments()
    }

    /// True when no frame arrives within `window`
    pub async fn stays_quiet(&mut self, window: Duration) -> bool {
        tokio::time::timeout(window, self.outbound_rx.recv()).await.is_err()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::BotMessage;
    use crate::state_machine::{ResultHandle, TurnLabel};

    const WAIT: Duration = Duration::from_secs(2);

    fn message(m: BotMessage) -> Fragment {
        Fragment::Message(m)
    }

    #[tokio::test]
    async fn test_mock_store_search() {
        let store = MockScheduleStore::seeded();
        let names = store.find_subject_candidates("algebra").await.unwrap();
        assert_eq!(names, vec!["Álgebra I".to_string(), "Álgebra II".to_string()]);
        assert!(store.find_subject_candidates("").await.unwrap().is_empty());

        store.set_failing(true);
        assert!(store.full_schedule("Física I").await.is_err());
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_turn_scoped_lookup_then_decline() {
        let mut rt = TestRuntime::builder().build();
        rt.wait_for_frames(1, WAIT).await;

        rt.send("hola").await;
        rt.send("2").await;
        rt.send("3").await;
        rt.send("fisica").await;

        // menu, menu again, ask turn, turn accepted, card, download prompt
        let fragments = rt.wait_for_frames(5, WAIT).await;
        let turn = TurnLabel::from_number(3).unwrap();
        assert_eq!(
            fragments,
            vec![
                message(BotMessage::MenuPrompt),
                message(BotMessage::MenuPrompt),
                message(BotMessage::AskTurn),
                message(BotMessage::TurnAccepted { turn: turn.clone() }),
                Fragment::SingleTurn {
                    handle: ResultHandle::new(1),
                    row: exam_row("Física I", "3° Turno", "25/03/2026"),
                },
                message(BotMessage::DownloadPrompt),
            ]
        );

        rt.send("no").await;
        let fragments = rt.wait_for_frames(2, WAIT).await;
        assert_eq!(
            fragments[6..],
            [
                message(BotMessage::DownloadDeclined),
                message(BotMessage::MenuPrompt)
            ]
        );
    }

    #[tokio::test]
    async fn test_no_upcoming_periods_returns_to_menu() {
        let mut rt = TestRuntime::builder()
            .store(MockScheduleStore::seeded().without_periods())
            .build();
        rt.wait_for_frames(1, WAIT).await;

        rt.send("turnos").await;
        let fragments = rt.wait_for_frames(2, WAIT).await;
        assert_eq!(
            fragments[1..],
            [
                message(BotMessage::NoUpcomingPeriods),
                message(BotMessage::MenuPrompt)
            ]
        );

        // Nothing else follows, in particular no download prompt
        assert!(rt.stays_quiet(Duration::from_millis(100)).await);
        assert!(!rt
            .renderer
            .fragments()
            .contains(&message(BotMessage::DownloadPrompt)));
    }

    #[tokio::test]
    async fn test_upcoming_periods_then_export() {
        let mut rt = TestRuntime::builder().build();
        rt.wait_for_frames(1, WAIT).await;

        rt.send("3").await;
        let fragments = rt.wait_for_frames(2, WAIT).await;
        assert!(matches!(
            &fragments[1],
            Fragment::UpcomingPeriods { handle, periods } if *handle == ResultHandle::new(1) && periods.len() == 2
        ));
        assert_eq!(fragments[2], message(BotMessage::DownloadPrompt));

        rt.send("Sí").await;
        let fragments = rt.wait_for_frames(3, WAIT).await;
        assert_eq!(
            fragments[3..],
            [
                Fragment::ExportTrigger {
                    handle: ResultHandle::new(1)
                },
                message(BotMessage::Downloading),
                message(BotMessage::MenuPrompt),
            ]
        );
    }

    #[tokio::test]
    async fn test_disambiguation_then_pick() {
        let mut rt = TestRuntime::builder().build();
        rt.wait_for_frames(1, WAIT).await;

        rt.send("1").await;
        rt.send("algebra").await;
        let fragments = rt.wait_for_frames(2, WAIT).await;
        assert_eq!(
            fragments[2],
            Fragment::Disambiguation {
                candidates: vec!["Álgebra I".to_string(), "Álgebra II".to_string()]
            }
        );

        rt.send("Álgebra II").await;
        let fragments = rt.wait_for_frames(2, WAIT).await;
        assert!(matches!(
            &fragments[3],
            Fragment::FullSchedule { subject, rows, .. } if subject == "Álgebra II" && rows.len() == 1
        ));
        assert_eq!(fragments[4], message(BotMessage::DownloadPrompt));
    }

    #[tokio::test]
    async fn test_menu_during_disambiguation() {
        let mut rt = TestRuntime::builder().build();
        rt.wait_for_frames(1, WAIT).await;

        rt.send("algebra").await;
        rt.wait_for_frames(1, WAIT).await;
        rt.send("volver").await;
        let fragments = rt.wait_for_frames(1, WAIT).await;
        assert_eq!(fragments.last(), Some(&message(BotMessage::MenuPrompt)));

        // The old candidates are gone: "1" is a menu option again
        rt.send("1").await;
        let fragments = rt.wait_for_frames(1, WAIT).await;
        assert_eq!(fragments.last(), Some(&message(BotMessage::AskSubject)));
    }

    #[tokio::test]
    async fn test_query_failure_reports_and_returns_to_menu() {
        let mut rt = TestRuntime::builder().build();
        rt.wait_for_frames(1, WAIT).await;
        rt.store.set_failing(true);

        rt.send("fisica").await;
        let fragments = rt.wait_for_frames(2, WAIT).await;
        assert_eq!(
            fragments[1..],
            [message(BotMessage::QueryError), message(BotMessage::MenuPrompt)]
        );
    }

    #[tokio::test]
    async fn test_help_from_turn_prompt() {
        let mut rt = TestRuntime::builder().build();
        rt.wait_for_frames(1, WAIT).await;

        rt.send("2").await;
        rt.send("ayuda").await;
        let fragments = rt.wait_for_frames(3, WAIT).await;
        assert_eq!(
            fragments[2..],
            [message(BotMessage::Help), message(BotMessage::MenuPrompt)]
        );
    }

    #[tokio::test]
    async fn test_input_during_display_is_ignored() {
        let mut rt = TestRuntime::builder()
            .advance_delay(Duration::from_millis(200))
            .build();
        rt.wait_for_frames(1, WAIT).await;

        rt.send("Física I").await;
        let fragments = rt.wait_for_frames(1, WAIT).await;
        assert!(matches!(fragments[1], Fragment::FullSchedule { .. }));

        // Arrives while the card is on screen
        rt.send("2").await;
        let fragments = rt.wait_for_frames(1, WAIT).await;
        assert_eq!(fragments.len(), 3);
        assert_eq!(fragments[2], message(BotMessage::DownloadPrompt));
    }

    #[tokio::test]
    async fn test_menu_cancels_pending_advance() {
        let mut rt = TestRuntime::builder()
            .advance_delay(Duration::from_millis(50))
            .build();
        rt.wait_for_frames(1, WAIT).await;

        rt.send("Física I").await;
        rt.send("menu").await;
        rt.wait_for_frames(2, WAIT).await;

        // The timer still fires but finds the session back at the menu
        assert!(rt.stays_quiet(Duration::from_millis(200)).await);
        assert!(!rt
            .renderer
            .fragments()
            .contains(&message(BotMessage::DownloadPrompt)));
    }

    #[tokio::test]
    async fn test_unexpected_store_outcome_resets_to_menu() {
        let mut rt = TestRuntime::builder().build();
        rt.wait_for_frames(1, WAIT).await;

        // No lookup is pending at the menu
        rt.event_tx
            .send(Event::CandidatesFound {
                query: "x".to_string(),
                candidates: vec!["Física I".to_string()],
            })
            .await
            .unwrap();
        let fragments = rt.wait_for_frames(2, WAIT).await;
        assert_eq!(
            fragments[1..],
            [message(BotMessage::Recovered), message(BotMessage::MenuPrompt)]
        );

        rt.send("1").await;
        let fragments = rt.wait_for_frames(1, WAIT).await;
        assert_eq!(fragments.last(), Some(&message(BotMessage::AskSubject)));
        assert_eq!(fragments.len(), 4);
    }

    #[tokio::test]
    async fn test_cancel_stops_runtime() {
        let mut rt = TestRuntime::builder().build();
        rt.wait_for_frames(1, WAIT).await;

        rt.cancel.cancel();
        let end = tokio::time::timeout(WAIT, rt.outbound_rx.recv()).await;
        assert_eq!(end.unwrap(), None);
    }
}
