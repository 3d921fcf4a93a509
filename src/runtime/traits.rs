//! Trait abstractions for runtime I/O
//!
//! These traits let the executor run against mock stores and renderers in
//! tests.

use crate::db::{Database, DbError, ExamRow, TurnPeriod};
use crate::render::Fragment;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use thiserror::Error;

/// Failure of a schedule lookup. The session answers with a generic error
/// message and returns to the menu.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),
    #[error("Schedule store unavailable: {0}")]
    Unavailable(String),
}

/// Read-only access to the exam schedule
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Distinct subject names whose normalized form contains the normalized
    /// query, in insertion order of their first sitting
    async fn find_subject_candidates(&self, query: &str) -> Result<Vec<String>, QueryError>;

    /// Every sitting of `subject` (store spelling)
    async fn full_schedule(&self, subject: &str) -> Result<Vec<ExamRow>, QueryError>;

    /// The sitting of `subject` in `turn`, if any
    async fn schedule_for_turn(&self, subject: &str, turn: &str) -> Result<Option<ExamRow>, QueryError>;

    /// Periods starting today or later, soonest first
    async fn upcoming_periods(&self) -> Result<Vec<TurnPeriod>, QueryError>;
}

/// Turns a fragment into the markup sent over the connection
pub trait Renderer: Send + Sync {
    fn render(&self, fragment: &Fragment) -> String;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: ScheduleStore + ?Sized> ScheduleStore for Arc<T> {
    async fn find_subject_candidates(&self, query: &str) -> Result<Vec<String>, QueryError> {
        (**self).find_subject_candidates(query).await
    }

    async fn full_schedule(&self, subject: &str) -> Result<Vec<ExamRow>, QueryError> {
        (**self).full_schedule(subject).await
    }

    async fn schedule_for_turn(&self, subject: &str, turn: &str) -> Result<Option<ExamRow>, QueryError> {
        (**self).schedule_for_turn(subject, turn).await
    }

    async fn upcoming_periods(&self) -> Result<Vec<TurnPeriod>, QueryError> {
        (**self).upcoming_periods().await
    }
}

impl<T: Renderer + ?Sized> Renderer for Arc<T> {
    fn render(&self, fragment: &Fragment) -> String {
        (**self).render(fragment)
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use [`Database`] as a [`ScheduleStore`]
///
/// rusqlite is blocking, so every lookup runs on the blocking pool.
#[derive(Clone)]
pub struct DatabaseSchedule {
    db: Database,
    today: fn() -> NaiveDate,
}

impl DatabaseSchedule {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            today: || chrono::Local::now().date_naive(),
        }
    }

    /// Pin the date used to decide which periods are upcoming
    #[cfg(test)]
    pub fn with_today(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, QueryError>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T, DbError> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| QueryError::Unavailable(e.to_string()))?
            .map_err(QueryError::from)
    }
}

#[async_trait]
impl ScheduleStore for DatabaseSchedule {
    async fn find_subject_candidates(&self, query: &str) -> Result<Vec<String>, QueryError> {
        let query = query.to_string();
        self.blocking(move |db| db.subject_names_matching(&query)).await
    }

    async fn full_schedule(&self, subject: &str) -> Result<Vec<ExamRow>, QueryError> {
        let subject = subject.to_string();
        self.blocking(move |db| db.full_schedule(&subject)).await
    }

    async fn schedule_for_turn(&self, subject: &str, turn: &str) -> Result<Option<ExamRow>, QueryError> {
        let subject = subject.to_string();
        let turn = turn.to_string();
        self.blocking(move |db| db.schedule_for_turn(&subject, &turn)).await
    }

    async fn upcoming_periods(&self) -> Result<Vec<TurnPeriod>, QueryError> {
        let today = (self.today)();
        self.blocking(move |db| db.upcoming_periods(today)).await
    }
}
