//! Schedule database
//!
//! SQLite store behind the chat's schedule lookups. Holds exam sittings
//! ("mesas"), the reference tables the admin console maintains, and the
//! exam-period calendar.

mod schema;

pub use schema::*;

use crate::normalize::loose_contains;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid calendar date: {0}")]
    InvalidDate(String),
    #[error("Database connection lock poisoned")]
    LockPoisoned,
}

pub type DbResult<T> = Result<T, DbError>;

const MESA_COLUMNS: &str = "m.materia, m.turno, m.fecha, m.hora, m.aula, m.carrera,
        COALESCE(m.fecha_edicion, ''), COALESCE(s.nombre, '')";

const MESA_JOINS: &str = "FROM mesas m
     LEFT JOIN aulas a ON m.aula = a.nombre
     LEFT JOIN sedes s ON a.sede_id = s.id";

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA)?;

        // Fails with "duplicate column" once applied
        let _ = conn.execute(MIGRATION_ADD_EDITED_AT, []);

        Ok(())
    }

    // ==================== Seeding ====================

    /// True when no exam sittings have been loaded yet
    pub fn is_empty(&self) -> DbResult<bool> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM mesas", [], |row| row.get(0))?;
        Ok(count == 0)
    }

    /// Load campuses, rooms, degrees, subjects, the exam calendar for `year`
    /// and a handful of sittings for every seeded subject.
    pub fn seed_reference_data(&self, year: i32) -> DbResult<()> {
        let calendar = seed_calendar(year)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        for campus in SEED_CAMPUSES {
            tx.execute("INSERT INTO sedes (nombre) VALUES (?1)", params![campus])?;
        }
        for (room, campus_id) in SEED_ROOMS {
            tx.execute(
                "INSERT INTO aulas (nombre, sede_id) VALUES (?1, ?2)",
                params![room, campus_id],
            )?;
        }
        for degree in SEED_DEGREES {
            tx.execute("INSERT INTO carreras (nombre) VALUES (?1)", params![degree])?;
        }
        for subject in SEED_SUBJECTS {
            tx.execute("INSERT INTO materias (nombre) VALUES (?1)", params![subject])?;
        }
        for period in &calendar {
            insert_period(&tx, period)?;
        }
        for (subject, degree, room, time, turns) in SEED_MESAS {
            for &turn in *turns {
                let Some(period) = calendar.get(turn - 1) else {
                    continue;
                };
                let mesa = NewMesa {
                    subject: (*subject).to_string(),
                    turn: period.name.clone(),
                    date: period.starts_on.format("%d/%m/%Y").to_string(),
                    time: (*time).to_string(),
                    room: (*room).to_string(),
                    degree: (*degree).to_string(),
                    edited_at: None,
                };
                insert_mesa(&tx, &mesa)?;
            }
        }

        tx.commit()?;
        tracing::info!(year, periods = calendar.len(), "Seeded reference data");
        Ok(())
    }

    // ==================== Writes ====================

    /// Insert one exam sitting, returning its row id
    #[allow(dead_code)] // Admin console writes; used in tests
    pub fn insert_mesa(&self, mesa: &NewMesa) -> DbResult<i64> {
        let conn = self.conn()?;
        insert_mesa(&conn, mesa)
    }

    /// Insert one exam period, returning its row id
    #[allow(dead_code)] // Admin console writes; used in tests
    pub fn insert_turn_period(&self, period: &TurnPeriod) -> DbResult<i64> {
        let conn = self.conn()?;
        insert_period(&conn, period)
    }

    // ==================== Lookups ====================

    /// Distinct subject names containing `query` (accent and case
    /// insensitive), in order of first appearance.
    pub fn subject_names_matching(&self, query: &str) -> DbResult<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT materia FROM mesas GROUP BY materia ORDER BY MIN(id) ASC")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(names
            .into_iter()
            .filter(|name| loose_contains(name, query))
            .collect())
    }

    /// Every sitting of `subject` (exact name), in insertion order
    pub fn full_schedule(&self, subject: &str) -> DbResult<Vec<ExamRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {MESA_COLUMNS} {MESA_JOINS} WHERE m.materia = ?1 ORDER BY m.id ASC"
        ))?;
        let rows = stmt.query_map(params![subject], exam_row_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// The sitting of `subject` in `turn`, if any
    pub fn schedule_for_turn(&self, subject: &str, turn: &str) -> DbResult<Option<ExamRow>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {MESA_COLUMNS} {MESA_JOINS}
                 WHERE m.materia = ?1 AND m.turno = ?2
                 ORDER BY m.id ASC LIMIT 1"
            ),
            params![subject, turn],
            exam_row_from_row,
        )
        .optional()
        .map_err(DbError::from)
    }

    /// Periods starting on or after `today`, earliest first. Rows whose
    /// dates do not parse are skipped.
    pub fn upcoming_periods(&self, today: NaiveDate) -> DbResult<Vec<TurnPeriod>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT nombre, fecha_inicio, fecha_fin, receso FROM turnos_config
             ORDER BY fecha_inicio ASC, id ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut periods = Vec::new();
        for (name, start, end, recess) in rows {
            let (Ok(starts_on), Ok(ends_on)) = (
                NaiveDate::parse_from_str(&start, PERIOD_DATE_FORMAT),
                NaiveDate::parse_from_str(&end, PERIOD_DATE_FORMAT),
            ) else {
                tracing::warn!(period = %name, start = %start, end = %end, "Skipping period with unparseable dates");
                continue;
            };
            if starts_on >= today {
                periods.push(TurnPeriod {
                    name,
                    starts_on,
                    ends_on,
                    recess: recess == 1,
                });
            }
        }
        Ok(periods)
    }
}

fn insert_mesa(conn: &Connection, mesa: &NewMesa) -> DbResult<i64> {
    conn.execute(
        "INSERT INTO mesas (materia, turno, fecha, hora, aula, carrera, fecha_edicion)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            mesa.subject,
            mesa.turn,
            mesa.date,
            mesa.time,
            mesa.room,
            mesa.degree,
            mesa.edited_at
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn insert_period(conn: &Connection, period: &TurnPeriod) -> DbResult<i64> {
    conn.execute(
        "INSERT INTO turnos_config (nombre, fecha_inicio, fecha_fin, receso)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            period.name,
            period.starts_on.format(PERIOD_DATE_FORMAT).to_string(),
            period.ends_on.format(PERIOD_DATE_FORMAT).to_string(),
            i64::from(period.recess)
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn exam_row_from_row(row: &Row<'_>) -> rusqlite::Result<ExamRow> {
    let campus: String = row.get(7)?;
    Ok(ExamRow {
        subject: row.get(0)?,
        turn: row.get(1)?,
        date: row.get(2)?,
        time: row.get(3)?,
        room: row.get(4)?,
        degree: row.get(5)?,
        edited_at: row.get(6)?,
        campus: if campus.is_empty() {
            UNASSIGNED_CAMPUS.to_string()
        } else {
            campus
        },
    })
}

fn seed_calendar(year: i32) -> DbResult<Vec<TurnPeriod>> {
    let date = |month: u32, day: u32| {
        NaiveDate::from_ymd_opt(year, month, day)
            .ok_or_else(|| DbError::InvalidDate(format!("{year}-{month:02}-{day:02}")))
    };

    SEED_CALENDAR
        .iter()
        .map(|&(name, start_month, start_day, end_month, end_day, recess)| {
            Ok(TurnPeriod {
                name: name.to_string(),
                starts_on: date(start_month, start_day)?,
                ends_on: date(end_month, end_day)?,
                recess,
            })
        })
        .collect()
}
