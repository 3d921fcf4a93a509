//! Database schema and record types

use chrono::NaiveDate;
use serde::Serialize;

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS mesas (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    materia TEXT NOT NULL,
    turno TEXT NOT NULL,
    fecha TEXT NOT NULL,
    hora TEXT NOT NULL,
    aula TEXT NOT NULL,
    carrera TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_mesas_materia ON mesas(materia, turno);

CREATE TABLE IF NOT EXISTS sedes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    nombre TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS aulas (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    nombre TEXT NOT NULL,
    sede_id INTEGER,
    FOREIGN KEY (sede_id) REFERENCES sedes(id)
);

CREATE TABLE IF NOT EXISTS carreras (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    nombre TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS materias (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    nombre TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS turnos_config (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    nombre TEXT NOT NULL,
    fecha_inicio TEXT NOT NULL,
    fecha_fin TEXT NOT NULL,
    receso INTEGER NOT NULL DEFAULT 0
);
";

/// Added after the first release; applied with the duplicate-column error ignored.
pub const MIGRATION_ADD_EDITED_AT: &str = "ALTER TABLE mesas ADD COLUMN fecha_edicion TEXT";

/// Campus shown when a room has no campus assigned
pub const UNASSIGNED_CAMPUS: &str = "Sin asignar";

/// Storage format of period boundaries
pub const PERIOD_DATE_FORMAT: &str = "%Y-%m-%d";

/// One scheduled exam sitting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExamRow {
    pub subject: String,
    /// Turn label as stored, e.g. "3° Turno"
    pub turn: String,
    /// Display date, `DD/MM/YYYY`
    pub date: String,
    pub time: String,
    pub room: String,
    pub campus: String,
    pub degree: String,
    /// Last edit stamp, empty when never edited
    pub edited_at: String,
}

/// Input for [`super::Database::insert_mesa`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMesa {
    pub subject: String,
    pub turn: String,
    pub date: String,
    pub time: String,
    pub room: String,
    pub degree: String,
    pub edited_at: Option<String>,
}

/// A named exam period of the academic calendar
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnPeriod {
    pub name: String,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    /// Falls during an academic recess
    pub recess: bool,
}

// ============================================================
// Reference data
// ============================================================

pub(crate) const SEED_CAMPUSES: &[&str] = &["Campus Resistencia", "Campus Corrientes", "Edificio Central"];

pub(crate) const SEED_DEGREES: &[&str] = &[
    "Ingeniería en Sistemas",
    "Licenciatura en Matemática",
    "Profesorado en Física",
];

/// (room, campus index into [`SEED_CAMPUSES`], 1-based)
pub(crate) const SEED_ROOMS: &[(&str, i64)] = &[
    ("Aula 1 - PB", 1),
    ("Aula 2 - PB", 1),
    ("Aula Magna", 1),
    ("Laboratorio 1", 2),
    ("Laboratorio 2", 2),
    ("Sala de Conferencias", 3),
];

pub(crate) const SEED_SUBJECTS: &[&str] = &[
    "Álgebra I",
    "Álgebra II",
    "Análisis Matemático I",
    "Física I",
    "Algoritmos y Estructuras de Datos",
    "Sistemas Operativos",
];

/// (period name, start month, start day, end month, end day, recess)
pub(crate) const SEED_CALENDAR: &[(&str, u32, u32, u32, u32, bool)] = &[
    ("1° Turno", 2, 17, 2, 21, true),
    ("2° Turno", 3, 10, 3, 14, true),
    ("3° Turno", 3, 25, 3, 31, true),
    ("4° Turno", 5, 5, 5, 30, false),
    ("5° Turno", 6, 30, 7, 4, true),
    ("6° Turno", 7, 28, 8, 1, true),
    ("7° Turno", 9, 1, 9, 26, false),
    ("8° Turno", 10, 6, 10, 31, false),
    ("9° Turno", 11, 24, 12, 1, true),
    ("10° Turno", 12, 15, 12, 19, true),
];

/// (subject, degree, room, time, turns with a sitting)
pub(crate) const SEED_MESAS: &[(&str, &str, &str, &str, &[usize])] = &[
    ("Álgebra I", "Licenciatura en Matemática", "Aula Magna", "08:00", &[1, 3, 5, 8]),
    ("Álgebra II", "Licenciatura en Matemática", "Aula Magna", "14:00", &[2, 4, 7, 9]),
    ("Análisis Matemático I", "Ingeniería en Sistemas", "Aula 1 - PB", "08:00", &[1, 4, 7, 10]),
    ("Física I", "Profesorado en Física", "Laboratorio 1", "09:00", &[3, 6, 8]),
    ("Algoritmos y Estructuras de Datos", "Ingeniería en Sistemas", "Laboratorio 2", "15:00", &[2, 5, 8]),
    ("Sistemas Operativos", "Ingeniería en Sistemas", "Sala de Conferencias", "18:00", &[4, 9]),
];
