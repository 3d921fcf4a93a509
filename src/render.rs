//! Chat markup
//!
//! The state machine describes what to show as a [`Fragment`]; a
//! [`Renderer`](crate::runtime::Renderer) turns it into the payload sent over
//! the socket. [`HtmlRenderer`] produces the markup the bundled chat page
//! expects: bot bubbles, result cards whose `id` is the result handle,
//! option buttons carrying `data-option`, and a hidden `data-export` marker
//! that makes the page download a card.

use crate::db::{ExamRow, TurnPeriod};
use crate::runtime::Renderer;
use crate::state_machine::state::{ResultHandle, TurnLabel};
use std::fmt::Write as _;

/// Canned bot messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotMessage {
    MenuPrompt,
    Help,
    AskSubject,
    AskTurn,
    TurnAccepted { turn: TurnLabel },
    InvalidTurn,
    SubjectNotFound { query: String },
    NoSchedule { subject: String },
    NotInTurn { subject: String, turn: TurnLabel },
    NoUpcomingPeriods,
    DownloadPrompt,
    Downloading,
    DownloadDeclined,
    QueryError,
    Recovered,
}

/// Something to show the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Message(BotMessage),
    FullSchedule {
        handle: ResultHandle,
        subject: String,
        rows: Vec<ExamRow>,
    },
    SingleTurn {
        handle: ResultHandle,
        row: ExamRow,
    },
    UpcomingPeriods {
        handle: ResultHandle,
        periods: Vec<TurnPeriod>,
    },
    Disambiguation {
        candidates: Vec<String>,
    },
    ExportTrigger {
        handle: ResultHandle,
    },
}

impl Fragment {
    pub fn kind(&self) -> &'static str {
        match self {
            Fragment::Message(_) => "plain_message",
            Fragment::FullSchedule { .. } => "full_schedule",
            Fragment::SingleTurn { .. } => "single_turn",
            Fragment::UpcomingPeriods { .. } => "upcoming_periods",
            Fragment::Disambiguation { .. } => "disambiguation_list",
            Fragment::ExportTrigger { .. } => "export_trigger",
        }
    }
}

/// Renders fragments as the chat page's HTML
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

impl Renderer for HtmlRenderer {
    fn render(&self, fragment: &Fragment) -> String {
        match fragment {
            Fragment::Message(message) => bot_bubble(&message_html(message)),
            Fragment::FullSchedule {
                handle,
                subject,
                rows,
            } => full_schedule_card(handle, subject, rows),
            Fragment::SingleTurn { handle, row } => single_turn_card(handle, row),
            Fragment::UpcomingPeriods { handle, periods } => periods_card(handle, periods),
            Fragment::Disambiguation { candidates } => disambiguation(candidates),
            Fragment::ExportTrigger { handle } => format!(
                r#"<div class="export-trigger" data-export="{}" hidden></div>"#,
                escape(handle.as_str())
            ),
        }
    }
}

fn message_html(message: &BotMessage) -> String {
    match message {
        BotMessage::MenuPrompt => concat!(
            "<p>¿Qué necesitás saber?</p>",
            r#"<p class="menu-options">"#,
            "<strong>1</strong> - Buscar todas las fechas de una materia<br>",
            "<strong>2</strong> - Buscar fecha en un turno específico<br>",
            "<strong>3</strong> - Ver qué turnos faltan este año",
            "</p>",
            r#"<p class="hint">También podés escribir directamente el nombre de la materia.</p>"#,
        )
        .to_string(),
        BotMessage::Help => concat!(
            "<p>Puedo ayudarte a encontrar las mesas de examen.</p>",
            "<p>Elegí una opción del menú con su número, o escribí el nombre de una materia. ",
            "En cualquier momento escribí <strong>menu</strong> para volver al inicio.</p>",
        )
        .to_string(),
        BotMessage::AskSubject => "<p>Perfecto. ¿Qué materia estás buscando?</p>".to_string(),
        BotMessage::AskTurn => {
            "<p>Dale. ¿Qué número de Turno te interesa? (1 al 10)</p>".to_string()
        }
        BotMessage::TurnAccepted { turn } => format!(
            "<p>Entendido, <strong>{}</strong>. ¿De qué materia querés saber la fecha?</p>",
            escape(turn.as_str())
        ),
        BotMessage::InvalidTurn => {
            "<p>⚠️ Por favor ingresá solo un número del 1 al 10.</p>".to_string()
        }
        BotMessage::SubjectNotFound { query } => format!(
            "<p>❌ No encontré ninguna materia que suene como <strong>{}</strong>. \
             Por favor, revisá el nombre e intentá de nuevo.</p>",
            escape(query)
        ),
        BotMessage::NoSchedule { subject } => format!(
            "<p>❌ No encontré ninguna mesa para <strong>{}</strong>.</p>",
            escape(subject)
        ),
        BotMessage::NotInTurn { subject, turn } => format!(
            "<p>❌ <strong>{}</strong> no tiene mesa en el <strong>{}</strong>.</p>",
            escape(subject),
            escape(turn.as_str())
        ),
        BotMessage::NoUpcomingPeriods => {
            "<p>📅 Ya finalizaron todos los turnos del calendario de este año.</p>".to_string()
        }
        BotMessage::DownloadPrompt => concat!(
            "<p>¿Querés descargar esta información? ",
            "(Escribí <strong>sí</strong> o <strong>no</strong>)</p>",
        )
        .to_string(),
        BotMessage::Downloading => "<p>¡Perfecto! Descargando... 📥</p>".to_string(),
        BotMessage::DownloadDeclined => "<p>Entendido 👍</p>".to_string(),
        BotMessage::QueryError => {
            "<p>Error en el servidor. Intentá de nuevo en un momento.</p>".to_string()
        }
        BotMessage::Recovered => {
            "<p>Perdón, hubo un problema. Volvamos al menú principal.</p>".to_string()
        }
    }
}

fn bot_bubble(inner: &str) -> String {
    format!(
        r#"<div class="message-container bot"><div class="avatar">✨</div><div class="message-content">{inner}</div></div>"#
    )
}

fn full_schedule_card(handle: &ResultHandle, subject: &str, rows: &[ExamRow]) -> String {
    let mut html = format!(
        r#"<div class="result-card" id="{}"><div class="card-title">{}</div>"#,
        escape(handle.as_str()),
        escape(subject)
    );
    if let Some(first) = rows.first() {
        let _ = write!(html, r#"<div class="card-subtitle">{}</div>"#, escape(&first.degree));
    }
    html.push_str(concat!(
        r#"<div class="schedule-grid">"#,
        "<div class=\"th\">#</div><div class=\"th\">Fecha</div><div class=\"th\">Hora</div>",
        "<div class=\"th\">Aula</div><div class=\"th\">Act.</div>",
    ));
    for row in rows {
        let _ = write!(
            html,
            r#"<div>{}</div><div>{}</div><div>{}</div><div>{} <span class="campus">({})</span></div><div class="edited">{}</div>"#,
            escape(&row.turn),
            escape(&row.date),
            escape(&row.time),
            escape(&row.room),
            escape(&row.campus),
            escape(&row.edited_at)
        );
    }
    html.push_str("</div></div>");
    html
}

fn single_turn_card(handle: &ResultHandle, row: &ExamRow) -> String {
    let mut html = format!(
        r#"<div class="result-card" id="{}"><div class="card-title">{}</div><div class="card-subtitle">{}</div><div class="card-turn"><strong>{}</strong></div>"#,
        escape(handle.as_str()),
        escape(&row.subject),
        escape(&row.degree),
        escape(&row.turn)
    );
    let _ = write!(
        html,
        r#"<div class="turn-grid"><div><span class="label">📅 Fecha:</span><br><strong>{}</strong></div><div><span class="label">🕐 Hora:</span><br><strong>{}</strong></div><div><span class="label">🏫 Aula:</span><br><strong>{}</strong><br><span class="campus">({})</span></div></div>"#,
        escape(&row.date),
        escape(&row.time),
        escape(&row.room),
        escape(&row.campus)
    );
    if !row.edited_at.is_empty() {
        let _ = write!(
            html,
            r#"<div class="edited">Actualizado: {}</div>"#,
            escape(&row.edited_at)
        );
    }
    html.push_str("</div>");
    html
}

fn periods_card(handle: &ResultHandle, periods: &[TurnPeriod]) -> String {
    let mut inner = format!(
        r#"<p><strong>📅 Turnos que faltan este año:</strong></p><div class="result-card" id="{}">"#,
        escape(handle.as_str())
    );
    for period in periods {
        let (icon, suffix) = if period.recess {
            ("🏖️ ", " (Receso)")
        } else {
            ("📚 ", "")
        };
        let _ = write!(
            inner,
            r#"<div class="period"><div class="period-name">{icon}{}{suffix}</div><div class="period-dates">📍 <strong>Inicio:</strong> {}<br>📍 <strong>Fin:</strong> {}</div></div>"#,
            escape(&period.name),
            period.starts_on.format("%d/%m/%Y"),
            period.ends_on.format("%d/%m/%Y")
        );
    }
    inner.push_str("</div>");
    bot_bubble(&inner)
}

fn disambiguation(candidates: &[String]) -> String {
    let mut inner =
        String::from(r#"<p>Encontré varias opciones. ¿A cuál te referís?</p><div class="options">"#);
    for candidate in candidates {
        let escaped = escape(candidate);
        let _ = write!(
            inner,
            r#"<button class="option-button" data-option="{escaped}">{escaped}</button>"#
        );
    }
    inner.push_str("</div>");
    bot_bubble(&inner)
}

/// Escape text for element content and double-quoted attributes
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
