//! Presentation layer interface.
//!
//! The session reports status, errors, and transcript previews through this
//! trait. Overlay rendering lives outside this crate; the default
//! implementation writes structured log lines. Frontends report preview
//! taps back through the session's command channel.

use std::time::Duration;

use tracing::{info, warn};

/// How a notice should read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeTone {
    /// Neutral progress information.
    Info,
    /// A completed action.
    Success,
    /// Something off, but the session continues.
    Warning,
    /// A failed action.
    Error,
}

/// Status or preview text shown to the user.
pub trait Presenter: Send + Sync {
    /// Show a transient status notice.
    fn show_notice(&self, text: &str, tone: NoticeTone);

    /// Show the transcript preview identified by `message_id` for
    /// `duration`. A tap on it must be reported back with the same id.
    fn show_preview(&self, message_id: i64, text: &str, duration: Duration);
}

/// Presenter that renders everything as log lines.
pub struct LogPresenter;

impl Presenter for LogPresenter {
    fn show_notice(&self, text: &str, tone: NoticeTone) {
        match tone {
            NoticeTone::Warning | NoticeTone::Error => warn!(tone = ?tone, "{text}"),
            _ => info!(tone = ?tone, "{text}"),
        }
    }

    fn show_preview(&self, message_id: i64, text: &str, duration: Duration) {
        info!(
            message_id,
            duration_ms = duration.as_millis(),
            "Preview: {text}"
        );
    }
}
