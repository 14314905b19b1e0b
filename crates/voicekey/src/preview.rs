//! Single-flight transcript preview decision slot.
//!
//! At most one preview is open at a time. Its decision resolves exactly
//! once; the first resolver wins and every later attempt is a no-op. The
//! slot is cleared by `end` without resolving when the outcome no longer
//! matters.

use crate::{AppError, AppResult};

use std::{panic::Location, time::Duration};

use error_location::ErrorLocation;
use tokio::sync::oneshot;
use tracing::debug;

/// Extra wait granted past the preview display duration so a tap racing
/// the timeout still lands.
pub(crate) const CANCEL_WINDOW_PADDING: Duration = Duration::from_millis(560);

/// What should happen to a just-transcribed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewDecision {
    /// No user action before the budget elapsed; paste honoring the
    /// configured auto-submit setting.
    TimeoutPaste,
    /// Abandon the transcript.
    Cancel,
    /// Paste but never auto-submit, even when configured on.
    PasteWithoutSend,
}

/// Exactly-once-resolved decision slot for the open preview.
pub struct PreviewCoordinator {
    active_message_id: i64,
    decision_tx: Option<oneshot::Sender<PreviewDecision>>,
}

impl PreviewCoordinator {
    /// Coordinator with no active preview.
    pub fn new() -> Self {
        Self {
            active_message_id: 0,
            decision_tx: None,
        }
    }

    /// True between `begin` and `end`.
    pub fn is_active(&self) -> bool {
        self.active_message_id != 0
    }

    /// Message id of the open preview, if any.
    pub fn active_message_id(&self) -> Option<i64> {
        (self.active_message_id != 0).then_some(self.active_message_id)
    }

    /// Open a preview keyed by `message_id` and return its decision future.
    #[track_caller]
    pub fn begin(&mut self, message_id: i64) -> AppResult<oneshot::Receiver<PreviewDecision>> {
        if message_id <= 0 {
            return Err(AppError::InvalidMessageId {
                id: message_id,
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if self.is_active() {
            return Err(AppError::PreviewAlreadyActive {
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let (tx, rx) = oneshot::channel();
        self.active_message_id = message_id;
        self.decision_tx = Some(tx);

        debug!(message_id, "Preview opened");

        Ok(rx)
    }

    /// Clear the active preview without resolving its decision. Idempotent.
    pub fn end(&mut self) {
        self.active_message_id = 0;
        self.decision_tx = None;
    }

    /// Resolve the open preview. First caller wins and gets `true`; every
    /// later attempt, and any attempt with no preview open, gets `false`.
    pub fn try_resolve(&mut self, decision: PreviewDecision) -> bool {
        if !self.is_active() {
            return false;
        }

        match self.decision_tx.take() {
            Some(tx) => tx.send(decision).is_ok(),
            None => false,
        }
    }

    /// Resolve with `Cancel`, but only for a tap on the currently open
    /// preview. A stale tap from an already-ended preview is ignored.
    pub fn try_resolve_from_overlay_tap(&mut self, message_id: i64) -> bool {
        if message_id <= 0 || message_id != self.active_message_id {
            return false;
        }

        self.try_resolve(PreviewDecision::Cancel)
    }
}

impl Default for PreviewCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
