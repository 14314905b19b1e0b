/// Phase of the dictation session.
///
/// `Recording` and `Transcribing` are mutually exclusive; either can
/// coexist with a pending shutdown request during a graceful drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for a trigger.
    Idle,
    /// Microphone capture in progress.
    Recording,
    /// Captured audio handed to the provider; includes the preview window.
    Transcribing,
}

/// Immutable snapshot of session state taken at dispatch time.
///
/// Guards evaluate against this snapshot, not live state, so one dispatch
/// pass stays consistent even while the session keeps moving.
#[derive(Debug, Clone, Copy)]
pub struct StateSnapshot {
    /// Microphone capture in progress.
    pub recording: bool,
    /// Transcription or its preview window in progress.
    pub transcribing: bool,
    /// A transcript preview is open and undecided.
    pub preview_active: bool,
    /// Graceful shutdown has been requested.
    pub shutdown_requested: bool,
    /// The session is tearing down.
    pub shutting_down: bool,
}

impl StateSnapshot {
    /// Default guard: commands are handled until shutdown begins.
    pub fn can_handle(&self) -> bool {
        !self.shutting_down && !self.shutdown_requested
    }
}
