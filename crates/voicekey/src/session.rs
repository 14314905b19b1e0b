//! The dictation session state machine.
//!
//! One task owns all session state and drains a bounded command channel.
//! Hotkey presses, cross-process signals, overlay taps, and the completion
//! reports of background work all arrive as [`AppCommand`]s; nothing else
//! ever touches the state. Within one dictation cycle, capture-stop
//! strictly precedes transcription, which precedes the preview, which
//! precedes injection.

use crate::{
    AppError, AppResult,
    capture::CaptureSession,
    command_router::{CommandBinding, CommandInvocation, CommandKind, CommandRouter, CommandSource},
    config::Config,
    inject::TextInjector,
    present::{NoticeTone, Presenter},
    preview::{CANCEL_WINDOW_PADDING, PreviewCoordinator, PreviewDecision},
    session_state::{Phase, StateSnapshot},
    transcribe::{TRANSCRIBE_TIMEOUT, TranscriptionProvider},
    voice_command::{self, VoiceCommand},
};

use std::{panic::Location, sync::Arc, time::Duration};

use error_location::ErrorLocation;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Capacity of the session command channel.
const COMMAND_CHANNEL_CAPACITY: usize = 32;

/// Builds a transcription provider from the current configuration, or
/// `None` when credentials are missing.
pub type ProviderFactory = Box<dyn Fn(&Config) -> Option<Arc<dyn TranscriptionProvider>> + Send>;

/// Commands consumed by the session's dispatch task.
#[derive(Debug)]
pub enum AppCommand {
    /// A trigger from any command source.
    Invocation(CommandInvocation),
    /// The user tapped the preview identified by `message_id`.
    OverlayTap {
        /// Id of the tapped preview message.
        message_id: i64,
    },
    /// A background transcription attempt concluded.
    TranscriptionFinished {
        /// Cycle the attempt belonged to.
        cycle_id: Uuid,
        /// Recognized text or the failure.
        result: AppResult<String>,
    },
    /// The preview wait task took its decision.
    PreviewDecided {
        /// Id of the decided preview message.
        message_id: i64,
        /// The winning decision.
        decision: PreviewDecision,
    },
}

/// Handler descriptors registered into the command router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    /// Resolve the open preview as accept-without-send instead of starting
    /// a new recording.
    AcceptPreview,
    /// Toggle the recording/transcribing cycle.
    ToggleDictation,
    /// Discard the active recording instead of submitting.
    CancelRecording,
    /// Cancel the open preview, then submit.
    CancelPreviewThenSubmit,
    /// Submit directly via the text injector.
    SubmitDirect,
    /// Begin a graceful shutdown.
    RequestShutdown,
    /// Run a recognized voice command.
    RunVoiceCommand(VoiceCommand),
}

fn guard_can_handle(state: &StateSnapshot) -> bool {
    state.can_handle()
}

fn guard_preview_accept(state: &StateSnapshot) -> bool {
    state.can_handle() && state.transcribing && state.preview_active
}

fn guard_recording(state: &StateSnapshot) -> bool {
    state.can_handle() && state.recording
}

fn guard_preview_open(state: &StateSnapshot) -> bool {
    state.can_handle() && state.preview_active
}

fn guard_always(_state: &StateSnapshot) -> bool {
    true
}

/// The dictation state machine and home of all guarded command handlers.
pub struct SessionController {
    capture: Box<dyn CaptureSession>,
    injector: Box<dyn TextInjector>,
    presenter: Arc<dyn Presenter>,
    provider: Option<Arc<dyn TranscriptionProvider>>,
    provider_factory: ProviderFactory,
    config: Config,
    router: CommandRouter<SessionAction>,
    preview: PreviewCoordinator,
    phase: Phase,
    shutdown_requested: bool,
    shutting_down: bool,
    command_tx: mpsc::Sender<AppCommand>,
    command_rx: mpsc::Receiver<AppCommand>,
    shutdown_tx: watch::Sender<bool>,
    /// Cancellation for the in-flight transcription attempt, if any.
    cancel_tx: Option<watch::Sender<bool>>,
    active_cycle: Option<Uuid>,
    pending_transcript: Option<String>,
    next_message_id: i64,
}

impl SessionController {
    /// Build a session around the given collaborators.
    pub fn new(
        capture: Box<dyn CaptureSession>,
        injector: Box<dyn TextInjector>,
        presenter: Arc<dyn Presenter>,
        provider_factory: ProviderFactory,
        config: Config,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (shutdown_tx, _) = watch::channel(false);
        let provider = provider_factory(&config);

        Self {
            capture,
            injector,
            presenter,
            provider,
            provider_factory,
            config,
            router: CommandRouter::new(),
            preview: PreviewCoordinator::new(),
            phase: Phase::Idle,
            shutdown_requested: false,
            shutting_down: false,
            command_tx,
            command_rx,
            shutdown_tx,
            cancel_tx: None,
            active_cycle: None,
            pending_transcript: None,
            next_message_id: 0,
        }
    }

    /// Sender feeding the session's command channel.
    pub fn command_sender(&self) -> mpsc::Sender<AppCommand> {
        self.command_tx.clone()
    }

    /// Receiver that flips to `true` when the session has shut down.
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Run the dispatch loop until shutdown completes.
    #[instrument(skip(self))]
    pub async fn run(mut self) -> AppResult<()> {
        self.register_bindings();
        info!("VoiceKey session ready");

        while let Some(command) = self.command_rx.recv().await {
            match command {
                AppCommand::Invocation(invocation) => {
                    self.dispatch(invocation);
                }
                AppCommand::OverlayTap { message_id } => {
                    // Taps for an already-ended preview are expected UI
                    // races and stay silent.
                    if !self.preview.try_resolve_from_overlay_tap(message_id) {
                        debug!(message_id, "Stale overlay tap ignored");
                    }
                }
                AppCommand::TranscriptionFinished { cycle_id, result } => {
                    self.on_transcription_finished(cycle_id, result);
                }
                AppCommand::PreviewDecided {
                    message_id,
                    decision,
                } => {
                    self.on_preview_decided(message_id, decision);
                }
            }

            if self.should_exit() {
                break;
            }
        }

        self.shutting_down = true;
        let _ = self.shutdown_tx.send(true);
        info!("VoiceKey session shut down");

        Ok(())
    }

    /// All guarded handlers, in registration order.
    fn register_bindings(&mut self) {
        self.router.register(
            CommandBinding::new(
                "listen.accept-preview",
                CommandKind::Listen,
                guard_preview_accept,
                SessionAction::AcceptPreview,
            )
            .with_priority(10),
        );
        self.router.register(CommandBinding::new(
            "listen.toggle",
            CommandKind::Listen,
            guard_can_handle,
            SessionAction::ToggleDictation,
        ));
        self.router.register(
            CommandBinding::new(
                "submit.cancel-recording",
                CommandKind::Submit,
                guard_recording,
                SessionAction::CancelRecording,
            )
            .with_priority(10),
        );
        self.router.register(
            CommandBinding::new(
                "submit.resolve-preview",
                CommandKind::Submit,
                guard_preview_open,
                SessionAction::CancelPreviewThenSubmit,
            )
            .with_priority(5),
        );
        self.router.register(CommandBinding::new(
            "submit.direct",
            CommandKind::Submit,
            guard_can_handle,
            SessionAction::SubmitDirect,
        ));
        self.router.register(CommandBinding::new(
            "close.shutdown",
            CommandKind::Close,
            guard_always,
            SessionAction::RequestShutdown,
        ));

        for command in [
            VoiceCommand::Exit,
            VoiceCommand::OpenSettings,
            VoiceCommand::AutoSendOn,
            VoiceCommand::AutoSendOff,
            VoiceCommand::Submit,
            VoiceCommand::ShowCommands,
        ] {
            self.router.register(CommandBinding::new(
                "voice.command",
                CommandKind::Voice(command),
                guard_can_handle,
                SessionAction::RunVoiceCommand(command),
            ));
        }
    }

    fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            recording: self.phase == Phase::Recording,
            transcribing: self.phase == Phase::Transcribing,
            preview_active: self.preview.is_active(),
            shutdown_requested: self.shutdown_requested,
            shutting_down: self.shutting_down,
        }
    }

    fn should_exit(&self) -> bool {
        self.shutdown_requested && self.phase == Phase::Idle && !self.preview.is_active()
    }

    /// Route one invocation through the binding table.
    #[instrument(
        skip(self),
        fields(
            kind = ?invocation.kind,
            source = ?invocation.source,
            ignore_prefix = invocation.ignore_prefix,
        )
    )]
    fn dispatch(&mut self, invocation: CommandInvocation) -> bool {
        let snapshot = self.snapshot();

        // Handlers mutate the session, so the table is taken out for the
        // duration of the pass. Registration only happens at startup.
        let router = std::mem::take(&mut self.router);
        let handled = router.dispatch(&invocation, &snapshot, |action, _, _| {
            self.execute(*action)
        });
        self.router = router;

        if !handled {
            debug!("Command not handled");
        }
        handled
    }

    fn execute(&mut self, action: SessionAction) -> bool {
        match action {
            SessionAction::AcceptPreview => {
                // A second listen while previewing means "accept and move on".
                self.preview.try_resolve(PreviewDecision::PasteWithoutSend)
            }
            SessionAction::ToggleDictation => self.toggle_dictation(),
            SessionAction::CancelRecording => {
                self.capture.abort();
                self.phase = Phase::Idle;
                self.presenter
                    .show_notice("Recording discarded", NoticeTone::Info);
                info!("Recording cancelled instead of submitted");
                true
            }
            SessionAction::CancelPreviewThenSubmit => {
                if !self.preview.try_resolve(PreviewDecision::Cancel) {
                    return false;
                }
                self.do_submit();
                true
            }
            SessionAction::SubmitDirect => {
                self.do_submit();
                true
            }
            SessionAction::RequestShutdown => {
                self.request_shutdown();
                true
            }
            SessionAction::RunVoiceCommand(command) => self.run_voice_command(command),
        }
    }

    fn toggle_dictation(&mut self) -> bool {
        match self.phase {
            Phase::Idle => self.start_recording(),
            Phase::Recording => self.stop_and_transcribe(),
            Phase::Transcribing => {
                self.presenter
                    .show_notice("Still processing previous dictation...", NoticeTone::Info);
                true
            }
        }
    }

    fn start_recording(&mut self) -> bool {
        if self.provider.is_none() {
            self.provider = (self.provider_factory)(&self.config);
        }
        if self.provider.is_none() {
            self.presenter
                .show_notice("No API key configured — check settings", NoticeTone::Warning);
            return true;
        }

        match self.capture.start() {
            Ok(()) => {
                self.phase = Phase::Recording;
                self.presenter
                    .show_notice("Listening... speak now", NoticeTone::Info);
                info!("Recording started");
            }
            Err(e) => {
                error!(error = ?e, "Failed to start recording");
                self.presenter
                    .show_notice(&format!("Microphone error: {e}"), NoticeTone::Error);
            }
        }

        true
    }

    /// Stop capture and hand the take to the provider on a background task.
    fn stop_and_transcribe(&mut self) -> bool {
        self.phase = Phase::Transcribing;
        self.presenter
            .show_notice("Processing voice...", NoticeTone::Info);

        let audio = match self.capture.stop() {
            Ok(audio) => audio,
            Err(e) => {
                error!(error = ?e, "Failed to stop recording");
                self.presenter
                    .show_notice(&format!("Capture error: {e}"), NoticeTone::Error);
                self.phase = Phase::Idle;
                return true;
            }
        };

        info!(
            bytes = audio.wav_bytes.len(),
            peak = audio.peak_amplitude,
            "Audio captured"
        );

        if audio.is_likely_silence() {
            self.presenter
                .show_notice("No speech detected", NoticeTone::Info);
            self.phase = Phase::Idle;
            return true;
        }

        let Some(provider) = self.provider.clone() else {
            self.presenter
                .show_notice("No API key configured — check settings", NoticeTone::Warning);
            self.phase = Phase::Idle;
            return true;
        };

        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.cancel_tx = Some(cancel_tx);

        let cycle_id = Uuid::new_v4();
        self.active_cycle = Some(cycle_id);

        let command_tx = self.command_tx.clone();
        tokio::spawn(async move {
            let start = std::time::Instant::now();
            let call = tokio::task::spawn_blocking(move || {
                provider.transcribe(&audio.wav_bytes, &cancel_rx)
            });

            let result = match tokio::time::timeout(TRANSCRIBE_TIMEOUT, call).await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => Err(transcription_task_failed(&e.to_string())),
                Err(_) => Err(transcription_timed_out()),
            };

            debug!(
                cycle_id = %cycle_id,
                duration_ms = start.elapsed().as_millis(),
                "Transcription attempt finished"
            );
            let _ = command_tx
                .send(AppCommand::TranscriptionFinished { cycle_id, result })
                .await;
        });

        true
    }

    fn on_transcription_finished(&mut self, cycle_id: Uuid, result: AppResult<String>) {
        if self.active_cycle != Some(cycle_id) {
            debug!(cycle_id = %cycle_id, "Stale transcription result ignored");
            return;
        }
        self.active_cycle = None;
        self.cancel_tx = None;

        let text = match result {
            Ok(text) => text,
            Err(e) => {
                error!(cycle_id = %cycle_id, error = ?e, "Transcription failed");
                if e.is_authentication() {
                    // Force reconfiguration on the next attempt.
                    self.provider = None;
                }
                self.presenter
                    .show_notice(&format!("Error: {e}"), NoticeTone::Error);
                self.phase = Phase::Idle;
                return;
            }
        };

        if text.trim().is_empty() {
            self.presenter
                .show_notice("No speech detected", NoticeTone::Info);
            self.phase = Phase::Idle;
            return;
        }

        if let Some(command) = voice_command::parse(&text, &self.config.behavior) {
            info!(command = ?command, "Voice command detected");
            self.phase = Phase::Idle;
            let invocation =
                CommandInvocation::new(CommandKind::Voice(command), CommandSource::Voice);
            self.dispatch(invocation);
            return;
        }

        if self.shutdown_requested {
            // Draining toward shutdown: no preview window, inject right away.
            self.inject_transcript(&text, self.config.behavior.auto_submit);
            self.phase = Phase::Idle;
            return;
        }

        self.open_preview(text);
    }

    /// Open the preview slot and park its wait on a background task.
    fn open_preview(&mut self, text: String) {
        self.next_message_id += 1;
        let message_id = self.next_message_id;

        let receiver = match self.preview.begin(message_id) {
            Ok(receiver) => receiver,
            Err(e) => {
                // The single-preview invariant broke; inject rather than
                // lose the transcript.
                error!(error = ?e, "Failed to open preview");
                self.inject_transcript(&text, self.config.behavior.auto_submit);
                self.phase = Phase::Idle;
                return;
            }
        };

        let display = Duration::from_millis(self.config.behavior.preview_duration_ms);
        self.presenter.show_preview(message_id, &text, display);
        self.pending_transcript = Some(text);

        let budget = display + CANCEL_WINDOW_PADDING;
        let command_tx = self.command_tx.clone();
        tokio::spawn(async move {
            let decision = match tokio::time::timeout(budget, receiver).await {
                Ok(Ok(decision)) => decision,
                // Ended without a resolution; nobody wants the text anymore.
                Ok(Err(_)) => PreviewDecision::Cancel,
                Err(_) => PreviewDecision::TimeoutPaste,
            };
            let _ = command_tx
                .send(AppCommand::PreviewDecided {
                    message_id,
                    decision,
                })
                .await;
        });
    }

    fn on_preview_decided(&mut self, message_id: i64, decision: PreviewDecision) {
        if self.preview.active_message_id() != Some(message_id) {
            debug!(message_id, "Stale preview decision ignored");
            return;
        }
        self.preview.end();
        self.phase = Phase::Idle;

        let Some(text) = self.pending_transcript.take() else {
            return;
        };

        info!(message_id, decision = ?decision, "Preview decided");

        match decision {
            PreviewDecision::Cancel => {
                self.presenter.show_notice("Canceled", NoticeTone::Info);
            }
            PreviewDecision::PasteWithoutSend => self.inject_transcript(&text, false),
            PreviewDecision::TimeoutPaste => {
                self.inject_transcript(&text, self.config.behavior.auto_submit);
            }
        }
    }

    fn inject_transcript(&mut self, text: &str, submit: bool) {
        match self.injector.inject(text, submit) {
            Ok(()) => self.presenter.show_notice(text, NoticeTone::Success),
            Err(e) => {
                warn!(error = ?e, "Injection failed, text remains on clipboard");
                self.presenter.show_notice(
                    &format!("{text}\n(copied to clipboard — paste manually)"),
                    NoticeTone::Warning,
                );
            }
        }
    }

    fn do_submit(&mut self) {
        if let Err(e) = self.injector.submit() {
            error!(error = ?e, "Submit failed");
            self.presenter
                .show_notice(&format!("Submit failed: {e}"), NoticeTone::Error);
        }
    }

    fn request_shutdown(&mut self) {
        if self.shutdown_requested {
            debug!("Shutdown already requested");
            return;
        }
        self.shutdown_requested = true;
        info!(phase = ?self.phase, "Shutdown requested");

        // Cooperative cancellation for whatever is in flight right now.
        if let Some(cancel) = &self.cancel_tx {
            let _ = cancel.send(true);
        }
        if self.preview.is_active() {
            // Take the timeout decision now instead of waiting out the window.
            let _ = self.preview.try_resolve(PreviewDecision::TimeoutPaste);
        }
        if self.phase == Phase::Recording {
            // Finish the in-flight recording, then transcribe, then exit
            // once back in Idle.
            let _ = self.stop_and_transcribe();
        }
    }

    fn run_voice_command(&mut self, command: VoiceCommand) -> bool {
        match command {
            VoiceCommand::Exit => {
                self.presenter.show_notice("Goodbye!", NoticeTone::Success);
                self.request_shutdown();
            }
            VoiceCommand::OpenSettings => {
                self.presenter
                    .show_notice("Opening settings...", NoticeTone::Info);
                match Config::config_path() {
                    Ok(path) => {
                        if let Err(e) = open::that(path) {
                            warn!(error = %e, "Failed to open configuration file");
                        }
                    }
                    Err(e) => warn!(error = ?e, "Failed to resolve configuration path"),
                }
            }
            VoiceCommand::AutoSendOn => self.set_auto_submit(true),
            VoiceCommand::AutoSendOff => self.set_auto_submit(false),
            VoiceCommand::Submit => self.do_submit(),
            VoiceCommand::ShowCommands => self.show_enabled_commands(),
        }

        true
    }

    fn set_auto_submit(&mut self, enabled: bool) {
        self.config.behavior.auto_submit = enabled;
        match self.config.save() {
            Ok(()) => {
                let label = if enabled { "enabled" } else { "disabled" };
                self.presenter
                    .show_notice(&format!("Auto-send {label}"), NoticeTone::Success);
                info!(enabled, "Auto-send toggled via voice command");
            }
            Err(e) => {
                error!(error = ?e, "Failed to persist auto-send setting");
                self.presenter
                    .show_notice("Failed to update auto-send setting", NoticeTone::Error);
            }
        }
    }

    fn show_enabled_commands(&self) {
        let behavior = &self.config.behavior;
        let mut names = Vec::new();

        if behavior.enable_exit_app_voice_command {
            names.push(VoiceCommand::Exit.display_name());
        }
        if behavior.enable_open_settings_voice_command {
            names.push(VoiceCommand::OpenSettings.display_name());
        }
        if behavior.enable_auto_send_voice_command {
            names.push(VoiceCommand::AutoSendOn.display_name());
            names.push(VoiceCommand::AutoSendOff.display_name());
        }
        if behavior.enable_submit_voice_command {
            names.push(VoiceCommand::Submit.display_name());
        }
        if behavior.enable_show_commands_voice_command {
            names.push(VoiceCommand::ShowCommands.display_name());
        }

        self.presenter
            .show_notice(&format!("Voice commands: {}", names.join(", ")), NoticeTone::Info);
    }
}

#[track_caller]
fn transcription_timed_out() -> AppError {
    AppError::TranscriptionFailed {
        reason: format!("No result within {TRANSCRIBE_TIMEOUT:?}"),
        authentication: false,
        location: ErrorLocation::from(Location::caller()),
    }
}

#[track_caller]
fn transcription_task_failed(reason: &str) -> AppError {
    AppError::TranscriptionFailed {
        reason: format!("Transcription task failed: {reason}"),
        authentication: false,
        location: ErrorLocation::from(Location::caller()),
    }
}
