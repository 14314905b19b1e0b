//! Global hotkey command source.
//!
//! Registers CTRL+SHIFT+Space as a global hotkey and forwards presses to
//! the session's command channel as listen invocations. The session state
//! machine decides what a press means; this source never tracks state.

use crate::{AppCommand, AppError, AppResult, CommandInvocation, CommandKind, CommandSource};

use std::{panic::Location, time::Duration};

use error_location::ErrorLocation;
use global_hotkey::{
    GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState,
    hotkey::{Code, HotKey, Modifiers},
};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, warn};

/// Forwards global hotkey presses into the command channel.
pub struct HotkeySource {
    hotkey_id: u32,
    command_tx: mpsc::Sender<AppCommand>,
}

impl HotkeySource {
    /// Register CTRL+SHIFT+Space as the global hotkey.
    ///
    /// Must be called on a thread with a message pump on Windows so that
    /// `WM_HOTKEY` messages are dispatched. The returned
    /// [`GlobalHotKeyManager`] must be kept alive on that thread for the
    /// hotkey to remain registered.
    #[track_caller]
    #[instrument]
    pub fn register_hotkey() -> AppResult<(GlobalHotKeyManager, u32)> {
        let manager =
            GlobalHotKeyManager::new().map_err(|e| AppError::HotkeyRegistrationFailed {
                reason: format!("Failed to create manager: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        let hotkey = HotKey::new(Some(Modifiers::CONTROL | Modifiers::SHIFT), Code::Space);

        manager
            .register(hotkey)
            .map_err(|e| AppError::HotkeyRegistrationFailed {
                reason: format!("Failed to register CTRL+SHIFT+Space: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        info!(hotkey = "CTRL+SHIFT+Space", "Global hotkey registered");

        Ok((manager, hotkey.id()))
    }

    /// Create a source for a previously registered hotkey.
    ///
    /// The `hotkey_id` should come from [`HotkeySource::register_hotkey`].
    /// This struct is `Send` and can live on any thread — it only listens
    /// on the global [`GlobalHotKeyEvent`] channel.
    pub fn new(hotkey_id: u32, command_tx: mpsc::Sender<AppCommand>) -> Self {
        Self {
            hotkey_id,
            command_tx,
        }
    }

    /// Run the hotkey forwarding loop until a shutdown signal arrives.
    #[instrument(skip(self))]
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) -> AppResult<()> {
        let receiver = GlobalHotKeyEvent::receiver().clone();
        let (event_tx, mut event_rx) = mpsc::channel(32);

        // Single persistent blocking task that forwards hotkey events.
        // GlobalHotKeyEvent::receiver() returns a crossbeam_channel::Receiver
        // which has blocking recv() -- zero polling, instant response, one thread.
        //
        // Shutdown: when event_rx is dropped (loop breaks), the next
        // event_tx.blocking_send() fails, breaking the blocking loop.
        let handle = tokio::task::spawn_blocking(move || {
            while let Ok(event) = receiver.recv() {
                if event_tx.blocking_send(event).is_err() {
                    break;
                }
            }
        });

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    info!("Hotkey source shutting down");
                    break;
                }
                Some(event) = event_rx.recv() => {
                    if event.id == self.hotkey_id && event.state == HotKeyState::Pressed {
                        self.forward_press().await?;
                    }
                }
            }
        }

        // Drop event_rx to unblock the blocking task's next blocking_send().
        drop(event_rx);

        // Best-effort join: the blocking task may be stuck in recv() if no
        // hotkey event arrives after shutdown. Use a timeout to avoid hanging.
        match tokio::time::timeout(Duration::from_secs(1), handle).await {
            Ok(Ok(())) => debug!("Hotkey event forwarder stopped cleanly"),
            Ok(Err(e)) => warn!(error = ?e, "Hotkey event forwarder task panicked"),
            Err(_) => debug!(
                "Hotkey event forwarder did not stop within timeout, \
                   will be cleaned up on exit"
            ),
        }

        Ok(())
    }

    async fn forward_press(&self) -> AppResult<()> {
        let invocation = CommandInvocation::new(CommandKind::Listen, CommandSource::Hotkey);

        self.command_tx
            .send(AppCommand::Invocation(invocation))
            .await
            .map_err(|e| AppError::ChannelSendFailed {
                message: format!("Failed to forward hotkey press: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        debug!("Hotkey press forwarded");

        Ok(())
    }
}
