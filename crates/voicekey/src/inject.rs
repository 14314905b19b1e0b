//! Clipboard-based text injection.
//!
//! Copies transcribed text to the clipboard and simulates the paste chord
//! into the focused window, optionally followed by Enter to submit it.

use crate::{AppError, AppResult, PasteKeyGuard};

use std::{panic::Location, time::Duration};

use arboard::Clipboard;
use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use error_location::ErrorLocation;
use tracing::{debug, info, instrument};

/// Delay between clipboard write and paste simulation.
///
/// This gives the OS clipboard manager time to process the write before
/// we simulate the paste chord. Too short and the paste may get stale
/// content; too long and the user perceives lag. 50ms is empirically
/// reliable across Windows, macOS, and Linux desktop environments.
const CLIPBOARD_SETTLE_DELAY: Duration = Duration::from_millis(50);

/// Delay between key events in the paste simulation.
///
/// Some applications and input method editors need a small gap between
/// key events to register them correctly. 10ms is the minimum reliable
/// interval; the Enter that follows a paste gets a slightly longer one.
const KEY_EVENT_DELAY: Duration = Duration::from_millis(10);
const SUBMIT_DELAY: Duration = Duration::from_millis(30);

/// Pastes text into whatever window has OS input focus.
pub trait TextInjector: Send {
    /// Copy `text` to the clipboard, paste it, and press Enter when
    /// `submit` is set.
    fn inject(&mut self, text: &str, submit: bool) -> AppResult<()>;

    /// Press Enter in the focused window without pasting anything.
    fn submit(&mut self) -> AppResult<()>;
}

/// Default injector using the system clipboard and simulated keystrokes.
pub struct ClipboardInjector {
    clipboard: Clipboard,
}

impl ClipboardInjector {
    /// Create a new injector.
    #[track_caller]
    #[instrument]
    pub fn new() -> AppResult<Self> {
        let clipboard = Clipboard::new().map_err(|e| AppError::InjectionFailed {
            reason: format!("Failed to initialize clipboard: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        info!("ClipboardInjector initialized");

        Ok(Self { clipboard })
    }

    fn paste(&mut self) -> AppResult<()> {
        // RAII SAFETY: PasteKeyGuard ensures the modifier is released on
        // drop, even if key operations fail. Without this, a failure after
        // pressing the modifier would leave it stuck.
        let mut guard = PasteKeyGuard::new()?;

        std::thread::sleep(KEY_EVENT_DELAY);

        guard
            .enigo_mut()
            .key(Key::Unicode('v'), Direction::Click)
            .map_err(|e| AppError::InjectionFailed {
                reason: format!("Failed to press V: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        std::thread::sleep(KEY_EVENT_DELAY);

        // Guard drops here, releasing the modifier.
        Ok(())
    }
}

impl TextInjector for ClipboardInjector {
    #[instrument(skip(self, text))]
    fn inject(&mut self, text: &str, submit: bool) -> AppResult<()> {
        self.clipboard
            .set_text(text)
            .map_err(|e| AppError::InjectionFailed {
                reason: format!("Failed to set clipboard: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        debug!(text_len = text.len(), "Text copied to clipboard");

        // Allow the clipboard manager to process the write before pasting.
        std::thread::sleep(CLIPBOARD_SETTLE_DELAY);
        self.paste()?;

        if submit {
            std::thread::sleep(SUBMIT_DELAY);
            self.submit()?;
        }

        info!(text_len = text.len(), submitted = submit, "Text injected");

        Ok(())
    }

    #[instrument(skip(self))]
    fn submit(&mut self) -> AppResult<()> {
        let mut enigo = Enigo::new(&Settings::default()).map_err(|e| AppError::InjectionFailed {
            reason: format!("Failed to create Enigo: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        enigo
            .key(Key::Return, Direction::Click)
            .map_err(|e| AppError::InjectionFailed {
                reason: format!("Failed to press Enter: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        debug!("Submit keystroke sent");

        Ok(())
    }
}
