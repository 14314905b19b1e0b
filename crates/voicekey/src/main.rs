//! VoiceKey: push-to-dictate with single-instance cross-process coordination.

mod capture;
mod command_router;
mod config;
mod error;
mod hotkey_source;
mod inject;
mod launch;
mod paste_guard;
mod present;
mod preview;
mod session;
mod session_state;
#[cfg(test)]
mod tests;
mod transcribe;
mod voice_command;

pub(crate) use {
    capture::{CaptureSession, MicCapture},
    command_router::{CommandInvocation, CommandKind, CommandSource},
    error::{AppError, Result as AppResult},
    hotkey_source::HotkeySource,
    inject::{ClipboardInjector, TextInjector},
    launch::{CliCommand, USAGE, parse_args},
    paste_guard::PasteKeyGuard,
    present::{LogPresenter, Presenter},
    session::{AppCommand, ProviderFactory, SessionController},
    session_state::StateSnapshot,
    transcribe::{RemoteTranscriber, TranscriptionProvider},
    voice_command::VoiceCommand,
};

use crate::config::Config;

use std::{sync::Arc, time::Duration};

use tracing::{debug, error, info, warn};
use voicekey_control::{
    ControlPaths, InstanceCoordinator, Launch, LaunchRequest, SignalKind,
};

/// Application entry point.
fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    tracing_subscriber::fmt()
        .with_env_filter("voicekey=debug")
        .init();

    let command = match parse_args(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(message) => {
            eprintln!("{message}");
            eprintln!("{USAGE}");
            return 2;
        }
    };

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config: {:?}", e);
            return 1;
        }
    };

    match command {
        CliCommand::SmokeTest => smoke_test(&config),
        CliCommand::Launch(request) => {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!("Failed to create tokio runtime: {:?}", e);
                    return 1;
                }
            };

            runtime.block_on(run_session(request, config))
        }
    }
}

async fn run_session(request: LaunchRequest, config: Config) -> i32 {
    let control_dir = match Config::control_dir() {
        Ok(dir) => dir,
        Err(e) => {
            error!("Failed to resolve control directory: {:?}", e);
            return 1;
        }
    };

    let coordinator = InstanceCoordinator::new(ControlPaths::new(
        control_dir,
        config.control.base_name.as_str(),
    ));

    let (control, mut signals, listen_on_start) = match coordinator.launch(request).await {
        Ok(Launch::HandedOff) => {
            info!("Request handed off to the running instance");
            return 0;
        }
        Ok(Launch::Primary {
            control,
            signals,
            listen_on_start,
            reclaimed,
        }) => {
            if reclaimed {
                warn!("Recovered ownership from a crashed instance");
            }
            (control, signals, listen_on_start)
        }
        Err(e) => {
            error!(error = ?e, "Launch coordination failed");
            return 1;
        }
    };

    let capture: Box<dyn CaptureSession> = match MicCapture::new() {
        Ok(capture) => Box::new(capture),
        Err(e) => {
            error!(error = ?e, "Failed to open microphone capture");
            control.shutdown().await;
            return 1;
        }
    };

    let injector: Box<dyn TextInjector> = match ClipboardInjector::new() {
        Ok(injector) => Box::new(injector),
        Err(e) => {
            error!(error = ?e, "Failed to create text injector");
            control.shutdown().await;
            return 1;
        }
    };

    let presenter: Arc<dyn Presenter> = Arc::new(LogPresenter);

    let provider_factory: ProviderFactory = Box::new(|config: &Config| {
        RemoteTranscriber::from_config(&config.transcription)
            .map(|provider| Arc::new(provider) as Arc<dyn TranscriptionProvider>)
    });

    let session = SessionController::new(capture, injector, presenter, provider_factory, config);
    let command_tx = session.command_sender();
    let shutdown_rx = session.shutdown_receiver();

    // Raised signals become command invocations; this waiter only
    // enqueues and never touches session state. It ends when the signal
    // listener closes its channel during control shutdown.
    let signal_tx = command_tx.clone();
    let signal_task = tokio::spawn(async move {
        while let Some(signal) = signals.recv().await {
            let kind = match signal {
                SignalKind::Exit => CommandKind::Close,
                SignalKind::Listen => CommandKind::Listen,
                SignalKind::Submit => CommandKind::Submit,
            };
            let invocation = CommandInvocation::new(kind, CommandSource::Remote);
            if signal_tx
                .send(AppCommand::Invocation(invocation))
                .await
                .is_err()
            {
                break;
            }
        }
    });

    // Register on the main thread and keep the manager alive for the
    // session's lifetime -- dropping it unregisters the hotkey.
    let mut hotkey_manager = None;
    match HotkeySource::register_hotkey() {
        Ok((manager, hotkey_id)) => {
            hotkey_manager = Some(manager);
            let source = HotkeySource::new(hotkey_id, command_tx.clone());
            let hotkey_shutdown = shutdown_rx.clone();
            tokio::spawn(async move {
                if let Err(e) = source.run(hotkey_shutdown).await {
                    error!(error = ?e, "Hotkey source error");
                }
            });
        }
        Err(e) => {
            warn!(error = ?e, "Hotkey unavailable; remote signals still work");
        }
    }

    if listen_on_start {
        let invocation = CommandInvocation::new(CommandKind::Listen, CommandSource::Startup);
        let _ = command_tx.send(AppCommand::Invocation(invocation)).await;
    }

    let result = session.run().await;

    // Release the signals, then the token, exactly once.
    control.shutdown().await;

    match tokio::time::timeout(Duration::from_secs(1), signal_task).await {
        Ok(Ok(())) => debug!("Signal waiter stopped cleanly"),
        Ok(Err(e)) => warn!(error = ?e, "Signal waiter task panicked"),
        Err(_) => debug!("Signal waiter did not stop within timeout"),
    }

    drop(hotkey_manager);

    match result {
        Ok(()) => 0,
        Err(e) => {
            error!(error = ?e, "Session error");
            1
        }
    }
}

/// Offline diagnostic bypassing the coordination layer entirely.
fn smoke_test(config: &Config) -> i32 {
    println!("=== VoiceKey Smoke Test ===");

    match Config::config_path() {
        Ok(path) => println!("Config: {}", path.display()),
        Err(e) => println!("Config path unavailable: {e}"),
    }

    if config.transcription.has_api_key() {
        println!("[ok]   API key configured (model: {})", config.transcription.model);
    } else {
        println!("[warn] No API key configured; add one to the config file");
    }

    match MicCapture::new() {
        Ok(_) => {
            println!("[ok]   Microphone available");
            0
        }
        Err(e) => {
            println!("[fail] Microphone unavailable: {e}");
            1
        }
    }
}
