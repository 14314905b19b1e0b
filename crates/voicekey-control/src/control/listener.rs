//! Owner-side signal listener.
//!
//! Accepts loopback connections from other VoiceKey processes and turns
//! recognized signal names into [`SignalKind`] deliveries on a bounded
//! channel. The listener never touches session state; consumers drain the
//! channel on their own dispatch task.

use crate::{
    ControlError,
    control::signal::{SignalKind, WireRequest, WireResponse, read_message, write_message},
    error::Result as ControlResult,
};

use std::{
    panic::Location,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use error_location::ErrorLocation;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, info, instrument, warn};

/// Listener accepting raised signals for the owning process.
pub(crate) struct SignalListener {
    port: u16,
    shutdown_tx: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
}

impl SignalListener {
    /// Bind on an ephemeral loopback port and start accepting signals.
    ///
    /// Recognized signals are delivered on `signal_tx`. `Exit` stays raised
    /// once seen: repeated raises are acknowledged without redelivery until
    /// the owner consumes the signal by shutting down.
    #[instrument(skip(signal_tx))]
    pub(crate) async fn bind(
        base_name: String,
        signal_tx: mpsc::Sender<SignalKind>,
    ) -> ControlResult<SignalListener> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let port = listener
            .local_addr()
            .map_err(|e| ControlError::SignalChannel {
                reason: format!("Failed to read bound address: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })?
            .port();

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let exit_raised = Arc::new(AtomicBool::new(false));

        let accept_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        debug!("Signal listener shutting down");
                        break;
                    }
                    accepted = listener.accept() => {
                        match accepted {
                            Ok((stream, _addr)) => {
                                let base = base_name.clone();
                                let tx = signal_tx.clone();
                                let exit_raised = Arc::clone(&exit_raised);
                                tokio::spawn(async move {
                                    if let Err(e) = handle_connection(stream, &base, &tx, &exit_raised).await {
                                        debug!(error = %e, "Signal connection ended with error");
                                    }
                                });
                            }
                            Err(e) => {
                                warn!(error = %e, "Signal channel accept failed");
                            }
                        }
                    }
                }
            }
        });

        info!(port, "Signal listener ready");

        Ok(SignalListener {
            port,
            shutdown_tx,
            accept_task,
        })
    }

    /// The bound loopback port, recorded in the lock file for other processes.
    pub(crate) fn port(&self) -> u16 {
        self.port
    }

    /// Stop accepting signals and wait briefly for the accept loop to exit.
    pub(crate) async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);

        match tokio::time::timeout(Duration::from_secs(1), self.accept_task).await {
            Ok(Ok(())) => debug!("Signal listener stopped cleanly"),
            Ok(Err(e)) => warn!(error = ?e, "Signal listener task panicked"),
            Err(_) => debug!("Signal listener did not stop within timeout"),
        }
    }
}

/// Serve one connection: answer pings and deliver raised signals.
async fn handle_connection(
    mut stream: TcpStream,
    base_name: &str,
    signal_tx: &mpsc::Sender<SignalKind>,
    exit_raised: &AtomicBool,
) -> ControlResult<()> {
    let request: WireRequest = read_message(&mut stream).await?;

    let response = match request {
        WireRequest::Ping => WireResponse::Pong,
        WireRequest::Raise { name } => match SignalKind::from_wire_name(base_name, &name) {
            Some(SignalKind::Exit) => {
                if exit_raised.swap(true, Ordering::AcqRel) {
                    // Already raised; stays raised until the owner exits.
                    WireResponse::Accepted
                } else if signal_tx.send(SignalKind::Exit).await.is_ok() {
                    WireResponse::Accepted
                } else {
                    WireResponse::Unsupported
                }
            }
            Some(kind) => {
                debug!(signal = ?kind, "Signal raised");
                if signal_tx.send(kind).await.is_ok() {
                    WireResponse::Accepted
                } else {
                    WireResponse::Unsupported
                }
            }
            None => {
                warn!(name, "Unknown signal name raised");
                WireResponse::Unsupported
            }
        },
    };

    write_message(&mut stream, &response).await
}
