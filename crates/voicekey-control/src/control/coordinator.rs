//! Launch coordination across independently started processes.
//!
//! Exactly one process owns the dictation session. The coordinator decides
//! whether this process becomes that owner, and when it does not, turns the
//! parsed launch intent into signals against the existing owner, with
//! bounded waits and takeover when the old owner will not let go.

use crate::{
    ControlError,
    control::{
        listener::SignalListener,
        signal::{RaiseOutcome, SignalKind, raise_signal},
        token::{Acquisition, ControlPaths, ExclusivityToken},
    },
    error::Result as ControlResult,
};

use std::{panic::Location, time::Duration};

use error_location::ErrorLocation;
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

/// Capacity of the signal delivery channel.
const SIGNAL_CHANNEL_CAPACITY: usize = 32;

/// The parsed intent of a newly started process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchRequest {
    /// No explicit flag: become the owner, or hand a listen request to it.
    Default,
    /// Ask the running instance to shut down.
    Close,
    /// Trigger a dictation cycle in the running instance, or start fresh.
    Listen,
    /// Trigger submit behavior in the running instance.
    Submit,
    /// Close any running instance, then start this one.
    ReplaceExisting,
}

/// Wait windows of the close/takeover protocol.
#[derive(Debug, Clone, Copy)]
pub struct ProtocolTimeouts {
    /// How long `Close` waits for the old owner to release the token.
    pub close: Duration,
    /// Shorter wait used when this process intends to take over.
    pub replace: Duration,
    /// Interval between acquisition probes while waiting.
    pub probe_interval: Duration,
}

impl Default for ProtocolTimeouts {
    fn default() -> Self {
        Self {
            close: Duration::from_secs(30),
            replace: Duration::from_secs(10),
            probe_interval: Duration::from_millis(250),
        }
    }
}

/// Control-plane resources held by the owning process.
///
/// Released exactly once, signals before token; `Drop` on the token is the
/// guaranteed fallback if [`OwnerControl::shutdown`] is never reached.
pub struct OwnerControl {
    token: ExclusivityToken,
    listener: SignalListener,
}

impl OwnerControl {
    /// Release the signal listener, then the exclusivity token.
    pub async fn shutdown(self) {
        self.listener.shutdown().await;
        let mut token = self.token;
        token.release();
    }
}

/// Outcome of a coordinated launch.
pub enum Launch {
    /// This process is now the owner.
    Primary {
        /// Owner-held control-plane resources.
        control: OwnerControl,
        /// Delivery channel for signals raised by other processes.
        signals: mpsc::Receiver<SignalKind>,
        /// True when the launch intent asks for a dictation cycle right
        /// after startup.
        listen_on_start: bool,
        /// True when ownership was reclaimed from a dead holder.
        reclaimed: bool,
    },
    /// The request was delivered to (or resolved against) an existing
    /// owner; this process should exit.
    HandedOff,
}

/// Decides process ownership and routes launch intents.
pub struct InstanceCoordinator {
    paths: ControlPaths,
    timeouts: ProtocolTimeouts,
}

impl InstanceCoordinator {
    /// Create a coordinator with the default protocol timeouts.
    pub fn new(paths: ControlPaths) -> Self {
        Self {
            paths,
            timeouts: ProtocolTimeouts::default(),
        }
    }

    /// Create a coordinator with explicit timeouts.
    pub fn with_timeouts(paths: ControlPaths, timeouts: ProtocolTimeouts) -> Self {
        Self { paths, timeouts }
    }

    /// Run the launch protocol for `request`.
    #[instrument(skip(self))]
    pub async fn launch(&self, request: LaunchRequest) -> ControlResult<Launch> {
        match ExclusivityToken::try_acquire(&self.paths).await? {
            Acquisition::Owned { token, reclaimed } => match request {
                LaunchRequest::Close | LaunchRequest::Submit => {
                    // Nothing is running; these requests never start a
                    // session. Drop the token we just picked up.
                    let mut token = token;
                    token.release();
                    Ok(Launch::HandedOff)
                }
                _ => self.become_primary(token, reclaimed, request).await,
            },
            Acquisition::Held { port } => self.dispatch_to_owner(request, port).await,
        }
    }

    /// Finish startup as owner: bind the signal listener and record its port.
    async fn become_primary(
        &self,
        token: ExclusivityToken,
        reclaimed: bool,
        request: LaunchRequest,
    ) -> ControlResult<Launch> {
        let (signal_tx, signals) = mpsc::channel(SIGNAL_CHANNEL_CAPACITY);
        let listener =
            SignalListener::bind(self.paths.base_name().to_string(), signal_tx).await?;
        token.record_port(listener.port())?;

        info!(
            port = listener.port(),
            reclaimed, "This process is now the session owner"
        );

        Ok(Launch::Primary {
            control: OwnerControl { token, listener },
            signals,
            listen_on_start: matches!(request, LaunchRequest::Listen),
            reclaimed,
        })
    }

    /// Route a request against the live owner recorded at `port`.
    async fn dispatch_to_owner(&self, request: LaunchRequest, port: u16) -> ControlResult<Launch> {
        let base = self.paths.base_name();

        match request {
            LaunchRequest::Default | LaunchRequest::Listen => {
                match raise_signal(port, base, SignalKind::Listen).await {
                    RaiseOutcome::Accepted => Ok(Launch::HandedOff),
                    RaiseOutcome::Unsupported => {
                        // Owner from a build without the listen channel.
                        // Fall back to closing it and taking over.
                        warn!("Owner does not expose the listen signal, replacing it");
                        self.close_and_take_over(port, request).await
                    }
                    RaiseOutcome::NoOwner => {
                        // The recorded owner vanished between the liveness
                        // probe and the raise. Start fresh.
                        match ExclusivityToken::try_acquire(&self.paths).await? {
                            Acquisition::Owned { token, reclaimed } => {
                                self.become_primary(token, reclaimed, request).await
                            }
                            Acquisition::Held { .. } => Err(ControlError::SignalChannel {
                                reason: "Owner is unreachable but still holds the token"
                                    .to_string(),
                                location: ErrorLocation::from(Location::caller()),
                            }),
                        }
                    }
                }
            }
            LaunchRequest::Close => {
                if raise_signal(port, base, SignalKind::Exit).await == RaiseOutcome::Accepted {
                    self.wait_for_release(self.timeouts.close).await;
                }
                // Exit regardless of whether the old owner released in time.
                Ok(Launch::HandedOff)
            }
            LaunchRequest::Submit => {
                // Best effort; this process never becomes the owner.
                let _ = raise_signal(port, base, SignalKind::Submit).await;
                Ok(Launch::HandedOff)
            }
            LaunchRequest::ReplaceExisting => {
                self.close_and_take_over(port, LaunchRequest::ReplaceExisting).await
            }
        }
    }

    /// Signal the owner to exit, wait for the token, then start as owner.
    async fn close_and_take_over(
        &self,
        port: u16,
        follow_up: LaunchRequest,
    ) -> ControlResult<Launch> {
        let _ = raise_signal(port, self.paths.base_name(), SignalKind::Exit).await;

        let (token, reclaimed) = self.take_over(self.timeouts.replace).await?;
        self.become_primary(token, reclaimed, follow_up).await
    }

    /// Probe acquisition until it succeeds or `timeout` elapses, then force
    /// the takeover by reclaiming whatever lock remains.
    async fn take_over(&self, timeout: Duration) -> ControlResult<(ExclusivityToken, bool)> {
        if let Some(owned) = self.acquire_with_wait(timeout).await? {
            return Ok(owned);
        }

        warn!(
            waited = ?timeout,
            "Old owner did not release the token in time, forcing takeover"
        );
        let lock_path = self.paths.lock_path();
        if let Err(e) = std::fs::remove_file(&lock_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(ControlError::TokenIo {
                    reason: format!("Failed to remove lock during takeover: {e}"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        }

        match ExclusivityToken::try_acquire(&self.paths).await? {
            Acquisition::Owned { token, reclaimed } => Ok((token, reclaimed)),
            Acquisition::Held { .. } => Err(ControlError::AcquisitionTimeout {
                waited: timeout,
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }

    /// Wait for the old owner to release, releasing any probe acquisition.
    ///
    /// Used by the close protocol, which must never keep ownership.
    async fn wait_for_release(&self, timeout: Duration) -> bool {
        match self.acquire_with_wait(timeout).await {
            Ok(Some((mut token, _))) => {
                token.release();
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "Acquisition probe failed while waiting for release");
                false
            }
        }
    }

    /// Repeatedly probe acquisition until owned or `timeout` elapses.
    async fn acquire_with_wait(
        &self,
        timeout: Duration,
    ) -> ControlResult<Option<(ExclusivityToken, bool)>> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            match ExclusivityToken::try_acquire(&self.paths).await? {
                Acquisition::Owned { token, reclaimed } => return Ok(Some((token, reclaimed))),
                Acquisition::Held { .. } => {
                    if tokio::time::Instant::now() >= deadline {
                        return Ok(None);
                    }
                    tokio::time::sleep(self.timeouts.probe_interval).await;
                }
            }
        }
    }
}
