//! Signal channel wire protocol.
//!
//! Signals between processes travel as JSON messages, prefixed with a
//! 4-byte little-endian length, over a loopback TCP connection to the
//! owner's listener. Signal names derive from the well-known base name plus
//! a fixed suffix so independently launched processes agree on identity
//! without prior coordination.

use crate::{ControlError, error::Result as ControlResult};

use std::{panic::Location, time::Duration};

use error_location::ErrorLocation;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};
use tracing::debug;

/// Time allowed for a connection attempt against a possibly dead owner.
const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// Time allowed for the owner to acknowledge a raised signal.
const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(2);

/// Largest message accepted on the signal channel.
const MAX_MESSAGE_BYTES: usize = 16 * 1024;

/// One of the three cross-process signals a non-owning process can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// Ask the owner to shut down. Idempotent: repeated raises are accepted
    /// until the owner consumes the signal by exiting.
    Exit,
    /// Ask the owner to run a dictation cycle.
    Listen,
    /// Ask the owner to run its submit behavior.
    Submit,
}

impl SignalKind {
    /// Fixed suffix appended to the base name to form the wire name.
    pub fn suffix(&self) -> &'static str {
        match self {
            SignalKind::Exit => "_Exit",
            SignalKind::Listen => "_Listen",
            SignalKind::Submit => "_Submit",
        }
    }

    /// Full wire name for this signal under the given base name.
    pub fn wire_name(&self, base_name: &str) -> String {
        format!("{base_name}{}", self.suffix())
    }

    /// Parse a wire name back into a signal kind, if it belongs to `base_name`.
    pub fn from_wire_name(base_name: &str, name: &str) -> Option<SignalKind> {
        let suffix = name.strip_prefix(base_name)?;
        match suffix {
            "_Exit" => Some(SignalKind::Exit),
            "_Listen" => Some(SignalKind::Listen),
            "_Submit" => Some(SignalKind::Submit),
            _ => None,
        }
    }
}

/// Requests a non-owning process sends to the owner.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum WireRequest {
    /// Liveness probe.
    Ping,
    /// Raise a named signal.
    Raise { name: String },
}

/// Responses from the owner.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum WireResponse {
    /// Liveness acknowledgement.
    Pong,
    /// The signal was recognized and delivered.
    Accepted,
    /// The owner does not know this signal name.
    Unsupported,
}

/// Outcome of raising a signal against the recorded owner port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RaiseOutcome {
    /// The owner acknowledged the signal.
    Accepted,
    /// An owner answered but does not expose this signal.
    Unsupported,
    /// No owner is listening on the recorded port.
    NoOwner,
}

/// Write one length-prefixed JSON message.
pub(crate) async fn write_message<T: Serialize>(
    stream: &mut TcpStream,
    message: &T,
) -> ControlResult<()> {
    let bytes = serde_json::to_vec(message).map_err(|e| ControlError::SignalChannel {
        reason: format!("Failed to encode message: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;
    let len = (bytes.len() as u32).to_le_bytes();

    stream.write_all(&len).await?;
    stream.write_all(&bytes).await?;

    Ok(())
}

/// Read one length-prefixed JSON message.
pub(crate) async fn read_message<T: DeserializeOwned>(stream: &mut TcpStream) -> ControlResult<T> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await?;

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_BYTES {
        return Err(ControlError::SignalChannel {
            reason: format!("Message of {len} bytes exceeds channel limit"),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await?;

    serde_json::from_slice(&buf).map_err(|e| ControlError::SignalChannel {
        reason: format!("Failed to decode message: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })
}

/// Check whether a live owner answers on `port`.
pub(crate) async fn probe_owner(port: u16) -> bool {
    if port == 0 {
        // Placeholder written before the listener finished binding. Treat the
        // owner as alive; it is mid-startup, not dead.
        return true;
    }

    let connect = TcpStream::connect(("127.0.0.1", port));
    let mut stream = match tokio::time::timeout(CONNECT_TIMEOUT, connect).await {
        Ok(Ok(stream)) => stream,
        _ => return false,
    };

    if write_message(&mut stream, &WireRequest::Ping).await.is_err() {
        return false;
    }

    matches!(
        tokio::time::timeout(EXCHANGE_TIMEOUT, read_message::<WireResponse>(&mut stream)).await,
        Ok(Ok(WireResponse::Pong))
    )
}

/// Raise `kind` against the owner recorded at `port`.
pub(crate) async fn raise_signal(port: u16, base_name: &str, kind: SignalKind) -> RaiseOutcome {
    if port == 0 {
        return RaiseOutcome::NoOwner;
    }

    let connect = TcpStream::connect(("127.0.0.1", port));
    let mut stream = match tokio::time::timeout(CONNECT_TIMEOUT, connect).await {
        Ok(Ok(stream)) => stream,
        _ => return RaiseOutcome::NoOwner,
    };

    let request = WireRequest::Raise {
        name: kind.wire_name(base_name),
    };
    if write_message(&mut stream, &request).await.is_err() {
        return RaiseOutcome::NoOwner;
    }

    let response =
        tokio::time::timeout(EXCHANGE_TIMEOUT, read_message::<WireResponse>(&mut stream)).await;

    match response {
        Ok(Ok(WireResponse::Accepted)) => {
            debug!(signal = ?kind, port, "Signal accepted by owner");
            RaiseOutcome::Accepted
        }
        Ok(Ok(_)) => RaiseOutcome::Unsupported,
        _ => RaiseOutcome::NoOwner,
    }
}
