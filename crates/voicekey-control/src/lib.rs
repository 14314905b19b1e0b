//! VoiceKey Control Library
//!
//! Single-owner coordination between independently launched VoiceKey
//! processes: a lock-file exclusivity token, a loopback signal channel the
//! owner listens on, and the launch coordinator that decides whether a
//! process becomes the owner or hands its request off to the existing one.
//!
//! # Example
//!
//! ```no_run
//! use voicekey_control::{ControlPaths, ControlResult, InstanceCoordinator, Launch, LaunchRequest};
//!
//! #[tokio::main]
//! async fn main() -> ControlResult<()> {
//!     let paths = ControlPaths::new("/tmp/voicekey", "voicekey");
//!     let coordinator = InstanceCoordinator::new(paths);
//!
//!     match coordinator.launch(LaunchRequest::Default).await? {
//!         Launch::Primary { mut signals, .. } => {
//!             while let Some(signal) = signals.recv().await {
//!                 println!("signal: {signal:?}");
//!             }
//!         }
//!         Launch::HandedOff => println!("request delivered to the running instance"),
//!     }
//!     Ok(())
//! }
//! ```

mod control;
mod error;

pub use {
    control::{
        Acquisition, ControlPaths, ExclusivityToken, InstanceCoordinator, Launch, LaunchRequest,
        OwnerControl, ProtocolTimeouts, SignalKind,
    },
    error::{ControlError, Result as ControlResult},
};

#[cfg(test)]
mod tests;
