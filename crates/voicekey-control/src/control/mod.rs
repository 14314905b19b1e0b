mod coordinator;
mod listener;
mod signal;
mod token;

pub use {
    coordinator::{InstanceCoordinator, Launch, LaunchRequest, OwnerControl, ProtocolTimeouts},
    signal::SignalKind,
    token::{Acquisition, ControlPaths, ExclusivityToken},
};
