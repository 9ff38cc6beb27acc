//! Device clients, status poller and CLI
//!
//! This crate provides the blocking RPC channel, one client per device
//! capability, the background poller that mirrors device state, and the
//! `homesim` command-line interface.

pub mod capabilities;
pub mod channel;
pub mod cli;
pub mod commands;
pub mod config;
pub mod device;
pub mod error;
pub mod mirror;
pub mod poller;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use capabilities::{AirPurifierClient, RoomAirConditionerClient, WindowClient};
pub use channel::RpcChannel;
pub use cli::Cli;
pub use config::ClientConfig;
pub use device::{DeviceClient, Session};
pub use error::{ClientError, ClientResult};
pub use mirror::{EditGuard, EditTracker, FieldChange, FieldPath, Mirror};
pub use poller::{PollCommand, PollConfig, PollEvent, Poller, PollerHandle, PollerState};
pub use transport::{RpcTimeouts, TcpTransport, Transport};
