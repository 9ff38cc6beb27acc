//! Device simulation backend.
//!
//! Keeps the state of every simulated device in a [`DeviceStore`] and serves
//! `Get*`/`Set*` calls over TCP using the homesim wire protocol.
//!
//! ```rust,no_run
//! use homesim_server::{BackgroundServer, ServerConfig};
//!
//! let server = BackgroundServer::start(ServerConfig::ephemeral())?;
//! println!("backend on {}", server.endpoint());
//! server.shutdown()?;
//! # Ok::<(), homesim_server::ServerError>(())
//! ```

mod background;
mod config;
mod error;
mod handler;
mod signals;
mod socket;
mod store;

pub use background::{BackgroundServer, serve};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{RequestHandler, SharedStore, make_connection_handler, new_shared_store};
pub use signals::{ShutdownHandle, ShutdownSignal, SignalHandler};
pub use socket::{Connection, SocketServer};
pub use store::{DeviceStore, Lifecycle};
