//! The relay's remote control plane.
//!
//! A [`ControlServer`] listens on a TCP address and serves one procedure-call
//! session per accepted connection. Each session reads length-prefixed JSON
//! call frames, dispatches them by procedure name, and writes back one reply
//! frame per call until the peer goes away. Procedures operate on the
//! [`ConnectionRegistry`](relay_network::ConnectionRegistry) injected with
//! [`ControlServer::set_connection_registry`].
//!
//! [`ControlClient`] is the matching caller, used by the `relay_ctl` tool.

pub mod config;
pub use config::{ConfigError, ControlServerConfig};

mod error;
pub use error::*;

pub mod codec;

mod dispatch;
pub use dispatch::ProcedureTable;

pub mod procedures;
pub use procedures::{ConnectionArgs, ControlStatistics, NoArgs};

mod state;

mod session;
pub use session::ControlConnection;

mod server;
pub use server::ControlServer;

mod client;
pub use client::ControlClient;
