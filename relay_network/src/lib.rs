//! The set of relay connections maintained by the relay process, and the
//! registry interface through which other components inspect and manage it.
//!
//! This crate deliberately knows nothing about the IRC wire protocol. A
//! [`RelayConnection`] records the configuration and state of one upstream
//! link; establishing and maintaining that link is the job of the connection
//! driver, which marks connections up or down as it goes.

pub mod config;
pub use config::ConnectionConfig;

mod connection;
pub use connection::*;

mod registry;
pub use registry::*;

mod connection_set;
pub use connection_set::ConnectionSet;
