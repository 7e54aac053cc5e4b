use crate::{ConnectionConfig, ConnectionInfo};

use std::fmt;

/// Whether a relay connection currently has a live upstream link
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// One named upstream connection, as tracked by a [`ConnectionSet`](crate::ConnectionSet)
#[derive(Clone, Debug)]
pub struct RelayConnection {
    config: ConnectionConfig,
    state: ConnectionState,
}

impl RelayConnection {
    /// Construct a connection from its configuration. New connections start
    /// disconnected; nothing is dialled here.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn mark_connected(&mut self) {
        tracing::debug!(name = %self.config.name, "connection marked up");
        self.state = ConnectionState::Connected;
    }

    pub fn mark_disconnected(&mut self) {
        tracing::debug!(name = %self.config.name, "connection marked down");
        self.state = ConnectionState::Disconnected;
    }

    /// A point-in-time snapshot suitable for sending to a control client
    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            name: self.config.name.clone(),
            host: self.config.host.clone(),
            port: self.config.port,
            ssl: self.config.ssl,
            connected: self.is_connected(),
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => f.write_str("Disconnected"),
            ConnectionState::Connected => f.write_str("Connected"),
        }
    }
}

impl fmt::Display for RelayConnection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({}) {}", self.config.name, self.config.address(), self.state)
    }
}
