use crate::config::ConfigError;
use relay_network::RegistryError;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinError;

/// Errors from constructing, starting or stopping a [`ControlServer`](crate::ControlServer)
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Couldn't bind control socket to {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },
    #[error("Control server has already been started")]
    AlreadyStarted,
    #[error("Control server is not running")]
    NotRunning,
    #[error("Error closing control socket: {0}")]
    Stop(#[from] JoinError),
}

/// A fault on a single control session. These end the session they occur on
/// and nothing else.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Frame of {0} bytes exceeds the maximum frame size")]
    FrameTooLarge(usize),
    #[error("Connection closed part way through a frame")]
    Truncated,
    #[error("Unknown procedure: {0}")]
    UnknownProcedure(String),
    #[error("Invalid arguments for {procedure}: {source}")]
    InvalidArguments {
        procedure: String,
        source: serde_json::Error,
    },
    #[error("Session idle for too long")]
    IdleTimeout,
}

/// A failure reported by a procedure, sent back to the caller in its reply
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ProcedureError {
    #[error("No such connection: {0}")]
    NoSuchConnection(String),
    #[error("No connection registry configured")]
    NoRegistry,
    #[error("Unknown procedure: {0}")]
    UnknownProcedure(String),
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors seen by a [`ControlClient`](crate::ControlClient)
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("Control server closed the connection")]
    Closed,
    #[error("Reply for call {got} doesn't match outstanding call {expected}")]
    SequenceMismatch { expected: u64, got: u64 },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Procedure(#[from] ProcedureError),
}

impl ProtocolError {
    /// The error to report to the peer before closing, if the peer should be
    /// told anything at all.
    pub fn reply_error(&self) -> Option<ProcedureError> {
        match self {
            Self::UnknownProcedure(name) => Some(ProcedureError::UnknownProcedure(name.clone())),
            Self::InvalidArguments { procedure, source } => Some(ProcedureError::InvalidArguments(
                format!("{}: {}", procedure, source),
            )),
            _ => None,
        }
    }
}

impl From<RegistryError> for ProcedureError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::NoSuchConnection(name) => Self::NoSuchConnection(name),
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        Self::Protocol(e.into())
    }
}
