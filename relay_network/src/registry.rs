use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Summary of a single relay connection's state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub ssl: bool,
    pub connected: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("No such connection: {0}")]
    NoSuchConnection(String),
}

/// The operations other components may perform on the live connection set.
///
/// Implementations are shared between tasks and are responsible for their own
/// synchronisation; callers make no assumption of exclusive access.
pub trait ConnectionRegistry: Send + Sync {
    /// Find a connection by exact name
    fn lookup(&self, name: &str) -> Option<ConnectionInfo>;

    /// Every connection currently known
    fn list(&self) -> Vec<ConnectionInfo>;

    /// Disconnect the named connection and remove it from the set, returning
    /// its final state.
    fn disconnect(&self, name: &str) -> Result<ConnectionInfo, RegistryError>;
}
