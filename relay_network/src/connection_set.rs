use crate::*;

use parking_lot::RwLock;
use std::collections::HashMap;

/// Stores the relay connections known to the process, keyed by name
#[derive(Default)]
pub struct ConnectionSet {
    connections: RwLock<HashMap<String, RelayConnection>>,
}

impl ConnectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set with one (disconnected) connection per config entry
    pub fn from_configs(configs: impl IntoIterator<Item = ConnectionConfig>) -> Self {
        let ret = Self::new();
        for conf in configs {
            ret.insert(RelayConnection::new(conf));
        }
        ret
    }

    /// Add a connection, replacing any existing one with the same name
    pub fn insert(&self, conn: RelayConnection) -> Option<RelayConnection> {
        self.connections.write().insert(conn.name().to_owned(), conn)
    }

    /// Run `f` against the named connection, if it exists
    pub fn with_connection_mut<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut RelayConnection) -> T,
    ) -> Option<T> {
        self.connections.write().get_mut(name).map(f)
    }

    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }
}

impl ConnectionRegistry for ConnectionSet {
    fn lookup(&self, name: &str) -> Option<ConnectionInfo> {
        self.connections.read().get(name).map(RelayConnection::info)
    }

    fn list(&self) -> Vec<ConnectionInfo> {
        let mut ret: Vec<_> = self
            .connections
            .read()
            .values()
            .map(RelayConnection::info)
            .collect();
        ret.sort_by(|a, b| a.name.cmp(&b.name));
        ret
    }

    fn disconnect(&self, name: &str) -> Result<ConnectionInfo, RegistryError> {
        let mut conn = self
            .connections
            .write()
            .remove(name)
            .ok_or_else(|| RegistryError::NoSuchConnection(name.to_owned()))?;

        conn.mark_disconnected();
        tracing::info!("Removed connection {}", conn);

        Ok(conn.info())
    }
}
