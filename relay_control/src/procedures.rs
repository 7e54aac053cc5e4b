//! The procedures exposed by a control server, and their argument and reply
//! types.

use crate::{state::ControlState, ProcedureError, ProcedureTable};
use relay_network::ConnectionInfo;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DISCONNECT_CONNECTION: &str = "DisconnectConnection";
pub const LIST_CONNECTIONS: &str = "ListConnections";
pub const CONNECTION_STATUS: &str = "ConnectionStatus";
pub const CONTROL_STATISTICS: &str = "ControlStatistics";
pub const PING: &str = "Ping";

/// Status returned by a successful `DisconnectConnection`
pub const STATUS_OK: i32 = 0;

/// Arguments naming a single relay connection
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionArgs {
    pub name: String,
}

/// Arguments for procedures which take none
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoArgs {}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlStatistics {
    /// Sessions accepted since the server started
    pub sessions_accepted: u64,
    /// Sessions whose peer is still connected
    pub sessions_active: u64,
}

impl ConnectionArgs {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn validate(&self) -> Result<&str, ProcedureError> {
        if self.name.is_empty() {
            Err(ProcedureError::InvalidArguments(
                "connection name must not be empty".to_string(),
            ))
        } else {
            Ok(&self.name)
        }
    }
}

/// Build the procedure table for one control server instance. Every handler
/// holds a reference to that instance's state.
pub(crate) fn build_table(state: &Arc<ControlState>) -> ProcedureTable {
    let mut table = ProcedureTable::new();

    let s = Arc::clone(state);
    table.register(DISCONNECT_CONNECTION, move |args: ConnectionArgs| {
        disconnect_connection(&s, args)
    });

    let s = Arc::clone(state);
    table.register(LIST_CONNECTIONS, move |_: NoArgs| {
        Ok(s.registry()?.list())
    });

    let s = Arc::clone(state);
    table.register(CONNECTION_STATUS, move |args: ConnectionArgs| {
        connection_status(&s, args)
    });

    let s = Arc::clone(state);
    table.register(CONTROL_STATISTICS, move |_: NoArgs| Ok(s.statistics()));

    table.register(PING, |_: NoArgs| Ok("pong"));

    table
}

fn disconnect_connection(state: &ControlState, args: ConnectionArgs) -> Result<i32, ProcedureError> {
    let name = args.validate()?;
    let info = state.registry()?.disconnect(name)?;

    tracing::info!(name = %info.name, "Disconnected relay connection on request");

    Ok(STATUS_OK)
}

fn connection_status(
    state: &ControlState,
    args: ConnectionArgs,
) -> Result<ConnectionInfo, ProcedureError> {
    let name = args.validate()?;
    state
        .registry()?
        .lookup(name)
        .ok_or_else(|| ProcedureError::NoSuchConnection(name.to_owned()))
}
