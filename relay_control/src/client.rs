use crate::{
    codec::{read_frame, write_frame, CallFrame, ReplyFrame},
    procedures::*,
    ClientError,
};
use relay_network::ConnectionInfo;

use serde::{de::DeserializeOwned, Serialize};
use tokio::net::{TcpStream, ToSocketAddrs};

/// A connection to a control server, making one call at a time
pub struct ControlClient {
    stream: TcpStream,
    next_seq: u64,
}

impl ControlClient {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            stream,
            next_seq: 1,
        })
    }

    /// Call a procedure by name and wait for its reply
    pub async fn call<A, R>(&mut self, procedure: &str, args: &A) -> Result<R, ClientError>
    where
        A: Serialize,
        R: DeserializeOwned,
    {
        let seq = self.next_seq;
        self.next_seq += 1;

        let call = CallFrame {
            seq,
            procedure: procedure.to_owned(),
            args: serde_json::to_value(args)?,
        };
        write_frame(&mut self.stream, &call).await?;

        let reply: ReplyFrame = read_frame(&mut self.stream)
            .await?
            .ok_or(ClientError::Closed)?;

        if reply.seq != seq {
            return Err(ClientError::SequenceMismatch {
                expected: seq,
                got: reply.seq,
            });
        }

        Ok(serde_json::from_value(reply.result?)?)
    }

    /// Returns the status code reported by the server, which is
    /// [`STATUS_OK`] on success
    pub async fn disconnect_connection(&mut self, name: &str) -> Result<i32, ClientError> {
        self.call(DISCONNECT_CONNECTION, &ConnectionArgs::new(name))
            .await
    }

    pub async fn list_connections(&mut self) -> Result<Vec<ConnectionInfo>, ClientError> {
        self.call(LIST_CONNECTIONS, &NoArgs {}).await
    }

    pub async fn connection_status(&mut self, name: &str) -> Result<ConnectionInfo, ClientError> {
        self.call(CONNECTION_STATUS, &ConnectionArgs::new(name))
            .await
    }

    pub async fn statistics(&mut self) -> Result<ControlStatistics, ClientError> {
        self.call(CONTROL_STATISTICS, &NoArgs {}).await
    }

    pub async fn ping(&mut self) -> Result<String, ClientError> {
        self.call(PING, &NoArgs {}).await
    }
}
