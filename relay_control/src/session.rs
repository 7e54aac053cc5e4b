use crate::{
    codec::{read_frame, write_frame, CallFrame, ReplyFrame},
    state::ActiveSession,
    ProcedureTable, ProtocolError,
};

use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};

/// An accepted control socket, on its way to a session handler
pub struct ControlConnection<S = TcpStream> {
    pub stream: S,
    pub peer: SocketAddr,
}

/// Serves procedure calls on one connection until the peer goes away.
///
/// The session owns its stream, so the socket is closed on every way out of
/// [`run`](Self::run), including a panicking procedure unwinding the task.
pub(crate) struct ControlSession<S> {
    stream: S,
    procedures: Arc<ProcedureTable>,
    idle_timeout: Option<Duration>,
    _active: ActiveSession,
}

impl<S> ControlSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        stream: S,
        procedures: Arc<ProcedureTable>,
        idle_timeout: Option<Duration>,
        active: ActiveSession,
    ) -> Self {
        Self {
            stream,
            procedures,
            idle_timeout,
            _active: active,
        }
    }

    pub async fn run(mut self) {
        match self.serve().await {
            Ok(()) => tracing::debug!("Control session closed by peer"),
            Err(ProtocolError::IdleTimeout) => tracing::debug!("Closing idle control session"),
            Err(e) => tracing::warn!("Closing control session: {}", e),
        }
    }

    async fn serve(&mut self) -> Result<(), ProtocolError> {
        while let Some(call) = self.next_call().await? {
            tracing::debug!(seq = call.seq, procedure = %call.procedure, "Control call");

            let result = match self.procedures.call(&call.procedure, call.args) {
                Ok(result) => result,
                Err(e) => {
                    // Tell the caller what went wrong if it's something they
                    // can act on, then give up on the session
                    if let Some(reply_error) = e.reply_error() {
                        let reply = ReplyFrame {
                            seq: call.seq,
                            result: Err(reply_error),
                        };
                        if let Err(write_error) = write_frame(&mut self.stream, &reply).await {
                            tracing::debug!("Couldn't send error reply: {}", write_error);
                        }
                    }
                    return Err(e);
                }
            };

            if let Err(e) = &result {
                tracing::debug!(seq = call.seq, "Procedure failed: {}", e);
            }

            write_frame(&mut self.stream, &ReplyFrame { seq: call.seq, result }).await?;
        }

        Ok(())
    }

    async fn next_call(&mut self) -> Result<Option<CallFrame>, ProtocolError> {
        match self.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, read_frame(&mut self.stream))
                .await
                .map_err(|_| ProtocolError::IdleTimeout)?,
            None => read_frame(&mut self.stream).await,
        }
    }
}
