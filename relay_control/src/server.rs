use crate::{
    procedures,
    session::{ControlConnection, ControlSession},
    state::ControlState,
    ControlError, ControlServerConfig, ControlStatistics, ProcedureTable,
};
use relay_network::ConnectionRegistry;

use backoff::{backoff::Backoff, ExponentialBackoff, ExponentialBackoffBuilder};
use std::{
    io,
    net::SocketAddr,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpListener, TcpStream},
    select,
    sync::oneshot,
    task::JoinHandle,
};
use tracing::{
    instrument::{Instrument, WithSubscriber},
    Dispatch,
};

const ACCEPT_BACKOFF_INITIAL: Duration = Duration::from_millis(5);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);
const ACCEPT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// A source of incoming control connections
pub(crate) trait Acceptor: Send + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn poll_accept(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<(Self::Stream, SocketAddr)>>;
}

impl Acceptor for TcpListener {
    type Stream = TcpStream;

    fn poll_accept(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<(TcpStream, SocketAddr)>> {
        TcpListener::poll_accept(self, cx)
    }
}

/// The control plane listener.
///
/// A server is created unstarted, has a connection registry injected, and is
/// then started and stopped exactly once. It can't be restarted after
/// [`stop`](Self::stop); build a new one instead.
///
/// Dropping a running server has the same effect on the accept loop as
/// stopping it, without waiting for the socket to close.
pub struct ControlServer {
    config: ControlServerConfig,
    state: Arc<ControlState>,
    log_dispatch: Dispatch,
    lifecycle: Lifecycle,
}

enum Lifecycle {
    Created,
    Started(RunningServer),
    Stopped,
}

struct RunningServer {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    accept_task: JoinHandle<()>,
}

/// Everything the accept loop needs, moved into its task on start
struct AcceptLoop<A> {
    acceptor: A,
    procedures: Arc<ProcedureTable>,
    state: Arc<ControlState>,
    idle_timeout: Option<Duration>,
}

impl ControlServer {
    /// Validate the config and construct an unstarted server. No sockets are
    /// touched until [`start`](Self::start).
    ///
    /// Logging goes to whichever `tracing` dispatcher is current here; see
    /// [`with_dispatch`](Self::with_dispatch) to supply a different one.
    pub fn new(config: ControlServerConfig) -> Result<Self, ControlError> {
        config.validate()?;

        Ok(Self {
            config,
            state: Arc::new(ControlState::default()),
            log_dispatch: tracing::dispatcher::get_default(Dispatch::clone),
            lifecycle: Lifecycle::Created,
        })
    }

    /// Send this server's logging, including that of every session it spawns,
    /// to `dispatch`.
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.log_dispatch = dispatch;
        self
    }

    /// Install the registry that procedures operate on.
    ///
    /// This should happen before [`start`](Self::start). Replacing the
    /// registry while calls are in flight is allowed, but gives no guarantee
    /// about which registry those calls see.
    pub fn set_connection_registry(&self, registry: Arc<dyn ConnectionRegistry>) {
        self.state.set_registry(registry);
    }

    pub fn config(&self) -> &ControlServerConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Started(_))
    }

    /// The address actually bound, while running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.lifecycle {
            Lifecycle::Started(running) => Some(running.local_addr),
            _ => None,
        }
    }

    pub fn statistics(&self) -> ControlStatistics {
        self.state.statistics()
    }

    /// Bind the listening socket and launch the accept loop.
    ///
    /// The returned receiver fires once the accept loop is running and able
    /// to see both new connections and shutdown. Callers shouldn't assume the
    /// server is reachable until it has.
    pub async fn start(&mut self) -> Result<oneshot::Receiver<()>, ControlError> {
        if !matches!(self.lifecycle, Lifecycle::Created) {
            return Err(ControlError::AlreadyStarted);
        }

        let bind_error = |source: std::io::Error| ControlError::Bind {
            address: self.config.bind.clone(),
            source,
        };
        let listener = TcpListener::bind(&self.config.bind)
            .await
            .map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        Ok(self.launch(listener, local_addr))
    }

    /// Spawn the accept loop over `acceptor` and move to the started state
    fn launch<A: Acceptor>(&mut self, acceptor: A, local_addr: SocketAddr) -> oneshot::Receiver<()> {
        let procedures = procedures::build_table(&self.state);

        let accept_loop = AcceptLoop {
            acceptor,
            procedures: Arc::new(procedures),
            state: Arc::clone(&self.state),
            idle_timeout: self.config.idle_timeout(),
        };

        let (shutdown_send, shutdown_recv) = oneshot::channel();
        let (ready_send, ready_recv) = oneshot::channel();

        let span = tracing::dispatcher::with_default(&self.log_dispatch, || {
            tracing::info_span!("control server", %local_addr)
        });
        let accept_task = tokio::spawn(
            accept_loop
                .run(shutdown_recv, ready_send)
                .instrument(span)
                .with_subscriber(self.log_dispatch.clone()),
        );

        self.lifecycle = Lifecycle::Started(RunningServer {
            local_addr,
            shutdown: shutdown_send,
            accept_task,
        });

        ready_recv
    }

    /// Stop accepting connections and close the listening socket.
    ///
    /// Sessions that are already running are left alone, and finish when
    /// their peers disconnect.
    ///
    /// The shutdown signal is delivered whether or not closing the socket
    /// succeeds, so the accept loop ends even if this returns an error.
    pub async fn stop(&mut self) -> Result<(), ControlError> {
        let running = match std::mem::replace(&mut self.lifecycle, Lifecycle::Stopped) {
            Lifecycle::Started(running) => running,
            other => {
                self.lifecycle = other;
                return Err(ControlError::NotRunning);
            }
        };

        // Fails only if the accept loop has already gone, in which case
        // there's nobody to tell
        let _ = running.shutdown.send(());

        // The listener is owned by the accept loop, so it's closed once the
        // task is done
        running.accept_task.await?;
        Ok(())
    }
}

fn accept_backoff() -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_initial_interval(ACCEPT_BACKOFF_INITIAL)
        .with_max_interval(ACCEPT_BACKOFF_MAX)
        .with_multiplier(ACCEPT_BACKOFF_MULTIPLIER)
        .with_randomization_factor(0.0)
        .with_max_elapsed_time(None)
        .build()
}

impl<A: Acceptor> AcceptLoop<A> {
    async fn run(mut self, mut shutdown: oneshot::Receiver<()>, ready: oneshot::Sender<()>) {
        let mut backoff = accept_backoff();

        tracing::info!("Control server listening");
        tracing::debug!(procedures = ?self.procedures.names(), "Registered control procedures");
        ready.send(()).ok();

        loop {
            let retry_delay = select! {
                res = std::future::poll_fn(|cx| self.acceptor.poll_accept(cx)) => match res {
                    Ok((stream, peer)) => {
                        backoff.reset();
                        self.spawn_session(ControlConnection { stream, peer });
                        continue;
                    }
                    Err(e) => {
                        let delay = backoff.next_backoff().unwrap_or(ACCEPT_BACKOFF_MAX);
                        tracing::warn!("Error accepting control connection: {}; retrying in {:?}", e, delay);
                        delay
                    }
                },
                _ = &mut shutdown => break,
            };

            // Keep watching for shutdown while we wait out a broken socket
            select! {
                _ = tokio::time::sleep(retry_delay) => {},
                _ = &mut shutdown => break,
            }
        }

        tracing::info!("Control server shutting down");
    }

    fn spawn_session(&self, conn: ControlConnection<A::Stream>) {
        let (id, active) = self.state.session_started();
        let span = tracing::debug_span!("control session", id, peer = %conn.peer);

        tracing::debug!(id, peer = %conn.peer, "Accepted control connection");

        let session = ControlSession::new(
            conn.stream,
            Arc::clone(&self.procedures),
            self.idle_timeout,
            active,
        );
        tokio::spawn(session.run().instrument(span).with_current_subscriber());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use tokio::{io::DuplexStream, time::Instant};

    enum Step {
        Fail,
        Accept,
    }

    /// Hands out a fixed sequence of accept results, noting when each was taken
    struct ScriptedAcceptor {
        steps: VecDeque<Step>,
        fail_when_done: bool,
        attempts: Arc<Mutex<Vec<Instant>>>,
    }

    impl Acceptor for ScriptedAcceptor {
        type Stream = DuplexStream;

        fn poll_accept(
            &mut self,
            _cx: &mut Context<'_>,
        ) -> Poll<io::Result<(DuplexStream, SocketAddr)>> {
            let step = match self.steps.pop_front() {
                Some(step) => step,
                None if self.fail_when_done => Step::Fail,
                None => return Poll::Pending,
            };
            self.attempts.lock().push(Instant::now());

            Poll::Ready(match step {
                Step::Fail => Err(io::Error::new(io::ErrorKind::Other, "too many open files")),
                Step::Accept => {
                    // Peer end dropped straight away, so the session ends at once
                    let (_, stream) = tokio::io::duplex(64);
                    Ok((stream, SocketAddr::from(([127, 0, 0, 1], 40000))))
                }
            })
        }
    }

    fn launch_scripted(
        steps: Vec<Step>,
        fail_when_done: bool,
    ) -> (ControlServer, oneshot::Receiver<()>, Arc<Mutex<Vec<Instant>>>) {
        let attempts = Arc::new(Mutex::new(Vec::new()));
        let acceptor = ScriptedAcceptor {
            steps: steps.into(),
            fail_when_done,
            attempts: Arc::clone(&attempts),
        };

        let mut server = ControlServer::new(ControlServerConfig::new("127.0.0.1:6660")).unwrap();
        let ready = server.launch(acceptor, SocketAddr::from(([127, 0, 0, 1], 6660)));
        (server, ready, attempts)
    }

    fn gaps(attempts: &[Instant]) -> Vec<Duration> {
        attempts.windows(2).map(|w| w[1] - w[0]).collect()
    }

    fn assert_gaps(actual: &[Duration], expected_ms: &[u64]) {
        assert!(
            actual.len() >= expected_ms.len(),
            "only {} gaps: {:?}",
            actual.len(),
            actual
        );
        for (gap, ms) in actual.iter().zip(expected_ms) {
            let expected = Duration::from_millis(*ms);
            assert!(
                *gap >= expected && *gap < expected + Duration::from_millis(2),
                "gap of {:?} where {:?} was expected, in {:?}",
                gap,
                expected,
                actual
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn accept_errors_back_off_up_to_the_cap() {
        let (mut server, ready, attempts) = launch_scripted(Vec::new(), true);
        ready.await.unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;
        server.stop().await.unwrap();

        assert_gaps(
            &gaps(&attempts.lock()),
            &[5, 10, 20, 40, 80, 160, 320, 640, 1000, 1000, 1000],
        );
    }

    #[tokio::test(start_paused = true)]
    async fn successful_accept_resets_backoff() {
        let steps = vec![
            Step::Fail,
            Step::Fail,
            Step::Fail,
            Step::Accept,
            Step::Fail,
            Step::Fail,
        ];
        let (mut server, ready, attempts) = launch_scripted(steps, false);
        ready.await.unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        server.stop().await.unwrap();

        assert_eq!(attempts.lock().len(), 6);
        assert_gaps(&gaps(&attempts.lock()), &[5, 10, 20, 0, 5]);
        assert_eq!(server.statistics().sessions_accepted, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_interrupts_a_retry_delay() {
        let (mut server, ready, attempts) = launch_scripted(Vec::new(), true);
        ready.await.unwrap();

        // Part way through a 1s delay, with the next retry due at 3275ms
        tokio::time::sleep(Duration::from_millis(2500)).await;
        let attempted = attempts.lock().len();

        let before = Instant::now();
        server.stop().await.unwrap();

        assert!(before.elapsed() < Duration::from_millis(10));
        assert_eq!(attempts.lock().len(), attempted);
        assert!(!server.is_running());
    }
}
