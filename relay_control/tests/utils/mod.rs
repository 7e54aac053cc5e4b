use parking_lot::Mutex;
use relay_control::{ControlServer, ControlServerConfig};
use relay_network::{ConnectionConfig, ConnectionSet};
use std::{io, net::SocketAddr, sync::Arc};

pub fn test_registry(names: &[&str]) -> Arc<ConnectionSet> {
    Arc::new(ConnectionSet::from_configs(names.iter().enumerate().map(
        |(i, name)| ConnectionConfig::new(*name, format!("irc{}.example.net", i), 6697),
    )))
}

/// Start a server on an ephemeral loopback port and wait until it's ready
pub async fn start_server(registry: Arc<ConnectionSet>) -> (ControlServer, SocketAddr) {
    let server = ControlServer::new(ControlServerConfig::new("127.0.0.1:0")).unwrap();
    start_prepared(server, registry).await
}

pub async fn start_prepared(
    mut server: ControlServer,
    registry: Arc<ConnectionSet>,
) -> (ControlServer, SocketAddr) {
    server.set_connection_registry(registry);
    let ready = server.start().await.unwrap();
    ready.await.unwrap();
    let addr = server.local_addr().unwrap();
    (server, addr)
}

/// An address nothing is listening on, at least for the moment
pub fn unused_local_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// Collects everything written by a `tracing_subscriber::fmt` subscriber
#[derive(Clone, Default)]
pub struct CapturedLog(Arc<Mutex<Vec<u8>>>);

impl CapturedLog {
    pub fn dispatch(&self) -> tracing::Dispatch {
        let log = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || log.clone())
            .finish();
        tracing::Dispatch::new(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl io::Write for CapturedLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
