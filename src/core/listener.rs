/// Client-facing accept loop
use crate::core::{ConnectionManager, Session, Topology, TopologyHandle};
use crate::error::{VigiaError, VigiaResult};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Pause after a failed accept, so fd exhaustion does not turn into a busy loop
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Accepts clients and starts one session per connection against the
/// topology current at accept time.
pub struct Listener {
    listener: TcpListener,
    connections: ConnectionManager,
    topology: TopologyHandle,
}

impl Listener {
    pub async fn bind(
        listen_addr: &str,
        connections: ConnectionManager,
        topology: TopologyHandle,
    ) -> VigiaResult<Self> {
        let listener = connections.create_listener(listen_addr).await?;
        Ok(Self {
            listener,
            connections,
            topology,
        })
    }

    pub fn local_addr(&self) -> VigiaResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept until `shutdown` fires. Accept errors are logged and skipped.
    pub async fn serve(self, shutdown: CancellationToken) {
        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.connections.accept_connection(&self.listener) => accepted,
            };

            match accepted {
                Ok((stream, client_addr)) => {
                    // The session is bound to this snapshot for its whole life
                    let snapshot = self.topology.snapshot().await;
                    let connections = self.connections.clone();
                    tokio::spawn(async move {
                        handle_client(stream, client_addr, snapshot, connections).await;
                    });
                }
                Err(e) => {
                    warn!("{}", VigiaError::AcceptFailed(e));
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }

        info!("Listener stopped");
    }
}

async fn handle_client(
    stream: TcpStream,
    client_addr: SocketAddr,
    snapshot: Option<Topology>,
    connections: ConnectionManager,
) {
    let Some(topology) = snapshot else {
        drop(stream);
        warn!(
            client = %client_addr,
            "No primary resolved yet, closing client connection"
        );
        return;
    };

    match Session::establish(stream, client_addr, topology, &connections).await {
        Ok(session) => {
            let id = session.id().to_string();
            let summary = session.run().await;
            debug!(
                session = %id,
                client = %client_addr,
                "Client handler finished: {}",
                summary.reason
            );
        }
        Err(e) => {
            warn!(client = %client_addr, "{}", e);
        }
    }
}
