/// One relayed client <-> primary connection pair.
///
/// A session dials the primary once, then runs two one-directional relays.
/// It ends on the first of: the client side finishing, the primary side
/// finishing, or its captured epoch closing. Whatever fires first is latched
/// as the teardown reason; both sockets are owned by the relay tasks and are
/// closed exactly once, when those tasks end or are aborted.
use crate::core::{ConnectionManager, ConnectionResult, EpochWatch, PrimaryAddress, Topology};
use crate::error::{VigiaError, VigiaResult};
use crate::utils::{format_bytes, format_duration, generate_id};
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

const RELAY_BUFFER_SIZE: usize = 8192;

/// Why a session was torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownReason {
    /// The client closed or errored
    ClientClosed,
    /// The primary closed or errored
    PrimaryClosed,
    /// The topology the session was created under was superseded
    EpochClosed,
}

impl fmt::Display for TeardownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeardownReason::ClientClosed => write!(f, "client closed"),
            TeardownReason::PrimaryClosed => write!(f, "primary closed"),
            TeardownReason::EpochClosed => write!(f, "epoch closed"),
        }
    }
}

/// Latch recording the first teardown trigger; later triggers are ignored.
#[derive(Debug, Default)]
struct Teardown {
    reason: OnceLock<TeardownReason>,
}

impl Teardown {
    /// Returns true if this call was the first trigger
    fn trigger(&self, reason: TeardownReason) -> bool {
        self.reason.set(reason).is_ok()
    }

    fn reason(&self) -> Option<TeardownReason> {
        self.reason.get().copied()
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    ClientToPrimary,
    PrimaryToClient,
}

impl Direction {
    fn source_closed(self) -> TeardownReason {
        match self {
            Direction::ClientToPrimary => TeardownReason::ClientClosed,
            Direction::PrimaryToClient => TeardownReason::PrimaryClosed,
        }
    }

    fn destination_closed(self) -> TeardownReason {
        match self {
            Direction::ClientToPrimary => TeardownReason::PrimaryClosed,
            Direction::PrimaryToClient => TeardownReason::ClientClosed,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ClientToPrimary => write!(f, "client->primary"),
            Direction::PrimaryToClient => write!(f, "primary->client"),
        }
    }
}

#[derive(Debug, Default)]
struct RelayCounters {
    client_to_primary: AtomicU64,
    primary_to_client: AtomicU64,
}

impl RelayCounters {
    fn add(&self, direction: Direction, n: usize) {
        let counter = match direction {
            Direction::ClientToPrimary => &self.client_to_primary,
            Direction::PrimaryToClient => &self.primary_to_client,
        };
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }
}

/// What a finished session reports
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: String,
    pub reason: TeardownReason,
    pub generation: u64,
    pub bytes_client_to_primary: u64,
    pub bytes_primary_to_client: u64,
    pub duration: Duration,
}

/// A dialed session, ready to relay
#[derive(Debug)]
pub struct Session {
    id: String,
    client: TcpStream,
    client_addr: SocketAddr,
    primary: TcpStream,
    primary_addr: PrimaryAddress,
    epoch: EpochWatch,
}

impl Session {
    /// Dial the primary of `topology` for an accepted client.
    ///
    /// On failure the client connection is dropped (closed) before the error
    /// is returned; there is no retry.
    pub async fn establish(
        client: TcpStream,
        client_addr: SocketAddr,
        topology: Topology,
        connections: &ConnectionManager,
    ) -> VigiaResult<Self> {
        let Topology { primary, epoch } = topology;

        if epoch.is_closed() {
            drop(client);
            return Err(VigiaError::primary_dial(
                primary.to_string(),
                "topology superseded before dial".to_string(),
            ));
        }

        let stream = match connections.connect_to_primary(&primary).await {
            ConnectionResult::Success(stream) => stream,
            failed => {
                drop(client);
                let reason = failed.failure_reason().unwrap_or_default();
                return Err(VigiaError::primary_dial(primary.to_string(), reason));
            }
        };

        Ok(Self {
            id: generate_id("session"),
            client,
            client_addr,
            primary: stream,
            primary_addr: primary,
            epoch,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn generation(&self) -> u64 {
        self.epoch.generation()
    }

    /// Relay until teardown and return a summary. Both sockets are closed
    /// by the time this returns.
    pub async fn run(self) -> SessionSummary {
        let Session {
            id,
            client,
            client_addr,
            primary,
            primary_addr,
            epoch,
        } = self;
        let started = Instant::now();

        info!(
            session = %id,
            client = %client_addr,
            primary = %primary_addr,
            generation = epoch.generation(),
            "Session established"
        );

        let (client_read, client_write) = client.into_split();
        let (primary_read, primary_write) = primary.into_split();
        let teardown = Arc::new(Teardown::default());
        let counters = Arc::new(RelayCounters::default());

        let mut upstream = tokio::spawn(relay(
            client_read,
            primary_write,
            Direction::ClientToPrimary,
            Arc::clone(&counters),
            Arc::clone(&teardown),
        ));
        let mut downstream = tokio::spawn(relay(
            primary_read,
            client_write,
            Direction::PrimaryToClient,
            Arc::clone(&counters),
            Arc::clone(&teardown),
        ));

        tokio::select! {
            _ = epoch.closed() => {
                if teardown.trigger(TeardownReason::EpochClosed) {
                    debug!(session = %id, "Epoch closed, dropping client");
                }
            }
            _ = &mut upstream => {}
            _ = &mut downstream => {}
        }

        // Dropping the aborted relays drops their socket halves, which is
        // what closes the client and primary connections.
        stop(upstream).await;
        stop(downstream).await;

        let reason = teardown.reason().unwrap_or(TeardownReason::EpochClosed);
        let summary = SessionSummary {
            id,
            reason,
            generation: epoch.generation(),
            bytes_client_to_primary: counters.client_to_primary.load(Ordering::Relaxed),
            bytes_primary_to_client: counters.primary_to_client.load(Ordering::Relaxed),
            duration: started.elapsed(),
        };

        info!(
            session = %summary.id,
            client = %client_addr,
            primary = %primary_addr,
            reason = %summary.reason,
            "Session closed after {} ({} up, {} down)",
            format_duration(summary.duration),
            format_bytes(summary.bytes_client_to_primary),
            format_bytes(summary.bytes_primary_to_client),
        );

        summary
    }
}

/// Abort a relay task unless it already finished, and wait until it is gone.
async fn stop(handle: JoinHandle<()>) {
    if handle.is_finished() {
        return;
    }
    handle.abort();
    if let Err(e) = handle.await {
        if !e.is_cancelled() {
            warn!("Relay task failed: {}", e);
        }
    }
}

/// Copy bytes from `source` to `destination` until either side fails, then
/// shut down the destination so the end of stream propagates.
async fn relay<R, W>(
    mut source: R,
    mut destination: W,
    direction: Direction,
    counters: Arc<RelayCounters>,
    teardown: Arc<Teardown>,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; RELAY_BUFFER_SIZE];

    let reason = loop {
        match source.read(&mut buf).await {
            Ok(0) => {
                debug!("{} reached end of stream", direction);
                break direction.source_closed();
            }
            Ok(n) => {
                if let Err(e) = destination.write_all(&buf[..n]).await {
                    debug!("{} write failed: {}", direction, e);
                    break direction.destination_closed();
                }
                counters.add(direction, n);
                trace!("{} relayed {} bytes", direction, n);
            }
            Err(e) => {
                debug!("{} read failed: {}", direction, e);
                break direction.source_closed();
            }
        }
    };

    teardown.trigger(reason);
    let _ = destination.shutdown().await;
}
