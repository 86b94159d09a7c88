//! vigia - transparent TCP relay in front of a Redis primary tracked by Sentinel
//!
//! Clients connect to one stable address. Every connection is relayed byte for
//! byte to whichever node the sentinel currently reports as primary. When the
//! sentinel reports a different primary, every connection opened against the
//! old one is dropped so clients reconnect and land on the new primary.
//!
//! The pieces, leaves first:
//! 1. `core::epoch`: one-shot cancellation signal per published primary
//! 2. `core::topology`: the (primary, epoch) pair, published atomically
//! 3. `resolver`: polls the sentinel and rolls the topology on change
//! 4. `core::session`: dials the primary and relays both directions
//! 5. `core::listener`: accepts clients and starts sessions
pub mod config;
pub mod error;
pub mod core;
pub mod resolver;
pub mod utils;

use crate::config::Config;
use crate::core::{ConnectionManager, Listener, TopologyHandle, TopologyPublisher};
use crate::error::{VigiaError, VigiaResult};
use crate::resolver::{PrimaryLocator, Resolver, SentinelClient};
use crate::utils::with_default_host;
use std::net::SocketAddr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Runtime settings for one relay instance
#[derive(Debug, Clone)]
pub struct VigiaConfig {
    pub listen_addr: String,
    pub sentinel_addr: String,
    pub master_name: String,
    pub poll_interval: Duration,
    pub sentinel_timeout: Duration,
    pub probe_timeout: Duration,
    pub dial_timeout: Duration,
    pub response_buffer_size: usize,
}

impl VigiaConfig {
    /// Create a relay configuration with default timings
    pub fn new(
        listen_addr: String,
        sentinel_addr: String,
        master_name: String,
    ) -> Result<Self, String> {
        if listen_addr.trim().is_empty() {
            return Err("Listen address cannot be empty".to_string());
        }

        if sentinel_addr.trim().is_empty() {
            return Err("Sentinel address cannot be empty".to_string());
        }

        if master_name.trim().is_empty() {
            return Err("Master name cannot be empty".to_string());
        }

        let defaults = Config::default();
        Ok(Self {
            listen_addr,
            sentinel_addr,
            master_name,
            poll_interval: defaults.sentinel.poll_interval(),
            sentinel_timeout: defaults.sentinel.connect_timeout(),
            probe_timeout: defaults.sentinel.probe_timeout(),
            dial_timeout: defaults.server.dial_timeout(),
            response_buffer_size: defaults.sentinel.response_buffer_size,
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

impl From<&Config> for VigiaConfig {
    fn from(config: &Config) -> Self {
        Self {
            listen_addr: config.server.listen_addr.clone(),
            sentinel_addr: config.sentinel.addr.clone(),
            master_name: config.sentinel.master_name.clone(),
            poll_interval: config.sentinel.poll_interval(),
            sentinel_timeout: config.sentinel.connect_timeout(),
            probe_timeout: config.sentinel.probe_timeout(),
            dial_timeout: config.server.dial_timeout(),
            response_buffer_size: config.sentinel.response_buffer_size,
        }
    }
}

/// A bound relay: listener ready, resolver not yet polling
pub struct Vigia {
    config: VigiaConfig,
    listener: Listener,
    resolver: Resolver,
    shutdown: CancellationToken,
}

impl Vigia {
    /// Bind the listener and prepare a resolver querying the configured sentinel
    pub async fn bind(config: VigiaConfig) -> VigiaResult<Self> {
        let locator = SentinelClient::new(
            config.sentinel_addr.clone(),
            config.master_name.clone(),
            config.sentinel_timeout,
            config.response_buffer_size,
        );
        Self::bind_with_locator(config, Box::new(locator)).await
    }

    /// Bind the listener with a custom primary locator
    pub async fn bind_with_locator(
        config: VigiaConfig,
        locator: Box<dyn PrimaryLocator>,
    ) -> VigiaResult<Self> {
        let (publisher, topology) = TopologyPublisher::new();
        let connections = ConnectionManager::new(config.dial_timeout);
        let listen_addr = with_default_host(&config.listen_addr, "0.0.0.0");
        let listener = Listener::bind(&listen_addr, connections, topology).await?;
        let resolver = Resolver::new(locator, publisher, config.poll_interval)
            .with_probe(config.probe_timeout);

        Ok(Self {
            config,
            listener,
            resolver,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn local_addr(&self) -> VigiaResult<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn topology(&self) -> TopologyHandle {
        self.resolver.topology()
    }

    /// Token that stops the relay when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Poll and serve until the shutdown token is cancelled
    pub async fn run(self) -> VigiaResult<()> {
        let Vigia {
            config,
            listener,
            resolver,
            shutdown,
        } = self;

        info!(
            listen = %listener.local_addr()?,
            sentinel = %config.sentinel_addr,
            master = %config.master_name,
            "Starting relay"
        );

        let resolving = tokio::spawn(resolver.run(shutdown.clone()));
        listener.serve(shutdown).await;

        resolving
            .await
            .map_err(|e| VigiaError::internal(format!("resolver task failed: {}", e)))?;

        Ok(())
    }
}
