/// Primary resolution and topology change detection
///
/// The resolver polls a `PrimaryLocator` on a fixed period. Whenever the
/// located primary differs from the last published one (the very first
/// success always does), it rolls the epoch and publishes the new topology.
/// Failed polls are logged and leave the published topology untouched.
pub mod probe;
pub mod sentinel;

pub use probe::{Prober, ProbeStatus};
pub use sentinel::SentinelClient;

use crate::core::{PrimaryAddress, TopologyHandle, TopologyPublisher};
use crate::error::VigiaResult;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Source of truth for the current primary address
#[async_trait]
pub trait PrimaryLocator: Send + Sync {
    /// Ask for the current primary
    async fn locate(&self) -> VigiaResult<PrimaryAddress>;

    /// Short description for logs
    fn describe(&self) -> String;
}

/// What a single poll did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// A new primary was published under `generation`
    Changed {
        previous: Option<PrimaryAddress>,
        current: PrimaryAddress,
        generation: u64,
    },
    /// The primary is the one already published
    Unchanged,
    /// The lookup failed; the published topology is kept
    Failed,
}

pub struct Resolver {
    locator: Box<dyn PrimaryLocator>,
    prober: Option<Prober>,
    publisher: TopologyPublisher,
    poll_interval: Duration,
}

impl Resolver {
    pub fn new(
        locator: Box<dyn PrimaryLocator>,
        publisher: TopologyPublisher,
        poll_interval: Duration,
    ) -> Self {
        Self {
            locator,
            prober: None,
            publisher,
            poll_interval,
        }
    }

    /// Probe every newly located primary before publishing it
    pub fn with_probe(mut self, probe_timeout: Duration) -> Self {
        self.prober = Some(Prober::new(probe_timeout));
        self
    }

    pub fn topology(&self) -> TopologyHandle {
        self.publisher.handle()
    }

    /// Poll once and publish on change
    pub async fn tick(&mut self) -> TickOutcome {
        let located = match self.locator.locate().await {
            Ok(primary) => primary,
            Err(e) => {
                warn!(
                    source = %self.locator.describe(),
                    severity = %e.severity(),
                    "Primary lookup failed, keeping current topology: {}",
                    e
                );
                return TickOutcome::Failed;
            }
        };

        let previous = self.publisher.current_primary().cloned();
        if previous.as_ref() == Some(&located) {
            debug!(primary = %located, "Primary unchanged");
            return TickOutcome::Unchanged;
        }

        if let Some(prober) = &self.prober {
            let status = prober.probe(&located).await;
            if let Some(e) = status.to_error(&located) {
                // Advisory only: the sentinel's answer is still published
                warn!("{}", e);
            }
        }

        let generation = self.publisher.rollover(located.clone()).await;
        match &previous {
            Some(previous) => info!(
                generation,
                "Primary changed from {} to {}", previous, located
            ),
            None => info!(generation, "Primary resolved to {}", located),
        }

        TickOutcome::Changed {
            previous,
            current: located,
            generation,
        }
    }

    /// Poll until `shutdown` fires, then close the current epoch.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            source = %self.locator.describe(),
            "Resolver polling every {:?}",
            self.poll_interval
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }
            self.tick().await;
        }

        self.publisher.retire();
        info!("Resolver stopped");
    }
}
