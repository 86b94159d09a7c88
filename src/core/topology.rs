/// Published topology: the current primary paired with its epoch.
///
/// The resolver owns the only `TopologyPublisher`; everything else holds a
/// `TopologyHandle` and reads snapshots. Address and epoch live in a single
/// slot behind one lock, so a reader can never see the address of one
/// generation next to the epoch of another.
use crate::core::{Epoch, EpochWatch, PrimaryAddress};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Snapshot of one generation.
#[derive(Debug, Clone)]
pub struct Topology {
    pub primary: PrimaryAddress,
    pub epoch: EpochWatch,
}

impl Topology {
    pub fn generation(&self) -> u64 {
        self.epoch.generation()
    }
}

type TopologySlot = Arc<RwLock<Option<Topology>>>;

/// Read-only handle to the published topology
#[derive(Debug, Clone)]
pub struct TopologyHandle {
    slot: TopologySlot,
}

/// Write side of the topology, owned by the resolver
#[derive(Debug)]
pub struct TopologyPublisher {
    slot: TopologySlot,
    current: Option<(PrimaryAddress, Epoch)>,
    generation: u64,
}

impl TopologyHandle {
    /// Copy of the topology current at call time, `None` before the first
    /// successful resolution.
    pub async fn snapshot(&self) -> Option<Topology> {
        self.slot.read().await.clone()
    }
}

impl TopologyPublisher {
    pub fn new() -> (Self, TopologyHandle) {
        let slot: TopologySlot = Arc::new(RwLock::new(None));
        let publisher = Self {
            slot: Arc::clone(&slot),
            current: None,
            generation: 0,
        };
        (publisher, TopologyHandle { slot })
    }

    /// Another handle onto the same slot
    pub fn handle(&self) -> TopologyHandle {
        TopologyHandle {
            slot: Arc::clone(&self.slot),
        }
    }

    /// Last published primary, `None` while unset
    pub fn current_primary(&self) -> Option<&PrimaryAddress> {
        self.current.as_ref().map(|(primary, _)| primary)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Publish `primary` under a fresh epoch and close the previous one.
    ///
    /// Both happen while the write lock is held: no snapshot can pair the new
    /// address with the old epoch, and by the time a reader sees the new
    /// topology every session of the old generation has been told to stop.
    pub async fn rollover(&mut self, primary: PrimaryAddress) -> u64 {
        let generation = self.generation + 1;
        let epoch = Epoch::new(generation);

        let mut slot = self.slot.write().await;
        *slot = Some(Topology {
            primary: primary.clone(),
            epoch: epoch.watch(),
        });
        if let Some((previous, stale)) = self.current.replace((primary, epoch)) {
            stale.close();
            info!(
                generation = stale.generation(),
                primary = %previous,
                "Closed epoch of superseded primary"
            );
        }
        drop(slot);

        self.generation = generation;
        generation
    }

    /// Close the current epoch without publishing a successor, ending every
    /// live session. The last topology stays readable but is already closed.
    pub fn retire(&mut self) {
        if let Some((primary, epoch)) = &self.current {
            epoch.close();
            info!(generation = epoch.generation(), primary = %primary, "Retired topology");
        }
    }
}
