/// One-shot cancellation signal tied to a single published primary.
///
/// An `Epoch` is owned by whoever publishes the topology and is closed exactly
/// once, when that topology is superseded. Sessions hold an `EpochWatch`,
/// which can only wait for closure. Closing releases every waiter at once.
use tokio_util::sync::CancellationToken;

/// Owning side of an epoch. Only the owner can close it.
#[derive(Debug)]
pub struct Epoch {
    generation: u64,
    token: CancellationToken,
}

/// Read-only view of an epoch handed to sessions.
#[derive(Debug, Clone)]
pub struct EpochWatch {
    generation: u64,
    token: CancellationToken,
}

impl Epoch {
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            token: CancellationToken::new(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Close the epoch. Further calls are no-ops.
    pub fn close(&self) {
        self.token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn watch(&self) -> EpochWatch {
        EpochWatch {
            generation: self.generation,
            token: self.token.clone(),
        }
    }
}

impl EpochWatch {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until the epoch is closed. Returns immediately if it already is.
    pub async fn closed(&self) {
        self.token.cancelled().await
    }
}
