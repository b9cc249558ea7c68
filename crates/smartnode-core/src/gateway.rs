//! Seams between the scheduler and the outside world.
//!
//! The scheduler only ever talks to the ledger through these traits, so the
//! transport (local `docker exec`, SSH, or an in-memory fake in tests) is
//! chosen by whoever wires the daemon together.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::types::{Address, Minipool, MinipoolStatus};
use crate::Result;

/// Read access to the ledger: which minipools an owner has, and where each
/// one is in its lifecycle.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    async fn owned_minipools(&self, owner: Address) -> Result<Vec<Address>>;

    async fn minipool_status(&self, minipool: Address) -> Result<MinipoolStatus>;
}

/// Attempts to advance one minipool to its next lifecycle stage.
///
/// Must return in bounded time. A successful return does not mean the new
/// status is visible yet; the next cycle's fresh query is the confirmation.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Verb used in log lines ("stake", "withdraw", ...).
    fn action(&self) -> &str;

    async fn execute(&self, minipool: &Minipool) -> Result<()>;
}

/// Blocks until the node is safe to query and act on.
///
/// Resolves to the owner account the scheduler discovers minipools for. An
/// account that cannot be resolved yet is a readiness failure like any other.
#[async_trait]
pub trait ReadinessGate: Send + Sync {
    async fn wait_ready(&self, cancel: &CancellationToken) -> Result<Address>;
}
