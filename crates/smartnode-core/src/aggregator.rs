//! Concurrent status lookup across every minipool an owner has.
//!
//! The join is all-or-nothing: if any single status query fails, the whole
//! call fails and no partial list is returned. Acting on an incomplete view
//! of the node's own minipools is never allowed.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::debug;

use crate::gateway::LedgerGateway;
use crate::types::{Address, Minipool, MinipoolStatus};
use crate::{NodeError, Result};

/// Discover every minipool owned by `owner` and query all statuses in
/// parallel, one task per minipool.
///
/// Results come back in discovery order.
pub async fn load_minipools(
    gateway: Arc<dyn LedgerGateway>,
    owner: Address,
) -> Result<Vec<Minipool>> {
    let addresses = gateway.owned_minipools(owner).await?;
    debug!(owner = %owner, count = addresses.len(), "discovered minipools");
    if addresses.is_empty() {
        return Ok(Vec::new());
    }

    let mut tasks = JoinSet::new();
    for (index, address) in addresses.iter().copied().enumerate() {
        let gateway = Arc::clone(&gateway);
        tasks.spawn(async move { (index, gateway.minipool_status(address).await) });
    }

    // One slot per minipool, written only by the task that owns that index.
    let mut statuses: Vec<Option<MinipoolStatus>> = vec![None; addresses.len()];
    while let Some(joined) = tasks.join_next().await {
        let (index, result) = joined.map_err(|e| NodeError::Task(e.to_string()))?;
        // First error wins; dropping `tasks` aborts the rest.
        statuses[index] = Some(result?);
    }

    addresses
        .into_iter()
        .zip(statuses)
        .map(|(address, status)| {
            status
                .map(|status| Minipool { address, status })
                .ok_or_else(|| {
                    NodeError::ApiResponse(format!("no status recorded for minipool {address}"))
                })
        })
        .collect()
}

/// Minipools owned by `owner` whose current status equals `target`.
pub async fn minipools_in_status(
    gateway: Arc<dyn LedgerGateway>,
    owner: Address,
    target: MinipoolStatus,
) -> Result<Vec<Minipool>> {
    let minipools = load_minipools(gateway, owner).await?;
    Ok(minipools
        .into_iter()
        .filter(|mp| mp.status == target)
        .collect())
}
