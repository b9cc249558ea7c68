use async_trait::async_trait;
use tracing::warn;

use crate::gateway::ActionExecutor;
use crate::types::Minipool;
use crate::Result;

/// Stake executor for builds without transaction submission.
///
/// Reports success without touching the ledger, so the minipool stays in
/// `prelaunch` and is picked up again on the next cycle.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnimplementedStaker;

#[async_trait]
impl ActionExecutor for UnimplementedStaker {
    fn action(&self) -> &str {
        "stake"
    }

    async fn execute(&self, minipool: &Minipool) -> Result<()> {
        warn!(minipool = %minipool.address, "minipool staking not implemented");
        Ok(())
    }
}
