//! Repeating discover → filter → act loop.
//!
//! Each cycle waits for the node to be ready, which also yields the owner
//! account, loads every minipool that account owns, keeps the ones in the
//! target status and hands them to the executor one at a time. Nothing inside a cycle can stop the loop: failures are logged and
//! the scheduler sleeps until the next cycle. Only the cancellation token
//! ends it.
//!
//! The sleep starts when a cycle finishes, so a slow cycle pushes the next
//! one back instead of causing a skipped or overlapping cycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::aggregator::minipools_in_status;
use crate::config::TaskConfig;
use crate::gateway::{ActionExecutor, LedgerGateway, ReadinessGate};
use crate::types::{Minipool, MinipoolStatus};
use crate::{NodeError, Result};

// ---------------------------------------------------------------------------
// SchedulerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub target_status: MinipoolStatus,
    pub interval: Duration,
}

impl SchedulerConfig {
    pub fn from_task(task: &TaskConfig) -> Self {
        Self {
            target_status: task.target_status,
            interval: task.interval(),
        }
    }
}

// ---------------------------------------------------------------------------
// CycleOutcome
// ---------------------------------------------------------------------------

/// What a single cycle ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The token fired before or during the cycle.
    Cancelled,
    /// The readiness gate returned an error.
    NotReady,
    /// Discovery or one of the status queries failed.
    AggregationFailed,
    /// No minipool was in the target status.
    Idle,
    Dispatched {
        attempted: usize,
        succeeded: usize,
        failed: usize,
    },
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

pub struct Scheduler {
    config: SchedulerConfig,
    gateway: Arc<dyn LedgerGateway>,
    executor: Arc<dyn ActionExecutor>,
    readiness: Arc<dyn ReadinessGate>,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        gateway: Arc<dyn LedgerGateway>,
        executor: Arc<dyn ActionExecutor>,
        readiness: Arc<dyn ReadinessGate>,
    ) -> Self {
        Self {
            config,
            gateway,
            executor,
            readiness,
            cancel: CancellationToken::new(),
        }
    }

    /// Bind the scheduler to an existing token, e.g. a child of the daemon's
    /// shutdown token.
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Spawn the loop on the current tokio runtime and return immediately.
    pub fn start(self) -> SchedulerHandle {
        let cancel = self.cancel.clone();
        let join = tokio::spawn(self.run());
        SchedulerHandle { cancel, join }
    }

    /// Run cycles until the token is cancelled.
    pub async fn run(self) {
        info!(
            target = %self.config.target_status,
            interval_secs = self.config.interval.as_secs(),
            "{} scheduler started",
            self.executor.action()
        );

        while !self.cancel.is_cancelled() {
            if self.run_cycle().await == CycleOutcome::Cancelled {
                break;
            }
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }

        info!("{} scheduler stopped", self.executor.action());
    }

    /// Run one discover → filter → act pass.
    pub async fn run_cycle(&self) -> CycleOutcome {
        if self.cancel.is_cancelled() {
            return CycleOutcome::Cancelled;
        }
        debug!("cycle started");

        let ready = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(NodeError::Cancelled),
            res = self.readiness.wait_ready(&self.cancel) => res,
        };
        let owner = match ready {
            Ok(owner) => owner,
            Err(NodeError::Cancelled) => return CycleOutcome::Cancelled,
            Err(e) => {
                warn!(error = %e, "node not ready, skipping cycle");
                return CycleOutcome::NotReady;
            }
        };

        let found = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return CycleOutcome::Cancelled,
            res = minipools_in_status(
                Arc::clone(&self.gateway),
                owner,
                self.config.target_status,
            ) => res,
        };
        let minipools = match found {
            Ok(minipools) => minipools,
            Err(e) => {
                warn!(error = %e, "could not load {} minipools", self.config.target_status);
                return CycleOutcome::AggregationFailed;
            }
        };
        if minipools.is_empty() {
            debug!("no minipools in {}", self.config.target_status);
            return CycleOutcome::Idle;
        }

        let action = self.executor.action();
        info!(
            count = minipools.len(),
            "{} minipools are ready to {action}",
            minipools.len()
        );

        let mut succeeded = 0;
        let mut failed = 0;
        for mp in &minipools {
            if self.cancel.is_cancelled() {
                info!(
                    remaining = minipools.len() - succeeded - failed,
                    "cancelled, skipping remaining minipools"
                );
                break;
            }
            info!(minipool = %mp.address, "attempting to {action} minipool");
            match self.dispatch(mp).await {
                Ok(()) => {
                    succeeded += 1;
                    info!(minipool = %mp.address, "{action} succeeded");
                }
                Err(e) => {
                    failed += 1;
                    warn!(minipool = %mp.address, error = %e, "could not {action} minipool");
                }
            }
        }

        debug!(succeeded, failed, "cycle finished");
        CycleOutcome::Dispatched {
            attempted: succeeded + failed,
            succeeded,
            failed,
        }
    }

    /// Run the executor in its own task so a panic is contained to this
    /// minipool.
    async fn dispatch(&self, mp: &Minipool) -> Result<()> {
        let executor = Arc::clone(&self.executor);
        let mp = mp.clone();
        tokio::spawn(async move { executor.execute(&mp).await })
            .await
            .map_err(|e| NodeError::Task(e.to_string()))?
    }
}

// ---------------------------------------------------------------------------
// SchedulerHandle
// ---------------------------------------------------------------------------

/// Owner-side handle to a running scheduler.
pub struct SchedulerHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Cancel the loop and wait for it to exit.
    pub async fn stop(self) -> Result<()> {
        self.cancel.cancel();
        self.join.await.map_err(|e| NodeError::Task(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::tests::{addr, FakeLedger};
    use crate::types::Address;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    // ─── Fakes ────────────────────────────────────────────────────────────

    #[derive(Default)]
    struct FakeReadiness {
        failing: AtomicBool,
        block_forever: bool,
        delay: Duration,
        calls: Mutex<Vec<Instant>>,
    }

    impl FakeReadiness {
        fn calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ReadinessGate for FakeReadiness {
        async fn wait_ready(&self, cancel: &CancellationToken) -> Result<Address> {
            self.calls.lock().unwrap().push(Instant::now());
            if self.block_forever {
                cancel.cancelled().await;
                return Err(NodeError::Cancelled);
            }
            tokio::time::sleep(self.delay).await;
            if self.failing.load(Ordering::SeqCst) {
                return Err(NodeError::AccountUnavailable("api container not running".into()));
            }
            Ok(addr(0xaa))
        }
    }

    #[derive(Default)]
    struct RecordingExecutor {
        attempts: Mutex<Vec<Address>>,
        failing: HashSet<Address>,
        panicking: HashSet<Address>,
    }

    #[async_trait]
    impl ActionExecutor for RecordingExecutor {
        fn action(&self) -> &str {
            "stake"
        }

        async fn execute(&self, minipool: &Minipool) -> Result<()> {
            self.attempts.lock().unwrap().push(minipool.address);
            if self.panicking.contains(&minipool.address) {
                panic!("executor blew up");
            }
            if self.failing.contains(&minipool.address) {
                return Err(NodeError::Action {
                    action: "stake".into(),
                    address: minipool.address.to_string(),
                    message: "insufficient balance".into(),
                });
            }
            Ok(())
        }
    }

    struct Harness {
        ledger: Arc<FakeLedger>,
        executor: Arc<RecordingExecutor>,
        readiness: Arc<FakeReadiness>,
    }

    impl Harness {
        fn new(ledger: FakeLedger, executor: RecordingExecutor, readiness: FakeReadiness) -> Self {
            Self {
                ledger: Arc::new(ledger),
                executor: Arc::new(executor),
                readiness: Arc::new(readiness),
            }
        }

        fn scheduler(&self, interval: Duration) -> Scheduler {
            Scheduler::new(
                SchedulerConfig {
                    target_status: MinipoolStatus::Prelaunch,
                    interval,
                },
                self.ledger.clone(),
                self.executor.clone(),
                self.readiness.clone(),
            )
        }

        fn attempts(&self) -> Vec<Address> {
            self.executor.attempts.lock().unwrap().clone()
        }
    }

    fn three_minipools() -> FakeLedger {
        FakeLedger::with(&[
            (addr(1), MinipoolStatus::Prelaunch),
            (addr(2), MinipoolStatus::Staking),
            (addr(3), MinipoolStatus::Prelaunch),
        ])
    }

    // ─── Single cycle ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn dispatches_only_target_minipools_in_order() {
        let h = Harness::new(
            three_minipools(),
            RecordingExecutor::default(),
            FakeReadiness::default(),
        );
        let outcome = h.scheduler(Duration::from_secs(60)).run_cycle().await;
        assert_eq!(
            outcome,
            CycleOutcome::Dispatched {
                attempted: 2,
                succeeded: 2,
                failed: 0
            }
        );
        assert_eq!(h.attempts(), vec![addr(1), addr(3)]);
    }

    #[tokio::test]
    async fn one_failed_action_does_not_block_the_rest() {
        let executor = RecordingExecutor {
            failing: HashSet::from([addr(1)]),
            ..Default::default()
        };
        let h = Harness::new(three_minipools(), executor, FakeReadiness::default());
        let outcome = h.scheduler(Duration::from_secs(60)).run_cycle().await;
        assert_eq!(
            outcome,
            CycleOutcome::Dispatched {
                attempted: 2,
                succeeded: 1,
                failed: 1
            }
        );
        assert_eq!(h.attempts(), vec![addr(1), addr(3)]);
    }

    #[tokio::test]
    async fn panicking_action_is_contained() {
        let executor = RecordingExecutor {
            panicking: HashSet::from([addr(1)]),
            ..Default::default()
        };
        let h = Harness::new(three_minipools(), executor, FakeReadiness::default());
        let outcome = h.scheduler(Duration::from_secs(60)).run_cycle().await;
        assert_eq!(
            outcome,
            CycleOutcome::Dispatched {
                attempted: 2,
                succeeded: 1,
                failed: 1
            }
        );
        assert_eq!(h.attempts(), vec![addr(1), addr(3)]);
    }

    #[tokio::test]
    async fn readiness_failure_skips_discovery() {
        let readiness = FakeReadiness::default();
        readiness.failing.store(true, Ordering::SeqCst);
        let h = Harness::new(three_minipools(), RecordingExecutor::default(), readiness);
        let outcome = h.scheduler(Duration::from_secs(60)).run_cycle().await;
        assert_eq!(outcome, CycleOutcome::NotReady);
        assert_eq!(h.ledger.discovery_calls.load(Ordering::SeqCst), 0);
        assert!(h.attempts().is_empty());
    }

    #[tokio::test]
    async fn status_failure_dispatches_nothing() {
        let ledger = FakeLedger::with(&[(addr(1), MinipoolStatus::Prelaunch)]);
        ledger.fail_status(addr(1), "network unreachable");
        let h = Harness::new(ledger, RecordingExecutor::default(), FakeReadiness::default());
        let outcome = h.scheduler(Duration::from_secs(60)).run_cycle().await;
        assert_eq!(outcome, CycleOutcome::AggregationFailed);
        assert!(h.attempts().is_empty());
    }

    #[tokio::test]
    async fn discovery_uses_the_account_from_readiness() {
        let h = Harness::new(
            three_minipools(),
            RecordingExecutor::default(),
            FakeReadiness::default(),
        );
        h.scheduler(Duration::from_secs(60)).run_cycle().await;
        assert_eq!(*h.ledger.owners_seen.lock().unwrap(), vec![addr(0xaa)]);
    }

    #[tokio::test]
    async fn nothing_in_target_status_is_idle() {
        let ledger = FakeLedger::with(&[(addr(1), MinipoolStatus::Staking)]);
        let h = Harness::new(ledger, RecordingExecutor::default(), FakeReadiness::default());
        let outcome = h.scheduler(Duration::from_secs(60)).run_cycle().await;
        assert_eq!(outcome, CycleOutcome::Idle);
        assert!(h.attempts().is_empty());
    }

    #[tokio::test]
    async fn cancelled_scheduler_runs_no_cycle() {
        let h = Harness::new(
            three_minipools(),
            RecordingExecutor::default(),
            FakeReadiness::default(),
        );
        let token = CancellationToken::new();
        token.cancel();
        let scheduler = h.scheduler(Duration::from_secs(60)).with_cancel_token(token);
        assert_eq!(scheduler.run_cycle().await, CycleOutcome::Cancelled);
        assert_eq!(h.readiness.calls(), 0);
    }

    // ─── Loop ─────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn failed_cycles_keep_the_loop_alive() {
        let readiness = FakeReadiness::default();
        readiness.failing.store(true, Ordering::SeqCst);
        let h = Harness::new(three_minipools(), RecordingExecutor::default(), readiness);
        let handle = h.scheduler(Duration::from_secs(60)).start();

        // cycles at t=0, 60, 120
        tokio::time::sleep(Duration::from_secs(150)).await;
        assert_eq!(h.readiness.calls(), 3);
        assert!(!handle.is_finished());

        // recovery is picked up on the following cycle
        h.readiness.failing.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(h.attempts(), vec![addr(1), addr(3)]);

        handle.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn slow_cycle_delays_the_next_one() {
        let readiness = FakeReadiness {
            delay: Duration::from_secs(30),
            ..Default::default()
        };
        let h = Harness::new(FakeLedger::default(), RecordingExecutor::default(), readiness);
        let handle = h.scheduler(Duration::from_secs(60)).start();

        tokio::time::sleep(Duration::from_secs(200)).await;
        handle.stop().await.unwrap();

        let calls = h.readiness.calls.lock().unwrap().clone();
        assert!(calls.len() >= 2);
        // 30s cycle + 60s sleep between consecutive cycle starts
        let gap = calls[1] - calls[0];
        assert!(gap >= Duration::from_secs(90), "gap was {gap:?}");
        assert!(gap < Duration::from_secs(91), "gap was {gap:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn start_returns_before_first_cycle_completes() {
        let readiness = FakeReadiness {
            delay: Duration::from_secs(30),
            ..Default::default()
        };
        let h = Harness::new(three_minipools(), RecordingExecutor::default(), readiness);
        let handle = h.scheduler(Duration::from_secs(60)).start();
        assert!(h.attempts().is_empty());
        handle.stop().await.unwrap();
        assert!(h.attempts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_interrupts_blocked_readiness_wait() {
        let readiness = FakeReadiness {
            block_forever: true,
            ..Default::default()
        };
        let h = Harness::new(three_minipools(), RecordingExecutor::default(), readiness);
        let handle = h.scheduler(Duration::from_secs(60)).start();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(h.readiness.calls(), 1);

        handle.stop().await.unwrap();
        assert!(h.attempts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn external_token_stops_the_loop() {
        let h = Harness::new(
            FakeLedger::default(),
            RecordingExecutor::default(),
            FakeReadiness::default(),
        );
        let shutdown = CancellationToken::new();
        let handle = h
            .scheduler(Duration::from_secs(60))
            .with_cancel_token(shutdown.child_token())
            .start();

        tokio::time::sleep(Duration::from_secs(10)).await;
        shutdown.cancel();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(handle.is_finished());
        assert_eq!(h.readiness.calls(), 1);
    }
}
