//! `smartnode-core`: minipool lifecycle automation for a single node
//! operator.
//!
//! ```text
//! Scheduler (one background task, fixed sleep between cycles)
//!     │
//!     ├── ReadinessGate    ← registered + synced?
//!     ├── aggregator       ← discover owned minipools, fan out status queries
//!     │       └── LedgerGateway (ApiClient: docker exec / ssh)
//!     └── ActionExecutor   ← one minipool at a time
//! ```

pub mod aggregator;
pub mod api;
pub mod config;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod paths;
pub mod scheduler;
pub mod types;

pub use error::{NodeError, Result};
pub use gateway::{ActionExecutor, LedgerGateway, ReadinessGate};
pub use scheduler::{CycleOutcome, Scheduler, SchedulerConfig, SchedulerHandle};
pub use types::{Address, Minipool, MinipoolStatus};

pub use tokio_util::sync::CancellationToken;
