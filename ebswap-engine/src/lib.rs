pub mod audit;
pub mod coordinator;
pub mod locator;
pub mod waiter;
pub mod worker;

pub use audit::{AFTER_TABLE_KEY, AuditRecorder, BEFORE_TABLE_KEY};
pub use coordinator::{RunOutcome, SwapCoordinator};
pub use locator::{VolumeFilter, VolumeLocator};
pub use waiter::{Poll, wait_until};
pub use worker::{SwapFailure, SwapOutcome, SwapReport, VolumeSwapWorker};
