//! 应用层：分片投递循环与过期清理

pub mod sweeper;
pub mod worker;

pub use sweeper::{ExpirySweeper, SWEEP_BATCH, SweepOutcome};
pub use worker::{CycleOutcome, PartitionWorker};
