//! Frame Scheduler
//!
//! Decouples the physical capture rate from the processing rate. The loop
//! wakes on every display refresh, presents the newest frame, and only runs
//! the (expensive) extraction path once per tick budget.

mod scheduler;

pub use scheduler::{FrameScheduler, FrameSink, SchedulerConfig, SchedulerHandle, SchedulerStats, TickGate};
