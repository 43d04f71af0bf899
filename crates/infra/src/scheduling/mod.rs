//! Background loops driving the pipeline
//!
//! Both loops follow the same lifecycle: explicit `start`/`stop`, a
//! cancellation token, a tracked join handle and a bounded join on stop.

pub mod connectivity_probe;
pub mod error;
pub mod flush_scheduler;

pub use connectivity_probe::ConnectivityProbe;
pub use error::{SchedulerError, SchedulerResult, Worker};
pub use flush_scheduler::FlushScheduler;
