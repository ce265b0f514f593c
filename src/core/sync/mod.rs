pub mod cycle;
pub mod normalize;
pub mod scheduler;

pub use cycle::{CycleReport, FetchCycle};
pub use normalize::DateFallback;
pub use scheduler::{Scheduler, SchedulerHandle};
