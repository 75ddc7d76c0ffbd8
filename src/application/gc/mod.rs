pub mod collectors;
pub mod config;
pub mod results;
pub mod scheduler;
pub mod worker;

pub use collectors::{GcError, RecordDeletionCoordinator};
pub use config::SweeperConfig;
pub use results::{SweepResult, SweepStatistics};
pub use scheduler::TaskScheduler;
pub use worker::OrphanSweeper;
