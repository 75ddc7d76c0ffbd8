use std::sync::{Arc, Mutex, PoisonError};

use tokio::time;
use tracing::{debug, error, info};

use crate::application::gc::collectors::{
    Collector, GcResult, RecordDeletionCoordinator, RetiredRecordCollector, StrayObjectCollector,
};
use crate::application::gc::config::SweeperConfig;
use crate::application::gc::results::{SweepResult, SweepStatistics};
use crate::application::gc::scheduler::TaskScheduler;
use crate::application::locks::HashLocks;
use crate::application::ports::{ImageRecordRepository, StorageBackend};

const RETIRED_RECORD_COLLECTOR: &str = "retired_record_collector";
const STRAY_OBJECT_COLLECTOR: &str = "stray_object_collector";

/// Reconciles the record table with physical storage.
///
/// A pass runs the registered collectors in sequence:
/// - **Retired records**: zero-referenced records past the grace window are
///   deleted together with their objects
/// - **Stray objects** (optional, on a slower schedule): stored objects no
///   record points at are removed
///
/// # Single flight
///
/// Only one pass runs at a time. A pass requested while another is running
/// returns immediately with [`SweepResult::skipped`] set, so the periodic loop
/// and manual triggers can overlap safely.
///
/// ```rust,ignore
/// let sweeper = Arc::new(OrphanSweeper::new(repo, storage, HashLocks::new(), config));
///
/// let result = sweeper.sweep_once().await?;
/// println!("{}", result.summary());
///
/// // Or run continuously
/// tokio::spawn(Arc::clone(&sweeper).run());
/// ```
pub struct OrphanSweeper {
    collectors: Vec<Box<dyn Collector>>,
    config: SweeperConfig,
    stray_sweep_scheduler: Option<TaskScheduler>,
    in_flight: tokio::sync::Mutex<()>,
    statistics: Mutex<SweepStatistics>,
}

impl OrphanSweeper {
    pub fn new(
        repo: Arc<dyn ImageRecordRepository>,
        storage: Arc<dyn StorageBackend>,
        locks: HashLocks,
        config: SweeperConfig,
    ) -> Self {
        let coordinator =
            RecordDeletionCoordinator::new(Arc::clone(&repo), Arc::clone(&storage), locks);
        Self::with_coordinator(repo, storage, coordinator, config)
    }

    /// Share an existing coordinator, and with it the per-hash locks
    pub fn with_coordinator(
        repo: Arc<dyn ImageRecordRepository>,
        storage: Arc<dyn StorageBackend>,
        coordinator: RecordDeletionCoordinator,
        config: SweeperConfig,
    ) -> Self {
        let mut collectors: Vec<Box<dyn Collector>> = vec![Box::new(RetiredRecordCollector::new(
            Arc::clone(&repo),
            coordinator,
            config.batch_size,
            config.grace_period,
        ))];

        let stray_sweep_scheduler = if config.stray_sweep_enabled {
            collectors.push(Box::new(StrayObjectCollector::new(
                repo,
                storage,
                config.stray_object_min_age,
            )));
            Some(TaskScheduler::new(config.stray_sweep_interval()))
        } else {
            None
        };

        Self {
            collectors,
            config,
            stray_sweep_scheduler,
            in_flight: tokio::sync::Mutex::new(()),
            statistics: Mutex::new(SweepStatistics::default()),
        }
    }

    pub fn config(&self) -> &SweeperConfig {
        &self.config
    }

    /// Totals since this sweeper was created
    pub fn statistics(&self) -> SweepStatistics {
        self.statistics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run the periodic sweep loop. Never returns.
    pub async fn run(self: Arc<Self>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            grace_secs = self.config.grace_period.as_secs(),
            stray_sweep = self.config.stray_sweep_enabled,
            "Starting orphan sweeper"
        );

        let mut interval = time::interval(self.config.interval);

        loop {
            interval.tick().await;

            match self.sweep_once().await {
                Ok(result) => {
                    if result.has_deletions() {
                        info!(
                            total = result.total_deleted,
                            retired_records = result.retired_records_deleted,
                            stray_objects = result.stray_objects_deleted,
                            "Orphan sweep completed"
                        );
                    }

                    for error in &result.errors {
                        error!("Sweep error: {}", error);
                    }
                }
                Err(e) => {
                    error!("Orphan sweep failed: {}", e);
                }
            }
        }
    }

    /// Run one complete pass over all registered collectors.
    ///
    /// A failing collector does not stop the others; its error is recorded in
    /// the result.
    pub async fn sweep_once(&self) -> GcResult<SweepResult> {
        let Ok(_flight) = self.in_flight.try_lock() else {
            debug!("Sweep already in progress, skipping");
            let result = SweepResult::skipped();
            self.record(&result);
            return Ok(result);
        };

        let mut result = SweepResult::new();

        for collector in &self.collectors {
            let name = collector.name();

            if name == STRAY_OBJECT_COLLECTOR && !self.should_run_stray_sweep() {
                continue;
            }

            match collector.collect().await {
                Ok(collected) => {
                    match name {
                        RETIRED_RECORD_COLLECTOR => {
                            result.retired_records_deleted += collected.items_cleaned;
                            result.missing_objects += collected.items_missing;
                        }
                        STRAY_OBJECT_COLLECTOR => {
                            result.stray_objects_deleted += collected.items_cleaned;
                        }
                        _ => {}
                    }
                    result.errors.extend(collected.errors);
                }
                Err(e) => {
                    result.add_error(format!("{} collection failed: {}", name, e));
                }
            }
        }

        result.total_deleted = result.retired_records_deleted + result.stray_objects_deleted;
        self.record(&result);
        Ok(result)
    }

    fn should_run_stray_sweep(&self) -> bool {
        self.stray_sweep_scheduler
            .as_ref()
            .is_some_and(TaskScheduler::should_run)
    }

    fn record(&self, result: &SweepResult) {
        self.statistics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .update(result);
    }
}
