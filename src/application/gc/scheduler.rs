use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Gate for work that runs less often than the loop driving it
pub struct TaskScheduler {
    interval: Duration,
    last_run: Mutex<Option<Instant>>,
}

impl TaskScheduler {
    /// The first `should_run` returns true
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_run: Mutex::new(None),
        }
    }

    /// Check whether the interval has elapsed, and mark a run if so
    pub fn should_run(&self) -> bool {
        let now = Instant::now();
        let mut last_run = self.last_run.lock().unwrap_or_else(PoisonError::into_inner);
        match *last_run {
            Some(at) if now.duration_since(at) < self.interval => false,
            _ => {
                *last_run = Some(now);
                true
            }
        }
    }

    /// Allow an immediate next run
    pub fn reset(&self) {
        *self.last_run.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn time_until_next_run(&self) -> Duration {
        let last_run = self.last_run.lock().unwrap_or_else(PoisonError::into_inner);
        match *last_run {
            Some(at) => self.interval.saturating_sub(at.elapsed()),
            None => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_task_scheduler_should_run() {
        let scheduler = TaskScheduler::new(Duration::from_millis(100));

        // Should run immediately on first check
        assert!(scheduler.should_run());
        assert!(!scheduler.should_run());
        assert!(scheduler.time_until_next_run() > Duration::ZERO);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(scheduler.should_run());
    }

    #[test]
    fn test_task_scheduler_reset() {
        let scheduler = TaskScheduler::new(Duration::from_secs(3600));
        assert!(scheduler.should_run());
        assert!(!scheduler.should_run());

        scheduler.reset();
        assert_eq!(scheduler.time_until_next_run(), Duration::ZERO);
        assert!(scheduler.should_run());
    }
}
