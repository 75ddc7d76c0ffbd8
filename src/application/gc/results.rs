//! Result types for sweep passes

use serde::Serialize;

/// Outcome of one sweep pass
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SweepResult {
    /// Records plus stray objects removed.
    ///
    /// Calculated as the sum of the specific deletion counts.
    pub total_deleted: usize,
    /// Retired records removed along with their objects
    pub retired_records_deleted: usize,
    /// Stored objects no record pointed at
    pub stray_objects_deleted: usize,
    /// Retired records whose object was already gone
    pub missing_objects: usize,
    /// Per-item failures; the pass continues past them
    pub errors: Vec<String>,
    /// Another sweep was running, nothing was done
    pub skipped: bool,
}

impl SweepResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }

    /// True when the pass ran without any errors, regardless of deletions
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_deletions(&self) -> bool {
        self.total_deleted > 0
    }

    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    pub fn summary(&self) -> String {
        if self.skipped {
            return "Sweep skipped: another sweep is in progress".to_string();
        }
        let counts = format!(
            "{} total deleted ({} retired records, {} stray objects, {} already missing)",
            self.total_deleted,
            self.retired_records_deleted,
            self.stray_objects_deleted,
            self.missing_objects
        );
        if self.errors.is_empty() {
            format!("Sweep completed successfully: {}", counts)
        } else {
            format!("Sweep completed with {} errors: {}", self.errors.len(), counts)
        }
    }
}

/// Running totals across sweeps of one sweeper
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepStatistics {
    pub sweeps_completed: usize,
    pub sweeps_skipped: usize,
    pub total_records_deleted: usize,
    pub total_stray_objects_deleted: usize,
    pub total_errors: usize,
}

impl SweepStatistics {
    pub fn update(&mut self, result: &SweepResult) {
        if result.skipped {
            self.sweeps_skipped += 1;
            return;
        }
        self.sweeps_completed += 1;
        self.total_records_deleted += result.retired_records_deleted;
        self.total_stray_objects_deleted += result.stray_objects_deleted;
        self.total_errors += result.errors.len();
    }
}
