//! Per-key and batch migration results.

use serde::Serialize;

use super::backup::BackupSnapshot;

/// What happened to one key during a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationOutcome {
    /// A plaintext record was replaced by a verified encrypted record.
    Migrated,
    /// The record was already encrypted.
    AlreadyMigrated,
    /// No live record exists under the key.
    SkippedAbsent,
    /// The migration did not complete; the original record is unchanged.
    Failed,
}

/// Result of migrating one key.
#[derive(Debug)]
pub struct MigrationReport {
    pub key: String,
    pub namespace: String,
    pub outcome: MigrationOutcome,
    /// Set only when `outcome` is [`MigrationOutcome::Failed`].
    pub error: Option<crate::Error>,
}

impl MigrationReport {
    pub(crate) fn new(key: &str, namespace: &str, outcome: MigrationOutcome) -> Self {
        Self {
            key: key.to_string(),
            namespace: namespace.to_string(),
            outcome,
            error: None,
        }
    }

    pub(crate) fn failed(key: &str, namespace: &str, error: crate::Error) -> Self {
        Self {
            error: Some(error),
            ..Self::new(key, namespace, MigrationOutcome::Failed)
        }
    }

    pub fn is_failed(&self) -> bool {
        self.outcome == MigrationOutcome::Failed
    }
}

/// Result of migrating many keys.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// One report per requested key, in request order.
    pub reports: Vec<MigrationReport>,
    pub migrated_count: usize,
    pub failed_count: usize,
    /// Keys that were already encrypted or absent.
    pub skipped_count: usize,
    /// Snapshot taken before the batch, when one was requested.
    pub backup: Option<BackupSnapshot>,
}

impl BatchReport {
    pub(crate) fn push(&mut self, report: MigrationReport) {
        match report.outcome {
            MigrationOutcome::Migrated => self.migrated_count += 1,
            MigrationOutcome::Failed => self.failed_count += 1,
            MigrationOutcome::AlreadyMigrated | MigrationOutcome::SkippedAbsent => {
                self.skipped_count += 1
            }
        }
        self.reports.push(report);
    }

    /// Whether every key ended up encrypted or was legitimately skipped.
    pub fn is_success(&self) -> bool {
        self.failed_count == 0
    }

    /// Reports for keys that failed.
    pub fn failures(&self) -> impl Iterator<Item = &MigrationReport> {
        self.reports.iter().filter(|report| report.is_failed())
    }
}

/// What happened to one key during a rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackOutcome {
    /// An encrypted record was replaced by plaintext.
    RolledBack,
    /// The record was already plaintext.
    AlreadyRolledBack,
    /// No live record exists under the key.
    SkippedAbsent,
}

/// Result of rolling back one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackReport {
    pub key: String,
    pub namespace: String,
    pub outcome: RollbackOutcome,
}
