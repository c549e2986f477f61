//! Aggregate counters kept by the handler.

use super::result::RecoveryStage;
use crate::taxonomy::{ErrorSeverity, Failure, FailureKind};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshot of handler metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorMetrics {
    pub total_handled: u64,
    pub by_kind: BTreeMap<FailureKind, u64>,
    pub by_severity: BTreeMap<ErrorSeverity, u64>,
    pub by_code: BTreeMap<String, u64>,
    pub last_handled_at: Option<DateTime<Utc>>,
    /// Recoveries per stage.
    pub recovered: BTreeMap<RecoveryStage, u64>,
    pub unrecovered: u64,
    /// Operation attempts made by the retry stage.
    pub retry_attempts: u64,
    pub fallbacks_used: u64,
    /// Recovery, reporter and fallback errors that were swallowed.
    pub handler_warnings: u64,
}

impl ErrorMetrics {
    pub(crate) fn record_handled(&mut self, failure: &Failure) {
        self.total_handled += 1;
        *self.by_kind.entry(failure.kind()).or_insert(0) += 1;
        *self.by_severity.entry(failure.severity()).or_insert(0) += 1;
        *self.by_code.entry(failure.code().to_string()).or_insert(0) += 1;
        self.last_handled_at = Some(Utc::now());
    }

    pub(crate) fn record_recovered(&mut self, stage: RecoveryStage) {
        *self.recovered.entry(stage).or_insert(0) += 1;
        if stage == RecoveryStage::Fallback {
            self.fallbacks_used += 1;
        }
    }

    pub fn total_recovered(&self) -> u64 {
        self.recovered.values().sum()
    }

    pub fn count_for_kind(&self, kind: FailureKind) -> u64 {
        self.by_kind.get(&kind).copied().unwrap_or(0)
    }

    pub fn count_for_code(&self, code: &str) -> u64 {
        self.by_code.get(code).copied().unwrap_or(0)
    }
}
