//! Anomaly records and the job report.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Kind of finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyType {
    /// Approved request marked deducted with no usage in the ledger.
    MissingLedgerEntry,
    /// Usage whose request is not approved.
    OrphanLedgerEntry,
    /// Wallet counters disagree with the ledger.
    WalletLedgerDrift,
    /// Remaining amounts disagree with the bucket balance.
    BucketRemainingDrift,
}

impl AnomalyType {
    /// Wire code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingLedgerEntry => "MISSING_LEDGER_ENTRY",
            Self::OrphanLedgerEntry => "ORPHAN_LEDGER_ENTRY",
            Self::WalletLedgerDrift => "WALLET_LEDGER_DRIFT",
            Self::BucketRemainingDrift => "BUCKET_REMAINING_DRIFT",
        }
    }

    /// Severity assigned to this kind of finding.
    #[must_use]
    pub const fn severity(self) -> Severity {
        match self {
            Self::MissingLedgerEntry | Self::WalletLedgerDrift => Severity::High,
            Self::OrphanLedgerEntry => Severity::Medium,
            Self::BucketRemainingDrift => Severity::Low,
        }
    }
}

impl std::fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Informational.
    Low,
    /// Needs review.
    Medium,
    /// Balances are wrong.
    High,
}

impl Severity {
    /// Wire code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an anomaly points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// A workflow leave request.
    LeaveRequest,
    /// A ledger line.
    LedgerEntry,
    /// A wallet.
    Wallet,
}

/// A reported finding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    /// Kind.
    #[serde(rename = "type")]
    pub anomaly_type: AnomalyType,
    /// Severity.
    pub severity: Severity,
    /// Kind of entity.
    pub entity_type: EntityType,
    /// Entity id.
    pub entity_id: String,
    /// Check-specific context.
    pub details: serde_json::Value,
    /// Detection time.
    pub detected_at: DateTime<Utc>,
}

impl Anomaly {
    /// Builds an anomaly with the default severity of its type.
    #[must_use]
    pub fn new(
        anomaly_type: AnomalyType,
        entity_type: EntityType,
        entity_id: impl Into<String>,
        details: serde_json::Value,
        detected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            anomaly_type,
            severity: anomaly_type.severity(),
            entity_type,
            entity_id: entity_id.into(),
            details,
            detected_at,
        }
    }
}

/// Outcome of one reconciliation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconciliationReport {
    /// Findings, in detection order.
    pub anomalies: Vec<Anomaly>,
    /// Wallets replayed.
    pub wallets_checked: usize,
    /// Workflow requests inspected.
    pub requests_checked: usize,
    /// Anomalies repaired.
    pub fixed: usize,
    /// Repairs that failed.
    pub fix_failures: usize,
}

impl ReconciliationReport {
    /// Anomaly count per type.
    #[must_use]
    pub fn counts(&self) -> BTreeMap<AnomalyType, usize> {
        let mut counts = BTreeMap::new();
        for anomaly in &self.anomalies {
            *counts.entry(anomaly.anomaly_type).or_insert(0) += 1;
        }
        counts
    }

    /// Anomalies of one type.
    pub fn of_type(&self, anomaly_type: AnomalyType) -> impl Iterator<Item = &Anomaly> {
        self.anomalies
            .iter()
            .filter(move |a| a.anomaly_type == anomaly_type)
    }

    /// True when any finding is HIGH.
    #[must_use]
    pub fn has_high_severity(&self) -> bool {
        self.anomalies.iter().any(|a| a.severity == Severity::High)
    }

    /// Appends findings.
    pub fn extend(&mut self, anomalies: impl IntoIterator<Item = Anomaly>) {
        self.anomalies.extend(anomalies);
    }
}
