//! # loyalty-audit
//!
//! Structured audit events emitted after every successful ledger mutation:
//! who did what, to which record, with before/after snapshots. Delivery and
//! storage belong to an external collaborator behind [`AuditSink`]; the
//! in-memory sink backs tests and the tracing sink feeds structured logs.

#![deny(unsafe_code)]

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What kind of mutation an audit event records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    TransactionRecorded,
    TransactionCancelled,
    TransactionDeleted,
    RedemptionCreated,
    RedemptionVerified,
    RedemptionCancelled,
    BalanceAdjusted,
    HistoryPurged,
    RewardCreated,
    RewardUpdated,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ActionType::TransactionRecorded => "transaction_recorded",
            ActionType::TransactionCancelled => "transaction_cancelled",
            ActionType::TransactionDeleted => "transaction_deleted",
            ActionType::RedemptionCreated => "redemption_created",
            ActionType::RedemptionVerified => "redemption_verified",
            ActionType::RedemptionCancelled => "redemption_cancelled",
            ActionType::BalanceAdjusted => "balance_adjusted",
            ActionType::HistoryPurged => "history_purged",
            ActionType::RewardCreated => "reward_created",
            ActionType::RewardUpdated => "reward_updated",
        };
        write!(f, "{}", name)
    }
}

/// One audit event. `before`/`after` are JSON snapshots of the mutated
/// record; `before` is `Null` for creations and `after` for deletions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditEvent {
    pub action_type: ActionType,
    /// Record family, e.g. "transaction", "redemption", "balance".
    pub target_type: String,
    /// Identifier of the mutated record.
    pub target_id: String,
    pub before: Value,
    pub after: Value,
    pub recorded_at: DateTime<Utc>,
}

/// Where successful mutations report themselves. Implementations must not
/// fail the mutation: the ledger commit has already happened by the time an
/// event is recorded.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Collects events in memory. Test support and small deployments.
#[derive(Default)]
pub struct MemoryAuditSink {
    events: RwLock<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events, oldest first.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.read().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.events.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        if let Ok(mut events) = self.events.write() {
            events.push(event);
        }
    }
}

/// Emits each event as a structured tracing log line.
#[derive(Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        tracing::info!(
            action = %event.action_type,
            target_type = %event.target_type,
            target_id = %event.target_id,
            before = %event.before,
            after = %event.after,
            "audit event"
        );
    }
}
