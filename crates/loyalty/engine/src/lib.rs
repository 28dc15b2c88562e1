//! # loyalty-engine
//!
//! The Loyalty Ledger Engine: the only component that writes customer
//! balances. It composes the earn policy, the transaction and redemption
//! ledgers, and the injected store/clock/code/audit collaborators into a
//! synchronous request/response API:
//!
//! - earn side: record, cancel (reversal), delete (cancelled only)
//! - spend side: create (hold), verify (hold becomes permanent), cancel
//!   (hold released)
//! - maintenance: balance reads, manual adjustments, reconciliation against
//!   ledger history, purge of dead records, reward catalog CRUD
//!
//! Per-customer locks with a bounded wait make concurrent operations on one
//! balance serializable; every operation commits its ledger row and balance
//! delta in a single atomic store batch.

#![deny(unsafe_code)]

mod engine;
mod locks;

pub use engine::{AdjustmentKind, LedgerEngine, PurgeReport, RewardSpec};
