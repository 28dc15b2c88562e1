//! # loyalty-types
//!
//! Data model and error taxonomy for the loyalty ledger:
//!
//! - identifier newtypes for customers, restaurants, rewards, and ledger rows
//! - earn/spend records with their lifecycle status enums
//! - the per-restaurant loyalty configuration (mode, ratios, daily limits)
//! - the shared [`LoyaltyError`] taxonomy
//!
//! Monetary amounts are minor currency units (`i64`), so ratio boundaries are
//! exact and no floating point enters the ledger.

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod ids;
pub mod model;

pub use config::{LoyaltyConfig, LoyaltyMode};
pub use error::{LoyaltyError, LoyaltyResult};
pub use ids::{
    CustomerId, RedemptionCode, RedemptionId, RestaurantId, RewardId, StaffId, TransactionId,
};
pub use model::{
    Adjustment, CustomerBalance, Redemption, RedemptionStatus, Reward, Transaction,
    TransactionStatus,
};
