use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::LoyaltyMode;
use crate::ids::{
    CustomerId, RedemptionCode, RedemptionId, RestaurantId, RewardId, StaffId, TransactionId,
};

/// The spendable balance for one customer at one restaurant.
///
/// Written only by the ledger engine, atomically with the ledger record that
/// justifies the change. Invariant: `points` equals the sum of active
/// transactions' `points_earned`, minus pending and verified redemptions'
/// `points_used`, plus manual adjustments, and never goes negative.
/// Analogous for `stamps`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerBalance {
    pub customer_id: CustomerId,
    pub restaurant_id: RestaurantId,
    pub points: i64,
    pub stamps: i64,
    pub updated_at: DateTime<Utc>,
}

impl CustomerBalance {
    /// The zero balance for a customer with no ledger history.
    pub fn zero(customer_id: CustomerId, restaurant_id: RestaurantId, at: DateTime<Utc>) -> Self {
        Self {
            customer_id,
            restaurant_id,
            points: 0,
            stamps: 0,
            updated_at: at,
        }
    }

    /// The balance in the given mode's unit.
    pub fn units(&self, mode: LoyaltyMode) -> i64 {
        match mode {
            LoyaltyMode::Points => self.points,
            LoyaltyMode::Stamps => self.stamps,
        }
    }
}

/// Lifecycle of an earn event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Counted in the balance.
    Active,
    /// Reversed; its contribution has been debited back out.
    Cancelled,
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Active => write!(f, "active"),
            TransactionStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// An earn event: a purchase converted to loyalty units.
///
/// Immutable once created, except for `status`. At most one of
/// `points_earned`/`stamps_earned` is nonzero; both are zero when the amount
/// fell below one ratio unit, which is still a valid, recorded transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub restaurant_id: RestaurantId,
    pub customer_id: CustomerId,
    /// Purchase amount in minor currency units, always positive.
    pub amount_minor: i64,
    pub points_earned: i64,
    pub stamps_earned: i64,
    pub transaction_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub status: TransactionStatus,
}

impl Transaction {
    /// This transaction's contribution to the balance as (points, stamps).
    pub fn contribution(&self) -> (i64, i64) {
        (self.points_earned, self.stamps_earned)
    }
}

/// Lifecycle of a spend event.
///
/// `Pending` holds the debited units until staff either honor the redemption
/// (`Verified`) or release the hold (`Cancelled`). Both outcomes are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedemptionStatus {
    Pending,
    Verified,
    Cancelled,
}

impl RedemptionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RedemptionStatus::Pending)
    }
}

impl std::fmt::Display for RedemptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RedemptionStatus::Pending => write!(f, "pending"),
            RedemptionStatus::Verified => write!(f, "verified"),
            RedemptionStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A spend event: loyalty units exchanged for a reward.
///
/// `reward_title` and the unit cost are snapshotted at creation so later
/// catalog edits never rewrite history. The balance is debited when the
/// record is created (the hold), not at verification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redemption {
    pub id: RedemptionId,
    pub restaurant_id: RestaurantId,
    pub customer_id: CustomerId,
    pub reward_id: RewardId,
    pub reward_title: String,
    pub points_used: i64,
    pub stamps_used: i64,
    pub redemption_code: RedemptionCode,
    pub status: RedemptionStatus,
    pub verified_at: Option<DateTime<Utc>>,
    pub verified_by: Option<StaffId>,
    pub created_at: DateTime<Utc>,
}

impl Redemption {
    /// Units held by this redemption as (points, stamps).
    pub fn held(&self) -> (i64, i64) {
        (self.points_used, self.stamps_used)
    }
}

/// A reward catalog entry. Not a ledger record: it has its own admin CRUD
/// lifecycle, and redemptions snapshot its title and cost at creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    pub id: RewardId,
    pub restaurant_id: RestaurantId,
    pub title: String,
    pub description: Option<String>,
    /// Set in points mode, `None` otherwise.
    pub required_points: Option<i64>,
    /// Set in stamp mode, `None` otherwise.
    pub required_stamps: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reward {
    /// The unit cost of this reward in the given mode, if configured.
    pub fn required_units(&self, mode: LoyaltyMode) -> Option<i64> {
        match mode {
            LoyaltyMode::Points => self.required_points,
            LoyaltyMode::Stamps => self.required_stamps,
        }
    }
}

/// A manual balance adjustment made by an administrator.
///
/// First-class ledger records so reconciliation still balances: the stored
/// balance must equal earns minus spends plus the sum of these deltas.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjustment {
    pub id: uuid::Uuid,
    pub restaurant_id: RestaurantId,
    pub customer_id: CustomerId,
    /// Signed delta actually applied to the points balance.
    pub delta_points: i64,
    /// Signed delta actually applied to the stamps balance.
    pub delta_stamps: i64,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_transaction() -> Transaction {
        Transaction {
            id: TransactionId::generate(),
            restaurant_id: RestaurantId::generate(),
            customer_id: CustomerId::generate(),
            amount_minor: 25_000,
            points_earned: 2,
            stamps_earned: 0,
            transaction_date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            created_at: Utc::now(),
            status: TransactionStatus::Active,
        }
    }

    #[test]
    fn transaction_serde_round_trip() {
        let tx = sample_transaction();
        let json = serde_json::to_string(&tx).unwrap();
        let restored: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(tx, restored);
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&TransactionStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
        assert_eq!(
            serde_json::to_string(&RedemptionStatus::Pending).unwrap(),
            "\"pending\""
        );
    }

    #[test]
    fn redemption_terminal_states() {
        assert!(!RedemptionStatus::Pending.is_terminal());
        assert!(RedemptionStatus::Verified.is_terminal());
        assert!(RedemptionStatus::Cancelled.is_terminal());
    }

    #[test]
    fn balance_units_follow_mode() {
        let mut balance = CustomerBalance::zero(
            CustomerId::generate(),
            RestaurantId::generate(),
            Utc::now(),
        );
        balance.points = 7;
        balance.stamps = 3;
        assert_eq!(balance.units(LoyaltyMode::Points), 7);
        assert_eq!(balance.units(LoyaltyMode::Stamps), 3);
    }

    #[test]
    fn reward_required_units_follow_mode() {
        let reward = Reward {
            id: RewardId::generate(),
            restaurant_id: RestaurantId::generate(),
            title: "Free coffee".into(),
            description: None,
            required_points: Some(10),
            required_stamps: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(reward.required_units(LoyaltyMode::Points), Some(10));
        assert_eq!(reward.required_units(LoyaltyMode::Stamps), None);
    }
}
