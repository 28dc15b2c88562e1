use chrono::NaiveDate;

use loyalty_types::{
    Adjustment, CustomerBalance, CustomerId, Redemption, RedemptionCode, RedemptionId, Reward,
    RewardId, Transaction, TransactionId,
};
use loyalty_types::LoyaltyResult;

/// One write inside an atomic batch.
#[derive(Clone, Debug)]
pub enum WriteOp {
    PutBalance(CustomerBalance),
    PutTransaction(Transaction),
    DeleteTransaction(TransactionId),
    PutRedemption(Redemption),
    DeleteRedemption(RedemptionId),
    PutAdjustment(Adjustment),
    PutReward(Reward),
}

/// A set of writes that must commit together or not at all.
///
/// The engine builds one batch per operation (the ledger row plus the balance
/// delta it justifies) so the store can never observe one without the other.
#[derive(Clone, Debug, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: WriteOp) -> &mut Self {
        self.ops.push(op);
        self
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }
}

/// Persistence contract injected into the ledger engine.
///
/// Synchronous request/response, like the engine itself. Reads return
/// committed state; all writes go through [`LedgerStore::apply`], which is
/// atomic over the whole batch.
pub trait LedgerStore: Send + Sync {
    /// Committed balance, if the customer has any ledger history.
    fn balance(&self, customer_id: &CustomerId) -> LoyaltyResult<Option<CustomerBalance>>;

    fn transaction(&self, id: &TransactionId) -> LoyaltyResult<Option<Transaction>>;

    fn redemption(&self, id: &RedemptionId) -> LoyaltyResult<Option<Redemption>>;

    /// Staff-facing lookup by redemption code.
    fn redemption_by_code(&self, code: &RedemptionCode) -> LoyaltyResult<Option<Redemption>>;

    fn reward(&self, id: &RewardId) -> LoyaltyResult<Option<Reward>>;

    /// All catalog entries, active and inactive.
    fn list_rewards(&self) -> LoyaltyResult<Vec<Reward>>;

    /// Full earn history for a customer, any status.
    fn transactions_for(&self, customer_id: &CustomerId) -> LoyaltyResult<Vec<Transaction>>;

    /// Full spend history for a customer, any status.
    fn redemptions_for(&self, customer_id: &CustomerId) -> LoyaltyResult<Vec<Redemption>>;

    /// Full manual-adjustment history for a customer.
    fn adjustments_for(&self, customer_id: &CustomerId) -> LoyaltyResult<Vec<Adjustment>>;

    /// Count of the customer's transactions dated `date`, in any status.
    /// The daily stamp cap reads this count, so a cancelled earn still
    /// blocks the day.
    fn transactions_on(&self, customer_id: &CustomerId, date: NaiveDate) -> LoyaltyResult<usize>;

    /// Count of the customer's redemptions created on `date`, in any status.
    fn redemptions_created_on(
        &self,
        customer_id: &CustomerId,
        date: NaiveDate,
    ) -> LoyaltyResult<usize>;

    /// Whether a redemption code is already taken.
    fn code_in_use(&self, code: &RedemptionCode) -> LoyaltyResult<bool>;

    /// Cancelled transactions dated before `cutoff`. These carry no balance
    /// contribution and are safe to purge.
    fn cancelled_transactions_before(
        &self,
        cutoff: NaiveDate,
    ) -> LoyaltyResult<Vec<TransactionId>>;

    /// Cancelled redemptions created before `cutoff`.
    fn cancelled_redemptions_before(
        &self,
        cutoff: NaiveDate,
    ) -> LoyaltyResult<Vec<RedemptionId>>;

    /// Commit a batch atomically: every op applies, or none do.
    fn apply(&self, batch: WriteBatch) -> LoyaltyResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use loyalty_types::RestaurantId;

    #[test]
    fn batch_accumulates_ops_in_order() {
        let balance = CustomerBalance::zero(
            CustomerId::generate(),
            RestaurantId::generate(),
            Utc::now(),
        );
        let mut batch = WriteBatch::new();
        assert!(batch.is_empty());

        batch.push(WriteOp::PutBalance(balance));
        batch.push(WriteOp::DeleteTransaction(TransactionId::generate()));

        assert_eq!(batch.len(), 2);
        assert!(matches!(batch.ops()[0], WriteOp::PutBalance(_)));
        assert!(matches!(batch.ops()[1], WriteOp::DeleteTransaction(_)));
    }
}
