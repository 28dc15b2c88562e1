//! In-memory reference implementation of the ledger store.
//!
//! Deterministic and test-friendly. Production deployments would put a
//! transactional backend behind [`LedgerStore`]; the contract is the same.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::NaiveDate;

use loyalty_types::{
    Adjustment, CustomerBalance, CustomerId, LoyaltyError, LoyaltyResult, Redemption,
    RedemptionCode, RedemptionId, RedemptionStatus, Reward, RewardId, Transaction, TransactionId,
    TransactionStatus,
};

use crate::traits::{LedgerStore, WriteBatch, WriteOp};

/// All ledger tables behind one lock, so a batch commit is a single
/// write-locked swap and reads see a consistent snapshot.
#[derive(Clone, Default)]
struct LedgerState {
    balances: HashMap<CustomerId, CustomerBalance>,
    transactions: HashMap<TransactionId, Transaction>,
    redemptions: HashMap<RedemptionId, Redemption>,
    codes: HashMap<RedemptionCode, RedemptionId>,
    adjustments: Vec<Adjustment>,
    rewards: HashMap<RewardId, Reward>,
}

/// In-memory ledger store.
#[derive(Default)]
pub struct MemoryLedgerStore {
    state: RwLock<LedgerState>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> LoyaltyResult<std::sync::RwLockReadGuard<'_, LedgerState>> {
        self.state
            .read()
            .map_err(|_| LoyaltyError::Storage("ledger state lock poisoned".into()))
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn balance(&self, customer_id: &CustomerId) -> LoyaltyResult<Option<CustomerBalance>> {
        Ok(self.read()?.balances.get(customer_id).cloned())
    }

    fn transaction(&self, id: &TransactionId) -> LoyaltyResult<Option<Transaction>> {
        Ok(self.read()?.transactions.get(id).cloned())
    }

    fn redemption(&self, id: &RedemptionId) -> LoyaltyResult<Option<Redemption>> {
        Ok(self.read()?.redemptions.get(id).cloned())
    }

    fn redemption_by_code(&self, code: &RedemptionCode) -> LoyaltyResult<Option<Redemption>> {
        let state = self.read()?;
        Ok(state
            .codes
            .get(code)
            .and_then(|id| state.redemptions.get(id))
            .cloned())
    }

    fn reward(&self, id: &RewardId) -> LoyaltyResult<Option<Reward>> {
        Ok(self.read()?.rewards.get(id).cloned())
    }

    fn list_rewards(&self) -> LoyaltyResult<Vec<Reward>> {
        let mut rewards: Vec<Reward> = self.read()?.rewards.values().cloned().collect();
        rewards.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(rewards)
    }

    fn transactions_for(&self, customer_id: &CustomerId) -> LoyaltyResult<Vec<Transaction>> {
        let mut rows: Vec<Transaction> = self
            .read()?
            .transactions
            .values()
            .filter(|t| t.customer_id == *customer_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(rows)
    }

    fn redemptions_for(&self, customer_id: &CustomerId) -> LoyaltyResult<Vec<Redemption>> {
        let mut rows: Vec<Redemption> = self
            .read()?
            .redemptions
            .values()
            .filter(|r| r.customer_id == *customer_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(rows)
    }

    fn adjustments_for(&self, customer_id: &CustomerId) -> LoyaltyResult<Vec<Adjustment>> {
        Ok(self
            .read()?
            .adjustments
            .iter()
            .filter(|a| a.customer_id == *customer_id)
            .cloned()
            .collect())
    }

    fn transactions_on(&self, customer_id: &CustomerId, date: NaiveDate) -> LoyaltyResult<usize> {
        Ok(self
            .read()?
            .transactions
            .values()
            .filter(|t| t.customer_id == *customer_id && t.transaction_date == date)
            .count())
    }

    fn redemptions_created_on(
        &self,
        customer_id: &CustomerId,
        date: NaiveDate,
    ) -> LoyaltyResult<usize> {
        Ok(self
            .read()?
            .redemptions
            .values()
            .filter(|r| r.customer_id == *customer_id && r.created_at.date_naive() == date)
            .count())
    }

    fn code_in_use(&self, code: &RedemptionCode) -> LoyaltyResult<bool> {
        Ok(self.read()?.codes.contains_key(code))
    }

    fn cancelled_transactions_before(
        &self,
        cutoff: NaiveDate,
    ) -> LoyaltyResult<Vec<TransactionId>> {
        Ok(self
            .read()?
            .transactions
            .values()
            .filter(|t| t.status == TransactionStatus::Cancelled && t.transaction_date < cutoff)
            .map(|t| t.id)
            .collect())
    }

    fn cancelled_redemptions_before(
        &self,
        cutoff: NaiveDate,
    ) -> LoyaltyResult<Vec<RedemptionId>> {
        Ok(self
            .read()?
            .redemptions
            .values()
            .filter(|r| {
                r.status == RedemptionStatus::Cancelled && r.created_at.date_naive() < cutoff
            })
            .map(|r| r.id)
            .collect())
    }

    fn apply(&self, batch: WriteBatch) -> LoyaltyResult<()> {
        let mut guard = self
            .state
            .write()
            .map_err(|_| LoyaltyError::Storage("ledger state lock poisoned".into()))?;

        // Stage against a copy so a mid-batch failure leaves nothing applied.
        let mut next = guard.clone();
        for op in batch.ops() {
            match op {
                WriteOp::PutBalance(balance) => {
                    next.balances
                        .insert(balance.customer_id, balance.clone());
                }
                WriteOp::PutTransaction(tx) => {
                    next.transactions.insert(tx.id, tx.clone());
                }
                WriteOp::DeleteTransaction(id) => {
                    if next.transactions.remove(id).is_none() {
                        return Err(LoyaltyError::NotFound {
                            kind: "transaction",
                            id: id.to_string(),
                        });
                    }
                }
                WriteOp::PutRedemption(redemption) => {
                    if let Some(owner) = next.codes.get(&redemption.redemption_code) {
                        if *owner != redemption.id {
                            return Err(LoyaltyError::ConsistencyViolation {
                                message: format!(
                                    "redemption code {} already taken by {}",
                                    redemption.redemption_code, owner
                                ),
                            });
                        }
                    }
                    next.codes
                        .insert(redemption.redemption_code.clone(), redemption.id);
                    next.redemptions.insert(redemption.id, redemption.clone());
                }
                WriteOp::DeleteRedemption(id) => {
                    match next.redemptions.remove(id) {
                        Some(removed) => {
                            next.codes.remove(&removed.redemption_code);
                        }
                        None => {
                            return Err(LoyaltyError::NotFound {
                                kind: "redemption",
                                id: id.to_string(),
                            });
                        }
                    }
                }
                WriteOp::PutAdjustment(adjustment) => {
                    next.adjustments.push(adjustment.clone());
                }
                WriteOp::PutReward(reward) => {
                    next.rewards.insert(reward.id, reward.clone());
                }
            }
        }

        *guard = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use loyalty_types::{RestaurantId, RedemptionStatus, TransactionStatus};

    fn tx(customer_id: CustomerId, date: NaiveDate) -> Transaction {
        Transaction {
            id: TransactionId::generate(),
            restaurant_id: RestaurantId::generate(),
            customer_id,
            amount_minor: 10_000,
            points_earned: 1,
            stamps_earned: 0,
            transaction_date: date,
            created_at: Utc::now(),
            status: TransactionStatus::Active,
        }
    }

    fn redemption(customer_id: CustomerId, code: &str) -> Redemption {
        Redemption {
            id: RedemptionId::generate(),
            restaurant_id: RestaurantId::generate(),
            customer_id,
            reward_id: RewardId::generate(),
            reward_title: "Free coffee".into(),
            points_used: 2,
            stamps_used: 0,
            redemption_code: RedemptionCode::new(code),
            status: RedemptionStatus::Pending,
            verified_at: None,
            verified_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn balance_defaults_to_absent() {
        let store = MemoryLedgerStore::new();
        assert!(store.balance(&CustomerId::generate()).unwrap().is_none());
    }

    #[test]
    fn batch_puts_are_visible_after_apply() {
        let store = MemoryLedgerStore::new();
        let customer = CustomerId::generate();
        let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let tx = tx(customer, date);

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::PutTransaction(tx.clone()));
        store.apply(batch).unwrap();

        assert_eq!(store.transaction(&tx.id).unwrap().unwrap(), tx);
        assert_eq!(store.transactions_on(&customer, date).unwrap(), 1);
    }

    #[test]
    fn failed_batch_applies_nothing() {
        let store = MemoryLedgerStore::new();
        let customer = CustomerId::generate();
        let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let tx = tx(customer, date);

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::PutTransaction(tx.clone()));
        // Deleting a transaction that does not exist fails the whole batch.
        batch.push(WriteOp::DeleteTransaction(TransactionId::generate()));

        assert!(store.apply(batch).is_err());
        assert!(store.transaction(&tx.id).unwrap().is_none());
    }

    #[test]
    fn code_index_follows_redemptions() {
        let store = MemoryLedgerStore::new();
        let customer = CustomerId::generate();
        let redemption = redemption(customer, "CODE-1");
        let code = redemption.redemption_code.clone();

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::PutRedemption(redemption.clone()));
        store.apply(batch).unwrap();

        assert!(store.code_in_use(&code).unwrap());
        assert_eq!(
            store.redemption_by_code(&code).unwrap().unwrap().id,
            redemption.id
        );

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::DeleteRedemption(redemption.id));
        store.apply(batch).unwrap();
        assert!(!store.code_in_use(&code).unwrap());
    }

    #[test]
    fn duplicate_code_for_different_redemption_is_rejected() {
        let store = MemoryLedgerStore::new();
        let first = redemption(CustomerId::generate(), "CODE-1");
        let second = redemption(CustomerId::generate(), "CODE-1");

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::PutRedemption(first));
        store.apply(batch).unwrap();

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::PutRedemption(second));
        assert!(matches!(
            store.apply(batch),
            Err(LoyaltyError::ConsistencyViolation { .. })
        ));
    }

    #[test]
    fn redemptions_created_on_counts_by_creation_date() {
        let store = MemoryLedgerStore::new();
        let customer = CustomerId::generate();
        let today = Utc::now().date_naive();

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::PutRedemption(redemption(customer, "A-1")));
        batch.push(WriteOp::PutRedemption(redemption(customer, "A-2")));
        store.apply(batch).unwrap();

        assert_eq!(store.redemptions_created_on(&customer, today).unwrap(), 2);
        let other = CustomerId::generate();
        assert_eq!(store.redemptions_created_on(&other, today).unwrap(), 0);
    }
}
