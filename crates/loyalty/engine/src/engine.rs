use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, error, info};

use loyalty_audit::{ActionType, AuditEvent, AuditSink};
use loyalty_policy::{compute_earned, daily_cap_allows};
use loyalty_store::{Clock, CodeGenerator, LedgerStore, WriteBatch, WriteOp};
use loyalty_types::{
    Adjustment, CustomerBalance, CustomerId, LoyaltyConfig, LoyaltyError, LoyaltyMode,
    LoyaltyResult, Redemption, RedemptionCode, RedemptionId, RedemptionStatus, RestaurantId,
    Reward, RewardId, StaffId, Transaction, TransactionId, TransactionStatus,
};

use crate::locks::CustomerLocks;

/// How long a mutation waits for a customer's lock before giving up.
const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(2);

/// Attempts at generating a collision-free redemption code.
const MAX_CODE_ATTEMPTS: usize = 32;

/// Direction of a manual balance adjustment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdjustmentKind {
    Add,
    Subtract,
}

/// Reward fields supplied by an administrator; the engine owns id and
/// timestamps.
#[derive(Clone, Debug)]
pub struct RewardSpec {
    pub title: String,
    pub description: Option<String>,
    pub required_points: Option<i64>,
    pub required_stamps: Option<i64>,
}

/// What a history purge removed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub transactions_removed: usize,
    pub redemptions_removed: usize,
}

/// The loyalty ledger engine for one restaurant.
///
/// Sole writer of customer balances: every mutation commits the ledger row
/// and the balance delta it justifies in a single atomic store batch, under
/// that customer's lock. All collaborators (persistence, clock, code
/// generation, audit delivery) are injected.
pub struct LedgerEngine {
    restaurant_id: RestaurantId,
    config: LoyaltyConfig,
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    codes: Arc<dyn CodeGenerator>,
    audit: Arc<dyn AuditSink>,
    locks: CustomerLocks,
}

impl LedgerEngine {
    pub fn new(
        restaurant_id: RestaurantId,
        config: LoyaltyConfig,
        store: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
        codes: Arc<dyn CodeGenerator>,
        audit: Arc<dyn AuditSink>,
    ) -> LoyaltyResult<Self> {
        config.validate()?;
        Ok(Self {
            restaurant_id,
            config,
            store,
            clock,
            codes,
            audit,
            locks: CustomerLocks::new(DEFAULT_LOCK_WAIT),
        })
    }

    /// Override the bounded lock wait (mainly for contention tests).
    pub fn with_lock_wait(mut self, wait: Duration) -> Self {
        self.locks = CustomerLocks::new(wait);
        self
    }

    pub fn config(&self) -> &LoyaltyConfig {
        &self.config
    }

    pub fn restaurant_id(&self) -> RestaurantId {
        self.restaurant_id
    }

    // --- Earn side -------------------------------------------------------

    /// Record a purchase as an earn event and credit the balance.
    ///
    /// The daily stamp cap counts transactions of any status on the date, so
    /// a cancelled earn still blocks re-earning that day.
    pub fn record_transaction(
        &self,
        customer_id: CustomerId,
        amount_minor: i64,
    ) -> LoyaltyResult<Transaction> {
        self.locks.run(&customer_id, || {
            let earned = compute_earned(amount_minor, &self.config)?;
            let now = self.clock.now();
            let date = now.date_naive();

            let existing = self.store.transactions_on(&customer_id, date)?;
            if !daily_cap_allows(&self.config, existing) {
                debug!(customer = %customer_id, %date, "daily stamp cap blocked earn");
                return Err(LoyaltyError::DailyCapExceeded { date });
            }

            let transaction = Transaction {
                id: TransactionId::generate(),
                restaurant_id: self.restaurant_id,
                customer_id,
                amount_minor,
                points_earned: earned.points,
                stamps_earned: earned.stamps,
                transaction_date: date,
                created_at: now,
                status: TransactionStatus::Active,
            };

            let mut balance = self.balance_or_zero(&customer_id)?;
            balance.points = balance
                .points
                .checked_add(earned.points)
                .ok_or(LoyaltyError::InvalidAmount { amount_minor })?;
            balance.stamps = balance
                .stamps
                .checked_add(earned.stamps)
                .ok_or(LoyaltyError::InvalidAmount { amount_minor })?;
            balance.updated_at = now;

            let mut batch = WriteBatch::new();
            batch.push(WriteOp::PutTransaction(transaction.clone()));
            batch.push(WriteOp::PutBalance(balance));
            self.store.apply(batch)?;

            info!(
                customer = %customer_id,
                transaction = %transaction.id,
                amount_minor,
                points = earned.points,
                stamps = earned.stamps,
                "earn recorded"
            );
            self.emit(
                ActionType::TransactionRecorded,
                "transaction",
                transaction.id.to_string(),
                Value::Null,
                snapshot(&transaction),
            );
            Ok(transaction)
        })
    }

    /// Cancel an active earn event, debiting its contribution back out.
    ///
    /// If the balance no longer covers the contribution, the ledger and the
    /// balance disagree; the cancellation fails rather than clamping.
    pub fn cancel_transaction(&self, id: TransactionId) -> LoyaltyResult<Transaction> {
        let customer_id = self
            .store
            .transaction(&id)?
            .ok_or_else(|| not_found("transaction", &id.to_string()))?
            .customer_id;

        self.locks.run(&customer_id, || {
            let transaction = self
                .store
                .transaction(&id)?
                .ok_or_else(|| not_found("transaction", &id.to_string()))?;
            if transaction.status == TransactionStatus::Cancelled {
                return Err(LoyaltyError::AlreadyCancelled { id: id.to_string() });
            }

            let (points, stamps) = transaction.contribution();
            let mut balance = self.balance_or_zero(&customer_id)?;
            if balance.points < points || balance.stamps < stamps {
                let (required, available) = if balance.points < points {
                    (points, balance.points)
                } else {
                    (stamps, balance.stamps)
                };
                error!(
                    customer = %customer_id,
                    transaction = %id,
                    required,
                    available,
                    "cancel would drive balance negative; ledger and balance disagree"
                );
                return Err(LoyaltyError::InsufficientBalance {
                    required,
                    available,
                });
            }

            let before = snapshot(&transaction);
            let mut cancelled = transaction;
            cancelled.status = TransactionStatus::Cancelled;
            balance.points -= points;
            balance.stamps -= stamps;
            balance.updated_at = self.clock.now();

            let mut batch = WriteBatch::new();
            batch.push(WriteOp::PutTransaction(cancelled.clone()));
            batch.push(WriteOp::PutBalance(balance));
            self.store.apply(batch)?;

            info!(customer = %customer_id, transaction = %id, "earn cancelled");
            self.emit(
                ActionType::TransactionCancelled,
                "transaction",
                id.to_string(),
                before,
                snapshot(&cancelled),
            );
            Ok(cancelled)
        })
    }

    /// Permanently remove a cancelled earn event.
    ///
    /// Active transactions must be cancelled first so the balance stays
    /// consistent with history.
    pub fn delete_transaction(&self, id: TransactionId) -> LoyaltyResult<()> {
        let customer_id = self
            .store
            .transaction(&id)?
            .ok_or_else(|| not_found("transaction", &id.to_string()))?
            .customer_id;

        self.locks.run(&customer_id, || {
            let transaction = self
                .store
                .transaction(&id)?
                .ok_or_else(|| not_found("transaction", &id.to_string()))?;
            if transaction.status != TransactionStatus::Cancelled {
                return Err(LoyaltyError::InvalidState {
                    kind: "transaction",
                    id: id.to_string(),
                    expected: "cancelled",
                    found: transaction.status.to_string(),
                });
            }

            let mut batch = WriteBatch::new();
            batch.push(WriteOp::DeleteTransaction(id));
            self.store.apply(batch)?;

            info!(customer = %customer_id, transaction = %id, "earn deleted");
            self.emit(
                ActionType::TransactionDeleted,
                "transaction",
                id.to_string(),
                snapshot(&transaction),
                Value::Null,
            );
            Ok(())
        })
    }

    // --- Spend side ------------------------------------------------------

    /// Redeem a reward: debit the balance immediately (the hold) and create
    /// a pending redemption for staff to verify or cancel.
    pub fn create_redemption(
        &self,
        customer_id: CustomerId,
        reward_id: RewardId,
    ) -> LoyaltyResult<Redemption> {
        self.locks.run(&customer_id, || {
            let reward = self
                .store
                .reward(&reward_id)?
                .ok_or_else(|| not_found("reward", &reward_id.to_string()))?;
            if !reward.is_active {
                return Err(LoyaltyError::InvalidReward {
                    message: format!("reward {} is inactive", reward_id),
                });
            }
            let mode = self.config.loyalty_mode;
            let required = match reward.required_units(mode) {
                Some(required) if required > 0 => required,
                _ => {
                    return Err(LoyaltyError::InvalidReward {
                        message: format!("reward {} has no cost in {} mode", reward_id, mode),
                    });
                }
            };

            let now = self.clock.now();
            let today = now.date_naive();
            let created_today = self.store.redemptions_created_on(&customer_id, today)? as u32;
            if created_today >= self.config.max_redemptions_per_day {
                debug!(customer = %customer_id, created_today, "daily redemption limit hit");
                return Err(LoyaltyError::DailyLimitReached {
                    count: created_today,
                    limit: self.config.max_redemptions_per_day,
                });
            }

            let mut balance = self.balance_or_zero(&customer_id)?;
            let available = balance.units(mode);
            if available < required {
                return Err(LoyaltyError::InsufficientBalance {
                    required,
                    available,
                });
            }

            let code = self.generate_code()?;
            let redemption = Redemption {
                id: RedemptionId::generate(),
                restaurant_id: self.restaurant_id,
                customer_id,
                reward_id,
                reward_title: reward.title.clone(),
                points_used: match mode {
                    LoyaltyMode::Points => required,
                    LoyaltyMode::Stamps => 0,
                },
                stamps_used: match mode {
                    LoyaltyMode::Points => 0,
                    LoyaltyMode::Stamps => required,
                },
                redemption_code: code,
                status: RedemptionStatus::Pending,
                verified_at: None,
                verified_by: None,
                created_at: now,
            };

            balance.points -= redemption.points_used;
            balance.stamps -= redemption.stamps_used;
            balance.updated_at = now;

            let mut batch = WriteBatch::new();
            batch.push(WriteOp::PutRedemption(redemption.clone()));
            batch.push(WriteOp::PutBalance(balance));
            self.store.apply(batch)?;

            info!(
                customer = %customer_id,
                redemption = %redemption.id,
                code = %redemption.redemption_code,
                required,
                "redemption created, units held"
            );
            self.emit(
                ActionType::RedemptionCreated,
                "redemption",
                redemption.id.to_string(),
                Value::Null,
                snapshot(&redemption),
            );
            Ok(redemption)
        })
    }

    /// Staff confirms the redemption was honored; the hold becomes permanent.
    pub fn verify_redemption(
        &self,
        code: &RedemptionCode,
        verified_by: StaffId,
    ) -> LoyaltyResult<Redemption> {
        let customer_id = self
            .store
            .redemption_by_code(code)?
            .ok_or_else(|| not_found("redemption", code.as_str()))?
            .customer_id;

        self.locks.run(&customer_id, || {
            let redemption = self
                .store
                .redemption_by_code(code)?
                .ok_or_else(|| not_found("redemption", code.as_str()))?;
            self.require_pending(&redemption)?;

            let before = snapshot(&redemption);
            let mut verified = redemption;
            verified.status = RedemptionStatus::Verified;
            verified.verified_at = Some(self.clock.now());
            verified.verified_by = Some(verified_by);

            let mut batch = WriteBatch::new();
            batch.push(WriteOp::PutRedemption(verified.clone()));
            self.store.apply(batch)?;

            info!(
                customer = %customer_id,
                redemption = %verified.id,
                staff = %verified_by,
                "redemption verified"
            );
            self.emit(
                ActionType::RedemptionVerified,
                "redemption",
                verified.id.to_string(),
                before,
                snapshot(&verified),
            );
            Ok(verified)
        })
    }

    /// Release a pending hold: mark the redemption cancelled and credit the
    /// held units back.
    pub fn cancel_redemption(&self, code: &RedemptionCode) -> LoyaltyResult<Redemption> {
        let customer_id = self
            .store
            .redemption_by_code(code)?
            .ok_or_else(|| not_found("redemption", code.as_str()))?
            .customer_id;

        self.locks.run(&customer_id, || {
            let redemption = self
                .store
                .redemption_by_code(code)?
                .ok_or_else(|| not_found("redemption", code.as_str()))?;
            self.require_pending(&redemption)?;

            let (points, stamps) = redemption.held();
            let now = self.clock.now();
            let mut balance = self.balance_or_zero(&customer_id)?;
            balance.points += points;
            balance.stamps += stamps;
            balance.updated_at = now;

            let before = snapshot(&redemption);
            let mut cancelled = redemption;
            cancelled.status = RedemptionStatus::Cancelled;

            let mut batch = WriteBatch::new();
            batch.push(WriteOp::PutRedemption(cancelled.clone()));
            batch.push(WriteOp::PutBalance(balance));
            self.store.apply(batch)?;

            info!(customer = %customer_id, redemption = %cancelled.id, "redemption cancelled, hold released");
            self.emit(
                ActionType::RedemptionCancelled,
                "redemption",
                cancelled.id.to_string(),
                before,
                snapshot(&cancelled),
            );
            Ok(cancelled)
        })
    }

    // --- Reads and maintenance -------------------------------------------

    /// The committed balance; zero for a customer with no history.
    pub fn get_balance(&self, customer_id: CustomerId) -> LoyaltyResult<CustomerBalance> {
        self.balance_or_zero(&customer_id)
    }

    /// Manually adjust a balance in the active mode's unit.
    ///
    /// Subtraction clamps at zero; the delta actually applied is recorded as
    /// an adjustment ledger row so reconciliation still balances.
    pub fn adjust_balance(
        &self,
        customer_id: CustomerId,
        kind: AdjustmentKind,
        units: i64,
        reason: impl Into<String>,
    ) -> LoyaltyResult<CustomerBalance> {
        if units <= 0 {
            return Err(LoyaltyError::InvalidAmount {
                amount_minor: units,
            });
        }
        let reason = reason.into();

        self.locks.run(&customer_id, || {
            let now = self.clock.now();
            let mut balance = self.balance_or_zero(&customer_id)?;
            let mode = self.config.loyalty_mode;
            let current = balance.units(mode);

            let applied = match kind {
                AdjustmentKind::Add => units,
                AdjustmentKind::Subtract => -units.min(current),
            };
            let (delta_points, delta_stamps) = match mode {
                LoyaltyMode::Points => (applied, 0),
                LoyaltyMode::Stamps => (0, applied),
            };

            let before = snapshot(&balance);
            balance.points = balance
                .points
                .checked_add(delta_points)
                .ok_or(LoyaltyError::InvalidAmount {
                    amount_minor: units,
                })?;
            balance.stamps = balance
                .stamps
                .checked_add(delta_stamps)
                .ok_or(LoyaltyError::InvalidAmount {
                    amount_minor: units,
                })?;
            balance.updated_at = now;

            let adjustment = Adjustment {
                id: uuid::Uuid::new_v4(),
                restaurant_id: self.restaurant_id,
                customer_id,
                delta_points,
                delta_stamps,
                reason: reason.clone(),
                created_at: now,
            };

            let mut batch = WriteBatch::new();
            batch.push(WriteOp::PutAdjustment(adjustment));
            batch.push(WriteOp::PutBalance(balance.clone()));
            self.store.apply(batch)?;

            info!(customer = %customer_id, applied, %reason, "balance adjusted");
            self.emit(
                ActionType::BalanceAdjusted,
                "balance",
                customer_id.to_string(),
                before,
                snapshot(&balance),
            );
            Ok(balance)
        })
    }

    /// Recompute the balance from ledger history and compare with the stored
    /// value. A mismatch is a consistency violation: logged with both values
    /// and never auto-corrected.
    pub fn reconcile(&self, customer_id: CustomerId) -> LoyaltyResult<CustomerBalance> {
        self.locks.run(&customer_id, || {
            let stored = self.balance_or_zero(&customer_id)?;

            let mut points = 0i64;
            let mut stamps = 0i64;
            for tx in self.store.transactions_for(&customer_id)? {
                if tx.status == TransactionStatus::Active {
                    points += tx.points_earned;
                    stamps += tx.stamps_earned;
                }
            }
            for redemption in self.store.redemptions_for(&customer_id)? {
                // Pending counts: the hold already left the balance.
                if redemption.status != RedemptionStatus::Cancelled {
                    points -= redemption.points_used;
                    stamps -= redemption.stamps_used;
                }
            }
            for adjustment in self.store.adjustments_for(&customer_id)? {
                points += adjustment.delta_points;
                stamps += adjustment.delta_stamps;
            }

            if stored.points != points || stored.stamps != stamps {
                error!(
                    customer = %customer_id,
                    stored_points = stored.points,
                    stored_stamps = stored.stamps,
                    ledger_points = points,
                    ledger_stamps = stamps,
                    "stored balance disagrees with ledger history"
                );
                return Err(LoyaltyError::ConsistencyViolation {
                    message: format!(
                        "customer {}: stored ({}, {}) != ledger ({}, {})",
                        customer_id, stored.points, stored.stamps, points, stamps
                    ),
                });
            }
            Ok(stored)
        })
    }

    /// Remove old records that carry no balance contribution: cancelled
    /// transactions and cancelled redemptions from before the cutoff.
    ///
    /// Records deleted by a concurrent call between the scan and the commit
    /// are skipped, not errors; the report counts what was actually removed.
    pub fn purge_history(&self, before: NaiveDate) -> LoyaltyResult<PurgeReport> {
        let transactions = self.store.cancelled_transactions_before(before)?;
        let redemptions = self.store.cancelled_redemptions_before(before)?;

        let mut report = PurgeReport::default();
        for id in transactions {
            let mut batch = WriteBatch::new();
            batch.push(WriteOp::DeleteTransaction(id));
            match self.store.apply(batch) {
                Ok(()) => report.transactions_removed += 1,
                Err(LoyaltyError::NotFound { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        for id in redemptions {
            let mut batch = WriteBatch::new();
            batch.push(WriteOp::DeleteRedemption(id));
            match self.store.apply(batch) {
                Ok(()) => report.redemptions_removed += 1,
                Err(LoyaltyError::NotFound { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        if report.transactions_removed == 0 && report.redemptions_removed == 0 {
            return Ok(report);
        }

        info!(
            cutoff = %before,
            transactions = report.transactions_removed,
            redemptions = report.redemptions_removed,
            "history purged"
        );
        self.emit(
            ActionType::HistoryPurged,
            "ledger",
            self.restaurant_id.to_string(),
            Value::Null,
            serde_json::json!({
                "cutoff": before,
                "transactions_removed": report.transactions_removed,
                "redemptions_removed": report.redemptions_removed,
            }),
        );
        Ok(report)
    }

    // --- Reward catalog --------------------------------------------------

    /// Add a catalog entry. The cost field must match the restaurant mode.
    pub fn create_reward(&self, spec: RewardSpec) -> LoyaltyResult<Reward> {
        self.validate_reward_spec(&spec)?;
        let now = self.clock.now();
        let reward = Reward {
            id: RewardId::generate(),
            restaurant_id: self.restaurant_id,
            title: spec.title,
            description: spec.description,
            required_points: spec.required_points,
            required_stamps: spec.required_stamps,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::PutReward(reward.clone()));
        self.store.apply(batch)?;

        info!(reward = %reward.id, title = %reward.title, "reward created");
        self.emit(
            ActionType::RewardCreated,
            "reward",
            reward.id.to_string(),
            Value::Null,
            snapshot(&reward),
        );
        Ok(reward)
    }

    /// Replace a reward's admin-editable fields. Redemptions snapshotted the
    /// old title and cost, so history is unaffected.
    pub fn update_reward(&self, id: RewardId, spec: RewardSpec) -> LoyaltyResult<Reward> {
        self.validate_reward_spec(&spec)?;
        let existing = self
            .store
            .reward(&id)?
            .ok_or_else(|| not_found("reward", &id.to_string()))?;

        let before = snapshot(&existing);
        let mut updated = existing;
        updated.title = spec.title;
        updated.description = spec.description;
        updated.required_points = spec.required_points;
        updated.required_stamps = spec.required_stamps;
        updated.updated_at = self.clock.now();

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::PutReward(updated.clone()));
        self.store.apply(batch)?;

        self.emit(
            ActionType::RewardUpdated,
            "reward",
            id.to_string(),
            before,
            snapshot(&updated),
        );
        Ok(updated)
    }

    /// Activate or retire a catalog entry.
    pub fn set_reward_active(&self, id: RewardId, is_active: bool) -> LoyaltyResult<Reward> {
        let existing = self
            .store
            .reward(&id)?
            .ok_or_else(|| not_found("reward", &id.to_string()))?;
        if existing.is_active == is_active {
            return Ok(existing);
        }

        let before = snapshot(&existing);
        let mut updated = existing;
        updated.is_active = is_active;
        updated.updated_at = self.clock.now();

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::PutReward(updated.clone()));
        self.store.apply(batch)?;

        self.emit(
            ActionType::RewardUpdated,
            "reward",
            id.to_string(),
            before,
            snapshot(&updated),
        );
        Ok(updated)
    }

    pub fn list_rewards(&self) -> LoyaltyResult<Vec<Reward>> {
        self.store.list_rewards()
    }

    // --- Internals -------------------------------------------------------

    fn balance_or_zero(&self, customer_id: &CustomerId) -> LoyaltyResult<CustomerBalance> {
        Ok(self.store.balance(customer_id)?.unwrap_or_else(|| {
            CustomerBalance::zero(*customer_id, self.restaurant_id, self.clock.now())
        }))
    }

    fn require_pending(&self, redemption: &Redemption) -> LoyaltyResult<()> {
        if redemption.status != RedemptionStatus::Pending {
            return Err(LoyaltyError::InvalidState {
                kind: "redemption",
                id: redemption.id.to_string(),
                expected: "pending",
                found: redemption.status.to_string(),
            });
        }
        Ok(())
    }

    fn generate_code(&self) -> LoyaltyResult<RedemptionCode> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = self.codes.generate();
            if !self.store.code_in_use(&code)? {
                return Ok(code);
            }
            debug!(code = %code, "redemption code collision, regenerating");
        }
        Err(LoyaltyError::ConsistencyViolation {
            message: format!(
                "no unique redemption code after {} attempts",
                MAX_CODE_ATTEMPTS
            ),
        })
    }

    fn validate_reward_spec(&self, spec: &RewardSpec) -> LoyaltyResult<()> {
        if spec.title.trim().is_empty() {
            return Err(LoyaltyError::InvalidReward {
                message: "reward title is empty".into(),
            });
        }
        let mode = self.config.loyalty_mode;
        match (mode, spec.required_points, spec.required_stamps) {
            (LoyaltyMode::Points, Some(points), None) if points > 0 => Ok(()),
            (LoyaltyMode::Stamps, None, Some(stamps)) if stamps > 0 => Ok(()),
            _ => Err(LoyaltyError::InvalidReward {
                message: format!(
                    "reward cost must set exactly the {} field with a positive value",
                    mode
                ),
            }),
        }
    }

    fn emit(
        &self,
        action_type: ActionType,
        target_type: &str,
        target_id: String,
        before: Value,
        after: Value,
    ) {
        self.audit.record(AuditEvent {
            action_type,
            target_type: target_type.to_string(),
            target_id,
            before,
            after,
            recorded_at: self.clock.now(),
        });
    }
}

fn not_found(kind: &'static str, id: &str) -> LoyaltyError {
    LoyaltyError::NotFound {
        kind,
        id: id.to_string(),
    }
}

fn snapshot<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
