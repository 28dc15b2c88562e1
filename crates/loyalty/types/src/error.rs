use thiserror::Error;

/// Result type for ledger operations.
pub type LoyaltyResult<T> = Result<T, LoyaltyError>;

/// Errors surfaced by the loyalty ledger.
///
/// Business-rule failures are ordinary results the caller handles; nothing
/// here is retried automatically except `Contended`, which a caller may retry
/// with backoff. `ConsistencyViolation` means the stored balance and the
/// ledger history disagree; the operation is aborted with full context and
/// the balance is never auto-corrected.
#[derive(Debug, Error)]
pub enum LoyaltyError {
    #[error("invalid amount: {amount_minor} minor units (must be positive)")]
    InvalidAmount { amount_minor: i64 },

    #[error("invalid reward: {message}")]
    InvalidReward { message: String },

    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: i64, available: i64 },

    #[error("daily stamp cap reached: customer already has a transaction on {date}")]
    DailyCapExceeded { date: chrono::NaiveDate },

    #[error("daily redemption limit reached: {count} of {limit} used today")]
    DailyLimitReached { count: u32, limit: u32 },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("invalid state for {kind} {id}: expected {expected}, found {found}")]
    InvalidState {
        kind: &'static str,
        id: String,
        expected: &'static str,
        found: String,
    },

    #[error("transaction {id} is already cancelled")]
    AlreadyCancelled { id: String },

    #[error("customer ledger is contended, retry later")]
    Contended,

    #[error("ledger/balance consistency violation: {message}")]
    ConsistencyViolation { message: String },

    #[error("storage error: {0}")]
    Storage(String),
}

impl LoyaltyError {
    /// Whether a caller may retry the failed operation as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LoyaltyError::Contended)
    }
}
