use std::collections::HashMap;
use std::sync::{Arc, Mutex, TryLockError};
use std::time::{Duration, Instant};

use loyalty_types::{CustomerId, LoyaltyError, LoyaltyResult};

/// Per-customer serialization.
///
/// Every mutating operation for a customer runs under that customer's mutex,
/// so concurrent operations on the same balance are equivalent to some serial
/// order. Waits are bounded: past the limit the caller gets a retryable
/// `Contended` instead of blocking indefinitely. Different customers never
/// contend with each other here.
pub(crate) struct CustomerLocks {
    locks: Mutex<HashMap<CustomerId, Arc<Mutex<()>>>>,
    wait_limit: Duration,
}

impl CustomerLocks {
    pub fn new(wait_limit: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            wait_limit,
        }
    }

    fn lock_for(&self, customer_id: &CustomerId) -> LoyaltyResult<Arc<Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| LoyaltyError::Storage("customer lock table poisoned".into()))?;
        Ok(locks
            .entry(*customer_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }

    /// Run `op` while holding the customer's lock, waiting at most the
    /// configured limit to acquire it.
    pub fn run<R>(
        &self,
        customer_id: &CustomerId,
        op: impl FnOnce() -> LoyaltyResult<R>,
    ) -> LoyaltyResult<R> {
        let lock = self.lock_for(customer_id)?;
        let deadline = Instant::now() + self.wait_limit;
        let _guard = loop {
            match lock.try_lock() {
                Ok(guard) => break guard,
                Err(TryLockError::WouldBlock) => {
                    if Instant::now() >= deadline {
                        tracing::warn!(customer = %customer_id, "customer ledger contended past wait limit");
                        return Err(LoyaltyError::Contended);
                    }
                    std::thread::sleep(Duration::from_millis(1));
                }
                Err(TryLockError::Poisoned(_)) => {
                    return Err(LoyaltyError::Storage("customer lock poisoned".into()));
                }
            }
        };
        op()
    }
}
