//! # loyalty-store
//!
//! The persistence seam for the loyalty ledger: a synchronous store contract
//! with atomic batch commit, plus the clock and redemption-code collaborators
//! the engine has injected instead of reaching for globals. The in-memory
//! adapter is the reference implementation and test backend.

#![deny(unsafe_code)]

pub mod clock;
pub mod codes;
pub mod memory;
pub mod traits;

pub use clock::{Clock, ManualClock, SystemClock};
pub use codes::{CodeGenerator, FixedCodeGenerator, TimestampCodeGenerator};
pub use memory::MemoryLedgerStore;
pub use traits::{LedgerStore, WriteBatch, WriteOp};
