//! # Ledger Engine Module
//!
//! The transaction state machine and everything it needs to run exactly
//! once per submission:
//!
//! ```text
//! transaction.rs — Transaction record, kinds, lifecycle states
//! idempotency.rs — Atomic claim index for caller-supplied keys
//! error.rs       — The error taxonomy callers see
//! engine.rs      — The engine: submit, settle, cancel
//! ```
//!
//! Control flow for a submission: idempotency claim → shape validation →
//! verification gate → fund reservation → persist `Pending`. Settlement is
//! a separate, explicit step driven by the external settlement confirmer.

pub mod engine;
pub mod error;
pub mod idempotency;
pub mod transaction;

pub use engine::{LedgerEngine, LedgerSnapshot, SettlementOutcome, StoredTransaction, SubmitRequest};
pub use error::EngineError;
pub use idempotency::{BeginOutcome, IdempotencyIndex};
pub use transaction::{Transaction, TransactionId, TransactionKind, TransactionStatus};
