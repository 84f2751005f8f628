//! # Storage Module — Persistence Over sled
//!
//! The engine runs in memory; this module is where its state goes to
//! survive a restart. [`LedgerStore`] wraps a sled database with typed
//! accessors for wallets, reservations, transactions, and verification
//! records, plus a whole-state snapshot API the service drives.
//!
//! The engine never calls into here. Keeping the dependency one-way means
//! the core state machine stays free of I/O error paths, and the service
//! alone decides when durability happens (periodically and on shutdown).

pub mod store;

pub use store::{DbError, DbResult, LedgerStore};
