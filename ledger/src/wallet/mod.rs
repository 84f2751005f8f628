//! # Wallet Module — Balances, Registry & Reservations
//!
//! The wallet module is where money lives. Every balance read, every hold,
//! every credit in the platform passes through the [`WalletRegistry`] — the
//! arena that owns all wallet records and is the only code allowed to mutate
//! a balance.
//!
//! ## Architecture
//!
//! ```text
//! account.rs     — Wallet record: identity, type, balances, lifecycle
//! reservation.rs — Fund holds taken during pending transactions
//! registry.rs    — The arena: get-or-create, reserve, settle, credit
//! ```
//!
//! ## Design Principles
//!
//! 1. **All amounts are integer minor units.** No floating point. The
//!    [`crate::money`] module owns the fixed-point arithmetic.
//!
//! 2. **Per-wallet serialization, nothing global.** Each wallet sits behind
//!    its own lock; operations on disjoint wallets never contend.
//!
//! 3. **Admission and mutation are one step.** The available-funds check and
//!    the pending-balance increment happen under a single lock acquisition,
//!    so no interleaving can overdraw a wallet.
//!
//! 4. **Serializable state.** Every record derives `Serialize`/`Deserialize`
//!    so the full registry can be snapshotted to sled and restored.

pub mod account;
pub mod registry;
pub mod reservation;

pub use account::{Wallet, WalletId, WalletType};
pub use registry::{RegistryError, WalletRegistry};
pub use reservation::{Reservation, ReservationId, SettleOutcome};
