//! # Engine Error Taxonomy
//!
//! Every failure a caller of the [`LedgerEngine`](super::engine::LedgerEngine)
//! can see. Nothing here is fatal to the process — every variant is a
//! per-request outcome, reported as a typed result.
//!
//! Note what is *not* here: duplicate submission. Resubmitting a completed
//! idempotency key is absorbed by the index and returns the original
//! transaction; only a concurrent still-in-flight duplicate surfaces, as
//! [`EngineError::DuplicateInFlight`].

use thiserror::Error;

use crate::engine::transaction::{TransactionId, TransactionStatus};
use crate::money::{Currency, MoneyError};
use crate::verification::gate::{AuthError, OperationClass, Role};
use crate::verification::record::{KycStatus, VerificationFlag};
use crate::wallet::account::WalletId;
use crate::wallet::registry::RegistryError;

/// Errors returned by ledger engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The request shape is wrong: bad wallet pairing for the kind, zero
    /// amount, over-long description, mismatched currencies, wrong owner.
    /// Never retried automatically — the caller must fix the request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The currency code is not in the supported set.
    #[error("invalid currency: {0}")]
    InvalidCurrency(String),

    /// The verification gate denied the operation on KYC grounds.
    /// `missing` names the steps the user still has to complete, so the
    /// UI can route them there.
    #[error("not verified for {operation}: status {status}, missing {missing:?}")]
    NotVerified {
        /// The operation that was denied.
        operation: OperationClass,
        /// The user's current KYC status.
        status: KycStatus,
        /// Verification steps still outstanding.
        missing: Vec<VerificationFlag>,
    },

    /// The verification gate denied the operation on role grounds.
    #[error("role {role} may not perform {operation}")]
    RoleDenied {
        /// The role attached to the request.
        role: Role,
        /// The operation that was denied.
        operation: OperationClass,
    },

    /// Available funds do not cover the requested amount. No partial
    /// reservation is left behind.
    #[error("insufficient funds: available {available}, requested {requested} (minor units of {currency})")]
    InsufficientFunds {
        /// Available minor units at admission time.
        available: u64,
        /// Requested minor units.
        requested: u64,
        /// The wallet's currency.
        currency: Currency,
    },

    /// A referenced wallet does not exist.
    #[error("wallet not found: {0}")]
    WalletNotFound(WalletId),

    /// A referenced wallet has been deactivated.
    #[error("wallet {0} is inactive")]
    WalletInactive(WalletId),

    /// No transaction exists with the given id.
    #[error("transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// The transaction already reached a terminal state; the requested
    /// transition is not possible. Carries the recorded status.
    #[error("transaction {id} already settled as {status}")]
    AlreadySettled {
        /// The transaction in question.
        id: TransactionId,
        /// Its recorded terminal status.
        status: TransactionStatus,
    },

    /// Another submission with the same idempotency key is still in
    /// flight (or died mid-flight within the claim TTL). Retry shortly.
    #[error("a submission with this idempotency key is in flight ({age_ms}ms old)")]
    DuplicateInFlight {
        /// Age of the competing claim in milliseconds.
        age_ms: u64,
    },

    /// Balance arithmetic would overflow.
    #[error("balance overflow on wallet {0}")]
    Overflow(WalletId),
}

impl From<RegistryError> for EngineError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::WalletNotFound(id) => EngineError::WalletNotFound(id),
            RegistryError::WalletInactive(id) => EngineError::WalletInactive(id),
            RegistryError::ZeroAmount => {
                EngineError::InvalidRequest("amount must be positive".to_string())
            }
            RegistryError::CurrencyMismatch {
                wallet_id,
                wallet_currency,
                amount_currency,
            } => EngineError::InvalidRequest(format!(
                "currency mismatch on wallet {wallet_id}: wallet holds {wallet_currency}, got {amount_currency}"
            )),
            RegistryError::InsufficientFunds {
                available,
                requested,
                currency,
                ..
            } => EngineError::InsufficientFunds {
                available,
                requested,
                currency,
            },
            RegistryError::BalanceOverflow(id) => EngineError::Overflow(id),
            RegistryError::ReservationNotFound(id) => EngineError::InvalidRequest(format!(
                "reservation not found: {id}"
            )),
        }
    }
}

impl From<AuthError> for EngineError {
    fn from(err: AuthError) -> Self {
        match err {
            // An unknown user has completed nothing; surface the full list
            // of missing steps so the UI can start them at step one.
            AuthError::UnknownUser { operation, .. } => EngineError::NotVerified {
                operation,
                status: KycStatus::Pending,
                missing: VerificationFlag::ALL.to_vec(),
            },
            AuthError::NotVerified {
                operation,
                status,
                missing,
            } => EngineError::NotVerified {
                operation,
                status,
                missing,
            },
            AuthError::RoleDenied { role, operation } => {
                EngineError::RoleDenied { role, operation }
            }
        }
    }
}

impl From<MoneyError> for EngineError {
    fn from(err: MoneyError) -> Self {
        match err {
            MoneyError::UnsupportedCurrency(code) => EngineError::InvalidCurrency(code),
            other => EngineError::InvalidRequest(other.to_string()),
        }
    }
}
