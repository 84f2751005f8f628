//! # Transaction Records
//!
//! The vocabulary of the ledger's state machine: what kinds of transaction
//! exist, which wallet endpoints each kind requires, and the one-way
//! lifecycle every transaction walks.
//!
//! ```text
//!             settle(commit)
//!   Pending ────────────────► Completed
//!      │
//!      │ settle(fail)
//!      ├────────────────────► Failed
//!      │
//!      │ cancel (before any settlement attempt)
//!      └────────────────────► Cancelled
//! ```
//!
//! Terminal states are immutable. There is no path out of them, and the
//! engine enforces that settling a terminal transaction returns the recorded
//! status without touching a balance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::money::Amount;
use crate::verification::gate::OperationClass;
use crate::wallet::account::WalletId;

// ---------------------------------------------------------------------------
// TransactionId
// ---------------------------------------------------------------------------

/// Server-assigned unique transaction identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TransactionId(Uuid);

impl TransactionId {
    /// Generates a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TransactionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// TransactionKind
// ---------------------------------------------------------------------------

/// Discriminant for the operation a transaction represents.
///
/// The kind determines which wallet endpoints must be present and which
/// authorization class the gate is asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Peer-to-peer transfer between two wallets.
    Send,
    /// Incoming transfer credited by an external counterparty.
    Receive,
    /// Funding from an external source (card, bank, agent cash-in).
    Topup,
    /// Moving funds off the platform (bank payout, agent cash-out).
    Withdraw,
    /// Paying a merchant wallet.
    Payment,
}

impl TransactionKind {
    /// Kinds that debit a source wallet and therefore take a reservation.
    pub fn requires_source(&self) -> bool {
        matches!(
            self,
            TransactionKind::Send | TransactionKind::Withdraw | TransactionKind::Payment
        )
    }

    /// Kinds that credit a destination wallet on commit.
    pub fn requires_destination(&self) -> bool {
        !matches!(self, TransactionKind::Withdraw)
    }

    /// Kinds that move funds between two wallets inside the platform.
    pub fn is_transfer(&self) -> bool {
        matches!(self, TransactionKind::Send | TransactionKind::Payment)
    }

    /// The authorization class the verification gate is asked about.
    pub fn operation_class(&self) -> OperationClass {
        match self {
            TransactionKind::Send => OperationClass::Send,
            TransactionKind::Receive => OperationClass::Receive,
            TransactionKind::Topup => OperationClass::Topup,
            TransactionKind::Withdraw => OperationClass::Withdraw,
            TransactionKind::Payment => OperationClass::Payment,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Send => f.write_str("send"),
            TransactionKind::Receive => f.write_str("receive"),
            TransactionKind::Topup => f.write_str("topup"),
            TransactionKind::Withdraw => f.write_str("withdraw"),
            TransactionKind::Payment => f.write_str("payment"),
        }
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "send" => Ok(TransactionKind::Send),
            "receive" => Ok(TransactionKind::Receive),
            "topup" => Ok(TransactionKind::Topup),
            "withdraw" => Ok(TransactionKind::Withdraw),
            "payment" => Ok(TransactionKind::Payment),
            other => Err(format!("unknown transaction kind: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// TransactionStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Created and funds reserved; awaiting the settlement confirmer.
    Pending,
    /// Settled successfully. Balances are final.
    Completed,
    /// Settlement reported failure. Reservation released, no funds moved.
    Failed,
    /// Cancelled by the caller before any settlement attempt.
    Cancelled,
}

impl TransactionStatus {
    /// Returns `true` for states with no outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Pending => f.write_str("pending"),
            TransactionStatus::Completed => f.write_str("completed"),
            TransactionStatus::Failed => f.write_str("failed"),
            TransactionStatus::Cancelled => f.write_str("cancelled"),
        }
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// One money-movement record, from submission to terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Server-assigned unique id.
    pub id: TransactionId,
    /// The user who submitted this transaction.
    pub owner: String,
    /// Caller-supplied idempotency key, if any.
    pub idempotency_key: Option<String>,
    /// What this transaction does.
    pub kind: TransactionKind,
    /// The amount being moved. Always positive.
    pub amount: Amount,
    /// Source wallet for kinds that debit one.
    pub from_wallet: Option<WalletId>,
    /// Destination wallet for kinds that credit one.
    pub to_wallet: Option<WalletId>,
    /// Current lifecycle state.
    pub status: TransactionStatus,
    /// Free-text statement line, possibly empty.
    pub description: String,
    /// When the transaction was admitted.
    pub created_at: DateTime<Utc>,
    /// When the transaction reached a terminal state, if it has.
    pub settled_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
