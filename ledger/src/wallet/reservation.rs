//! # Reservations — Holds on Pending Funds
//!
//! A [`Reservation`] is a hold placed on a wallet's funds while a transaction
//! is pending. Taking a reservation moves nothing; it only raises the
//! wallet's `pending_balance` so the held funds cannot be spent twice.
//! Settlement resolves the hold one of two ways:
//!
//! - **Commit** — the held funds leave the wallet (balance and pending both
//!   drop by the reserved amount).
//! - **Release** — the hold is undone (only pending drops; no funds move).
//!
//! Either way, a reservation settles exactly once. Settling an already
//! settled reservation returns the recorded outcome and changes nothing —
//! the same terminal-state rule the transaction machine follows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::Amount;
use crate::wallet::account::WalletId;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// ReservationId
// ---------------------------------------------------------------------------

/// Unique handle to a reservation, returned by
/// [`WalletRegistry::reserve`](super::registry::WalletRegistry::reserve).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ReservationId(Uuid);

impl ReservationId {
    /// Generates a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ReservationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ---------------------------------------------------------------------------
// SettleOutcome
// ---------------------------------------------------------------------------

/// How a reservation was (or should be) resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettleOutcome {
    /// The held funds leave the wallet.
    Commit,
    /// The hold is undone; no funds move.
    Release,
}

impl fmt::Display for SettleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettleOutcome::Commit => f.write_str("commit"),
            SettleOutcome::Release => f.write_str("release"),
        }
    }
}

// ---------------------------------------------------------------------------
// Reservation
// ---------------------------------------------------------------------------

/// A hold on a wallet's funds, open until settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Unique handle.
    pub id: ReservationId,
    /// The wallet the hold is against.
    pub wallet_id: WalletId,
    /// The held amount.
    pub amount: Amount,
    /// When the hold was taken.
    pub created_at: DateTime<Utc>,
    /// `None` while open; the recorded outcome once settled.
    pub outcome: Option<SettleOutcome>,
}

impl Reservation {
    /// Creates a new open reservation.
    pub fn new(wallet_id: WalletId, amount: Amount) -> Self {
        Self {
            id: ReservationId::new(),
            wallet_id,
            amount,
            created_at: Utc::now(),
            outcome: None,
        }
    }

    /// Returns `true` if the reservation has not been settled yet.
    pub fn is_open(&self) -> bool {
        self.outcome.is_none()
    }
}
