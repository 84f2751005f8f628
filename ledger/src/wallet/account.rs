//! # Wallet Records
//!
//! A [`Wallet`] is one balance container: one owner, one type, one currency.
//! A user's "account" in the product is really a small family of wallets —
//! a primary spending wallet, maybe a savings wallet, maybe a crypto wallet —
//! each tracked independently.
//!
//! ## Balance Model
//!
//! Two numbers, both in integer minor units:
//!
//! - `balance` — settled funds. Never negative.
//! - `pending_balance` — the sum of open reservations against this wallet.
//!   Funds under reservation are still *in* `balance`; they are just not
//!   *available*. Available funds are `balance - pending_balance`.
//!
//! The registry maintains the invariant `pending_balance <= balance` — a
//! reservation is only admitted when fully covered by available funds.
//!
//! ## Lifecycle
//!
//! Wallets are created lazily the first time an owner asks for a given type,
//! and are never deleted — only deactivated. A deactivated wallet rejects
//! reservations and credits but keeps its history readable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::money::Currency;

// ---------------------------------------------------------------------------
// WalletId
// ---------------------------------------------------------------------------

/// Server-assigned unique wallet identifier.
///
/// Transactions reference their endpoints by `WalletId`; the registry also
/// indexes wallets by `(owner, type)` for lazy creation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct WalletId(Uuid);

impl WalletId {
    /// Generates a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WalletId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for WalletId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// WalletType
// ---------------------------------------------------------------------------

/// The product-level purpose of a wallet.
///
/// An owner holds at most one wallet of each type. The type does not change
/// ledger semantics — a savings wallet settles exactly like a primary one —
/// it exists so the product can segregate funds and the registry can find
/// "the savings wallet of user X" without a separate lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletType {
    /// Day-to-day spending wallet. Created for every user.
    Primary,
    /// Interest-bearing savings pot.
    Savings,
    /// Crypto asset wallet (BTC, USDC).
    Crypto,
    /// Investment portfolio cash wallet.
    Investment,
}

impl WalletType {
    /// Canonical lowercase name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletType::Primary => "primary",
            WalletType::Savings => "savings",
            WalletType::Crypto => "crypto",
            WalletType::Investment => "investment",
        }
    }
}

impl fmt::Display for WalletType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WalletType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "primary" => Ok(WalletType::Primary),
            "savings" => Ok(WalletType::Savings),
            "crypto" => Ok(WalletType::Crypto),
            "investment" => Ok(WalletType::Investment),
            other => Err(format!("unknown wallet type: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Wallet
// ---------------------------------------------------------------------------

/// A single balance container scoped to one owner, one type, one currency.
///
/// Fields are public for reads; mutation goes through the
/// [`WalletRegistry`](super::registry::WalletRegistry) only. Handing out a
/// `Wallet` value is always handing out a snapshot — the registry clones on
/// read, so a caller can never mutate live state through one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    /// Server-assigned unique id.
    pub id: WalletId,
    /// The user who owns this wallet.
    pub owner: String,
    /// Product-level wallet type.
    pub wallet_type: WalletType,
    /// The wallet's currency, fixed at creation.
    pub currency: Currency,
    /// Settled balance in minor units. Never negative.
    pub balance: u64,
    /// Sum of open reservations in minor units. Never exceeds `balance`.
    pub pending_balance: u64,
    /// `false` once deactivated. Inactive wallets reject money movement.
    pub active: bool,
    /// When this wallet was created.
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    /// Creates a new empty, active wallet.
    pub fn new(owner: impl Into<String>, wallet_type: WalletType, currency: Currency) -> Self {
        Self {
            id: WalletId::new(),
            owner: owner.into(),
            wallet_type,
            currency,
            balance: 0,
            pending_balance: 0,
            active: true,
            created_at: Utc::now(),
        }
    }

    /// Funds not currently under reservation, in minor units.
    ///
    /// The registry maintains `pending_balance <= balance`, so this cannot
    /// underflow.
    pub fn available(&self) -> u64 {
        self.balance - self.pending_balance
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
