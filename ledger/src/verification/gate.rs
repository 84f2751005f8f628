//! # Verification Gate
//!
//! The gate answers one question: *may this user, acting in this role,
//! perform this class of operation right now?* It is a pure predicate
//! service — no side effects beyond the stored verification records.
//!
//! ## Policy
//!
//! Two checks, in order:
//!
//! 1. **Role matrix** — the session-supplied role selects the operation set.
//!    Roles never change wallet ownership, only what is authorized.
//! 2. **KYC policy** — money-movement operations (`Send`, `Withdraw`,
//!    `Payment`) require `Verified`; `Receive` and `Topup` require at
//!    minimum `InProgress`.
//!
//! The gate fails closed: a user with no verification record is denied
//! everything, and a denial carries the missing steps so the UI can route
//! the user to complete them.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::verification::record::{KycStatus, VerificationFlag, VerificationRecord};

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// The role the session layer attached to the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// End user: full peer-to-peer operation set.
    Consumer,
    /// Business accepting payments. No peer sends.
    Merchant,
    /// Cash-in/cash-out agent moving float. No customer payments.
    Agent,
}

impl Role {
    /// Canonical lowercase name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Consumer => "consumer",
            Role::Merchant => "merchant",
            Role::Agent => "agent",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "consumer" => Ok(Role::Consumer),
            "merchant" => Ok(Role::Merchant),
            "agent" => Ok(Role::Agent),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// OperationClass
// ---------------------------------------------------------------------------

/// The authorization vocabulary: one class per transaction kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationClass {
    /// Peer-to-peer transfer out.
    Send,
    /// Incoming transfer.
    Receive,
    /// Funding from an external source.
    Topup,
    /// Moving funds off the platform.
    Withdraw,
    /// Paying a merchant.
    Payment,
}

impl OperationClass {
    /// Returns `true` for classes that move money out of a wallet and
    /// therefore require full verification.
    pub fn moves_money_out(&self) -> bool {
        matches!(
            self,
            OperationClass::Send | OperationClass::Withdraw | OperationClass::Payment
        )
    }
}

impl fmt::Display for OperationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationClass::Send => f.write_str("send"),
            OperationClass::Receive => f.write_str("receive"),
            OperationClass::Topup => f.write_str("topup"),
            OperationClass::Withdraw => f.write_str("withdraw"),
            OperationClass::Payment => f.write_str("payment"),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Authorization denials. Each variant tells the caller exactly what to fix.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The user has no verification record at all. Denied everything.
    #[error("unknown user {user_id}: denied {operation}")]
    UnknownUser {
        /// The user with no record.
        user_id: String,
        /// The operation that was denied.
        operation: OperationClass,
    },

    /// The user's KYC status does not permit this operation class.
    /// `missing` lists the steps still to complete.
    #[error("user not verified for {operation}: status {status}, missing steps {missing:?}")]
    NotVerified {
        /// The operation that was denied.
        operation: OperationClass,
        /// The user's current KYC status.
        status: KycStatus,
        /// Verification steps still outstanding.
        missing: Vec<VerificationFlag>,
    },

    /// The current role's operation set does not include this class.
    #[error("role {role} may not perform {operation}")]
    RoleDenied {
        /// The role attached to the request.
        role: Role,
        /// The operation that was denied.
        operation: OperationClass,
    },
}

// ---------------------------------------------------------------------------
// VerificationGate
// ---------------------------------------------------------------------------

/// Stores verification records and answers authorization queries.
///
/// Writes come only from the external verification workflow (via
/// [`set_flag`](Self::set_flag) / [`reject`](Self::reject) /
/// [`reset`](Self::reset)); the ledger engine only calls
/// [`authorize`](Self::authorize).
#[derive(Debug, Default)]
pub struct VerificationGate {
    records: DashMap<String, VerificationRecord>,
}

impl VerificationGate {
    /// Creates an empty gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a gate from snapshot state.
    pub fn restore(records: Vec<VerificationRecord>) -> Self {
        let gate = Self::new();
        for record in records {
            gate.records.insert(record.user_id.clone(), record);
        }
        gate
    }

    // -----------------------------------------------------------------------
    // Writes (external verification workflow only)
    // -----------------------------------------------------------------------

    /// Sets one verification flag, creating the record on first touch,
    /// and returns the updated record.
    pub fn set_flag(
        &self,
        user_id: &str,
        flag: VerificationFlag,
        value: bool,
    ) -> VerificationRecord {
        let mut entry = self
            .records
            .entry(user_id.to_string())
            .or_insert_with(|| VerificationRecord::new(user_id));
        entry.set_flag(flag, value);
        let updated = entry.clone();
        drop(entry);

        tracing::info!(
            user = user_id,
            flag = %flag,
            value,
            status = %updated.kyc_status,
            "verification flag updated"
        );
        updated
    }

    /// Applies the explicit compliance rejection to a user.
    pub fn reject(&self, user_id: &str) -> VerificationRecord {
        let mut entry = self
            .records
            .entry(user_id.to_string())
            .or_insert_with(|| VerificationRecord::new(user_id));
        entry.reject();
        let updated = entry.clone();
        drop(entry);

        tracing::warn!(user = user_id, "verification rejected");
        updated
    }

    /// Clears a rejection (manual compliance action).
    pub fn reset(&self, user_id: &str) -> VerificationRecord {
        let mut entry = self
            .records
            .entry(user_id.to_string())
            .or_insert_with(|| VerificationRecord::new(user_id));
        entry.reset();
        let updated = entry.clone();
        drop(entry);

        tracing::info!(user = user_id, status = %updated.kyc_status, "verification reset");
        updated
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Returns a user's derived KYC status, if a record exists.
    pub fn status(&self, user_id: &str) -> Option<KycStatus> {
        self.records.get(user_id).map(|r| r.kyc_status)
    }

    /// Returns a snapshot of a user's full verification record.
    pub fn record(&self, user_id: &str) -> Option<VerificationRecord> {
        self.records.get(user_id).map(|r| r.value().clone())
    }

    /// The role matrix: which operation classes each role may request.
    pub fn role_permits(role: Role, operation: OperationClass) -> bool {
        match role {
            Role::Consumer => true,
            Role::Merchant => !matches!(operation, OperationClass::Send),
            Role::Agent => !matches!(operation, OperationClass::Payment),
        }
    }

    /// Answers whether `user_id`, acting as `role`, may perform `operation`.
    ///
    /// Fails closed: an unknown user is never authorized. Denials carry
    /// enough detail for the UI to route the user to the missing step.
    pub fn authorize(
        &self,
        user_id: &str,
        role: Role,
        operation: OperationClass,
    ) -> Result<(), AuthError> {
        if !Self::role_permits(role, operation) {
            tracing::debug!(user = user_id, role = %role, operation = %operation, "denied by role matrix");
            return Err(AuthError::RoleDenied { role, operation });
        }

        let record = self
            .records
            .get(user_id)
            .ok_or_else(|| AuthError::UnknownUser {
                user_id: user_id.to_string(),
                operation,
            })?;

        let status = record.kyc_status;
        let permitted = if operation.moves_money_out() {
            status == KycStatus::Verified
        } else {
            matches!(status, KycStatus::InProgress | KycStatus::Verified)
        };

        if permitted {
            Ok(())
        } else {
            let missing = record.missing_steps();
            drop(record);
            tracing::debug!(
                user = user_id,
                operation = %operation,
                status = %status,
                "denied by KYC policy"
            );
            Err(AuthError::NotVerified {
                operation,
                status,
                missing,
            })
        }
    }

    // -----------------------------------------------------------------------
    // Snapshot Export
    // -----------------------------------------------------------------------

    /// Exports all verification records for persistence.
    pub fn export(&self) -> Vec<VerificationRecord> {
        let mut records: Vec<VerificationRecord> =
            self.records.iter().map(|r| r.value().clone()).collect();
        records.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        records
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
