//! # Verification Records
//!
//! One [`VerificationRecord`] per user, holding the three verification flags
//! (phone, documents, biometric) and the KYC status derived from them.
//!
//! ## Derivation
//!
//! ```text
//! rejected flag set        -> Rejected   (sticky until an explicit reset)
//! all three flags true     -> Verified
//! at least one flag true   -> InProgress
//! no flags true            -> Pending
//! ```
//!
//! The derived status is monotonic: once a user reaches `Verified`, a later
//! flag flip (say, a document re-check clearing the flag) does not demote
//! them — only the explicit rejection override does. Rejection is terminal
//! until the external compliance process calls
//! [`reset`](VerificationRecord::reset).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// VerificationFlag
// ---------------------------------------------------------------------------

/// The three verification steps a user completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationFlag {
    /// Phone number confirmed via OTP.
    Phone,
    /// Identity documents reviewed and accepted.
    Documents,
    /// Biometric (selfie/liveness) check passed.
    Biometric,
}

impl VerificationFlag {
    /// All flags, in the order the product presents them.
    pub const ALL: [VerificationFlag; 3] = [
        VerificationFlag::Phone,
        VerificationFlag::Documents,
        VerificationFlag::Biometric,
    ];

    /// Canonical lowercase name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationFlag::Phone => "phone",
            VerificationFlag::Documents => "documents",
            VerificationFlag::Biometric => "biometric",
        }
    }
}

impl fmt::Display for VerificationFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "phone" => Ok(VerificationFlag::Phone),
            "documents" => Ok(VerificationFlag::Documents),
            "biometric" => Ok(VerificationFlag::Biometric),
            other => Err(format!("unknown verification flag: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// KycStatus
// ---------------------------------------------------------------------------

/// Aggregate verification state derived from the three flags.
///
/// Ordered: `Pending < InProgress < Verified`. `Rejected` sits outside the
/// ladder — it is an override, not a rung.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    /// No verification step completed.
    Pending,
    /// Some, but not all, steps completed.
    InProgress,
    /// All three steps completed. Money movement unlocked.
    Verified,
    /// Explicitly rejected by compliance. Terminal until a manual reset.
    Rejected,
}

impl KycStatus {
    /// Position on the progress ladder, for monotonicity comparisons.
    /// `Rejected` is not on the ladder.
    fn rank(&self) -> u8 {
        match self {
            KycStatus::Pending => 0,
            KycStatus::InProgress => 1,
            KycStatus::Verified => 2,
            KycStatus::Rejected => 0,
        }
    }
}

impl fmt::Display for KycStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KycStatus::Pending => f.write_str("pending"),
            KycStatus::InProgress => f.write_str("in_progress"),
            KycStatus::Verified => f.write_str("verified"),
            KycStatus::Rejected => f.write_str("rejected"),
        }
    }
}

// ---------------------------------------------------------------------------
// VerificationRecord
// ---------------------------------------------------------------------------

/// Per-user verification state. One record per user, written only by the
/// external verification workflow, read by the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRecord {
    /// The user this record belongs to.
    pub user_id: String,
    /// Phone number confirmed.
    pub phone_verified: bool,
    /// Identity documents accepted.
    pub documents_verified: bool,
    /// Biometric check passed.
    pub biometric_verified: bool,
    /// Explicit compliance rejection. Overrides everything.
    pub rejected: bool,
    /// The derived aggregate status.
    pub kyc_status: KycStatus,
    /// Timestamp of the last flag change.
    pub updated_at: DateTime<Utc>,
}

impl VerificationRecord {
    /// Creates a fresh, fully unverified record.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            phone_verified: false,
            documents_verified: false,
            biometric_verified: false,
            rejected: false,
            kyc_status: KycStatus::Pending,
            updated_at: Utc::now(),
        }
    }

    /// Returns the value of one flag.
    pub fn flag(&self, flag: VerificationFlag) -> bool {
        match flag {
            VerificationFlag::Phone => self.phone_verified,
            VerificationFlag::Documents => self.documents_verified,
            VerificationFlag::Biometric => self.biometric_verified,
        }
    }

    /// Sets one flag and re-derives the status.
    pub fn set_flag(&mut self, flag: VerificationFlag, value: bool) {
        match flag {
            VerificationFlag::Phone => self.phone_verified = value,
            VerificationFlag::Documents => self.documents_verified = value,
            VerificationFlag::Biometric => self.biometric_verified = value,
        }
        self.rederive();
    }

    /// Applies the explicit compliance rejection. Terminal until
    /// [`reset`](Self::reset).
    pub fn reject(&mut self) {
        self.rejected = true;
        self.rederive();
    }

    /// Clears a rejection (manual compliance action) and re-derives the
    /// status from the flags as they stand.
    pub fn reset(&mut self) {
        self.rejected = false;
        // A reset re-opens the ladder from scratch; the monotonicity floor
        // does not survive a rejection episode.
        self.kyc_status = Self::derive(self.phone_verified, self.documents_verified, self.biometric_verified, false);
        self.updated_at = Utc::now();
    }

    /// The verification steps still missing, in presentation order.
    /// Empty for a fully verified user.
    pub fn missing_steps(&self) -> Vec<VerificationFlag> {
        VerificationFlag::ALL
            .iter()
            .copied()
            .filter(|f| !self.flag(*f))
            .collect()
    }

    /// Pure derivation from flag values.
    fn derive(phone: bool, documents: bool, biometric: bool, rejected: bool) -> KycStatus {
        if rejected {
            KycStatus::Rejected
        } else if phone && documents && biometric {
            KycStatus::Verified
        } else if phone || documents || biometric {
            KycStatus::InProgress
        } else {
            KycStatus::Pending
        }
    }

    /// Re-derives the status, honouring rejection stickiness and the
    /// monotonic ladder (the status never moves down, except through
    /// rejection).
    fn rederive(&mut self) {
        let derived = Self::derive(
            self.phone_verified,
            self.documents_verified,
            self.biometric_verified,
            self.rejected,
        );
        self.kyc_status = match (self.kyc_status, derived) {
            // Rejection overrides the ladder in both directions.
            (_, KycStatus::Rejected) => KycStatus::Rejected,
            (KycStatus::Rejected, _) => KycStatus::Rejected,
            // Otherwise: monotonic — keep whichever rung is higher.
            (current, next) if next.rank() >= current.rank() => next,
            (current, _) => current,
        };
        self.updated_at = Utc::now();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
