//! # Verification Module — KYC State & The Authorization Gate
//!
//! Everything the ledger knows about *who is allowed to do what* lives here,
//! collapsed into two explicit predicates instead of being scattered across
//! UI conditionals:
//!
//! ```text
//! record.rs — Per-user verification flags and the derived KYC status
//! gate.rs   — The gate: role matrix + KYC policy, answered per request
//! ```
//!
//! The external verification workflow is the only writer of flags; the
//! ledger engine is a pure reader through [`VerificationGate::authorize`].
//! The gate fails closed: an unknown user is never authorized for anything.

pub mod gate;
pub mod record;

pub use gate::{AuthError, OperationClass, Role, VerificationGate};
pub use record::{KycStatus, VerificationFlag, VerificationRecord};
