//! # Ledger Configuration & Constants
//!
//! Every magic number in the wallet core lives here. If you're hardcoding a
//! limit somewhere else, you're doing it wrong and you owe the team coffee.
//!
//! These values shape user-visible behaviour (what gets rejected, how long a
//! stuck idempotency key blocks retries), so changes here need a migration
//! note in the release log, not a drive-by commit.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Service Identity
// ---------------------------------------------------------------------------

/// Service name used in log targets, metric namespaces, and status payloads.
pub const SERVICE_NAME: &str = "vela-ledger";

/// Crate version string, assembled at compile time.
pub const LEDGER_VERSION: &str = env!("CARGO_PKG_VERSION");

// ---------------------------------------------------------------------------
// Submission Limits
// ---------------------------------------------------------------------------

/// Maximum length of a transaction description in bytes. Enough for a
/// statement line, not enough for your novel.
pub const MAX_DESCRIPTION_LENGTH: usize = 256;

/// Maximum length of a caller-supplied idempotency key in bytes.
/// UUIDs are 36 characters; 64 leaves room for prefixed schemes.
pub const MAX_IDEMPOTENCY_KEY_LENGTH: usize = 64;

// ---------------------------------------------------------------------------
// Idempotency
// ---------------------------------------------------------------------------

/// How long an in-flight idempotency claim blocks a retry of the same key.
///
/// A submission that claimed a key but never recorded a transaction (the
/// process died mid-flight) holds the key for at most this long; after that
/// the key is reclaimable and a retry proceeds as fresh. Submissions complete
/// in well under a second, so 30 seconds is already generous.
pub const IDEMPOTENCY_CLAIM_TTL: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// Interval between periodic state snapshots written by the service.
///
/// The engine is in-memory; the service persists a full snapshot on this
/// cadence and on shutdown. Shorter intervals narrow the replay window after
/// a crash at the cost of write amplification.
pub const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Network Defaults
// ---------------------------------------------------------------------------

/// Default REST API port for the ledger service.
pub const DEFAULT_API_PORT: u16 = 8460;
