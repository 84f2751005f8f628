//! # Idempotency Index
//!
//! Maps a caller-supplied idempotency key to the transaction it produced,
//! so a retried submission has exactly one effect. Keys are scoped per
//! submitting owner — two users supplying the same key never collide.
//!
//! ## Claim Protocol
//!
//! A submission that carries a key runs a three-step protocol against the
//! index:
//!
//! 1. [`begin`](IdempotencyIndex::begin) — atomically claim the key. The
//!    first caller gets `Fresh` and proceeds; a caller whose key already
//!    produced a transaction gets `Existing(tx_id)` and short-circuits;
//!    a caller racing an unfinished claim gets `InFlight`.
//! 2. [`complete`](IdempotencyIndex::complete) — bind the claim to the
//!    produced transaction id.
//! 3. [`release`](IdempotencyIndex::release) — free the claim when the
//!    submission failed validation. A failed submission produced no
//!    transaction, so the key becomes retryable.
//!
//! A claim whose submission died before completing (process crash, panic)
//! would otherwise block the key forever. Claims therefore expire: `begin`
//! treats a claim older than the TTL as reclaimable and hands the key to
//! the new caller as `Fresh`.
//!
//! The claim step uses the map's entry API, so two concurrent `begin` calls
//! on the same key cannot both see `Fresh`.

use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::config::IDEMPOTENCY_CLAIM_TTL;
use crate::engine::transaction::TransactionId;

// ---------------------------------------------------------------------------
// Claim State
// ---------------------------------------------------------------------------

/// Internal per-key state.
#[derive(Debug, Clone, Copy)]
enum ClaimState {
    /// Claimed; the submission has not recorded a transaction yet.
    InFlight {
        /// When the claim was taken.
        claimed_at: Instant,
    },
    /// The submission completed and produced this transaction.
    Completed {
        /// The transaction the key maps to.
        tx_id: TransactionId,
    },
}

/// Result of [`IdempotencyIndex::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginOutcome {
    /// The key was unclaimed (or its stale claim expired); the caller now
    /// holds it and must `complete` or `release` it.
    Fresh,
    /// A prior submission with this key completed; here is its transaction.
    Existing(TransactionId),
    /// Another submission holds an unexpired claim on this key.
    InFlight {
        /// Age of the competing claim.
        age: Duration,
    },
}

// ---------------------------------------------------------------------------
// IdempotencyIndex
// ---------------------------------------------------------------------------

/// Atomic claim index for `(owner, key)` pairs.
#[derive(Debug)]
pub struct IdempotencyIndex {
    claims: DashMap<(String, String), ClaimState>,
    ttl: Duration,
}

impl Default for IdempotencyIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl IdempotencyIndex {
    /// Creates an index with the configured claim TTL.
    pub fn new() -> Self {
        Self::with_ttl(IDEMPOTENCY_CLAIM_TTL)
    }

    /// Creates an index with a custom claim TTL (for tests).
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            claims: DashMap::new(),
            ttl,
        }
    }

    /// Atomically claims `(owner, key)`, or reports what already holds it.
    ///
    /// The entry API locks the key's shard for the duration of the match,
    /// so exactly one of any number of concurrent callers observes `Fresh`.
    pub fn begin(&self, owner: &str, key: &str) -> BeginOutcome {
        let map_key = (owner.to_string(), key.to_string());
        match self.claims.entry(map_key) {
            Entry::Vacant(vacant) => {
                vacant.insert(ClaimState::InFlight {
                    claimed_at: Instant::now(),
                });
                BeginOutcome::Fresh
            }
            Entry::Occupied(mut occupied) => match *occupied.get() {
                ClaimState::Completed { tx_id } => BeginOutcome::Existing(tx_id),
                ClaimState::InFlight { claimed_at } => {
                    let age = claimed_at.elapsed();
                    if age >= self.ttl {
                        // The previous claimant died mid-flight. Reclaim.
                        occupied.insert(ClaimState::InFlight {
                            claimed_at: Instant::now(),
                        });
                        tracing::warn!(owner, key, age_ms = age.as_millis() as u64, "expired idempotency claim reclaimed");
                        BeginOutcome::Fresh
                    } else {
                        BeginOutcome::InFlight { age }
                    }
                }
            },
        }
    }

    /// Binds a held claim to the transaction it produced.
    pub fn complete(&self, owner: &str, key: &str, tx_id: TransactionId) {
        self.claims.insert(
            (owner.to_string(), key.to_string()),
            ClaimState::Completed { tx_id },
        );
    }

    /// Frees a held claim whose submission failed before producing a
    /// transaction. Completed claims are never released.
    pub fn release(&self, owner: &str, key: &str) {
        let map_key = (owner.to_string(), key.to_string());
        if let Entry::Occupied(occupied) = self.claims.entry(map_key) {
            if matches!(occupied.get(), ClaimState::InFlight { .. }) {
                occupied.remove();
            }
        }
    }

    /// Number of keys tracked (in-flight and completed).
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    /// Returns `true` if no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
