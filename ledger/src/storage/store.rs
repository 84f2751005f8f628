//! # LedgerStore — Persistent Storage Engine
//!
//! The persistence layer for the wallet ledger, built on sled's embedded
//! key-value store. All on-disk data flows through this module.
//!
//! ## Tree Layout
//!
//! sled organizes data into named "trees" (analogous to column families in
//! RocksDB or tables in SQL). Each tree is an independent B+ tree with its
//! own keyspace:
//!
//! | Tree           | Key                    | Value                          |
//! |----------------|------------------------|--------------------------------|
//! | `wallets`      | wallet id (UTF-8)      | `bincode(Wallet)`              |
//! | `reservations` | reservation id (UTF-8) | `bincode(Reservation)`         |
//! | `transactions` | transaction id (UTF-8) | `bincode(StoredTransaction)`   |
//! | `verification` | user id (UTF-8)        | `bincode(VerificationRecord)`  |
//! | `metadata`     | key (UTF-8)            | value (bytes)                  |
//!
//! ## Snapshots
//!
//! [`persist_snapshot`](LedgerStore::persist_snapshot) replaces each tree's
//! contents with the snapshot's records, one atomic batch per tree, then
//! flushes. [`load_snapshot`](LedgerStore::load_snapshot) reads everything
//! back. The service calls the former periodically and on shutdown, and the
//! latter once at startup.

use sled::{Batch, Db, Tree};
use std::path::Path;

use crate::engine::engine::{LedgerSnapshot, StoredTransaction};
use crate::engine::transaction::TransactionId;
use crate::verification::record::VerificationRecord;
use crate::wallet::account::{Wallet, WalletId};
use crate::wallet::reservation::Reservation;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Shorthand result type for store operations.
pub type DbResult<T> = Result<T, DbError>;

// ---------------------------------------------------------------------------
// Metadata Keys
// ---------------------------------------------------------------------------

/// Well-known key in the `metadata` tree: RFC 3339 timestamp of the last
/// persisted snapshot.
const META_SNAPSHOT_AT: &[u8] = b"snapshot_taken_at";

// ---------------------------------------------------------------------------
// LedgerStore
// ---------------------------------------------------------------------------

/// Persistent storage engine for the wallet ledger.
///
/// Wraps a sled `Db` instance and exposes typed accessors plus the
/// snapshot API. All serialization uses bincode for compactness and speed.
///
/// # Thread Safety
///
/// sled is inherently thread-safe — trees support lock-free concurrent
/// reads and serialized writes. `LedgerStore` can be shared across threads
/// via `Arc<LedgerStore>` without external synchronization.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    /// The underlying sled database handle.
    db: Db,
    /// Wallet records by wallet id.
    wallets: Tree,
    /// Reservations by reservation id.
    reservations: Tree,
    /// Transactions (with reservation links) by transaction id.
    transactions: Tree,
    /// Verification records by user id.
    verification: Tree,
    /// Arbitrary key-value metadata (snapshot timestamp, etc.).
    metadata: Tree,
}

impl LedgerStore {
    /// Opens or creates a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Creates a temporary database that is cleaned up on drop.
    ///
    /// Ideal for tests — no filesystem side effects, no cleanup needed.
    pub fn open_temporary() -> DbResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    /// Internal constructor: opens named trees from an existing sled `Db`.
    fn from_db(db: Db) -> DbResult<Self> {
        let wallets = db.open_tree("wallets")?;
        let reservations = db.open_tree("reservations")?;
        let transactions = db.open_tree("transactions")?;
        let verification = db.open_tree("verification")?;
        let metadata = db.open_tree("metadata")?;
        Ok(Self {
            db,
            wallets,
            reservations,
            transactions,
            verification,
            metadata,
        })
    }

    // -----------------------------------------------------------------------
    // Typed Accessors
    // -----------------------------------------------------------------------

    /// Persists a single wallet record.
    pub fn put_wallet(&self, wallet: &Wallet) -> DbResult<()> {
        let bytes = encode(wallet)?;
        self.wallets.insert(wallet.id.to_string(), bytes)?;
        Ok(())
    }

    /// Reads a wallet record by id.
    pub fn get_wallet(&self, id: WalletId) -> DbResult<Option<Wallet>> {
        match self.wallets.get(id.to_string())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Reads all wallet records.
    pub fn wallets(&self) -> DbResult<Vec<Wallet>> {
        read_all(&self.wallets)
    }

    /// Persists a single transaction record.
    pub fn put_transaction(&self, stored: &StoredTransaction) -> DbResult<()> {
        let bytes = encode(stored)?;
        self.transactions
            .insert(stored.transaction.id.to_string(), bytes)?;
        Ok(())
    }

    /// Reads a transaction record by id.
    pub fn get_transaction(&self, id: TransactionId) -> DbResult<Option<StoredTransaction>> {
        match self.transactions.get(id.to_string())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Reads all transaction records.
    pub fn transactions(&self) -> DbResult<Vec<StoredTransaction>> {
        read_all(&self.transactions)
    }

    /// Persists a single verification record.
    pub fn put_verification(&self, record: &VerificationRecord) -> DbResult<()> {
        let bytes = encode(record)?;
        self.verification.insert(record.user_id.as_str(), bytes)?;
        Ok(())
    }

    /// Reads all verification records.
    pub fn verification_records(&self) -> DbResult<Vec<VerificationRecord>> {
        read_all(&self.verification)
    }

    /// Reads all reservation records.
    pub fn reservations(&self) -> DbResult<Vec<Reservation>> {
        read_all(&self.reservations)
    }

    /// RFC 3339 timestamp of the most recently persisted snapshot, if any.
    pub fn last_snapshot_at(&self) -> DbResult<Option<String>> {
        match self.metadata.get(META_SNAPSHOT_AT)? {
            Some(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            None => Ok(None),
        }
    }

    // -----------------------------------------------------------------------
    // Snapshot API
    // -----------------------------------------------------------------------

    /// Replaces the store's contents with a full engine snapshot.
    ///
    /// Each tree is rewritten with one atomic batch (clear + insert), so a
    /// tree is never observed half-written. The batches are applied tree by
    /// tree and followed by a flush to disk.
    pub fn persist_snapshot(&self, snapshot: &LedgerSnapshot) -> DbResult<()> {
        replace_tree(&self.wallets, snapshot.wallets.iter().map(|w| {
            (w.id.to_string(), encode(w))
        }))?;
        replace_tree(&self.reservations, snapshot.reservations.iter().map(|r| {
            (r.id.to_string(), encode(r))
        }))?;
        replace_tree(&self.transactions, snapshot.transactions.iter().map(|t| {
            (t.transaction.id.to_string(), encode(t))
        }))?;
        replace_tree(&self.verification, snapshot.verification.iter().map(|v| {
            (v.user_id.clone(), encode(v))
        }))?;

        self.metadata.insert(
            META_SNAPSHOT_AT,
            chrono::Utc::now().to_rfc3339().as_bytes(),
        )?;
        self.db.flush()?;

        tracing::debug!(
            wallets = snapshot.wallets.len(),
            transactions = snapshot.transactions.len(),
            "snapshot persisted"
        );
        Ok(())
    }

    /// Reads the full persisted state back into a snapshot.
    ///
    /// An empty (fresh) database yields an empty snapshot, which restores
    /// to an empty engine.
    pub fn load_snapshot(&self) -> DbResult<LedgerSnapshot> {
        Ok(LedgerSnapshot {
            wallets: self.wallets()?,
            reservations: self.reservations()?,
            transactions: self.transactions()?,
            verification: self.verification_records()?,
        })
    }

    /// Flushes all pending writes to disk.
    pub fn flush(&self) -> DbResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn encode<T: serde::Serialize>(value: &T) -> DbResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| DbError::Serialization(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> DbResult<T> {
    bincode::deserialize(bytes).map_err(|e| DbError::Serialization(e.to_string()))
}

fn read_all<T: serde::de::DeserializeOwned>(tree: &Tree) -> DbResult<Vec<T>> {
    let mut out = Vec::new();
    for entry in tree.iter() {
        let (_, bytes) = entry?;
        out.push(decode(&bytes)?);
    }
    Ok(out)
}

/// Clears a tree and repopulates it in one atomic batch.
fn replace_tree<K, I>(tree: &Tree, entries: I) -> DbResult<()>
where
    K: AsRef<[u8]>,
    I: Iterator<Item = (K, DbResult<Vec<u8>>)>,
{
    let mut batch = Batch::default();
    for key in tree.iter().keys() {
        batch.remove(key?);
    }
    for (key, bytes) in entries {
        batch.insert(key.as_ref(), bytes?);
    }
    tree.apply_batch(batch)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
