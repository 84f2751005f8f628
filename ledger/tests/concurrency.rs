//! Concurrency tests for the wallet ledger core.
//!
//! The guarantees under test:
//!
//! - Two concurrent submissions with the same idempotency key produce
//!   exactly one transaction and exactly one balance effect.
//! - Concurrent reservations against one wallet never overdraw it — the
//!   admission check and the hold are one atomic step.
//! - Operations on disjoint wallets proceed independently.
//! - A settle/cancel race resolves to exactly one terminal state, with
//!   balances matching whichever transition won.
//!
//! Plain OS threads, no async runtime: the core is synchronous and must be
//! safe under raw parallelism.

use std::sync::Arc;
use std::thread;

use vela_ledger::engine::{
    EngineError, LedgerEngine, SettlementOutcome, SubmitRequest, TransactionKind,
    TransactionStatus,
};
use vela_ledger::money::{Amount, Currency};
use vela_ledger::verification::{Role, VerificationFlag};
use vela_ledger::wallet::{WalletId, WalletType};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn usd(s: &str) -> Amount {
    Amount::parse(s, Currency::USD).expect("valid test amount")
}

fn funded_wallet(engine: &LedgerEngine, user: &str, balance: &str) -> WalletId {
    for flag in VerificationFlag::ALL {
        engine.gate().set_flag(user, flag, true);
    }
    let wallet = engine
        .registry()
        .get_or_create(user, WalletType::Primary, Currency::USD)
        .expect("wallet creation");
    if balance != "0" {
        engine
            .registry()
            .credit(wallet.id, usd(balance))
            .expect("seed balance");
    }
    wallet.id
}

fn send(owner: &str, from: WalletId, to: WalletId, amount: &str, key: Option<&str>) -> SubmitRequest {
    SubmitRequest {
        owner: owner.to_string(),
        role: Role::Consumer,
        kind: TransactionKind::Send,
        amount: usd(amount),
        from_wallet: Some(from),
        to_wallet: Some(to),
        description: "concurrency test".to_string(),
        idempotency_key: key.map(String::from),
    }
}

// ---------------------------------------------------------------------------
// Idempotency Under Contention
// ---------------------------------------------------------------------------

#[test]
fn concurrent_same_key_submissions_create_one_transaction() {
    let engine = Arc::new(LedgerEngine::new());
    let a = funded_wallet(&engine, "alice", "1000.00");
    let b = funded_wallet(&engine, "bob", "0");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.submit(send("alice", a, b, "100.00", Some("k1"))))
        })
        .collect();

    let mut tx_ids = Vec::new();
    let mut in_flight = 0usize;
    for handle in handles {
        match handle.join().unwrap() {
            Ok(tx) => tx_ids.push(tx.id),
            Err(EngineError::DuplicateInFlight { .. }) => in_flight += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    // Every successful response names the same transaction; the racers
    // that lost the claim were told to retry.
    tx_ids.dedup();
    assert_eq!(tx_ids.len(), 1);
    assert_eq!(tx_ids.len() + in_flight, 8);
    assert_eq!(engine.transaction_count(), 1);

    // Exactly one balance effect.
    let wallet = engine.registry().wallet(a).unwrap();
    assert_eq!(wallet.pending_balance, 10_000);
    assert_eq!(wallet.balance, 100_000);
}

#[test]
fn losing_racers_get_the_original_on_retry() {
    let engine = Arc::new(LedgerEngine::new());
    let a = funded_wallet(&engine, "alice", "1000.00");
    let b = funded_wallet(&engine, "bob", "0");

    let first = engine.submit(send("alice", a, b, "50.00", Some("k1"))).unwrap();

    // A retry after the first submission completed is absorbed silently.
    let retry = engine.submit(send("alice", a, b, "50.00", Some("k1"))).unwrap();
    assert_eq!(retry.id, first.id);
    assert_eq!(engine.transaction_count(), 1);
}

// ---------------------------------------------------------------------------
// Reservation Atomicity
// ---------------------------------------------------------------------------

#[test]
fn concurrent_sends_never_overdraw_the_source() {
    let engine = Arc::new(LedgerEngine::new());
    // 1000.00 available; 20 threads each try to hold 200.00.
    let a = funded_wallet(&engine, "alice", "1000.00");
    let b = funded_wallet(&engine, "bob", "0");

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let key = format!("burst-{i}");
            thread::spawn(move || engine.submit(send("alice", a, b, "200.00", Some(&key))))
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let admitted: Vec<_> = results.iter().filter(|r| r.is_ok()).collect();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(EngineError::InsufficientFunds { .. })))
        .count();

    assert_eq!(admitted.len(), 5, "only five 200.00 holds fit in 1000.00");
    assert_eq!(rejected, 15);

    let wallet = engine.registry().wallet(a).unwrap();
    assert_eq!(wallet.pending_balance, 100_000);
    assert_eq!(wallet.available(), 0);
    assert_eq!(wallet.balance, 100_000);

    // Commit them all: the wallet drains to exactly zero, never below.
    for tx in engine.transactions_for("alice") {
        engine.settle(tx.id, SettlementOutcome::Commit).unwrap();
    }
    let wallet = engine.registry().wallet(a).unwrap();
    assert_eq!(wallet.balance, 0);
    assert_eq!(wallet.pending_balance, 0);
    assert_eq!(engine.registry().wallet(b).unwrap().balance, 100_000);
}

#[test]
fn disjoint_wallets_proceed_independently() {
    let engine = Arc::new(LedgerEngine::new());
    let users = ["u1", "u2", "u3", "u4"];
    let sink = funded_wallet(&engine, "sink", "0");

    let wallets: Vec<WalletId> = users
        .iter()
        .map(|u| funded_wallet(&engine, u, "100.00"))
        .collect();

    // Each thread hammers its own wallet; all must fully succeed.
    let handles: Vec<_> = users
        .iter()
        .zip(wallets.iter())
        .map(|(user, wallet)| {
            let engine = Arc::clone(&engine);
            let user = user.to_string();
            let wallet = *wallet;
            thread::spawn(move || {
                for _ in 0..10 {
                    let tx = engine
                        .submit(send(&user, wallet, sink, "10.00", None))
                        .expect("disjoint submission");
                    engine.settle(tx.id, SettlementOutcome::Commit).expect("settle");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for wallet in wallets {
        let w = engine.registry().wallet(wallet).unwrap();
        assert_eq!(w.balance, 0);
        assert_eq!(w.pending_balance, 0);
    }
    assert_eq!(engine.registry().wallet(sink).unwrap().balance, 400_000);
}

// ---------------------------------------------------------------------------
// Settle / Cancel Race
// ---------------------------------------------------------------------------

#[test]
fn settle_and_cancel_race_yields_one_terminal_state() {
    for _ in 0..20 {
        let engine = Arc::new(LedgerEngine::new());
        let a = funded_wallet(&engine, "alice", "100.00");
        let b = funded_wallet(&engine, "bob", "0");
        let tx = engine.submit(send("alice", a, b, "60.00", None)).unwrap();

        let settler = {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.settle(tx.id, SettlementOutcome::Commit))
        };
        let canceller = {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.cancel(tx.id))
        };
        let settle_result = settler.join().unwrap();
        let cancel_result = canceller.join().unwrap();

        let status = engine.transaction(tx.id).unwrap().status;
        let wallet_a = engine.registry().wallet(a).unwrap();
        let wallet_b = engine.registry().wallet(b).unwrap();

        match status {
            TransactionStatus::Completed => {
                // Settle won; cancel must have been rejected.
                assert!(matches!(
                    cancel_result,
                    Err(EngineError::AlreadySettled { .. })
                ));
                assert_eq!(wallet_a.balance, 4_000);
                assert_eq!(wallet_b.balance, 6_000);
            }
            TransactionStatus::Cancelled => {
                // Cancel won; settle observed the terminal state as a no-op.
                assert_eq!(
                    settle_result.unwrap().status,
                    TransactionStatus::Cancelled
                );
                assert_eq!(wallet_a.balance, 10_000);
                assert_eq!(wallet_b.balance, 0);
            }
            other => panic!("transaction left in non-terminal state {other}"),
        }
        // Either way, no hold survives.
        assert_eq!(wallet_a.pending_balance, 0);
    }
}
