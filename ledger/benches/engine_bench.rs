//! Criterion benchmarks for the hot paths of the ledger core:
//! reservation admission, full submit/settle round-trips, and idempotent
//! replay lookups.
//!
//! Run with: `cargo bench -p vela-ledger`

use criterion::{criterion_group, criterion_main, Criterion};

use vela_ledger::engine::{LedgerEngine, SettlementOutcome, SubmitRequest, TransactionKind};
use vela_ledger::money::{Amount, Currency};
use vela_ledger::verification::{Role, VerificationFlag};
use vela_ledger::wallet::{SettleOutcome, WalletId, WalletType};

fn setup_engine() -> (LedgerEngine, WalletId, WalletId) {
    let engine = LedgerEngine::new();
    for user in ["alice", "bob"] {
        for flag in VerificationFlag::ALL {
            engine.gate().set_flag(user, flag, true);
        }
    }
    let a = engine
        .registry()
        .get_or_create("alice", WalletType::Primary, Currency::USD)
        .expect("wallet")
        .id;
    let b = engine
        .registry()
        .get_or_create("bob", WalletType::Primary, Currency::USD)
        .expect("wallet")
        .id;
    engine
        .registry()
        .credit(a, Amount::from_minor(u64::MAX / 2, Currency::USD))
        .expect("seed");
    (engine, a, b)
}

fn send_request(from: WalletId, to: WalletId, key: Option<String>) -> SubmitRequest {
    SubmitRequest {
        owner: "alice".to_string(),
        role: Role::Consumer,
        kind: TransactionKind::Send,
        amount: Amount::from_minor(1_000, Currency::USD),
        from_wallet: Some(from),
        to_wallet: Some(to),
        description: "bench".to_string(),
        idempotency_key: key,
    }
}

fn bench_reserve_settle(c: &mut Criterion) {
    let (engine, a, _) = setup_engine();
    let amount = Amount::from_minor(1_000, Currency::USD);

    c.bench_function("registry_reserve_commit", |bencher| {
        bencher.iter(|| {
            let res = engine.registry().reserve(a, amount).expect("reserve");
            engine
                .registry()
                .settle(res, SettleOutcome::Release)
                .expect("settle");
        })
    });
}

fn bench_submit_settle(c: &mut Criterion) {
    let (engine, a, b) = setup_engine();

    c.bench_function("engine_submit_commit", |bencher| {
        bencher.iter(|| {
            let tx = engine.submit(send_request(a, b, None)).expect("submit");
            engine
                .settle(tx.id, SettlementOutcome::Commit)
                .expect("settle");
        })
    });
}

fn bench_idempotent_replay(c: &mut Criterion) {
    let (engine, a, b) = setup_engine();
    let request = send_request(a, b, Some("bench-key".to_string()));
    engine.submit(request.clone()).expect("first submission");

    c.bench_function("engine_idempotent_replay", |bencher| {
        bencher.iter(|| engine.submit(request.clone()).expect("replay"))
    });
}

criterion_group!(
    benches,
    bench_reserve_settle,
    bench_submit_settle,
    bench_idempotent_replay
);
criterion_main!(benches);
