//! CLI walk-through of the wallet ledger lifecycle.
//!
//! Verifies a consumer, funds wallets through an agent cash-in, runs a
//! peer transfer with an idempotency key, replays it, and shows the
//! terminal balances.
//!
//! Run with:
//!   cargo run -p vela-ledger --example demo

use vela_ledger::engine::{LedgerEngine, SettlementOutcome, SubmitRequest, TransactionKind};
use vela_ledger::money::{Amount, Currency};
use vela_ledger::verification::{Role, VerificationFlag};
use vela_ledger::wallet::WalletType;

const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const CYAN: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

fn usd(s: &str) -> Amount {
    Amount::parse(s, Currency::USD).expect("valid amount")
}

fn main() {
    println!("{BOLD}VELA wallet ledger — lifecycle demo{RESET}\n");

    let engine = LedgerEngine::new();

    // 1. Verification: Alice completes all three steps; the agent too.
    println!("{CYAN}1. Verifying users{RESET}");
    for user in ["alice", "agent-7"] {
        for flag in VerificationFlag::ALL {
            engine.gate().set_flag(user, flag, true);
        }
        println!("   {user}: {}", engine.gate().status(user).expect("status"));
    }

    // 2. Wallets are created lazily.
    println!("\n{CYAN}2. Creating wallets{RESET}");
    let alice = engine
        .registry()
        .get_or_create("alice", WalletType::Primary, Currency::USD)
        .expect("wallet");
    let bob_gate = engine.gate();
    bob_gate.set_flag("bob", VerificationFlag::Phone, true);
    let bob = engine
        .registry()
        .get_or_create("bob", WalletType::Primary, Currency::USD)
        .expect("wallet");
    let float = engine
        .registry()
        .get_or_create("agent-7", WalletType::Primary, Currency::USD)
        .expect("wallet");
    engine.registry().credit(float.id, usd("5000.00")).expect("seed float");
    println!("   alice {DIM}{}{RESET}", alice.id);
    println!("   bob   {DIM}{}{RESET}", bob.id);

    // 3. Agent cash-in: float moves to Alice.
    println!("\n{CYAN}3. Agent cash-in of 250.00 USD{RESET}");
    let cash_in = engine
        .submit(SubmitRequest {
            owner: "agent-7".to_string(),
            role: Role::Agent,
            kind: TransactionKind::Send,
            amount: usd("250.00"),
            from_wallet: Some(float.id),
            to_wallet: Some(alice.id),
            description: "counter cash-in".to_string(),
            idempotency_key: Some("till-001".to_string()),
        })
        .expect("cash-in");
    engine
        .settle(cash_in.id, SettlementOutcome::Commit)
        .expect("settle cash-in");
    println!("   settled {DIM}{}{RESET}", cash_in.id);

    // 4. Peer transfer with an idempotency key, then a replay.
    println!("\n{CYAN}4. Alice sends 100.00 USD to Bob (key \"k1\"){RESET}");
    let request = SubmitRequest {
        owner: "alice".to_string(),
        role: Role::Consumer,
        kind: TransactionKind::Send,
        amount: usd("100.00"),
        from_wallet: Some(alice.id),
        to_wallet: Some(bob.id),
        description: "lunch".to_string(),
        idempotency_key: Some("k1".to_string()),
    };
    let tx = engine.submit(request.clone()).expect("submit");
    engine.settle(tx.id, SettlementOutcome::Commit).expect("settle");

    let replay = engine.submit(request).expect("replay");
    println!("   original {DIM}{}{RESET}", tx.id);
    println!(
        "   replay   {DIM}{}{RESET} {}",
        replay.id,
        if replay.id == tx.id {
            format!("{GREEN}(absorbed, no second effect){RESET}")
        } else {
            "DUPLICATED — this is a bug".to_string()
        }
    );

    // 5. Final balances.
    println!("\n{CYAN}5. Final balances{RESET}");
    for (name, id) in [("alice", alice.id), ("bob", bob.id), ("agent-7", float.id)] {
        let w = engine.registry().wallet(id).expect("wallet");
        println!(
            "   {name:<8} {GREEN}{}{RESET}",
            Amount::from_minor(w.balance, w.currency)
        );
    }
}
