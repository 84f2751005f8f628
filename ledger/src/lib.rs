// Copyright (c) 2026 Vela Financial Technologies. MIT License.
// See LICENSE for details.

//! # VELA Wallet Ledger — Core Library
//!
//! This is the money core of the VELA platform: the one subsystem where a
//! mistake costs someone their balance. Everything around it — dashboards,
//! QR screens, translations, theming — is presentation. This crate is not.
//!
//! The core owns three things and exactly three things:
//!
//! - **Balances.** Every wallet's settled and pending balance, mutated only
//!   through the registry's atomic operations.
//! - **Transaction lifecycle.** Created `Pending`, settled exactly once into
//!   a terminal state, never resurrected.
//! - **Authorization.** Whether a given user, in a given role, with a given
//!   verification status, may move money right now.
//!
//! ## Architecture
//!
//! The crate is split into modules that mirror the actual concerns of a
//! wallet ledger:
//!
//! - **money** — Fixed-point amounts and the supported currency set. No
//!   floating point anywhere near a balance.
//! - **wallet** — Wallet records, the registry arena, and fund reservations.
//! - **verification** — Per-user KYC flags, the derived status machine, and
//!   the role/verification authorization gate.
//! - **engine** — The submission/settlement state machine, the idempotency
//!   index, and the error taxonomy callers see.
//! - **storage** — Persistent snapshots over sled. The engine itself never
//!   touches disk; the service decides when to persist.
//! - **config** — Constants and limits. One home for every magic number.
//!
//! ## Design Philosophy
//!
//! 1. A balance check and the mutation it guards are one atomic step, never
//!    check-then-act across two calls.
//! 2. Terminal states are immutable. Settling twice returns the first answer.
//! 3. Authorization fails closed. Unknown user, unknown operation: denied.
//! 4. If it touches money, it has tests. Plural.

pub mod config;
pub mod engine;
pub mod money;
pub mod storage;
pub mod verification;
pub mod wallet;
