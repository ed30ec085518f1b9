//! Use-case services over the store.
//!
//! # Responsibility
//! - Bind store, rule engine and ledger into caller-facing operations.
//! - Keep the clock behind a trait so date-sensitive rules are testable.

pub mod clock;
pub mod commitment_service;
