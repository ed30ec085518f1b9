//! Domain model for daily commitments and behavior settings.
//!
//! # Responsibility
//! - Define canonical data structures used by ledger, rules and store.
//!
//! # Invariants
//! - Every commitment is identified by its calendar date.
//! - Status is an enumerated variant; free-form strings never leave the store layer.

pub mod commitment;
pub mod settings;
