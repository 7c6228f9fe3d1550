//! The quantity ledger.
//!
//! A reducer-style state machine over `(item, quantity)` entries. Adds merge
//! into existing entries, removes take one unit at a time, and a dirty flag
//! tracks whether the store is behind memory.

mod action;
mod machine;
mod transition;

pub use action::Action;
pub use machine::{Ledger, LedgerConfig};
pub use transition::{apply_mutation, Mutation, Outcome, RemovePolicy, Transition};
