//! Pure Add/Remove transitions over ledger state.

use crate::error::{Result, StoreError};
use crate::types::{ItemId, LedgerState, LineItem};

/// How `Remove` of an item that isn't held treats the dirty flag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RemovePolicy {
    /// Nothing changes, dirty included.
    #[default]
    Strict,
    /// Entries stay the same but the ledger is marked dirty anyway, forcing
    /// the next flush to rewrite them.
    MarkDirty,
}

/// An in-memory change to the entries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mutation {
    Add { item_id: ItemId, quantity: u32 },
    Remove { item_id: ItemId },
}

/// Whether a transition altered the state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Changed,
    Unchanged,
}

impl Outcome {
    pub fn is_changed(self) -> bool {
        self == Outcome::Changed
    }
}

/// Result of applying a mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub state: LedgerState,
    pub outcome: Outcome,
}

/// Apply a mutation, producing the next state.
///
/// Add merges into an existing entry (keeping its position) or appends.
/// Remove takes exactly one unit and drops the entry when it reaches zero.
/// On error the input state is left as it was.
pub fn apply_mutation(
    state: &LedgerState,
    mutation: Mutation,
    policy: RemovePolicy,
) -> Result<Transition> {
    let mut next = state.clone();

    match mutation {
        Mutation::Add { item_id, quantity } => {
            if quantity == 0 {
                return Err(StoreError::InvalidQuantity { item_id, quantity });
            }

            match next.position(&item_id) {
                Some(idx) => {
                    let entry = &mut next.entries[idx];
                    entry.quantity = entry
                        .quantity
                        .checked_add(quantity)
                        .ok_or(StoreError::QuantityOverflow(item_id))?;
                }
                None => next.entries.push(LineItem { item_id, quantity }),
            }
            next.dirty = true;
        }

        Mutation::Remove { item_id } => match next.position(&item_id) {
            Some(idx) => {
                if next.entries[idx].quantity > 1 {
                    next.entries[idx].quantity -= 1;
                } else {
                    next.entries.remove(idx);
                }
                next.dirty = true;
            }
            None => {
                if policy == RemovePolicy::MarkDirty {
                    next.dirty = true;
                }
            }
        },
    }

    let outcome = if next == *state {
        Outcome::Unchanged
    } else {
        Outcome::Changed
    };

    Ok(Transition {
        state: next,
        outcome,
    })
}
