//! The ordering engine: keeps a transaction sequence sorted by date,
//! newest first.
//!
//! Both the client [mirror](crate::mirror) and the server-side read path go
//! through this one module so the two orderings can never drift apart. The
//! durable store produces the same order in SQL (`ORDER BY date DESC, id
//! DESC`); the equivalence is pinned by a test in the SQLite store.

use std::collections::HashSet;

use crate::{
    database_id::TransactionId,
    transaction::{Transaction, TransactionPatch},
};

/// Insert `transaction` in order.
///
/// Scans from the head and inserts before the first element whose date is
/// on or before the newcomer's, appending at the tail when every element is
/// newer. Among elements sharing a date the newcomer therefore lands first:
/// ties order by reverse insertion order.
pub fn insert(entries: &mut Vec<Transaction>, transaction: Transaction) {
    let position = entries
        .iter()
        .position(|existing| existing.date <= transaction.date)
        .unwrap_or(entries.len());

    entries.insert(position, transaction);
}

/// Merge `patch` into the element at `index`.
///
/// When the patch changes the date, the element is pulled out and
/// reinserted so it lands in its new position, taking the fresh-insert
/// tie-break among equal dates. Otherwise it is replaced in place and its
/// position is untouched.
///
/// # Panics
/// Panics if `index` is out of bounds.
pub fn update_at(entries: &mut Vec<Transaction>, index: usize, patch: &TransactionPatch) {
    let original_date = entries[index].date;
    patch.apply_to(&mut entries[index]);

    if entries[index].date != original_date {
        let transaction = entries.remove(index);
        insert(entries, transaction);
    }
}

/// Remove and return the element at `index`.
///
/// # Panics
/// Panics if `index` is out of bounds.
pub fn remove_at(entries: &mut Vec<Transaction>, index: usize) -> Transaction {
    entries.remove(index)
}

/// Remove every element whose ID is in `ids`.
///
/// The retained sequence is computed in one pass. Removing positions one at
/// a time would invalidate the later indices after each removal.
pub fn remove_ids(entries: &mut Vec<Transaction>, ids: &HashSet<TransactionId>) {
    entries.retain(|transaction| !ids.contains(&transaction.id));
}

/// Whether the sequence is sorted by date descending.
pub fn is_ordered(entries: &[Transaction]) -> bool {
    entries.windows(2).all(|pair| pair[0].date >= pair[1].date)
}
