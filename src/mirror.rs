//! An optimistic, locally held replica of one owner's ordered
//! transactions.
//!
//! The mirror is seeded from a full read and then kept in step by applying
//! each mutation response locally through the same
//! [ordering engine](crate::ordering) the server-side read path asserts
//! against, so the client never needs to refetch the list after a
//! mutation. It is an explicit state container: all mutation goes through
//! the pure [TransactionMirror::apply] reducer, never ambient globals.

use std::collections::HashSet;

use crate::{
    database_id::{OwnerId, TransactionId},
    ordering,
    transaction::{Transaction, TransactionPatch},
};

/// A mutation response echoed from the ledger service.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerEvent {
    /// A transaction was created.
    Created(Transaction),
    /// The transaction with `id` had `patch` applied to it.
    Updated {
        /// The stable ID of the updated transaction.
        id: TransactionId,
        /// The fields that changed.
        patch: TransactionPatch,
    },
    /// The listed transactions were deleted.
    Deleted(Vec<TransactionId>),
}

/// The locally held ordered copy of one owner's transactions.
///
/// Transactions are addressed by their stable ID; positions in the ordered
/// sequence are a derived, read-only view ([TransactionMirror::position_of]),
/// since indices shift whenever a concurrent insert or delete lands.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionMirror {
    owner_id: OwnerId,
    entries: Vec<Transaction>,
}

impl TransactionMirror {
    /// Seed a mirror from a full read of the owner's ordered transactions,
    /// i.e. the result of [crate::service::LedgerService::list].
    pub fn seed(owner_id: OwnerId, transactions: Vec<Transaction>) -> Self {
        debug_assert!(ordering::is_ordered(&transactions));

        Self {
            owner_id,
            entries: transactions,
        }
    }

    /// The owner this mirror replicates.
    pub fn owner_id(&self) -> OwnerId {
        self.owner_id
    }

    /// The ordered transactions, newest first.
    pub fn transactions(&self) -> &[Transaction] {
        &self.entries
    }

    /// The current position of `id` in the ordered sequence.
    pub fn position_of(&self, id: TransactionId) -> Option<usize> {
        self.entries
            .iter()
            .position(|transaction| transaction.id == id)
    }

    /// The number of transactions held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the mirror holds no transactions.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply one mutation response, returning the next state.
    ///
    /// Events whose target is already gone (a concurrent mutation won the
    /// race) leave the state unchanged; the next full read reconciles.
    pub fn apply(mut self, event: LedgerEvent) -> Self {
        match event {
            LedgerEvent::Created(transaction) => {
                if transaction.owner_id != self.owner_id {
                    tracing::warn!(
                        "ignoring created transaction {} owned by {}; this mirror replicates \
                         owner {}",
                        transaction.id,
                        transaction.owner_id,
                        self.owner_id
                    );
                    return self;
                }

                ordering::insert(&mut self.entries, transaction);
            }
            LedgerEvent::Updated { id, patch } => match self.position_of(id) {
                Some(index) => ordering::update_at(&mut self.entries, index, &patch),
                None => {
                    tracing::debug!("ignoring update for transaction {id} not in the mirror");
                }
            },
            LedgerEvent::Deleted(ids) => {
                let ids: HashSet<TransactionId> = ids.into_iter().collect();
                ordering::remove_ids(&mut self.entries, &ids);
            }
        }

        self
    }
}
