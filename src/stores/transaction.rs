//! Defines the transaction store trait.

use crate::{
    Error,
    database_id::{OwnerId, TransactionId},
    transaction::{NewTransaction, Transaction, TransactionPatch},
};

/// Handles durable storage of ledger transactions.
///
/// The store is the source of truth. Every operation is scoped by the
/// owning user: implementations must never let one owner read or mutate
/// another owner's rows.
pub trait TransactionStore {
    /// All of `owner_id`'s transactions, sorted by date descending.
    ///
    /// Transactions sharing a date come back most recently created first,
    /// matching [crate::ordering::insert].
    fn find_by_owner(&self, owner_id: OwnerId) -> Result<Vec<Transaction>, Error>;

    /// Insert a full record and return it with its assigned ID.
    ///
    /// Input is assumed to be validated and normalized by the caller; this
    /// layer fails only on I/O or constraint failure.
    fn create(
        &mut self,
        owner_id: OwnerId,
        new_transaction: NewTransaction,
    ) -> Result<Transaction, Error>;

    /// Insert many records atomically: either all land or none do.
    fn create_many(
        &mut self,
        owner_id: OwnerId,
        new_transactions: Vec<NewTransaction>,
    ) -> Result<Vec<Transaction>, Error>;

    /// Apply the fields present in `patch` to the row matching
    /// `(owner_id, id)`.
    ///
    /// Returns `false` when no row matched, signalling not found or not
    /// owned. An empty patch is a no-op success against an existing row.
    fn update(
        &mut self,
        owner_id: OwnerId,
        id: TransactionId,
        patch: &TransactionPatch,
    ) -> Result<bool, Error>;

    /// Delete every row in `ids` owned by `owner_id` in one atomic
    /// operation, returning how many rows were actually deleted.
    fn delete_many(&mut self, owner_id: OwnerId, ids: &[TransactionId]) -> Result<usize, Error>;

    /// The number of transactions `owner_id` has.
    fn count(&self, owner_id: OwnerId) -> Result<usize, Error>;
}
