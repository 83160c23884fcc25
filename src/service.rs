//! Validates mutation intents and keeps the durable store and the cache
//! coherent.
//!
//! Every request moves through the same states: validate the input, apply
//! the durable write, invalidate the owner's cached list, respond. The
//! cache is invalidated after *every* successful write; patching it in
//! place would have to re-derive the ordering, so the next read rebuilds
//! the entry from the store instead. Cache failures never fail the
//! surrounding operation: they are logged and degrade to misses.

use std::time::Duration;

use crate::{
    Error, FieldErrors,
    cache::{DEFAULT_CACHE_TTL, ListCache},
    config::LedgerConfig,
    database_id::{OwnerId, TransactionId},
    ordering,
    stores::TransactionStore,
    transaction::{NewTransaction, Transaction, TransactionPatch},
};

const MAX_REFERENCE_ID_LENGTH: usize = 64;

/// The mutation service for the ledger.
///
/// Stateless per request: the service holds no per-owner state beyond the
/// store and cache handles, so requests for different owners never contend
/// here, and two concurrent mutations against the same owner are not
/// serialized (last write wins or reports not found, depending on arrival
/// order).
#[derive(Debug)]
pub struct LedgerService<S, C> {
    store: S,
    cache: C,
    cache_ttl: Duration,
}

impl<S, C> LedgerService<S, C>
where
    S: TransactionStore,
    C: ListCache,
{
    /// Create a service over `store` and `cache` with the default cache
    /// TTL.
    pub fn new(store: S, cache: C) -> Self {
        Self {
            store,
            cache,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }

    /// Create a service configured by `config`.
    pub fn with_config(store: S, cache: C, config: &LedgerConfig) -> Self {
        Self {
            store,
            cache,
            cache_ttl: config.cache_ttl(),
        }
    }

    /// All of the owner's transactions, newest first.
    ///
    /// Reads through the cache: a fresh cached list is served as-is, and a
    /// miss falls back to the store and repopulates the cache. A cache
    /// failure of any kind, including a blob that no longer deserializes,
    /// degrades to a miss.
    ///
    /// # Errors
    /// Returns an [Error::SqlError] if the store read fails.
    pub fn list(&self, owner_id: OwnerId) -> Result<Vec<Transaction>, Error> {
        match self.cache.get(owner_id) {
            Ok(Some(payload)) => match serde_json::from_str(&payload) {
                Ok(transactions) => return Ok(transactions),
                Err(error) => {
                    tracing::warn!(
                        "discarding cached transaction list for owner {owner_id} that could not \
                         be deserialized: {error}"
                    );
                    self.invalidate_cache(owner_id);
                }
            },
            Ok(None) => {}
            Err(error) => {
                tracing::warn!(
                    "transaction cache read for owner {owner_id} failed, falling back to the \
                     store: {error}"
                );
            }
        }

        let transactions = self.store.find_by_owner(owner_id)?;
        debug_assert!(ordering::is_ordered(&transactions));

        match serde_json::to_string(&transactions) {
            Ok(payload) => {
                if let Err(error) = self.cache.set(owner_id, payload, self.cache_ttl) {
                    tracing::warn!(
                        "could not cache the transaction list for owner {owner_id}: {error}"
                    );
                }
            }
            Err(error) => {
                tracing::warn!(
                    "could not serialize the transaction list for owner {owner_id}: {error}"
                );
            }
        }

        Ok(transactions)
    }

    /// Validate and create a transaction, returning it with its assigned
    /// ID.
    ///
    /// # Errors
    /// Returns an [Error::Validation] carrying a field-keyed message map
    /// when the input fails validation; nothing is written in that case.
    pub fn create(
        &mut self,
        owner_id: OwnerId,
        new_transaction: NewTransaction,
    ) -> Result<Transaction, Error> {
        let new_transaction = new_transaction.normalized();
        validate_new_transaction(&new_transaction)?;

        let transaction = self.store.create(owner_id, new_transaction)?;
        self.invalidate_cache(owner_id);

        Ok(transaction)
    }

    /// Validate and create a batch of transactions atomically.
    ///
    /// # Errors
    /// Returns an [Error::Validation] if any entry fails validation, with
    /// each message keyed by `transactions[index].field`; no entry is
    /// written in that case.
    pub fn create_many(
        &mut self,
        owner_id: OwnerId,
        new_transactions: Vec<NewTransaction>,
    ) -> Result<Vec<Transaction>, Error> {
        let new_transactions: Vec<NewTransaction> = new_transactions
            .into_iter()
            .map(NewTransaction::normalized)
            .collect();

        let mut errors = FieldErrors::new();
        for (index, new_transaction) in new_transactions.iter().enumerate() {
            if let Err(Error::Validation(field_errors)) = validate_new_transaction(new_transaction)
            {
                for (field, message) in field_errors {
                    errors.insert(format!("transactions[{index}].{field}"), message);
                }
            }
        }

        if !errors.is_empty() {
            return Err(Error::Validation(errors));
        }

        let transactions = self.store.create_many(owner_id, new_transactions)?;
        self.invalidate_cache(owner_id);

        Ok(transactions)
    }

    /// Apply a partial update to the transaction matching `(owner_id, id)`.
    ///
    /// Only the supplied fields are validated and written. An update with
    /// no fields set after normalization succeeds without writing, and the
    /// cache is left alone since nothing changed.
    ///
    /// # Errors
    /// Returns an [Error::Validation] if a supplied field fails validation,
    /// or [Error::NotFound] when the row does not exist or belongs to
    /// another owner.
    pub fn update(
        &mut self,
        owner_id: OwnerId,
        id: TransactionId,
        patch: &TransactionPatch,
    ) -> Result<(), Error> {
        validate_patch(patch)?;

        let applied = self.store.update(owner_id, id, patch)?;
        if !applied {
            return Err(Error::NotFound);
        }

        if !patch.is_empty() {
            self.invalidate_cache(owner_id);
        }

        Ok(())
    }

    /// Delete the given transactions for `owner_id`, returning how many
    /// rows were deleted.
    ///
    /// An empty ID list is a validation error, not a no-op: a caller asking
    /// to delete nothing is presumed to be a client bug. This deliberately
    /// differs from update's empty no-op rule.
    ///
    /// # Errors
    /// Returns an [Error::Validation] for an empty ID list, or
    /// [Error::NotFound] when none of the IDs matched a row the owner has.
    pub fn delete_batch(
        &mut self,
        owner_id: OwnerId,
        ids: &[TransactionId],
    ) -> Result<usize, Error> {
        if ids.is_empty() {
            let mut errors = FieldErrors::new();
            errors.insert(
                "ids".to_owned(),
                "at least one transaction id is required".to_owned(),
            );
            return Err(Error::Validation(errors));
        }

        let deleted = self.store.delete_many(owner_id, ids)?;
        if deleted == 0 {
            return Err(Error::NotFound);
        }

        if deleted < ids.len() {
            tracing::debug!(
                "batch delete for owner {owner_id} matched {deleted} of {} ids",
                ids.len()
            );
        }

        self.invalidate_cache(owner_id);

        Ok(deleted)
    }

    /// The number of transactions the owner has.
    ///
    /// # Errors
    /// Returns an [Error::SqlError] if the store read fails.
    pub fn count(&self, owner_id: OwnerId) -> Result<usize, Error> {
        self.store.count(owner_id)
    }

    fn invalidate_cache(&self, owner_id: OwnerId) {
        if let Err(error) = self.cache.invalidate(owner_id) {
            tracing::warn!(
                "could not invalidate the cached transaction list for owner {owner_id}: {error}"
            );
        }
    }
}

fn validate_new_transaction(new_transaction: &NewTransaction) -> Result<(), Error> {
    let mut errors = FieldErrors::new();

    if let Some(account_id) = &new_transaction.account_id {
        validate_reference_id("account_id", account_id, &mut errors);
    }

    if let Some(budget_category_id) = &new_transaction.budget_category_id {
        validate_reference_id("budget_category_id", budget_category_id, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(errors))
    }
}

fn validate_patch(patch: &TransactionPatch) -> Result<(), Error> {
    let mut errors = FieldErrors::new();

    if let Some(Some(account_id)) = &patch.account_id {
        validate_reference_id("account_id", account_id, &mut errors);
    }

    if let Some(Some(budget_category_id)) = &patch.budget_category_id {
        validate_reference_id("budget_category_id", budget_category_id, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(errors))
    }
}

/// Reference IDs belong to other subsystems, which enforce ownership; this
/// layer only insists the value looks like an identifier before storing it.
fn validate_reference_id(field: &str, value: &str, errors: &mut FieldErrors) {
    let well_formed = value
        .chars()
        .all(|character| character.is_ascii_alphanumeric() || character == '-' || character == '_');

    if !well_formed || value.len() > MAX_REFERENCE_ID_LENGTH {
        errors.insert(field.to_owned(), format!("\"{value}\" is not a valid {field}"));
    }
}

#[cfg(test)]
mod ledger_service_tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use rusqlite::Connection;
    use time::macros::date;

    use crate::{
        Error, Status,
        cache::{CacheError, InMemoryListCache, ListCache},
        config::LedgerConfig,
        db::initialize,
        stores::TransactionStore,
        stores::sqlite::SqliteTransactionStore,
        transaction::{NewTransaction, TransactionPatch},
    };

    use super::LedgerService;

    /// A cache that fails every operation, for exercising degradation.
    struct FailingCache;

    impl ListCache for FailingCache {
        fn get(&self, _owner_id: i64) -> Result<Option<String>, CacheError> {
            Err(CacheError::Backend("cache offline".to_owned()))
        }

        fn set(
            &self,
            _owner_id: i64,
            _payload: String,
            _ttl: Duration,
        ) -> Result<(), CacheError> {
            Err(CacheError::Backend("cache offline".to_owned()))
        }

        fn invalidate(&self, _owner_id: i64) -> Result<(), CacheError> {
            Err(CacheError::Backend("cache offline".to_owned()))
        }
    }

    fn get_test_store() -> SqliteTransactionStore {
        let connection = Connection::open_in_memory().expect("could not open in-memory database");
        initialize(&connection, &LedgerConfig::default()).expect("could not initialize test DB");

        SqliteTransactionStore::new(Arc::new(Mutex::new(connection)))
    }

    fn get_test_service() -> LedgerService<SqliteTransactionStore, InMemoryListCache> {
        LedgerService::new(get_test_store(), InMemoryListCache::new())
    }

    fn new_transaction(amount: &str, date: time::Date) -> NewTransaction {
        NewTransaction {
            amount: amount.parse().expect("invalid test amount"),
            date,
            description: None,
            account_id: None,
            budget_category_id: None,
        }
    }

    #[test]
    fn create_then_list_round_trips_the_exact_amount() {
        let mut service = get_test_service();

        service
            .create(1, new_transaction("12.34", date!(2024 - 01 - 05)))
            .unwrap();

        let listed = service.list(1).unwrap();
        assert_eq!(listed[0].amount, "12.34".parse().unwrap());
        assert_eq!(listed[0].amount.to_string(), "12.34");
    }

    #[test]
    fn create_rejects_a_malformed_account_reference() {
        let mut service = get_test_service();

        let result = service.create(
            1,
            NewTransaction {
                account_id: Some("not a valid id!".to_owned()),
                ..new_transaction("1.00", date!(2024 - 01 - 05))
            },
        );

        match result {
            Err(Error::Validation(errors)) => {
                assert!(errors.contains_key("account_id"), "got {errors:?}");
                assert_eq!(errors.len(), 1);
            }
            other => panic!("want validation error, got {other:?}"),
        }
        assert_eq!(service.count(1).unwrap(), 0, "nothing may be written");
    }

    #[test]
    fn create_normalizes_empty_references_instead_of_rejecting_them() {
        let mut service = get_test_service();

        let created = service
            .create(
                1,
                NewTransaction {
                    account_id: Some(String::new()),
                    budget_category_id: Some("  ".to_owned()),
                    ..new_transaction("1.00", date!(2024 - 01 - 05))
                },
            )
            .unwrap();

        assert_eq!(created.account_id, None);
        assert_eq!(created.budget_category_id, None);
    }

    #[test]
    fn list_serves_the_cache_until_a_mutation_invalidates_it() {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection, &LedgerConfig::default()).unwrap();
        let connection = Arc::new(Mutex::new(connection));

        let mut service = LedgerService::new(
            SqliteTransactionStore::new(connection.clone()),
            InMemoryListCache::new(),
        );
        // A second handle writing to the same database behind the
        // service's back.
        let mut side_channel = SqliteTransactionStore::new(connection);

        service
            .create(1, new_transaction("1.00", date!(2024 - 01 - 05)))
            .unwrap();
        assert_eq!(service.list(1).unwrap().len(), 1);

        side_channel
            .create(1, new_transaction("2.00", date!(2024 - 01 - 06)))
            .unwrap();

        // The cached list is still served: the side channel never
        // invalidated it.
        assert_eq!(service.list(1).unwrap().len(), 1);

        // A mutation through the service invalidates, so the next read
        // sees both rows.
        service
            .create(1, new_transaction("3.00", date!(2024 - 01 - 07)))
            .unwrap();
        assert_eq!(service.list(1).unwrap().len(), 3);
    }

    #[test]
    fn list_never_serves_state_from_before_a_mutation() {
        let mut service = get_test_service();
        let created = service
            .create(1, new_transaction("1.00", date!(2024 - 01 - 05)))
            .unwrap();
        service.list(1).unwrap();

        let patch = TransactionPatch::new().amount("9.99".parse().unwrap());
        service.update(1, created.id, &patch).unwrap();
        assert_eq!(service.list(1).unwrap()[0].amount.to_string(), "9.99");

        service.delete_batch(1, &[created.id]).unwrap();
        assert!(service.list(1).unwrap().is_empty());
    }

    #[test]
    fn a_failing_cache_never_fails_reads_or_writes() {
        let mut service = LedgerService::new(get_test_store(), FailingCache);

        let created = service
            .create(1, new_transaction("5.00", date!(2024 - 01 - 05)))
            .unwrap();
        assert_eq!(service.list(1).unwrap().len(), 1);

        let patch = TransactionPatch::new().amount("6.00".parse().unwrap());
        service.update(1, created.id, &patch).unwrap();

        assert_eq!(service.delete_batch(1, &[created.id]).unwrap(), 1);
        assert!(service.list(1).unwrap().is_empty());
    }

    #[test]
    fn update_with_no_fields_is_a_successful_no_op() {
        let mut service = get_test_service();
        let created = service
            .create(1, new_transaction("1.00", date!(2024 - 01 - 05)))
            .unwrap();
        let before = service.list(1).unwrap();

        service.update(1, created.id, &TransactionPatch::new()).unwrap();

        assert_eq!(service.list(1).unwrap(), before);
    }

    #[test]
    fn update_rejects_a_malformed_reference_without_writing() {
        let mut service = get_test_service();
        let created = service
            .create(1, new_transaction("1.00", date!(2024 - 01 - 05)))
            .unwrap();

        let patch = TransactionPatch::new().budget_category_id(Some("no spaces allowed"));
        let result = service.update(1, created.id, &patch);

        match result {
            Err(Error::Validation(errors)) => {
                assert!(errors.contains_key("budget_category_id"), "got {errors:?}")
            }
            other => panic!("want validation error, got {other:?}"),
        }
        assert_eq!(service.list(1).unwrap()[0].budget_category_id, None);
    }

    #[test]
    fn update_reports_not_found_for_a_missing_transaction() {
        let mut service = get_test_service();

        let patch = TransactionPatch::new().amount("1.00".parse().unwrap());
        let result = service.update(1, 999, &patch);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn update_reports_not_found_for_another_owners_transaction() {
        let mut service = get_test_service();
        let theirs = service
            .create(2, new_transaction("1.00", date!(2024 - 01 - 05)))
            .unwrap();

        let patch = TransactionPatch::new().amount("9.99".parse().unwrap());
        let result = service.update(1, theirs.id, &patch);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn delete_batch_rejects_an_empty_id_list() {
        let mut service = get_test_service();

        let result = service.delete_batch(1, &[]);

        match result {
            Err(Error::Validation(errors)) => {
                assert!(errors.contains_key("ids"), "got {errors:?}");
            }
            other => panic!("want validation error, got {other:?}"),
        }
    }

    #[test]
    fn delete_batch_reports_not_found_when_nothing_matches() {
        let mut service = get_test_service();

        let result = service.delete_batch(1, &[41, 42]);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn delete_batch_succeeds_on_a_partial_match() {
        let mut service = get_test_service();
        let created = service
            .create(1, new_transaction("1.00", date!(2024 - 01 - 05)))
            .unwrap();

        let deleted = service.delete_batch(1, &[created.id, 999]).unwrap();

        assert_eq!(deleted, 1);
    }

    #[test]
    fn create_many_is_all_or_nothing_on_validation() {
        let mut service = get_test_service();

        let result = service.create_many(
            1,
            vec![
                new_transaction("1.00", date!(2024 - 01 - 05)),
                NewTransaction {
                    account_id: Some("bad id!".to_owned()),
                    ..new_transaction("2.00", date!(2024 - 01 - 06))
                },
            ],
        );

        match result {
            Err(Error::Validation(errors)) => {
                assert!(
                    errors.contains_key("transactions[1].account_id"),
                    "got {errors:?}"
                );
            }
            other => panic!("want validation error, got {other:?}"),
        }
        assert_eq!(service.count(1).unwrap(), 0);
    }

    #[test]
    fn create_many_lands_the_whole_batch() {
        let mut service = get_test_service();

        let created = service
            .create_many(
                1,
                vec![
                    new_transaction("1.00", date!(2024 - 01 - 05)),
                    new_transaction("2.00", date!(2024 - 01 - 10)),
                ],
            )
            .unwrap();

        assert_eq!(created.len(), 2);
        let listed = service.list(1).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].date, date!(2024 - 01 - 10));
    }

    #[test]
    fn errors_map_onto_the_boundary_status_buckets() {
        let mut service = get_test_service();

        let validation = service.delete_batch(1, &[]).unwrap_err();
        assert_eq!(validation.status(), Status::InvalidInput);

        let not_found = service.delete_batch(1, &[999]).unwrap_err();
        assert_eq!(not_found.status(), Status::NotFound);

        assert_eq!(Error::DatabaseLock.status(), Status::Internal);
    }

    #[test]
    fn worked_example_scenario() {
        let mut service = get_test_service();
        let owner = 1;

        let first = service
            .create(owner, new_transaction("100.00", date!(2024 - 01 - 05)))
            .unwrap();
        let second = service
            .create(owner, new_transaction("-50.00", date!(2024 - 01 - 10)))
            .unwrap();

        let listed = service.list(owner).unwrap();
        assert_eq!(listed[0].date, date!(2024 - 01 - 10));
        assert_eq!(listed[1].date, date!(2024 - 01 - 05));

        let patch = TransactionPatch::new().date(date!(2024 - 01 - 15));
        service.update(owner, first.id, &patch).unwrap();

        let listed = service.list(owner).unwrap();
        assert_eq!(listed[0].date, date!(2024 - 01 - 15));
        assert_eq!(listed[0].amount.to_string(), "100.00");
        assert_eq!(listed[1].date, date!(2024 - 01 - 10));
        assert_eq!(listed[1].amount.to_string(), "-50.00");

        service.delete_batch(owner, &[second.id]).unwrap();

        let listed = service.list(owner).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].date, date!(2024 - 01 - 15));
        assert_eq!(listed[0].amount.to_string(), "100.00");

        match service.delete_batch(owner, &[]) {
            Err(Error::Validation(errors)) => assert!(errors.contains_key("ids")),
            other => panic!("want validation error, got {other:?}"),
        }
    }
}
