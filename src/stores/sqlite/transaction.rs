//! Implements a SQLite backed transaction store.

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{Connection, params_from_iter, types::Value};

use crate::{
    Error,
    database_id::{OwnerId, TransactionId},
    stores::TransactionStore,
    transaction::{NewTransaction, Transaction, TransactionPatch, map_transaction_row},
};

const SELECT_COLUMNS: &str =
    "id, owner_id, amount, description, date, account_id, budget_category_id";

/// Stores transactions in a SQLite database.
///
/// Every statement predicates on `owner_id`, so a caller holding one
/// owner's ID can never observe or touch another owner's rows.
#[derive(Debug, Clone)]
pub struct SqliteTransactionStore {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteTransactionStore {
    /// Create a new store for the SQLite `connection`.
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.connection.lock().map_err(|_| Error::DatabaseLock)
    }
}

impl TransactionStore for SqliteTransactionStore {
    /// Retrieve the owner's transactions, already sorted.
    ///
    /// `id DESC` breaks date ties: IDs are assigned monotonically, so among
    /// equal dates the most recently created row sorts first, matching the
    /// ordering engine's insert rule.
    ///
    /// # Errors
    /// Returns an [Error::SqlError] if there is an SQL error.
    fn find_by_owner(&self, owner_id: OwnerId) -> Result<Vec<Transaction>, Error> {
        self.connection()?
            .prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM \"transaction\"
                 WHERE owner_id = :owner_id
                 ORDER BY date DESC, id DESC"
            ))?
            .query_map(&[(":owner_id", &owner_id)], map_transaction_row)?
            .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
            .collect()
    }

    /// Create a new transaction in the database.
    ///
    /// The amount is bound as its exact text form so no rounding can creep
    /// in between the caller and the row.
    ///
    /// # Errors
    /// Returns an [Error::SqlError] if there is an SQL error.
    fn create(
        &mut self,
        owner_id: OwnerId,
        new_transaction: NewTransaction,
    ) -> Result<Transaction, Error> {
        let connection = self.connection()?;

        let transaction = connection
            .prepare(&format!(
                "INSERT INTO \"transaction\"
                     (owner_id, amount, description, date, account_id, budget_category_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 RETURNING {SELECT_COLUMNS}"
            ))?
            .query_row(
                (
                    owner_id,
                    new_transaction.amount.to_string(),
                    &new_transaction.description,
                    new_transaction.date,
                    &new_transaction.account_id,
                    &new_transaction.budget_category_id,
                ),
                map_transaction_row,
            )?;

        Ok(transaction)
    }

    /// Create many transactions in one SQL transaction.
    ///
    /// A failure part way through rolls the whole batch back, so a crash or
    /// constraint error can never leave half a batch behind.
    ///
    /// # Errors
    /// Returns an [Error::SqlError] if any insert fails.
    fn create_many(
        &mut self,
        owner_id: OwnerId,
        new_transactions: Vec<NewTransaction>,
    ) -> Result<Vec<Transaction>, Error> {
        let connection = self.connection()?;

        let sql_transaction = connection.unchecked_transaction()?;
        let mut created = Vec::with_capacity(new_transactions.len());

        {
            // Prepare the insert statement once for reuse
            let mut statement = sql_transaction.prepare(&format!(
                "INSERT INTO \"transaction\"
                     (owner_id, amount, description, date, account_id, budget_category_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 RETURNING {SELECT_COLUMNS}"
            ))?;

            for new_transaction in new_transactions {
                let transaction = statement.query_row(
                    (
                        owner_id,
                        new_transaction.amount.to_string(),
                        &new_transaction.description,
                        new_transaction.date,
                        &new_transaction.account_id,
                        &new_transaction.budget_category_id,
                    ),
                    map_transaction_row,
                )?;

                created.push(transaction);
            }
        }

        sql_transaction.commit()?;

        Ok(created)
    }

    /// Apply a partial update to the row matching `(owner_id, id)`.
    ///
    /// The statement is generated from the patch's assignments, so only the
    /// supplied columns are written. An empty patch writes nothing but
    /// still probes for the row so callers can tell a no-op from a miss.
    ///
    /// # Errors
    /// Returns an [Error::SqlError] if there is an SQL error.
    fn update(
        &mut self,
        owner_id: OwnerId,
        id: TransactionId,
        patch: &TransactionPatch,
    ) -> Result<bool, Error> {
        let connection = self.connection()?;
        let assignments = patch.assignments();

        if assignments.is_empty() {
            let exists: bool = connection
                .prepare(
                    "SELECT EXISTS (
                         SELECT 1 FROM \"transaction\" WHERE owner_id = ?1 AND id = ?2
                     )",
                )?
                .query_row((owner_id, id), |row| row.get(0))?;

            return Ok(exists);
        }

        let set_clause = assignments
            .iter()
            .enumerate()
            .map(|(index, (column, _))| format!("{column} = ?{}", index + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let where_clause = format!(
            "owner_id = ?{} AND id = ?{}",
            assignments.len() + 1,
            assignments.len() + 2
        );

        let mut parameters: Vec<Value> =
            assignments.into_iter().map(|(_, value)| value).collect();
        parameters.push(Value::Integer(owner_id));
        parameters.push(Value::Integer(id));

        let rows_affected = connection.execute(
            &format!("UPDATE \"transaction\" SET {set_clause} WHERE {where_clause}"),
            params_from_iter(parameters),
        )?;

        Ok(rows_affected > 0)
    }

    /// Delete the given rows for `owner_id` in a single statement.
    ///
    /// IDs that do not exist, or belong to another owner, are skipped; the
    /// returned count says how many rows actually went away.
    ///
    /// # Errors
    /// Returns an [Error::SqlError] if there is an SQL error.
    fn delete_many(&mut self, owner_id: OwnerId, ids: &[TransactionId]) -> Result<usize, Error> {
        if ids.is_empty() {
            return Ok(0);
        }

        let connection = self.connection()?;

        let placeholders = (2..ids.len() + 2)
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");

        let mut parameters: Vec<Value> = Vec::with_capacity(ids.len() + 1);
        parameters.push(Value::Integer(owner_id));
        parameters.extend(ids.iter().map(|id| Value::Integer(*id)));

        let rows_affected = connection.execute(
            &format!("DELETE FROM \"transaction\" WHERE owner_id = ?1 AND id IN ({placeholders})"),
            params_from_iter(parameters),
        )?;

        Ok(rows_affected)
    }

    /// Get the number of transactions the owner has.
    ///
    /// # Errors
    /// Returns an [Error::SqlError] if there is an SQL error.
    fn count(&self, owner_id: OwnerId) -> Result<usize, Error> {
        self.connection()?
            .query_row(
                "SELECT COUNT(id) FROM \"transaction\" WHERE owner_id = :owner_id",
                &[(":owner_id", &owner_id)],
                |row| row.get::<_, i64>(0).map(|n| n as usize),
            )
            .map_err(Error::from)
    }
}
