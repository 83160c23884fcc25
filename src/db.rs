/*! Sets up the SQLite database that backs the ledger. */

use rusqlite::{Connection, Transaction as SqlTransaction, TransactionBehavior};

use crate::{Error, config::LedgerConfig, transaction::create_transaction_table};

/// Create the ledger schema and configure the connection.
///
/// Safe to call on every startup: the schema is only created when missing.
/// Also installs the bounded busy timeout from `config`, so a locked
/// database fails the current request instead of blocking it indefinitely.
///
/// # Errors
/// Returns an [Error::SqlError] if the schema cannot be created.
pub fn initialize(connection: &Connection, config: &LedgerConfig) -> Result<(), Error> {
    connection.busy_timeout(config.store_busy_timeout())?;

    let sql_transaction =
        SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_transaction_table(&sql_transaction)?;

    sql_transaction.commit()?;

    Ok(())
}
