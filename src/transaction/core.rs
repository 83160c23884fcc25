//! Defines the core data model for ledger transactions.

use rusqlite::{Connection, Row};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::database_id::{OwnerId, TransactionId};

/// An expense or income, i.e. an event where money was either spent or
/// earned.
///
/// Rows are created through [crate::stores::TransactionStore::create],
/// which assigns the ID. The ID and owner are immutable afterwards; every
/// other field can change through a [TransactionPatch](super::TransactionPatch).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The user that owns this transaction.
    pub owner_id: OwnerId,
    /// The amount of money spent or earned in this transaction.
    ///
    /// Positive values are income, negative values are expenses. Held as an
    /// exact decimal so amounts never pick up float rounding drift.
    pub amount: Decimal,
    /// A text description of what the transaction was for.
    pub description: Option<String>,
    /// When the transaction happened. The sole ordering key.
    pub date: Date,
    /// The account this transaction belongs to, if any.
    ///
    /// Accounts are owned by another subsystem; the ledger treats the ID as
    /// opaque and never stores an empty string where it means "none".
    pub account_id: Option<String>,
    /// The budget category this transaction counts against, if any. Same
    /// rules as [Transaction::account_id].
    pub budget_category_id: Option<String>,
}

/// The caller-supplied fields for creating a [Transaction].
///
/// The store assigns the ID, and the owner scopes the create call itself,
/// so a new transaction carries everything else.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewTransaction {
    /// The amount of money spent or earned.
    pub amount: Decimal,
    /// When the transaction happened.
    pub date: Date,
    /// A text description of what the transaction was for.
    #[serde(default)]
    pub description: Option<String>,
    /// The account the transaction belongs to.
    #[serde(default)]
    pub account_id: Option<String>,
    /// The budget category the transaction counts against.
    #[serde(default)]
    pub budget_category_id: Option<String>,
}

impl NewTransaction {
    /// Normalize the optional text fields: empty and whitespace-only
    /// strings become unset, everything else is trimmed.
    pub fn normalized(mut self) -> Self {
        self.description = normalize_optional_text(self.description);
        self.account_id = normalize_optional_text(self.account_id);
        self.budget_category_id = normalize_optional_text(self.budget_category_id);

        self
    }
}

/// Maps empty and whitespace-only strings to `None`, trimming the rest.
pub(crate) fn normalize_optional_text(value: Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned)
}

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL
/// error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id INTEGER NOT NULL,
                amount TEXT NOT NULL,
                description TEXT,
                date TEXT NOT NULL,
                account_id TEXT,
                budget_category_id TEXT
                )",
        (),
    )?;

    // Ensure the sequence starts at 1
    connection.execute(
        "INSERT OR IGNORE INTO sqlite_sequence (name, seq) VALUES ('transaction', 0)",
        (),
    )?;

    // Composite index backing the owner-scoped list query.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_owner_date
             ON \"transaction\"(owner_id, date DESC, id DESC);",
        (),
    )?;

    Ok(())
}

/// Map a database row to a [Transaction].
///
/// Expects the columns `id, owner_id, amount, description, date,
/// account_id, budget_category_id` in that order. The amount column holds
/// the decimal's text form and is parsed back exactly.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let amount: String = row.get(2)?;
    let amount = amount.parse::<Decimal>().map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(error))
    })?;

    Ok(Transaction {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        amount,
        description: row.get(3)?,
        date: row.get(4)?,
        account_id: row.get(5)?,
        budget_category_id: row.get(6)?,
    })
}
