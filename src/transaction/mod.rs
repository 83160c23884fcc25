//! The transaction data model and the partial-update patch builder.

mod core;
mod patch;

pub use self::core::{NewTransaction, Transaction, create_transaction_table, map_transaction_row};
pub use self::patch::TransactionPatch;
