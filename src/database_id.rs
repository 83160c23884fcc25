//! Database ID type definitions.

/// Alias for the integer type used for mapping to database IDs.
pub type DatabaseId = i64;

/// Identifies a transaction row in the ledger.
pub type TransactionId = DatabaseId;

/// Identifies the user that owns a set of ledger rows.
///
/// Owners live in the auth subsystem; the ledger only uses this as the
/// partition key for store queries and cache entries.
pub type OwnerId = DatabaseId;
