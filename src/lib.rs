//! Centavo keeps a user's financial transactions consistent across three
//! places that can each change on their own: the durable SQLite store, a
//! per-owner cached copy of the ordered list, and the in-memory mirror a
//! client holds so it can apply mutations optimistically without
//! refetching.
//!
//! The pieces, leaf first:
//!
//! - [transaction] — the `Transaction` model and the partial-update patch
//!   builder.
//! - [stores] — the durable store trait and its SQLite implementation.
//! - [cache] — the owner-scoped, TTL-bound list cache.
//! - [ordering] — the pure engine that keeps lists sorted by date,
//!   newest first.
//! - [service] — validation and orchestration: store writes, cache
//!   invalidation, normalized results.
//! - [mirror] — the client-side replica, updated through a pure reducer.
//!
//! The web layer (routing, sessions, rendering) lives elsewhere and calls
//! in through [service::LedgerService].

#![warn(missing_docs)]

use std::collections::BTreeMap;

pub mod cache;
pub mod config;
mod database_id;
pub mod db;
pub mod mirror;
pub mod ordering;
pub mod service;
pub mod stores;
pub mod transaction;

pub use database_id::{DatabaseId, OwnerId, TransactionId};
pub use db::initialize as initialize_db;

/// Field-keyed validation messages: one message per offending field.
pub type FieldErrors = BTreeMap<String, String>;

/// The errors that may occur in the ledger.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// Caller-supplied data failed validation.
    ///
    /// Carries one message per offending field. Resolved by the caller
    /// fixing the input, never by retrying.
    #[error("validation failed: {0:?}")]
    Validation(FieldErrors),

    /// The requested transaction(s) do not exist or are not owned by the
    /// caller.
    ///
    /// The two cases are indistinguishable on purpose: the ledger never
    /// reveals whether another owner's transaction exists.
    #[error("the requested transaction could not be found")]
    NotFound,

    /// Could not acquire the database lock.
    #[error("could not acquire the database lock")]
    DatabaseLock,

    /// An unhandled/unexpected SQL error.
    ///
    /// The details are for the server logs; clients only ever see an
    /// opaque internal error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

/// How a result is reported across the service boundary.
///
/// The web layer maps these onto its transport (HTTP status codes, alert
/// fragments); the ledger only decides which bucket a result falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The operation succeeded and has data to return.
    Success,
    /// The operation succeeded with nothing to return.
    NoContent,
    /// The input was rejected; the field map says why.
    InvalidInput,
    /// The target does not exist or is not owned by the caller.
    NotFound,
    /// Something unexpected failed; details are in the server logs only.
    Internal,
}

impl Error {
    /// The boundary status bucket for this error.
    pub fn status(&self) -> Status {
        match self {
            Error::Validation(_) => Status::InvalidInput,
            Error::NotFound => Status::NotFound,
            Error::DatabaseLock | Error::SqlError(_) => Status::Internal,
        }
    }
}
