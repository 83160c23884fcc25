//! Builds a minimal partial update from a sparse set of supplied fields.

use rusqlite::types::Value;
use rust_decimal::Decimal;
use time::Date;

use super::{Transaction, core::normalize_optional_text};

/// A sparse set of changes to apply to a stored [Transaction].
///
/// A field that was never set is absent from the patch and keeps its stored
/// value. The nullable fields use a nested `Option` so that "absent" and
/// "present but cleared" stay distinct: setting a reference to `None` (or
/// an empty string, which normalizes to the same thing) clears the stored
/// association.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionPatch {
    pub(crate) amount: Option<Decimal>,
    pub(crate) description: Option<Option<String>>,
    pub(crate) date: Option<Date>,
    pub(crate) account_id: Option<Option<String>>,
    pub(crate) budget_category_id: Option<Option<String>>,
}

impl TransactionPatch {
    /// Create a patch with no fields set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored amount.
    pub fn amount(mut self, amount: Decimal) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Replace the stored date.
    pub fn date(mut self, date: Date) -> Self {
        self.date = Some(date);
        self
    }

    /// Replace the stored description. `None` and empty strings clear it.
    pub fn description(mut self, description: Option<&str>) -> Self {
        self.description = Some(normalize_optional_text(description.map(ToOwned::to_owned)));
        self
    }

    /// Replace the stored account reference. `None` and empty strings clear
    /// the association.
    pub fn account_id(mut self, account_id: Option<&str>) -> Self {
        self.account_id = Some(normalize_optional_text(account_id.map(ToOwned::to_owned)));
        self
    }

    /// Replace the stored budget category reference. `None` and empty
    /// strings clear the association.
    pub fn budget_category_id(mut self, budget_category_id: Option<&str>) -> Self {
        self.budget_category_id =
            Some(normalize_optional_text(budget_category_id.map(ToOwned::to_owned)));
        self
    }

    /// Whether the patch sets no fields and would change nothing.
    pub fn is_empty(&self) -> bool {
        self.amount.is_none()
            && self.description.is_none()
            && self.date.is_none()
            && self.account_id.is_none()
            && self.budget_category_id.is_none()
    }

    /// The `(column, value)` pairs this patch assigns.
    ///
    /// Fields always appear in whitelist order (`amount`, `description`,
    /// `date`, `account_id`, `budget_category_id`) so the generated update
    /// statement is stable for any given set of supplied fields.
    pub fn assignments(&self) -> Vec<(&'static str, Value)> {
        let mut assignments = Vec::new();

        if let Some(amount) = self.amount {
            assignments.push(("amount", Value::Text(amount.to_string())));
        }

        if let Some(description) = &self.description {
            assignments.push(("description", text_or_null(description)));
        }

        if let Some(date) = self.date {
            assignments.push(("date", Value::Text(date.to_string())));
        }

        if let Some(account_id) = &self.account_id {
            assignments.push(("account_id", text_or_null(account_id)));
        }

        if let Some(budget_category_id) = &self.budget_category_id {
            assignments.push(("budget_category_id", text_or_null(budget_category_id)));
        }

        assignments
    }

    /// Merge the patch into an in-memory transaction.
    ///
    /// This is the client-side twin of the SQL update built from
    /// [TransactionPatch::assignments]; both must agree on what a patch
    /// means.
    pub fn apply_to(&self, transaction: &mut Transaction) {
        if let Some(amount) = self.amount {
            transaction.amount = amount;
        }

        if let Some(description) = &self.description {
            transaction.description = description.clone();
        }

        if let Some(date) = self.date {
            transaction.date = date;
        }

        if let Some(account_id) = &self.account_id {
            transaction.account_id = account_id.clone();
        }

        if let Some(budget_category_id) = &self.budget_category_id {
            transaction.budget_category_id = budget_category_id.clone();
        }
    }
}

fn text_or_null(value: &Option<String>) -> Value {
    match value {
        Some(text) => Value::Text(text.clone()),
        None => Value::Null,
    }
}
