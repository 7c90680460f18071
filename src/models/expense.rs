use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::ModelError;

/// A single expense attached to a trip. Immutable once exported - the
/// export pipeline reads a snapshot and never writes back.
#[derive(Debug, Clone, PartialEq)]
pub struct Expense {
    pub id: String,
    /// Amount in EUR. Positive in this domain.
    pub amount: f64,
    /// Free-text comment; empty when the user left it blank.
    pub comment: String,
    /// Public fetchable URL of the receipt photo, if one was attached.
    pub photo_url: Option<String>,
    /// Backend storage path of the photo. Used for deletion on the
    /// backend side only; irrelevant to export.
    pub photo_path: Option<String>,
    /// When the receipt was captured.
    pub timestamp: DateTime<Utc>,
}

/// Raw expense row as returned by the backend REST surface.
///
/// The backend is loosely typed at the edges: `amount` arrives as a JSON
/// number or a numeric string depending on the column driver, and
/// `timestamp` as RFC 3339 text or epoch milliseconds. Those shapes are
/// resolved here, at the boundary, so nothing downstream ever sees them.
#[derive(Debug, Clone, Deserialize)]
pub struct ExpenseRow {
    pub id: String,
    pub amount: Value,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub photo_path: Option<String>,
    pub timestamp: Value,
}

impl ExpenseRow {
    /// Convert the raw row into the domain type, rejecting anything that
    /// is not a real amount or timestamp.
    pub fn into_expense(self) -> Result<Expense, ModelError> {
        let amount = match &self.amount {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|a| a.is_finite())
        .ok_or_else(|| ModelError::InvalidAmount {
            expense_id: self.id.clone(),
            value: self.amount.to_string(),
        })?;

        let timestamp = match &self.timestamp {
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Value::Number(n) => n
                .as_i64()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
            _ => None,
        }
        .ok_or_else(|| ModelError::InvalidTimestamp {
            expense_id: self.id.clone(),
            value: self.timestamp.to_string(),
        })?;

        Ok(Expense {
            id: self.id,
            amount,
            comment: self.comment.unwrap_or_default(),
            // An empty URL means "no photo" in old backend rows
            photo_url: self.photo_url.filter(|u| !u.is_empty()),
            photo_path: self.photo_path,
            timestamp,
        })
    }
}
