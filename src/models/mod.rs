//! Domain models for trips and expenses.
//!
//! Backend rows arrive loosely shaped (snake_case columns, numbers that
//! may be strings, timestamps that may be text or epoch millis). The
//! `*Row` types in this module parse and validate those shapes exactly
//! once, at the boundary; everything past it works with the strict
//! `Trip` / `Expense` types.

use thiserror::Error;

pub mod expense;
pub mod trip;

pub use expense::{Expense, ExpenseRow};
pub use trip::{Trip, TripRow};

/// Validation failure while converting a backend row to a domain type.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid trip date {value:?} for trip {trip_id}")]
    InvalidDate { trip_id: String, value: String },

    #[error("invalid amount {value} for expense {expense_id}")]
    InvalidAmount { expense_id: String, value: String },

    #[error("invalid timestamp {value} for expense {expense_id}")]
    InvalidTimestamp { expense_id: String, value: String },
}
