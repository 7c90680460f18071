use chrono::NaiveDate;
use serde::Deserialize;

use super::{Expense, ExpenseRow, ModelError};
use crate::utils::format_date_it;

/// A business trip: one location on one calendar date, with its expenses
/// in insertion order. Ownership is enforced by the backend's row-level
/// security; by the time a `Trip` exists here it already belongs to the
/// authenticated user.
#[derive(Debug, Clone, PartialEq)]
pub struct Trip {
    pub id: String,
    pub location: String,
    /// Calendar date, no time component.
    pub date: NaiveDate,
    pub expenses: Vec<Expense>,
}

impl Trip {
    /// Sum of all expense amounts, for the summary listing.
    pub fn total(&self) -> f64 {
        self.expenses.iter().map(|e| e.amount).sum()
    }

    /// Locale display form of the trip date (dd/mm/yyyy).
    pub fn formatted_date(&self) -> String {
        format_date_it(self.date)
    }

    /// Archive folder for this trip's receipt photos: `<date>__<location>`
    /// with the date in ISO form. Lets a multi-trip export keep receipts
    /// attributable to their trip.
    pub fn folder_name(&self) -> String {
        format!("{}__{}", self.date, self.location)
    }

    /// Download filename for a single-trip archive.
    pub fn archive_filename(&self) -> String {
        format!("trasferta_{}_{}.zip", self.location, self.date)
    }
}

/// Raw trip row from the backend, with its expense rows nested the way
/// the REST query returns them.
#[derive(Debug, Clone, Deserialize)]
pub struct TripRow {
    pub id: String,
    pub location: String,
    /// ISO date string (yyyy-mm-dd).
    pub date: String,
    #[serde(default)]
    pub expenses: Vec<ExpenseRow>,
}

impl TripRow {
    pub fn into_trip(self) -> Result<Trip, ModelError> {
        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").map_err(|_| {
            ModelError::InvalidDate {
                trip_id: self.id.clone(),
                value: self.date.clone(),
            }
        })?;

        let expenses = self
            .expenses
            .into_iter()
            .map(ExpenseRow::into_expense)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Trip {
            id: self.id,
            location: self.location,
            date,
            expenses,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_conversion() {
        let json = r#"{
            "id": "t1",
            "location": "Milano",
            "date": "2024-03-10",
            "expenses": [
                {"id":"e1","amount":45.5,"comment":"Pranzo",
                 "photo_url":"https://x.example/e1.jpg","timestamp":1710070200000}
            ]
        }"#;
        let row: TripRow = serde_json::from_str(json).unwrap();
        let trip = row.into_trip().unwrap();

        assert_eq!(trip.location, "Milano");
        assert_eq!(trip.formatted_date(), "10/03/2024");
        assert_eq!(trip.expenses.len(), 1);
        assert_eq!(trip.total(), 45.5);
    }

    #[test]
    fn test_archive_names() {
        let trip = Trip {
            id: "t1".into(),
            location: "Milano".into(),
            date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            expenses: vec![],
        };
        assert_eq!(trip.folder_name(), "2024-03-10__Milano");
        assert_eq!(trip.archive_filename(), "trasferta_Milano_2024-03-10.zip");
    }

    #[test]
    fn test_bad_date_rejected() {
        let row: TripRow = serde_json::from_str(
            r#"{"id":"t2","location":"Roma","date":"10/03/2024","expenses":[]}"#,
        )
        .unwrap();
        assert!(matches!(
            row.into_trip(),
            Err(ModelError::InvalidDate { .. })
        ));
    }

    #[test]
    fn test_missing_expenses_defaults_empty() {
        let row: TripRow =
            serde_json::from_str(r#"{"id":"t3","location":"Roma","date":"2024-04-01"}"#).unwrap();
        let trip = row.into_trip().unwrap();
        assert!(trip.expenses.is_empty());
    }
}
