//! CSV summary builder for trip exports.

use crate::models::Trip;
use crate::utils::{format_amount_it, format_date_it, sanitize_comment};

/// Header row. The delimiter is a semicolon, not a comma: the target
/// locale uses the comma as decimal separator.
const CSV_HEADER: &str = "Luogo;Data;Importo;Descrizione";

/// Build the spreadsheet-importable summary: the header row plus one row
/// per expense across all trips, in the order trips and expenses were
/// supplied. No network access happens here.
pub fn build_csv(trips: &[Trip]) -> String {
    let mut csv = String::from(CSV_HEADER);
    csv.push('\n');

    for trip in trips {
        for expense in &trip.expenses {
            csv.push_str(&format!(
                "{};{};{};{}\n",
                trip.location,
                format_date_it(trip.date),
                format_amount_it(expense.amount),
                sanitize_comment(&expense.comment),
            ));
        }
    }

    csv
}
