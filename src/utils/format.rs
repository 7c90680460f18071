use chrono::NaiveDate;

/// Format a trip date for display and CSV output.
/// The target locale writes dates as dd/mm/yyyy, not ISO.
pub fn format_date_it(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Format a monetary amount for CSV output: two decimal places with a
/// decimal comma (the target locale reserves the comma for decimals,
/// which is why the CSV delimiter is a semicolon).
/// Amounts are never negative in this domain; the absolute value guards
/// against bad backend rows slipping through.
pub fn format_amount_it(amount: f64) -> String {
    format!("{:.2}", amount.abs()).replace('.', ",")
}

/// Sanitize a free-text comment for a single CSV row.
/// Embedded newlines and semicolons would break the one-row-per-expense
/// shape, so each occurrence becomes a space. No other quoting is done.
pub fn sanitize_comment(comment: &str) -> String {
    comment
        .chars()
        .map(|c| match c {
            '\n' | '\r' | ';' => ' ',
            other => other,
        })
        .collect()
}

/// Extract the trailing file extension from a URL, lowercased and with a
/// leading dot (e.g. ".png"). Query string and fragment are ignored.
/// Returns ".jpg" when no plausible extension is present, since receipt
/// photos are captured as JPEG by default.
pub fn file_extension(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);

    let segment = path.rsplit('/').next().unwrap_or(path);

    if let Some((_, ext)) = segment.rsplit_once('.') {
        if !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return format!(".{}", ext.to_ascii_lowercase());
        }
    }

    ".jpg".to_string()
}

/// Scrub a download filename of path separators so free-text trip
/// locations cannot escape the download directory. Archive-internal entry
/// names are left verbatim; this only applies to names handed to the
/// filesystem.
pub fn safe_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_date_it() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert_eq!(format_date_it(date), "10/03/2024");
    }

    #[test]
    fn test_format_amount_it() {
        assert_eq!(format_amount_it(45.5), "45,50");
        assert_eq!(format_amount_it(12.0), "12,00");
        assert_eq!(format_amount_it(0.1), "0,10");
        // Negative amounts should never occur, but the formatter still
        // emits the absolute value rather than a stray minus sign
        assert_eq!(format_amount_it(-3.25), "3,25");
    }

    #[test]
    fn test_sanitize_comment() {
        assert_eq!(sanitize_comment("Pranzo"), "Pranzo");
        assert_eq!(sanitize_comment("cena;taxi"), "cena taxi");
        assert_eq!(sanitize_comment("riga1\nriga2\r\nriga3"), "riga1 riga2  riga3");
        assert_eq!(sanitize_comment(""), "");
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("https://x.example/a/b/photo.PNG"), ".png");
        assert_eq!(file_extension("https://x.example/a/photo.jpeg?token=abc"), ".jpeg");
        assert_eq!(file_extension("https://x.example/a/photo"), ".jpg");
        assert_eq!(file_extension("https://x.example/a.b/photo"), ".jpg");
        // Extensions longer than 5 chars are storage noise, not real types
        assert_eq!(file_extension("https://x.example/photo.abcdef"), ".jpg");
    }

    #[test]
    fn test_safe_filename() {
        assert_eq!(
            safe_filename("trasferta_Milano_2024-03-10.zip"),
            "trasferta_Milano_2024-03-10.zip"
        );
        assert_eq!(
            safe_filename("trasferta_A/B_2024-03-10.zip"),
            "trasferta_A_B_2024-03-10.zip"
        );
    }
}
