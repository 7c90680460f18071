//! Utility functions for locale-aware formatting and filename handling.

pub mod format;

// Re-export commonly used functions at module level
pub use format::{file_extension, format_amount_it, format_date_it, safe_filename, sanitize_comment};
