//! Utility functions for number, currency and date formatting.

pub mod format;

pub use format::{
    extract_number, format_currency, format_date, format_number, format_optional, format_percent,
    is_valid_month, parse_date, today, truncate,
};
