use chrono::NaiveDate;

/// Group digits in threes: `1234567` becomes `1,234,567`.
pub fn format_number(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if n < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// Amount in won with thousands separators.
pub fn format_currency(amount: i64) -> String {
    format!("{}원", format_number(amount))
}

/// Digits only, ignoring separators and units. `None` when there are none.
pub fn extract_number(s: &str) -> Option<i64> {
    let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let value: i64 = digits.parse().ok()?;
    if s.trim_start().starts_with('-') {
        Some(-value)
    } else {
        Some(value)
    }
}

pub fn format_percent(value: f64) -> String {
    if value.is_finite() {
        format!("{:.1}%", value)
    } else {
        "-".to_string()
    }
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format an optional string, returning a default if None
pub fn format_optional(value: &Option<String>, default: &str) -> String {
    value.as_deref().unwrap_or(default).to_string()
}

/// Strict `YYYY-MM-DD`.
pub fn parse_date(date: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

/// Strict `YYYY-MM`.
pub fn is_valid_month(month: &str) -> bool {
    month.len() == 7 && parse_date(&format!("{}-01", month)).is_some()
}

/// Today in local time as `YYYY-MM-DD`.
pub fn today() -> String {
    chrono::Local::now().date_naive().format("%Y-%m-%d").to_string()
}

/// Format a date string to a more readable format
pub fn format_date(date: &str) -> String {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(date) {
        dt.format("%b %d, %Y").to_string()
    } else if let Some(d) = parse_date(date) {
        d.format("%b %d, %Y").to_string()
    } else {
        date.to_string()
    }
}
