//! Display formatting helpers shared with other marketplace pages.

#[cfg(test)]
#[path = "format_test.rs"]
mod format_test;

/// Format an amount in colones: `₡1,234,567.89`.
#[must_use]
pub fn format_currency(amount: f64) -> String {
    let negative = amount < 0.0;
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = cents / 100;
    let fraction = cents % 100;

    let digits = whole.to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i).is_multiple_of(3) {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if negative { "-" } else { "" };
    format!("{sign}₡{grouped}.{fraction:02}")
}

/// Format an RFC 3339 timestamp as `DD/MM/YYYY`. `None` for anything that
/// does not start with a `YYYY-MM-DD` date.
#[must_use]
pub fn format_date(iso: &str) -> Option<String> {
    let date = iso.split('T').next()?;
    let mut parts = date.split('-');
    let year = parts.next()?;
    let month = parts.next()?;
    let day = parts.next()?;
    if year.len() != 4
        || month.len() != 2
        || day.len() != 2
        || [year, month, day]
            .iter()
            .any(|p| !p.chars().all(|c| c.is_ascii_digit()))
    {
        return None;
    }
    Some(format!("{day}/{month}/{year}"))
}

/// Group a validated phone number for display: `+506 8888 9999`.
///
/// Input that does not look like `+<digits>` is returned unchanged.
#[must_use]
pub fn format_phone(raw: &str) -> String {
    let stripped: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    let Some(digits) = stripped.strip_prefix('+') else {
        return raw.to_owned();
    };
    if !digits.chars().all(|c| c.is_ascii_digit()) || digits.len() < 8 {
        return raw.to_owned();
    }

    // Country code is whatever precedes the last eight digits.
    let (code, local) = digits.split_at(digits.len() - 8);
    let (head, tail) = local.split_at(4);
    if code.is_empty() {
        format!("+{head} {tail}")
    } else {
        format!("+{code} {head} {tail}")
    }
}
