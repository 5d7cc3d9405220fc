//! Conversion between cents and the money strings shown to players

/// Render cents as `"1234,05€"`.
pub fn format_money(cents: i64, currency: &str) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{},{:02}{}", sign, abs / 100, abs % 100, currency)
}

/// Parse a non-negative amount such as `"12"`, `"12,50"`, `"12.5"` or
/// `"12,50€"` into cents.
pub fn parse_money(input: &str) -> Option<i64> {
    let trimmed = input.trim().trim_end_matches('€').trim_end();
    let (whole, fraction) = match trimmed.split_once([',', '.']) {
        Some((whole, fraction)) => (whole, fraction),
        None => (trimmed, ""),
    };

    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if fraction.len() > 2 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let units: i64 = whole.parse().ok()?;
    let cents = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().ok()? * 10,
        _ => fraction.parse::<i64>().ok()?,
    };

    units.checked_mul(100)?.checked_add(cents)
}
