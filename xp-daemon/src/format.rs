//! Display helpers for handles and XP amounts.

use bigdecimal::{BigDecimal, RoundingMode};

/// Strip surrounding whitespace and leading `@`s; `None` if nothing is left.
pub fn sanitize_handle(raw: &str) -> Option<String> {
    let normalized = raw.trim().trim_start_matches('@');
    if normalized.is_empty() {
        None
    } else {
        Some(normalized.to_string())
    }
}

/// `login` as an `@mention`.
pub fn format_handle(login: &str) -> String {
    format!("@{}", login.strip_prefix('@').unwrap_or(login))
}

/// Sanitized login, falling back to the numeric id.
pub fn display_handle(login: &str, id: i64) -> String {
    sanitize_handle(login).unwrap_or_else(|| id.to_string())
}

/// Render an XP amount with at most two decimal places (half-up).
pub fn format_xp(amount: &BigDecimal) -> String {
    let normalized = amount.normalized();
    let (_, scale) = normalized.as_bigint_and_exponent();
    let places = scale.clamp(0, 2);
    normalized.with_scale_round(places, RoundingMode::HalfUp).to_string()
}

/// Wrap in backticks.
pub fn code(value: &str) -> String {
    format!("`{}`", value)
}
