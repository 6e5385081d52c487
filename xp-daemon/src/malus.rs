//! Penalty arithmetic.

use std::str::FromStr;
use std::sync::LazyLock;

use bigdecimal::BigDecimal;
use regex::Regex;

use crate::engine::SkipReason;

/// Labels carrying a price start with this prefix.
pub const PRICE_LABEL_PREFIX: &str = "Price:";

static PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Price:\s*(\d+(?:\.\d+)?)").expect("valid price pattern"));

/// Base XP value from the first `Price:` label.
pub fn extract_price<S: AsRef<str>>(labels: &[S]) -> Result<BigDecimal, SkipReason> {
    let label = labels
        .iter()
        .map(|label| AsRef::<str>::as_ref(label))
        .find(|name| name.starts_with(PRICE_LABEL_PREFIX))
        .ok_or(SkipReason::MissingPriceLabel)?;

    let digits = PRICE_RE
        .captures(label)
        .and_then(|caps| caps.get(1))
        .ok_or(SkipReason::NonNumericPrice)?;

    BigDecimal::from_str(digits.as_str()).map_err(|_| SkipReason::NonNumericPrice)
}

/// Number of privileged participants, never less than one.
pub fn collaborator_multiplier(collaborators: usize) -> u64 {
    collaborators.max(1) as u64
}

/// Magnitude of the penalty: `price * multiplier`.
pub fn compute_malus(price: &BigDecimal, multiplier: u64) -> BigDecimal {
    price * BigDecimal::from(multiplier)
}
