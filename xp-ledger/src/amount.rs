//! Fixed-point encoding for XP amounts.
//!
//! Amounts are persisted as integer strings scaled by the base unit
//! (10^18). All conversions go through `BigDecimal`/`BigInt`; binary floating
//! point never touches a stored amount.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;

use crate::error::{LedgerError, Result};

/// Number of decimal places folded into every stored amount.
pub const BASE_UNIT_DECIMALS: i64 = 18;

/// The base unit as a decimal (10^18).
pub fn base_unit() -> BigDecimal {
    BigDecimal::new(BigInt::from(1), -BASE_UNIT_DECIMALS)
}

/// Scale a human-readable XP amount into its stored integer string.
///
/// Digits finer than 10^-18 XP are truncated toward zero.
pub fn to_fixed_point(amount: &BigDecimal) -> String {
    let (units, _) = (amount * base_unit()).with_scale(0).into_bigint_and_exponent();
    units.to_string()
}

/// Parse a stored integer string back into base units.
pub fn parse_fixed_point(raw: &str) -> Result<BigInt> {
    BigInt::from_str(raw.trim())
        .map_err(|e| LedgerError::InvalidAmount(format!("{:?}: {}", raw, e)))
}

/// Convert a sum of base units into XP.
pub fn from_base_units(units: BigInt) -> BigDecimal {
    BigDecimal::new(units, BASE_UNIT_DECIMALS).normalized()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn test_fractional_amount_scales_exactly() {
        assert_eq!(to_fixed_point(&dec("-42.5")), "-42500000000000000000");
        assert_eq!(to_fixed_point(&dec("0.000000000000000001")), "1");
    }

    #[test]
    fn test_whole_amount_has_no_fraction() {
        assert_eq!(to_fixed_point(&dec("-110")), "-110000000000000000000");
        assert_eq!(to_fixed_point(&dec("0")), "0");
    }

    #[test]
    fn test_sub_unit_digits_truncate() {
        assert_eq!(to_fixed_point(&dec("1.0000000000000000009")), "1000000000000000000");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_fixed_point("12abc").is_err());
        assert_eq!(parse_fixed_point(" -5 ").unwrap(), BigInt::from(-5));
    }

    #[test]
    fn test_base_units_back_to_xp() {
        let units = parse_fixed_point("-42500000000000000000").unwrap();
        assert_eq!(from_base_units(units), dec("-42.5"));
        assert_eq!(from_base_units(BigInt::from(0)), dec("0"));
    }
}
