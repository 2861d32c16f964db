use bigdecimal::{BigDecimal, ToPrimitive};
use num_traits::Zero;
use std::str::FromStr;

use crate::error::AppError;

/// Yield amounts are integers in units of 10^-18.
pub const YIELD_DECIMALS: u32 = 18;
pub const YIELD_SCALE: u128 = 1_000_000_000_000_000_000;

/// Oracle prices are integers in units of 10^-8.
pub const PRICE_DECIMALS: u32 = 8;
pub const PRICE_SCALE: u128 = 100_000_000;

/// 100% expressed in basis points
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Computes `value * numerator / denominator` with overflow and zero checks.
pub fn mul_div(
    value: u128,
    numerator: u128,
    denominator: u128,
    context: &'static str,
) -> Result<u128, AppError> {
    if denominator == 0 {
        return Err(AppError::DivisionGuard(context));
    }
    value
        .checked_mul(numerator)
        .map(|product| product / denominator)
        .ok_or(AppError::ArithmeticOverflow(context))
}

pub fn checked_add(a: u128, b: u128, context: &'static str) -> Result<u128, AppError> {
    a.checked_add(b).ok_or(AppError::ArithmeticOverflow(context))
}

/// Share of `part` over `whole` in basis points.
pub fn ratio_bps(part: u128, whole: u128, context: &'static str) -> Result<u128, AppError> {
    mul_div(part, BPS_DENOMINATOR, whole, context)
}

/// Parses a decimal string (e.g. "3000.25") into a fixed-point integer with
/// the given number of decimals, truncating any extra precision.
pub fn parse_fixed(value: &str, decimals: u32) -> Result<i128, AppError> {
    let decimal = BigDecimal::from_str(value.trim())?;
    decimal_to_fixed(&decimal, decimals)
}

pub fn decimal_to_fixed(value: &BigDecimal, decimals: u32) -> Result<i128, AppError> {
    let scaled = value * BigDecimal::from(10i128.pow(decimals));
    scaled
        .with_scale(0)
        .to_i128()
        .ok_or(AppError::ArithmeticOverflow("fixed-point conversion"))
}

/// Renders a fixed-point integer as a decimal for logs and reports.
pub fn fixed_to_decimal(value: u128, decimals: u32) -> BigDecimal {
    if value.is_zero() {
        return BigDecimal::zero();
    }
    BigDecimal::new(value.into(), decimals as i64).normalized()
}
