use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
///
/// Every amount, rate, and ratio in the engine is a `Fixed64`, so identical
/// inputs produce bit-identical allocations on every platform.
pub type Fixed64 = I32F32;

/// Denominator of the emission grid: amounts are truncated to 1/100 units.
const QUANT_DENOM: i64 = 100;

/// Convert an f64 to Fixed64. Use only for initialization, never in the
/// cycle path.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Convert Fixed64 to f64. Use only for display/telemetry, never in the
/// cycle path.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Truncate a non-negative amount down to the emission grid (1/100 units).
///
/// Truncation direction is always down, so repeated cycles can never
/// allocate more than the available supply through rounding drift. Negative
/// inputs clamp to zero.
///
/// The grid math runs on the raw bits in 128-bit integers: no intermediate
/// `v * 100` exists, so the full `Fixed64` range quantizes without
/// overflow. The `QUANT_DENOM - 1` nudge recovers the grid index of a value
/// produced by an earlier pass, which sits a few bits below the exact
/// decimal point, making the operation idempotent.
#[inline]
pub fn quantize_down(v: Fixed64) -> Fixed64 {
    if v <= Fixed64::ZERO {
        return Fixed64::ZERO;
    }
    let scaled = v.to_bits() as i128 * QUANT_DENOM as i128;
    let units = (scaled + (QUANT_DENOM as i128 - 1)) >> 32;
    Fixed64::from_bits(((units << 32) / QUANT_DENOM as i128) as i64)
}

/// Checked division for Fixed64 that returns None on zero divisor or an
/// unrepresentable quotient.
#[inline]
pub fn checked_div_64(a: Fixed64, b: Fixed64) -> Option<Fixed64> {
    a.checked_div(b)
}
