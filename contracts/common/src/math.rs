//! Mathematical Utilities for the Yieldmill Protocol
//!
//! Checked integer math for fee splits, constant-product quotes and the
//! single-sided zap split. Amounts are `u64`; intermediates run in `u128`.

use crate::constants::fees;
use crate::errors::{YieldmillError, YieldmillResult};
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

// ============ Fee Math ============

/// `amount * bps / 10_000`, rounded down
pub fn bps_share(amount: u64, bps: u64) -> YieldmillResult<u64> {
    let share = checked_mul_div(amount as u128, bps as u128, fees::BPS_DENOMINATOR as u128)?;
    u64::try_from(share).map_err(|_| YieldmillError::Overflow)
}

/// How one harvest is divided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct HarvestSplit {
    /// Routed to the strategy's fee collector
    pub fee: u64,
    /// Paid to the dividend recipient
    pub dividend: u64,
    /// Compounded back into the position
    pub compound: u64,
}

/// Split a harvested reward amount into fee, dividend and compounded parts
///
/// The three parts always sum to `amount`; rounding dust stays with the
/// compounded part.
pub fn split_harvest(amount: u64, fee_bps: u64, dividend_bps: u64) -> YieldmillResult<HarvestSplit> {
    let fee = bps_share(amount, fee_bps)?;
    let dividend = bps_share(amount, dividend_bps)?;
    let compound = amount
        .checked_sub(fee)
        .and_then(|rest| rest.checked_sub(dividend))
        .ok_or(YieldmillError::Underflow)?;

    Ok(HarvestSplit { fee, dividend, compound })
}

/// Lower `amount` by a tolerance in basis points
pub fn apply_slippage(amount: u64, slippage_bps: u64) -> YieldmillResult<u64> {
    let keep = fees::BPS_DENOMINATOR
        .checked_sub(slippage_bps)
        .ok_or(YieldmillError::Underflow)?;
    bps_share(amount, keep)
}

// ============ Constant Product Math ============

/// Output of a constant-product swap after the input-side fee
///
/// out = (in * (10000 - fee) * reserve_out) / (reserve_in * 10000 + in * (10000 - fee))
pub fn get_amount_out(
    amount_in: u64,
    reserve_in: u64,
    reserve_out: u64,
    fee_bps: u64,
) -> YieldmillResult<u64> {
    if amount_in == 0 {
        return Err(YieldmillError::ZeroAmount);
    }
    if reserve_in == 0 || reserve_out == 0 {
        return Err(YieldmillError::InsufficientLiquidity {
            available: reserve_in.min(reserve_out),
            requested: amount_in,
        });
    }
    let fee_multiplier = fees::BPS_DENOMINATOR
        .checked_sub(fee_bps)
        .ok_or(YieldmillError::Underflow)? as u128;

    let amount_in_with_fee = (amount_in as u128) * fee_multiplier;
    let numerator = amount_in_with_fee
        .checked_mul(reserve_out as u128)
        .ok_or(YieldmillError::Overflow)?;
    let denominator = (reserve_in as u128)
        .checked_mul(fees::BPS_DENOMINATOR as u128)
        .and_then(|d| d.checked_add(amount_in_with_fee))
        .ok_or(YieldmillError::Overflow)?;

    Ok((numerator / denominator) as u64)
}

/// Amount of B equivalent to `amount_a` at the current reserve ratio
pub fn quote(amount_a: u64, reserve_a: u64, reserve_b: u64) -> YieldmillResult<u64> {
    if amount_a == 0 {
        return Err(YieldmillError::ZeroAmount);
    }
    if reserve_a == 0 || reserve_b == 0 {
        return Err(YieldmillError::InsufficientLiquidity {
            available: 0,
            requested: amount_a,
        });
    }
    let amount_b = checked_mul_div(amount_a as u128, reserve_b as u128, reserve_a as u128)?;
    u64::try_from(amount_b).map_err(|_| YieldmillError::Overflow)
}

/// Portion of a single-asset amount to swap so that the remainder and the
/// swap output match the pool ratio after the swap
///
/// With swap fee `n/d` (997/1000 at 30 bps), reserve `r` of the input asset
/// and input `a`:
///
/// s = (sqrt(r²(d+n)² + 4·n·d·a·r) − r(d+n)) / 2n
///
/// The expression is homogeneous of degree one in `(r, a)`, so when the
/// square term would overflow both are scaled down by powers of two and the
/// result is scaled back up.
pub fn optimal_swap_amount(amount_in: u64, reserve_in: u64, fee_bps: u64) -> YieldmillResult<u64> {
    if amount_in == 0 {
        return Ok(0);
    }
    if reserve_in == 0 {
        return Err(YieldmillError::InsufficientLiquidity {
            available: 0,
            requested: amount_in,
        });
    }
    if fee_bps >= fees::BPS_DENOMINATOR {
        return Err(YieldmillError::InvalidParameter {
            param: "fee_bps",
            reason: "swap fee must be below 100%",
        });
    }

    let denominator = fees::BPS_DENOMINATOR as u128;
    let numerator = denominator - fee_bps as u128;
    let divisor = gcd(numerator, denominator);
    let (n, d) = (numerator / divisor, denominator / divisor);

    let mut reserve = reserve_in as u128;
    let mut amount = amount_in as u128;
    let mut shift = 0u32;

    while reserve > 0 && amount > 0 {
        if let Some(split) = swap_split(reserve, amount, n, d) {
            let scaled = split << shift;
            return Ok(scaled.min(amount_in as u128) as u64);
        }
        reserve >>= 1;
        amount >>= 1;
        shift += 1;
    }

    // Input negligible against the reserve: price impact vanishes and the
    // split tends to a·d/(n+d)
    let split = checked_mul_div(amount_in as u128, d, n + d)?;
    Ok(split as u64)
}

fn swap_split(reserve: u128, amount: u128, n: u128, d: u128) -> Option<u128> {
    let sum = n + d;
    let square = reserve
        .checked_mul(reserve)?
        .checked_mul(sum.checked_mul(sum)?)?;
    let cross = (4 * n)
        .checked_mul(d)?
        .checked_mul(amount)?
        .checked_mul(reserve)?;
    let root = isqrt(square.checked_add(cross)?);
    let base = reserve.checked_mul(sum)?;
    Some(root.saturating_sub(base) / (2 * n))
}

/// Floor of the square root (Newton's method)
pub fn isqrt(value: u128) -> u128 {
    if value < 2 {
        return value;
    }
    let bits = 128 - value.leading_zeros();
    let mut x: u128 = 1 << ((bits + 1) / 2);
    loop {
        let y = (x + value / x) / 2;
        if y >= x {
            return x;
        }
        x = y;
    }
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

// ============ Safe Arithmetic ============

/// `a * b / c` with a 128-bit intermediate
pub fn checked_mul_div(a: u128, b: u128, c: u128) -> YieldmillResult<u128> {
    if c == 0 {
        return Err(YieldmillError::DivisionByZero);
    }
    a.checked_mul(b)
        .map(|product| product / c)
        .ok_or(YieldmillError::Overflow)
}

/// Safe addition with overflow check
pub fn safe_add(a: u64, b: u64) -> YieldmillResult<u64> {
    a.checked_add(b).ok_or(YieldmillError::Overflow)
}

/// Safe subtraction with underflow check
pub fn safe_sub(a: u64, b: u64) -> YieldmillResult<u64> {
    a.checked_sub(b).ok_or(YieldmillError::Underflow)
}
