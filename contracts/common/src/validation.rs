//! Validation Helpers for Yieldmill
//!
//! Reusable precondition checks shared by every contract crate.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use yieldmill_common::check;
//!
//! check!(amount > 0, YieldmillError::ZeroAmount);
//! require_sufficient_balance(balance, amount)?;
//! ```

use crate::{
    errors::{YieldmillError, YieldmillResult},
    types::{Address, ZERO_ADDRESS},
};

// ============ Validation Macro ============

/// Check a condition and return an error if it fails.
///
/// # Examples
///
/// ```rust,ignore
/// check!(amount > 0, YieldmillError::ZeroAmount);
///
/// check!(
///     received >= minimum,
///     YieldmillError::SlippageExceeded { minimum, actual: received }
/// );
/// ```
#[macro_export]
macro_rules! check {
    ($condition:expr, $error:expr) => {
        if !($condition) {
            return Err($error);
        }
    };
}

pub use check;

// ============ Common Validation Helpers ============

/// Require a non-zero amount.
pub fn require_non_zero(amount: u64) -> YieldmillResult<()> {
    if amount == 0 {
        return Err(YieldmillError::ZeroAmount);
    }
    Ok(())
}

/// Require sufficient balance for an operation.
pub fn require_sufficient_balance(available: u64, requested: u64) -> YieldmillResult<()> {
    if available < requested {
        return Err(YieldmillError::InsufficientBalance {
            available,
            requested,
        });
    }
    Ok(())
}

/// Require address to not be zero.
pub fn require_valid_address(address: Address, param: &'static str) -> YieldmillResult<()> {
    if address == ZERO_ADDRESS {
        return Err(YieldmillError::InvalidParameter {
            param,
            reason: "address cannot be zero",
        });
    }
    Ok(())
}

/// Require a swap or liquidity output to meet its minimum.
pub fn require_min_output(actual: u64, minimum: u64) -> YieldmillResult<()> {
    if actual < minimum {
        return Err(YieldmillError::SlippageExceeded { minimum, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_non_zero() {
        assert!(require_non_zero(1).is_ok());
        assert!(matches!(require_non_zero(0), Err(YieldmillError::ZeroAmount)));
    }

    #[test]
    fn test_require_sufficient_balance() {
        assert!(require_sufficient_balance(10, 10).is_ok());
        assert!(matches!(
            require_sufficient_balance(9, 10),
            Err(YieldmillError::InsufficientBalance { available: 9, requested: 10 })
        ));
    }

    #[test]
    fn test_require_valid_address() {
        assert!(require_valid_address([1u8; 32], "owner").is_ok());
        assert!(require_valid_address(ZERO_ADDRESS, "owner").is_err());
    }

    #[test]
    fn test_require_min_output() {
        assert!(require_min_output(100, 100).is_ok());
        assert!(matches!(
            require_min_output(99, 100),
            Err(YieldmillError::SlippageExceeded { minimum: 100, actual: 99 })
        ));
    }

    #[test]
    fn test_check_macro() {
        fn check_positive(value: u64) -> YieldmillResult<()> {
            check!(value > 0, YieldmillError::ZeroAmount);
            Ok(())
        }

        assert!(check_positive(100).is_ok());
        assert!(check_positive(0).is_err());
    }
}
