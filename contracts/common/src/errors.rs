//! Error Types for the Yieldmill Protocol
//!
//! Every operation either completes or aborts with one of these errors and
//! leaves no partial state behind. Nothing is retried internally; the caller
//! resubmits if it wants to.

use crate::types::{Address, OptimizerId, StrategyId};

/// Result type alias for Yieldmill operations
pub type YieldmillResult<T> = Result<T, YieldmillError>;

/// Main error enum for all Yieldmill protocol errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum YieldmillError {
    // ============ Authorization Errors ============
    /// Caller is not the owner/operator of the target
    Unauthorized { expected: Address, actual: Address },

    /// A mutating call is already in flight on this instance
    Reentrancy { instance: Address },

    // ============ Amount Errors ============
    /// Zero amount not allowed
    ZeroAmount,

    /// Insufficient balance for operation
    InsufficientBalance { available: u64, requested: u64 },

    /// Spender has not been approved for this amount
    InsufficientAllowance { available: u64, requested: u64 },

    // ============ Registry Errors ============
    /// Strategy id is out of range
    InvalidStrategy { strategy_id: StrategyId, strategy_count: u64 },

    /// Optimizer id or address is not registered
    UnknownOptimizer { optimizer_id: OptimizerId },

    /// Address is not a registered fee collector
    UnknownFeeCollector { address: Address },

    /// Fee collector has already been retired
    AlreadyRetired { address: Address },

    /// A zap already exists for this router
    DuplicateZap { router: Address },

    /// No zap has been created for this router
    ZapNotFound { router: Address },

    /// Token cannot be recovered while it backs an accounted position
    ProtectedToken { token: Address },

    // ============ Swap / Liquidity Errors ============
    /// Router output fell below the derived minimum
    SlippageExceeded { minimum: u64, actual: u64 },

    /// Not enough liquidity (or LP allowance) for the operation
    InsufficientLiquidity { available: u64, requested: u64 },

    /// No pair connects the two assets on this router
    NoSwapRoute { token_in: Address, token_out: Address },

    // ============ Environment Errors ============
    /// Token address is not known to the ledger
    UnknownToken { token: Address },

    /// Staking pool address is not deployed
    UnknownPool { address: Address },

    /// Vault address is not deployed
    UnknownVault { address: Address },

    /// Router address is not deployed
    UnknownRouter { address: Address },

    // ============ Math Errors ============
    /// Arithmetic overflow occurred
    Overflow,

    /// Arithmetic underflow occurred
    Underflow,

    /// Division by zero
    DivisionByZero,

    // ============ Input Validation Errors ============
    /// Configuration values out of bounds
    InvalidConfig { reason: &'static str },

    /// Invalid input parameter
    InvalidParameter { param: &'static str, reason: &'static str },
}

impl YieldmillError {
    /// Returns a human-readable error code for logging/debugging
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "E001_UNAUTHORIZED",
            Self::Reentrancy { .. } => "E002_REENTRANCY",
            Self::ZeroAmount => "E010_ZERO_AMOUNT",
            Self::InsufficientBalance { .. } => "E011_INSUFFICIENT_BALANCE",
            Self::InsufficientAllowance { .. } => "E012_INSUFFICIENT_ALLOWANCE",
            Self::InvalidStrategy { .. } => "E020_INVALID_STRATEGY",
            Self::UnknownOptimizer { .. } => "E021_UNKNOWN_OPTIMIZER",
            Self::UnknownFeeCollector { .. } => "E022_UNKNOWN_FEE_COLLECTOR",
            Self::AlreadyRetired { .. } => "E023_ALREADY_RETIRED",
            Self::DuplicateZap { .. } => "E024_DUPLICATE_ZAP",
            Self::ZapNotFound { .. } => "E025_ZAP_NOT_FOUND",
            Self::ProtectedToken { .. } => "E026_PROTECTED_TOKEN",
            Self::SlippageExceeded { .. } => "E030_SLIPPAGE",
            Self::InsufficientLiquidity { .. } => "E031_INSUFFICIENT_LIQUIDITY",
            Self::NoSwapRoute { .. } => "E032_NO_ROUTE",
            Self::UnknownToken { .. } => "E040_UNKNOWN_TOKEN",
            Self::UnknownPool { .. } => "E041_UNKNOWN_POOL",
            Self::UnknownVault { .. } => "E042_UNKNOWN_VAULT",
            Self::UnknownRouter { .. } => "E043_UNKNOWN_ROUTER",
            Self::Overflow => "E080_OVERFLOW",
            Self::Underflow => "E081_UNDERFLOW",
            Self::DivisionByZero => "E082_DIV_ZERO",
            Self::InvalidConfig { .. } => "E090_INVALID_CONFIG",
            Self::InvalidParameter { .. } => "E091_INVALID_PARAM",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_error_codes_unique() {
        let errors = [
            YieldmillError::Unauthorized { expected: [0u8; 32], actual: [1u8; 32] },
            YieldmillError::ZeroAmount,
            YieldmillError::InvalidStrategy { strategy_id: 3, strategy_count: 3 },
            YieldmillError::DuplicateZap { router: [2u8; 32] },
            YieldmillError::AlreadyRetired { address: [3u8; 32] },
            YieldmillError::SlippageExceeded { minimum: 10, actual: 9 },
            YieldmillError::InsufficientLiquidity { available: 0, requested: 1 },
            YieldmillError::Overflow,
        ];

        let codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        let unique: BTreeSet<_> = codes.iter().collect();
        assert_eq!(codes.len(), unique.len(), "Error codes must be unique");
    }
}
