//! Protocol Constants
//!
//! All magic numbers and default configuration values for the Yieldmill
//! protocol.
//!
//! # Network Configuration
//!
//! Use feature flags to compile for different networks:
//! - `mainnet` - Production values (tight slippage tolerance)
//! - Default (no feature) - Testnet values (looser tolerance for thin test pools)
//!
//! ```toml
//! # For mainnet deployment:
//! yieldmill-common = { path = "...", features = ["mainnet"] }
//! ```

/// Token amounts
pub mod token {
    /// Decimal places used for every amount in the ledger
    pub const DECIMALS: u8 = 8;
    /// One unit with decimals (1 token = 100_000_000 base units)
    pub const ONE: u64 = 100_000_000;
}

/// Fee Configuration (in basis points, 100 = 1%)
pub mod fees {
    /// Basis points denominator
    pub const BPS_DENOMINATOR: u64 = 10_000;

    /// Default share of harvested reward routed to the fee collector (3%)
    pub const DEFAULT_FEE_BPS: u64 = 300;

    /// Default share of harvested reward paid to the dividend recipient (2%)
    pub const DEFAULT_DIVIDEND_BPS: u64 = 200;

    /// Upper bound on fee + dividend; the rest is always compounded
    pub const MAX_COMBINED_BPS: u64 = 5_000;

    /// Upper bound for a flat withdrawal fee (5%)
    pub const MAX_WITHDRAWAL_FEE_BPS: u64 = 500;
}

/// Zap Configuration
pub mod zap {
    /// Default tolerance between quoted and received swap output
    /// - Mainnet: 0.5%
    /// - Testnet: 3% (thin test pools move a lot per swap)
    #[cfg(feature = "mainnet")]
    pub const DEFAULT_SLIPPAGE_BPS: u64 = 50;
    #[cfg(not(feature = "mainnet"))]
    pub const DEFAULT_SLIPPAGE_BPS: u64 = 300;

    /// Largest tolerance an operator may configure (10%)
    pub const MAX_SLIPPAGE_BPS: u64 = 1_000;

    /// Default harvest threshold: a smaller claim stays on the optimizer
    /// and is deferred to a later harvest
    /// - Mainnet: 10_000 base units (below that the split loses most of it)
    /// - Testnet: 0 (every nonzero claim is distributed)
    #[cfg(feature = "mainnet")]
    pub const DEFAULT_MIN_HARVEST_AMOUNT: u64 = 10_000;
    #[cfg(not(feature = "mainnet"))]
    pub const DEFAULT_MIN_HARVEST_AMOUNT: u64 = 0;
}

/// Constant-product AMM parameters the zap plans against
pub mod amm {
    /// Swap fee assumed by the zap when splitting and quoting (0.3%)
    pub const SWAP_FEE_BPS: u64 = 30;

    /// Liquidity permanently locked on the first mint of a pair
    pub const MINIMUM_LIQUIDITY: u64 = 1_000;
}

/// Precision constants
pub mod precision {
    /// High precision for reward-per-token and price-per-share math
    pub const SCALE_FACTOR: u128 = 1_000_000_000_000_000_000; // 1e18
}

/// Domain tags mixed into derived addresses
pub mod seeds {
    pub const OPTIMIZER: &[u8] = b"yieldmill/optimizer";
    pub const FEE_COLLECTOR: &[u8] = b"yieldmill/fee-collector";
    pub const ZAP: &[u8] = b"yieldmill/zap";
    pub const TREASURY: &[u8] = b"yieldmill/treasury";
    pub const ENVIRONMENT: &[u8] = b"yieldmill/environment";
}
