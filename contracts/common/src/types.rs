//! Core Types for the Yieldmill Protocol
//!
//! Fundamental records shared by the zap, optimizer, registry and treasury
//! crates. Everything persisted is serde + borsh encodable.

use crate::constants::{fees, seeds, zap};
use crate::errors::{YieldmillError, YieldmillResult};
use crate::Vec;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// Type alias for addresses (32-byte hash)
pub type Address = [u8; 32];

/// Sequential strategy identifier
pub type StrategyId = u64;

/// Index of an optimizer instance in the registry arena
pub type OptimizerId = u64;

/// The all-zero address, never a valid account
pub const ZERO_ADDRESS: Address = [0u8; 32];

/// Derive a deterministic address from a domain seed and arbitrary parts
pub fn derive_address(seed: &[u8], parts: &[&[u8]]) -> Address {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(seed);
    for part in parts {
        hasher.update(part);
    }
    let result = hasher.finalize();
    let mut address = [0u8; 32];
    address.copy_from_slice(&result);
    address
}

/// Address of the optimizer owned by `owner` on `strategy_id`
pub fn optimizer_address(owner: &Address, strategy_id: StrategyId) -> Address {
    derive_address(seeds::OPTIMIZER, &[owner, &strategy_id.to_le_bytes()])
}

/// Address of the fee collector of `strategy_id`
pub fn fee_collector_address(strategy_id: StrategyId) -> Address {
    derive_address(seeds::FEE_COLLECTOR, &[&strategy_id.to_le_bytes()])
}

/// Address of the zap bound to `router`
pub fn zap_address(router: &Address) -> Address {
    derive_address(seeds::ZAP, &[router])
}

/// Account address of a treasury administered by `operator`
pub fn treasury_address(operator: &Address) -> Address {
    derive_address(seeds::TREASURY, &[operator])
}

// ============ Strategy Types ============

/// Where a strategy's liquidity token earns yield
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum YieldSourceKind {
    /// Reward-emitting staking pool; rewards are harvested and compounded
    StakingPool,
    /// Auto-compounding vault; value accrues through price per share
    Vault,
}

/// Parameters accepted when registering a strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum StrategyParams {
    /// Staking pool plus the router whose pair backs its staking token
    StakingPool { pool: Address, router: Address },
    /// Vault plus the router whose pair backs its want token
    Vault { vault: Address, router: Address },
}

impl StrategyParams {
    pub fn router(&self) -> Address {
        match self {
            Self::StakingPool { router, .. } | Self::Vault { router, .. } => *router,
        }
    }
}

/// Immutable strategy record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Strategy {
    /// Sequential id, never reused
    pub id: StrategyId,
    /// First underlying asset of the pair
    pub token_a: Address,
    /// Second underlying asset of the pair
    pub token_b: Address,
    /// Liquidity token staked into the source
    pub staking_token: Address,
    /// Reward token emitted by the pool (vaults have none)
    pub reward_token: Option<Address>,
    /// Kind of yield source
    pub source: YieldSourceKind,
    /// Staking pool or vault address
    pub source_address: Address,
    /// Vault share token (vault strategies only)
    pub share_token: Option<Address>,
    /// Router used for every conversion on this strategy
    pub router: Address,
    /// Zap bound to `router`
    pub zap: Address,
    /// Arena id of this strategy's fee collector
    pub fee_collector: OptimizerId,
}

impl Strategy {
    /// Returns true for vault-backed strategies
    pub fn is_vault(&self) -> bool {
        self.source == YieldSourceKind::Vault
    }

    /// Returns true if both strategies provide liquidity to the same pair
    pub fn same_pair(&self, other: &Strategy) -> bool {
        self.staking_token == other.staking_token
    }

    /// Tokens whose balance on an optimizer belongs to its accounted position
    pub fn protected_tokens(&self) -> Vec<Address> {
        let mut tokens = Vec::new();
        tokens.push(self.staking_token);
        if let Some(reward) = self.reward_token {
            tokens.push(reward);
        }
        if let Some(share) = self.share_token {
            tokens.push(share);
        }
        tokens
    }
}

// ============ Optimizer Types ============

/// Role of an optimizer instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum OptimizerKind {
    /// Created on a depositor's request
    Depositor,
    /// Created with its strategy, owned by the treasury
    FeeCollector,
}

/// Retirement state of a fee collector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct RetirementRecord {
    /// Fee collector address
    pub fee_collector: Address,
    /// Set once, never cleared
    pub retired: bool,
    /// Fee collector that received the migrated stake
    pub migrated_to: Address,
    /// Block of retirement
    pub retired_at: u64,
}

/// Registered zap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ZapEntry {
    /// Router the zap trades through
    pub router: Address,
    /// Zap account address
    pub zap: Address,
}

// ============ Configuration ============

/// When withdrawals pay the fee collector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum WithdrawalFeePolicy {
    /// Withdrawals are free; fees only come from harvests
    #[default]
    Disabled,
    /// Harvest runs before every withdrawal so accrued reward pays the fee
    HarvestFirst,
    /// A flat share of the withdrawn liquidity is staked into the fee collector
    Flat { bps: u64 },
}

/// Protocol-wide configuration, owned by the treasury operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ProtocolConfig {
    /// Share of harvested reward routed to the fee collector
    pub fee_bps: u64,
    /// Share of harvested reward paid out as dividend
    pub dividend_bps: u64,
    /// Receiver of dividends
    pub dividend_recipient: Address,
    /// Withdrawal fee trigger
    pub withdrawal_fee: WithdrawalFeePolicy,
    /// Accepted gap between quoted and received swap output
    pub slippage_bps: u64,
    /// Claims below this are left on the optimizer for a later harvest
    pub min_harvest_amount: u64,
}

impl ProtocolConfig {
    /// Default rates paying dividends to `dividend_recipient`
    pub fn new(dividend_recipient: Address) -> Self {
        Self {
            fee_bps: fees::DEFAULT_FEE_BPS,
            dividend_bps: fees::DEFAULT_DIVIDEND_BPS,
            dividend_recipient,
            withdrawal_fee: WithdrawalFeePolicy::Disabled,
            slippage_bps: zap::DEFAULT_SLIPPAGE_BPS,
            min_harvest_amount: zap::DEFAULT_MIN_HARVEST_AMOUNT,
        }
    }

    /// Check every bound
    ///
    /// # Errors
    /// Returns `YieldmillError::InvalidConfig` naming the first violated bound.
    pub fn validate(&self) -> YieldmillResult<()> {
        let combined = self
            .fee_bps
            .checked_add(self.dividend_bps)
            .ok_or(YieldmillError::Overflow)?;
        if combined > fees::MAX_COMBINED_BPS {
            return Err(YieldmillError::InvalidConfig {
                reason: "fee + dividend exceeds MAX_COMBINED_BPS",
            });
        }
        if self.dividend_bps > 0 && self.dividend_recipient == ZERO_ADDRESS {
            return Err(YieldmillError::InvalidConfig {
                reason: "dividend recipient cannot be zero address",
            });
        }
        if self.slippage_bps > zap::MAX_SLIPPAGE_BPS {
            return Err(YieldmillError::InvalidConfig {
                reason: "slippage tolerance exceeds MAX_SLIPPAGE_BPS",
            });
        }
        if let WithdrawalFeePolicy::Flat { bps } = self.withdrawal_fee {
            if bps > fees::MAX_WITHDRAWAL_FEE_BPS {
                return Err(YieldmillError::InvalidConfig {
                    reason: "withdrawal fee exceeds MAX_WITHDRAWAL_FEE_BPS",
                });
            }
        }
        Ok(())
    }
}
