//! Protocol Events for Yieldmill
//!
//! Every state-changing operation appends events to an `EventLog`. Events
//! are the observability surface of the protocol: indexers replay them to
//! rebuild positions, fee flows and retirements off-line.

use crate::types::{Address, OptimizerId, StrategyId, WithdrawalFeePolicy};
use crate::Vec;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// Event types for indexing and filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum EventType {
    // Registry Events (0x01 - 0x1F)
    ZapCreated = 0x01,
    StrategyCreated = 0x02,
    FeeCollectorCreated = 0x03,
    OptimizerCreated = 0x04,

    // Position Events (0x20 - 0x3F)
    Staked = 0x20,
    Withdrawn = 0x21,
    Harvested = 0x22,
    WithdrawalFeeCharged = 0x23,
    TokensRecovered = 0x24,
    HarvestDeferred = 0x25,

    // Zap Events (0x40 - 0x5F)
    Zapped = 0x40,
    Unzapped = 0x41,
    LpSwapped = 0x42,

    // Treasury Events (0x80 - 0x9F)
    FeeCollectorRetired = 0x80,
    ConfigUpdated = 0x81,
}

/// Main event enum containing all possible protocol events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum YieldmillEvent {
    // ============ Registry Events ============

    /// Emitted when the zap registry deploys a zap for a router
    ZapCreated {
        index: u64,
        router: Address,
        zap: Address,
        block_height: u64,
    },

    /// Emitted when a strategy is registered
    StrategyCreated {
        strategy_id: StrategyId,
        staking_token: Address,
        source: Address,
        router: Address,
        block_height: u64,
    },

    /// Emitted with every strategy for its fee collector
    FeeCollectorCreated {
        strategy_id: StrategyId,
        optimizer_id: OptimizerId,
        address: Address,
        block_height: u64,
    },

    /// Emitted when a depositor gets a new optimizer
    OptimizerCreated {
        strategy_id: StrategyId,
        optimizer_id: OptimizerId,
        owner: Address,
        address: Address,
        block_height: u64,
    },

    // ============ Position Events ============

    /// Emitted when liquidity is staked through an optimizer
    Staked {
        optimizer: Address,
        amount: u64,
        total_staked: u64,
        block_height: u64,
    },

    /// Emitted when liquidity leaves an optimizer
    Withdrawn {
        optimizer: Address,
        amount: u64,
        fee: u64,
        remaining: u64,
        block_height: u64,
    },

    /// Emitted on every harvest that claimed something
    Harvested {
        optimizer: Address,
        claimed: u64,
        fee: u64,
        dividend: u64,
        compounded: u64,
        block_height: u64,
    },

    /// Emitted when a withdrawal pays the fee collector
    WithdrawalFeeCharged {
        optimizer: Address,
        fee_collector: Address,
        amount: u64,
        block_height: u64,
    },

    /// Emitted when stray tokens are returned to an owner
    TokensRecovered {
        optimizer: Address,
        token: Address,
        amount: u64,
        block_height: u64,
    },

    /// Emitted when a claim is left on the optimizer for a later harvest
    HarvestDeferred {
        optimizer: Address,
        pending: u64,
        block_height: u64,
    },

    // ============ Zap Events ============

    /// Emitted when a single asset is converted to liquidity
    Zapped {
        zap: Address,
        account: Address,
        token_in: Address,
        amount_in: u64,
        liquidity: u64,
        block_height: u64,
    },

    /// Emitted when liquidity is converted back to a single asset
    Unzapped {
        zap: Address,
        account: Address,
        token_out: Address,
        liquidity: u64,
        amount_out: u64,
        block_height: u64,
    },

    /// Emitted when liquidity moves between two pairs
    LpSwapped {
        zap: Address,
        account: Address,
        from_pair: Address,
        to_pair: Address,
        liquidity_in: u64,
        liquidity_out: u64,
        block_height: u64,
    },

    // ============ Treasury Events ============

    /// Emitted when a fee collector's stake is migrated and it is retired
    FeeCollectorRetired {
        from: Address,
        to: Address,
        migrated: u64,
        block_height: u64,
    },

    /// Emitted when the operator changes protocol configuration
    ConfigUpdated {
        fee_bps: u64,
        dividend_bps: u64,
        dividend_recipient: Address,
        withdrawal_fee: WithdrawalFeePolicy,
        slippage_bps: u64,
        min_harvest_amount: u64,
        block_height: u64,
    },
}

impl YieldmillEvent {
    /// Get the event type for filtering
    pub fn event_type(&self) -> EventType {
        match self {
            Self::ZapCreated { .. } => EventType::ZapCreated,
            Self::StrategyCreated { .. } => EventType::StrategyCreated,
            Self::FeeCollectorCreated { .. } => EventType::FeeCollectorCreated,
            Self::OptimizerCreated { .. } => EventType::OptimizerCreated,
            Self::Staked { .. } => EventType::Staked,
            Self::Withdrawn { .. } => EventType::Withdrawn,
            Self::Harvested { .. } => EventType::Harvested,
            Self::WithdrawalFeeCharged { .. } => EventType::WithdrawalFeeCharged,
            Self::TokensRecovered { .. } => EventType::TokensRecovered,
            Self::HarvestDeferred { .. } => EventType::HarvestDeferred,
            Self::Zapped { .. } => EventType::Zapped,
            Self::Unzapped { .. } => EventType::Unzapped,
            Self::LpSwapped { .. } => EventType::LpSwapped,
            Self::FeeCollectorRetired { .. } => EventType::FeeCollectorRetired,
            Self::ConfigUpdated { .. } => EventType::ConfigUpdated,
        }
    }

    /// Get the block height when event occurred
    pub fn block_height(&self) -> u64 {
        match self {
            Self::ZapCreated { block_height, .. }
            | Self::StrategyCreated { block_height, .. }
            | Self::FeeCollectorCreated { block_height, .. }
            | Self::OptimizerCreated { block_height, .. }
            | Self::Staked { block_height, .. }
            | Self::Withdrawn { block_height, .. }
            | Self::Harvested { block_height, .. }
            | Self::WithdrawalFeeCharged { block_height, .. }
            | Self::TokensRecovered { block_height, .. }
            | Self::HarvestDeferred { block_height, .. }
            | Self::Zapped { block_height, .. }
            | Self::Unzapped { block_height, .. }
            | Self::LpSwapped { block_height, .. }
            | Self::FeeCollectorRetired { block_height, .. }
            | Self::ConfigUpdated { block_height, .. } => *block_height,
        }
    }
}

/// Event log for collecting multiple events during execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct EventLog {
    events: Vec<YieldmillEvent>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Emit an event (add to log)
    pub fn emit(&mut self, event: YieldmillEvent) {
        self.events.push(event);
    }

    /// Get all events
    pub fn events(&self) -> &[YieldmillEvent] {
        &self.events
    }

    /// Filter events by type
    pub fn filter_by_type(&self, event_type: EventType) -> Vec<&YieldmillEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Get number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if nothing was emitted
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
