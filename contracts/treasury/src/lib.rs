//! Treasury Contract
//!
//! The treasury is the only account allowed to register strategies and it
//! owns every fee collector. Its operator drives it: registering pool and
//! vault strategies, harvesting fee collectors and retiring a fee collector
//! into another one.
//!
//! ## Retirement
//!
//! `Active -> Retired`, terminal. The retirement record is written before the
//! fee collector is touched, then its whole position is harvested and
//! withdrawn, converted into the target's pair when the pairs differ, and
//! staked into the target.
//!
//! The `protocol` module wraps the treasury, the registries, the
//! configuration and the environment into one facade whose operations commit
//! atomically.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use yieldmill_common::{
    access_control::Ownership,
    errors::{YieldmillError, YieldmillResult},
    events::YieldmillEvent,
    types::{treasury_address, Address, RetirementRecord, Strategy, StrategyId, StrategyParams},
    validation::check,
    BTreeMap,
};
use yieldmill_optimizer::HarvestReport;
use yieldmill_strategy_registry::{Environment, StrategyRegistry};
use yieldmill_zap::{Zap, ZapRegistry, ZapRequest};

pub mod protocol;

pub use protocol::Protocol;


// ============ Treasury ============

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Treasury {
    /// Account that owns the fee collectors
    address: Address,
    operator: Ownership,
    /// Keyed by fee collector address
    retirements: BTreeMap<Address, RetirementRecord>,
}

impl Treasury {
    pub fn new(operator: Address) -> Self {
        Self {
            address: treasury_address(&operator),
            operator: Ownership::new(operator),
            retirements: BTreeMap::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn operator(&self) -> Address {
        self.operator.owner()
    }

    /// Fail with `Unauthorized` unless `caller` is the operator
    pub fn ensure_operator(&self, caller: Address) -> YieldmillResult<()> {
        self.operator.ensure(caller)
    }

    // ============ Strategies ============

    /// Register a staking-pool strategy
    pub fn create_strategy(
        &self,
        caller: Address,
        pool: Address,
        router: Address,
        registry: &mut StrategyRegistry,
        zaps: &ZapRegistry,
        env: Environment<'_>,
    ) -> YieldmillResult<StrategyId> {
        self.ensure_operator(caller)?;
        registry.add_strategy(
            self.address,
            StrategyParams::StakingPool { pool, router },
            zaps,
            env.world,
            env.events,
        )
    }

    /// Register a vault strategy
    pub fn create_vault_strategy(
        &self,
        caller: Address,
        vault: Address,
        router: Address,
        registry: &mut StrategyRegistry,
        zaps: &ZapRegistry,
        env: Environment<'_>,
    ) -> YieldmillResult<StrategyId> {
        self.ensure_operator(caller)?;
        registry.add_strategy(
            self.address,
            StrategyParams::Vault { vault, router },
            zaps,
            env.world,
            env.events,
        )
    }

    // ============ Fee Collectors ============

    /// Returns true once `fee_collector` has been retired
    pub fn retirement_status(&self, fee_collector: &Address) -> bool {
        self.retirements
            .get(fee_collector)
            .is_some_and(|record| record.retired)
    }

    pub fn retirement(&self, fee_collector: &Address) -> Option<&RetirementRecord> {
        self.retirements.get(fee_collector)
    }

    /// Harvest the fee collector of `strategy_id`
    ///
    /// # Errors
    /// `AlreadyRetired` if the fee collector has been retired.
    pub fn harvest_fee_collector(
        &self,
        caller: Address,
        strategy_id: StrategyId,
        registry: &mut StrategyRegistry,
        env: Environment<'_>,
    ) -> YieldmillResult<HarvestReport> {
        self.ensure_operator(caller)?;
        let collector = registry.fee_collector(strategy_id)?;
        if self.retirement_status(&collector.address) {
            return Err(YieldmillError::AlreadyRetired {
                address: collector.address,
            });
        }
        let id = collector.id;
        let treasury = self.address;
        registry.with_optimizer(id, env, true, |optimizer, ctx| optimizer.harvest(ctx, treasury))
    }

    /// Move the whole position of fee collector `from` into `to`
    ///
    /// Returns the liquidity staked into `to`.
    ///
    /// # Errors
    /// - `InvalidParameter` if `from == to`
    /// - `UnknownFeeCollector` if either address is not a fee collector
    /// - `AlreadyRetired` if `from` (or `to`) has been retired
    pub fn retire_fee_collector(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        registry: &mut StrategyRegistry,
        mut env: Environment<'_>,
    ) -> YieldmillResult<u64> {
        self.ensure_operator(caller)?;
        check!(
            from != to,
            YieldmillError::InvalidParameter {
                param: "to",
                reason: "fee collector cannot be retired into itself",
            }
        );
        let from_collector = registry.require_fee_collector(&from)?;
        let to_collector = registry.require_fee_collector(&to)?;
        let (from_id, to_id) = (from_collector.id, to_collector.id);
        let from_strategy = registry.strategy(from_collector.strategy_id)?.clone();
        let to_strategy = registry.strategy(to_collector.strategy_id)?.clone();
        for address in [from, to] {
            if self.retirement_status(&address) {
                return Err(YieldmillError::AlreadyRetired { address });
            }
        }

        // Recorded before the collector is touched
        let block_height = env.world.block_height;
        self.retirements.insert(
            from,
            RetirementRecord {
                fee_collector: from,
                retired: true,
                migrated_to: to,
                retired_at: block_height,
            },
        );

        let treasury = self.address;
        let exit = registry.with_optimizer(from_id, env.reborrow(), false, |optimizer, ctx| {
            optimizer.exit_avalanche(ctx, treasury)
        })?;

        let mut migrated = exit.withdrawn;
        if migrated > 0 && !from_strategy.same_pair(&to_strategy) {
            migrated = self.convert(&from_strategy, &to_strategy, migrated, &mut env)?;
        }
        if migrated > 0 {
            env.world
                .approve(&to_strategy.staking_token, &treasury, &to, migrated);
            registry.with_optimizer(to_id, env.reborrow(), true, |optimizer, ctx| {
                optimizer.stake(ctx, treasury, migrated)
            })?;
        }

        env.events.emit(YieldmillEvent::FeeCollectorRetired {
            from,
            to,
            migrated,
            block_height,
        });
        Ok(migrated)
    }

    /// Turn `amount` of `from`'s liquidity held by the treasury into `to`'s
    /// liquidity
    ///
    /// One router: a single `swap_lp`. Two routers: unzap on the first into
    /// an asset of the target pair, zap that asset on the second.
    fn convert(
        &self,
        from: &Strategy,
        to: &Strategy,
        amount: u64,
        env: &mut Environment<'_>,
    ) -> YieldmillResult<u64> {
        let treasury = self.address;
        let slippage_bps = env.config.slippage_bps;
        let from_zap = Zap {
            address: from.zap,
            router: from.router,
        };
        env.world
            .approve(&from.staking_token, &treasury, &from_zap.address, amount);

        if from.router == to.router {
            let outcome = from_zap.swap_lp(
                env.world,
                &treasury,
                &from.staking_token,
                &to.staking_token,
                amount,
                slippage_bps,
                env.events,
            )?;
            return Ok(outcome.liquidity);
        }

        let bridge = from_zap
            .bridge_asset(env.world, &from.staking_token, &[to.token_a, to.token_b])
            .ok_or(YieldmillError::NoSwapRoute {
                token_in: from.staking_token,
                token_out: to.staking_token,
            })?;
        let bridged = from_zap.unzap(
            env.world,
            &treasury,
            &from.staking_token,
            &bridge,
            amount,
            slippage_bps,
            env.events,
        )?;

        let to_zap = Zap {
            address: to.zap,
            router: to.router,
        };
        env.world.approve(&bridge, &treasury, &to_zap.address, bridged);
        let request = ZapRequest::new(bridge, to.token_a, to.token_b, bridged, treasury);
        let outcome = to_zap.zap(env.world, &treasury, &request, slippage_bps, env.events)?;
        Ok(outcome.liquidity)
    }
}
