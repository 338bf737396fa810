//! Protocol Facade
//!
//! `Protocol` owns the whole system: the environment, the zap registry, the
//! strategy registry, the treasury, the configuration and the event log.
//! Every mutating operation runs through `transact`, which executes it on a
//! draft copy and commits only on `Ok`, events included.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use yieldmill_common::{
    errors::{YieldmillError, YieldmillResult},
    events::{EventLog, YieldmillEvent},
    transaction::atomically,
    types::{Address, OptimizerId, ProtocolConfig, StrategyId, WithdrawalFeePolicy},
    validation::require_valid_address,
    world::World,
};
use yieldmill_optimizer::{ExitReport, HarvestReport, Optimizer, OptimizerContext};
use yieldmill_strategy_registry::{Environment, StrategyRegistry};
use yieldmill_zap::{ZapOutcome, ZapRegistry, ZapRequest};

use crate::Treasury;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Protocol {
    world: World,
    zaps: ZapRegistry,
    registry: StrategyRegistry,
    treasury: Treasury,
    config: ProtocolConfig,
    events: EventLog,
}

impl Protocol {
    /// Protocol run by `operator` on top of `world`
    ///
    /// # Errors
    /// - `InvalidParameter` if `operator` is the zero address
    /// - `InvalidConfig` if `config` is out of bounds
    pub fn new(operator: Address, world: World, config: ProtocolConfig) -> YieldmillResult<Self> {
        require_valid_address(operator, "operator")?;
        config.validate()?;
        let treasury = Treasury::new(operator);
        Ok(Self {
            world,
            zaps: ZapRegistry::new(operator),
            registry: StrategyRegistry::new(treasury.address()),
            treasury,
            config,
            events: EventLog::new(),
        })
    }

    /// Run `op` all-or-nothing
    pub fn transact<T, F>(&mut self, op: F) -> YieldmillResult<T>
    where
        F: FnOnce(&mut Self) -> YieldmillResult<T>,
    {
        atomically(self, op)
    }

    fn env(&mut self) -> (Environment<'_>, &mut StrategyRegistry, &ZapRegistry, &mut Treasury) {
        (
            Environment {
                world: &mut self.world,
                config: &self.config,
                events: &mut self.events,
            },
            &mut self.registry,
            &self.zaps,
            &mut self.treasury,
        )
    }

    // ============ Accessors ============

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Direct access to the environment, outside any transaction
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn zaps(&self) -> &ZapRegistry {
        &self.zaps
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    pub fn treasury(&self) -> &Treasury {
        &self.treasury
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Hand the committed events to the caller and start a fresh log
    pub fn drain_events(&mut self) -> EventLog {
        std::mem::take(&mut self.events)
    }

    // ============ Operator ============

    /// Deploy the zap for `router`
    pub fn create_zap(&mut self, caller: Address, router: Address) -> YieldmillResult<Address> {
        self.transact(|p| p.zaps.create_zap(caller, &p.world, router, &mut p.events))
    }

    pub fn create_strategy(&mut self, caller: Address, pool: Address, router: Address) -> YieldmillResult<StrategyId> {
        self.transact(|p| {
            let (env, registry, zaps, treasury) = p.env();
            treasury.create_strategy(caller, pool, router, registry, zaps, env)
        })
    }

    pub fn create_vault_strategy(
        &mut self,
        caller: Address,
        vault: Address,
        router: Address,
    ) -> YieldmillResult<StrategyId> {
        self.transact(|p| {
            let (env, registry, zaps, treasury) = p.env();
            treasury.create_vault_strategy(caller, vault, router, registry, zaps, env)
        })
    }

    /// Retire fee collector `from` into `to`, returns the liquidity moved
    pub fn retire_fee_collector(&mut self, caller: Address, from: Address, to: Address) -> YieldmillResult<u64> {
        self.transact(|p| {
            let (env, registry, _, treasury) = p.env();
            treasury.retire_fee_collector(caller, from, to, registry, env)
        })
    }

    pub fn harvest_fee_collector(&mut self, caller: Address, strategy_id: StrategyId) -> YieldmillResult<HarvestReport> {
        self.transact(|p| {
            let (env, registry, _, treasury) = p.env();
            treasury.harvest_fee_collector(caller, strategy_id, registry, env)
        })
    }

    pub fn retirement_status(&self, fee_collector: &Address) -> bool {
        self.treasury.retirement_status(fee_collector)
    }

    // ============ Configuration ============

    /// Replace the configuration
    ///
    /// # Errors
    /// - `Unauthorized` unless `caller` is the operator
    /// - `InvalidConfig` if `config` is out of bounds
    pub fn update_config(&mut self, caller: Address, config: ProtocolConfig) -> YieldmillResult<()> {
        self.transact(|p| {
            p.treasury.ensure_operator(caller)?;
            config.validate()?;
            p.events.emit(YieldmillEvent::ConfigUpdated {
                fee_bps: config.fee_bps,
                dividend_bps: config.dividend_bps,
                dividend_recipient: config.dividend_recipient,
                withdrawal_fee: config.withdrawal_fee,
                slippage_bps: config.slippage_bps,
                min_harvest_amount: config.min_harvest_amount,
                block_height: p.world.block_height,
            });
            p.config = config;
            Ok(())
        })
    }

    pub fn set_fee_rates(&mut self, caller: Address, fee_bps: u64, dividend_bps: u64) -> YieldmillResult<()> {
        let config = ProtocolConfig {
            fee_bps,
            dividend_bps,
            ..self.config.clone()
        };
        self.update_config(caller, config)
    }

    pub fn set_dividend_recipient(&mut self, caller: Address, recipient: Address) -> YieldmillResult<()> {
        let config = ProtocolConfig {
            dividend_recipient: recipient,
            ..self.config.clone()
        };
        self.update_config(caller, config)
    }

    pub fn set_withdrawal_fee(&mut self, caller: Address, policy: WithdrawalFeePolicy) -> YieldmillResult<()> {
        let config = ProtocolConfig {
            withdrawal_fee: policy,
            ..self.config.clone()
        };
        self.update_config(caller, config)
    }

    pub fn set_slippage_tolerance(&mut self, caller: Address, slippage_bps: u64) -> YieldmillResult<()> {
        let config = ProtocolConfig {
            slippage_bps,
            ..self.config.clone()
        };
        self.update_config(caller, config)
    }

    /// Claims below `amount` are deferred to a later harvest
    pub fn set_min_harvest_amount(&mut self, caller: Address, amount: u64) -> YieldmillResult<()> {
        let config = ProtocolConfig {
            min_harvest_amount: amount,
            ..self.config.clone()
        };
        self.update_config(caller, config)
    }

    // ============ Depositors ============

    /// Optimizer of `caller` on `strategy_id`, deployed on first request
    pub fn create_optimizer(&mut self, caller: Address, strategy_id: StrategyId) -> YieldmillResult<OptimizerId> {
        self.transact(|p| {
            let block_height = p.world.block_height;
            p.registry
                .create_optimizer(caller, strategy_id, block_height, &mut p.events)
        })
    }

    /// Run `op` on optimizer `id` inside a transaction
    fn with_optimizer<T, F>(&mut self, id: OptimizerId, op: F) -> YieldmillResult<T>
    where
        F: FnOnce(&mut Optimizer, &mut OptimizerContext<'_>) -> YieldmillResult<T>,
    {
        self.transact(|p| {
            let strategy_id = p
                .registry
                .optimizer_at(id)
                .ok_or(YieldmillError::UnknownOptimizer { optimizer_id: id })?
                .strategy_id;
            let fee_collector = p.registry.fee_collector(strategy_id)?.address;
            let active = !p.treasury.retirement_status(&fee_collector);
            let (env, registry, _, _) = p.env();
            registry.with_optimizer(id, env, active, op)
        })
    }

    pub fn stake(&mut self, caller: Address, id: OptimizerId, amount: u64) -> YieldmillResult<()> {
        self.with_optimizer(id, |optimizer, ctx| optimizer.stake(ctx, caller, amount))
    }

    pub fn withdraw(&mut self, caller: Address, id: OptimizerId, amount: u64) -> YieldmillResult<u64> {
        self.with_optimizer(id, |optimizer, ctx| optimizer.withdraw(ctx, caller, amount))
    }

    pub fn harvest(&mut self, caller: Address, id: OptimizerId) -> YieldmillResult<HarvestReport> {
        self.with_optimizer(id, |optimizer, ctx| optimizer.harvest(ctx, caller))
    }

    pub fn exit_avalanche(&mut self, caller: Address, id: OptimizerId) -> YieldmillResult<ExitReport> {
        self.with_optimizer(id, |optimizer, ctx| optimizer.exit_avalanche(ctx, caller))
    }

    /// Zap `amount` of `token` into the strategy's liquidity, sent to `caller`
    pub fn zap_into(&mut self, caller: Address, id: OptimizerId, token: Address, amount: u64) -> YieldmillResult<u64> {
        self.with_optimizer(id, |optimizer, ctx| optimizer.zap(ctx, caller, token, amount))
    }

    pub fn zap_and_stake(
        &mut self,
        caller: Address,
        id: OptimizerId,
        token: Address,
        amount: u64,
    ) -> YieldmillResult<u64> {
        self.with_optimizer(id, |optimizer, ctx| optimizer.zap_and_stake(ctx, caller, token, amount))
    }

    pub fn recover_erc20(&mut self, caller: Address, id: OptimizerId, token: Address) -> YieldmillResult<u64> {
        self.with_optimizer(id, |optimizer, ctx| optimizer.recover_erc20(ctx, caller, token))
    }

    // ============ Read Views ============

    fn optimizer(&self, id: OptimizerId) -> YieldmillResult<&Optimizer> {
        self.registry
            .optimizer_at(id)
            .ok_or(YieldmillError::UnknownOptimizer { optimizer_id: id })
    }

    pub fn staked(&self, id: OptimizerId) -> YieldmillResult<u64> {
        let optimizer = self.optimizer(id)?;
        let strategy = self.registry.strategy(optimizer.strategy_id)?;
        optimizer.staked(&self.world, strategy)
    }

    pub fn pending_rewards(&self, id: OptimizerId) -> YieldmillResult<u64> {
        let optimizer = self.optimizer(id)?;
        let strategy = self.registry.strategy(optimizer.strategy_id)?;
        optimizer.pending_rewards(&self.world, strategy)
    }

    /// Staked balance of the fee collector of `strategy_id`
    pub fn fee_collector_staked(&self, strategy_id: StrategyId) -> YieldmillResult<u64> {
        let collector = self.registry.fee_collector(strategy_id)?;
        self.staked(collector.id)
    }

    // ============ Zap Passthroughs ============

    /// Zap through the zap of `router`; `caller` must have approved it
    pub fn zap(&mut self, caller: Address, router: Address, request: ZapRequest) -> YieldmillResult<ZapOutcome> {
        self.transact(|p| {
            let zap = p.zaps.require_zap(&router)?;
            zap.zap(&mut p.world, &caller, &request, p.config.slippage_bps, &mut p.events)
        })
    }

    pub fn unzap(
        &mut self,
        caller: Address,
        router: Address,
        lp_token: Address,
        token_out: Address,
        lp_amount: u64,
    ) -> YieldmillResult<u64> {
        self.transact(|p| {
            let zap = p.zaps.require_zap(&router)?;
            zap.unzap(
                &mut p.world,
                &caller,
                &lp_token,
                &token_out,
                lp_amount,
                p.config.slippage_bps,
                &mut p.events,
            )
        })
    }

    pub fn swap_lp(
        &mut self,
        caller: Address,
        router: Address,
        lp_in: Address,
        lp_out: Address,
        amount: u64,
    ) -> YieldmillResult<ZapOutcome> {
        self.transact(|p| {
            let zap = p.zaps.require_zap(&router)?;
            zap.swap_lp(
                &mut p.world,
                &caller,
                &lp_in,
                &lp_out,
                amount,
                p.config.slippage_bps,
                &mut p.events,
            )
        })
    }
}
