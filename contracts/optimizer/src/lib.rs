//! Optimizer Contract
//!
//! One instance per (strategy, depositor). The instance stakes the
//! strategy's liquidity token into its yield source under its own address,
//! harvests the reward, pays the fee collector and the dividend recipient,
//! and compounds the rest back into the position.
//!
//! ## Accounting
//!
//! The instance stores no balance. `staked()` is always read from the yield
//! source, keyed by the instance address.
//!
//! ## Entry Points
//!
//! Every mutating entry point runs the same prologue: the caller must be the
//! owner, then the instance's reentrancy guard is taken. The guard is
//! released on every exit path. Composite operations (`exit_avalanche`) call
//! the inner steps directly under one acquisition.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use yieldmill_common::{
    access_control::{Ownership, ReentrancyGuard},
    errors::{YieldmillError, YieldmillResult},
    events::{EventLog, YieldmillEvent},
    math::{bps_share, checked_mul_div, safe_sub, split_harvest, HarvestSplit},
    types::{
        fee_collector_address, optimizer_address, Address, OptimizerId, OptimizerKind,
        ProtocolConfig, Strategy, StrategyId, WithdrawalFeePolicy,
    },
    validation::{check, require_non_zero, require_sufficient_balance},
    world::World,
};
use yieldmill_zap::{Zap, ZapRequest};

// ============ Context ============

/// Everything an optimizer call touches besides the instance itself
pub struct OptimizerContext<'a> {
    pub world: &'a mut World,
    /// Strategy the instance belongs to
    pub strategy: &'a Strategy,
    /// Zap bound to the strategy's router
    pub zap: Zap,
    pub config: &'a ProtocolConfig,
    /// Fee collector of the strategy; `None` once it has been retired
    pub fee_collector: Option<Address>,
    pub events: &'a mut EventLog,
}

/// Outcome of one harvest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HarvestReport {
    /// Reward token processed (claimed plus already held)
    pub claimed: u64,
    /// Reward share routed to the fee collector
    pub fee: u64,
    /// Reward share paid to the dividend recipient
    pub dividend: u64,
    /// Reward share compounded
    pub compounded: u64,
    /// Liquidity staked into the fee collector
    pub fee_liquidity: u64,
    /// Liquidity restaked into this position
    pub compounded_liquidity: u64,
    /// `claimed` was left on the instance for a later harvest
    pub deferred: bool,
}

impl HarvestReport {
    fn from_split(claimed: u64, split: HarvestSplit) -> Self {
        Self {
            claimed,
            fee: split.fee,
            dividend: split.dividend,
            compounded: split.compound,
            ..Self::default()
        }
    }
}

/// Outcome of `exit_avalanche`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExitReport {
    pub harvest: HarvestReport,
    /// Liquidity sent to the owner
    pub withdrawn: u64,
}

// ============ Optimizer ============

/// Optimizer instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Optimizer {
    /// Arena index in the registry
    pub id: OptimizerId,
    /// Account holding the position
    pub address: Address,
    pub strategy_id: StrategyId,
    pub kind: OptimizerKind,
    ownership: Ownership,
    guard: ReentrancyGuard,
}

impl Optimizer {
    /// Optimizer for `owner` on `strategy_id`
    pub fn depositor(id: OptimizerId, owner: Address, strategy_id: StrategyId) -> Self {
        Self {
            id,
            address: optimizer_address(&owner, strategy_id),
            strategy_id,
            kind: OptimizerKind::Depositor,
            ownership: Ownership::new(owner),
            guard: ReentrancyGuard::new(),
        }
    }

    /// Fee collector of `strategy_id`, owned by the treasury
    pub fn fee_collector(id: OptimizerId, treasury: Address, strategy_id: StrategyId) -> Self {
        Self {
            id,
            address: fee_collector_address(strategy_id),
            strategy_id,
            kind: OptimizerKind::FeeCollector,
            ownership: Ownership::new(treasury),
            guard: ReentrancyGuard::new(),
        }
    }

    pub fn owner(&self) -> Address {
        self.ownership.owner()
    }

    pub fn is_fee_collector(&self) -> bool {
        self.kind == OptimizerKind::FeeCollector
    }

    pub fn is_executing(&self) -> bool {
        self.guard.is_entered()
    }

    /// Owner check, then run `op` holding the reentrancy guard
    fn guarded<T, F>(&mut self, caller: Address, op: F) -> YieldmillResult<T>
    where
        F: FnOnce(&mut Self) -> YieldmillResult<T>,
    {
        self.ownership.ensure(caller)?;
        self.guard.enter(self.address)?;
        let result = op(self);
        self.guard.exit();
        result
    }

    // ============ Mutating Entry Points ============

    /// Pull `amount` of the liquidity token from the owner and stake it
    pub fn stake(&mut self, ctx: &mut OptimizerContext<'_>, caller: Address, amount: u64) -> YieldmillResult<()> {
        self.guarded(caller, |me| me.stake_inner(ctx, amount))
    }

    /// Unstake `amount` and send it to the owner, returns the liquidity sent
    pub fn withdraw(&mut self, ctx: &mut OptimizerContext<'_>, caller: Address, amount: u64) -> YieldmillResult<u64> {
        self.guarded(caller, |me| {
            require_non_zero(amount)?;
            me.withdraw_inner(ctx, amount)
        })
    }

    /// Claim reward, pay fee and dividend, compound the rest
    pub fn harvest(&mut self, ctx: &mut OptimizerContext<'_>, caller: Address) -> YieldmillResult<HarvestReport> {
        self.guarded(caller, |me| me.harvest_inner(ctx))
    }

    /// Harvest, then withdraw everything
    pub fn exit_avalanche(&mut self, ctx: &mut OptimizerContext<'_>, caller: Address) -> YieldmillResult<ExitReport> {
        self.guarded(caller, |me| {
            let harvest = me.harvest_inner(ctx)?;
            let staked = me.staked(ctx.world, ctx.strategy)?;
            let withdrawn = if staked > 0 {
                me.withdraw_inner(ctx, staked)?
            } else {
                0
            };
            Ok(ExitReport { harvest, withdrawn })
        })
    }

    /// Convert `amount` of `token` from the owner into liquidity sent to the
    /// owner
    pub fn zap(
        &mut self,
        ctx: &mut OptimizerContext<'_>,
        caller: Address,
        token: Address,
        amount: u64,
    ) -> YieldmillResult<u64> {
        self.guarded(caller, |me| me.zap_inner(ctx, token, amount, false))
    }

    /// Convert `amount` of `token` from the owner into liquidity and stake it
    pub fn zap_and_stake(
        &mut self,
        ctx: &mut OptimizerContext<'_>,
        caller: Address,
        token: Address,
        amount: u64,
    ) -> YieldmillResult<u64> {
        self.guarded(caller, |me| me.zap_inner(ctx, token, amount, true))
    }

    /// Sweep the instance's balance of `token` to the owner
    ///
    /// # Errors
    /// `ProtectedToken` for the staking, reward or share token while the
    /// position is open.
    pub fn recover_erc20(
        &mut self,
        ctx: &mut OptimizerContext<'_>,
        caller: Address,
        token: Address,
    ) -> YieldmillResult<u64> {
        self.guarded(caller, |me| {
            let open = me.staked(ctx.world, ctx.strategy)? > 0;
            check!(
                !(open && ctx.strategy.protected_tokens().contains(&token)),
                YieldmillError::ProtectedToken { token }
            );
            let amount = ctx.world.balance_of(&token, &me.address);
            require_non_zero(amount)?;
            ctx.world.ledger.transfer(&token, &me.address, &me.owner(), amount)?;

            ctx.events.emit(YieldmillEvent::TokensRecovered {
                optimizer: me.address,
                token,
                amount,
                block_height: ctx.world.block_height,
            });
            Ok(amount)
        })
    }

    // ============ Read Accessors ============

    /// Authoritative staked balance, read from the yield source
    pub fn staked(&self, world: &World, strategy: &Strategy) -> YieldmillResult<u64> {
        world.staked(&strategy.source_address, &self.address)
    }

    /// Reward the source would pay on a claim now
    pub fn pending_rewards(&self, world: &World, strategy: &Strategy) -> YieldmillResult<u64> {
        let source = world.source(&strategy.source_address)?;
        source.pending_reward(&self.address, world.block_height)
    }

    // ============ Inner Steps ============

    fn stake_inner(&mut self, ctx: &mut OptimizerContext<'_>, amount: u64) -> YieldmillResult<()> {
        require_non_zero(amount)?;
        let lp = ctx.strategy.staking_token;
        ctx.world
            .ledger
            .transfer_from(&lp, &self.address, &self.owner(), &self.address, amount)?;
        deposit_for(ctx.world, ctx.strategy, &self.address, amount)?;
        self.emit_staked(ctx, amount)
    }

    fn withdraw_inner(&mut self, ctx: &mut OptimizerContext<'_>, amount: u64) -> YieldmillResult<u64> {
        let charged = !self.is_fee_collector();
        if charged && ctx.config.withdrawal_fee == WithdrawalFeePolicy::HarvestFirst {
            self.harvest_inner(ctx)?;
        }

        let staked = self.staked(ctx.world, ctx.strategy)?;
        require_sufficient_balance(staked, amount)?;

        let address = self.address;
        let received = ctx
            .world
            .with_source(&ctx.strategy.source_address, |source, ledger, block| {
                source.withdraw(ledger, &address, amount, block)
            })?;

        let fee = match (ctx.config.withdrawal_fee, ctx.fee_collector) {
            (WithdrawalFeePolicy::Flat { bps }, Some(_)) if charged => bps_share(received, bps)?,
            _ => 0,
        };
        if let (Some(fee_collector), true) = (ctx.fee_collector, fee > 0) {
            self.credit_fee_collector(ctx, &fee_collector, fee)?;
            ctx.events.emit(YieldmillEvent::WithdrawalFeeCharged {
                optimizer: address,
                fee_collector,
                amount: fee,
                block_height: ctx.world.block_height,
            });
        }

        let payout = safe_sub(received, fee)?;
        ctx.world
            .ledger
            .transfer(&ctx.strategy.staking_token, &address, &self.owner(), payout)?;

        let remaining = self.staked(ctx.world, ctx.strategy)?;
        ctx.events.emit(YieldmillEvent::Withdrawn {
            optimizer: address,
            amount: payout,
            fee,
            remaining,
            block_height: ctx.world.block_height,
        });
        Ok(payout)
    }

    fn harvest_inner(&mut self, ctx: &mut OptimizerContext<'_>) -> YieldmillResult<HarvestReport> {
        // Vaults compound internally
        let Some(reward) = ctx.strategy.reward_token else {
            return Ok(HarvestReport::default());
        };

        let address = self.address;
        ctx.world
            .with_source(&ctx.strategy.source_address, |source, ledger, block| {
                source.claim(ledger, &address, block)
            })?;
        let claimed = ctx.world.balance_of(&reward, &address);
        if claimed == 0 {
            return Ok(HarvestReport::default());
        }
        if claimed < ctx.config.min_harvest_amount {
            return Ok(self.defer_harvest(ctx, claimed));
        }

        // Fee collectors compound everything
        let (fee_bps, dividend_bps) = match (self.kind, ctx.fee_collector) {
            (OptimizerKind::FeeCollector, _) => (0, 0),
            (OptimizerKind::Depositor, Some(_)) => (ctx.config.fee_bps, ctx.config.dividend_bps),
            (OptimizerKind::Depositor, None) => (0, ctx.config.dividend_bps),
        };
        let split = split_harvest(claimed, fee_bps, dividend_bps)?;
        let mut report = HarvestReport::from_split(claimed, split);

        // Nothing is paid out unless the zap leg can mint liquidity
        let to_zap = split.fee + split.compound;
        if to_zap > 0
            && ctx.zap.preview_liquidity(
                ctx.world,
                &reward,
                &ctx.strategy.token_a,
                &ctx.strategy.token_b,
                to_zap,
            )? == 0
        {
            return Ok(self.defer_harvest(ctx, claimed));
        }

        if split.dividend > 0 {
            ctx.world
                .ledger
                .transfer(&reward, &address, &ctx.config.dividend_recipient, split.dividend)?;
        }

        if to_zap > 0 {
            ctx.world.approve(&reward, &address, &ctx.zap.address, to_zap);
            let request = ZapRequest {
                token_in: reward,
                token_a: ctx.strategy.token_a,
                token_b: ctx.strategy.token_b,
                amount_in: to_zap,
                to: address,
                dust_to: address,
            };
            let outcome = ctx
                .zap
                .zap(ctx.world, &address, &request, ctx.config.slippage_bps, ctx.events)?;

            let fee_liquidity =
                checked_mul_div(outcome.liquidity as u128, split.fee as u128, to_zap as u128)? as u64;
            let compounded_liquidity = safe_sub(outcome.liquidity, fee_liquidity)?;

            if let (Some(fee_collector), true) = (ctx.fee_collector, fee_liquidity > 0) {
                self.credit_fee_collector(ctx, &fee_collector, fee_liquidity)?;
            }
            if compounded_liquidity > 0 {
                deposit_for(ctx.world, ctx.strategy, &address, compounded_liquidity)?;
            }
            report.fee_liquidity = fee_liquidity;
            report.compounded_liquidity = compounded_liquidity;
        }

        ctx.events.emit(YieldmillEvent::Harvested {
            optimizer: address,
            claimed,
            fee: split.fee,
            dividend: split.dividend,
            compounded: split.compound,
            block_height: ctx.world.block_height,
        });
        Ok(report)
    }

    /// Keep `pending` reward on the instance; the next harvest picks it up
    fn defer_harvest(&self, ctx: &mut OptimizerContext<'_>, pending: u64) -> HarvestReport {
        ctx.events.emit(YieldmillEvent::HarvestDeferred {
            optimizer: self.address,
            pending,
            block_height: ctx.world.block_height,
        });
        HarvestReport {
            claimed: pending,
            deferred: true,
            ..HarvestReport::default()
        }
    }

    fn zap_inner(
        &mut self,
        ctx: &mut OptimizerContext<'_>,
        token: Address,
        amount: u64,
        stake: bool,
    ) -> YieldmillResult<u64> {
        require_non_zero(amount)?;
        let owner = self.owner();
        let address = self.address;
        ctx.world
            .ledger
            .transfer_from(&token, &address, &owner, &address, amount)?;
        ctx.world.approve(&token, &address, &ctx.zap.address, amount);

        let request = ZapRequest {
            token_in: token,
            token_a: ctx.strategy.token_a,
            token_b: ctx.strategy.token_b,
            amount_in: amount,
            to: if stake { address } else { owner },
            dust_to: owner,
        };
        let outcome = ctx
            .zap
            .zap(ctx.world, &address, &request, ctx.config.slippage_bps, ctx.events)?;

        if stake {
            deposit_for(ctx.world, ctx.strategy, &address, outcome.liquidity)?;
            self.emit_staked(ctx, outcome.liquidity)?;
        }
        Ok(outcome.liquidity)
    }

    /// Move `amount` of liquidity held by this instance into the fee
    /// collector's position
    fn credit_fee_collector(
        &self,
        ctx: &mut OptimizerContext<'_>,
        fee_collector: &Address,
        amount: u64,
    ) -> YieldmillResult<()> {
        ctx.world
            .ledger
            .transfer(&ctx.strategy.staking_token, &self.address, fee_collector, amount)?;
        deposit_for(ctx.world, ctx.strategy, fee_collector, amount)
    }

    fn emit_staked(&self, ctx: &mut OptimizerContext<'_>, amount: u64) -> YieldmillResult<()> {
        let total_staked = self.staked(ctx.world, ctx.strategy)?;
        ctx.events.emit(YieldmillEvent::Staked {
            optimizer: self.address,
            amount,
            total_staked,
            block_height: ctx.world.block_height,
        });
        Ok(())
    }
}

/// Stake `amount` of liquidity held by `account` into the strategy's source
fn deposit_for(world: &mut World, strategy: &Strategy, account: &Address, amount: u64) -> YieldmillResult<()> {
    world.approve(&strategy.staking_token, account, &strategy.source_address, amount);
    world.with_source(&strategy.source_address, |source, ledger, block| {
        source.deposit(ledger, account, amount, block)
    })
}
