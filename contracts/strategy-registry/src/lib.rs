//! Strategy Registry
//!
//! Catalog of strategies and the only factory for optimizer instances.
//!
//! ## Arena
//!
//! Optimizers live in one arena indexed by a stable `OptimizerId`. Fee
//! collectors share that arena: registering a strategy deploys its fee
//! collector first, so after `n` strategies and no depositors the optimizer
//! count is `n`. Explicit maps resolve an optimizer by (owner, strategy) and
//! by instance address.
//!
//! ## Authority
//!
//! Only the treasury registers strategies. Anyone may request an optimizer;
//! the caller becomes its owner and repeat requests return the same id.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use yieldmill_common::{
    access_control::Ownership,
    errors::{YieldmillError, YieldmillResult},
    events::{EventLog, YieldmillEvent},
    source::YieldSource,
    types::{
        fee_collector_address, Address, OptimizerId, ProtocolConfig, Strategy, StrategyId,
        StrategyParams,
    },
    world::World,
    BTreeMap, Vec,
};
use yieldmill_optimizer::{Optimizer, OptimizerContext};
use yieldmill_zap::{Zap, ZapRegistry};

/// Mutable surroundings of an optimizer call
pub struct Environment<'a> {
    pub world: &'a mut World,
    pub config: &'a ProtocolConfig,
    pub events: &'a mut EventLog,
}

impl Environment<'_> {
    /// Shorter-lived handle for a nested call
    pub fn reborrow(&mut self) -> Environment<'_> {
        Environment {
            world: &mut *self.world,
            config: self.config,
            events: &mut *self.events,
        }
    }
}

// ============ Registry ============

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct StrategyRegistry {
    treasury: Ownership,
    strategies: Vec<Strategy>,
    optimizers: Vec<Optimizer>,
    by_owner: BTreeMap<(Address, StrategyId), OptimizerId>,
    by_address: BTreeMap<Address, OptimizerId>,
}

impl StrategyRegistry {
    pub fn new(treasury: Address) -> Self {
        Self {
            treasury: Ownership::new(treasury),
            strategies: Vec::new(),
            optimizers: Vec::new(),
            by_owner: BTreeMap::new(),
            by_address: BTreeMap::new(),
        }
    }

    pub fn treasury(&self) -> Address {
        self.treasury.owner()
    }

    /// Register a strategy and deploy its fee collector
    ///
    /// Pair assets are read from the router's pair for the source's staking
    /// token; reward and share tokens from the source itself.
    ///
    /// # Errors
    /// - `Unauthorized` unless `caller` is the treasury
    /// - `UnknownRouter`, `UnknownPool` or `UnknownVault` for undeployed addresses
    /// - `ZapNotFound` if the router has no zap
    /// - `InvalidParameter` if the staking token is not a pair of the router
    pub fn add_strategy(
        &mut self,
        caller: Address,
        params: StrategyParams,
        zaps: &ZapRegistry,
        world: &World,
        events: &mut EventLog,
    ) -> YieldmillResult<StrategyId> {
        self.treasury.ensure(caller)?;
        let router_address = params.router();
        let router = world.router(&router_address)?;
        let zap = zaps.require_zap(&router_address)?;

        let source: &dyn YieldSource = match params {
            StrategyParams::StakingPool { pool, .. } => world.pool(&pool)?,
            StrategyParams::Vault { vault, .. } => world.vault(&vault)?,
        };
        let source_address = source.address();
        let staking_token = source.staking_token();
        let reward_token = source.reward_token();
        let share_token = source.receipt_token();
        let pair = router
            .pair_by_address(&staking_token)
            .ok_or(YieldmillError::InvalidParameter {
                param: "staking_token",
                reason: "staking token is not a pair of the router",
            })?;

        let strategy_id = self.strategies.len() as StrategyId;
        let fee_collector = Optimizer::fee_collector(self.next_optimizer_id(), self.treasury(), strategy_id);

        self.strategies.push(Strategy {
            id: strategy_id,
            token_a: pair.token0,
            token_b: pair.token1,
            staking_token,
            reward_token,
            source: source.kind(),
            source_address,
            share_token,
            router: router_address,
            zap: zap.address,
            fee_collector: fee_collector.id,
        });

        events.emit(YieldmillEvent::StrategyCreated {
            strategy_id,
            staking_token,
            source: source_address,
            router: router_address,
            block_height: world.block_height,
        });
        events.emit(YieldmillEvent::FeeCollectorCreated {
            strategy_id,
            optimizer_id: fee_collector.id,
            address: fee_collector.address,
            block_height: world.block_height,
        });
        self.insert(fee_collector);

        Ok(strategy_id)
    }

    /// Optimizer of `caller` on `strategy_id`, deployed on first request
    ///
    /// # Errors
    /// `InvalidStrategy` if `strategy_id >= strategy_count()`.
    pub fn create_optimizer(
        &mut self,
        caller: Address,
        strategy_id: StrategyId,
        block_height: u64,
        events: &mut EventLog,
    ) -> YieldmillResult<OptimizerId> {
        self.strategy(strategy_id)?;
        if let Some(id) = self.by_owner.get(&(caller, strategy_id)) {
            return Ok(*id);
        }

        let optimizer = Optimizer::depositor(self.next_optimizer_id(), caller, strategy_id);
        let id = optimizer.id;
        self.by_owner.insert((caller, strategy_id), id);

        events.emit(YieldmillEvent::OptimizerCreated {
            strategy_id,
            optimizer_id: id,
            owner: caller,
            address: optimizer.address,
            block_height,
        });
        self.insert(optimizer);
        Ok(id)
    }

    fn next_optimizer_id(&self) -> OptimizerId {
        self.optimizers.len() as OptimizerId
    }

    fn insert(&mut self, optimizer: Optimizer) {
        self.by_address.insert(optimizer.address, optimizer.id);
        self.optimizers.push(optimizer);
    }

    // ============ Execution ============

    /// Run `op` on optimizer `id` with its strategy, zap and fee collector
    /// wired in
    ///
    /// `fee_collector_active` is false once the strategy's fee collector has
    /// been retired.
    pub fn with_optimizer<T, F>(
        &mut self,
        id: OptimizerId,
        env: Environment<'_>,
        fee_collector_active: bool,
        op: F,
    ) -> YieldmillResult<T>
    where
        F: FnOnce(&mut Optimizer, &mut OptimizerContext<'_>) -> YieldmillResult<T>,
    {
        let optimizer = self
            .optimizers
            .get_mut(id as usize)
            .ok_or(YieldmillError::UnknownOptimizer { optimizer_id: id })?;
        let strategy = self
            .strategies
            .get(optimizer.strategy_id as usize)
            .ok_or(YieldmillError::InvalidStrategy {
                strategy_id: optimizer.strategy_id,
                strategy_count: self.strategies.len() as u64,
            })?;

        let mut ctx = OptimizerContext {
            world: env.world,
            strategy,
            zap: Zap {
                address: strategy.zap,
                router: strategy.router,
            },
            config: env.config,
            fee_collector: fee_collector_active.then(|| fee_collector_address(strategy.id)),
            events: env.events,
        };
        op(optimizer, &mut ctx)
    }

    // ============ Read Accessors ============

    pub fn strategy_count(&self) -> u64 {
        self.strategies.len() as u64
    }

    /// Strategy `id` or `InvalidStrategy`
    pub fn strategy(&self, id: StrategyId) -> YieldmillResult<&Strategy> {
        self.strategies
            .get(id as usize)
            .ok_or(YieldmillError::InvalidStrategy {
                strategy_id: id,
                strategy_count: self.strategy_count(),
            })
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    /// Depositor optimizers and fee collectors together
    pub fn optimizer_count(&self) -> u64 {
        self.optimizers.len() as u64
    }

    pub fn optimizer_at(&self, id: OptimizerId) -> Option<&Optimizer> {
        self.optimizers.get(id as usize)
    }

    pub fn optimizer_for(&self, owner: &Address, strategy_id: StrategyId) -> Option<&Optimizer> {
        self.by_owner
            .get(&(*owner, strategy_id))
            .and_then(|id| self.optimizer_at(*id))
    }

    pub fn optimizer_by_address(&self, address: &Address) -> Option<&Optimizer> {
        self.by_address.get(address).and_then(|id| self.optimizer_at(*id))
    }

    /// Fee collector deployed with `strategy_id`
    pub fn fee_collector(&self, strategy_id: StrategyId) -> YieldmillResult<&Optimizer> {
        let strategy = self.strategy(strategy_id)?;
        self.optimizer_at(strategy.fee_collector)
            .ok_or(YieldmillError::UnknownOptimizer {
                optimizer_id: strategy.fee_collector,
            })
    }

    pub fn is_fee_collector(&self, address: &Address) -> bool {
        self.optimizer_by_address(address)
            .is_some_and(Optimizer::is_fee_collector)
    }

    /// Fee collector at `address` or `UnknownFeeCollector`
    pub fn require_fee_collector(&self, address: &Address) -> YieldmillResult<&Optimizer> {
        self.optimizer_by_address(address)
            .filter(|optimizer| optimizer.is_fee_collector())
            .ok_or(YieldmillError::UnknownFeeCollector { address: *address })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yieldmill_common::constants::{amm, token::ONE};
    use yieldmill_common::events::EventType;

    const TREASURY: Address = [1u8; 32];
    const OPERATOR: Address = [2u8; 32];
    const ALICE: Address = [3u8; 32];
    const BOB: Address = [4u8; 32];
    const PROVIDER: Address = [5u8; 32];

    struct Fixture {
        world: World,
        zaps: ZapRegistry,
        router: Address,
        lp: Address,
        pool: Address,
        vault: Address,
        config: ProtocolConfig,
    }

    fn setup() -> Fixture {
        let mut world = World::new();
        let wmatic = world.create_token("WMATIC").unwrap();
        let must = world.create_token("MUST").unwrap();
        let router = world.create_router(amm::SWAP_FEE_BPS);
        let lp = world.create_pair(&router, wmatic, must).unwrap();
        world.mint(&wmatic, &PROVIDER, 1_000 * ONE).unwrap();
        world.mint(&must, &PROVIDER, 50 * ONE).unwrap();
        world.approve(&wmatic, &PROVIDER, &router, 1_000 * ONE);
        world.approve(&must, &PROVIDER, &router, 50 * ONE);
        let (pair_router, ledger) = world.router_and_ledger(&router).unwrap();
        pair_router
            .add_liquidity(ledger, &PROVIDER, &wmatic, &must, 1_000 * ONE, 50 * ONE, 0, 0, &PROVIDER)
            .unwrap();

        let pool = world.create_staking_pool(lp, must, ONE).unwrap();
        let vault = world.create_vault(lp).unwrap();

        let mut zaps = ZapRegistry::new(OPERATOR);
        zaps.create_zap(OPERATOR, &world, router, &mut EventLog::new()).unwrap();

        Fixture {
            world,
            zaps,
            router,
            lp,
            pool,
            vault,
            config: ProtocolConfig::new(TREASURY),
        }
    }

    fn pool_params(f: &Fixture) -> StrategyParams {
        StrategyParams::StakingPool {
            pool: f.pool,
            router: f.router,
        }
    }

    #[test]
    fn test_add_strategy_records_pair_and_fee_collector() {
        let f = setup();
        let mut registry = StrategyRegistry::new(TREASURY);
        let mut events = EventLog::new();

        let id = registry
            .add_strategy(TREASURY, pool_params(&f), &f.zaps, &f.world, &mut events)
            .unwrap();
        assert_eq!(id, 0);

        let strategy = registry.strategy(0).unwrap();
        assert_eq!(strategy.staking_token, f.lp);
        assert_eq!(strategy.source_address, f.pool);
        assert!(strategy.reward_token.is_some());
        assert_eq!(strategy.zap, f.zaps.zap_by_router(&f.router).unwrap().address);

        let collector = registry.fee_collector(0).unwrap();
        assert_eq!(collector.owner(), TREASURY);
        assert_eq!(collector.address, fee_collector_address(0));
        assert!(registry.is_fee_collector(&collector.address));
        assert_eq!(events.filter_by_type(EventType::StrategyCreated).len(), 1);
        assert_eq!(events.filter_by_type(EventType::FeeCollectorCreated).len(), 1);
    }

    #[test]
    fn test_add_strategy_errors() {
        let mut f = setup();
        let mut registry = StrategyRegistry::new(TREASURY);
        let mut events = EventLog::new();

        assert!(matches!(
            registry.add_strategy(ALICE, pool_params(&f), &f.zaps, &f.world, &mut events),
            Err(YieldmillError::Unauthorized { .. })
        ));

        let bare_router = f.world.create_router(amm::SWAP_FEE_BPS);
        let params = StrategyParams::StakingPool {
            pool: f.pool,
            router: bare_router,
        };
        assert!(matches!(
            registry.add_strategy(TREASURY, params, &f.zaps, &f.world, &mut events),
            Err(YieldmillError::ZapNotFound { .. })
        ));

        let params = StrategyParams::Vault {
            vault: f.pool,
            router: f.router,
        };
        assert!(matches!(
            registry.add_strategy(TREASURY, params, &f.zaps, &f.world, &mut events),
            Err(YieldmillError::UnknownVault { .. })
        ));

        // Pool staking a plain token
        let plain = f.world.create_token("PLAIN").unwrap();
        let reward = f.world.create_token("RWD").unwrap();
        let pool = f.world.create_staking_pool(plain, reward, ONE).unwrap();
        let params = StrategyParams::StakingPool { pool, router: f.router };
        assert!(matches!(
            registry.add_strategy(TREASURY, params, &f.zaps, &f.world, &mut events),
            Err(YieldmillError::InvalidParameter { .. })
        ));

        assert_eq!(registry.strategy_count(), 0);
        assert!(events.is_empty());
    }

    #[test]
    fn test_fee_collectors_share_the_optimizer_arena() {
        let f = setup();
        let mut registry = StrategyRegistry::new(TREASURY);
        let mut events = EventLog::new();
        registry
            .add_strategy(TREASURY, pool_params(&f), &f.zaps, &f.world, &mut events)
            .unwrap();
        let vault = StrategyParams::Vault {
            vault: f.vault,
            router: f.router,
        };
        registry.add_strategy(TREASURY, vault, &f.zaps, &f.world, &mut events).unwrap();

        assert_eq!(registry.strategy_count(), 2);
        assert_eq!(registry.optimizer_count(), 2);
        let vault_strategy = registry.strategy(1).unwrap();
        assert!(vault_strategy.is_vault());
        assert_eq!(vault_strategy.reward_token, None);
        assert_eq!(
            vault_strategy.share_token,
            Some(f.world.vault(&f.vault).unwrap().share_token)
        );

        let id = registry.create_optimizer(ALICE, 1, 0, &mut events).unwrap();
        assert_eq!(id, 2);
        assert_eq!(registry.optimizer_count(), 3);
    }

    #[test]
    fn test_create_optimizer_reuses_per_owner() {
        let f = setup();
        let mut registry = StrategyRegistry::new(TREASURY);
        let mut events = EventLog::new();

        assert!(matches!(
            registry.create_optimizer(ALICE, 0, 0, &mut events),
            Err(YieldmillError::InvalidStrategy { strategy_id: 0, strategy_count: 0 })
        ));

        registry
            .add_strategy(TREASURY, pool_params(&f), &f.zaps, &f.world, &mut events)
            .unwrap();
        let alice = registry.create_optimizer(ALICE, 0, 0, &mut events).unwrap();
        let again = registry.create_optimizer(ALICE, 0, 0, &mut events).unwrap();
        let bob = registry.create_optimizer(BOB, 0, 0, &mut events).unwrap();

        assert_eq!(alice, again);
        assert_ne!(alice, bob);
        assert_eq!(events.filter_by_type(EventType::OptimizerCreated).len(), 2);

        let optimizer = registry.optimizer_for(&ALICE, 0).unwrap();
        assert_eq!(optimizer.owner(), ALICE);
        assert!(!registry.is_fee_collector(&optimizer.address));
        assert_eq!(registry.optimizer_by_address(&optimizer.address).unwrap().id, alice);
        assert!(registry.optimizer_for(&ALICE, 1).is_none());
        assert!(matches!(
            registry.require_fee_collector(&optimizer.address),
            Err(YieldmillError::UnknownFeeCollector { .. })
        ));
    }

    #[test]
    fn test_with_optimizer_wires_strategy() {
        let mut f = setup();
        let mut registry = StrategyRegistry::new(TREASURY);
        let mut events = EventLog::new();
        registry
            .add_strategy(TREASURY, pool_params(&f), &f.zaps, &f.world, &mut events)
            .unwrap();
        let id = registry.create_optimizer(ALICE, 0, 0, &mut events).unwrap();
        let address = registry.optimizer_at(id).unwrap().address;

        f.world.ledger.transfer(&f.lp, &PROVIDER, &ALICE, 10 * ONE).unwrap();
        f.world.approve(&f.lp, &ALICE, &address, 10 * ONE);

        let env = Environment {
            world: &mut f.world,
            config: &f.config,
            events: &mut events,
        };
        registry
            .with_optimizer(id, env, true, |optimizer, ctx| {
                assert_eq!(ctx.fee_collector, Some(fee_collector_address(0)));
                optimizer.stake(ctx, ALICE, 10 * ONE)
            })
            .unwrap();
        assert_eq!(f.world.staked(&f.pool, &address).unwrap(), 10 * ONE);

        let env = Environment {
            world: &mut f.world,
            config: &f.config,
            events: &mut events,
        };
        assert!(matches!(
            registry.with_optimizer(99, env, true, |_, _| Ok(())),
            Err(YieldmillError::UnknownOptimizer { optimizer_id: 99 })
        ));
    }
}
