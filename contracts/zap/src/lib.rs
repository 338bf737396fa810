//! Zap Contract
//!
//! Converts a single asset into a liquidity position for any pair on one
//! router, and back. There is at most one zap per router; the `ZapRegistry`
//! creates them on the operator's request.
//!
//! ## Flow
//!
//! Funds are pulled from the caller onto the zap account, every swap and
//! liquidity call is made from that account, and the zap ends each call
//! holding nothing: liquidity goes to the requested recipient and unpaired
//! leftovers (dust) are returned.
//!
//! ## Split
//!
//! When the input is one of the pair's assets, the zap swaps just enough of
//! it that the remainder and the swap output match the post-swap reserve
//! ratio (see `math::optimal_swap_amount`). Every swap has a minimum output
//! derived from the standard 0.3% fee quote minus the configured tolerance.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use yieldmill_common::{
    access_control::Ownership,
    amm::plan_liquidity,
    constants::amm,
    errors::{YieldmillError, YieldmillResult},
    events::{EventLog, YieldmillEvent},
    math::{self, apply_slippage, optimal_swap_amount, safe_add, safe_sub},
    types::{zap_address, Address, ZapEntry},
    validation::require_non_zero,
    world::World,
    BTreeMap, Vec,
};

// ============ Zap ============

/// Conversion request for `Zap::zap`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZapRequest {
    /// Asset supplied by the caller
    pub token_in: Address,
    /// First asset of the target pair
    pub token_a: Address,
    /// Second asset of the target pair
    pub token_b: Address,
    pub amount_in: u64,
    /// Receives the liquidity tokens
    pub to: Address,
    /// Receives unpaired leftovers
    pub dust_to: Address,
}

impl ZapRequest {
    /// Liquidity and dust both go back to `account`
    pub fn new(token_in: Address, token_a: Address, token_b: Address, amount_in: u64, account: Address) -> Self {
        Self {
            token_in,
            token_a,
            token_b,
            amount_in,
            to: account,
            dust_to: account,
        }
    }
}

/// What a zap produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ZapOutcome {
    /// Liquidity token of the target pair
    pub pair: Address,
    /// Liquidity minted
    pub liquidity: u64,
    /// Leftover of `token_a` returned
    pub dust_a: u64,
    /// Leftover of `token_b` returned
    pub dust_b: u64,
}

/// Zap bound to one router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Zap {
    pub address: Address,
    pub router: Address,
}

impl From<ZapEntry> for Zap {
    fn from(entry: ZapEntry) -> Self {
        Self {
            address: entry.zap,
            router: entry.router,
        }
    }
}

impl Zap {
    pub fn new(router: Address) -> Self {
        Self {
            address: zap_address(&router),
            router,
        }
    }

    pub fn entry(&self) -> ZapEntry {
        ZapEntry {
            router: self.router,
            zap: self.address,
        }
    }

    /// Convert `request.amount_in` of `request.token_in` (pulled from
    /// `caller`, who must have approved the zap) into liquidity for
    /// (`token_a`, `token_b`)
    ///
    /// # Errors
    /// - `ZeroAmount` if `amount_in == 0`
    /// - `NoSwapRoute` if the pair or a route into it does not exist
    /// - `SlippageExceeded` if a swap returns less than the derived minimum
    pub fn zap(
        &self,
        world: &mut World,
        caller: &Address,
        request: &ZapRequest,
        slippage_bps: u64,
        events: &mut EventLog,
    ) -> YieldmillResult<ZapOutcome> {
        require_non_zero(request.amount_in)?;
        world.ledger.transfer_from(
            &request.token_in,
            &self.address,
            caller,
            &self.address,
            request.amount_in,
        )?;

        let (pair, liquidity) = self.provide(
            world,
            request.token_in,
            request.token_a,
            request.token_b,
            request.amount_in,
            slippage_bps,
        )?;
        world.ledger.transfer(&pair, &self.address, &request.to, liquidity)?;
        let dust_a = self.sweep(world, &request.token_a, &request.dust_to)?;
        let dust_b = self.sweep(world, &request.token_b, &request.dust_to)?;

        events.emit(YieldmillEvent::Zapped {
            zap: self.address,
            account: *caller,
            token_in: request.token_in,
            amount_in: request.amount_in,
            liquidity,
            block_height: world.block_height,
        });

        Ok(ZapOutcome {
            pair,
            liquidity,
            dust_a,
            dust_b,
        })
    }

    /// Remove `lp_amount` of `lp_token` pulled from `caller` and convert both
    /// legs into `token_out`, sent back to `caller`
    ///
    /// # Errors
    /// `InsufficientLiquidity` if `lp_amount` exceeds the caller's balance or
    /// its allowance to the zap.
    #[allow(clippy::too_many_arguments)]
    pub fn unzap(
        &self,
        world: &mut World,
        caller: &Address,
        lp_token: &Address,
        token_out: &Address,
        lp_amount: u64,
        slippage_bps: u64,
        events: &mut EventLog,
    ) -> YieldmillResult<u64> {
        require_non_zero(lp_amount)?;
        if !self.can_unzap_to(world, lp_token, token_out) {
            return Err(YieldmillError::NoSwapRoute {
                token_in: *lp_token,
                token_out: *token_out,
            });
        }
        self.pull_liquidity(world, caller, lp_token, lp_amount)?;

        let amount_out = self.liquidate(world, lp_token, token_out, lp_amount, slippage_bps)?;
        world.ledger.transfer(token_out, &self.address, caller, amount_out)?;

        events.emit(YieldmillEvent::Unzapped {
            zap: self.address,
            account: *caller,
            token_out: *token_out,
            liquidity: lp_amount,
            amount_out,
            block_height: world.block_height,
        });
        Ok(amount_out)
    }

    /// Move `amount` of liquidity from `lp_in` into `lp_out`: unzap into an
    /// asset of `lp_out`, then zap that asset into `lp_out`
    #[allow(clippy::too_many_arguments)]
    pub fn swap_lp(
        &self,
        world: &mut World,
        caller: &Address,
        lp_in: &Address,
        lp_out: &Address,
        amount: u64,
        slippage_bps: u64,
        events: &mut EventLog,
    ) -> YieldmillResult<ZapOutcome> {
        require_non_zero(amount)?;
        let target_pair = world
            .router(&self.router)?
            .pair_by_address(lp_out)
            .copied()
            .ok_or(YieldmillError::NoSwapRoute {
                token_in: *lp_in,
                token_out: *lp_out,
            })?;
        let target = self
            .bridge_asset(world, lp_in, &[target_pair.token0, target_pair.token1])
            .ok_or(YieldmillError::NoSwapRoute {
                token_in: *lp_in,
                token_out: *lp_out,
            })?;
        self.pull_liquidity(world, caller, lp_in, amount)?;

        let intermediate = self.liquidate(world, lp_in, &target, amount, slippage_bps)?;
        let (pair, liquidity) = self.provide(
            world,
            target,
            target_pair.token0,
            target_pair.token1,
            intermediate,
            slippage_bps,
        )?;
        world.ledger.transfer(&pair, &self.address, caller, liquidity)?;
        let dust_a = self.sweep(world, &target_pair.token0, caller)?;
        let dust_b = self.sweep(world, &target_pair.token1, caller)?;

        events.emit(YieldmillEvent::LpSwapped {
            zap: self.address,
            account: *caller,
            from_pair: *lp_in,
            to_pair: *lp_out,
            liquidity_in: amount,
            liquidity_out: liquidity,
            block_height: world.block_height,
        });

        Ok(ZapOutcome {
            pair,
            liquidity,
            dust_a,
            dust_b,
        })
    }

    /// Returns true if both legs of `lp_token` can be turned into `token_out`
    pub fn can_unzap_to(&self, world: &World, lp_token: &Address, token_out: &Address) -> bool {
        let Ok(router) = world.router(&self.router) else {
            return false;
        };
        match router.pair_by_address(lp_token) {
            Some(pair) => [pair.token0, pair.token1]
                .iter()
                .all(|leg| leg == token_out || router.pair_for(leg, token_out).is_some()),
            None => false,
        }
    }

    /// First of `candidates` that `lp_token` can be unzapped into
    pub fn bridge_asset(&self, world: &World, lp_token: &Address, candidates: &[Address]) -> Option<Address> {
        candidates
            .iter()
            .copied()
            .find(|candidate| self.can_unzap_to(world, lp_token, candidate))
    }

    /// Liquidity that zapping `amount` of `token_in` into the (a, b) pair
    /// would mint at current reserves; moves nothing
    ///
    /// Zero when a leg of the conversion rounds down to nothing, which is
    /// exactly when `zap` would fail with `InsufficientLiquidity`.
    pub fn preview_liquidity(
        &self,
        world: &World,
        token_in: &Address,
        token_a: &Address,
        token_b: &Address,
        amount: u64,
    ) -> YieldmillResult<u64> {
        if amount == 0 {
            return Ok(0);
        }
        let router = world.router(&self.router)?;
        let ledger = &world.ledger;
        let pair = router
            .pair_for(token_a, token_b)
            .copied()
            .ok_or(YieldmillError::NoSwapRoute {
                token_in: *token_a,
                token_out: *token_b,
            })?;

        let (leg_in, amount) = if pair.contains(token_in) {
            (*token_in, amount)
        } else {
            let leg = [pair.token0, pair.token1]
                .into_iter()
                .find(|leg| router.pair_for(token_in, leg).is_some())
                .ok_or(YieldmillError::NoSwapRoute {
                    token_in: *token_in,
                    token_out: *token_a,
                })?;
            (leg, router.get_amount_out(ledger, amount, token_in, &leg)?)
        };
        let leg_out = pair.counterpart(&leg_in).ok_or(YieldmillError::NoSwapRoute {
            token_in: leg_in,
            token_out: *token_b,
        })?;
        if amount == 0 {
            return Ok(0);
        }

        let (reserve_in, reserve_out) = router.get_reserves(ledger, &leg_in, &leg_out)?;
        let swap_amount = optimal_swap_amount(amount, reserve_in, amm::SWAP_FEE_BPS)?;
        if swap_amount == 0 || swap_amount == amount {
            return Ok(0);
        }
        let received = math::get_amount_out(swap_amount, reserve_in, reserve_out, router.fee_bps)?;
        if received == 0 {
            return Ok(0);
        }

        match plan_liquidity(
            safe_add(reserve_in, swap_amount)?,
            safe_sub(reserve_out, received)?,
            ledger.total_supply(&pair.address),
            amount - swap_amount,
            received,
        ) {
            Ok(plan) => Ok(plan.liquidity),
            Err(YieldmillError::InsufficientLiquidity { .. }) => Ok(0),
            Err(e) => Err(e),
        }
    }

    // ============ Internal Steps ============

    fn pull_liquidity(
        &self,
        world: &mut World,
        caller: &Address,
        lp_token: &Address,
        amount: u64,
    ) -> YieldmillResult<()> {
        let balance = world.ledger.balance_of(lp_token, caller);
        let allowance = world.ledger.allowance(lp_token, caller, &self.address);
        let available = balance.min(allowance);
        if available < amount {
            return Err(YieldmillError::InsufficientLiquidity {
                available,
                requested: amount,
            });
        }
        world
            .ledger
            .transfer_from(lp_token, &self.address, caller, &self.address, amount)
    }

    /// Turn `amount` of `token_in` held by the zap into liquidity held by
    /// the zap
    fn provide(
        &self,
        world: &mut World,
        token_in: Address,
        token_a: Address,
        token_b: Address,
        amount: u64,
        slippage_bps: u64,
    ) -> YieldmillResult<(Address, u64)> {
        let router = world.router(&self.router)?;
        let pair = router
            .pair_for(&token_a, &token_b)
            .copied()
            .ok_or(YieldmillError::NoSwapRoute {
                token_in: token_a,
                token_out: token_b,
            })?;

        let (leg_in, amount) = if pair.contains(&token_in) {
            (token_in, amount)
        } else {
            let leg = [pair.token0, pair.token1]
                .into_iter()
                .find(|leg| router.pair_for(&token_in, leg).is_some())
                .ok_or(YieldmillError::NoSwapRoute {
                    token_in,
                    token_out: token_a,
                })?;
            let received = self.swap(world, token_in, leg, amount, slippage_bps)?;
            (leg, received)
        };
        let leg_out = pair.counterpart(&leg_in).ok_or(YieldmillError::NoSwapRoute {
            token_in: leg_in,
            token_out: token_b,
        })?;

        let (reserve_in, _) = world
            .router(&self.router)?
            .get_reserves(&world.ledger, &leg_in, &leg_out)?;
        let swap_amount = optimal_swap_amount(amount, reserve_in, amm::SWAP_FEE_BPS)?;
        let received = if swap_amount > 0 {
            self.swap(world, leg_in, leg_out, swap_amount, slippage_bps)?
        } else {
            0
        };
        let remaining = amount - swap_amount;

        let (router, ledger) = world.router_and_ledger(&self.router)?;
        ledger.approve(&leg_in, &self.address, &router.address, remaining);
        ledger.approve(&leg_out, &self.address, &router.address, received);
        let added = router.add_liquidity(
            ledger,
            &self.address,
            &leg_in,
            &leg_out,
            remaining,
            received,
            0,
            0,
            &self.address,
        )?;
        ledger.approve(&leg_in, &self.address, &router.address, 0);
        ledger.approve(&leg_out, &self.address, &router.address, 0);

        Ok((pair.address, added.liquidity))
    }

    /// Remove `lp_amount` held by the zap and convert it into `token_out`
    /// held by the zap
    fn liquidate(
        &self,
        world: &mut World,
        lp_token: &Address,
        token_out: &Address,
        lp_amount: u64,
        slippage_bps: u64,
    ) -> YieldmillResult<u64> {
        let (router, ledger) = world.router_and_ledger(&self.router)?;
        let pair = router
            .pair_by_address(lp_token)
            .copied()
            .ok_or(YieldmillError::NoSwapRoute {
                token_in: *lp_token,
                token_out: *token_out,
            })?;

        ledger.approve(lp_token, &self.address, &router.address, lp_amount);
        let (amount0, amount1) = router.remove_liquidity(
            ledger,
            &self.address,
            &pair.token0,
            &pair.token1,
            lp_amount,
            0,
            0,
            &self.address,
        )?;

        let mut total = 0u64;
        for (leg, amount) in [(pair.token0, amount0), (pair.token1, amount1)] {
            let converted = if leg == *token_out {
                amount
            } else if amount == 0 {
                0
            } else {
                self.swap(world, leg, *token_out, amount, slippage_bps)?
            };
            total = safe_add(total, converted)?;
        }
        Ok(total)
    }

    /// Swap from the zap account with a minimum output of the standard-fee
    /// quote less `slippage_bps`
    fn swap(
        &self,
        world: &mut World,
        token_in: Address,
        token_out: Address,
        amount: u64,
        slippage_bps: u64,
    ) -> YieldmillResult<u64> {
        let (router, ledger) = world.router_and_ledger(&self.router)?;
        let (reserve_in, reserve_out) = router.get_reserves(ledger, &token_in, &token_out)?;
        let expected = math::get_amount_out(amount, reserve_in, reserve_out, amm::SWAP_FEE_BPS)?;
        let minimum = apply_slippage(expected, slippage_bps)?;

        ledger.approve(&token_in, &self.address, &router.address, amount);
        router.swap_exact_tokens_for_tokens(
            ledger,
            &self.address,
            amount,
            minimum,
            &[token_in, token_out],
            &self.address,
        )
    }

    /// Send the zap's whole balance of `token` to `to`
    fn sweep(&self, world: &mut World, token: &Address, to: &Address) -> YieldmillResult<u64> {
        let amount = world.ledger.balance_of(token, &self.address);
        if amount > 0 {
            world.ledger.transfer(token, &self.address, to, amount)?;
        }
        Ok(amount)
    }
}

// ============ Zap Registry ============

/// At most one zap per router, created by the operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ZapRegistry {
    operator: Ownership,
    zaps: Vec<ZapEntry>,
    by_router: BTreeMap<Address, u64>,
}

impl ZapRegistry {
    pub fn new(operator: Address) -> Self {
        Self {
            operator: Ownership::new(operator),
            zaps: Vec::new(),
            by_router: BTreeMap::new(),
        }
    }

    pub fn operator(&self) -> Address {
        self.operator.owner()
    }

    /// Deploy the zap for `router`
    ///
    /// # Errors
    /// - `Unauthorized` unless `caller` is the operator
    /// - `UnknownRouter` if `router` is not deployed
    /// - `DuplicateZap` if the router already has a zap
    pub fn create_zap(
        &mut self,
        caller: Address,
        world: &World,
        router: Address,
        events: &mut EventLog,
    ) -> YieldmillResult<Address> {
        self.operator.ensure(caller)?;
        world.router(&router)?;
        if self.by_router.contains_key(&router) {
            return Err(YieldmillError::DuplicateZap { router });
        }

        let zap = Zap::new(router);
        let index = self.zaps.len() as u64;
        self.zaps.push(zap.entry());
        self.by_router.insert(router, index);

        events.emit(YieldmillEvent::ZapCreated {
            index,
            router,
            zap: zap.address,
            block_height: world.block_height,
        });
        Ok(zap.address)
    }

    pub fn zap_count(&self) -> u64 {
        self.zaps.len() as u64
    }

    pub fn zap_at(&self, index: u64) -> Option<Zap> {
        self.zaps.get(index as usize).copied().map(Zap::from)
    }

    pub fn zap_by_router(&self, router: &Address) -> Option<Zap> {
        self.by_router.get(router).and_then(|index| self.zap_at(*index))
    }

    /// Zap for `router` or `ZapNotFound`
    pub fn require_zap(&self, router: &Address) -> YieldmillResult<Zap> {
        self.zap_by_router(router)
            .ok_or(YieldmillError::ZapNotFound { router: *router })
    }

    pub fn entries(&self) -> &[ZapEntry] {
        &self.zaps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yieldmill_common::constants::{token::ONE, zap::DEFAULT_SLIPPAGE_BPS};

    const OPERATOR: Address = [1u8; 32];
    const ALICE: Address = [2u8; 32];
    const PROVIDER: Address = [3u8; 32];

    struct Fixture {
        world: World,
        router: Address,
        wmatic: Address,
        must: Address,
        usdc: Address,
        wmatic_must: Address,
        must_usdc: Address,
    }

    fn seed_pair(world: &mut World, router: &Address, a: Address, b: Address, amount_a: u64, amount_b: u64) -> Address {
        let pair = world.create_pair(router, a, b).unwrap();
        world.mint(&a, &PROVIDER, amount_a).unwrap();
        world.mint(&b, &PROVIDER, amount_b).unwrap();
        world.approve(&a, &PROVIDER, router, amount_a);
        world.approve(&b, &PROVIDER, router, amount_b);
        let (router, ledger) = world.router_and_ledger(router).unwrap();
        router
            .add_liquidity(ledger, &PROVIDER, &a, &b, amount_a, amount_b, 0, 0, &PROVIDER)
            .unwrap();
        pair
    }

    fn setup() -> Fixture {
        setup_with_fee(amm::SWAP_FEE_BPS)
    }

    fn setup_with_fee(fee_bps: u64) -> Fixture {
        let mut world = World::new();
        let wmatic = world.create_token("WMATIC").unwrap();
        let must = world.create_token("MUST").unwrap();
        let usdc = world.create_token("USDC").unwrap();
        let router = world.create_router(fee_bps);
        let wmatic_must = seed_pair(&mut world, &router, wmatic, must, 10_000 * ONE, 500 * ONE);
        let must_usdc = seed_pair(&mut world, &router, must, usdc, 500 * ONE, 20_000 * ONE);
        Fixture {
            world,
            router,
            wmatic,
            must,
            usdc,
            wmatic_must,
            must_usdc,
        }
    }

    fn fund(world: &mut World, token: &Address, zap: &Zap, amount: u64) {
        world.mint(token, &ALICE, amount).unwrap();
        world.approve(token, &ALICE, &zap.address, amount);
    }

    #[test]
    fn test_zap_pair_asset_leaves_little_dust() {
        let mut f = setup();
        let zap = Zap::new(f.router);
        let mut events = EventLog::new();
        fund(&mut f.world, &f.wmatic, &zap, 100 * ONE);

        let request = ZapRequest::new(f.wmatic, f.wmatic, f.must, 100 * ONE, ALICE);
        let outcome = zap.zap(&mut f.world, &ALICE, &request, DEFAULT_SLIPPAGE_BPS, &mut events).unwrap();

        assert!(outcome.liquidity > 0);
        assert_eq!(outcome.pair, f.wmatic_must);
        assert_eq!(f.world.balance_of(&f.wmatic_must, &ALICE), outcome.liquidity);
        // Balanced split: leftovers are a rounding error of the input
        assert!(outcome.dust_a <= ONE / 1_000);
        assert!(f.world.balance_of(&f.must, &ALICE) <= ONE / 1_000);
        // Zap keeps nothing
        assert_eq!(f.world.balance_of(&f.wmatic, &zap.address), 0);
        assert_eq!(f.world.balance_of(&f.must, &zap.address), 0);
        assert_eq!(f.world.balance_of(&f.wmatic_must, &zap.address), 0);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_zap_outside_asset_routes_through_leg() {
        let mut f = setup();
        let zap = Zap::new(f.router);
        let mut events = EventLog::new();
        fund(&mut f.world, &f.usdc, &zap, 400 * ONE);

        let request = ZapRequest::new(f.usdc, f.wmatic, f.must, 400 * ONE, ALICE);
        let outcome = zap.zap(&mut f.world, &ALICE, &request, DEFAULT_SLIPPAGE_BPS, &mut events).unwrap();

        assert!(outcome.liquidity > 0);
        assert_eq!(f.world.balance_of(&f.usdc, &ALICE), 0);
        assert_eq!(f.world.balance_of(&f.usdc, &zap.address), 0);
    }

    #[test]
    fn test_preview_matches_zap() {
        let mut f = setup();
        let zap = Zap::new(f.router);
        let mut events = EventLog::new();

        for (token_in, amount) in [(f.wmatic, 100 * ONE), (f.usdc, 400 * ONE)] {
            let preview = zap
                .preview_liquidity(&f.world, &token_in, &f.wmatic, &f.must, amount)
                .unwrap();
            fund(&mut f.world, &token_in, &zap, amount);
            let request = ZapRequest::new(token_in, f.wmatic, f.must, amount, ALICE);
            let outcome = zap.zap(&mut f.world, &ALICE, &request, DEFAULT_SLIPPAGE_BPS, &mut events).unwrap();
            assert_eq!(preview, outcome.liquidity);
        }
        assert_eq!(zap.preview_liquidity(&f.world, &f.wmatic, &f.wmatic, &f.must, 0).unwrap(), 0);
    }

    #[test]
    fn test_preview_is_zero_when_swap_leg_rounds_away() {
        let mut f = setup();
        let wbtc = f.world.create_token("WBTC").unwrap();
        let shib = f.world.create_token("SHIB").unwrap();
        seed_pair(&mut f.world, &f.router, wbtc, shib, 2_000_000, 10_000_000_000_000_000);
        let zap = Zap::new(f.router);
        let mut events = EventLog::new();

        let amount = 99_999;
        assert_eq!(zap.preview_liquidity(&f.world, &shib, &wbtc, &shib, amount).unwrap(), 0);

        fund(&mut f.world, &shib, &zap, amount);
        let request = ZapRequest::new(shib, wbtc, shib, amount, ALICE);
        assert!(zap.zap(&mut f.world, &ALICE, &request, DEFAULT_SLIPPAGE_BPS, &mut events).is_err());
    }

    #[test]
    fn test_zap_errors() {
        let mut f = setup();
        let zap = Zap::new(f.router);
        let mut events = EventLog::new();
        let orphan = f.world.create_token("ORPHAN").unwrap();
        fund(&mut f.world, &orphan, &zap, 10 * ONE);

        let request = ZapRequest::new(orphan, f.wmatic, f.must, 0, ALICE);
        assert!(matches!(
            zap.zap(&mut f.world, &ALICE, &request, DEFAULT_SLIPPAGE_BPS, &mut events),
            Err(YieldmillError::ZeroAmount)
        ));

        let request = ZapRequest::new(orphan, f.wmatic, f.must, 10 * ONE, ALICE);
        assert!(matches!(
            zap.zap(&mut f.world, &ALICE, &request, DEFAULT_SLIPPAGE_BPS, &mut events),
            Err(YieldmillError::NoSwapRoute { .. })
        ));

        let request = ZapRequest::new(orphan, f.wmatic, f.usdc, 10 * ONE, ALICE);
        assert!(matches!(
            zap.zap(&mut f.world, &ALICE, &request, DEFAULT_SLIPPAGE_BPS, &mut events),
            Err(YieldmillError::NoSwapRoute { .. })
        ));
        assert!(events.is_empty());
    }

    #[test]
    fn test_expensive_router_trips_slippage() {
        // 10% swap fee: output lands far below the 0.3% quote
        let mut f = setup_with_fee(1_000);
        let zap = Zap::new(f.router);
        let mut events = EventLog::new();
        fund(&mut f.world, &f.wmatic, &zap, 100 * ONE);

        let request = ZapRequest::new(f.wmatic, f.wmatic, f.must, 100 * ONE, ALICE);
        assert!(matches!(
            zap.zap(&mut f.world, &ALICE, &request, DEFAULT_SLIPPAGE_BPS, &mut events),
            Err(YieldmillError::SlippageExceeded { .. })
        ));
    }

    #[test]
    fn test_zap_then_unzap_returns_no_more_than_input() {
        let mut f = setup();
        let zap = Zap::new(f.router);
        let mut events = EventLog::new();
        fund(&mut f.world, &f.wmatic, &zap, 10 * ONE);

        let request = ZapRequest::new(f.wmatic, f.wmatic, f.must, 10 * ONE, ALICE);
        let outcome = zap.zap(&mut f.world, &ALICE, &request, DEFAULT_SLIPPAGE_BPS, &mut events).unwrap();
        let dust = f.world.balance_of(&f.wmatic, &ALICE);

        f.world.approve(&f.wmatic_must, &ALICE, &zap.address, outcome.liquidity);
        let out = zap
            .unzap(&mut f.world, &ALICE, &f.wmatic_must, &f.wmatic, outcome.liquidity, DEFAULT_SLIPPAGE_BPS, &mut events)
            .unwrap();

        assert!(out > 0);
        assert!(out + dust <= 10 * ONE);
        assert_eq!(f.world.balance_of(&f.wmatic, &ALICE), dust + out);
        assert_eq!(f.world.balance_of(&f.wmatic_must, &ALICE), 0);
    }

    #[test]
    fn test_unzap_requires_balance_and_allowance() {
        let mut f = setup();
        let zap = Zap::new(f.router);
        let mut events = EventLog::new();
        f.world
            .ledger
            .transfer(&f.wmatic_must, &PROVIDER, &ALICE, 5 * ONE)
            .unwrap();

        // No allowance
        assert!(matches!(
            zap.unzap(&mut f.world, &ALICE, &f.wmatic_must, &f.wmatic, ONE, DEFAULT_SLIPPAGE_BPS, &mut events),
            Err(YieldmillError::InsufficientLiquidity { available: 0, .. })
        ));

        // Allowance above balance
        f.world.approve(&f.wmatic_must, &ALICE, &zap.address, 50 * ONE);
        assert!(matches!(
            zap.unzap(&mut f.world, &ALICE, &f.wmatic_must, &f.wmatic, 6 * ONE, DEFAULT_SLIPPAGE_BPS, &mut events),
            Err(YieldmillError::InsufficientLiquidity { .. })
        ));

        assert!(zap
            .unzap(&mut f.world, &ALICE, &f.wmatic_must, &f.wmatic, 5 * ONE, DEFAULT_SLIPPAGE_BPS, &mut events)
            .is_ok());
    }

    #[test]
    fn test_swap_lp_moves_between_pairs() {
        let mut f = setup();
        let zap = Zap::new(f.router);
        let mut events = EventLog::new();
        f.world
            .ledger
            .transfer(&f.wmatic_must, &PROVIDER, &ALICE, 10 * ONE)
            .unwrap();
        f.world.approve(&f.wmatic_must, &ALICE, &zap.address, 10 * ONE);

        let outcome = zap
            .swap_lp(&mut f.world, &ALICE, &f.wmatic_must, &f.must_usdc, 10 * ONE, DEFAULT_SLIPPAGE_BPS, &mut events)
            .unwrap();

        assert_eq!(outcome.pair, f.must_usdc);
        assert_eq!(f.world.balance_of(&f.wmatic_must, &ALICE), 0);
        assert_eq!(f.world.balance_of(&f.must_usdc, &ALICE), outcome.liquidity);
        assert_eq!(f.world.balance_of(&f.must_usdc, &zap.address), 0);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_registry_create_zap() {
        let f = setup();
        let mut registry = ZapRegistry::new(OPERATOR);
        let mut events = EventLog::new();

        assert!(matches!(
            registry.create_zap(ALICE, &f.world, f.router, &mut events),
            Err(YieldmillError::Unauthorized { .. })
        ));
        assert!(matches!(
            registry.create_zap(OPERATOR, &f.world, [9u8; 32], &mut events),
            Err(YieldmillError::UnknownRouter { .. })
        ));

        let address = registry.create_zap(OPERATOR, &f.world, f.router, &mut events).unwrap();
        assert_eq!(address, zap_address(&f.router));
        assert!(matches!(
            registry.create_zap(OPERATOR, &f.world, f.router, &mut events),
            Err(YieldmillError::DuplicateZap { .. })
        ));

        assert_eq!(registry.zap_count(), 1);
        assert_eq!(registry.zap_at(0).unwrap().address, address);
        assert!(registry.zap_at(1).is_none());
        assert_eq!(registry.zap_by_router(&f.router).unwrap().router, f.router);
        assert!(matches!(
            registry.require_zap(&[9u8; 32]),
            Err(YieldmillError::ZapNotFound { .. })
        ));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_registry_indexes_are_sequential() {
        let mut f = setup();
        let second = f.world.create_router(amm::SWAP_FEE_BPS);
        let mut registry = ZapRegistry::new(OPERATOR);
        let mut events = EventLog::new();

        registry.create_zap(OPERATOR, &f.world, f.router, &mut events).unwrap();
        registry.create_zap(OPERATOR, &f.world, second, &mut events).unwrap();

        assert_eq!(registry.zap_count(), 2);
        assert_eq!(registry.zap_at(1).unwrap().router, second);
        assert_eq!(registry.entries().len(), 2);
    }
}
