//! Constant-Product Router
//!
//! Uniswap-v2 style pairs behind a router: `swap_exact_tokens_for_tokens`,
//! `add_liquidity`, `remove_liquidity` and `get_reserves`. Each pair's
//! liquidity token is a ledger token whose address is the pair address, and
//! pair reserves are the pair account's ledger balances.

use crate::constants::{amm, seeds};
use crate::errors::{YieldmillError, YieldmillResult};
use crate::ledger::TokenLedger;
use crate::math::{self, checked_mul_div, isqrt};
use crate::types::{derive_address, Address, ZERO_ADDRESS};
use crate::validation::require_min_output;
use crate::{BTreeMap, Vec};
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// A two-asset pool; `token0 < token1`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct AmmPair {
    /// Pair account and liquidity token address
    pub address: Address,
    pub token0: Address,
    pub token1: Address,
}

impl AmmPair {
    pub fn contains(&self, token: &Address) -> bool {
        self.token0 == *token || self.token1 == *token
    }

    /// The other asset of the pair
    pub fn counterpart(&self, token: &Address) -> Option<Address> {
        if self.token0 == *token {
            Some(self.token1)
        } else if self.token1 == *token {
            Some(self.token0)
        } else {
            None
        }
    }
}

/// Result of `add_liquidity`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidityAdded {
    pub amount_a: u64,
    pub amount_b: u64,
    pub liquidity: u64,
}

/// Amounts a deposit of up to (`desired_a`, `desired_b`) takes at the given
/// reserves and the liquidity it mints
///
/// Pure; `add_liquidity` executes exactly this plan. A plan minting zero
/// liquidity is returned as such, it is up to the caller to reject it.
pub fn plan_liquidity(
    reserve_a: u64,
    reserve_b: u64,
    supply: u64,
    desired_a: u64,
    desired_b: u64,
) -> YieldmillResult<LiquidityAdded> {
    let (amount_a, amount_b) = if reserve_a == 0 && reserve_b == 0 {
        (desired_a, desired_b)
    } else {
        let optimal_b = math::quote(desired_a, reserve_a, reserve_b)?;
        if optimal_b <= desired_b {
            (desired_a, optimal_b)
        } else {
            let optimal_a = math::quote(desired_b, reserve_b, reserve_a)?;
            (optimal_a.min(desired_a), desired_b)
        }
    };

    let liquidity = if supply == 0 {
        let root = isqrt(amount_a as u128 * amount_b as u128) as u64;
        root.checked_sub(amm::MINIMUM_LIQUIDITY)
            .ok_or(YieldmillError::InsufficientLiquidity {
                available: root,
                requested: amm::MINIMUM_LIQUIDITY,
            })?
    } else {
        let by_a = checked_mul_div(amount_a as u128, supply as u128, reserve_a as u128)?;
        let by_b = checked_mul_div(amount_b as u128, supply as u128, reserve_b as u128)?;
        by_a.min(by_b) as u64
    };

    Ok(LiquidityAdded {
        amount_a,
        amount_b,
        liquidity,
    })
}

fn sort_tokens(a: Address, b: Address) -> (Address, Address) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Router plus the pairs it created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct SwapRouter {
    pub address: Address,
    /// Swap fee charged on input, in basis points
    pub fee_bps: u64,
    pairs: BTreeMap<(Address, Address), AmmPair>,
    by_address: BTreeMap<Address, (Address, Address)>,
}

impl SwapRouter {
    pub fn new(address: Address, fee_bps: u64) -> Self {
        Self {
            address,
            fee_bps,
            pairs: BTreeMap::new(),
            by_address: BTreeMap::new(),
        }
    }

    /// Create the pair for (a, b) and register its liquidity token
    pub fn create_pair(
        &mut self,
        ledger: &mut TokenLedger,
        token_a: Address,
        token_b: Address,
    ) -> YieldmillResult<Address> {
        if token_a == token_b {
            return Err(YieldmillError::InvalidParameter {
                param: "token_b",
                reason: "pair assets must differ",
            });
        }
        ledger.token_info(&token_a)?;
        ledger.token_info(&token_b)?;
        let key = sort_tokens(token_a, token_b);
        if self.pairs.contains_key(&key) {
            return Err(YieldmillError::InvalidParameter {
                param: "token_b",
                reason: "pair already exists",
            });
        }

        let address = derive_address(seeds::ENVIRONMENT, &[b"pair", &self.address, &key.0, &key.1]);
        ledger.register(address, "LP")?;
        self.pairs.insert(
            key,
            AmmPair {
                address,
                token0: key.0,
                token1: key.1,
            },
        );
        self.by_address.insert(address, key);
        Ok(address)
    }

    pub fn pair_for(&self, token_a: &Address, token_b: &Address) -> Option<&AmmPair> {
        self.pairs.get(&sort_tokens(*token_a, *token_b))
    }

    pub fn pair_by_address(&self, pair: &Address) -> Option<&AmmPair> {
        self.by_address.get(pair).and_then(|key| self.pairs.get(key))
    }

    fn require_pair(&self, token_a: &Address, token_b: &Address) -> YieldmillResult<AmmPair> {
        self.pair_for(token_a, token_b)
            .copied()
            .ok_or(YieldmillError::NoSwapRoute {
                token_in: *token_a,
                token_out: *token_b,
            })
    }

    /// Reserves of the (a, b) pair, in that order
    pub fn get_reserves(
        &self,
        ledger: &TokenLedger,
        token_a: &Address,
        token_b: &Address,
    ) -> YieldmillResult<(u64, u64)> {
        let pair = self.require_pair(token_a, token_b)?;
        Ok((
            ledger.balance_of(token_a, &pair.address),
            ledger.balance_of(token_b, &pair.address),
        ))
    }

    /// Output of swapping `amount_in` along `path` at current reserves
    pub fn get_amounts_out(
        &self,
        ledger: &TokenLedger,
        amount_in: u64,
        path: &[Address],
    ) -> YieldmillResult<Vec<u64>> {
        if path.len() < 2 {
            return Err(YieldmillError::InvalidParameter {
                param: "path",
                reason: "path needs at least two tokens",
            });
        }
        let mut amounts = Vec::with_capacity(path.len());
        amounts.push(amount_in);
        let mut amount = amount_in;
        for hop in path.windows(2) {
            let (reserve_in, reserve_out) = self.get_reserves(ledger, &hop[0], &hop[1])?;
            amount = math::get_amount_out(amount, reserve_in, reserve_out, self.fee_bps)?;
            amounts.push(amount);
        }
        Ok(amounts)
    }

    /// Single-hop output at current reserves
    pub fn get_amount_out(
        &self,
        ledger: &TokenLedger,
        amount_in: u64,
        token_in: &Address,
        token_out: &Address,
    ) -> YieldmillResult<u64> {
        let (reserve_in, reserve_out) = self.get_reserves(ledger, token_in, token_out)?;
        math::get_amount_out(amount_in, reserve_in, reserve_out, self.fee_bps)
    }

    // ============ Mutations ============

    /// Swap `amount_in` of `path[0]` from `caller` for at least
    /// `amount_out_min` of the last token, delivered to `to`
    ///
    /// The router pulls the input with `transfer_from`, so `caller` must
    /// have approved the router.
    pub fn swap_exact_tokens_for_tokens(
        &self,
        ledger: &mut TokenLedger,
        caller: &Address,
        amount_in: u64,
        amount_out_min: u64,
        path: &[Address],
        to: &Address,
    ) -> YieldmillResult<u64> {
        let amounts = self.get_amounts_out(ledger, amount_in, path)?;
        let amount_out = amounts[amounts.len() - 1];
        require_min_output(amount_out, amount_out_min)?;

        let first = self.require_pair(&path[0], &path[1])?;
        ledger.transfer_from(&path[0], &self.address, caller, &first.address, amount_in)?;

        for (i, hop) in path.windows(2).enumerate() {
            let pair = self.require_pair(&hop[0], &hop[1])?;
            let recipient = match path.get(i + 2) {
                Some(next) => self.require_pair(&hop[1], next)?.address,
                None => *to,
            };
            ledger.transfer(&hop[1], &pair.address, &recipient, amounts[i + 1])?;
        }
        Ok(amount_out)
    }

    /// Deposit up to the desired amounts at the pair ratio and mint
    /// liquidity to `to`
    #[allow(clippy::too_many_arguments)]
    pub fn add_liquidity(
        &self,
        ledger: &mut TokenLedger,
        caller: &Address,
        token_a: &Address,
        token_b: &Address,
        desired_a: u64,
        desired_b: u64,
        min_a: u64,
        min_b: u64,
        to: &Address,
    ) -> YieldmillResult<LiquidityAdded> {
        let pair = self.require_pair(token_a, token_b)?;
        let (reserve_a, reserve_b) = self.get_reserves(ledger, token_a, token_b)?;
        let supply = ledger.total_supply(&pair.address);

        let LiquidityAdded {
            amount_a,
            amount_b,
            liquidity,
        } = plan_liquidity(reserve_a, reserve_b, supply, desired_a, desired_b)?;
        require_min_output(amount_a, min_a)?;
        require_min_output(amount_b, min_b)?;
        if liquidity == 0 {
            return Err(YieldmillError::InsufficientLiquidity {
                available: 0,
                requested: amount_a.max(amount_b),
            });
        }

        ledger.transfer_from(token_a, &self.address, caller, &pair.address, amount_a)?;
        ledger.transfer_from(token_b, &self.address, caller, &pair.address, amount_b)?;
        if supply == 0 {
            // Locked forever so the pair can never be fully drained
            ledger.mint(&pair.address, &ZERO_ADDRESS, amm::MINIMUM_LIQUIDITY)?;
        }
        ledger.mint(&pair.address, to, liquidity)?;

        Ok(LiquidityAdded {
            amount_a,
            amount_b,
            liquidity,
        })
    }

    /// Burn `liquidity` pulled from `caller` and send both assets to `to`
    #[allow(clippy::too_many_arguments)]
    pub fn remove_liquidity(
        &self,
        ledger: &mut TokenLedger,
        caller: &Address,
        token_a: &Address,
        token_b: &Address,
        liquidity: u64,
        min_a: u64,
        min_b: u64,
        to: &Address,
    ) -> YieldmillResult<(u64, u64)> {
        if liquidity == 0 {
            return Err(YieldmillError::ZeroAmount);
        }
        let pair = self.require_pair(token_a, token_b)?;
        let (reserve_a, reserve_b) = self.get_reserves(ledger, token_a, token_b)?;
        let supply = ledger.total_supply(&pair.address);

        ledger.transfer_from(&pair.address, &self.address, caller, &pair.address, liquidity)?;

        let amount_a = checked_mul_div(liquidity as u128, reserve_a as u128, supply as u128)? as u64;
        let amount_b = checked_mul_div(liquidity as u128, reserve_b as u128, supply as u128)? as u64;
        require_min_output(amount_a, min_a)?;
        require_min_output(amount_b, min_b)?;

        ledger.burn(&pair.address, &pair.address, liquidity)?;
        ledger.transfer(token_a, &pair.address, to, amount_a)?;
        ledger.transfer(token_b, &pair.address, to, amount_b)?;
        Ok((amount_a, amount_b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROUTER: Address = [30u8; 32];
    const WMATIC: Address = [31u8; 32];
    const MUST: Address = [32u8; 32];
    const USDC: Address = [33u8; 32];
    const ALICE: Address = [1u8; 32];

    fn setup() -> (SwapRouter, TokenLedger, Address) {
        let mut ledger = TokenLedger::new();
        for (token, symbol) in [(WMATIC, "WMATIC"), (MUST, "MUST"), (USDC, "USDC")] {
            ledger.register(token, symbol).unwrap();
            ledger.mint(&token, &ALICE, 1_000_000_000).unwrap();
            ledger.approve(&token, &ALICE, &ROUTER, u64::MAX);
        }
        let mut router = SwapRouter::new(ROUTER, amm::SWAP_FEE_BPS);
        let pair = router.create_pair(&mut ledger, WMATIC, MUST).unwrap();
        router
            .add_liquidity(&mut ledger, &ALICE, &WMATIC, &MUST, 1_000_000, 4_000_000, 0, 0, &ALICE)
            .unwrap();
        (router, ledger, pair)
    }

    #[test]
    fn test_first_mint_locks_minimum_liquidity() {
        let (_, ledger, pair) = setup();
        // sqrt(1e6 * 4e6) = 2e6
        assert_eq!(ledger.total_supply(&pair), 2_000_000);
        assert_eq!(ledger.balance_of(&pair, &ALICE), 2_000_000 - amm::MINIMUM_LIQUIDITY);
        assert_eq!(ledger.balance_of(&pair, &ZERO_ADDRESS), amm::MINIMUM_LIQUIDITY);
    }

    #[test]
    fn test_create_pair_rejects_duplicates() {
        let (mut router, mut ledger, _) = setup();
        assert!(router.create_pair(&mut ledger, MUST, WMATIC).is_err());
        assert!(router.create_pair(&mut ledger, MUST, MUST).is_err());
    }

    #[test]
    fn test_add_liquidity_keeps_ratio() {
        let (router, mut ledger, _) = setup();
        let added = router
            .add_liquidity(&mut ledger, &ALICE, &WMATIC, &MUST, 1_000, 10_000, 0, 0, &ALICE)
            .unwrap();
        assert_eq!(added.amount_a, 1_000);
        assert_eq!(added.amount_b, 4_000);
        assert_eq!(added.liquidity, 2_000);
    }

    #[test]
    fn test_plan_liquidity_rounds_to_zero_on_extreme_ratio() {
        // 40_000 units of the cheap side pair with nothing of the dear one
        let plan = plan_liquidity(10_000_000_000_000_000, 2_000_000, 4_000_000_000, 40_000, 1).unwrap();
        assert_eq!(plan.amount_b, 0);
        assert_eq!(plan.liquidity, 0);
    }

    #[test]
    fn test_swap_and_min_out() {
        let (router, mut ledger, pair) = setup();
        let expected = router.get_amount_out(&ledger, 10_000, &WMATIC, &MUST).unwrap();

        assert!(matches!(
            router.swap_exact_tokens_for_tokens(&mut ledger, &ALICE, 10_000, expected + 1, &[WMATIC, MUST], &ALICE),
            Err(YieldmillError::SlippageExceeded { .. })
        ));

        let before = ledger.balance_of(&MUST, &ALICE);
        let out = router
            .swap_exact_tokens_for_tokens(&mut ledger, &ALICE, 10_000, expected, &[WMATIC, MUST], &ALICE)
            .unwrap();
        assert_eq!(out, expected);
        assert_eq!(ledger.balance_of(&MUST, &ALICE), before + out);
        assert_eq!(ledger.balance_of(&WMATIC, &pair), 1_010_000);
    }

    #[test]
    fn test_multi_hop_swap() {
        let (mut router, mut ledger, _) = setup();
        router.create_pair(&mut ledger, MUST, USDC).unwrap();
        router
            .add_liquidity(&mut ledger, &ALICE, &MUST, &USDC, 4_000_000, 2_000_000, 0, 0, &ALICE)
            .unwrap();

        let amounts = router.get_amounts_out(&ledger, 10_000, &[WMATIC, MUST, USDC]).unwrap();
        let before = ledger.balance_of(&USDC, &ALICE);
        let out = router
            .swap_exact_tokens_for_tokens(&mut ledger, &ALICE, 10_000, 0, &[WMATIC, MUST, USDC], &ALICE)
            .unwrap();
        assert_eq!(out, amounts[2]);
        assert_eq!(ledger.balance_of(&USDC, &ALICE), before + out);
    }

    #[test]
    fn test_swap_without_pair_fails() {
        let (router, mut ledger, _) = setup();
        assert!(matches!(
            router.swap_exact_tokens_for_tokens(&mut ledger, &ALICE, 100, 0, &[WMATIC, USDC], &ALICE),
            Err(YieldmillError::NoSwapRoute { .. })
        ));
    }

    #[test]
    fn test_remove_liquidity() {
        let (router, mut ledger, pair) = setup();
        ledger.approve(&pair, &ALICE, &ROUTER, u64::MAX);

        let (a, b) = router
            .remove_liquidity(&mut ledger, &ALICE, &WMATIC, &MUST, 200_000, 0, 0, &ALICE)
            .unwrap();
        assert_eq!(a, 100_000);
        assert_eq!(b, 400_000);
        assert_eq!(ledger.total_supply(&pair), 1_800_000);
    }
}
