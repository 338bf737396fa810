//! Reference Environment
//!
//! `World` owns the block clock, the token ledger and every deployed staking
//! pool, vault and router. Contracts receive `&mut World` and reach external
//! collaborators only through it.

use crate::amm::SwapRouter;
use crate::constants::seeds;
use crate::errors::{YieldmillError, YieldmillResult};
use crate::ledger::TokenLedger;
use crate::source::YieldSource;
use crate::staking::StakingPool;
use crate::types::{derive_address, Address};
use crate::vault::YieldVault;
use crate::BTreeMap;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// Everything outside the protocol
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct World {
    pub block_height: u64,
    pub ledger: TokenLedger,
    pools: BTreeMap<Address, StakingPool>,
    vaults: BTreeMap<Address, YieldVault>,
    routers: BTreeMap<Address, SwapRouter>,
    nonce: u64,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_blocks(&mut self, blocks: u64) {
        self.block_height = self.block_height.saturating_add(blocks);
    }

    /// Fresh deterministic address for a deployment of `kind`
    fn next_address(&mut self, kind: &[u8]) -> Address {
        let address = derive_address(seeds::ENVIRONMENT, &[kind, &self.nonce.to_le_bytes()]);
        self.nonce += 1;
        address
    }

    // ============ Deployment ============

    pub fn create_token(&mut self, symbol: &str) -> YieldmillResult<Address> {
        let token = self.next_address(b"token");
        self.ledger.register(token, symbol)?;
        Ok(token)
    }

    pub fn create_router(&mut self, fee_bps: u64) -> Address {
        let address = self.next_address(b"router");
        self.routers.insert(address, SwapRouter::new(address, fee_bps));
        address
    }

    pub fn create_pair(&mut self, router: &Address, token_a: Address, token_b: Address) -> YieldmillResult<Address> {
        let router = self
            .routers
            .get_mut(router)
            .ok_or(YieldmillError::UnknownRouter { address: *router })?;
        router.create_pair(&mut self.ledger, token_a, token_b)
    }

    /// Deploy a pool paying `reward_rate` of `reward_token` per block
    pub fn create_staking_pool(
        &mut self,
        staking_token: Address,
        reward_token: Address,
        reward_rate: u64,
    ) -> YieldmillResult<Address> {
        self.ledger.token_info(&staking_token)?;
        self.ledger.token_info(&reward_token)?;
        if staking_token == reward_token {
            return Err(YieldmillError::InvalidParameter {
                param: "reward_token",
                reason: "reward token must differ from staking token",
            });
        }
        let address = self.next_address(b"pool");
        self.pools.insert(
            address,
            StakingPool::new(address, staking_token, reward_token, reward_rate, self.block_height),
        );
        Ok(address)
    }

    /// Deploy a vault for `want` together with its share token
    pub fn create_vault(&mut self, want: Address) -> YieldmillResult<Address> {
        self.ledger.token_info(&want)?;
        let address = self.next_address(b"vault");
        let share_token = self.next_address(b"share");
        self.ledger.register(share_token, "SHARE")?;
        self.vaults.insert(address, YieldVault::new(address, want, share_token));
        Ok(address)
    }

    // ============ Environment Actions ============

    pub fn mint(&mut self, token: &Address, to: &Address, amount: u64) -> YieldmillResult<()> {
        self.ledger.mint(token, to, amount)
    }

    pub fn approve(&mut self, token: &Address, owner: &Address, spender: &Address, amount: u64) {
        self.ledger.approve(token, owner, spender, amount);
    }

    pub fn balance_of(&self, token: &Address, account: &Address) -> u64 {
        self.ledger.balance_of(token, account)
    }

    /// Move reward from `funder` into a pool's emission budget
    pub fn fund_pool(&mut self, pool: &Address, funder: &Address, amount: u64) -> YieldmillResult<()> {
        let block_height = self.block_height;
        let pool = self
            .pools
            .get_mut(pool)
            .ok_or(YieldmillError::UnknownPool { address: *pool })?;
        pool.fund(&mut self.ledger, funder, amount, block_height)
    }

    pub fn set_auto_claim(&mut self, pool: &Address, enabled: bool) -> YieldmillResult<()> {
        let pool = self
            .pools
            .get_mut(pool)
            .ok_or(YieldmillError::UnknownPool { address: *pool })?;
        pool.auto_claim_on_withdraw = enabled;
        Ok(())
    }

    /// Vault yield: `from` sends want straight to the vault
    pub fn donate_to_vault(&mut self, vault: &Address, from: &Address, amount: u64) -> YieldmillResult<()> {
        let want = self.vault(vault)?.want;
        self.ledger.transfer(&want, from, vault, amount)
    }

    // ============ Lookup ============

    pub fn pool(&self, address: &Address) -> YieldmillResult<&StakingPool> {
        self.pools
            .get(address)
            .ok_or(YieldmillError::UnknownPool { address: *address })
    }

    pub fn vault(&self, address: &Address) -> YieldmillResult<&YieldVault> {
        self.vaults
            .get(address)
            .ok_or(YieldmillError::UnknownVault { address: *address })
    }

    pub fn router(&self, address: &Address) -> YieldmillResult<&SwapRouter> {
        self.routers
            .get(address)
            .ok_or(YieldmillError::UnknownRouter { address: *address })
    }

    /// Router together with the ledger it trades on
    pub fn router_and_ledger(&mut self, address: &Address) -> YieldmillResult<(&SwapRouter, &mut TokenLedger)> {
        let router = self
            .routers
            .get(address)
            .ok_or(YieldmillError::UnknownRouter { address: *address })?;
        Ok((router, &mut self.ledger))
    }

    /// Read-only view of the pool or vault at `address`
    pub fn source(&self, address: &Address) -> YieldmillResult<&dyn YieldSource> {
        if let Some(pool) = self.pools.get(address) {
            let source: &dyn YieldSource = pool;
            return Ok(source);
        }
        if let Some(vault) = self.vaults.get(address) {
            let source: &dyn YieldSource = vault;
            return Ok(source);
        }
        Err(YieldmillError::UnknownPool { address: *address })
    }

    /// Run `f` against the pool or vault at `address`
    pub fn with_source<T, F>(&mut self, address: &Address, f: F) -> YieldmillResult<T>
    where
        F: FnOnce(&mut dyn YieldSource, &mut TokenLedger, u64) -> YieldmillResult<T>,
    {
        let block_height = self.block_height;
        if let Some(pool) = self.pools.get_mut(address) {
            return f(pool, &mut self.ledger, block_height);
        }
        if let Some(vault) = self.vaults.get_mut(address) {
            return f(vault, &mut self.ledger, block_height);
        }
        Err(YieldmillError::UnknownPool { address: *address })
    }

    /// Staked balance of `account` in the source at `address`
    pub fn staked(&self, source: &Address, account: &Address) -> YieldmillResult<u64> {
        self.source(source)?.balance_of(&self.ledger, account)
    }
}
